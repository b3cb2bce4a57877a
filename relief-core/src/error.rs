/// Error types shared by the viewer front ends
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReliefError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("heightmap load was cancelled")]
    Cancelled,

    #[error("could not start load task: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("terrain needs a {bytes}-byte buffer, the device allows {limit}")]
    BufferTooLarge { bytes: u64, limit: u64 },
}

pub type Result<T> = std::result::Result<T, ReliefError>;
