/// Conversion from decoded images to luminance height fields
use std::path::Path;

use image::RgbaImage;
use tracing::debug;

use crate::error::{ReliefError, Result};

/// Rec. 709 luma weights
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Normalized luminance of an 8-bit RGB triple. Alpha never contributes.
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    (LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32) / 255.0
}

/// A row-major grid of luminance values in `[0, 1]`.
///
/// `width` is the number of columns and `height` the number of rows, so the
/// sample for row `i`, column `j` lives at `data[j + width * i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightfield {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Heightfield {
    /// Wrap an existing row-major sample buffer.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != width * height`.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "heightfield data does not match {}x{}",
            width,
            height
        );
        Self {
            width,
            height,
            data,
        }
    }

    /// Build a heightfield from an RGBA bitmap, one sample per pixel.
    pub fn from_rgba(image: &RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ReliefError::EmptyImage { width, height });
        }

        let data = image
            .pixels()
            .map(|px| luminance(px[0], px[1], px[2]))
            .collect();

        debug!(width, height, "converted image to heightfield");
        Ok(Self::new(width as usize, height as usize, data))
    }

    /// Decode an in-memory image in any format the `image` crate recognises.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?;
        Self::from_rgba(&decoded.to_rgba8())
    }

    /// Read and decode an image file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| ReliefError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Sample at row `row`, column `col`.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data.get(col + self.width * row).copied()
    }

    /// Largest of the two grid dimensions, used to size the camera.
    pub fn max_dimension(&self) -> usize {
        self.width.max(self.height)
    }
}
