/// Relief Web - native window entry point
///
/// Usage: relief-web [heightmap-image]
///
/// Drop an image onto the window to load it.
/// Controls:
///   - Left drag: rotate
///   - Right/middle drag: pan
///   - Wheel: zoom
///   - [ / ]: height exaggeration
///   - P: toggle perspective/orthographic
///   - R: reload the image
///   - Q/ESC: quit

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use relief_core::{Viewer, ViewerConfig};
    use std::path::PathBuf;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ViewerConfig::load_or_default().context("loading viewer config")?;
    let mut viewer = Viewer::new(&config);

    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        tracing::info!(path = %path.display(), "loading heightmap");
        viewer.load_path(&path);
    }

    pollster::block_on(relief_web::run(viewer))
}

// The browser build starts from the `wasm_bindgen(start)` export in the library.
#[cfg(target_arch = "wasm32")]
fn main() {}
