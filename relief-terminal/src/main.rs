/// Relief Terminal - heightmap terrain viewer
///
/// Usage: relief-terminal [heightmap-image]
///
/// Without an image a placeholder box is shown.
/// Controls:
///   - Left drag: rotate
///   - Right/middle drag: pan
///   - Wheel: zoom
///   - [ / ]: height exaggeration
///   - P: toggle perspective/orthographic
///   - R: reload the image
///   - Q/ESC: quit

use anyhow::Context;
use relief_core::{Viewer, ViewerConfig};
use relief_terminal::TerminalApp;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Stdout is the drawing surface, so logs go to a file instead
const LOG_FILE: &str = "relief-terminal.log";

fn init_logging() -> anyhow::Result<()> {
    let file = File::create(LOG_FILE).with_context(|| format!("creating {}", LOG_FILE))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config = ViewerConfig::load_or_default().context("loading viewer config")?;
    let mut viewer = Viewer::new(&config);

    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            println!("Loading heightmap: {}", path.display());
            viewer.load_path(&path);
        }
        None => println!("No heightmap given, showing the default box"),
    }

    let mut app = TerminalApp::new(viewer).context("initializing terminal")?;
    app.run().context("running terminal renderer")?;

    println!("Logs written to {}", LOG_FILE);
    Ok(())
}
