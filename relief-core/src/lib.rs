/// Relief Core Library - heightmap terrain meshing and view transforms
///
/// This library holds everything the viewer front ends share: image to
/// heightfield conversion, mesh building, the per-frame transform pipeline,
/// pointer interaction and the scene state machine.

pub mod config;
pub mod error;
pub mod geometry;
pub mod heightfield;
pub mod interaction;
pub mod loader;
pub mod projection;
pub mod scene;
pub mod shading;
pub mod transform;
pub mod viewer;

// Re-export commonly used types
pub use config::{InputSettings, ViewerConfig};
pub use error::{ReliefError, Result};
pub use geometry::{Mesh, Triangle};
pub use heightfield::Heightfield;
pub use interaction::{InputEvent, InputQueue, InteractionController, PointerButton};
pub use projection::{Camera, ProjectionMode};
pub use scene::{DrawCall, Scene, SceneCommand, SceneMesh};
pub use transform::{Transform, ViewParams};
pub use viewer::{Frame, Viewer};
