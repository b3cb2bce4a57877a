/// Which mesh is on screen, and how to draw it
use tracing::{error, info};

use crate::error::ReliefError;
use crate::geometry::Mesh;
use crate::heightfield::Heightfield;

/// Work handed from a finished load task to the render loop.
#[derive(Debug)]
pub enum SceneCommand {
    ReplaceMesh {
        source: String,
        heightfield: Heightfield,
    },
    LoadFailed {
        source: String,
        error: ReliefError,
    },
}

/// The two states the renderer can be in. There is no way back to
/// `NoMesh` once a heightfield has been loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneMesh {
    NoMesh,
    HeightfieldMesh {
        mesh: Mesh,
        width: usize,
        height: usize,
    },
}

/// Draw call for the active mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    /// Plain triangle list over the first `vertex_count` vertices
    NonIndexed { vertex_count: u32 },
    /// Indexed triangle list over the full index buffer
    Indexed { index_count: u32 },
}

#[derive(Debug)]
pub struct Scene {
    mesh: SceneMesh,
    fallback: Mesh,
    revision: u64,
    source: Option<String>,
    last_error: Option<String>,
    failures: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            mesh: SceneMesh::NoMesh,
            fallback: Mesh::fallback_box(),
            revision: 0,
            source: None,
            last_error: None,
            failures: 0,
        }
    }

    /// Apply a load result. Returns `true` when the mesh was replaced.
    pub fn apply(&mut self, command: SceneCommand) -> bool {
        match command {
            SceneCommand::ReplaceMesh {
                source,
                heightfield,
            } => {
                self.replace(&heightfield);
                self.source = Some(source.clone());
                info!(
                    %source,
                    width = heightfield.width(),
                    height = heightfield.height(),
                    indices = self.active_mesh().index_count(),
                    "loaded heightmap"
                );
                true
            }
            SceneCommand::LoadFailed { source, error } => {
                error!(%source, %error, "could not load heightmap");
                self.last_error = Some(format!("{}: {}", source, error));
                self.failures += 1;
                false
            }
        }
    }

    /// Swap in a mesh built from `heightfield`, dropping the previous one.
    pub fn replace(&mut self, heightfield: &Heightfield) {
        self.mesh = SceneMesh::HeightfieldMesh {
            mesh: Mesh::from_heightfield(heightfield),
            width: heightfield.width(),
            height: heightfield.height(),
        };
        self.revision += 1;
        self.last_error = None;
    }

    pub fn mesh(&self) -> &SceneMesh {
        &self.mesh
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.mesh, SceneMesh::HeightfieldMesh { .. })
    }

    /// The mesh to draw this frame: the terrain, or the box before any load
    pub fn active_mesh(&self) -> &Mesh {
        match &self.mesh {
            SceneMesh::NoMesh => &self.fallback,
            SceneMesh::HeightfieldMesh { mesh, .. } => mesh,
        }
    }

    pub fn draw_call(&self) -> DrawCall {
        match &self.mesh {
            SceneMesh::NoMesh => DrawCall::NonIndexed {
                vertex_count: self.fallback.vertex_count() as u32,
            },
            SceneMesh::HeightfieldMesh { mesh, .. } => DrawCall::Indexed {
                index_count: mesh.index_count() as u32,
            },
        }
    }

    /// Largest heightfield dimension, if one is loaded
    pub fn extent(&self) -> Option<usize> {
        match self.mesh {
            SceneMesh::NoMesh => None,
            SceneMesh::HeightfieldMesh { width, height, .. } => Some(width.max(height)),
        }
    }

    /// Bumped on every mesh replacement so GPU copies know to re-upload
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Where the current heightfield came from
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Number of failed loads so far. Repeating the same broken file still
    /// counts, so front ends compare this rather than the message.
    pub fn failure_count(&self) -> u64 {
        self.failures
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace(heightfield: Heightfield) -> SceneCommand {
        SceneCommand::ReplaceMesh {
            source: "test".to_string(),
            heightfield,
        }
    }

    #[test]
    fn test_starts_with_fallback_box() {
        let scene = Scene::new();
        assert!(!scene.is_loaded());
        assert_eq!(scene.extent(), None);
        assert_eq!(scene.draw_call(), DrawCall::NonIndexed { vertex_count: 36 });
        assert_eq!(scene.active_mesh().vertex_count(), 36);
    }

    #[test]
    fn test_load_switches_to_indexed() {
        let mut scene = Scene::new();
        let field = Heightfield::new(2, 2, vec![0.1, 0.2, 0.3, 0.4]);

        assert!(scene.apply(replace(field)));
        assert!(scene.is_loaded());
        assert_eq!(scene.revision(), 1);
        assert_eq!(scene.draw_call(), DrawCall::Indexed { index_count: 6 });
        assert_eq!(scene.active_mesh().vertex_count(), 4);
        assert_eq!(scene.extent(), Some(2));
    }

    #[test]
    fn test_failure_keeps_previous_mesh() {
        let mut scene = Scene::new();
        scene.apply(replace(Heightfield::new(3, 2, vec![0.5; 6])));
        let before = scene.mesh().clone();

        let changed = scene.apply(SceneCommand::LoadFailed {
            source: "broken.png".to_string(),
            error: ReliefError::EmptyImage {
                width: 0,
                height: 0,
            },
        });

        assert!(!changed);
        assert_eq!(scene.mesh(), &before);
        assert_eq!(scene.revision(), 1);
        assert!(scene.last_error().unwrap().starts_with("broken.png"));
    }

    #[test]
    fn test_identical_failures_each_count() {
        let mut scene = Scene::new();
        let broken = || SceneCommand::LoadFailed {
            source: "bad.png".to_string(),
            error: ReliefError::EmptyImage {
                width: 0,
                height: 4,
            },
        };

        scene.apply(broken());
        let first = scene.last_error().map(str::to_string);
        scene.apply(broken());

        assert_eq!(scene.last_error().map(str::to_string), first);
        assert_eq!(scene.failure_count(), 2);

        // A later success clears the message but not the count
        scene.apply(replace(Heightfield::new(2, 2, vec![0.0; 4])));
        assert_eq!(scene.last_error(), None);
        assert_eq!(scene.failure_count(), 2);
        assert_eq!(scene.source(), Some("test"));
    }

    #[test]
    fn test_failure_before_any_load_keeps_box() {
        let mut scene = Scene::new();
        scene.apply(SceneCommand::LoadFailed {
            source: "x".to_string(),
            error: ReliefError::Cancelled,
        });
        assert_eq!(scene.draw_call(), DrawCall::NonIndexed { vertex_count: 36 });
    }

    #[test]
    fn test_last_load_wins() {
        let mut scene = Scene::new();
        scene.apply(replace(Heightfield::new(4, 4, vec![0.0; 16])));
        scene.apply(replace(Heightfield::new(3, 1, vec![0.0; 3])));

        assert_eq!(scene.revision(), 2);
        assert_eq!(scene.extent(), Some(3));
        // A strip has no quads but is still drawn indexed
        assert_eq!(scene.draw_call(), DrawCall::Indexed { index_count: 0 });
    }
}
