/// Camera placement and projection utilities
use nalgebra::{Matrix4, Point3, Vector3, Vector4};
use serde::Deserialize;

/// Vertical field of view of the perspective camera, in degrees
pub const FIELD_OF_VIEW_DEGREES: f32 = 90.0;
pub const NEAR_CLIP: f32 = 0.001;
pub const FAR_CLIP: f32 = 10000.0;
/// Camera distance and orthographic half-extent used before any heightmap is loaded
pub const DEFAULT_EXTENT: f32 = 10.0;

/// Projection mode for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMode {
    #[default]
    Perspective,
    Orthographic,
}

impl ProjectionMode {
    pub fn toggled(self) -> Self {
        match self {
            ProjectionMode::Perspective => ProjectionMode::Orthographic,
            ProjectionMode::Orthographic => ProjectionMode::Perspective,
        }
    }
}

impl std::str::FromStr for ProjectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perspective" => Ok(ProjectionMode::Perspective),
            "orthographic" => Ok(ProjectionMode::Orthographic),
            other => Err(format!("unknown projection mode '{}'", other)),
        }
    }
}

/// Right, up and forward axes of a look-at camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAtBasis {
    pub right: Vector3<f32>,
    pub up: Vector3<f32>,
    pub forward: Vector3<f32>,
}

impl LookAtBasis {
    /// `up_hint` only needs to be non-parallel to the viewing direction; the
    /// returned `up` is recomputed so the three axes are orthonormal.
    pub fn new(eye: &Point3<f32>, target: &Point3<f32>, up_hint: &Vector3<f32>) -> Self {
        let forward = (target - eye).normalize();
        let right = forward.cross(up_hint).normalize();
        let up = right.cross(&forward);
        Self { right, up, forward }
    }

    /// World-to-camera matrix for a camera at `eye` using this basis
    #[rustfmt::skip]
    pub fn view_matrix(&self, eye: &Point3<f32>) -> Matrix4<f32> {
        let eye = eye.coords;
        let (r, u, f) = (self.right, self.up, self.forward);
        Matrix4::new(
            r.x, r.y, r.z, -r.dot(&eye),
            u.x, u.y, u.z, -u.dot(&eye),
            -f.x, -f.y, -f.z, f.dot(&eye),
            0.0, 0.0, 0.0, 1.0,
        )
    }
}

/// Clip planes of an orthographic projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthographicBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

/// Camera configuration for 3D rendering
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub mode: ProjectionMode,
    /// Half-extent of the orthographic view volume
    pub extent: f32,
}

impl Camera {
    /// Frame a terrain whose largest dimension is `extent` cells, or the
    /// default box when `extent` is `None`.
    pub fn for_extent(extent: Option<usize>, aspect: f32, mode: ProjectionMode) -> Self {
        let distance = extent.map_or(DEFAULT_EXTENT, |e| e as f32);
        Self {
            position: Point3::new(0.0, distance * 0.5, distance),
            target: Point3::origin(),
            up: Vector3::y(),
            fov: FIELD_OF_VIEW_DEGREES.to_radians(),
            aspect,
            near: NEAR_CLIP,
            far: FAR_CLIP,
            mode,
            extent: distance,
        }
    }

    pub fn basis(&self) -> LookAtBasis {
        LookAtBasis::new(&self.position, &self.target, &self.up)
    }

    /// Create the view matrix (camera transformation)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.basis().view_matrix(&self.position)
    }

    pub fn orthographic_bounds(&self) -> OrthographicBounds {
        OrthographicBounds {
            left: -self.extent * self.aspect,
            right: self.extent * self.aspect,
            bottom: -self.extent,
            top: self.extent,
        }
    }

    /// Create the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        match self.mode {
            ProjectionMode::Perspective => {
                Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
            }
            ProjectionMode::Orthographic => {
                let b = self.orthographic_bounds();
                Matrix4::new_orthographic(b.left, b.right, b.bottom, b.top, self.near, self.far)
            }
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::for_extent(None, 800.0 / 600.0, ProjectionMode::Perspective)
    }
}

/// Project a model-space point to screen space through a combined
/// projection * model-view matrix.
///
/// Returns `(x, y, depth)` with `depth` in normalized device units, or `None`
/// when the point lies behind the camera or outside the depth range.
pub fn project_to_screen(
    mvp: &Matrix4<f32>,
    point: &Point3<f32>,
    width: u32,
    height: u32,
) -> Option<(f32, f32, f32)> {
    let clip: Vector4<f32> = mvp * point.to_homogeneous();

    // Prevent division by near-zero depth values
    if clip.w < 1e-6 {
        return None;
    }

    let ndc_x = clip.x / clip.w;
    let ndc_y = clip.y / clip.w;
    let ndc_z = clip.z / clip.w;
    if !(-1.0..=1.0).contains(&ndc_z) {
        return None;
    }

    let screen_x = (ndc_x + 1.0) * 0.5 * width as f32;
    let screen_y = (1.0 - ndc_y) * 0.5 * height as f32;

    Some((screen_x, screen_y, ndc_z))
}
