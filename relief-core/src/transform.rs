/// Model transforms and the user-controlled view parameters
use nalgebra::{Matrix4, Vector3};
use serde::Deserialize;

use crate::projection::ProjectionMode;

/// Smallest value a rotation slider holds after wrapping.
pub const ROTATION_MIN: f32 = 1.0;
/// Largest value a rotation slider holds after wrapping.
pub const ROTATION_MAX: f32 = 360.0;

/// Fold a rotation slider value back into `[1, 360]`.
///
/// Reaching 360 restarts at 1 and reaching 0 restarts at 360, like a range
/// input that loops instead of clamping.
pub fn wrap_rotation(degrees: f32) -> f32 {
    if degrees >= ROTATION_MAX {
        ROTATION_MIN
    } else if degrees <= 0.0 {
        ROTATION_MAX
    } else {
        degrees
    }
}

/// Everything the user can change about how the terrain is viewed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewParams {
    /// Rotation about Y in degrees
    pub y_rotation: f32,
    /// Rotation about Z in degrees
    pub z_rotation: f32,
    /// Zoom level; the model is scaled by `scale + 1`
    pub scale: f32,
    /// Vertical exaggeration in percent
    pub height_percent: f32,
    pub pan_x: f32,
    pub pan_z: f32,
    pub projection: ProjectionMode,
}

impl ViewParams {
    /// Rotate by slider increments (in degrees), wrapping each axis.
    pub fn rotate(&mut self, dy: f32, dz: f32) {
        self.y_rotation = wrap_rotation(self.y_rotation + dy);
        self.z_rotation = wrap_rotation(self.z_rotation + dz);
    }

    pub fn zoom_factor(&self) -> f32 {
        self.scale + 1.0
    }

    pub fn height_factor(&self) -> f32 {
        self.height_percent * 0.01
    }

    /// Model matrix: rotation, then uniform zoom, then vertical exaggeration.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        let zoom = self.zoom_factor();
        Matrix4::<f32>::identity()
            * Transform::rotation_matrix(self.y_rotation, self.z_rotation)
            * Transform::scale_matrix(zoom, zoom, zoom)
            * Transform::scale_matrix(1.0, self.height_factor(), 1.0)
    }

    /// Translation applied in front of the view matrix.
    pub fn pan_matrix(&self) -> Matrix4<f32> {
        Transform::translation_matrix(self.pan_x, self.pan_z, 0.0)
    }
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            y_rotation: ROTATION_MAX,
            z_rotation: ROTATION_MAX,
            scale: 0.0,
            height_percent: 100.0,
            pan_x: 0.0,
            pan_z: 0.0,
            projection: ProjectionMode::Perspective,
        }
    }
}

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Rotation about Y followed by rotation about Z, both in degrees
    pub fn rotation_matrix(y_degrees: f32, z_degrees: f32) -> Matrix4<f32> {
        let ry = Matrix4::new_rotation(Vector3::new(0.0, y_degrees.to_radians(), 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, z_degrees.to_radians()));
        ry * rz
    }

    /// Create a translation matrix
    pub fn translation_matrix(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    /// Create a scale matrix
    pub fn scale_matrix(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }
}
