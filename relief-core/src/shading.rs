/// Height-based color ramp shared by the CPU and GPU renderers
use crate::geometry::{Y_SCALE, Y_SHIFT};

/// Bottom of the vertical range the ramp spans
pub const RAMP_MIN: f32 = -Y_SHIFT;
/// Width of the vertical range (64 units, the full 0..256 luminance span)
pub const RAMP_SPAN: f32 = 256.0 * Y_SCALE;

/// Normalized height in `[0, 1]` for a model-space Y value
pub fn ramp_position(y: f32) -> f32 {
    ((y - RAMP_MIN) / RAMP_SPAN).clamp(0.0, 1.0)
}

/// Blue at the bottom of the range, green at the top.
pub fn height_color(y: f32) -> [f32; 4] {
    let h = ramp_position(y);
    [0.0, h, 1.0 - h, 1.0]
}
