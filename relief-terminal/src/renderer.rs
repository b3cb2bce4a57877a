/// ASCII rasterizer for terminal rendering
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::Point3;
use relief_core::projection::project_to_screen;
use relief_core::shading::{height_color, ramp_position};
use relief_core::{Frame, Mesh};
use std::io::Write;

/// Character density ramp, lowest terrain first
const HEIGHT_RAMP: &[char] = &['.', ':', '-', '=', '+', '*', '#', '%', '@'];

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    character: char,
    color: Color,
}

const BLANK: Cell = Cell {
    character: ' ',
    color: Color::Reset,
};

/// Screen-space corner produced by the projection step
type ScreenVertex = (f32, f32, f32);

/// ASCII renderer that converts terrain meshes to terminal characters
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    cell_buffer: Vec<Cell>,
    projected: Vec<Option<ScreenVertex>>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            cell_buffer: vec![BLANK; size],
            projected: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height);
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.cell_buffer.fill(BLANK);
    }

    /// Rasterize every triangle of `mesh` with the frame's matrices.
    pub fn render_mesh(&mut self, mesh: &Mesh, frame: &Frame) {
        let mvp = frame.mvp();
        let (width, height) = (self.width as u32, self.height as u32);

        self.projected.clear();
        self.projected.extend(
            mesh.positions
                .iter()
                .map(|p| project_to_screen(&mvp, &Point3::from(*p), width, height)),
        );

        for [a, b, c] in mesh.triangle_indices() {
            let (Some(v0), Some(v1), Some(v2)) =
                (self.projected[a], self.projected[b], self.projected[c])
            else {
                continue; // Triangle is clipped
            };

            // Shade by the model-space height, like the GPU vertex stage
            let y = (mesh.positions[a][1] + mesh.positions[b][1] + mesh.positions[c][1]) / 3.0;
            self.rasterize_triangle([v0, v1, v2], shade(y));
        }
    }

    fn rasterize_triangle(&mut self, coords: [ScreenVertex; 3], cell: Cell) {
        let [v0, v1, v2] = coords;

        // Bounding box
        let min_x = v0.0.min(v1.0).min(v2.0).floor() as i32;
        let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i32;
        let min_y = v0.1.min(v1.1).min(v2.1).floor() as i32;
        let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                let Some((w0, w1, w2)) =
                    barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), (px, py))
                else {
                    continue;
                };

                // Both windings are drawn; there is no face culling
                let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0)
                    || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
                if !inside {
                    continue;
                }

                let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                let idx = y as usize * self.width + x as usize;
                if depth < self.depth_buffer[idx] {
                    self.depth_buffer[idx] = depth;
                    self.cell_buffer[idx] = cell;
                }
            }
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut current = None;
        for y in 0..self.height {
            for x in 0..self.width {
                let cell = self.cell_buffer[y * self.width + x];
                if current != Some(cell.color) {
                    writer.queue(SetForegroundColor(cell.color))?;
                    current = Some(cell.color);
                }
                writer.queue(Print(cell.character))?;
            }
            if y + 1 < self.height {
                writer.queue(Print("\r\n"))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }

    #[cfg(test)]
    fn filled_cells(&self) -> usize {
        self.cell_buffer.iter().filter(|c| **c != BLANK).count()
    }
}

/// Character and color for a model-space height
fn shade(y: f32) -> Cell {
    let [r, g, b, _] = height_color(y);
    let ramp = ramp_position(y);
    let index = ((ramp * (HEIGHT_RAMP.len() - 1) as f32).round() as usize).min(HEIGHT_RAMP.len() - 1);
    Cell {
        character: HEIGHT_RAMP[index],
        color: Color::Rgb {
            r: (r * 255.0) as u8,
            g: (g * 255.0) as u8,
            b: (b * 255.0) as u8,
        },
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_core::viewer::compute_frame;
    use relief_core::{DrawCall, Heightfield, ViewParams};

    #[test]
    fn test_shade_ramp() {
        let low = shade(-16.0);
        let high = shade(48.0);
        assert_eq!(low.character, '.');
        assert_eq!(high.character, '@');
        assert_eq!(low.color, Color::Rgb { r: 0, g: 0, b: 255 });
        assert_eq!(high.color, Color::Rgb { r: 0, g: 255, b: 0 });
    }

    #[test]
    fn test_barycentric_degenerate() {
        assert!(barycentric((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (0.5, 0.5)).is_none());
        let (w0, w1, w2) = barycentric((0.0, 0.0), (4.0, 0.0), (0.0, 4.0), (1.0, 1.0)).unwrap();
        assert!((w0 + w1 + w2 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fallback_box_is_drawn() {
        let mut renderer = AsciiRenderer::new(80, 40);
        let mesh = Mesh::fallback_box();
        let frame = compute_frame(
            &ViewParams::default(),
            None,
            1.0,
            DrawCall::NonIndexed { vertex_count: 36 },
        );
        renderer.render_mesh(&mesh, &frame);
        assert!(renderer.filled_cells() > 0);

        renderer.clear();
        assert_eq!(renderer.filled_cells(), 0);
    }

    #[test]
    fn test_terrain_is_drawn() {
        let field = Heightfield::new(16, 16, (0..256).map(|k| k as f32 / 255.0).collect());
        let mesh = Mesh::from_heightfield(&field);
        let frame = compute_frame(
            &ViewParams::default(),
            Some(16),
            2.0,
            DrawCall::Indexed { index_count: mesh.index_count() as u32 },
        );

        let mut renderer = AsciiRenderer::new(60, 30);
        renderer.render_mesh(&mesh, &frame);
        assert!(renderer.filled_cells() > 0);

        let mut out = Vec::new();
        renderer.draw(&mut out).unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn test_strip_draws_nothing() {
        let mesh = Mesh::from_heightfield(&Heightfield::new(8, 1, vec![0.5; 8]));
        let frame = compute_frame(
            &ViewParams::default(),
            Some(8),
            1.0,
            DrawCall::Indexed { index_count: 0 },
        );
        let mut renderer = AsciiRenderer::new(20, 10);
        renderer.render_mesh(&mesh, &frame);
        assert_eq!(renderer.filled_cells(), 0);
    }
}
