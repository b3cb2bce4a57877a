/// Triangle meshes built from heightfields, plus the placeholder box
use nalgebra::{Matrix4, Point3, Vector3};
use tracing::debug;

use crate::heightfield::Heightfield;

/// Vertical scale applied to the 0..255 luminance range.
pub const Y_SCALE: f32 = 64.0 / 256.0;
/// Vertical offset subtracted after scaling.
pub const Y_SHIFT: f32 = 16.0;

/// A triangle face defined by three corner positions
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub vertices: [Point3<f32>; 3],
}

impl Triangle {
    pub fn new(v0: Point3<f32>, v1: Point3<f32>, v2: Point3<f32>) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Apply a homogeneous transform to every corner
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Self {
        Self {
            vertices: self.vertices.map(|v| matrix.transform_point(&v)),
        }
    }
}

/// Flat position and index buffers ready for upload.
///
/// Heightfield meshes are indexed (possibly with zero indices for a one-row
/// or one-column field); the fallback box is a plain triangle list with no
/// index buffer at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Option<Vec<u32>>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triangulate a heightfield into a regular grid centered on the origin
    /// in the X/Z plane. Rows run along X and columns along Z.
    pub fn from_heightfield(field: &Heightfield) -> Self {
        let width = field.width();
        let height = field.height();

        let mut positions = Vec::with_capacity(width * height);
        for i in 0..height {
            for j in 0..width {
                let lum = field.data()[j + width * i];
                positions.push([
                    -(height as f32) / 2.0 + i as f32,
                    lum * 255.0 * Y_SCALE - Y_SHIFT,
                    -(width as f32) / 2.0 + j as f32,
                ]);
            }
        }

        let quads = width.saturating_sub(1) * height.saturating_sub(1);
        let mut indices = Vec::with_capacity(quads * 6);
        for i in 0..height.saturating_sub(1) {
            for j in 0..width.saturating_sub(1) {
                let top_left = (j + width * i) as u32;
                let top_right = (j + 1 + width * i) as u32;
                let bottom_left = (j + width * (i + 1)) as u32;
                let bottom_right = (j + 1 + width * (i + 1)) as u32;

                indices.extend_from_slice(&[top_left, bottom_left, top_right]);
                indices.extend_from_slice(&[top_right, bottom_left, bottom_right]);
            }
        }

        debug!(
            vertices = positions.len(),
            indices = indices.len(),
            "built heightfield mesh"
        );
        Self {
            positions,
            indices: Some(indices),
        }
    }

    /// Non-indexed mesh from a list of triangles
    pub fn from_triangles(triangles: &[Triangle]) -> Self {
        let positions = triangles
            .iter()
            .flat_map(|t| t.vertices.iter().map(|v| [v.x, v.y, v.z]))
            .collect();
        Self {
            positions,
            indices: None,
        }
    }

    /// The cube drawn before any heightmap has been loaded.
    ///
    /// One face is written out by hand; the other five are rotated copies of
    /// it, three about Y and two about X.
    pub fn fallback_box() -> Self {
        let front = [
            Triangle::new(
                Point3::new(-1.0, -1.0, 1.0),
                Point3::new(-1.0, 1.0, 1.0),
                Point3::new(1.0, -1.0, 1.0),
            ),
            Triangle::new(
                Point3::new(1.0, -1.0, 1.0),
                Point3::new(-1.0, 1.0, 1.0),
                Point3::new(1.0, 1.0, 1.0),
            ),
        ];

        let quarter = std::f32::consts::FRAC_PI_2;
        let mut rotations = vec![Matrix4::identity()];
        for i in 1..=3 {
            rotations.push(Matrix4::new_rotation(Vector3::new(0.0, quarter * i as f32, 0.0)));
        }
        rotations.push(Matrix4::new_rotation(Vector3::new(quarter, 0.0, 0.0)));
        rotations.push(Matrix4::new_rotation(Vector3::new(-quarter, 0.0, 0.0)));

        let triangles: Vec<Triangle> = rotations
            .iter()
            .flat_map(|m| front.iter().map(move |t| t.transformed(m)))
            .collect();

        Self::from_triangles(&triangles)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.as_ref().map_or(0, Vec::len)
    }

    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    /// Corner indices of each triangle: read from the index buffer, or
    /// consecutive position triples when there is none.
    pub fn triangle_indices(&self) -> Box<dyn Iterator<Item = [usize; 3]> + '_> {
        match &self.indices {
            Some(indices) => Box::new(
                indices
                    .chunks_exact(3)
                    .map(|c| [c[0] as usize, c[1] as usize, c[2] as usize]),
            ),
            None => Box::new((0..self.positions.len() / 3).map(|t| [3 * t, 3 * t + 1, 3 * t + 2])),
        }
    }

    /// Corner positions of each triangle
    pub fn triangles(&self) -> impl Iterator<Item = [[f32; 3]; 3]> + '_ {
        self.triangle_indices()
            .map(move |[a, b, c]| [self.positions[a], self.positions[b], self.positions[c]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(width: usize, height: usize) -> Heightfield {
        let data = (0..width * height)
            .map(|k| k as f32 / (width * height) as f32)
            .collect();
        Heightfield::new(width, height, data)
    }

    #[test]
    fn test_counts_match_grid() {
        for (w, h) in [(2, 2), (3, 5), (8, 1), (1, 8), (1, 1), (17, 9)] {
            let mesh = Mesh::from_heightfield(&field(w, h));
            assert_eq!(mesh.vertex_count(), w * h);
            assert_eq!(mesh.index_count(), 6 * (w - 1) * (h - 1));
            assert!(mesh.is_indexed());
            let indices = mesh.indices.as_ref().unwrap();
            assert!(indices.iter().all(|&i| (i as usize) < w * h));
        }
    }

    #[test]
    fn test_two_by_two_mesh() {
        let lums = vec![0.0, 0.25, 0.5, 1.0];
        let mesh = Mesh::from_heightfield(&Heightfield::new(2, 2, lums.clone()));

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices, Some(vec![0, 2, 1, 1, 2, 3]));

        for (p, lum) in mesh.positions.iter().zip(&lums) {
            let expected = lum * 255.0 * Y_SCALE - Y_SHIFT;
            assert!((p[1] - expected).abs() < 1e-5);
        }

        // row 0 at x = -1, column 0 at z = -1
        assert_eq!(mesh.positions[0][0], -1.0);
        assert_eq!(mesh.positions[0][2], -1.0);
        assert_eq!(mesh.positions[1][2], 0.0);
        assert_eq!(mesh.positions[2][0], 0.0);
    }

    #[test]
    fn test_height_range() {
        let mesh = Mesh::from_heightfield(&Heightfield::new(2, 1, vec![0.0, 1.0]));
        assert!((mesh.positions[0][1] + 16.0).abs() < 1e-5);
        assert!((mesh.positions[1][1] - 47.75).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_strip_has_no_triangles() {
        let mesh = Mesh::from_heightfield(&field(6, 1));
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.index_count(), 0);
        assert_eq!(mesh.triangles().count(), 0);
    }

    #[test]
    fn test_fallback_box() {
        let mesh = Mesh::fallback_box();
        assert_eq!(mesh.vertex_count(), 36);
        assert!(!mesh.is_indexed());
        assert_eq!(mesh.triangles().count(), 12);

        for p in &mesh.positions {
            for c in p {
                assert!((c.abs() - 1.0).abs() < 1e-5, "corner off the unit cube: {:?}", p);
            }
        }

        // Each of the six faces is covered by exactly two triangles
        for axis in 0..3 {
            for sign in [-1.0f32, 1.0] {
                let on_face = mesh
                    .triangles()
                    .filter(|t| t.iter().all(|v| (v[axis] - sign).abs() < 1e-5))
                    .count();
                assert_eq!(on_face, 2, "axis {} sign {}", axis, sign);
            }
        }
    }

    #[test]
    fn test_triangle_transform() {
        let t = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        let moved = t.transformed(&Matrix4::new_translation(&Vector3::new(0.0, 0.0, 2.0)));
        assert!(moved.vertices.iter().all(|v| (v.z - 2.0).abs() < 1e-6));
    }
}
