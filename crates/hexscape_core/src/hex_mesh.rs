//! Hexagonal prism geometry shared by every instance.
//!
//! The prism has radius `size` and height `size`, base on z = 0, Z-up:
//! - 6 top-face vertices (normal +Z), fanned from vertex 0 into 4 triangles
//! - 6 bottom-face vertices (normal -Z), same fan with reversed winding
//! - 24 side vertices, 4 per edge, each carrying the radial direction at its
//!   angle as normal; 2 triangles per edge
//!
//! 36 vertices and 60 indices regardless of `size`. Triangles are wound
//! counter-clockwise when viewed from outside.
//!
//! Corner `i` sits at angle `i * 60°` from +X, so corners 0 and 3 point east
//! and west and the hexagon is flat-topped on screen (a flat edge faces
//! north).

use bevy_mesh::{VertexBufferLayout, VertexFormat};
use bytemuck::{Pod, Zeroable};
use std::f32::consts::FRAC_PI_3;

/// Number of vertices in a hexagonal prism.
pub const HEX_VERTEX_COUNT: usize = 36;

/// Number of triangle indices in a hexagonal prism.
pub const HEX_INDEX_COUNT: usize = 60;

const TOP: u32 = 0;
const BOTTOM: u32 = 6;
const SIDES: u32 = 12;

/// Errors raised while building geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Mesh size must be finite and strictly positive.
    InvalidSize(f32),
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::InvalidSize(size) => {
                write!(f, "invalid mesh size {} (must be finite and > 0)", size)
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Triangle-list geometry: positions, normals and indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGeometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether every index refers to an existing vertex and every vertex
    /// has a normal.
    pub fn is_consistent(&self) -> bool {
        self.positions.len() == self.normals.len()
            && self.indices.len() % 3 == 0
            && self
                .indices
                .iter()
                .all(|&i| (i as usize) < self.positions.len())
    }

    /// Interleaved vertices for upload.
    pub fn interleaved(&self) -> Vec<HexVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .map(|(&position, &normal)| HexVertex { position, normal })
            .collect()
    }

    fn push(&mut self, position: [f32; 3], normal: [f32; 3]) {
        self.positions.push(position);
        self.normals.push(normal);
    }

    fn triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }
}

/// Interleaved vertex consumed by the prism pipeline.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct HexVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl HexVertex {
    /// Per-vertex layout: position at location 0, normal at location 1.
    pub fn vertex_buffer_layout() -> VertexBufferLayout {
        VertexBufferLayout::from_vertex_formats(
            wgpu::VertexStepMode::Vertex,
            [
                VertexFormat::Float32x3, // Position
                VertexFormat::Float32x3, // Normal
            ],
        )
    }
}

/// Unit radial direction of hexagon corner `i` (wraps modulo 6). Corner 0
/// is +X.
#[inline]
fn corner(i: u32) -> (f32, f32) {
    let angle = (i % 6) as f32 * FRAC_PI_3;
    (angle.cos(), angle.sin())
}

/// Build the hexagonal prism used for every instance.
///
/// Rejects `size <= 0` and non-finite sizes.
pub fn build_hexagon_prism(size: f32) -> Result<MeshGeometry, GeometryError> {
    if !size.is_finite() || size <= 0.0 {
        return Err(GeometryError::InvalidSize(size));
    }
    let height = size;

    let mut mesh = MeshGeometry {
        positions: Vec::with_capacity(HEX_VERTEX_COUNT),
        normals: Vec::with_capacity(HEX_VERTEX_COUNT),
        indices: Vec::with_capacity(HEX_INDEX_COUNT),
    };

    for i in 0..6 {
        let (c, s) = corner(i);
        mesh.push([size * c, size * s, height], [0.0, 0.0, 1.0]);
    }
    for i in 0..6 {
        let (c, s) = corner(i);
        mesh.push([size * c, size * s, 0.0], [0.0, 0.0, -1.0]);
    }

    // Side quads: top_a, bottom_a, top_b, bottom_b
    for i in 0..6 {
        let (ca, sa) = corner(i);
        let (cb, sb) = corner(i + 1);
        mesh.push([size * ca, size * sa, height], [ca, sa, 0.0]);
        mesh.push([size * ca, size * sa, 0.0], [ca, sa, 0.0]);
        mesh.push([size * cb, size * sb, height], [cb, sb, 0.0]);
        mesh.push([size * cb, size * sb, 0.0], [cb, sb, 0.0]);
    }

    for i in 1..5 {
        mesh.triangle(TOP, TOP + i, TOP + i + 1);
    }
    for i in 1..5 {
        mesh.triangle(BOTTOM, BOTTOM + i + 1, BOTTOM + i);
    }
    for i in 0..6 {
        let base = SIDES + i * 4;
        mesh.triangle(base, base + 1, base + 2);
        mesh.triangle(base + 1, base + 3, base + 2);
    }

    Ok(mesh)
}

/// Upward-facing quad spanning `min..max` at height `z`.
pub fn build_ground_quad(min: [f32; 2], max: [f32; 2], z: f32) -> MeshGeometry {
    let mut mesh = MeshGeometry::default();
    let up = [0.0, 0.0, 1.0];
    mesh.push([min[0], min[1], z], up);
    mesh.push([max[0], min[1], z], up);
    mesh.push([max[0], max[1], z], up);
    mesh.push([min[0], max[1], z], up);
    mesh.triangle(0, 1, 2);
    mesh.triangle(0, 2, 3);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    #[test]
    fn test_prism_has_fixed_counts() {
        for size in [0.001, 0.018, 1.0, 250.0] {
            let mesh = build_hexagon_prism(size).unwrap();
            assert_eq!(mesh.vertex_count(), HEX_VERTEX_COUNT);
            assert_eq!(mesh.normals.len(), HEX_VERTEX_COUNT);
            assert_eq!(mesh.indices.len(), HEX_INDEX_COUNT);
            assert_eq!(mesh.triangle_count(), 20);
            assert!(mesh.is_consistent());
        }
    }

    #[test]
    fn test_normals_are_unit_length() {
        let mesh = build_hexagon_prism(0.5).unwrap();
        for n in &mesh.normals {
            assert!((dot(*n, *n).sqrt() - 1.0).abs() < 1e-5, "normal {:?}", n);
        }
    }

    #[test]
    fn test_triangles_wind_outward() {
        let mesh = build_hexagon_prism(2.0).unwrap();
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.positions[i as usize]);
            let face = cross(sub(b, a), sub(c, a));
            let avg = tri.iter().fold([0.0; 3], |acc, &i| {
                let n = mesh.normals[i as usize];
                [acc[0] + n[0], acc[1] + n[1], acc[2] + n[2]]
            });
            assert!(dot(face, avg) > 0.0, "triangle {:?} faces inward", tri);
        }
    }

    #[test]
    fn test_top_and_bottom_heights() {
        let size = 0.25;
        let mesh = build_hexagon_prism(size).unwrap();
        for p in &mesh.positions[0..6] {
            assert_eq!(p[2], size);
            assert!(((p[0] * p[0] + p[1] * p[1]).sqrt() - size).abs() < 1e-6);
        }
        for p in &mesh.positions[6..12] {
            assert_eq!(p[2], 0.0);
        }
    }

    #[test]
    fn test_first_corner_points_east() {
        let mesh = build_hexagon_prism(2.0).unwrap();
        let p = mesh.positions[0];
        assert!((p[0] - 2.0).abs() < 1e-6 && p[1].abs() < 1e-6);
        // Corners 1 and 2 share y: a flat edge faces +Y.
        assert!((mesh.positions[1][1] - mesh.positions[2][1]).abs() < 1e-6);
    }

    #[test]
    fn test_side_normals_are_radial() {
        let mesh = build_hexagon_prism(3.0).unwrap();
        for (p, n) in mesh.positions[12..].iter().zip(&mesh.normals[12..]) {
            assert_eq!(n[2], 0.0);
            assert!((p[0] / 3.0 - n[0]).abs() < 1e-5);
            assert!((p[1] / 3.0 - n[1]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rejects_non_positive_size() {
        assert_eq!(build_hexagon_prism(0.0), Err(GeometryError::InvalidSize(0.0)));
        assert!(build_hexagon_prism(-1.0).is_err());
        assert!(build_hexagon_prism(f32::NAN).is_err());
        assert!(build_hexagon_prism(f32::INFINITY).is_err());
    }

    #[test]
    fn test_build_is_deterministic() {
        assert_eq!(build_hexagon_prism(0.018), build_hexagon_prism(0.018));
    }

    #[test]
    fn test_interleaved_matches_attributes() {
        let mesh = build_hexagon_prism(1.0).unwrap();
        let verts = mesh.interleaved();
        assert_eq!(verts.len(), HEX_VERTEX_COUNT);
        assert_eq!(verts[20].position, mesh.positions[20]);
        assert_eq!(verts[20].normal, mesh.normals[20]);
        assert_eq!(bytemuck::cast_slice::<HexVertex, u8>(&verts).len(), 36 * 24);
    }

    #[test]
    fn test_ground_quad_faces_up() {
        let quad = build_ground_quad([-1.0, -2.0], [1.0, 2.0], -0.1);
        assert!(quad.is_consistent());
        assert_eq!(quad.triangle_count(), 2);
        for tri in quad.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| quad.positions[i as usize]);
            assert!(cross(sub(b, a), sub(c, a))[2] > 0.0);
        }
    }
}
