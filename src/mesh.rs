//! Canonical triangle mesh produced by tessellation.
//!
//! Every output format is encoded from this one representation, and every
//! metric is computed from it. It is read-only once built: the pipeline never
//! mutates a mesh after the tessellation stage hands it over.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An indexed triangle mesh in model units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<[f64; 3]>,
    /// Triangles as counter-clockwise triples of vertex indices.
    pub faces: Vec<[u32; 3]>,
}

/// Axis-aligned bounds of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    /// Size along each axis.
    pub fn extents(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// A face referenced a vertex that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutOfBounds {
    pub face: usize,
    pub index: u32,
    pub vertex_count: usize,
}

impl std::fmt::Display for IndexOutOfBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "face {} references vertex {} but the mesh has {} vertices",
            self.face, self.index, self.vertex_count
        )
    }
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(vertices: Vec<[f64; 3]>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Build an indexed mesh from a triangle soup, merging corners whose
    /// coordinates are bit-identical.
    ///
    /// Formats such as STL store every triangle with its own three corners,
    /// so adjacent triangles only share a vertex after welding. Exact matching
    /// is enough for tessellator output: shared edges are discretised once and
    /// both neighbouring faces reuse the same points.
    pub fn weld_triangles<I>(triangles: I) -> Self
    where
        I: IntoIterator<Item = [[f64; 3]; 3]>,
    {
        let mut lookup: HashMap<[u64; 3], u32> = HashMap::new();
        let mut mesh = Mesh::new();

        for tri in triangles {
            let mut face = [0u32; 3];
            for (slot, corner) in face.iter_mut().zip(tri.iter()) {
                let key = position_key(corner);
                *slot = *lookup.entry(key).or_insert_with(|| {
                    mesh.vertices.push(*corner);
                    (mesh.vertices.len() - 1) as u32
                });
            }
            mesh.faces.push(face);
        }

        mesh
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Check that every face index is within the vertex sequence.
    pub fn validate(&self) -> Result<(), IndexOutOfBounds> {
        let vertex_count = self.vertices.len();
        for (face_idx, face) in self.faces.iter().enumerate() {
            if let Some(&index) = face.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(IndexOutOfBounds {
                    face: face_idx,
                    index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    /// The three corner positions of a face.
    ///
    /// Callers must have validated the mesh first.
    pub fn triangle(&self, face: [u32; 3]) -> [[f64; 3]; 3] {
        [
            self.vertices[face[0] as usize],
            self.vertices[face[1] as usize],
            self.vertices[face[2] as usize],
        ]
    }

    /// Iterate every face as corner positions.
    pub fn triangles(&self) -> impl Iterator<Item = [[f64; 3]; 3]> + '_ {
        self.faces.iter().map(|&f| self.triangle(f))
    }

    /// Signed volume via the divergence theorem: the sum of signed tetrahedra
    /// spanned by each face and the origin.
    ///
    /// Positive for outward-facing (counter-clockwise) winding. Only
    /// meaningful for closed meshes.
    pub fn signed_volume(&self) -> f64 {
        let volume: f64 = self
            .triangles()
            .map(|[a, b, c]| dot(a, cross(b, c)))
            .sum();
        volume / 6.0
    }

    pub fn surface_area(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| 0.5 * norm(cross(sub(b, a), sub(c, a))))
            .sum()
    }

    /// Bounds of all vertices, or `None` for a mesh without vertices.
    pub fn bounds(&self) -> Option<Aabb> {
        let first = *self.vertices.first()?;
        let mut aabb = Aabb {
            min: first,
            max: first,
        };
        for v in &self.vertices[1..] {
            for axis in 0..3 {
                aabb.min[axis] = aabb.min[axis].min(v[axis]);
                aabb.max[axis] = aabb.max[axis].max(v[axis]);
            }
        }
        Some(aabb)
    }

    /// `true` when every undirected edge bounds exactly two faces.
    ///
    /// An empty mesh is not watertight.
    pub fn is_watertight(&self) -> bool {
        if self.faces.is_empty() {
            return false;
        }
        let mut edges: HashMap<(u32, u32), u32> = HashMap::with_capacity(self.faces.len() * 3);
        for &[a, b, c] in &self.faces {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                let key = if u < v { (u, v) } else { (v, u) };
                *edges.entry(key).or_insert(0) += 1;
            }
        }
        edges.values().all(|&n| n == 2)
    }
}

/// Hash key for exact position matching. `-0.0` and `0.0` compare equal.
fn position_key(p: &[f64; 3]) -> [u64; 3] {
    let bits = |x: f64| if x == 0.0 { 0u64 } else { x.to_bits() };
    [bits(p[0]), bits(p[1]), bits(p[2])]
}

pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Unit normal of a triangle, or zero for a degenerate one.
pub(crate) fn face_normal([a, b, c]: [[f64; 3]; 3]) -> [f64; 3] {
    let n = cross(sub(b, a), sub(c, a));
    let len = norm(n);
    if len > f64::EPSILON {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 0.0]
    }
}

/// Closed axis-aligned box from `min` to `max`, wound outward.
///
/// Used by tests and by callers that need a reference solid.
pub fn cuboid(min: [f64; 3], max: [f64; 3]) -> Mesh {
    let [x0, y0, z0] = min;
    let [x1, y1, z1] = max;
    let vertices = vec![
        [x0, y0, z0],
        [x1, y0, z0],
        [x1, y1, z0],
        [x0, y1, z0],
        [x0, y0, z1],
        [x1, y0, z1],
        [x1, y1, z1],
        [x0, y1, z1],
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [2, 3, 7],
        [2, 7, 6],
        [1, 2, 6],
        [1, 6, 5],
        [0, 4, 7],
        [0, 7, 3],
    ];
    Mesh::from_parts(vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube10() -> Mesh {
        cuboid([0.0; 3], [10.0; 3])
    }

    #[test]
    fn cube_volume_and_area() {
        let m = cube10();
        assert!((m.signed_volume() - 1000.0).abs() < 1e-9);
        assert!((m.surface_area() - 600.0).abs() < 1e-9);
    }

    #[test]
    fn cube_is_watertight() {
        assert!(cube10().is_watertight());
    }

    #[test]
    fn open_box_is_not_watertight() {
        let mut m = cube10();
        m.faces.truncate(10);
        assert!(!m.is_watertight());
    }

    #[test]
    fn empty_mesh_is_not_watertight() {
        assert!(!Mesh::new().is_watertight());
    }

    #[test]
    fn flipped_winding_gives_negative_volume() {
        let mut m = cube10();
        for f in &mut m.faces {
            f.swap(1, 2);
        }
        assert!((m.signed_volume() + 1000.0).abs() < 1e-9);
    }

    #[test]
    fn validate_reports_out_of_range_index() {
        let m = Mesh::from_parts(vec![[0.0; 3]; 3], vec![[0, 1, 2], [0, 1, 3]]);
        let err = m.validate().unwrap_err();
        assert_eq!(err.face, 1);
        assert_eq!(err.index, 3);
        assert_eq!(err.vertex_count, 3);
    }

    #[test]
    fn weld_merges_shared_corners() {
        let soup: Vec<[[f64; 3]; 3]> = cube10().triangles().collect();
        let welded = Mesh::weld_triangles(soup);
        assert_eq!(welded.vertex_count(), 8);
        assert_eq!(welded.face_count(), 12);
        assert!(welded.is_watertight());
    }

    #[test]
    fn weld_treats_negative_zero_as_zero() {
        let welded = Mesh::weld_triangles(vec![
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            [[-0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        ]);
        assert_eq!(welded.vertex_count(), 4);
    }

    #[test]
    fn bounds_of_cube() {
        let b = cube10().bounds().unwrap();
        assert_eq!(b.extents(), [10.0, 10.0, 10.0]);
        assert!(Mesh::new().bounds().is_none());
    }
}
