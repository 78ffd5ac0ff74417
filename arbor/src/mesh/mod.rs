//! Mesh buffers and builders
//!
//! [`MeshBuffer`] is the accumulated renderable surface: positions, normals,
//! UVs and triangle indices. Builders only ever append; combining buffers
//! rebases the incoming indices so each part stays self-contained.

mod bark;
mod leaf;

use bytemuck::cast_slice;
use glam::{Mat4, Vec3};

pub use bark::{BranchMeshBuilder, MeshOptions, TipCap};
pub use leaf::generate_leaf;

/// Trait for mesh construction
///
/// Lets the tube and leaf generators write into any vertex sink.
pub trait MeshBuilder: Default {
    /// Add a vertex with position and normal, returning its index
    fn add_vertex(&mut self, position: Vec3, normal: Vec3) -> u32;

    /// Add a triangle using three vertex indices
    fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32);
}

/// Trait extension for UV-mapped meshes
pub trait MeshBuilderUV: MeshBuilder {
    /// Add a vertex with position, UV coordinates, and normal, returning its index
    fn add_vertex_uv(&mut self, position: Vec3, uv: (f32, f32), normal: Vec3) -> u32;
}

/// Unpacked f32 mesh data
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffer {
    /// Vertex positions as [x, y, z]
    pub positions: Vec<[f32; 3]>,
    /// Vertex normals as [x, y, z]
    pub normals: Vec<[f32; 3]>,
    /// UV coordinates as [u, v], one pair per position
    pub uvs: Vec<[f32; 2]>,
    /// Triangle indices into `positions`
    pub indices: Vec<u32>,
}

impl MeshBuffer {
    /// Create empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Get vertex count
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Drop all geometry, keeping the allocations
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.uvs.clear();
        self.indices.clear();
    }

    /// Append `other`, offsetting its indices past the current vertices
    ///
    /// Meshes without UVs are padded with zero UVs when the other side has them.
    pub fn append(&mut self, other: &MeshBuffer) {
        if other.positions.is_empty() {
            return;
        }

        let offset = self.positions.len() as u32;
        let had_uvs = !self.uvs.is_empty() || self.positions.is_empty();

        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);

        if !other.uvs.is_empty() || !self.uvs.is_empty() {
            if !had_uvs {
                self.uvs.resize(offset as usize, [0.0, 0.0]);
            }
            if other.uvs.is_empty() {
                self.uvs.resize(self.positions.len(), [0.0, 0.0]);
            } else {
                self.uvs.extend_from_slice(&other.uvs);
            }
        }

        self.indices.extend(other.indices.iter().map(|&i| offset + i));
    }

    /// Concatenate several meshes in order
    pub fn combine<'a>(meshes: impl IntoIterator<Item = &'a MeshBuffer>) -> MeshBuffer {
        let mut result = MeshBuffer::new();
        for mesh in meshes {
            result.append(mesh);
        }
        result
    }

    /// Transform positions by `matrix` and normals by its inverse-transpose
    pub fn transform(&mut self, matrix: Mat4) {
        let normal_matrix = matrix.inverse().transpose();

        for pos in &mut self.positions {
            *pos = matrix.transform_point3(Vec3::from(*pos)).to_array();
        }

        for norm in &mut self.normals {
            *norm = normal_matrix
                .transform_vector3(Vec3::from(*norm))
                .normalize_or_zero()
                .to_array();
        }
    }

    /// Copy of this mesh with `matrix` applied
    pub fn transformed(&self, matrix: Mat4) -> MeshBuffer {
        let mut mesh = self.clone();
        mesh.transform(matrix);
        mesh
    }

    /// Recompute smooth normals from the triangle list
    ///
    /// Face normals are accumulated unnormalized, so larger triangles weigh
    /// more. Vertices with no usable face keep a zero normal.
    pub fn recompute_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let p0 = Vec3::from(self.positions[a]);
            let p1 = Vec3::from(self.positions[b]);
            let p2 = Vec3::from(self.positions[c]);
            let face = (p1 - p0).cross(p2 - p0);
            accum[a] += face;
            accum[b] += face;
            accum[c] += face;
        }
        self.normals = accum
            .into_iter()
            .map(|n| n.normalize_or_zero().to_array())
            .collect();
    }

    /// Positions as raw bytes for GPU upload
    pub fn position_bytes(&self) -> &[u8] {
        cast_slice(&self.positions)
    }

    /// Normals as raw bytes for GPU upload
    pub fn normal_bytes(&self) -> &[u8] {
        cast_slice(&self.normals)
    }

    /// UVs as raw bytes for GPU upload
    pub fn uv_bytes(&self) -> &[u8] {
        cast_slice(&self.uvs)
    }

    /// Indices as raw bytes for GPU upload
    pub fn index_bytes(&self) -> &[u8] {
        cast_slice(&self.indices)
    }
}

impl MeshBuilder for MeshBuffer {
    fn add_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position.to_array());
        self.normals.push(normal.to_array());
        if !self.uvs.is_empty() {
            self.uvs.push([0.0, 0.0]);
        }
        index
    }

    fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }
}

impl MeshBuilderUV for MeshBuffer {
    fn add_vertex_uv(&mut self, position: Vec3, uv: (f32, f32), normal: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        if self.uvs.len() < self.positions.len() {
            self.uvs.resize(self.positions.len(), [0.0, 0.0]);
        }
        self.positions.push(position.to_array());
        self.normals.push(normal.to_array());
        self.uvs.push([uv.0, uv.1]);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(offset: f32) -> MeshBuffer {
        let mut mesh = MeshBuffer::new();
        let a = mesh.add_vertex_uv(Vec3::new(offset, 0.0, 0.0), (0.0, 0.0), Vec3::Z);
        let b = mesh.add_vertex_uv(Vec3::new(offset + 1.0, 0.0, 0.0), (1.0, 0.0), Vec3::Z);
        let c = mesh.add_vertex_uv(Vec3::new(offset + 1.0, 1.0, 0.0), (1.0, 1.0), Vec3::Z);
        let d = mesh.add_vertex_uv(Vec3::new(offset, 1.0, 0.0), (0.0, 1.0), Vec3::Z);
        mesh.add_triangle(a, b, c);
        mesh.add_triangle(a, c, d);
        mesh
    }

    #[test]
    fn test_combine_empty() {
        let none: [&MeshBuffer; 0] = [];
        let result = MeshBuffer::combine(none);
        assert_eq!(result.vertex_count(), 0);
        assert_eq!(result.indices.len(), 0);
    }

    #[test]
    fn test_append_rebases_indices() {
        let first = quad(0.0);
        let second = quad(2.0);
        let combined = MeshBuffer::combine([&first, &second]);

        assert_eq!(combined.vertex_count(), 8);
        assert_eq!(combined.triangle_count(), 4);
        assert_eq!(&combined.indices[6..], &[4, 5, 6, 4, 6, 7]);
        assert_eq!(combined.uvs.len(), combined.vertex_count());
        for &idx in &combined.indices {
            assert!((idx as usize) < combined.vertex_count());
        }
    }

    #[test]
    fn test_append_pads_missing_uvs() {
        let mut plain = MeshBuffer::new();
        let a = plain.add_vertex(Vec3::ZERO, Vec3::Z);
        let b = plain.add_vertex(Vec3::X, Vec3::Z);
        let c = plain.add_vertex(Vec3::Y, Vec3::Z);
        plain.add_triangle(a, b, c);
        assert!(plain.uvs.is_empty());

        let combined = MeshBuffer::combine([&plain, &quad(0.0)]);
        assert_eq!(combined.uvs.len(), combined.vertex_count());
        assert_eq!(combined.uvs[0], [0.0, 0.0]);
    }

    #[test]
    fn test_transform_translates_positions() {
        let mesh = quad(0.0).transformed(Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0)));
        assert!(mesh.positions.iter().all(|p| (p[2] - 3.0).abs() < 1e-6));
        assert!(mesh.normals.iter().all(|n| (n[2] - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_recompute_normals_flat_quad() {
        let mut mesh = quad(0.0);
        mesh.normals.iter_mut().for_each(|n| *n = [0.0, 0.0, 0.0]);
        mesh.recompute_normals();
        for n in &mesh.normals {
            assert!((Vec3::from(*n) - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn test_clear_resets_buffers() {
        let mut mesh = quad(0.0);
        mesh.clear();
        assert!(mesh.is_empty());
        assert!(mesh.indices.is_empty());
        assert!(mesh.uvs.is_empty());
    }

    #[test]
    fn test_byte_views() {
        let mesh = quad(0.0);
        assert_eq!(mesh.position_bytes().len(), 4 * 12);
        assert_eq!(mesh.uv_bytes().len(), 4 * 8);
        assert_eq!(mesh.index_bytes().len(), 6 * 4);
    }
}
