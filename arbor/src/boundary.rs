//! Environment boundaries for constrained growth
//!
//! A [`Boundary`] answers one question: where does a ray first cross the
//! volume's surface in front of its origin? The skeleton builder uses the
//! answer as a branch end point for near-terminal levels. Degenerate queries
//! (zero direction, grazing or parallel rays) report no hit, which falls back
//! to unconstrained growth.

use glam::Vec3;
use tracing::warn;

use crate::mesh::MeshBuffer;

/// Hits closer than this to the ray origin are ignored
pub const RAY_EPSILON: f32 = 1e-5;

/// Closed volume that can be ray-cast
pub trait Boundary: Sync {
    /// Nearest forward intersection of the ray `origin + t * direction`, `t > 0`
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<Vec3>;
}

/// Normalized ray direction, or `None` for a zero vector
fn ray_direction(direction: Vec3) -> Option<Vec3> {
    direction.try_normalize()
}

/// Smallest parameter beyond [`RAY_EPSILON`] from an entry/exit pair
fn nearest_forward(t_enter: f32, t_exit: f32) -> Option<f32> {
    if t_enter > t_exit || t_exit <= RAY_EPSILON {
        None
    } else if t_enter > RAY_EPSILON {
        Some(t_enter)
    } else {
        Some(t_exit)
    }
}

/// Sphere boundary
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Boundary for Sphere {
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<Vec3> {
        let dir = ray_direction(direction)?;
        let oc = origin - self.center;
        let b = oc.dot(dir);
        let c = oc.length_squared() - self.radius * self.radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let root = discriminant.sqrt();
        let t = nearest_forward(-b - root, -b + root)?;
        Some(origin + dir * t)
    }
}

/// Axis-aligned box boundary
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

impl Boundary for Aabb {
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<Vec3> {
        let dir = ray_direction(direction)?;
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;

        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            if d.abs() < f32::EPSILON {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let t0 = (self.min[axis] - o) / d;
            let t1 = (self.max[axis] - o) / d;
            t_enter = t_enter.max(t0.min(t1));
            t_exit = t_exit.min(t0.max(t1));
        }

        let t = nearest_forward(t_enter, t_exit)?;
        Some(origin + dir * t)
    }
}

/// Half-space `normal · x <= offset`, with `normal` pointing out of the volume
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

impl Plane {
    /// Plane through `point` with outward `normal`
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            offset: normal.dot(point),
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.offset
    }
}

/// Convex volume bounded by half-spaces
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConvexVolume {
    planes: Vec<Plane>,
}

impl ConvexVolume {
    pub fn from_planes(planes: Vec<Plane>) -> Self {
        Self { planes }
    }

    /// Six-plane volume equal to `aabb`
    pub fn from_aabb(aabb: &Aabb) -> Self {
        let planes = [Vec3::X, Vec3::Y, Vec3::Z]
            .into_iter()
            .flat_map(|axis| {
                [
                    Plane::from_point_normal(aabb.max, axis),
                    Plane::from_point_normal(aabb.min, -axis),
                ]
            })
            .collect();
        Self { planes }
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn contains(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|p| p.signed_distance(point) <= RAY_EPSILON)
    }
}

impl Boundary for ConvexVolume {
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<Vec3> {
        let dir = ray_direction(direction)?;
        if self.planes.is_empty() {
            return None;
        }

        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        for plane in &self.planes {
            let denom = plane.normal.dot(dir);
            let dist = plane.signed_distance(origin);
            if denom.abs() < f32::EPSILON {
                if dist > 0.0 {
                    return None;
                }
                continue;
            }
            let t = -dist / denom;
            if denom < 0.0 {
                t_enter = t_enter.max(t);
            } else {
                t_exit = t_exit.min(t);
            }
        }

        let t = nearest_forward(t_enter, t_exit)?;
        Some(origin + dir * t)
    }
}

/// Arbitrary closed triangle surface
///
/// Reports the nearest forward triangle hit regardless of facing. The mesh is
/// not checked for closedness; a self-intersecting surface is the caller's
/// responsibility.
#[derive(Clone, Debug, Default)]
pub struct TriangleBoundary {
    triangles: Vec<[Vec3; 3]>,
}

impl TriangleBoundary {
    /// Triangles referencing missing vertices are skipped
    pub fn from_mesh(mesh: &MeshBuffer) -> Self {
        let corner = |i: u32| mesh.positions.get(i as usize).copied().map(Vec3::from);
        let triangles: Vec<[Vec3; 3]> = mesh
            .indices
            .chunks_exact(3)
            .filter_map(|tri| Some([corner(tri[0])?, corner(tri[1])?, corner(tri[2])?]))
            .collect();

        let skipped = mesh.triangle_count() - triangles.len();
        if skipped > 0 {
            warn!("TriangleBoundary: skipped {} triangles with out-of-range indices", skipped);
        }
        Self { triangles }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

impl Boundary for TriangleBoundary {
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<Vec3> {
        let dir = ray_direction(direction)?;
        self.triangles
            .iter()
            .filter_map(|tri| ray_triangle(origin, dir, tri))
            .min_by(f32::total_cmp)
            .map(|t| origin + dir * t)
    }
}

/// Möller–Trumbore ray/triangle test, two-sided
fn ray_triangle(origin: Vec3, dir: Vec3, [a, b, c]: &[Vec3; 3]) -> Option<f32> {
    let edge1 = *b - *a;
    let edge2 = *c - *a;
    let p = dir.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < f32::EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - *a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    (t > RAY_EPSILON).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshBuilder, MeshBuilderUV};

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    fn box_mesh() -> MeshBuffer {
        // Cube from 8 corners, 12 triangles
        let mut mesh = MeshBuffer::new();
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            );
            mesh.add_vertex_uv(corner, (0.0, 0.0), Vec3::ZERO);
        }
        let faces = [
            [0, 1, 3, 2],
            [4, 6, 7, 5],
            [0, 4, 5, 1],
            [2, 3, 7, 6],
            [0, 2, 6, 4],
            [1, 5, 7, 3],
        ];
        for [a, b, c, d] in faces {
            mesh.add_triangle(a, b, c);
            mesh.add_triangle(a, c, d);
        }
        mesh
    }

    #[test]
    fn test_sphere_from_inside_hits_surface() {
        let sphere = Sphere {
            center: Vec3::ZERO,
            radius: 5.0,
        };
        let hit = sphere.intersect(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0)).unwrap();
        assert!(hit.distance(Vec3::new(0.0, 5.0, 0.0)) < 1e-4);
    }

    #[test]
    fn test_sphere_from_outside_hits_near_side() {
        let sphere = Sphere {
            center: Vec3::ZERO,
            radius: 1.0,
        };
        let hit = sphere
            .intersect(Vec3::new(-5.0, 0.0, 0.0), Vec3::X)
            .unwrap();
        assert!(hit.distance(Vec3::new(-1.0, 0.0, 0.0)) < 1e-4);
        assert!(sphere.intersect(Vec3::new(-5.0, 0.0, 0.0), -Vec3::X).is_none());
        assert!(sphere.intersect(Vec3::new(-5.0, 3.0, 0.0), Vec3::X).is_none());
    }

    #[test]
    fn test_zero_direction_is_no_hit() {
        assert!(unit_box().intersect(Vec3::ZERO, Vec3::ZERO).is_none());
    }

    #[test]
    fn test_aabb_exit_point() {
        let hit = unit_box()
            .intersect(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0))
            .unwrap();
        assert!(hit.distance(Vec3::new(1.0, 1.0, 0.0)) < 1e-4);
    }

    #[test]
    fn test_aabb_parallel_outside_misses() {
        let hit = unit_box().intersect(Vec3::new(0.0, 2.0, 0.0), Vec3::X);
        assert!(hit.is_none());
    }

    #[test]
    fn test_convex_matches_aabb() {
        let aabb = unit_box();
        let convex = ConvexVolume::from_aabb(&aabb);
        let dirs = [
            Vec3::X,
            Vec3::new(0.3, 0.8, -0.2),
            Vec3::new(-1.0, 0.2, 0.5),
            Vec3::NEG_Y,
        ];
        for dir in dirs {
            let a = aabb.intersect(Vec3::new(0.1, -0.2, 0.3), dir).unwrap();
            let b = convex.intersect(Vec3::new(0.1, -0.2, 0.3), dir).unwrap();
            assert!(a.distance(b) < 1e-4, "{:?} vs {:?}", a, b);
            assert!(convex.contains(b));
        }
    }

    #[test]
    fn test_convex_from_outside() {
        let convex = ConvexVolume::from_aabb(&unit_box());
        let hit = convex.intersect(Vec3::new(0.0, -4.0, 0.0), Vec3::Y).unwrap();
        assert!(hit.distance(Vec3::new(0.0, -1.0, 0.0)) < 1e-4);
        assert!(convex.intersect(Vec3::new(0.0, -4.0, 0.0), Vec3::NEG_Y).is_none());
    }

    #[test]
    fn test_triangle_boundary_matches_aabb() {
        let boundary = TriangleBoundary::from_mesh(&box_mesh());
        assert_eq!(boundary.triangle_count(), 12);
        let origin = Vec3::new(0.2, 0.1, -0.3);
        for dir in [Vec3::X, Vec3::new(0.4, 0.9, 0.1), Vec3::NEG_Z] {
            let a = unit_box().intersect(origin, dir).unwrap();
            let b = boundary.intersect(origin, dir).unwrap();
            assert!(a.distance(b) < 1e-4, "{:?} vs {:?}", a, b);
        }
    }

    #[test]
    fn test_triangle_boundary_skips_bad_indices() {
        let mut mesh = box_mesh();
        mesh.indices.extend_from_slice(&[0, 1, 99]);
        let boundary = TriangleBoundary::from_mesh(&mesh);
        assert_eq!(boundary.triangle_count(), 12);
        assert!(boundary.intersect(Vec3::ZERO, Vec3::Y).is_some());
    }

    #[test]
    fn test_empty_convex_never_hits() {
        assert!(ConvexVolume::default().intersect(Vec3::ZERO, Vec3::Y).is_none());
    }
}
