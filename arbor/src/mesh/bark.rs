//! Bark surface: ring-extruded tubes along every skeleton curve
//!
//! Each node contributes `segments + 1` rings of `radial_segments + 1`
//! vertices (the last vertex of a ring duplicates the first so U can wrap to
//! 1.0). Rings are oriented by rotating a reference ring in the XZ plane onto
//! the curve tangent. V runs along the branch chain in world units divided by
//! the tile length, so a child continues the texture from the point on its
//! parent where it forks off.

use std::f32::consts::TAU;

use glam::{Quat, Vec3};
use rayon::prelude::*;
use tracing::{debug, warn};

use super::{MeshBuffer, MeshBuilder, MeshBuilderUV};
use crate::curve::CurveSampler;
use crate::skeleton::{Skeleton, SkeletonNode};
use crate::species::SpeciesSpec;

/// How the last ring of a branch without children is finished
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TipCap {
    /// Leave the tube open
    #[default]
    Open,
    /// Close the last ring with a triangle fan over its own vertices
    Fan,
}

/// Bark tessellation options
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshOptions {
    /// Rings along each branch minus one; `None` uses the species setting
    pub segments: Option<u32>,
    /// Vertices around each ring, excluding the seam duplicate (min 3, max 256)
    pub radial_segments: u32,
    pub tip: TipCap,
    /// Floor for every ring radius
    pub min_radius: f32,
    /// World length of one texture repeat along V; `None` uses the trunk length
    pub uv_tile_length: Option<f32>,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            segments: None,
            radial_segments: 5,
            tip: TipCap::Open,
            min_radius: 0.1,
            uv_tile_length: None,
        }
    }
}

/// One self-contained tube to emit
struct TubeJob {
    curve: CurveSampler,
    radius: f32,
    v_start: f32,
    cap: bool,
}

/// Resolved per-build tessellation parameters
#[derive(Clone, Copy)]
struct Tessellation {
    segments: u32,
    radial: u32,
    along_branch: f32,
    min_radius: f32,
    tile_length: f32,
}

/// Builds the bark mesh of a skeleton
#[derive(Clone, Debug, Default)]
pub struct BranchMeshBuilder {
    options: MeshOptions,
}

impl BranchMeshBuilder {
    pub fn new(options: MeshOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MeshOptions {
        &self.options
    }

    /// Rings emitted per node for `species`
    pub fn rings_per_node(&self, species: &SpeciesSpec) -> usize {
        self.options.segments.unwrap_or(species.segments).max(1) as usize + 1
    }

    /// Vertices in each ring, including the seam duplicate
    pub fn vertices_per_ring(&self) -> usize {
        self.options.radial_segments.clamp(3, 256) as usize + 1
    }

    /// Build the bark mesh for `skeleton` into a fresh buffer
    pub fn build(&self, skeleton: &Skeleton) -> MeshBuffer {
        let mut mesh = MeshBuffer::new();
        self.build_into(skeleton, &mut mesh);
        mesh
    }

    /// Append the bark mesh for `skeleton` to `out`
    ///
    /// Tubes are generated in parallel but appended strictly depth-first
    /// (parent, then each child subtree in order).
    pub fn build_into(&self, skeleton: &Skeleton, out: &mut MeshBuffer) {
        let species = &*skeleton.species;
        let params = self.tessellation(skeleton);

        let mut jobs = Vec::new();
        collect_jobs(
            &skeleton.root,
            species.trunk.radius,
            0.0,
            species,
            &params,
            self.options.tip == TipCap::Fan,
            &mut jobs,
        );

        let tubes: Vec<MeshBuffer> = jobs.par_iter().map(|job| build_tube(job, &params)).collect();

        let start = out.vertex_count();
        for tube in &tubes {
            out.append(tube);
        }
        debug!(
            "Built bark for '{}': {} tubes, {} vertices, {} triangles",
            species.name,
            tubes.len(),
            out.vertex_count() - start,
            tubes.iter().map(MeshBuffer::triangle_count).sum::<usize>()
        );
    }

    fn tessellation(&self, skeleton: &Skeleton) -> Tessellation {
        let species = &*skeleton.species;

        let radial = self.options.radial_segments;
        let radial = if radial < 3 {
            warn!("BranchMeshBuilder: radial_segments must be >= 3, clamping to 3");
            3
        } else if radial > 256 {
            warn!("BranchMeshBuilder: radial_segments must be <= 256, clamping to 256");
            256
        } else {
            radial
        };

        let min_radius = if self.options.min_radius > 0.0 {
            self.options.min_radius
        } else {
            warn!("BranchMeshBuilder: min_radius must be > 0.0, clamping to 0.001");
            0.001
        };

        let requested = self.options.uv_tile_length;
        if requested.is_some_and(|len| len <= f32::EPSILON) {
            warn!("BranchMeshBuilder: uv_tile_length must be > 0.0, using the trunk length");
        }
        let tile_length = requested
            .filter(|len| *len > f32::EPSILON)
            .or_else(|| skeleton.root.curve().ok().map(|c| c.length()))
            .filter(|len| *len > f32::EPSILON)
            .unwrap_or(1.0);

        Tessellation {
            segments: self.rings_per_node(species) as u32 - 1,
            radial,
            along_branch: species.shrink.along_branch,
            min_radius,
            tile_length,
        }
    }
}

/// Flatten the skeleton depth-first into tube jobs
fn collect_jobs(
    node: &SkeletonNode,
    radius: f32,
    v_start: f32,
    species: &SpeciesSpec,
    params: &Tessellation,
    cap_tips: bool,
    jobs: &mut Vec<TubeJob>,
) {
    let Ok(curve) = node.curve() else {
        return;
    };
    let radius = radius.max(params.min_radius);

    let child_starts: Vec<f32> = node
        .children
        .iter()
        .map(|child| v_start + curve.length_at(child.fork) / params.tile_length)
        .collect();

    jobs.push(TubeJob {
        curve,
        radius,
        v_start,
        cap: cap_tips && node.is_tip(),
    });

    for (child, child_v) in node.children.iter().zip(child_starts) {
        let child_radius = radius * species.taper_for(child.depth);
        collect_jobs(child, child_radius, child_v, species, params, cap_tips, jobs);
    }
}

/// Extrude one tube along its curve
fn build_tube(job: &TubeJob, params: &Tessellation) -> MeshBuffer {
    let mut mesh = MeshBuffer::new();
    let segments = params.segments;
    let radial = params.radial;
    let ring_len = radial + 1;

    let mut rotation = Quat::IDENTITY;
    let mut radius = job.radius;

    for i in 0..=segments {
        let t = i as f32 / segments as f32;
        let center = job.curve.point_at(t);
        // Degenerate tangent keeps the previous ring's orientation
        if let Some(tangent) = job.curve.tangent_at(t) {
            rotation = Quat::from_rotation_arc(Vec3::Y, tangent);
        }
        let v = job.v_start + job.curve.length_at(t) / params.tile_length;

        for j in 0..=radial {
            let u = j as f32 / radial as f32;
            let theta = u * TAU;
            let spoke = rotation * Vec3::new(theta.cos(), 0.0, theta.sin());
            mesh.add_vertex_uv(center + spoke * radius, (u, v), spoke);
        }

        radius = (radius * params.along_branch).max(params.min_radius);
    }

    for i in 0..segments {
        for j in 0..radial {
            let a = i * ring_len + j;
            let b = a + 1;
            let c = a + ring_len;
            let d = c + 1;
            mesh.add_triangle(a, c, b);
            mesh.add_triangle(b, c, d);
        }
    }

    if job.cap {
        let base = segments * ring_len;
        for j in 1..radial - 1 {
            mesh.add_triangle(base, base + j + 1, base + j);
        }
    }

    mesh.recompute_normals();
    weld_seam_normals(&mut mesh, segments + 1, radial);
    mesh
}

/// Give both copies of each ring's seam vertex the same normal
///
/// Face normals only reach the first copy from one side and the duplicate
/// from the other.
fn weld_seam_normals(mesh: &mut MeshBuffer, rings: u32, radial: u32) {
    let ring_len = (radial + 1) as usize;
    for ring in 0..rings as usize {
        let first = ring * ring_len;
        let last = first + radial as usize;
        let sum = Vec3::from(mesh.normals[first]) + Vec3::from(mesh.normals[last]);
        let normal = sum.normalize_or_zero().to_array();
        mesh.normals[first] = normal;
        mesh.normals[last] = normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::{BranchLevel, Interval, LeafParams, Materials, Shrink, Trunk};
    use std::sync::Arc;

    fn straight_skeleton(children: usize) -> Skeleton {
        let species = SpeciesSpec {
            name: "straight".to_string(),
            depth: 1,
            trunk: Trunk {
                start: Vec3::ZERO,
                end: Vec3::new(0.0, 10.0, 0.0),
                radius: 1.0,
            },
            levels: vec![
                BranchLevel::default(),
                BranchLevel {
                    count: children as u32,
                    length: Interval::exact(4.0),
                    fork: Interval::exact(0.5),
                    ..Default::default()
                },
            ],
            angle: 0.5,
            disturbance: 0.0,
            shrink: Shrink {
                along_branch: 0.9,
                per_level: 0.5,
            },
            segments: 4,
            leaves: LeafParams::default(),
            materials: Materials::default(),
        };
        let child = SkeletonNode {
            depth: 1,
            fork: 0.5,
            points: [
                Vec3::new(0.0, 5.0, 0.0),
                Vec3::new(2.0, 5.0, 0.0),
                Vec3::new(4.0, 5.0, 0.0),
            ],
            children: Vec::new(),
        };
        Skeleton {
            species: Arc::new(species),
            root: SkeletonNode {
                depth: 0,
                fork: 0.0,
                points: [Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 10.0, 0.0)],
                children: vec![child; children],
            },
        }
    }

    #[test]
    fn test_vertex_accounting() {
        let skeleton = straight_skeleton(3);
        let builder = BranchMeshBuilder::default();
        let mesh = builder.build(&skeleton);
        let per_node = builder.rings_per_node(&skeleton.species) * builder.vertices_per_ring();
        assert_eq!(per_node, 5 * 6);
        assert_eq!(mesh.vertex_count(), per_node * 4);
        assert_eq!(mesh.uvs.len(), mesh.vertex_count());
        assert_eq!(mesh.normals.len(), mesh.vertex_count());
        assert_eq!(mesh.indices.len() % 3, 0);
        assert_eq!(mesh.triangle_count(), 4 * 4 * 5 * 2);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn test_segment_override() {
        let skeleton = straight_skeleton(1);
        let coarse = BranchMeshBuilder::new(MeshOptions {
            segments: Some(2),
            ..Default::default()
        })
        .build(&skeleton);
        let fine = BranchMeshBuilder::new(MeshOptions {
            segments: Some(12),
            ..Default::default()
        })
        .build(&skeleton);
        assert_eq!(coarse.vertex_count(), 2 * 3 * 6);
        assert_eq!(fine.vertex_count(), 2 * 13 * 6);
    }

    #[test]
    fn test_ring_radius_and_taper() {
        let skeleton = straight_skeleton(1);
        let mesh = BranchMeshBuilder::default().build(&skeleton);
        // First trunk ring sits at radius 1 around the y axis
        for p in &mesh.positions[..6] {
            let radial = Vec3::new(p[0], 0.0, p[2]).length();
            assert!((radial - 1.0).abs() < 1e-4, "radius {}", radial);
            assert!(p[1].abs() < 1e-4);
        }
        // Second ring shrinks along the branch
        for p in &mesh.positions[6..12] {
            let radial = Vec3::new(p[0], 0.0, p[2]).length();
            assert!((radial - 0.9).abs() < 1e-4, "radius {}", radial);
        }
        // Child starts at half the trunk radius, ring in the YZ plane around +X
        let child_first = 5 * 6;
        for p in &mesh.positions[child_first..child_first + 6] {
            let radial = Vec3::new(0.0, p[1] - 5.0, p[2]).length();
            assert!((radial - 0.5).abs() < 1e-4, "radius {}", radial);
            assert!(p[0].abs() < 1e-4);
        }
    }

    #[test]
    fn test_radius_floor() {
        let skeleton = straight_skeleton(1);
        let mesh = BranchMeshBuilder::new(MeshOptions {
            min_radius: 0.95,
            ..Default::default()
        })
        .build(&skeleton);
        for p in &mesh.positions[..5 * 6] {
            let radial = Vec3::new(p[0], 0.0, p[2]).length();
            assert!(radial >= 0.95 - 1e-4, "radius {}", radial);
        }
        // Child radius 0.5 is raised to the floor as well
        let child_first = 5 * 6;
        let p = mesh.positions[child_first];
        let radial = Vec3::new(0.0, p[1] - 5.0, p[2]).length();
        assert!((radial - 0.95).abs() < 1e-4, "radius {}", radial);
    }

    #[test]
    fn test_uv_continues_into_children() {
        let skeleton = straight_skeleton(1);
        let mesh = BranchMeshBuilder::default().build(&skeleton);
        let first_trunk_v = mesh.uvs[0][1];
        let last_trunk_v = mesh.uvs[5 * 6 - 1][1];
        let first_child_v = mesh.uvs[5 * 6][1];
        assert!(first_trunk_v.abs() < 1e-6);
        assert!((last_trunk_v - 1.0).abs() < 1e-3);
        // Child forks at the trunk midpoint: 5 units of a 10-unit tile
        assert!((first_child_v - 0.5).abs() < 1e-3, "child v {}", first_child_v);
        // U wraps 0..1 around each ring
        assert_eq!(mesh.uvs[0][0], 0.0);
        assert_eq!(mesh.uvs[5][0], 1.0);
    }

    #[test]
    fn test_non_positive_tile_length_uses_trunk() {
        let skeleton = straight_skeleton(1);
        let trunk = BranchMeshBuilder::default().build(&skeleton);
        for tile in [0.0, -3.0] {
            let mesh = BranchMeshBuilder::new(MeshOptions {
                uv_tile_length: Some(tile),
                ..Default::default()
            })
            .build(&skeleton);
            assert_eq!(mesh.uvs, trunk.uvs, "tile {}", tile);
        }
    }

    #[test]
    fn test_seam_normals_match() {
        let skeleton = straight_skeleton(1);
        let mesh = BranchMeshBuilder::default().build(&skeleton);
        let ring_len = 6;
        for ring in 0..mesh.vertex_count() / ring_len {
            let first = mesh.normals[ring * ring_len];
            let last = mesh.normals[ring * ring_len + 5];
            assert_eq!(first, last, "ring {}", ring);
        }
        // Trunk seam faces +X, not one of its neighbouring faces
        let n = mesh.normals[0];
        assert!(n[0] > 0.95, "normal {:?}", n);
        assert!(n[2].abs() < 1e-3, "normal {:?}", n);
    }

    #[test]
    fn test_fan_cap_only_on_tips() {
        let skeleton = straight_skeleton(2);
        let open = BranchMeshBuilder::default().build(&skeleton);
        let capped = BranchMeshBuilder::new(MeshOptions {
            tip: TipCap::Fan,
            ..Default::default()
        })
        .build(&skeleton);
        assert_eq!(capped.vertex_count(), open.vertex_count());
        // Two tips, radial 5 → 3 fan triangles each
        assert_eq!(capped.triangle_count(), open.triangle_count() + 2 * 3);
    }

    #[test]
    fn test_degenerate_curve_is_finite() {
        let mut skeleton = straight_skeleton(0);
        skeleton.root.points = [Vec3::ONE; 3];
        let mesh = BranchMeshBuilder::default().build(&skeleton);
        assert_eq!(mesh.vertex_count(), 5 * 6);
        assert!(mesh.positions.iter().flatten().all(|c| c.is_finite()));
        assert!(mesh.uvs.iter().flatten().all(|c| c.is_finite()));
    }

    #[test]
    fn test_build_into_appends() {
        let skeleton = straight_skeleton(1);
        let builder = BranchMeshBuilder::default();
        let mut mesh = builder.build(&skeleton);
        let single = mesh.vertex_count();
        builder.build_into(&skeleton, &mut mesh);
        assert_eq!(mesh.vertex_count(), single * 2);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }
}
