//! Leaf placement
//!
//! Leaves hang only on terminal branches (nodes at the species' maximum
//! depth). Each terminal branch gets up to `leaves.each` placements until the
//! global `leaves.total` budget is spent. A placement picks a point in the
//! outer 90% of the curve, tilts the local tangent inside the species cone,
//! aligns the leaf's +Y axis to that direction and spins it randomly about +Y.
//!
//! Placements flow into a [`LeafSink`]: [`InstancedLeaves`] keeps one shared
//! template plus a transform per leaf, [`MergedLeaves`] bakes a transformed
//! copy of the template per leaf into one static mesh.

use std::f32::consts::TAU;

use bytemuck::cast_slice;
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::curve::CurveSampler;
use crate::mesh::{MeshBuffer, generate_leaf};
use crate::random::RandomSource;
use crate::skeleton::{CURVE_DIVISIONS, Skeleton};

/// One placed leaf
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct LeafInstance {
    /// Translation × rotation × scale
    pub transform: Mat4,
}

impl LeafInstance {
    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }
}

/// Leaf output representation, chosen once per build
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafMode {
    /// One template mesh drawn once per transform
    #[default]
    Instanced,
    /// Every leaf baked into a single static mesh
    Merged,
}

/// Requested versus placed leaf count
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeafBudget {
    pub requested: u32,
    pub placed: u32,
}

impl LeafBudget {
    pub fn new(requested: u32) -> Self {
        Self {
            requested,
            placed: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.placed >= self.requested
    }

    pub fn remaining(&self) -> u32 {
        self.requested.saturating_sub(self.placed)
    }
}

/// Receiver of placed leaves (an instanced-draw primitive or a mesh baker)
pub trait LeafSink {
    /// Accept leaf number `index`
    fn push_leaf(&mut self, index: u32, leaf: LeafInstance);
}

/// Shared template plus per-leaf transforms
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstancedLeaves {
    pub template: MeshBuffer,
    pub instances: Vec<LeafInstance>,
}

impl InstancedLeaves {
    pub fn new(template: MeshBuffer) -> Self {
        Self {
            template,
            instances: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Column-major 4x4 matrices as raw bytes for an instance buffer
    pub fn instance_bytes(&self) -> &[u8] {
        cast_slice(&self.instances)
    }
}

impl LeafSink for InstancedLeaves {
    fn push_leaf(&mut self, index: u32, leaf: LeafInstance) {
        debug_assert_eq!(index as usize, self.instances.len());
        self.instances.push(leaf);
    }
}

/// Template copies baked into one mesh
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergedLeaves {
    template: MeshBuffer,
    pub mesh: MeshBuffer,
    pub count: u32,
}

impl MergedLeaves {
    pub fn new(template: MeshBuffer) -> Self {
        Self {
            template,
            mesh: MeshBuffer::new(),
            count: 0,
        }
    }
}

impl LeafSink for MergedLeaves {
    fn push_leaf(&mut self, _index: u32, leaf: LeafInstance) {
        self.mesh.append(&self.template.transformed(leaf.transform));
        self.count += 1;
    }
}

impl LeafSink for Vec<LeafInstance> {
    fn push_leaf(&mut self, _index: u32, leaf: LeafInstance) {
        self.push(leaf);
    }
}

// SAFETY: LeafInstance is #[repr(C)] around a single Mat4 (Pod via glam's bytemuck feature)
unsafe impl bytemuck::Zeroable for LeafInstance {}
unsafe impl bytemuck::Pod for LeafInstance {}

/// Leaves produced by one build
#[derive(Clone, Debug, PartialEq)]
pub enum LeafGeometry {
    Instanced(InstancedLeaves),
    Merged(MergedLeaves),
}

impl LeafGeometry {
    pub fn leaf_count(&self) -> usize {
        match self {
            LeafGeometry::Instanced(leaves) => leaves.len(),
            LeafGeometry::Merged(leaves) => leaves.count as usize,
        }
    }
}

/// Places leaves on a skeleton's terminal branches
pub struct LeafPlacer<'a> {
    skeleton: &'a Skeleton,
}

impl<'a> LeafPlacer<'a> {
    pub fn new(skeleton: &'a Skeleton) -> Self {
        Self { skeleton }
    }

    /// Template mesh for this species
    pub fn template(&self) -> MeshBuffer {
        let mut mesh: MeshBuffer = generate_leaf(&self.skeleton.species.leaves.template);
        mesh.recompute_normals();
        mesh
    }

    /// Feed every placement into `sink`, returning the budget outcome
    pub fn place<R, S>(&self, rng: &mut R, sink: &mut S) -> LeafBudget
    where
        R: RandomSource + ?Sized,
        S: LeafSink + ?Sized,
    {
        let species = &*self.skeleton.species;
        let params = &species.leaves;
        let angle = species.leaf_angle();
        let mut budget = LeafBudget::new(params.total);

        let terminals = self
            .skeleton
            .nodes()
            .filter(|node| node.depth == species.depth);

        'nodes: for node in terminals {
            let Ok(curve) = node.curve() else {
                continue;
            };
            for _ in 0..params.each {
                if budget.is_exhausted() {
                    break 'nodes;
                }
                let leaf = random_leaf(&curve, angle, params.scale, rng);
                sink.push_leaf(budget.placed, leaf);
                budget.placed += 1;
            }
        }

        debug!(
            "Placed {}/{} leaves on '{}'",
            budget.placed, budget.requested, species.name
        );
        budget
    }

    /// Build leaves in the requested output mode
    pub fn build<R: RandomSource + ?Sized>(
        &self,
        mode: LeafMode,
        rng: &mut R,
    ) -> (LeafGeometry, LeafBudget) {
        match mode {
            LeafMode::Instanced => {
                let mut leaves = InstancedLeaves::new(self.template());
                let budget = self.place(rng, &mut leaves);
                (LeafGeometry::Instanced(leaves), budget)
            }
            LeafMode::Merged => {
                let mut leaves = MergedLeaves::new(self.template());
                let budget = self.place(rng, &mut leaves);
                (LeafGeometry::Merged(leaves), budget)
            }
        }
    }
}

/// One leaf transform on `curve`
fn random_leaf<R: RandomSource + ?Sized>(
    curve: &CurveSampler,
    angle: f32,
    scale: f32,
    rng: &mut R,
) -> LeafInstance {
    let len = CURVE_DIVISIONS + 1;
    let lo = len as f32 / 10.0;
    let index = (rng.range(lo, len as f32).floor() as usize).min(CURVE_DIVISIONS);
    let t = index as f32 / CURVE_DIVISIONS as f32;

    let position = curve.point_at(t);
    let tangent = curve.tangent_at(t).unwrap_or(Vec3::Y);
    let direction = (tangent + rng.unit_vector() * angle.sin()).normalize_or(tangent);

    let spin = Quat::from_rotation_y(rng.next_f32() * TAU);
    let rotation = Quat::from_rotation_arc(Vec3::Y, direction) * spin;

    LeafInstance {
        transform: Mat4::from_scale_rotation_translation(Vec3::splat(scale), rotation, position),
    }
}
