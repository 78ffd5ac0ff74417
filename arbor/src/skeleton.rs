//! Branching skeleton
//!
//! The skeleton is the only artifact shared between the bark and leaf passes:
//! a tree of 3-point curves (start, disturbed midpoint, end), each owned by
//! its parent. It is immutable once built and serializes to JSON so it can be
//! cached and meshed later at a different resolution.

use std::f32::consts::TAU;
use std::sync::Arc;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::boundary::Boundary;
use crate::curve::CurveSampler;
use crate::error::{CurveError, SpeciesError};
use crate::random::RandomSource;
use crate::species::{BranchLevel, SpeciesSpec};

/// Points sampled along a parent curve when picking fork positions
pub const CURVE_DIVISIONS: usize = 50;

/// Retry cap for the sibling-spread rejection sampler
pub const MAX_SPREAD_ATTEMPTS: u32 = 100;

/// Default number of levels above the terminal depth that boundary clipping affects
pub const DEFAULT_CLIP_LEVELS: u32 = 2;

/// One branch segment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkeletonNode {
    /// Recursion depth (0 for the trunk)
    pub depth: u32,
    /// Parameter on the parent curve where this branch forks off (0 for the trunk)
    pub fork: f32,
    /// Start, disturbed midpoint, end
    pub points: [Vec3; 3],
    pub children: Vec<SkeletonNode>,
}

impl SkeletonNode {
    /// Interpolating curve through this node's points
    pub fn curve(&self) -> Result<CurveSampler, CurveError> {
        CurveSampler::new(&self.points)
    }

    pub fn start(&self) -> Vec3 {
        self.points[0]
    }

    pub fn end(&self) -> Vec3 {
        self.points[2]
    }

    /// Whether this node bears no children
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth-first (pre-order) traversal of this subtree
    pub fn iter(&self) -> Nodes<'_> {
        Nodes { stack: vec![self] }
    }
}

/// Pre-order iterator over a skeleton subtree
pub struct Nodes<'a> {
    stack: Vec<&'a SkeletonNode>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a SkeletonNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A built skeleton together with the species it was grown from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    pub species: Arc<SpeciesSpec>,
    pub root: SkeletonNode,
}

impl Skeleton {
    /// Depth-first traversal starting at the trunk
    pub fn nodes(&self) -> Nodes<'_> {
        self.root.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    /// Deepest node depth present
    pub fn max_depth(&self) -> u32 {
        self.nodes().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Nodes at the species' terminal depth (the leaf-bearing segments)
    pub fn terminal_count(&self) -> usize {
        self.nodes()
            .filter(|n| n.depth == self.species.depth)
            .count()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a saved skeleton and validate the species it carries
    pub fn from_json(source: &str) -> Result<Self, SpeciesError> {
        let skeleton: Self = serde_json::from_str(source)?;
        skeleton.species.validate()?;
        Ok(skeleton)
    }
}

/// How branch ends near the canopy are chosen
#[derive(Clone, Copy, Default)]
pub enum Growth<'a> {
    /// Random lengths everywhere
    #[default]
    Free,
    /// Cast rays against `boundary` for the last `levels` levels above the
    /// terminal depth
    Bounded {
        boundary: &'a dyn Boundary,
        levels: u32,
    },
}

impl<'a> Growth<'a> {
    /// Clip against `boundary` with the default level window
    pub fn bounded(boundary: &'a dyn Boundary) -> Self {
        Self::Bounded {
            boundary,
            levels: DEFAULT_CLIP_LEVELS,
        }
    }

    /// Boundary to query for children of a depth-`depth` parent, if any
    fn boundary_for(&self, depth: u32, max_depth: u32) -> Option<&'a dyn Boundary> {
        match *self {
            Growth::Free => None,
            Growth::Bounded { boundary, levels } => {
                (depth + levels >= max_depth).then_some(boundary)
            }
        }
    }
}

/// Grows a [`Skeleton`] from a species description
pub struct SkeletonBuilder<'a> {
    species: Arc<SpeciesSpec>,
    growth: Growth<'a>,
}

impl<'a> SkeletonBuilder<'a> {
    /// The species must already be validated
    pub fn new(species: Arc<SpeciesSpec>) -> Self {
        Self {
            species,
            growth: Growth::Free,
        }
    }

    pub fn with_growth(mut self, growth: Growth<'a>) -> Self {
        self.growth = growth;
        self
    }

    /// Grow a skeleton, drawing every random choice from `rng`
    pub fn build<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Skeleton {
        let trunk = &self.species.trunk;
        let root = self.grow(
            trunk.start,
            trunk.end,
            0,
            0.0,
            self.species.disturbance,
            rng,
        );

        let skeleton = Skeleton {
            species: Arc::clone(&self.species),
            root,
        };
        debug!(
            "Built skeleton '{}': {} nodes, {} terminal",
            self.species.name,
            skeleton.node_count(),
            skeleton.terminal_count()
        );
        skeleton
    }

    fn grow<R: RandomSource + ?Sized>(
        &self,
        start: Vec3,
        end: Vec3,
        depth: u32,
        fork: f32,
        disturbance: f32,
        rng: &mut R,
    ) -> SkeletonNode {
        let species = &*self.species;
        let disturbance = if depth == species.depth {
            0.0
        } else {
            disturbance
        };
        let gravity = species
            .levels
            .get(depth as usize)
            .and_then(BranchLevel::gravity);

        let points = disturbed_points(start, end, disturbance, gravity, rng);
        let mut node = SkeletonNode {
            depth,
            fork,
            points,
            children: Vec::new(),
        };

        let Some(level) = species.child_level(depth) else {
            return node;
        };
        if level.count == 0 {
            return node;
        }

        let curve = match CurveSampler::new(&points) {
            Ok(curve) => curve,
            Err(_) => return node,
        };
        let samples = curve.sample_points(CURVE_DIVISIONS);
        let tangent = curve.tangent_at(0.5).unwrap_or(Vec3::Y);
        let mut direction = spread_direction(tangent, species.angle_for(level), rng);

        let sibling_turn = Quat::from_axis_angle(tangent, TAU / level.count as f32);
        let boundary = self.growth.boundary_for(depth, species.depth);

        node.children.reserve(level.count as usize);
        for i in 0..level.count {
            let index = fork_index(rng.range(level.fork.min, level.fork.max), samples.len());
            let child_fork = index as f32 / CURVE_DIVISIONS as f32;
            let child_start = samples[index];

            if i > 0 {
                direction = (sibling_turn * direction).normalize_or(tangent);
            }

            let hit = boundary.and_then(|b| b.intersect(child_start, direction));
            let child_end = match hit {
                Some(point) => {
                    trace!("Branch at depth {} clipped at {:?}", depth + 1, point);
                    point
                }
                None => child_start + direction * rng.range(level.length.min, level.length.max),
            };

            node.children.push(self.grow(
                child_start,
                child_end,
                depth + 1,
                child_fork,
                disturbance,
                rng,
            ));
        }
        node
    }
}

/// Start, disturbed midpoint and end of a branch curve
///
/// The midpoint offset scales with the segment length. With gravity the
/// vertical component is biased by `gravity` instead of jittering
/// symmetrically.
fn disturbed_points<R: RandomSource + ?Sized>(
    start: Vec3,
    end: Vec3,
    disturbance: f32,
    gravity: Option<f32>,
    rng: &mut R,
) -> [Vec3; 3] {
    let mid = (start + end) * 0.5;
    if disturbance == 0.0 {
        return [start, mid, end];
    }

    let l = start.distance(end) * disturbance;
    let x = rng.range(-l, l);
    let y = match gravity {
        Some(g) => rng.next_f32() * l * g,
        None => rng.range(-l, l),
    };
    let z = rng.range(-l, l);
    [start, mid + Vec3::new(x, y, z), end]
}

/// Perturb `tangent` inside a cone, rejecting samples too close to the axis
///
/// Keeps sampling until the deviation exceeds half the cone angle so sibling
/// branches spread apart. Falls back to the last sample after
/// [`MAX_SPREAD_ATTEMPTS`] tries.
fn spread_direction<R: RandomSource + ?Sized>(tangent: Vec3, angle: f32, rng: &mut R) -> Vec3 {
    let magnitude = angle.sin();
    let mut direction = tangent;
    for _ in 0..MAX_SPREAD_ATTEMPTS {
        direction = (tangent + rng.unit_vector() * magnitude).normalize_or(tangent);
        if tangent.angle_between(direction) >= angle * 0.5 {
            return direction;
        }
    }
    warn!(
        "Branch spread sampling hit {} attempts (angle {:.3}), using last sample",
        MAX_SPREAD_ATTEMPTS, angle
    );
    direction
}

/// Sample index for a fork fraction over `len` curve points
fn fork_index(fraction: f32, len: usize) -> usize {
    ((len as f32 * fraction).floor() as usize).min(len - 1)
}
