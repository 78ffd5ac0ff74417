//! Species description
//!
//! A [`SpeciesSpec`] is the declarative archetype a tree is grown from: how
//! deep the branching recurses, how many children each level spawns and where
//! they fork, how long and how spread out they are, how the bark tapers, and
//! how many leaves to hang. It is loaded once, validated, and shared read-only
//! by every later stage.
//!
//! # Example (TOML)
//! ```toml
//! name = "sapling"
//! depth = 2
//! angle = 0.6
//! disturbance = 0.1
//!
//! [trunk]
//! start = [0.0, 0.0, 0.0]
//! end = [0.0, 20.0, 0.0]
//! radius = 1.5
//!
//! [[levels]]
//! fork = { min = 0.5, max = 0.9 }
//!
//! [[levels]]
//! count = 4
//! length = { min = 6.0, max = 9.0 }
//! fork = { min = 0.4, max = 0.9 }
//!
//! [[levels]]
//! count = 3
//! length = { min = 2.0, max = 3.0 }
//! fork = { min = 0.3, max = 1.0 }
//! ```

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::SpeciesError;

/// Deepest recursion a species may request
pub const MAX_DEPTH: u32 = 12;

/// Closed range `[min, max]`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Degenerate range holding a single value
    pub const fn exact(value: f32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    fn check(&self, field: &'static str, lower: f32, upper: f32) -> Result<(), SpeciesError> {
        let ordered = self.min <= self.max;
        let in_domain = self.min >= lower && self.max <= upper;
        if ordered && in_domain && self.min.is_finite() && self.max.is_finite() {
            Ok(())
        } else {
            Err(SpeciesError::InvalidRange {
                field,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// One level of the branching hierarchy
///
/// Level 0 describes the trunk; its `count` and `length` are unused. Level
/// `d + 1` describes the children spawned by every node at depth `d`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchLevel {
    /// Children spawned per parent node
    pub count: u32,
    /// Child branch length
    pub length: Interval,
    /// Fraction along the parent curve where children of this level fork off
    pub fork: Interval,
    /// Cone half-angle in radians (falls back to [`SpeciesSpec::angle`])
    pub angle: Option<f32>,
    /// Radius multiplier when descending into this level
    /// (falls back to [`Shrink::per_level`])
    pub taper: Option<f32>,
    /// Vertical bias of the midpoint disturbance; negative values sag
    pub gravity: Option<f32>,
}

impl Default for BranchLevel {
    fn default() -> Self {
        Self {
            count: 1,
            length: Interval::exact(1.0),
            fork: Interval::new(0.5, 1.0),
            angle: None,
            taper: None,
            gravity: None,
        }
    }
}

impl BranchLevel {
    /// Gravity strength if this level sags, `None` for isotropic disturbance
    pub fn gravity(&self) -> Option<f32> {
        self.gravity.filter(|g| *g != 0.0)
    }
}

/// Root segment of the tree
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trunk {
    pub start: Vec3,
    pub end: Vec3,
    /// Bark radius at the root
    pub radius: f32,
}

impl Default for Trunk {
    fn default() -> Self {
        Self {
            start: Vec3::ZERO,
            end: Vec3::new(0.0, 20.0, 0.0),
            radius: 1.0,
        }
    }
}

/// Radius reduction factors
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shrink {
    /// Multiplier between consecutive rings of one branch
    pub along_branch: f32,
    /// Multiplier between a parent branch and its children
    pub per_level: f32,
}

impl Default for Shrink {
    fn default() -> Self {
        Self {
            along_branch: 1.0,
            per_level: 0.6,
        }
    }
}

/// Shape of the leaf template mesh
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafStyle {
    /// Single blade folded along its midrib
    #[default]
    Blade,
    /// Two blades crossed at right angles
    Cross,
}

/// Leaf template geometry parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeafTemplate {
    pub style: LeafStyle,
    pub width: f32,
    pub height: f32,
    /// Fold angle of each blade half about the midrib, in radians
    pub fold: f32,
}

impl Default for LeafTemplate {
    fn default() -> Self {
        Self {
            style: LeafStyle::Blade,
            width: 1.0,
            height: 1.5,
            fold: 0.3,
        }
    }
}

/// Leaf density and scale
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeafParams {
    pub template: LeafTemplate,
    /// Placement attempts per terminal branch
    pub each: u32,
    /// Global leaf budget (hard cap)
    pub total: u32,
    /// Uniform scale applied to every leaf
    pub scale: f32,
}

impl Default for LeafParams {
    fn default() -> Self {
        Self {
            template: LeafTemplate::default(),
            each: 10,
            total: 1000,
            scale: 1.0,
        }
    }
}

/// Material identifiers handed through to the renderer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Materials {
    pub bark: String,
    pub leaf: String,
}

impl Default for Materials {
    fn default() -> Self {
        Self {
            bark: "tree_base_standard".to_string(),
            leaf: "leaf_base_standard".to_string(),
        }
    }
}

fn default_angle() -> f32 {
    0.5
}

fn default_segments() -> u32 {
    10
}

/// Complete tree archetype
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSpec {
    #[serde(default)]
    pub name: String,
    /// Deepest recursion level; nodes at this depth bear leaves
    pub depth: u32,
    #[serde(default)]
    pub trunk: Trunk,
    /// Level 0 is the trunk, level `d + 1` the children of depth-`d` nodes
    pub levels: Vec<BranchLevel>,
    /// Default cone half-angle in radians
    #[serde(default = "default_angle")]
    pub angle: f32,
    /// Curve waviness as a fraction of segment length
    #[serde(default)]
    pub disturbance: f32,
    #[serde(default)]
    pub shrink: Shrink,
    /// Default rings along each branch
    #[serde(default = "default_segments")]
    pub segments: u32,
    #[serde(default)]
    pub leaves: LeafParams,
    #[serde(default)]
    pub materials: Materials,
}

impl SpeciesSpec {
    /// Check every structural and numeric constraint
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), SpeciesError> {
        if self.depth == 0 {
            return Err(SpeciesError::ZeroDepth(self.depth));
        }
        if self.depth > MAX_DEPTH {
            return Err(SpeciesError::DepthTooLarge {
                depth: self.depth,
                max: MAX_DEPTH,
            });
        }
        if self.levels.len() < 2 {
            return Err(SpeciesError::TooFewLevels(self.levels.len()));
        }
        if self.segments == 0 {
            return Err(SpeciesError::ZeroSegments);
        }

        positive("trunk.radius", self.trunk.radius)?;
        non_negative("disturbance", self.disturbance)?;
        non_negative("angle", self.angle)?;
        positive("shrink.along_branch", self.shrink.along_branch)?;
        positive("shrink.per_level", self.shrink.per_level)?;
        positive("leaves.scale", self.leaves.scale)?;
        positive("leaves.template.width", self.leaves.template.width)?;
        positive("leaves.template.height", self.leaves.template.height)?;

        for (i, level) in self.levels.iter().enumerate() {
            level.fork.check("fork", 0.0, 1.0)?;
            if i == 0 {
                continue;
            }
            // Levels above the terminal depth must spawn children
            if level.count == 0 && i < self.depth as usize {
                return Err(SpeciesError::ZeroCount(i));
            }
            level.length.check("length", 0.0, f32::INFINITY)?;
            if let Some(angle) = level.angle {
                non_negative("level.angle", angle)?;
            }
            if let Some(taper) = level.taper {
                positive("level.taper", taper)?;
            }
        }
        Ok(())
    }

    /// Level spawning the children of a depth-`depth` node, if any
    pub fn child_level(&self, depth: u32) -> Option<&BranchLevel> {
        if depth >= self.depth {
            return None;
        }
        self.levels.get(depth as usize + 1)
    }

    /// Cone half-angle for `level`
    pub fn angle_for(&self, level: &BranchLevel) -> f32 {
        level.angle.unwrap_or(self.angle)
    }

    /// Cone half-angle used for leaves (the deepest configured level)
    pub fn leaf_angle(&self) -> f32 {
        self.levels
            .get(self.depth as usize)
            .or(self.levels.last())
            .map_or(self.angle, |level| self.angle_for(level))
    }

    /// Radius multiplier applied to depth-`depth` nodes relative to their parent
    pub fn taper_for(&self, depth: u32) -> f32 {
        self.levels
            .get(depth as usize)
            .and_then(|level| level.taper)
            .unwrap_or(self.shrink.per_level)
    }

    /// Parse and validate a JSON species description
    pub fn from_json_str(source: &str) -> Result<Self, SpeciesError> {
        let spec: Self = serde_json::from_str(source)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse and validate a TOML species description
    pub fn from_toml_str(source: &str) -> Result<Self, SpeciesError> {
        let spec: Self = toml::from_str(source)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load a species file, picking the format from its extension
    pub fn load(path: &Path) -> Result<Self, SpeciesError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        let source = std::fs::read_to_string(path)?;
        match ext.as_str() {
            "json" => Self::from_json_str(&source),
            "toml" => Self::from_toml_str(&source),
            _ => Err(SpeciesError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), SpeciesError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(SpeciesError::InvalidValue { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), SpeciesError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(SpeciesError::InvalidValue { field, value })
    }
}
