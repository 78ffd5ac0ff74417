//! Error types
//!
//! Species validation and loading, and curve construction. Depth termination, leaf-budget exhaustion and missing
//! boundary hits are ordinary return values, not errors.

use std::path::PathBuf;

use thiserror::Error;

/// Species description could not be loaded or failed validation
#[derive(Error, Debug)]
pub enum SpeciesError {
    /// Depth must be at least 1
    #[error("species depth must be >= 1 (got {0})")]
    ZeroDepth(u32),

    /// Depth exceeds the recursion cap
    #[error("species depth {depth} exceeds the maximum of {max}")]
    DepthTooLarge { depth: u32, max: u32 },

    /// A trunk level plus at least one branch level is required
    #[error("species needs at least 2 branch levels (got {0})")]
    TooFewLevels(usize),

    /// A level above the terminal depth spawns no children
    #[error("branch level {0} has a zero child count but is not the terminal level")]
    ZeroCount(usize),

    /// A range has `min > max` or lies outside its domain
    #[error("invalid range for {field}: [{min}, {max}]")]
    InvalidRange {
        field: &'static str,
        min: f32,
        max: f32,
    },

    /// A scalar parameter is out of its domain
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: f32 },

    /// Rings along a branch must be at least 1
    #[error("species segments must be >= 1")]
    ZeroSegments,

    /// Unknown preset name
    #[error("unknown species preset: {0}")]
    UnknownPreset(String),

    /// File extension is neither `.json` nor `.toml`
    #[error("unsupported species file format: {0:?} (use .json or .toml)")]
    UnsupportedFormat(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Curve construction failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveError {
    /// Interpolation needs at least three control points
    #[error("curve needs at least 3 control points (got {0})")]
    TooFewPoints(usize),
}
