//! Procedural tree synthesis
//!
//! Turns a species description into renderable tree geometry in three stages:
//! a recursive branching [`skeleton`](skeleton::Skeleton) of smooth curves,
//! a bark mesh of tapered tubes swept along those curves, and leaves placed
//! on the terminal branches either as instance transforms or merged into one
//! static mesh.
//!
//! # Example
//! ```no_run
//! use arbor::*;
//!
//! // Load a species and configure the builder
//! let species = SpeciesSpec::load("species/willow.toml".as_ref())?;
//! let builder = TreeBuilder::new(species)?
//!     .with_mesh_options(MeshOptions {
//!         radial_segments: 8,
//!         ..Default::default()
//!     })
//!     .with_leaf_mode(LeafMode::Merged);
//!
//! // Same seed, same tree
//! let mut rng = seeded_rng(7);
//! let (skeleton, tree) = builder.build(&mut rng);
//!
//! println!(
//!     "{} branches, {} bark triangles, {} leaves",
//!     skeleton.node_count(),
//!     tree.bark.mesh.triangle_count(),
//!     tree.leaf_budget.placed
//! );
//! # Ok::<(), arbor::SpeciesError>(())
//! ```
//!
//! # Bounded growth
//! ```no_run
//! use arbor::*;
//! use arbor::boundary::Sphere;
//! use glam::Vec3;
//!
//! let crown = Sphere {
//!     center: Vec3::new(0.0, 30.0, 0.0),
//!     radius: 15.0,
//! };
//! let builder = TreeBuilder::new(Preset::PlaneTree.species())?.with_boundary(&crown, 2);
//! let skeleton = builder.build_skeleton(&mut seeded_rng(1));
//! # Ok::<(), arbor::SpeciesError>(())
//! ```

pub mod boundary;
pub mod curve;
pub mod error;
pub mod leaves;
pub mod mesh;
pub mod presets;
pub mod random;
pub mod skeleton;
pub mod species;

mod builder;

pub use builder::{LeafSurface, Surface, TreeBuilder, TreeGeometry};
pub use error::{CurveError, SpeciesError};
pub use leaves::{LeafBudget, LeafGeometry, LeafInstance, LeafMode};
pub use mesh::{MeshBuffer, MeshOptions, TipCap};
pub use presets::Preset;
pub use random::{RandomSource, TreeRng, entropy_rng, seeded_rng};
pub use skeleton::{Skeleton, SkeletonNode};
pub use species::SpeciesSpec;
