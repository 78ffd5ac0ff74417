//! arbor - procedural tree generator
//!
//! Grows a species (built-in preset or TOML/JSON file) into a branching
//! skeleton, meshes it and exports OBJ geometry.

mod obj;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arbor::{
    LeafMode, MeshOptions, Preset, Skeleton, SpeciesSpec, TipCap, TreeBuilder, TreeGeometry,
    seeded_rng,
};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Procedural tree generator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grow and mesh a tree
    Generate {
        /// Species file (.toml or .json)
        species: Option<PathBuf>,

        /// Built-in species to use instead of a file
        #[arg(short, long, conflicts_with = "species")]
        preset: Option<String>,

        /// Write the skeleton as JSON
        #[arg(long)]
        skeleton: Option<PathBuf>,

        #[command(flatten)]
        mesh: MeshArgs,
    },

    /// Mesh a previously saved skeleton
    Mesh {
        /// Skeleton JSON written by `generate --skeleton`
        skeleton: PathBuf,

        #[command(flatten)]
        mesh: MeshArgs,
    },

    /// Validate a species file without generating
    Check {
        /// Species file (.toml or .json)
        species: PathBuf,
    },

    /// List built-in species
    Presets,
}

#[derive(Args)]
struct MeshArgs {
    /// Random seed (default: random)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Rings along each branch (overrides the species)
    #[arg(long)]
    segments: Option<u32>,

    /// Vertices around each branch
    #[arg(long, default_value_t = 5)]
    radial: u32,

    /// Bake leaves into one mesh instead of instancing
    #[arg(long)]
    merge_leaves: bool,

    /// Close branch tips
    #[arg(long)]
    cap: bool,

    /// Output OBJ file
    #[arg(short, long)]
    obj: Option<PathBuf>,
}

impl MeshArgs {
    fn options(&self) -> MeshOptions {
        MeshOptions {
            segments: self.segments,
            radial_segments: self.radial,
            tip: if self.cap { TipCap::Fan } else { TipCap::Open },
            ..Default::default()
        }
    }

    fn leaf_mode(&self) -> LeafMode {
        if self.merge_leaves {
            LeafMode::Merged
        } else {
            LeafMode::Instanced
        }
    }

    fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            species,
            preset,
            skeleton,
            mesh,
        } => {
            let species = load_species(species.as_deref(), preset.as_deref())?;
            let builder = TreeBuilder::new(species)?
                .with_mesh_options(mesh.options())
                .with_leaf_mode(mesh.leaf_mode());

            let seed = mesh.seed();
            tracing::info!("Growing '{}' with seed {}", builder.species().name, seed);
            let mut rng = seeded_rng(seed);
            let (tree_skeleton, tree) = builder.build(&mut rng);
            tracing::info!(
                "Skeleton: {} branches, {} tips, depth {}",
                tree_skeleton.node_count(),
                tree_skeleton.terminal_count(),
                tree_skeleton.max_depth()
            );

            if let Some(path) = skeleton {
                fs::write(&path, tree_skeleton.to_json()?)
                    .with_context(|| format!("Failed to write {:?}", path))?;
                tracing::info!("Wrote skeleton {:?}", path);
            }
            export(&tree, mesh.obj.as_deref())?;
        }

        Commands::Mesh { skeleton, mesh } => {
            let source = fs::read_to_string(&skeleton)
                .with_context(|| format!("Failed to read {:?}", skeleton))?;
            let tree_skeleton = Skeleton::from_json(&source)
                .with_context(|| format!("Invalid skeleton {:?}", skeleton))?;

            let builder = TreeBuilder::new((*tree_skeleton.species).clone())?
                .with_mesh_options(mesh.options())
                .with_leaf_mode(mesh.leaf_mode());

            let seed = mesh.seed();
            tracing::info!("Meshing {:?} with seed {}", skeleton, seed);
            let tree = builder.build_tree(&tree_skeleton, &mut seeded_rng(seed));
            export(&tree, mesh.obj.as_deref())?;
        }

        Commands::Check { species } => {
            tracing::info!("Checking species {:?}", species);
            let spec = SpeciesSpec::load(&species)
                .with_context(|| format!("Invalid species {:?}", species))?;
            tracing::info!(
                "Species '{}' is valid: depth {}, {} levels",
                spec.name,
                spec.depth,
                spec.levels.len()
            );
        }

        Commands::Presets => {
            for preset in Preset::ALL {
                let spec = preset.species();
                println!(
                    "{:<12} depth {}, {} leaves max",
                    preset.name(),
                    spec.depth,
                    spec.leaves.total
                );
            }
        }
    }

    Ok(())
}

/// Species from a file, a named preset, or the default preset
fn load_species(path: Option<&Path>, preset: Option<&str>) -> Result<SpeciesSpec> {
    if let Some(path) = path {
        return SpeciesSpec::load(path).with_context(|| format!("Failed to load {:?}", path));
    }
    let preset = match preset {
        Some(name) => Preset::from_name(name)?,
        None => Preset::PlaneTree,
    };
    Ok(preset.species())
}

fn export(tree: &TreeGeometry, obj: Option<&Path>) -> Result<()> {
    match obj {
        Some(path) => {
            obj::write_obj(tree, path).with_context(|| format!("Failed to write {:?}", path))?;
            tracing::info!("Wrote {:?}", path);
        }
        None => tracing::info!("No --obj given, geometry not written"),
    }
    Ok(())
}
