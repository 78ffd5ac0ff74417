//! One-stop tree generation
//!
//! [`TreeBuilder`] wires the stages together: grow a [`Skeleton`], tessellate
//! its bark, place leaves. The two halves stay separately callable so a saved
//! skeleton can be re-meshed at a different resolution.

use std::sync::Arc;

use tracing::info;

use crate::boundary::Boundary;
use crate::error::SpeciesError;
use crate::leaves::{LeafBudget, LeafGeometry, LeafMode, LeafPlacer};
use crate::mesh::{BranchMeshBuilder, MeshBuffer, MeshOptions};
use crate::random::RandomSource;
use crate::skeleton::{Growth, Skeleton, SkeletonBuilder};
use crate::species::SpeciesSpec;

/// Bark mesh tagged with its material
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    pub mesh: MeshBuffer,
    pub material: String,
}

/// Leaf geometry tagged with its material
#[derive(Clone, Debug, PartialEq)]
pub struct LeafSurface {
    pub geometry: LeafGeometry,
    pub material: String,
}

/// Everything a renderer needs for one tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeGeometry {
    pub bark: Surface,
    pub leaves: LeafSurface,
    pub leaf_budget: LeafBudget,
}

/// Configured generator for one species
pub struct TreeBuilder<'a> {
    species: Arc<SpeciesSpec>,
    mesh: BranchMeshBuilder,
    leaf_mode: LeafMode,
    growth: Growth<'a>,
}

impl<'a> TreeBuilder<'a> {
    /// Validate `species` and create a builder with default options
    pub fn new(species: SpeciesSpec) -> Result<Self, SpeciesError> {
        species.validate()?;
        Ok(Self {
            species: Arc::new(species),
            mesh: BranchMeshBuilder::default(),
            leaf_mode: LeafMode::default(),
            growth: Growth::Free,
        })
    }

    pub fn species(&self) -> &SpeciesSpec {
        &self.species
    }

    pub fn with_mesh_options(mut self, options: MeshOptions) -> Self {
        self.mesh = BranchMeshBuilder::new(options);
        self
    }

    pub fn with_leaf_mode(mut self, mode: LeafMode) -> Self {
        self.leaf_mode = mode;
        self
    }

    /// Clip the outermost `levels` branch levels against `boundary`
    pub fn with_boundary(mut self, boundary: &'a dyn Boundary, levels: u32) -> Self {
        self.growth = Growth::Bounded { boundary, levels };
        self
    }

    pub fn build_skeleton<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Skeleton {
        SkeletonBuilder::new(Arc::clone(&self.species))
            .with_growth(self.growth)
            .build(rng)
    }

    /// Mesh `skeleton` and place its leaves
    ///
    /// Uses the skeleton's own species, so deserialized skeletons mesh the
    /// way they were grown.
    pub fn build_tree<R: RandomSource + ?Sized>(
        &self,
        skeleton: &Skeleton,
        rng: &mut R,
    ) -> TreeGeometry {
        let species = &*skeleton.species;
        let bark = self.mesh.build(skeleton);
        let (leaves, leaf_budget) = LeafPlacer::new(skeleton).build(self.leaf_mode, rng);

        info!(
            "Tree '{}': {} bark vertices, {} triangles, {}/{} leaves",
            species.name,
            bark.vertex_count(),
            bark.triangle_count(),
            leaf_budget.placed,
            leaf_budget.requested
        );

        TreeGeometry {
            bark: Surface {
                mesh: bark,
                material: species.materials.bark.clone(),
            },
            leaves: LeafSurface {
                geometry: leaves,
                material: species.materials.leaf.clone(),
            },
            leaf_budget,
        }
    }

    /// Grow a skeleton and mesh it in one go
    pub fn build<R: RandomSource + ?Sized>(&self, rng: &mut R) -> (Skeleton, TreeGeometry) {
        let skeleton = self.build_skeleton(rng);
        let tree = self.build_tree(&skeleton, rng);
        (skeleton, tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::Preset;
    use crate::random::seeded_rng;

    #[test]
    fn test_new_rejects_invalid_species() {
        let mut species = Preset::PlaneTree.species();
        species.depth = 0;
        assert!(matches!(
            TreeBuilder::new(species),
            Err(SpeciesError::ZeroDepth(0))
        ));
    }

    #[test]
    fn test_build_tags_materials() {
        let builder = TreeBuilder::new(Preset::RedMaple.species()).unwrap();
        let (_, tree) = builder.build(&mut seeded_rng(3));
        assert_eq!(tree.bark.material, "tree_base_standard");
        assert_eq!(tree.leaves.material, "leaf_red_maple");
        assert!(!tree.bark.mesh.is_empty());
    }

    #[test]
    fn test_leaf_mode_selects_geometry() {
        let builder = TreeBuilder::new(Preset::Osmanthus.species())
            .unwrap()
            .with_leaf_mode(LeafMode::Merged);
        let (_, tree) = builder.build(&mut seeded_rng(9));
        match &tree.leaves.geometry {
            LeafGeometry::Merged(leaves) => {
                assert_eq!(leaves.count, tree.leaf_budget.placed);
            }
            LeafGeometry::Instanced(_) => panic!("expected merged leaves"),
        }
    }

    #[test]
    fn test_same_seed_same_tree() {
        let builder = TreeBuilder::new(Preset::PagodaTree.species()).unwrap();
        let (a, tree_a) = builder.build(&mut seeded_rng(42));
        let (b, tree_b) = builder.build(&mut seeded_rng(42));
        assert_eq!(a.root, b.root);
        assert_eq!(tree_a, tree_b);
    }
}
