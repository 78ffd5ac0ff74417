//! Built-in species catalog

use std::fmt;
use std::str::FromStr;

use glam::Vec3;

use crate::error::SpeciesError;
use crate::species::{
    BranchLevel, Interval, LeafParams, LeafStyle, LeafTemplate, Materials, Shrink, SpeciesSpec,
    Trunk,
};

/// Named species shipped with the library
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Broad, tall canopy with wide spreading limbs
    PlaneTree,
    /// Compact crown with drooping twigs
    RedMaple,
    /// Rounded crown, dense small leaves
    PagodaTree,
    /// Low shrub-like evergreen
    Osmanthus,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::PlaneTree,
        Preset::RedMaple,
        Preset::PagodaTree,
        Preset::Osmanthus,
    ];

    /// Kebab-case name used on the command line
    pub fn name(self) -> &'static str {
        match self {
            Preset::PlaneTree => "plane-tree",
            Preset::RedMaple => "red-maple",
            Preset::PagodaTree => "pagoda-tree",
            Preset::Osmanthus => "osmanthus",
        }
    }

    /// Look up a preset by name (case-insensitive, `_` and `-` interchangeable)
    pub fn from_name(name: &str) -> Result<Self, SpeciesError> {
        let wanted = name.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| SpeciesError::UnknownPreset(name.to_string()))
    }

    /// The species description for this preset
    pub fn species(self) -> SpeciesSpec {
        match self {
            Preset::PlaneTree => plane_tree(),
            Preset::RedMaple => red_maple(),
            Preset::PagodaTree => pagoda_tree(),
            Preset::Osmanthus => osmanthus(),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = SpeciesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

fn level(count: u32, length: (f32, f32), fork: (f32, f32)) -> BranchLevel {
    BranchLevel {
        count,
        length: Interval::new(length.0, length.1),
        fork: Interval::new(fork.0, fork.1),
        ..Default::default()
    }
}

fn plane_tree() -> SpeciesSpec {
    SpeciesSpec {
        name: Preset::PlaneTree.name().to_string(),
        depth: 4,
        trunk: Trunk {
            start: Vec3::ZERO,
            end: Vec3::new(0.0, 40.0, 0.0),
            radius: 2.5,
        },
        levels: vec![
            level(1, (40.0, 40.0), (0.5, 0.9)),
            level(5, (18.0, 24.0), (0.45, 0.95)),
            level(4, (8.0, 12.0), (0.3, 1.0)),
            level(3, (4.0, 6.0), (0.3, 1.0)),
            BranchLevel {
                gravity: Some(-0.5),
                ..level(3, (2.0, 3.0), (0.2, 1.0))
            },
        ],
        angle: 0.7,
        disturbance: 0.15,
        shrink: Shrink {
            along_branch: 0.97,
            per_level: 0.55,
        },
        segments: 10,
        leaves: LeafParams {
            template: LeafTemplate {
                style: LeafStyle::Blade,
                width: 1.2,
                height: 1.6,
                fold: 0.35,
            },
            each: 12,
            total: 3000,
            scale: 1.4,
        },
        materials: Materials::default(),
    }
}

fn red_maple() -> SpeciesSpec {
    SpeciesSpec {
        name: Preset::RedMaple.name().to_string(),
        depth: 3,
        trunk: Trunk {
            start: Vec3::ZERO,
            end: Vec3::new(0.0, 22.0, 0.0),
            radius: 1.4,
        },
        levels: vec![
            level(1, (22.0, 22.0), (0.4, 0.9)),
            BranchLevel {
                angle: Some(0.9),
                ..level(6, (9.0, 13.0), (0.4, 0.95))
            },
            BranchLevel {
                gravity: Some(-0.6),
                ..level(4, (4.0, 6.0), (0.3, 1.0))
            },
            BranchLevel {
                gravity: Some(-1.0),
                taper: Some(0.5),
                ..level(3, (1.5, 2.5), (0.3, 1.0))
            },
        ],
        angle: 0.6,
        disturbance: 0.2,
        shrink: Shrink {
            along_branch: 0.95,
            per_level: 0.6,
        },
        segments: 8,
        leaves: LeafParams {
            template: LeafTemplate {
                style: LeafStyle::Cross,
                width: 1.0,
                height: 1.0,
                fold: 0.2,
            },
            each: 10,
            total: 1500,
            scale: 1.0,
        },
        materials: Materials {
            bark: "tree_base_standard".to_string(),
            leaf: "leaf_red_maple".to_string(),
        },
    }
}

fn pagoda_tree() -> SpeciesSpec {
    SpeciesSpec {
        name: Preset::PagodaTree.name().to_string(),
        depth: 4,
        trunk: Trunk {
            start: Vec3::ZERO,
            end: Vec3::new(0.0, 26.0, 0.0),
            radius: 1.8,
        },
        levels: vec![
            level(1, (26.0, 26.0), (0.5, 0.9)),
            level(4, (12.0, 16.0), (0.5, 1.0)),
            level(3, (6.0, 8.0), (0.4, 1.0)),
            level(3, (3.0, 4.0), (0.3, 1.0)),
            level(2, (1.5, 2.0), (0.3, 1.0)),
        ],
        angle: 0.55,
        disturbance: 0.1,
        shrink: Shrink {
            along_branch: 0.98,
            per_level: 0.6,
        },
        segments: 8,
        leaves: LeafParams {
            template: LeafTemplate {
                style: LeafStyle::Blade,
                width: 0.6,
                height: 0.9,
                fold: 0.25,
            },
            each: 16,
            total: 2500,
            scale: 1.0,
        },
        materials: Materials::default(),
    }
}

fn osmanthus() -> SpeciesSpec {
    SpeciesSpec {
        name: Preset::Osmanthus.name().to_string(),
        depth: 3,
        trunk: Trunk {
            start: Vec3::ZERO,
            end: Vec3::new(0.0, 6.0, 0.0),
            radius: 0.6,
        },
        levels: vec![
            level(1, (6.0, 6.0), (0.2, 0.6)),
            BranchLevel {
                angle: Some(1.0),
                ..level(7, (4.0, 6.0), (0.2, 0.8))
            },
            level(4, (2.0, 3.0), (0.3, 1.0)),
            level(3, (1.0, 1.5), (0.3, 1.0)),
        ],
        angle: 0.65,
        disturbance: 0.25,
        shrink: Shrink {
            along_branch: 0.96,
            per_level: 0.65,
        },
        segments: 6,
        leaves: LeafParams {
            template: LeafTemplate {
                style: LeafStyle::Blade,
                width: 0.5,
                height: 0.8,
                fold: 0.4,
            },
            each: 8,
            total: 1200,
            scale: 0.8,
        },
        materials: Materials::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_validate() {
        for preset in Preset::ALL {
            preset
                .species()
                .validate()
                .unwrap_or_else(|e| panic!("{} invalid: {}", preset, e));
        }
    }

    #[test]
    fn test_from_name_variants() {
        assert_eq!(Preset::from_name("plane-tree").unwrap(), Preset::PlaneTree);
        assert_eq!(Preset::from_name("Red_Maple").unwrap(), Preset::RedMaple);
        assert_eq!("osmanthus".parse::<Preset>().unwrap(), Preset::Osmanthus);
        assert!(matches!(
            Preset::from_name("baobab"),
            Err(SpeciesError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_names_round_trip() {
        for preset in Preset::ALL {
            assert_eq!(Preset::from_name(preset.name()).unwrap(), preset);
            assert_eq!(preset.species().name, preset.name());
        }
    }
}
