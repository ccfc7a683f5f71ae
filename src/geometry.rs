//! Geometry derivation.
//!
//! A grid point samples the independent flaw lengths; the outermost
//! ligament is always `thickness - consumed`, so the wall segments
//! partition the thickness by construction. Lengths are in metres.

use crate::{
    config::{SizeClass, Variant},
    doe::DoePoint,
    error::{ConfigError, GeometryError},
};
use serde::{Deserialize, Serialize};

/// Mesh size tiers handed to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshTiers {
    pub fine: f64,
    pub end: f64,
    pub far: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticMaterial {
    pub young_modulus: f64,
    pub poisson_ratio: f64,
    pub density: f64,
}

/// Fixed constants of the active pipe class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeClass {
    pub thickness_class: SizeClass,
    pub diameter_class: SizeClass,
    pub outer_radius: f64,
    pub thickness: f64,
    pub inner_radius: f64,
    pub axial_length: f64,
    /// Allowable combined flaw + sampled ligament length.
    pub max_length: f64,
    /// Axial offset of the partition near the crack.
    pub crack_partition: f64,
    pub crack_width: f64,
    pub loss_width: f64,
    pub mesh: MeshTiers,
    pub material: ElasticMaterial,
}

impl PipeClass {
    pub fn resolve(variant: Variant, thickness: SizeClass, diameter: SizeClass) -> Self {
        let outer_radius = match diameter {
            SizeClass::Small => 0.12,
            SizeClass::Large => 0.22,
        };
        let (wall, max_length) = match thickness {
            SizeClass::Small => (0.015, 0.014),
            SizeClass::Large => (0.025, 0.02),
        };
        let crack_partition = match (variant, thickness) {
            (Variant::CrackCorrosion, SizeClass::Small) => 0.019,
            (Variant::CrackCorrosion, SizeClass::Large) => 0.021,
            (Variant::TwinCrack, SizeClass::Small) => 0.014,
            (Variant::TwinCrack, SizeClass::Large) => 0.018,
        };
        Self {
            thickness_class: thickness,
            diameter_class: diameter,
            outer_radius,
            thickness: wall,
            inner_radius: outer_radius - wall,
            axial_length: 0.3,
            max_length,
            crack_partition,
            crack_width: 0.00025,
            loss_width: 0.015,
            mesh: MeshTiers {
                fine: 0.0002,
                end: 0.0005,
                far: 0.002,
            },
            material: ElasticMaterial {
                young_modulus: 210_000_000_000.0,
                poisson_ratio: 0.3,
                density: 7700.0,
            },
        }
    }

    pub fn outer_diameter_mm(&self) -> f64 {
        self.outer_radius * 2.0 * 1000.0
    }

    pub fn thickness_mm(&self) -> f64 {
        self.thickness * 1000.0
    }
}

/// Independent lengths sampled at one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum FlawSample {
    CrackCorrosion {
        /// Crack half-length.
        crack_length: f64,
        ligament_2: f64,
        loss_height: f64,
    },
    TwinCrack {
        crack_length_1: f64,
        crack_length_2: f64,
        ligament_1: f64,
        ligament_2: f64,
    },
}

impl FlawSample {
    pub fn from_point(variant: Variant, point: &DoePoint) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            point.get(name).ok_or_else(|| {
                ConfigError::invalid(format!("point {} has no value for `{name}`", point.index))
            })
        };
        Ok(match variant {
            Variant::CrackCorrosion => FlawSample::CrackCorrosion {
                crack_length: get("crack_length")?,
                ligament_2: get("ligament_2")?,
                loss_height: get("loss_height")?,
            },
            Variant::TwinCrack => FlawSample::TwinCrack {
                crack_length_1: get("crack_length_1")?,
                crack_length_2: get("crack_length_2")?,
                ligament_1: get("ligament_1")?,
                ligament_2: get("ligament_2")?,
            },
        })
    }
}

/// One through-wall segment, listed from the inner face outward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WallSegment {
    pub name: &'static str,
    pub length: f64,
    pub dependent: bool,
}

/// An embedded crack: half-length and centre depth from the inner face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrackPlacement {
    pub half_length: f64,
    pub depth: f64,
}

/// Outer-surface wall loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrosionPlacement {
    pub height: f64,
    /// Depth of the corrosion floor from the inner face.
    pub floor_depth: f64,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryDescriptor {
    pub index: usize,
    pub sample: FlawSample,
    pub pipe: PipeClass,
    pub segments: Vec<WallSegment>,
    pub cracks: Vec<CrackPlacement>,
    pub corrosion: Option<CorrosionPlacement>,
    /// Sum of every sampled segment.
    pub total_length: f64,
    pub dependent_ligament: f64,
    pub within_max_length: bool,
}

/// Derived-metrics row in display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub index: usize,
    pub values: Vec<f64>,
}

pub fn derive(index: usize, sample: FlawSample, pipe: &PipeClass) -> GeometryDescriptor {
    let thk = pipe.thickness;
    match sample {
        FlawSample::CrackCorrosion {
            crack_length,
            ligament_2,
            loss_height,
        } => {
            let total = crack_length * 2.0 + ligament_2 + loss_height;
            let ligament_1 = thk - total;
            GeometryDescriptor {
                index,
                sample,
                pipe: pipe.clone(),
                segments: vec![
                    segment("ligament_1", ligament_1, true),
                    segment("crack", crack_length * 2.0, false),
                    segment("ligament_2", ligament_2, false),
                    segment("loss_height", loss_height, false),
                ],
                cracks: vec![CrackPlacement {
                    half_length: crack_length,
                    depth: ligament_1 + crack_length,
                }],
                corrosion: Some(CorrosionPlacement {
                    height: loss_height,
                    floor_depth: thk - loss_height,
                    width: pipe.loss_width,
                }),
                total_length: total,
                dependent_ligament: ligament_1,
                within_max_length: total <= pipe.max_length,
            }
        }
        FlawSample::TwinCrack {
            crack_length_1,
            crack_length_2,
            ligament_1,
            ligament_2,
        } => {
            let total = crack_length_1 * 2.0 + crack_length_2 * 2.0 + ligament_1 + ligament_2;
            let ligament_3 = thk - total;
            GeometryDescriptor {
                index,
                sample,
                pipe: pipe.clone(),
                segments: vec![
                    segment("ligament_1", ligament_1, false),
                    segment("crack_1", crack_length_1 * 2.0, false),
                    segment("ligament_2", ligament_2, false),
                    segment("crack_2", crack_length_2 * 2.0, false),
                    segment("ligament_3", ligament_3, true),
                ],
                cracks: vec![
                    CrackPlacement {
                        half_length: crack_length_1,
                        depth: ligament_1 + crack_length_1,
                    },
                    CrackPlacement {
                        half_length: crack_length_2,
                        depth: ligament_1 + crack_length_1 * 2.0 + ligament_2 + crack_length_2,
                    },
                ],
                corrosion: None,
                total_length: total,
                dependent_ligament: ligament_3,
                within_max_length: total <= pipe.max_length,
            }
        }
    }
}

fn segment(name: &'static str, length: f64, dependent: bool) -> WallSegment {
    WallSegment {
        name,
        length,
        dependent,
    }
}

impl GeometryDescriptor {
    pub fn check_consistent(&self) -> Result<(), GeometryError> {
        if self.dependent_ligament > 0.0 {
            return Ok(());
        }
        let ligament = self
            .segments
            .iter()
            .find(|s| s.dependent)
            .map(|s| s.name)
            .unwrap_or("ligament");
        Err(GeometryError::NonPositiveLigament {
            ligament,
            value: self.dependent_ligament,
            thickness: self.pipe.thickness,
            consumed: self.total_length,
        })
    }

    /// Lengths are x1000 (mm); crack half-lengths are reported as full lengths (x2000).
    pub fn summary_row(&self) -> SummaryRow {
        let values = match self.sample {
            FlawSample::CrackCorrosion {
                crack_length,
                ligament_2,
                loss_height,
            } => vec![
                loss_height * 1000.0,
                crack_length * 2000.0,
                ligament_2 * 1000.0,
                self.dependent_ligament * 1000.0,
            ],
            FlawSample::TwinCrack {
                crack_length_1,
                crack_length_2,
                ligament_1,
                ligament_2,
            } => vec![
                crack_length_1 * 2000.0,
                crack_length_2 * 2000.0,
                ligament_1 * 1000.0,
                ligament_2 * 1000.0,
                self.dependent_ligament * 1000.0,
            ],
        };
        SummaryRow {
            index: self.index,
            values,
        }
    }

    /// Sum of every wall segment, dependent ligament included.
    pub fn wall_sum(&self) -> f64 {
        self.segments.iter().map(|s| s.length).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crack_corrosion_reference_point() {
        let pipe = PipeClass::resolve(Variant::CrackCorrosion, SizeClass::Large, SizeClass::Small);
        let g = derive(
            0,
            FlawSample::CrackCorrosion {
                crack_length: 0.0015,
                ligament_2: 0.004,
                loss_height: 0.004,
            },
            &pipe,
        );
        assert!((g.total_length - 0.011).abs() < 1e-15);
        assert!((g.dependent_ligament - 0.014).abs() < 1e-15);
        assert!((g.cracks[0].depth - 0.0155).abs() < 1e-15);
        assert!(g.within_max_length);
        assert!(g.check_consistent().is_ok());
        assert_eq!(g.summary_row().values.len(), 4);
    }

    #[test]
    fn twin_crack_depths_are_running_sums() {
        let pipe = PipeClass::resolve(Variant::TwinCrack, SizeClass::Small, SizeClass::Small);
        let g = derive(
            3,
            FlawSample::TwinCrack {
                crack_length_1: 0.001,
                crack_length_2: 0.0005,
                ligament_1: 0.002,
                ligament_2: 0.003,
            },
            &pipe,
        );
        assert!((g.cracks[0].depth - 0.003).abs() < 1e-15);
        assert!((g.cracks[1].depth - 0.0075).abs() < 1e-15);
        assert!((g.dependent_ligament - 0.007).abs() < 1e-15);
        assert_eq!(g.summary_row().index, 3);
    }

    #[test]
    fn overfull_wall_is_inconsistent() {
        let pipe = PipeClass::resolve(Variant::CrackCorrosion, SizeClass::Small, SizeClass::Small);
        let g = derive(
            0,
            FlawSample::CrackCorrosion {
                crack_length: 0.002,
                ligament_2: 0.005,
                loss_height: 0.008,
            },
            &pipe,
        );
        assert!(!g.within_max_length);
        assert!(matches!(
            g.check_consistent(),
            Err(GeometryError::NonPositiveLigament { ligament: "ligament_1", .. })
        ));
    }
}
