use crate::{
    calibration::{BiasEnd, CalibrationProfile, SeedInstruction, SeedRule},
    config::{Grade, Variant},
    geometry::GeometryDescriptor,
};
use serde::{Deserialize, Serialize};

use super::WorkspaceDirective;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerDiag {
    pub command: String,
    pub solver_version: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum TerminalState {
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub name: String,
    pub state: TerminalState,
}

impl JobOutcome {
    pub fn completed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: TerminalState::Completed,
        }
    }

    pub fn failed(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            state: TerminalState::Failed(reason.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == TerminalState::Completed
    }
}

/// Job submission settings passed through to the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    pub num_cpus: u32,
    pub memory_percent: u32,
}

/// Everything the driver script needs to build, mesh, load and submit one point.
#[derive(Debug, Clone, Serialize)]
pub struct BuildRequest<'a> {
    pub job_name: &'a str,
    pub variant: Variant,
    pub material_grade: Grade,
    pub part_name: &'a str,
    pub workspace: WorkspaceDirective,
    pub geometry: &'a GeometryDescriptor,
    pub calibration: &'a CalibrationProfile,
    /// Flaw-local seeding, followed by the profile's far-field seeding.
    pub seeds: Vec<SeedInstruction>,
    pub job: JobSettings,
}

impl<'a> BuildRequest<'a> {
    pub fn new(
        job_name: &'a str,
        material_grade: Grade,
        part_name: &'a str,
        workspace: WorkspaceDirective,
        geometry: &'a GeometryDescriptor,
        calibration: &'a CalibrationProfile,
        job: JobSettings,
    ) -> Self {
        let mut seeds = flaw_seeds(geometry);
        seeds.extend(calibration.seeds.iter().cloned());
        Self {
            job_name,
            variant: calibration.key.variant,
            material_grade,
            part_name,
            workspace,
            geometry,
            calibration,
            seeds,
            job,
        }
    }
}

/// Geometry-dependent seeding that concentrates elements at the crack tips.
pub fn flaw_seeds(g: &GeometryDescriptor) -> Vec<SeedInstruction> {
    let pipe = &g.pipe;
    let (ri, ro, z) = (pipe.inner_radius, pipe.outer_radius, pipe.axial_length);
    let mesh = pipe.mesh;

    let mut tips = Vec::new();
    let mut fronts = Vec::new();
    for c in &g.cracks {
        tips.push([pipe.crack_width, ri + c.depth + 0.00001, z]);
        tips.push([pipe.crack_width, ri + c.depth - 0.00001, z]);
        fronts.push([0.0, ri + c.depth, z - c.half_length]);
    }

    let mut seeds = vec![
        SeedInstruction {
            edges: tips,
            rule: SeedRule::Size {
                size: mesh.fine,
                deviation_factor: 0.8,
            },
        },
        SeedInstruction {
            edges: fronts,
            rule: SeedRule::DoubleBias {
                min_size: mesh.fine,
                max_size: mesh.fine * 2.0,
            },
        },
    ];

    let bias = |end| SeedRule::SingleBias {
        min_size: mesh.end,
        max_size: mesh.far,
        end,
    };
    match g.corrosion {
        Some(loss) => {
            seeds.push(SeedInstruction {
                edges: vec![[0.0, ri, z - 0.0001], [0.0001, ri, z]],
                rule: bias(BiasEnd::End2),
            });
            seeds.push(SeedInstruction {
                edges: vec![
                    [0.0001, ro, z - loss.width],
                    [0.0, ro - loss.height, z - 0.0001],
                    [0.0001, ro - loss.height, z],
                ],
                rule: SeedRule::Size {
                    size: 0.001,
                    deviation_factor: 0.1,
                },
            });
        }
        None => {
            seeds.push(SeedInstruction {
                edges: vec![
                    [0.0, ri, z - 0.0001],
                    [0.0, ro, z - 0.0001],
                    [0.0001, ri, z],
                ],
                rule: bias(BiasEnd::End2),
            });
            // The outer-face edge runs the other way round.
            seeds.push(SeedInstruction {
                edges: vec![[0.0001, ro, z]],
                rule: bias(BiasEnd::End1),
            });
        }
    }
    seeds
}

/// Last JSON line the driver prints on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverOut {
    pub ok: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SizeClass, Variant};
    use crate::geometry::{derive, FlawSample, PipeClass};

    fn single_bias(seeds: &[SeedInstruction], want: BiasEnd) -> Vec<[f64; 3]> {
        seeds
            .iter()
            .filter(|s| matches!(s.rule, SeedRule::SingleBias { end, .. } if end == want))
            .flat_map(|s| s.edges.iter().copied())
            .collect()
    }

    #[test]
    fn twin_crack_outer_partition_edge_is_biased_from_end1() {
        let pipe = PipeClass::resolve(Variant::TwinCrack, SizeClass::Small, SizeClass::Small);
        let g = derive(
            0,
            FlawSample::TwinCrack {
                crack_length_1: 0.0005,
                crack_length_2: 0.0005,
                ligament_1: 0.004,
                ligament_2: 0.004,
            },
            &pipe,
        );
        let (ri, ro, z) = (pipe.inner_radius, pipe.outer_radius, pipe.axial_length);
        let seeds = flaw_seeds(&g);

        assert_eq!(single_bias(&seeds, BiasEnd::End1), vec![[0.0001, ro, z]]);
        let end2 = single_bias(&seeds, BiasEnd::End2);
        assert_eq!(end2.len(), 3);
        assert!(end2.contains(&[0.0001, ri, z]));
        assert!(!end2.contains(&[0.0001, ro, z]));
    }

    #[test]
    fn crack_corrosion_partition_is_biased_from_end2_only() {
        let pipe = PipeClass::resolve(Variant::CrackCorrosion, SizeClass::Small, SizeClass::Small);
        let g = derive(
            0,
            FlawSample::CrackCorrosion {
                crack_length: 0.0015,
                ligament_2: 0.004,
                loss_height: 0.004,
            },
            &pipe,
        );
        let seeds = flaw_seeds(&g);
        assert!(single_bias(&seeds, BiasEnd::End1).is_empty());
        assert_eq!(single_bias(&seeds, BiasEnd::End2).len(), 2);
    }
}
