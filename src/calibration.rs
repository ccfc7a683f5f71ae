//! Calibration profiles keyed by discrete pipe class.
//!
//! Anchor points partition the z-symmetry face in line with the flaw; the
//! far-field seeding coarsens the mesh away from the flaw. Locators are
//! points on the target edge in model coordinates (metres).

use crate::{
    config::{Grade, SizeClass, Variant},
    error::ConfigError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalibrationKey {
    pub variant: Variant,
    pub thickness_class: SizeClass,
    pub diameter_class: SizeClass,
    /// `None` for variants whose calibration ignores the grade.
    pub grade: Option<Grade>,
}

impl CalibrationKey {
    /// Normalizes the grade away for variants that do not use it.
    pub fn new(variant: Variant, thickness: SizeClass, diameter: SizeClass, grade: Grade) -> Self {
        Self {
            variant,
            thickness_class: thickness,
            diameter_class: diameter,
            grade: variant.uses_grade().then_some(grade),
        }
    }

    /// Every key a campaign config can produce.
    pub fn reachable() -> Vec<CalibrationKey> {
        let mut keys = Vec::new();
        for variant in Variant::ALL {
            for thickness in SizeClass::ALL {
                for diameter in SizeClass::ALL {
                    for grade in Grade::ALL {
                        let key = CalibrationKey::new(variant, thickness, diameter, grade);
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                }
            }
        }
        keys
    }
}

impl fmt::Display for CalibrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} thickness={} diameter={}",
            self.variant, self.thickness_class, self.diameter_class
        )?;
        if let Some(g) = self.grade {
            write!(f, " grade={g}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeedRule {
    /// Fixed element count per edge.
    Number { count: u32 },
    /// Target element size.
    Size { size: f64, deviation_factor: f64 },
    /// Single bias measured from `end` of each edge.
    SingleBias {
        min_size: f64,
        max_size: f64,
        end: BiasEnd,
    },
    /// Bias toward both ends.
    DoubleBias { min_size: f64, max_size: f64 },
}

/// Edge end selector for single-bias seeding, in the edge's own orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasEnd {
    End1,
    End2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedInstruction {
    pub edges: Vec<[f64; 3]>,
    pub rule: SeedRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub key: CalibrationKey,
    /// Far end of the partition line drawn from the origin on the z-symmetry face.
    pub anchor_point: [f64; 2],
    /// Edge extruded to partition the cells axially.
    pub anchor_edge: [f64; 3],
    /// Pressure of the first load step (Pa).
    pub pressure_stage_1: f64,
    /// Pressure of the second load step (Pa).
    pub pressure_stage_2: f64,
    pub seeds: Vec<SeedInstruction>,
}

#[derive(Debug, Clone)]
pub struct CalibrationTable {
    profiles: BTreeMap<CalibrationKey, CalibrationProfile>,
}

impl CalibrationTable {
    pub fn from_profiles(profiles: Vec<CalibrationProfile>) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for p in profiles {
            if p.pressure_stage_1 <= 0.0 || p.pressure_stage_2 <= p.pressure_stage_1 {
                return Err(ConfigError::invalid(format!(
                    "pressure stages must satisfy 0 < p1 < p2 for {}",
                    p.key
                )));
            }
            let key = p.key;
            if map.insert(key, p).is_some() {
                return Err(ConfigError::invalid(format!("duplicate calibration for {key}")));
            }
        }
        Ok(Self { profiles: map })
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        let table = Self::from_profiles(builtin_profiles())?;
        table.verify_complete()?;
        Ok(table)
    }

    /// Every reachable key must have a profile.
    pub fn verify_complete(&self) -> Result<(), ConfigError> {
        let missing: Vec<String> = CalibrationKey::reachable()
            .into_iter()
            .filter(|k| !self.profiles.contains_key(k))
            .map(|k| k.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCalibration(missing.join("; ")))
        }
    }

    pub fn lookup(&self, key: &CalibrationKey) -> Result<&CalibrationProfile, ConfigError> {
        self.profiles
            .get(key)
            .ok_or_else(|| ConfigError::MissingCalibration(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

const Z_END: f64 = 0.3;

fn by_number(count: u32, edges: &[[f64; 3]]) -> SeedInstruction {
    SeedInstruction {
        edges: edges.to_vec(),
        rule: SeedRule::Number { count },
    }
}

struct ClassData {
    anchor_point: [f64; 2],
    anchor_edge: [f64; 2],
    seeds: Vec<SeedInstruction>,
}

impl ClassData {
    fn profile(&self, key: CalibrationKey, p1: f64, p2: f64) -> CalibrationProfile {
        CalibrationProfile {
            key,
            anchor_point: self.anchor_point,
            anchor_edge: [self.anchor_edge[0], self.anchor_edge[1], Z_END],
            pressure_stage_1: p1,
            pressure_stage_2: p2,
            seeds: self.seeds.clone(),
        }
    }
}

fn builtin_profiles() -> Vec<CalibrationProfile> {
    use Grade::*;
    use SizeClass::{Large, Small};
    use Variant::*;

    let mut out = Vec::new();

    for grade in Grade::ALL {
        let (p1, p2) = match grade {
            X42 => (40.0e6, 60.0e6),
            X65 => (58.5e6, 78.0e6),
            X100 => (90.0e6, 110.0e6),
        };
        let key = CalibrationKey::new(CrackCorrosion, Small, Small, grade);
        out.push(cw_small_small().profile(key, p1, p2));

        // Outside the small/small class the grade only changes the hardening table.
        let key = CalibrationKey::new(CrackCorrosion, Small, Large, grade);
        out.push(cw_small_large().profile(key, 31.5e6, 42.0e6));
        let key = CalibrationKey::new(CrackCorrosion, Large, Small, grade);
        out.push(cw_large_small().profile(key, 112.0e6, 140.0e6));
        let key = CalibrationKey::new(CrackCorrosion, Large, Large, grade);
        out.push(cw_large_large().profile(key, 57.6e6, 72.0e6));
    }

    let key = CalibrationKey::new(TwinCrack, Small, Small, X65);
    out.push(cc_small_small().profile(key, 73.5e6, 79.0e6));
    let key = CalibrationKey::new(TwinCrack, Small, Large, X65);
    out.push(cc_small_large().profile(key, 38.0e6, 42.0e6));
    let key = CalibrationKey::new(TwinCrack, Large, Small, X65);
    out.push(cc_large_small().profile(key, 112.0e6, 140.0e6));
    let key = CalibrationKey::new(TwinCrack, Large, Large, X65);
    out.push(cc_large_large().profile(key, 57.6e6, 72.0e6));

    out
}

fn cw_small_small() -> ClassData {
    ClassData {
        anchor_point: [0.0193620651670132, 0.125515379266719],
        anchor_edge: [0.017624, 0.114249],
        seeds: vec![
            by_number(3, &[
                [0.016008, 0.103773, 0.28575], [0.01658, 0.107479, 0.3],
                [0.018295, 0.118597, 0.29525], [0.017723, 0.114891, 0.0],
                [0.105, 0.0, 0.28575], [0.013745, 0.11921, 0.281],
                [0.0, 0.10875, 0.281], [0.004017, 0.104923, 0.281],
                [0.004591, 0.119912, 0.0], [0.10875, 0.0, 0.0],
                [0.10875, 0.0, 0.281], [0.12, 0.0, 0.28575],
                [0.004017, 0.104923, 0.0], [0.11625, 0.0, 0.3],
                [0.0, 0.11625, 0.0],
            ]),
            by_number(10, &[
                [0.016008, 0.103773, 0.07025], [0.018295, 0.118597, 0.21075],
                [0.051028, 0.091767, 0.281], [0.098473, 0.036441, 0.3],
                [0.051028, 0.091767, 0.0], [0.105, 0.0, 0.07025],
                [0.0, 0.12, 0.07025], [0.058318, 0.104876, 0.0],
                [0.112541, 0.041647, 0.281], [0.12, 0.0, 0.07025],
                [0.058318, 0.104876, 0.3], [0.0, 0.105, 0.07025],
            ]),
        ],
    }
}

fn cw_small_large() -> ClassData {
    ClassData {
        anchor_point: [0.0189993341502983, 0.219178067565725],
        anchor_edge: [0.018028, 0.20797],
        seeds: vec![
            by_number(3, &[
                [0.017704, 0.204234, 0.28575], [0.018028, 0.20797, 0.3],
                [0.018999, 0.219178, 0.29525], [0.018675, 0.215442, 0.0],
                [0.205, 0.0, 0.28575], [0.014257, 0.219538, 0.281],
                [0.0, 0.20875, 0.281], [0.004431, 0.204952, 0.281],
                [0.004755, 0.219949, 0.0], [0.20875, 0.0, 0.0],
                [0.20875, 0.0, 0.281], [0.22, 0.0, 0.28575],
                [0.004431, 0.204952, 0.0], [0.21625, 0.0, 0.3],
                [0.0, 0.21625, 0.0],
            ]),
            by_number(15, &[
                [0.017704, 0.204234, 0.07025], [0.018999, 0.219178, 0.21075],
                [0.090559, 0.183913, 0.281], [0.191047, 0.074338, 0.3],
                [0.090559, 0.183913, 0.0], [0.205, 0.0, 0.07025],
                [0.0, 0.22, 0.07025], [0.097185, 0.19737, 0.0],
                [0.205026, 0.079777, 0.281], [0.22, 0.0, 0.07025],
                [0.097185, 0.19737, 0.3], [0.0, 0.205, 0.07025],
            ]),
        ],
    }
}

fn cw_large_small() -> ClassData {
    ClassData {
        anchor_point: [0.022, 0.125079974416371],
        anchor_edge: [0.0187, 0.106318],
        seeds: vec![
            by_number(5, &[
                [0.017539, 0.099719, 0.3], [0.019705, 0.11203, 0.0],
                [0.0, 0.10125, 0.279], [0.10125, 0.0, 0.0],
                [0.10125, 0.0, 0.279], [0.11375, 0.0, 0.3],
                [0.0, 0.11375, 0.0],
            ]),
            by_number(3, &[
                [0.016457, 0.093564, 0.28425], [0.020787, 0.118186, 0.29475],
                [0.095, 0.0, 0.28425], [0.015625, 0.118978, 0.279],
                [0.004134, 0.09491, 0.279], [0.005222, 0.119886, 0.0],
                [0.12, 0.0, 0.28425], [0.004134, 0.09491, 0.0],
            ]),
            by_number(10, &[
                [0.016457, 0.093564, 0.06975], [0.020787, 0.118186, 0.20925],
                [0.047474, 0.082288, 0.279], [0.089267, 0.032501, 0.3],
                [0.047474, 0.082288, 0.0], [0.095, 0.0, 0.06975],
                [0.0, 0.12, 0.06975], [0.059967, 0.103942, 0.0],
                [0.112759, 0.041054, 0.279], [0.12, 0.0, 0.06975],
                [0.059967, 0.103942, 0.3], [0.0, 0.095, 0.06975],
            ]),
        ],
    }
}

fn cw_large_large() -> ClassData {
    ClassData {
        anchor_point: [0.02, 0.227723428746363],
        anchor_edge: [0.018333, 0.208746],
        seeds: vec![
            by_number(5, &[
                [0.017607, 0.200478, 0.3], [0.018701, 0.21293, 0.0],
                [0.0, 0.20125, 0.279], [0.20125, 0.0, 0.0],
                [0.20125, 0.0, 0.279], [0.21375, 0.0, 0.3],
                [0.0, 0.21375, 0.0],
            ]),
            by_number(3, &[
                [0.019248, 0.219156, 0.29475], [0.195, 0.0, 0.28425],
                [0.014444, 0.219525, 0.279], [0.004818, 0.219947, 0.0],
                [0.22, 0.0, 0.28425], [0.01706, 0.194252, 0.28425],
                [0.00427, 0.194953, 0.279], [0.00427, 0.194953, 0.0],
            ]),
            by_number(15, &[
                [0.01706, 0.194252, 0.06975], [0.019248, 0.219156, 0.20925],
                [0.08629, 0.174869, 0.279], [0.181747, 0.07066, 0.3],
                [0.08629, 0.174869, 0.0], [0.195, 0.0, 0.06975],
                [0.0, 0.22, 0.06975], [0.097353, 0.197288, 0.0],
                [0.205048, 0.079719, 0.279], [0.22, 0.0, 0.06975],
                [0.097353, 0.197288, 0.3], [0.0, 0.195, 0.06975],
            ]),
        ],
    }
}

fn cc_small_small() -> ClassData {
    ClassData {
        anchor_point: [0.0154052750086153, 0.126062196958124],
        anchor_edge: [0.014022, 0.114746],
        seeds: vec![
            by_number(3, &[
                [0.012737, 0.104225, 0.2895], [0.013192, 0.107947, 0.3],
                [0.014556, 0.119114, 0.2965], [0.014101, 0.115392, 0.0],
                [0.105, 0.0, 0.2895], [0.010929, 0.119501, 0.286],
                [0.0, 0.10875, 0.286], [0.003192, 0.104951, 0.286],
                [0.003647, 0.119945, 0.0], [0.10875, 0.0, 0.0],
                [0.10875, 0.0, 0.286], [0.12, 0.0, 0.2895],
                [0.003192, 0.104951, 0.0], [0.11625, 0.0, 0.3],
                [0.0, 0.11625, 0.0],
            ]),
            by_number(10, &[
                [0.012737, 0.104225, 0.0715], [0.014556, 0.119114, 0.2145],
                [0.04885, 0.092945, 0.286], [0.098184, 0.037215, 0.3],
                [0.04885, 0.092945, 0.0], [0.105, 0.0, 0.0715],
                [0.0, 0.12, 0.0715], [0.055828, 0.106222, 0.0],
                [0.11221, 0.042531, 0.286], [0.12, 0.0, 0.0715],
                [0.055828, 0.106222, 0.3], [0.0, 0.105, 0.0715],
            ]),
        ],
    }
}

fn cc_small_large() -> ClassData {
    ClassData {
        anchor_point: [0.0146274740894786, 0.228131534430823],
        anchor_edge: [0.013898, 0.216755],
        seeds: vec![
            by_number(3, &[
                [0.013117, 0.20458, 0.2895], [0.013357, 0.208322, 0.3],
                [0.014077, 0.219549, 0.2965], [0.013837, 0.215807, 0.0],
                [0.205, 0.0, 0.2895], [0.010561, 0.219746, 0.286],
                [0.0, 0.20875, 0.286], [0.003281, 0.204974, 0.286],
                [0.003522, 0.219972, 0.0], [0.20875, 0.0, 0.0],
                [0.20875, 0.0, 0.286], [0.22, 0.0, 0.2895],
                [0.003281, 0.204974, 0.0], [0.21625, 0.0, 0.3],
                [0.0, 0.21625, 0.0],
            ]),
            by_number(15, &[
                [0.013117, 0.20458, 0.0715], [0.014077, 0.219549, 0.2145],
                [0.087452, 0.185411, 0.286], [0.190627, 0.075408, 0.3],
                [0.087452, 0.185411, 0.0], [0.205, 0.0, 0.0715],
                [0.0, 0.22, 0.0715], [0.09385, 0.198978, 0.0],
                [0.204575, 0.080926, 0.286], [0.22, 0.0, 0.0715],
                [0.09385, 0.198978, 0.3], [0.0, 0.205, 0.0715],
            ]),
        ],
    }
}

fn cc_large_small() -> ClassData {
    ClassData {
        anchor_point: [0.022, 0.125079974416371],
        anchor_edge: [0.0187, 0.106318],
        seeds: vec![
            by_number(4, &[
                [0.016457, 0.093564, 0.2865], [0.017539, 0.099719, 0.3],
                [0.020787, 0.118186, 0.2955], [0.019705, 0.11203, 0.0],
                [0.095, 0.0, 0.2865], [0.015625, 0.118978, 0.282],
                [0.0, 0.10125, 0.282], [0.004134, 0.09491, 0.282],
                [0.005222, 0.119886, 0.0], [0.10125, 0.0, 0.0],
                [0.10125, 0.0, 0.282], [0.12, 0.0, 0.2865],
                [0.004134, 0.09491, 0.0], [0.11375, 0.0, 0.3],
                [0.0, 0.11375, 0.0],
            ]),
            by_number(10, &[
                [0.016457, 0.093564, 0.0705], [0.020787, 0.118186, 0.2115],
                [0.047474, 0.082288, 0.282], [0.089267, 0.032501, 0.3],
                [0.047474, 0.082288, 0.0], [0.095, 0.0, 0.0705],
                [0.0, 0.12, 0.0705], [0.059967, 0.103942, 0.0],
                [0.112759, 0.041054, 0.282], [0.12, 0.0, 0.0705],
                [0.059967, 0.103942, 0.3], [0.0, 0.095, 0.0705],
            ]),
        ],
    }
}

fn cc_large_large() -> ClassData {
    ClassData {
        anchor_point: [0.02, 0.227723428746363],
        anchor_edge: [0.018333, 0.208746],
        seeds: vec![
            by_number(4, &[
                [0.017778, 0.202421, 0.2865], [0.018333, 0.208746, 0.3],
                [0.02, 0.227723, 0.2955], [0.019444, 0.221398, 0.0],
                [0.2032, 0.0, 0.2865], [0.015008, 0.228107, 0.282],
                [0.0, 0.20955, 0.282], [0.00445, 0.203151, 0.282],
                [0.005006, 0.228545, 0.0], [0.20955, 0.0, 0.0],
                [0.20955, 0.0, 0.282], [0.2286, 0.0, 0.2865],
                [0.00445, 0.203151, 0.0], [0.22225, 0.0, 0.3],
                [0.0, 0.22225, 0.0],
            ]),
            by_number(12, &[
                [0.017778, 0.202421, 0.0705], [0.02, 0.227723, 0.2115],
                [0.089919, 0.182222, 0.282], [0.18939, 0.073632, 0.3],
                [0.089919, 0.182222, 0.0], [0.2032, 0.0, 0.0705],
                [0.0, 0.2286, 0.0705], [0.101159, 0.205, 0.0],
                [0.213064, 0.082836, 0.282], [0.2286, 0.0, 0.0705],
                [0.101159, 0.205, 0.3], [0.0, 0.2032, 0.0705],
            ]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twin_crack_ignores_grade() {
        let a = CalibrationKey::new(Variant::TwinCrack, SizeClass::Small, SizeClass::Small, Grade::X42);
        let b = CalibrationKey::new(Variant::TwinCrack, SizeClass::Small, SizeClass::Small, Grade::X100);
        assert_eq!(a, b);
        assert_eq!(CalibrationKey::reachable().len(), 12 + 4);
    }

    #[test]
    fn grade_changes_small_small_pressure() {
        let table = CalibrationTable::builtin().unwrap();
        let key = |g| CalibrationKey::new(Variant::CrackCorrosion, SizeClass::Small, SizeClass::Small, g);
        let x42 = table.lookup(&key(Grade::X42)).unwrap();
        let x100 = table.lookup(&key(Grade::X100)).unwrap();
        assert_eq!(x42.pressure_stage_1, 40.0e6);
        assert_eq!(x100.pressure_stage_2, 110.0e6);
    }

    #[test]
    fn incomplete_table_is_rejected() {
        let mut profiles = builtin_profiles();
        profiles.pop();
        let table = CalibrationTable::from_profiles(profiles).unwrap();
        assert!(matches!(
            table.verify_complete(),
            Err(ConfigError::MissingCalibration(_))
        ));
    }

    #[test]
    fn inverted_pressures_are_rejected() {
        let mut profiles = builtin_profiles();
        profiles[0].pressure_stage_2 = profiles[0].pressure_stage_1;
        assert!(CalibrationTable::from_profiles(profiles).is_err());
    }
}
