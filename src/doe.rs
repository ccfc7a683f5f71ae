//! Full-factorial parameter grid.
//!
//! A flat index is decoded with axis order as radix order: axis 0 varies
//! fastest. Disabled axes carry a single value and have radix 1.

use crate::{
    config::{Config, SizeClass, Variant},
    error::ConfigError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAxis {
    pub name: String,
    pub enabled: bool,
    pub values: Vec<f64>,
}

impl ParameterAxis {
    /// A disabled axis collapses to `default`.
    pub fn new(
        name: impl Into<String>,
        enabled: bool,
        values: Vec<f64>,
        default: f64,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let values = if enabled { values } else { vec![default] };
        if values.is_empty() {
            return Err(ConfigError::EmptyAxis(name));
        }
        if let Some(&bad) = values.iter().find(|v| !v.is_finite() || **v <= 0.0) {
            return Err(ConfigError::InvalidAxisValue {
                axis: name,
                value: bad,
            });
        }
        Ok(Self {
            name,
            enabled,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Built-in axis definition for a variant and thickness class.
#[derive(Debug, Clone)]
pub struct AxisSpec {
    pub name: &'static str,
    pub default: f64,
    pub values: Vec<f64>,
}

pub fn builtin_axes(variant: Variant, thickness: SizeClass) -> Vec<AxisSpec> {
    let small = thickness == SizeClass::Small;
    match variant {
        Variant::CrackCorrosion => {
            let wall = if small {
                vec![0.002, 0.0035, 0.005]
            } else {
                vec![0.002, 0.004, 0.006, 0.008]
            };
            vec![
                AxisSpec {
                    name: "crack_length",
                    default: 0.0015,
                    values: vec![0.0005, 0.00125, 0.002],
                },
                AxisSpec {
                    name: "ligament_2",
                    default: 0.004,
                    values: wall.clone(),
                },
                AxisSpec {
                    name: "loss_height",
                    default: 0.004,
                    values: wall,
                },
            ]
        }
        Variant::TwinCrack => {
            let cracks = if small {
                vec![0.0005, 0.001, 0.0015]
            } else {
                vec![0.0005, 0.0015, 0.0025]
            };
            let ligaments = if small {
                vec![0.002, 0.003, 0.004]
            } else {
                vec![0.002, 0.004, 0.006]
            };
            vec![
                AxisSpec {
                    name: "crack_length_1",
                    default: 0.0005,
                    values: cracks.clone(),
                },
                AxisSpec {
                    name: "crack_length_2",
                    default: 0.0005,
                    values: cracks,
                },
                AxisSpec {
                    name: "ligament_1",
                    default: 0.004,
                    values: ligaments.clone(),
                },
                AxisSpec {
                    name: "ligament_2",
                    default: 0.004,
                    values: ligaments,
                },
            ]
        }
    }
}

/// One resolved grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoePoint {
    pub index: usize,
    /// Per-axis value indices, in axis order.
    pub digits: Vec<usize>,
    /// `(axis name, value)`, in axis order.
    pub values: Vec<(String, f64)>,
}

impl DoePoint {
    pub fn get(&self, axis: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpace {
    axes: Vec<ParameterAxis>,
    len: usize,
}

impl ParameterSpace {
    pub fn new(axes: Vec<ParameterAxis>) -> Result<Self, ConfigError> {
        let mut len = 1usize;
        for axis in &axes {
            if axis.is_empty() {
                return Err(ConfigError::EmptyAxis(axis.name.clone()));
            }
            len = len.checked_mul(axis.len()).ok_or_else(|| {
                ConfigError::invalid(format!("grid size overflows at axis `{}`", axis.name))
            })?;
        }
        Ok(Self { axes, len })
    }

    /// Built-in axes for the active variant/class, with config overrides applied.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let specs = builtin_axes(cfg.campaign.variant, cfg.campaign.thickness_class);
        let mut axes = Vec::with_capacity(specs.len());
        for spec in specs {
            let over = cfg.axes.get(spec.name).cloned().unwrap_or_default();
            let values = over.values.unwrap_or(spec.values);
            let default = over.default.unwrap_or(spec.default);
            axes.push(ParameterAxis::new(spec.name, over.enabled, values, default)?);
        }
        Self::new(axes)
    }

    pub fn axes(&self) -> &[ParameterAxis] {
        &self.axes
    }

    pub fn radices(&self) -> Vec<usize> {
        self.axes.iter().map(ParameterAxis::len).collect()
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn point(&self, index: usize) -> Option<DoePoint> {
        let digits = decode(&self.radices(), index)?;
        let values = self
            .axes
            .iter()
            .zip(&digits)
            .map(|(axis, &d)| (axis.name.clone(), axis.values[d]))
            .collect();
        Some(DoePoint {
            index,
            digits,
            values,
        })
    }

    /// Points in increasing index order.
    pub fn iter(&self) -> impl Iterator<Item = DoePoint> + '_ {
        (0..self.len).filter_map(move |i| self.point(i))
    }
}

/// Mixed-radix decode; `None` when `index` is outside the grid.
pub fn decode(radices: &[usize], index: usize) -> Option<Vec<usize>> {
    let mut rest = index;
    let mut digits = Vec::with_capacity(radices.len());
    for &r in radices {
        if r == 0 {
            return None;
        }
        digits.push(rest % r);
        rest /= r;
    }
    if rest != 0 {
        return None;
    }
    Some(digits)
}

/// Inverse of [`decode`]; `None` when a digit is out of range.
pub fn encode(radices: &[usize], digits: &[usize]) -> Option<usize> {
    if radices.len() != digits.len() {
        return None;
    }
    let mut index = 0usize;
    let mut weight = 1usize;
    for (&r, &d) in radices.iter().zip(digits) {
        if d >= r {
            return None;
        }
        index = index.checked_add(d.checked_mul(weight)?)?;
        weight = weight.checked_mul(r)?;
    }
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_zero_varies_fastest() {
        assert_eq!(decode(&[3, 4, 4], 0), Some(vec![0, 0, 0]));
        assert_eq!(decode(&[3, 4, 4], 1), Some(vec![1, 0, 0]));
        assert_eq!(decode(&[3, 4, 4], 3), Some(vec![0, 1, 0]));
        assert_eq!(decode(&[3, 4, 4], 12), Some(vec![0, 0, 1]));
        assert_eq!(decode(&[3, 4, 4], 47), Some(vec![2, 3, 3]));
        assert_eq!(decode(&[3, 4, 4], 48), None);
    }

    #[test]
    fn disabled_axis_collapses_to_default() {
        let axis = ParameterAxis::new("loss_height", false, vec![0.002, 0.004], 0.004).unwrap();
        assert_eq!(axis.values, vec![0.004]);
    }

    #[test]
    fn empty_enabled_axis_is_config_error() {
        let err = ParameterAxis::new("ligament_2", true, vec![], 0.004).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyAxis(_)));
    }

    #[test]
    fn all_disabled_runs_once() {
        let space = ParameterSpace::from_config(&Config::default()).unwrap();
        assert_eq!(space.len(), 1);
        let p = space.point(0).unwrap();
        assert_eq!(p.get("crack_length"), Some(0.0015));
        assert_eq!(p.get("loss_height"), Some(0.004));
    }
}
