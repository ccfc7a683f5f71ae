//! Typed errors for the campaign core.
//!
//! Configuration errors abort before any job is submitted. Geometry errors
//! are scoped to one grid point.

use thiserror::Error;

/// Fatal, pre-run configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An axis resolved to zero values.
    #[error("axis `{0}` has no values")]
    EmptyAxis(String),

    /// An axis value is NaN, infinite, or not strictly positive.
    #[error("axis `{axis}` has invalid value {value}")]
    InvalidAxisValue { axis: String, value: f64 },

    /// The config names an axis the active variant does not know.
    #[error("unknown axis `{axis}` for variant {variant}")]
    UnknownAxis { axis: String, variant: String },

    /// No calibration profile exists for the requested class.
    #[error("no calibration profile for {0}")]
    MissingCalibration(String),

    /// A grid point derives an impossible wall; raised before any submission.
    #[error("grid point {index} is inconsistent: {source}")]
    InconsistentGrid {
        index: usize,
        source: GeometryError,
    },

    /// Any other invalid setting.
    #[error("invalid setting: {0}")]
    Invalid(String),
}

impl ConfigError {
    #[must_use]
    pub fn invalid(details: impl Into<String>) -> Self {
        Self::Invalid(details.into())
    }
}

/// Per-point derivation inconsistencies.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    /// The sampled lengths consume the whole wall (or more).
    #[error("dependent ligament `{ligament}` is {value} (thickness {thickness}, consumed {consumed})")]
    NonPositiveLigament {
        ligament: &'static str,
        value: f64,
        thickness: f64,
        consumed: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ConfigError::EmptyAxis("loss_height".into());
        assert!(format!("{err}").contains("loss_height"));

        let err = ConfigError::invalid("bad prefix");
        assert!(format!("{err}").contains("bad prefix"));

        let err = GeometryError::NonPositiveLigament {
            ligament: "ligament_1",
            value: -0.001,
            thickness: 0.015,
            consumed: 0.016,
        };
        assert!(format!("{err}").contains("ligament_1"));
    }
}
