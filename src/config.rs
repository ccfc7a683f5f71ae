use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub campaign: Campaign,
    #[serde(default)]
    pub axes: BTreeMap<String, AxisConfig>,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(default)]
    pub workspace: Workspace,
    #[serde(default)]
    pub solver: Solver,
    #[serde(default)]
    pub cleanup: Cleanup,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }

    /// Checks that do not need the parameter space or the calibration table.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let known = self.campaign.variant.axis_names();
        for name in self.axes.keys() {
            if !known.contains(&name.as_str()) {
                return Err(ConfigError::UnknownAxis {
                    axis: name.clone(),
                    variant: self.campaign.variant.to_string(),
                });
            }
        }

        let prefix = self.job_prefix();
        if prefix
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        {
            return Err(ConfigError::invalid(format!(
                "job_prefix must be [A-Za-z0-9_-]: {prefix:?}"
            )));
        }

        if self.solver.command.trim().is_empty() {
            return Err(ConfigError::invalid("solver.command is empty"));
        }

        if let Some(ext) = self
            .cleanup
            .extensions
            .iter()
            .find(|e| e.is_empty() || e.contains(['/', '\\', '.']))
        {
            return Err(ConfigError::invalid(format!(
                "cleanup extension must be a bare suffix: {ext:?}"
            )));
        }

        Ok(())
    }

    /// Configured prefix, or the class-derived one (`Burst_full_cw_bTsD_`).
    pub fn job_prefix(&self) -> String {
        if !self.campaign.job_prefix.is_empty() {
            return self.campaign.job_prefix.clone();
        }
        format!(
            "Burst_full_{}_{}T{}D_",
            self.campaign.variant.tag(),
            self.campaign.thickness_class.tag(),
            self.campaign.diameter_class.tag()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// One embedded crack plus an outer-surface wall loss.
    CrackCorrosion,
    /// Two embedded cracks.
    TwinCrack,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::CrackCorrosion, Variant::TwinCrack];

    /// Axis names in radix order (first varies fastest).
    pub fn axis_names(self) -> &'static [&'static str] {
        match self {
            Variant::CrackCorrosion => &["crack_length", "ligament_2", "loss_height"],
            Variant::TwinCrack => &["crack_length_1", "crack_length_2", "ligament_1", "ligament_2"],
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Variant::CrackCorrosion => "cw",
            Variant::TwinCrack => "cc",
        }
    }

    /// Whether the material grade participates in calibration.
    pub fn uses_grade(self) -> bool {
        matches!(self, Variant::CrackCorrosion)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::CrackCorrosion => f.write_str("crack_corrosion"),
            Variant::TwinCrack => f.write_str("twin_crack"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Small,
    Large,
}

impl SizeClass {
    pub const ALL: [SizeClass; 2] = [SizeClass::Small, SizeClass::Large];

    pub fn tag(self) -> &'static str {
        match self {
            SizeClass::Small => "s",
            SizeClass::Large => "b",
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeClass::Small => f.write_str("small"),
            SizeClass::Large => f.write_str("large"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    X42,
    X65,
    X100,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::X42, Grade::X65, Grade::X100];
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::X42 => f.write_str("x42"),
            Grade::X65 => f.write_str("x65"),
            Grade::X100 => f.write_str("x100"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub variant: Variant,
    pub thickness_class: SizeClass,
    pub diameter_class: SizeClass,
    pub material_grade: Grade,
    /// Empty means derive from variant and class.
    pub job_prefix: String,
    pub print_summary: bool,
}
impl Default for Campaign {
    fn default() -> Self {
        Self {
            variant: Variant::CrackCorrosion,
            thickness_class: SizeClass::Large,
            diameter_class: SizeClass::Small,
            material_grade: Grade::X65,
            job_prefix: "".into(),
            print_summary: true,
        }
    }
}

/// Per-axis override. Missing axes use the built-in lists for the variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AxisConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Replaces the built-in value list whenever present; an empty list is rejected.
    #[serde(default)]
    pub values: Option<Vec<f64>>,
    /// Replaces the built-in single value used while disabled.
    #[serde(default)]
    pub default: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistentPolicy {
    /// Record the row, skip submission, keep going.
    Skip,
    /// Reject the whole grid before the first submission.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    /// Skip submission of points whose consumed length exceeds the class bound.
    pub enforce_max_length: bool,
    pub on_inconsistent: InconsistentPolicy,
}
impl Default for Geometry {
    fn default() -> Self {
        Self {
            enforce_max_length: false,
            on_inconsistent: InconsistentPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceMode {
    /// One model reused across points; the assembly instance is replaced in place.
    Shared,
    /// A fresh model per point.
    Isolated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub mode: WorkspaceMode,
    pub model_name: String,
    pub part_name: String,
    pub instance_name: String,
}
impl Default for Workspace {
    fn default() -> Self {
        Self {
            mode: WorkspaceMode::Shared,
            model_name: "Model-1".into(),
            part_name: "pipe".into(),
            instance_name: "pipe-1".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solver {
    pub command: String,
    /// `{script}` is replaced with the driver script path.
    pub args: Vec<String>,
    pub driver_script: String,
    /// 0 waits until the job terminates.
    pub timeout_seconds: u64,
    pub doctor_timeout_seconds: u64,
    pub num_cpus: u32,
    pub memory_percent: u32,
    pub keep_stderr: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
impl Default for Solver {
    fn default() -> Self {
        Self {
            command: "abaqus".into(),
            args: vec!["cae".into(), "noGUI={script}".into(), "--".into()],
            driver_script: "burst_driver.py".into(),
            timeout_seconds: 0,
            doctor_timeout_seconds: 120,
            num_cpus: 16,
            memory_percent: 90,
            keep_stderr: true,
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cleanup {
    pub enabled: bool,
    pub extensions: Vec<String>,
}
impl Default for Cleanup {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: crate::cleanup::DEFAULT_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub out_dir: String,
    /// Solver working directory; job artifacts land here.
    pub work_dir: String,
    pub scripts_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "burst_pressure".into(),
            work_dir: ".".into(),
            scripts_dir: "scripts".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub summary_suffix: String,
    pub write_report_json: bool,
    pub report_suffix: String,
    /// Rewrite the summary after every point instead of once at the end.
    pub flush_each_point: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            summary_suffix: "summary.txt".into(),
            write_report_json: true,
            report_suffix: "report.json".into(),
            flush_each_point: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            dump_effective_config: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_prefix_follows_class() {
        let mut cfg = Config::default();
        assert_eq!(cfg.job_prefix(), "Burst_full_cw_bTsD_");

        cfg.campaign.variant = Variant::TwinCrack;
        cfg.campaign.thickness_class = SizeClass::Small;
        assert_eq!(cfg.job_prefix(), "Burst_full_cc_sTsD_");

        cfg.campaign.job_prefix = "custom_".into();
        assert_eq!(cfg.job_prefix(), "custom_");
    }

    #[test]
    fn rejects_unknown_axis() {
        let mut cfg = Config::default();
        cfg.axes.insert("crack_length_1".into(), AxisConfig::default());
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnknownAxis { .. })
        ));
    }

    #[test]
    fn rejects_dotted_extension() {
        let mut cfg = Config::default();
        cfg.cleanup.extensions.push(".odb".into());
        assert!(cfg.validate().is_err());
    }
}
