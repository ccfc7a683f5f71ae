use crate::{
    calibration::CalibrationKey,
    cleanup::CleanupEntry,
    engine::JobOutcome,
    geometry::SummaryRow,
    util::ensure_dir,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

const RULE: &str = "---------------------------------------------------------------";

/// Append-only summary, one row per grid point in index order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub total_points: usize,
    pub outer_diameter_mm: f64,
    pub thickness_mm: f64,
    rows: Vec<SummaryRow>,
}

impl CampaignSummary {
    pub fn new(total_points: usize, outer_diameter_mm: f64, thickness_mm: f64) -> Self {
        Self {
            total_points,
            outer_diameter_mm,
            thickness_mm,
            rows: Vec::with_capacity(total_points),
        }
    }

    pub fn push(&mut self, row: SummaryRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn render(&self) -> String {
        let mut s = String::new();
        s.push_str(RULE);
        let _ = write!(s, "\n Total factorial DOE: {}", self.total_points);
        let _ = write!(s, "\n Total simulations: {}", self.rows.len());
        let _ = write!(s, "\n Pipe outer diameter: {:?} mm", self.outer_diameter_mm);
        let _ = write!(s, "\n Pipe thickness: {:?} mm", self.thickness_mm);
        let _ = write!(s, "\n{RULE}");
        s.push_str("\n Flaw parameters detail:");
        for row in &self.rows {
            s.push('\n');
            s.push_str(&format_row(row));
        }
        s
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        std::fs::write(path, self.render())
            .with_context(|| format!("writing summary: {}", path.display()))
    }
}

/// `index, v1, v2, ...` with shortest round-trip float formatting.
pub fn format_row(row: &SummaryRow) -> String {
    let mut s = row.index.to_string();
    for v in &row.values {
        let _ = write!(s, ", {v:?}");
    }
    s
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    Submitted,
    /// Dependent ligament was not positive.
    SkippedInconsistent,
    /// Over the class length bound while enforcement is on.
    SkippedOverLength,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointReport {
    pub index: usize,
    pub job_name: String,
    pub within_max_length: bool,
    pub status: PointStatus,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub outcome: Option<JobOutcome>,
    #[serde(default)]
    pub cleanup: Vec<CleanupEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignReport {
    pub fingerprint: String,
    pub started: String,
    pub finished: String,
    pub calibration: CalibrationKey,
    pub job_prefix: String,
    pub total_points: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub points: Vec<PointReport>,
}

impl CampaignReport {
    pub fn tally(&mut self) {
        self.completed = 0;
        self.failed = 0;
        self.skipped = 0;
        for p in &self.points {
            match (&p.status, &p.outcome) {
                (PointStatus::Submitted, Some(o)) if o.is_completed() => self.completed += 1,
                (PointStatus::Submitted, _) => self.failed += 1,
                _ => self.skipped += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_matches_reference_layout() {
        let row = SummaryRow {
            index: 2,
            values: vec![4.0, 3.0, 4.0, 14.000000000000002],
        };
        assert_eq!(format_row(&row), "2, 4.0, 3.0, 4.0, 14.000000000000002");
    }

    #[test]
    fn header_lines() {
        let mut s = CampaignSummary::new(2, 240.0, 25.0);
        s.push(SummaryRow {
            index: 0,
            values: vec![1.0],
        });
        let text = s.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], RULE);
        assert_eq!(lines[1], " Total factorial DOE: 2");
        assert_eq!(lines[2], " Total simulations: 1");
        assert_eq!(lines[3], " Pipe outer diameter: 240.0 mm");
        assert_eq!(lines[4], " Pipe thickness: 25.0 mm");
        assert_eq!(lines[5], RULE);
        assert_eq!(lines[6], " Flaw parameters detail:");
        assert_eq!(lines[7], "0, 1.0");
    }
}
