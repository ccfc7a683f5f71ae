use crate::{
    calibration::{CalibrationKey, CalibrationProfile, CalibrationTable},
    cleanup::{cleanup_job, CleanupEntry},
    config::{Config, InconsistentPolicy},
    doe::ParameterSpace,
    engine::{JobOutcome, SimulationRunner, Workspace},
    error::ConfigError,
    geometry::{derive, FlawSample, GeometryDescriptor, PipeClass},
    report::{CampaignReport, CampaignSummary, PointReport, PointStatus},
    util::{now_rfc3339, sha256_hex},
};
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Campaign<R: SimulationRunner> {
    cfg: Config,
    runner: R,
    space: ParameterSpace,
    pipe: PipeClass,
    profile: CalibrationProfile,
    workspace: Workspace,
    job_prefix: String,
}

#[derive(Debug)]
pub struct CampaignOutput {
    pub summary: CampaignSummary,
    pub summary_path: PathBuf,
    pub report: CampaignReport,
}

/// A grid point as it would be submitted, without submitting it.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedPoint {
    pub job_name: String,
    pub values: Vec<(String, f64)>,
    pub geometry: GeometryDescriptor,
    pub inconsistency: Option<String>,
}

/// One submission; discarded once its artifacts are reclaimed.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub name: String,
    pub geometry: GeometryDescriptor,
    pub outcome: Option<JobOutcome>,
    pub artifact_extensions: Vec<String>,
}

impl JobRecord {
    pub fn new(name: &str, geometry: &GeometryDescriptor, extensions: &[String]) -> Self {
        Self {
            name: name.to_string(),
            geometry: geometry.clone(),
            outcome: None,
            artifact_extensions: extensions.to_vec(),
        }
    }

    pub fn complete(&mut self, outcome: JobOutcome) {
        self.outcome = Some(outcome);
    }

    /// Reclaims artifacts in `dir` and hands back what survives of the record.
    pub fn finish(self, dir: &Path, clean: bool) -> (Option<JobOutcome>, Vec<CleanupEntry>) {
        let cleanup = if clean {
            cleanup_job(dir, &self.name, &self.artifact_extensions)
        } else {
            Vec::new()
        };
        (self.outcome, cleanup)
    }
}

impl<R: SimulationRunner> Campaign<R> {
    /// Resolves the grid, pipe class and calibration; every configuration error surfaces here.
    pub fn new(cfg: &Config, runner: R) -> Result<Self> {
        let space = ParameterSpace::from_config(cfg)?;
        let table = CalibrationTable::builtin()?;
        let c = &cfg.campaign;
        let key = CalibrationKey::new(c.variant, c.thickness_class, c.diameter_class, c.material_grade);
        let profile = table.lookup(&key)?.clone();
        let pipe = PipeClass::resolve(c.variant, c.thickness_class, c.diameter_class);

        Ok(Self {
            cfg: cfg.clone(),
            runner,
            space,
            pipe,
            profile,
            workspace: Workspace::new(&cfg.workspace),
            job_prefix: cfg.job_prefix(),
        })
    }

    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    pub fn pipe(&self) -> &PipeClass {
        &self.pipe
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn job_name(&self, index: usize) -> String {
        format!("{}{index}", self.job_prefix)
    }

    pub fn summary_path(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(format!("{}{}", self.job_prefix, self.cfg.output.summary_suffix))
    }

    pub fn report_path(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(format!("{}{}", self.job_prefix, self.cfg.output.report_suffix))
    }

    fn descriptors(&self) -> Result<Vec<GeometryDescriptor>> {
        let variant = self.cfg.campaign.variant;
        let mut out = Vec::with_capacity(self.space.len());
        for point in self.space.iter() {
            let sample = FlawSample::from_point(variant, &point)?;
            out.push(derive(point.index, sample, &self.pipe));
        }
        Ok(out)
    }

    pub fn plan(&self) -> Result<Vec<PlannedPoint>> {
        let descriptors = self.descriptors()?;
        Ok(self
            .space
            .iter()
            .zip(descriptors)
            .map(|(point, geometry)| PlannedPoint {
                job_name: self.job_name(point.index),
                values: point.values,
                inconsistency: geometry.check_consistent().err().map(|e| e.to_string()),
                geometry,
            })
            .collect())
    }

    /// Rejects the grid up front when the policy is to abort on inconsistency.
    pub fn preflight(&self) -> Result<()> {
        if self.cfg.geometry.on_inconsistent != InconsistentPolicy::Abort {
            return Ok(());
        }
        for g in self.descriptors()? {
            if let Err(source) = g.check_consistent() {
                return Err(ConfigError::InconsistentGrid {
                    index: g.index,
                    source,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Processes every point in index order, then writes the summary once
    /// (or after every point with `output.flush_each_point`).
    pub fn run(&mut self, out_dir: &Path) -> Result<CampaignOutput> {
        self.preflight()?;

        let started = now_rfc3339();
        let clock = Instant::now();
        let total = self.space.len();
        let summary_path = self.summary_path(out_dir);
        let mut summary =
            CampaignSummary::new(total, self.pipe.outer_diameter_mm(), self.pipe.thickness_mm());
        let mut points = Vec::with_capacity(total);

        info!(
            "campaign {} points={} calibration=[{}] workspace={:?}",
            self.job_prefix,
            total,
            self.profile.key,
            self.workspace.mode()
        );

        for geometry in self.descriptors()? {
            summary.push(geometry.summary_row());
            let job_name = self.job_name(geometry.index);
            let point = self.process_point(&geometry, &job_name);
            points.push(point);

            if self.cfg.output.flush_each_point {
                summary.write(&summary_path)?;
            }
        }

        summary.write(&summary_path)?;
        info!(
            "campaign finished in {:.1}s; summary {}",
            clock.elapsed().as_secs_f64(),
            summary_path.display()
        );

        let mut report = CampaignReport {
            fingerprint: sha256_hex(self.cfg.normalized_for_hash().as_bytes()),
            started,
            finished: now_rfc3339(),
            calibration: self.profile.key,
            job_prefix: self.job_prefix.clone(),
            total_points: total,
            completed: 0,
            failed: 0,
            skipped: 0,
            points,
        };
        report.tally();

        Ok(CampaignOutput {
            summary,
            summary_path,
            report,
        })
    }

    fn process_point(&mut self, geometry: &GeometryDescriptor, job_name: &str) -> PointReport {
        let mut point = PointReport {
            index: geometry.index,
            job_name: job_name.to_string(),
            within_max_length: geometry.within_max_length,
            status: PointStatus::Submitted,
            detail: None,
            outcome: None,
            cleanup: Vec::new(),
        };

        if let Err(e) = geometry.check_consistent() {
            warn!("skipping {job_name}: {e}");
            point.status = PointStatus::SkippedInconsistent;
            point.detail = Some(e.to_string());
            return point;
        }

        if !geometry.within_max_length {
            let detail = format!(
                "consumed length {} exceeds allowable {}",
                geometry.total_length, self.pipe.max_length
            );
            if self.cfg.geometry.enforce_max_length {
                info!("skipping {job_name}: {detail}");
                point.status = PointStatus::SkippedOverLength;
                point.detail = Some(detail);
                return point;
            }
            debug!("{job_name}: {detail}; running anyway");
            point.detail = Some(detail);
        }

        let mut record = JobRecord::new(job_name, geometry, &self.cfg.cleanup.extensions);
        let outcome = match self.runner.build_and_run(
            &mut self.workspace,
            &record.geometry,
            &self.profile,
            job_name,
        ) {
            Ok(o) => o,
            Err(e) => {
                warn!("runner failed for {job_name}: {e:#}");
                JobOutcome::failed(job_name, format!("{e:#}"))
            }
        };
        if !outcome.is_completed() {
            warn!("{job_name} terminated with {:?}", outcome.state);
        }
        record.complete(outcome);

        let (outcome, cleanup) = record.finish(Path::new(&self.cfg.paths.work_dir), self.cfg.cleanup.enabled);
        point.outcome = outcome;
        point.cleanup = cleanup;
        point
    }
}
