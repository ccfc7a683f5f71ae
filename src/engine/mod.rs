pub mod solver;
pub mod types;
pub mod workspace;

use crate::{calibration::CalibrationProfile, geometry::GeometryDescriptor};
use anyhow::Result;

pub use types::{BuildRequest, JobOutcome, RunnerDiag, TerminalState};
pub use workspace::{Workspace, WorkspaceDirective};

/// The external modeling/solver collaborator.
///
/// `build_and_run` blocks until the job is terminal. An `Err` means the
/// runner itself could not be driven; the campaign records it as a failed
/// job and moves on.
pub trait SimulationRunner {
    fn doctor(&self) -> Result<RunnerDiag>;
    fn build_and_run(
        &self,
        workspace: &mut Workspace,
        geometry: &GeometryDescriptor,
        calibration: &CalibrationProfile,
        job_name: &str,
    ) -> Result<JobOutcome>;
}
