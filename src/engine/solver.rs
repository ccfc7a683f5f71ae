use super::{
    types::{BuildRequest, DriverOut, JobSettings},
    JobOutcome, RunnerDiag, SimulationRunner, Workspace,
};
use crate::{
    calibration::CalibrationProfile,
    config::Config,
    geometry::GeometryDescriptor,
};
use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Drives the solver's scripting interface as a child process.
///
/// The request goes to the driver script as JSON on stdin; the driver
/// reports its outcome as the last JSON line on stdout.
pub struct SolverEngine {
    cfg: Config,
    driver: PathBuf,
    work_dir: PathBuf,
}

impl SolverEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let driver = PathBuf::from(&cfg.paths.scripts_dir).join(&cfg.solver.driver_script);
        if !driver.exists() {
            return Err(anyhow!("missing driver script: {}", driver.display()));
        }
        let driver = driver
            .canonicalize()
            .with_context(|| format!("canonicalize driver: {}", driver.display()))?;
        Ok(Self {
            cfg: cfg.clone(),
            driver,
            work_dir: PathBuf::from(&cfg.paths.work_dir),
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.cfg.solver.command);
        let script = self.driver.display().to_string();
        for arg in &self.cfg.solver.args {
            cmd.arg(arg.replace("{script}", &script));
        }
        cmd.current_dir(&self.work_dir);
        for (k, v) in &self.cfg.solver.env {
            cmd.env(k, v);
        }
        // The launcher forks the analysis; a group lets a timeout reach both.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    fn run_json<I: serde::Serialize>(&self, input: &I, timeout_seconds: Option<u64>) -> Result<Output> {
        debug!(
            "solver run {} timeout={:?}",
            self.driver.display(),
            timeout_seconds
        );
        let mut cmd = self.command();
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning solver: {}", self.cfg.solver.command))?;

        {
            let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
            let bytes = serde_json::to_vec(input)?;
            use std::io::Write;
            stdin.write_all(&bytes)?;
            stdin.flush().ok();
        }

        let output = if let Some(secs) = timeout_seconds {
            wait_with_timeout(&mut child, Duration::from_secs(secs))?
        } else {
            child
                .wait_with_output()
                .with_context(|| "waiting for solver")?
        };

        if self.cfg.solver.keep_stderr && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("solver stderr: {}", stderr.trim());
        }
        Ok(output)
    }
}

impl SimulationRunner for SolverEngine {
    fn doctor(&self) -> Result<RunnerDiag> {
        let output = self.run_json(
            &serde_json::json!({"cmd": "doctor"}),
            Some(self.cfg.solver.doctor_timeout_seconds),
        )?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let out: DriverOut = parse_last_json_line(&stdout)
            .with_context(|| "parsing driver doctor output")?;
        Ok(RunnerDiag {
            command: self.cfg.solver.command.clone(),
            solver_version: out.status,
            ok: output.status.success() && out.ok,
            error: out.error,
        })
    }

    fn build_and_run(
        &self,
        workspace: &mut Workspace,
        geometry: &GeometryDescriptor,
        calibration: &CalibrationProfile,
        job_name: &str,
    ) -> Result<JobOutcome> {
        let directive = workspace.begin_point(geometry.index);
        let part_name = workspace.part_name().to_string();
        let req = BuildRequest::new(
            job_name,
            self.cfg.campaign.material_grade,
            &part_name,
            directive,
            geometry,
            calibration,
            JobSettings {
                num_cpus: self.cfg.solver.num_cpus,
                memory_percent: self.cfg.solver.memory_percent,
            },
        );

        let timeout = if self.cfg.solver.timeout_seconds > 0 {
            Some(self.cfg.solver.timeout_seconds)
        } else {
            None
        };

        info!("submitting {job_name}");
        let output = match self.run_json(&serde_json::json!({"cmd": "run", "req": req}), timeout) {
            Ok(o) => o,
            Err(e) => {
                workspace.finish_point(false);
                return Err(e);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = parse_last_json_line(&stdout);
        // The instance exists once the driver reports back, whatever the job's fate.
        workspace.finish_point(parsed.is_ok());

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("solver exited with {} for {job_name}", output.status);
            return Ok(JobOutcome::failed(
                job_name,
                format!("solver exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        match parsed {
            Ok(out) if out.ok => Ok(JobOutcome::completed(job_name)),
            Ok(out) => Ok(JobOutcome::failed(
                job_name,
                out.error
                    .or(out.status)
                    .unwrap_or_else(|| "driver reported ok=false".to_string()),
            )),
            Err(e) => Ok(JobOutcome::failed(job_name, format!("{e:#}"))),
        }
    }
}

/// The solver prints its own chatter; only the last JSON line is ours.
pub fn parse_last_json_line(stdout: &str) -> Result<DriverOut> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with('{'))
        .ok_or_else(|| anyhow!("driver printed no JSON line"))?;
    serde_json::from_str(line).with_context(|| format!("parsing driver JSON: {line}"))
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty solver can't deadlock on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("solver timed out after {:?}", timeout);
            kill_tree(child);
            child.wait().with_context(|| "wait after kill")?;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            let _ = stdout_thread.join();
            return Err(anyhow!(
                "solver exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(200));
    }
}

/// Kills the child and everything it spawned into its process group.
#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    match i32::try_from(child.id()) {
        // SAFETY: plain syscall on a group we created at spawn.
        Ok(pgid) if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 => {}
        _ => {
            let _ = child.kill();
        }
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_last_json_line() {
        let out = "Abaqus License Manager checked out\n{\"ok\": false}\nnoise\n{\"ok\": true, \"status\": \"COMPLETED\"}\n";
        let parsed = parse_last_json_line(out).unwrap();
        assert!(parsed.ok);
        assert_eq!(parsed.status.as_deref(), Some("COMPLETED"));
    }

    #[test]
    fn no_json_is_an_error() {
        assert!(parse_last_json_line("Analysis aborted\n").is_err());
    }

    #[cfg(unix)]
    mod subprocess {
        use super::super::*;
        use crate::calibration::{CalibrationKey, CalibrationTable};
        use crate::config::{self, Grade, SizeClass, Variant};
        use crate::engine::TerminalState;
        use crate::geometry::{derive, FlawSample, PipeClass};

        /// Engine whose "solver" is `sh -c` running `body` after draining stdin.
        fn engine(dir: &Path, body: &str, timeout_seconds: u64) -> SolverEngine {
            std::fs::write(dir.join("driver.py"), "").unwrap();
            let mut cfg = Config::default();
            cfg.paths.scripts_dir = dir.display().to_string();
            cfg.paths.work_dir = dir.display().to_string();
            cfg.solver.driver_script = "driver.py".into();
            cfg.solver.command = "sh".into();
            cfg.solver.args = vec!["-c".into(), format!("cat > /dev/null; {body}")];
            cfg.solver.timeout_seconds = timeout_seconds;
            SolverEngine::new(&cfg).unwrap()
        }

        fn submit(engine: &SolverEngine, ws: &mut Workspace) -> Result<JobOutcome> {
            let (v, s) = (Variant::CrackCorrosion, SizeClass::Small);
            let pipe = PipeClass::resolve(v, s, s);
            let g = derive(
                0,
                FlawSample::CrackCorrosion {
                    crack_length: 0.0015,
                    ligament_2: 0.004,
                    loss_height: 0.004,
                },
                &pipe,
            );
            let table = CalibrationTable::builtin().unwrap();
            let profile = table.lookup(&CalibrationKey::new(v, s, s, Grade::X65)).unwrap();
            engine.build_and_run(ws, &g, profile, "job_0")
        }

        fn reason(outcome: &JobOutcome) -> &str {
            match &outcome.state {
                TerminalState::Failed(r) => r.as_str(),
                TerminalState::Completed => panic!("expected a failed job"),
            }
        }

        fn workspace() -> Workspace {
            Workspace::new(&config::Workspace::default())
        }

        #[test]
        fn completed_after_solver_chatter() {
            let dir = tempfile::tempdir().unwrap();
            let e = engine(
                dir.path(),
                r#"echo 'License checked out'; echo '{"ok": true, "status": "COMPLETED"}'"#,
                0,
            );
            let mut ws = workspace();
            let outcome = submit(&e, &mut ws).unwrap();
            assert!(outcome.is_completed());
            assert_eq!(outcome.name, "job_0");
            assert!(!ws.is_dirty());
            assert_eq!(ws.builds(), 1);
        }

        #[test]
        fn driver_ok_false_is_failed() {
            let dir = tempfile::tempdir().unwrap();
            let e = engine(dir.path(), r#"echo '{"ok": false, "error": "mesh failed"}'"#, 0);
            let mut ws = workspace();
            let outcome = submit(&e, &mut ws).unwrap();
            assert_eq!(reason(&outcome), "mesh failed");
            assert!(!ws.is_dirty());
        }

        #[test]
        fn nonzero_exit_is_failed() {
            let dir = tempfile::tempdir().unwrap();
            let e = engine(dir.path(), r#"echo '{"ok": true}'; echo 'license lost' >&2; exit 3"#, 0);
            let mut ws = workspace();
            let outcome = submit(&e, &mut ws).unwrap();
            let r = reason(&outcome);
            assert!(r.starts_with("solver exited with"), "{r}");
            assert!(r.contains("license lost"), "{r}");
        }

        #[test]
        fn missing_json_line_is_failed_and_dirties_workspace() {
            let dir = tempfile::tempdir().unwrap();
            let e = engine(dir.path(), "echo 'Analysis aborted'", 0);
            let mut ws = workspace();
            let outcome = submit(&e, &mut ws).unwrap();
            assert!(reason(&outcome).contains("no JSON line"));
            assert!(ws.is_dirty());
        }

        #[test]
        fn timeout_kills_the_whole_tree() {
            let dir = tempfile::tempdir().unwrap();
            // The backgrounded sleep holds the pipes open unless its group is killed too.
            let e = engine(dir.path(), "sleep 30 & wait", 1);
            let mut ws = workspace();
            let start = Instant::now();
            let err = submit(&e, &mut ws).unwrap_err();
            assert!(format!("{err:#}").contains("timeout"));
            assert!(start.elapsed() < Duration::from_secs(20));
            assert!(ws.is_dirty());
            assert_eq!(ws.builds(), 1);
        }

        #[test]
        fn doctor_reports_driver_status() {
            let dir = tempfile::tempdir().unwrap();
            let e = engine(dir.path(), r#"echo '{"ok": true, "status": "6.14-1"}'"#, 0);
            let diag = e.doctor().unwrap();
            assert!(diag.ok);
            assert_eq!(diag.command, "sh");
            assert_eq!(diag.solver_version.as_deref(), Some("6.14-1"));
        }

        #[test]
        fn missing_driver_script_is_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let mut cfg = Config::default();
            cfg.paths.scripts_dir = dir.path().display().to_string();
            assert!(SolverEngine::new(&cfg).is_err());
        }
    }
}
