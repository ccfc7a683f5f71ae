use crate::{
    config::Config,
    engine::{solver::SolverEngine, SimulationRunner},
    pipeline::Campaign,
    util::ensure_dir,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "burst-doe")]
#[command(about = "Full-factorial burst DOE orchestrator for cracked/corroded pipe models")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./burst-doe.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the solver and driver script respond.
    Doctor {},
    /// Print every grid point with its derived geometry; submits nothing.
    Plan {},
    /// Print the calibration profile of the configured pipe class.
    Calibration {},
    /// Run the campaign.
    Run {
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;
    cfg.validate()?;

    match &args.cmd {
        Command::Doctor {} => {
            let _guard = init_logging(&args, &cfg, None)?;
            doctor(&cfg)
        }
        Command::Plan {} => {
            let _guard = init_logging(&args, &cfg, None)?;
            plan(&cfg)
        }
        Command::Calibration {} => {
            let _guard = init_logging(&args, &cfg, None)?;
            calibration(&cfg)
        }
        Command::Run { out_dir } => run(&args, &cfg, out_dir.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("burst-doe.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("burst-doe.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = SolverEngine::new(cfg)?;
    let diag = engine.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn plan(cfg: &Config) -> Result<()> {
    let campaign = Campaign::new(cfg, PlanOnly)?;
    let points = campaign.plan()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "job_prefix": cfg.job_prefix(),
            "total_points": campaign.space().len(),
            "axes": campaign.space().axes(),
            "pipe": campaign.pipe(),
            "points": points,
        }))?
    );
    Ok(())
}

fn calibration(cfg: &Config) -> Result<()> {
    let campaign = Campaign::new(cfg, PlanOnly)?;
    println!("{}", serde_json::to_string_pretty(campaign.profile())?);
    Ok(())
}

fn run(args: &Args, cfg: &Config, out_override: Option<&Path>) -> Result<()> {
    let out_dir = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    ensure_dir(&out_dir)?;
    ensure_dir(Path::new(&cfg.paths.work_dir))?;

    let log_path = resolve_log_path(cfg, &out_dir);
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(out_dir.join(format!("{}effective-config.toml", cfg.job_prefix())), raw)?;
    }

    let engine = SolverEngine::new(cfg)?;
    let mut campaign = Campaign::new(cfg, engine)?;
    let output = campaign.run(&out_dir)?;

    if cfg.output.write_report_json {
        let path = campaign.report_path(&out_dir);
        std::fs::write(&path, serde_json::to_string_pretty(&output.report)?)
            .with_context(|| format!("writing report: {}", path.display()))?;
        info!("report {}", path.display());
    }

    if cfg.campaign.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "summary": output.summary_path,
                "total_points": output.report.total_points,
                "completed": output.report.completed,
                "failed": output.report.failed,
                "skipped": output.report.skipped,
            }))?
        );
    }

    Ok(())
}

fn resolve_log_path(cfg: &Config, out_dir: &Path) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(out_dir.join(format!("{}burst-doe.log", cfg.job_prefix())))
}

/// Runner for commands that never submit.
struct PlanOnly;

impl SimulationRunner for PlanOnly {
    fn doctor(&self) -> Result<crate::engine::RunnerDiag> {
        Err(anyhow!("plan-only runner has no solver"))
    }

    fn build_and_run(
        &self,
        _workspace: &mut crate::engine::Workspace,
        _geometry: &crate::geometry::GeometryDescriptor,
        _calibration: &crate::calibration::CalibrationProfile,
        job_name: &str,
    ) -> Result<crate::engine::JobOutcome> {
        Err(anyhow!("plan-only runner cannot submit {job_name}"))
    }
}
