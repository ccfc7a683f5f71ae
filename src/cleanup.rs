//! Best-effort removal of transient solver artifacts.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// Model definition, state, pack, results and database artifacts.
pub const DEFAULT_EXTENSIONS: [&str; 8] = ["abq", "mdl", "pac", "stt", "prt", "res", "sim", "dat"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Removed,
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupEntry {
    pub extension: String,
    pub outcome: CleanupOutcome,
}

/// Attempts every extension; never fails.
pub fn cleanup_job<S: AsRef<str>>(dir: &Path, job_name: &str, extensions: &[S]) -> Vec<CleanupEntry> {
    extensions
        .iter()
        .map(|ext| {
            let ext = ext.as_ref();
            let path = dir.join(format!("{job_name}.{ext}"));
            let outcome = match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("removed {}", path.display());
                    CleanupOutcome::Removed
                }
                Err(e) if e.kind() == ErrorKind::NotFound => CleanupOutcome::Missing,
                Err(e) => {
                    warn!("could not remove {}: {e}", path.display());
                    CleanupOutcome::Failed(e.to_string())
                }
            };
            CleanupEntry {
                extension: ext.to_string(),
                outcome,
            }
        })
        .collect()
}
