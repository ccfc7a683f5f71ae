//! The model workspace shared by every grid point.
//!
//! In shared mode one model is reused and the assembly instance is
//! destroyed and recreated per point, so a half-built point can leave the
//! model inconsistent for the next one. Isolated mode names a fresh model
//! per point.

use crate::config::{self, WorkspaceMode};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkspaceDirective {
    /// First point in a shared model.
    CreateInstance { model: String, instance: String },
    /// Delete the previous instance, then create it again.
    ReplaceInstance { model: String, instance: String },
    /// Build into a brand-new model.
    FreshModel { model: String, instance: String },
}

impl WorkspaceDirective {
    pub fn model(&self) -> &str {
        match self {
            WorkspaceDirective::CreateInstance { model, .. }
            | WorkspaceDirective::ReplaceInstance { model, .. }
            | WorkspaceDirective::FreshModel { model, .. } => model,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Workspace {
    mode: WorkspaceMode,
    model_name: String,
    part_name: String,
    instance_name: String,
    instance_live: bool,
    dirty: bool,
    builds: u64,
}

impl Workspace {
    pub fn new(cfg: &config::Workspace) -> Self {
        Self {
            mode: cfg.mode,
            model_name: cfg.model_name.clone(),
            part_name: cfg.part_name.clone(),
            instance_name: cfg.instance_name.clone(),
            instance_live: false,
            dirty: false,
            builds: 0,
        }
    }

    pub fn mode(&self) -> WorkspaceMode {
        self.mode
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    /// True after a build failed in shared mode and nothing has rebuilt since.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn builds(&self) -> u64 {
        self.builds
    }

    /// What the runner must do to the model before building point `index`.
    pub fn begin_point(&mut self, index: usize) -> WorkspaceDirective {
        let instance = self.instance_name.clone();
        match self.mode {
            WorkspaceMode::Isolated => WorkspaceDirective::FreshModel {
                model: format!("{}-{index}", self.model_name),
                instance,
            },
            WorkspaceMode::Shared => {
                if self.dirty {
                    warn!(
                        "model {} may be inconsistent after a failed build; reusing it for point {index}",
                        self.model_name
                    );
                }
                let model = self.model_name.clone();
                if self.instance_live {
                    WorkspaceDirective::ReplaceInstance { model, instance }
                } else {
                    WorkspaceDirective::CreateInstance { model, instance }
                }
            }
        }
    }

    /// Records whether the runner got as far as a live instance.
    pub fn finish_point(&mut self, built: bool) {
        self.builds += 1;
        match self.mode {
            WorkspaceMode::Isolated => {}
            WorkspaceMode::Shared => {
                // Once an instance existed it is replaced, not recreated, even after failure.
                self.instance_live = self.instance_live || built;
                self.dirty = !built;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_mode_replaces_after_first_point() {
        let mut ws = Workspace::new(&config::Workspace::default());
        assert!(matches!(ws.begin_point(0), WorkspaceDirective::CreateInstance { .. }));
        ws.finish_point(true);
        assert!(matches!(ws.begin_point(1), WorkspaceDirective::ReplaceInstance { .. }));
        ws.finish_point(false);
        assert!(ws.is_dirty());
        assert!(matches!(ws.begin_point(2), WorkspaceDirective::ReplaceInstance { .. }));
    }

    #[test]
    fn isolated_mode_names_a_model_per_point() {
        let cfg = config::Workspace {
            mode: WorkspaceMode::Isolated,
            ..Default::default()
        };
        let mut ws = Workspace::new(&cfg);
        assert_eq!(ws.begin_point(7).model(), "Model-1-7");
        ws.finish_point(false);
        assert!(!ws.is_dirty());
    }
}
