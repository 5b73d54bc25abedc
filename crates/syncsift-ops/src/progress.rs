//! Progress reporting for plan execution.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use syncsift_core::{ActionId, ActionKind};

/// Progress snapshot published while a plan executes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionProgress {
    /// Action currently being processed.
    pub current_action: Option<ActionId>,
    /// Kind of the current action.
    pub current_kind: Option<ActionKind>,
    /// Path currently being backed up, removed or moved.
    pub current_path: Option<PathBuf>,
    /// Actions processed so far.
    pub actions_completed: usize,
    /// Actions in the plan.
    pub actions_total: usize,
    /// Bytes freed so far.
    pub bytes_freed: u64,
    /// Per-file errors so far.
    pub errors_count: usize,
}

impl ExecutionProgress {
    /// Create a tracker for a plan with `actions_total` actions.
    pub fn new(actions_total: usize) -> Self {
        Self {
            actions_total,
            ..Self::default()
        }
    }

    /// Progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.actions_total == 0 {
            return 0.0;
        }
        (self.actions_completed as f64 / self.actions_total as f64) * 100.0
    }
}
