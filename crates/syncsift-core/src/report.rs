//! Execution results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::action::{ActionId, ActionKind, ExecutionMode};

/// What happened to one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ActionStatus {
    /// Simulate mode: counted, not applied.
    Simulated,
    /// Every target handled.
    Applied,
    /// Some targets handled, some failed.
    PartiallyApplied,
    /// Confidence below the destructive threshold and not confirmed.
    SkippedBelowThreshold,
    /// Structural action without a confirmation token.
    AwaitingConfirmation,
    /// Nothing to execute; remediation steps only.
    Advisory,
    /// No target could be handled.
    Failed,
    /// Cancellation observed before the action completed.
    Cancelled,
}

/// A single failed filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionError {
    /// Path involved.
    pub path: PathBuf,
    /// Error message.
    pub message: String,
}

impl ActionError {
    /// Create an action error.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Action id.
    pub action_id: ActionId,
    /// Action kind.
    pub kind: ActionKind,
    /// Status.
    pub status: ActionStatus,
    /// Bytes freed (or that would be freed, in simulate mode).
    pub bytes_freed: u64,
    /// Per-path failures.
    #[serde(default)]
    pub errors: Vec<ActionError>,
}

impl ActionOutcome {
    /// Create an outcome without errors.
    pub fn new(action_id: ActionId, kind: ActionKind, status: ActionStatus, bytes_freed: u64) -> Self {
        Self {
            action_id,
            kind,
            status,
            bytes_freed,
            errors: Vec::new(),
        }
    }
}

/// Aggregate result of executing a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Mode the plan ran in.
    pub mode: ExecutionMode,
    /// Per-run backup folder, set only once something was backed up.
    pub backup_root: Option<PathBuf>,
    /// Per-action results in plan order.
    pub outcomes: Vec<ActionOutcome>,
    /// Bytes freed (or that would be freed).
    pub space_saved_bytes: u64,
    /// Actions fully or partially applied.
    pub applied: usize,
    /// Actions counted in simulate mode.
    pub simulated: usize,
    /// Actions skipped for low confidence.
    pub skipped_below_threshold: usize,
    /// Actions waiting for a confirmation token.
    pub awaiting_confirmation: usize,
    /// Advisory-only actions.
    pub advisory: usize,
    /// Actions with at least one failure.
    pub failed_actions: usize,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// Files that could not be fingerprinted during analysis.
    pub unanalyzable_files: u64,
}

impl ExecutionReport {
    /// Create an empty report.
    pub fn new(mode: ExecutionMode, unanalyzable_files: u64) -> Self {
        Self {
            mode,
            backup_root: None,
            outcomes: Vec::new(),
            space_saved_bytes: 0,
            applied: 0,
            simulated: 0,
            skipped_below_threshold: 0,
            awaiting_confirmation: 0,
            advisory: 0,
            failed_actions: 0,
            cancelled: false,
            unanalyzable_files,
        }
    }

    /// Add an outcome and update the counters.
    pub fn record(&mut self, outcome: ActionOutcome) {
        self.space_saved_bytes += outcome.bytes_freed;
        match outcome.status {
            ActionStatus::Simulated => self.simulated += 1,
            ActionStatus::Applied => self.applied += 1,
            ActionStatus::PartiallyApplied => {
                self.applied += 1;
                self.failed_actions += 1;
            }
            ActionStatus::SkippedBelowThreshold => self.skipped_below_threshold += 1,
            ActionStatus::AwaitingConfirmation => self.awaiting_confirmation += 1,
            ActionStatus::Advisory => self.advisory += 1,
            ActionStatus::Failed => self.failed_actions += 1,
            ActionStatus::Cancelled => self.cancelled = true,
        }
        self.outcomes.push(outcome);
    }

    /// Whether any action reported a failure.
    pub fn has_failures(&self) -> bool {
        self.failed_actions > 0
    }
}
