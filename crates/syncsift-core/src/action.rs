//! Optimization actions and execution plans.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::issue::Severity;
use crate::root::StorageRoot;

/// Confidence at or above which a removal is considered safe.
pub const SAFE_CONFIDENCE: u8 = 90;

/// Confidence at or above which a removal is worth reviewing.
pub const REVIEW_CONFIDENCE: u8 = 70;

/// Kind of optimization action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
pub enum ActionKind {
    /// Remove redundant copies, keeping the canonical file.
    #[strum(to_string = "Deduplicate")]
    DeduplicateFile,
    /// Move a nested root out of its parent root.
    #[strum(to_string = "Relocate nested root")]
    RelocateNestedRoot,
    /// Keep a multiply-synced folder in a single root.
    #[strum(to_string = "Narrow multi-sync folder")]
    NarrowMultiSyncFolder,
    /// Move old or backup content out of the synced area.
    #[strum(to_string = "Archive")]
    ArchiveOldFiles,
    /// Delete regenerable or temporary content.
    #[strum(to_string = "Remove temporary")]
    RemoveTemporaryFiles,
}

/// Tier derived from a confidence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ConfidenceTier {
    /// Never applied without an explicit confirmation.
    ManualOnly,
    /// Applied only when the caller lowers the threshold or confirms.
    Review,
    /// Eligible for automatic application.
    Safe,
}

impl ConfidenceTier {
    /// Tier for a confidence value.
    pub fn from_confidence(confidence: u8) -> Self {
        if confidence >= SAFE_CONFIDENCE {
            Self::Safe
        } else if confidence >= REVIEW_CONFIDENCE {
            Self::Review
        } else {
            Self::ManualOnly
        }
    }
}

/// Stable identifier of an action, echoed back by callers to confirm it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub String);

impl ActionId {
    /// Wrap a token string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single planned change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationAction {
    /// Confirmation token.
    pub id: ActionId,
    /// Kind of change.
    pub kind: ActionKind,
    /// Paths to remove or move.
    pub targets: Vec<PathBuf>,
    /// File kept in place (deduplication only).
    pub keep_path: Option<PathBuf>,
    /// Where moved content goes (relocation only).
    pub destination: Option<PathBuf>,
    /// Bytes freed if the action is applied.
    pub estimated_space_saved_bytes: u64,
    /// Confidence in `0..=100` that applying is safe.
    pub confidence: u8,
    /// Severity of the underlying nesting issue, for structural actions.
    pub severity: Option<Severity>,
    /// Whether the duplicate match relied on sampled fingerprints.
    #[serde(default)]
    pub sampled_match: bool,
    /// Whether the action can only run with an explicit confirmation token.
    #[serde(default)]
    pub requires_confirmation: bool,
    /// Human-readable justification.
    pub description: String,
    /// Advisory remediation steps.
    #[serde(default)]
    pub steps: Vec<String>,
}

impl OptimizationAction {
    /// Tier of this action's confidence.
    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_confidence(self.confidence)
    }

    /// Primary display ordering key: severity rank for structural actions,
    /// confidence otherwise.
    pub fn sort_rank(&self) -> u8 {
        self.severity.map_or(self.confidence, |s| s.rank())
    }

    /// Whether the execution engine has anything to do for this action.
    pub fn is_advisory(&self) -> bool {
        self.kind == ActionKind::NarrowMultiSyncFolder || self.targets.is_empty()
    }
}

/// How a plan is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionMode {
    /// Report only, never touch the filesystem.
    #[default]
    Simulate,
    /// Back up, then delete or move.
    Real,
}

/// Ordered actions plus the context needed to execute them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Execution mode.
    pub mode: ExecutionMode,
    /// Actions in display order.
    pub actions: Vec<OptimizationAction>,
    /// Roots the plan was computed for; used to mirror relative paths in
    /// the backup tree.
    pub roots: Vec<StorageRoot>,
    /// Directory under which the per-run backup folder is created.
    pub backup_root: Option<PathBuf>,
    /// Files that could not be fingerprinted.
    pub unanalyzable_files: u64,
}

impl ExecutionPlan {
    /// Create a simulate-mode plan.
    pub fn new(actions: Vec<OptimizationAction>, roots: Vec<StorageRoot>) -> Self {
        Self {
            mode: ExecutionMode::Simulate,
            actions,
            roots,
            backup_root: None,
            unanalyzable_files: 0,
        }
    }

    /// Switch the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the backup directory.
    pub fn with_backup_root(mut self, backup_root: impl Into<PathBuf>) -> Self {
        self.backup_root = Some(backup_root.into());
        self
    }

    /// Look up an action by id.
    pub fn action(&self, id: &ActionId) -> Option<&OptimizationAction> {
        self.actions.iter().find(|a| &a.id == id)
    }

    /// Total estimated bytes freed by every action.
    pub fn total_estimated_bytes(&self) -> u64 {
        self.actions.iter().map(|a| a.estimated_space_saved_bytes).sum()
    }

    /// Counts by tier and kind.
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for action in &self.actions {
            summary.total_actions += 1;
            summary.total_estimated_bytes += action.estimated_space_saved_bytes;
            *summary.by_kind.entry(action.kind).or_default() += 1;
            match action.tier() {
                ConfidenceTier::Safe => summary.safe += 1,
                ConfidenceTier::Review => summary.review += 1,
                ConfidenceTier::ManualOnly => summary.manual_only += 1,
            }
        }
        summary
    }
}

/// Aggregate view of a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Number of actions.
    pub total_actions: usize,
    /// Actions in the safe tier.
    pub safe: usize,
    /// Actions in the review tier.
    pub review: usize,
    /// Actions in the manual-only tier.
    pub manual_only: usize,
    /// Actions per kind.
    pub by_kind: BTreeMap<ActionKind, usize>,
    /// Sum of estimated savings.
    pub total_estimated_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(kind: ActionKind, confidence: u8, bytes: u64) -> OptimizationAction {
        OptimizationAction {
            id: ActionId::new(format!("{kind:?}-{confidence}")),
            kind,
            targets: vec![PathBuf::from("/x")],
            keep_path: None,
            destination: None,
            estimated_space_saved_bytes: bytes,
            confidence,
            severity: None,
            sampled_match: false,
            requires_confirmation: false,
            description: String::new(),
            steps: Vec::new(),
        }
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(ConfidenceTier::from_confidence(100), ConfidenceTier::Safe);
        assert_eq!(ConfidenceTier::from_confidence(90), ConfidenceTier::Safe);
        assert_eq!(ConfidenceTier::from_confidence(89), ConfidenceTier::Review);
        assert_eq!(ConfidenceTier::from_confidence(70), ConfidenceTier::Review);
        assert_eq!(ConfidenceTier::from_confidence(69), ConfidenceTier::ManualOnly);
    }

    #[test]
    fn test_plan_summary() {
        let plan = ExecutionPlan::new(
            vec![
                action(ActionKind::DeduplicateFile, 95, 10),
                action(ActionKind::DeduplicateFile, 75, 20),
                action(ActionKind::RemoveTemporaryFiles, 60, 5),
            ],
            Vec::new(),
        );
        let summary = plan.summary();
        assert_eq!(summary.total_actions, 3);
        assert_eq!((summary.safe, summary.review, summary.manual_only), (1, 1, 1));
        assert_eq!(summary.by_kind[&ActionKind::DeduplicateFile], 2);
        assert_eq!(summary.total_estimated_bytes, 35);
        assert_eq!(plan.total_estimated_bytes(), 35);
    }

    #[test]
    fn test_sort_rank_prefers_severity() {
        let mut structural = action(ActionKind::RelocateNestedRoot, 0, 0);
        structural.severity = Some(Severity::Critical);
        assert_eq!(structural.sort_rank(), 100);
        assert_eq!(action(ActionKind::DeduplicateFile, 80, 0).sort_rank(), 80);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("real".parse::<ExecutionMode>().ok(), Some(ExecutionMode::Real));
        assert_eq!(ExecutionMode::default(), ExecutionMode::Simulate);
    }
}
