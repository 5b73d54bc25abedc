//! Plan execution in simulate or real mode.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use syncsift_core::{
    ActionError, ActionId, ActionKind, ActionOutcome, ActionStatus, AnalysisConfig, ExecutionMode,
    ExecutionPlan, ExecutionReport, OptimizationAction, SAFE_CONFIDENCE, SiftError, StorageRoot,
};
use syncsift_scan::path_size;

use crate::OPERATION_CHANNEL_SIZE;
use crate::fsops::{copy_item, move_item, remove_item, unique_path};
use crate::progress::ExecutionProgress;

/// Folder used under a backup run for paths outside every root.
const EXTERNAL_DIR: &str = "_external";

/// Options that govern which actions may mutate the filesystem.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Minimum confidence for unconfirmed actions.
    pub threshold: u8,
    /// Action ids the caller has explicitly confirmed.
    pub confirmed: HashSet<ActionId>,
    /// Backup location, used when the plan names none.
    pub backup_dir: Option<PathBuf>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            threshold: SAFE_CONFIDENCE,
            confirmed: HashSet::new(),
            backup_dir: None,
        }
    }
}

impl ExecutionOptions {
    /// Options carrying the configured threshold and backup location.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            threshold: config.destructive_confidence_threshold,
            confirmed: HashSet::new(),
            backup_dir: config.backup_dir.clone(),
        }
    }

    /// Set the destructive confidence threshold.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    /// Confirm an action by id.
    pub fn confirm(mut self, id: impl Into<String>) -> Self {
        self.confirmed.insert(ActionId::new(id));
        self
    }

    /// Set the backup location.
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    fn authorizes(&self, action: &OptimizationAction) -> bool {
        if self.confirmed.contains(&action.id) {
            return true;
        }
        !action.requires_confirmation && action.confidence >= self.threshold
    }
}

/// Applies an [`ExecutionPlan`].
///
/// In simulate mode nothing is written and every non-advisory action reports
/// its planned estimate, whether or not it would need confirmation. In real
/// mode only authorized actions run: files are copied into a per-run backup
/// folder before they are removed, and relocations and archives are moves.
pub struct Executor {
    options: ExecutionOptions,
    progress_tx: broadcast::Sender<ExecutionProgress>,
}

impl Executor {
    /// Create an executor with default options.
    pub fn new() -> Self {
        Self::with_options(ExecutionOptions::default())
    }

    /// Create an executor with custom options.
    pub fn with_options(options: ExecutionOptions) -> Self {
        let (progress_tx, _) = broadcast::channel(OPERATION_CHANNEL_SIZE);
        Self {
            options,
            progress_tx,
        }
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionProgress> {
        self.progress_tx.subscribe()
    }

    /// Execute `plan`.
    pub fn execute(&self, plan: &ExecutionPlan) -> Result<ExecutionReport, SiftError> {
        self.execute_with_cancel(plan, &CancellationToken::new())
    }

    /// Execute `plan`, stopping between files when `cancel` fires.
    ///
    /// Only configuration problems are errors. Per-file failures are
    /// recorded on the action's outcome and the remaining actions still run.
    pub fn execute_with_cancel(
        &self,
        plan: &ExecutionPlan,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, SiftError> {
        if self.options.threshold > 100 {
            return Err(SiftError::config(
                "Destructive confidence threshold must be at most 100",
            ));
        }

        let backup_base = plan
            .backup_root
            .clone()
            .or_else(|| self.options.backup_dir.clone());
        if plan.mode == ExecutionMode::Real && backup_base.is_none() {
            return Err(SiftError::config(
                "Real mode requires a backup directory",
            ));
        }

        let mut run = Run {
            plan,
            cancel,
            backup_base,
            backup_run: None,
            progress: ExecutionProgress::new(plan.actions.len()),
            progress_tx: &self.progress_tx,
        };
        let mut report = ExecutionReport::new(plan.mode, plan.unanalyzable_files);

        for action in &plan.actions {
            let outcome = if cancel.is_cancelled() {
                ActionOutcome::new(action.id.clone(), action.kind, ActionStatus::Cancelled, 0)
            } else {
                run.progress.current_action = Some(action.id.clone());
                run.progress.current_kind = Some(action.kind);
                self.process(&mut run, action)
            };

            run.progress.actions_completed += 1;
            run.progress.bytes_freed += outcome.bytes_freed;
            run.progress.errors_count += outcome.errors.len();
            run.progress.current_path = None;
            let _ = self.progress_tx.send(run.progress.clone());

            report.record(outcome);
        }

        report.backup_root = run.backup_run;
        info!(
            mode = %plan.mode,
            applied = report.applied,
            simulated = report.simulated,
            failed = report.failed_actions,
            bytes = report.space_saved_bytes,
            "plan execution finished"
        );
        Ok(report)
    }

    fn process(&self, run: &mut Run<'_>, action: &OptimizationAction) -> ActionOutcome {
        let outcome = |status: ActionStatus, bytes: u64| {
            ActionOutcome::new(action.id.clone(), action.kind, status, bytes)
        };

        if action.is_advisory() {
            return outcome(ActionStatus::Advisory, 0);
        }
        if run.plan.mode == ExecutionMode::Simulate {
            if !self.options.authorizes(action) {
                debug!(id = %action.id, confidence = action.confidence, "would need confirmation");
            }
            return outcome(ActionStatus::Simulated, action.estimated_space_saved_bytes);
        }
        if !self.options.authorizes(action) {
            let status = if action.requires_confirmation {
                ActionStatus::AwaitingConfirmation
            } else {
                ActionStatus::SkippedBelowThreshold
            };
            debug!(id = %action.id, confidence = action.confidence, %status, "action not authorized");
            return outcome(status, 0);
        }

        match action.kind {
            ActionKind::DeduplicateFile | ActionKind::RemoveTemporaryFiles => {
                run.backup_then_delete(action)
            }
            ActionKind::ArchiveOldFiles => run.archive(action),
            ActionKind::RelocateNestedRoot => run.relocate(action),
            ActionKind::NarrowMultiSyncFolder => outcome(ActionStatus::Advisory, 0),
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable state of one execution.
struct Run<'a> {
    plan: &'a ExecutionPlan,
    cancel: &'a CancellationToken,
    backup_base: Option<PathBuf>,
    backup_run: Option<PathBuf>,
    progress: ExecutionProgress,
    progress_tx: &'a broadcast::Sender<ExecutionProgress>,
}

/// Per-action tally.
struct Tally {
    bytes: u64,
    succeeded: usize,
    errors: Vec<ActionError>,
    cancelled: bool,
}

impl Tally {
    fn new() -> Self {
        Self {
            bytes: 0,
            succeeded: 0,
            errors: Vec::new(),
            cancelled: false,
        }
    }

    fn fail(&mut self, path: &Path, message: impl Into<String>) {
        let message = message.into();
        warn!(path = %path.display(), "{message}");
        self.errors.push(ActionError::new(path, message));
    }

    fn into_outcome(self, action: &OptimizationAction) -> ActionOutcome {
        let status = if self.cancelled {
            ActionStatus::Cancelled
        } else if self.errors.is_empty() {
            ActionStatus::Applied
        } else if self.succeeded > 0 {
            ActionStatus::PartiallyApplied
        } else {
            ActionStatus::Failed
        };
        let mut outcome = ActionOutcome::new(action.id.clone(), action.kind, status, self.bytes);
        outcome.errors = self.errors;
        outcome
    }
}

impl Run<'_> {
    fn set_current(&mut self, path: &Path) {
        self.progress.current_path = Some(path.to_path_buf());
        let _ = self.progress_tx.send(self.progress.clone());
    }

    /// The per-run backup folder, created on first use.
    fn ensure_backup_run(&mut self) -> Result<PathBuf, SiftError> {
        if let Some(dir) = &self.backup_run {
            return Ok(dir.clone());
        }
        let base = self
            .backup_base
            .clone()
            .ok_or_else(|| SiftError::config("Real mode requires a backup directory"))?;
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let dir = unique_path(&base.join(stamp));
        std::fs::create_dir_all(&dir).map_err(|e| SiftError::io(&dir, e))?;
        info!(path = %dir.display(), "created backup folder");
        self.backup_run = Some(dir.clone());
        Ok(dir)
    }

    /// Where `target` is mirrored inside the backup folder.
    fn backup_path(&mut self, target: &Path) -> Result<PathBuf, SiftError> {
        let run = self.ensure_backup_run()?;
        let (prefix, relative) = match owning_root(&self.plan.roots, target) {
            Some((root, relative)) => (root.id.to_string(), relative),
            None => (EXTERNAL_DIR.to_string(), strip_root(target)),
        };
        Ok(unique_path(&run.join(prefix).join(relative)))
    }

    fn backup_then_delete(&mut self, action: &OptimizationAction) -> ActionOutcome {
        let mut tally = Tally::new();

        if let Some(keep) = &action.keep_path {
            if !keep.exists() {
                tally.fail(keep, "Canonical copy is missing; nothing was removed");
                return tally.into_outcome(action);
            }
        }

        for target in &action.targets {
            if self.cancel.is_cancelled() {
                tally.cancelled = true;
                break;
            }
            self.set_current(target);

            if !target.exists() {
                tally.fail(target, "Target no longer exists");
                continue;
            }
            let size = path_size(target, self.cancel);

            let dest = match self.backup_path(target) {
                Ok(dest) => dest,
                Err(e) => {
                    tally.fail(target, e.to_string());
                    continue;
                }
            };
            if let Err(e) = copy_item(target, &dest) {
                tally.fail(target, format!("Backup failed: {e}"));
                continue;
            }

            // A cancellation after the backup leaves the original in place.
            if self.cancel.is_cancelled() {
                tally.cancelled = true;
                break;
            }

            match remove_item(target) {
                Ok(()) => {
                    debug!(path = %target.display(), backup = %dest.display(), "removed");
                    tally.bytes += size;
                    tally.succeeded += 1;
                }
                Err(e) => tally.fail(target, format!("Remove failed: {e}")),
            }
        }

        tally.into_outcome(action)
    }

    fn archive(&mut self, action: &OptimizationAction) -> ActionOutcome {
        let mut tally = Tally::new();

        for target in &action.targets {
            if self.cancel.is_cancelled() {
                tally.cancelled = true;
                break;
            }
            self.set_current(target);

            let dest = match &action.destination {
                Some(dir) => {
                    let name = target.file_name().unwrap_or(target.as_os_str());
                    Ok(unique_path(&dir.join(name)))
                }
                None => self.backup_path(target),
            };
            let dest = match dest {
                Ok(dest) => dest,
                Err(e) => {
                    tally.fail(target, e.to_string());
                    continue;
                }
            };

            match move_item(target, &dest) {
                Ok(bytes) => {
                    debug!(path = %target.display(), dest = %dest.display(), "archived");
                    tally.bytes += bytes;
                    tally.succeeded += 1;
                }
                Err(e) => tally.fail(target, format!("Archive failed: {e}")),
            }
        }

        tally.into_outcome(action)
    }

    fn relocate(&mut self, action: &OptimizationAction) -> ActionOutcome {
        let mut tally = Tally::new();

        let Some(destination) = &action.destination else {
            if let Some(target) = action.targets.first() {
                tally.fail(target, "Relocation has no destination");
            }
            return tally.into_outcome(action);
        };

        for target in &action.targets {
            if self.cancel.is_cancelled() {
                tally.cancelled = true;
                break;
            }
            self.set_current(target);

            if destination.exists() {
                tally.fail(
                    target,
                    format!("Destination {} already exists", destination.display()),
                );
                continue;
            }
            if destination.starts_with(target) {
                tally.fail(target, "Destination lies inside the folder being moved");
                continue;
            }

            match move_item(target, destination) {
                Ok(bytes) => {
                    info!(from = %target.display(), to = %destination.display(), "relocated root");
                    tally.bytes += bytes;
                    tally.succeeded += 1;
                }
                Err(e) => tally.fail(target, format!("Move failed: {e}")),
            }
        }

        tally.into_outcome(action)
    }
}

/// The innermost root containing `path`, with the path relative to it.
fn owning_root<'a>(roots: &'a [StorageRoot], path: &Path) -> Option<(&'a StorageRoot, PathBuf)> {
    roots
        .iter()
        .flat_map(|root| [(root, root.path.clone()), (root, root.normalized_path())])
        .filter_map(|(root, base)| {
            let relative = path.strip_prefix(&base).ok()?.to_path_buf();
            Some((root, base.components().count(), relative))
        })
        .max_by_key(|(_, depth, _)| *depth)
        .map(|(root, _, relative)| (root, relative))
}

/// `path` without its root and prefix components.
fn strip_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization() {
        let options = ExecutionOptions::default().confirm("abc");
        let mut action = OptimizationAction {
            id: ActionId::new("xyz"),
            kind: ActionKind::DeduplicateFile,
            targets: vec![PathBuf::from("/x")],
            keep_path: None,
            destination: None,
            estimated_space_saved_bytes: 0,
            confidence: 95,
            severity: None,
            sampled_match: false,
            requires_confirmation: false,
            description: String::new(),
            steps: Vec::new(),
        };
        assert!(options.authorizes(&action));

        action.confidence = 89;
        assert!(!options.authorizes(&action));
        assert!(options.clone().with_threshold(80).authorizes(&action));

        action.confidence = 100;
        action.requires_confirmation = true;
        assert!(!options.authorizes(&action));

        action.id = ActionId::new("abc");
        assert!(options.authorizes(&action));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = AnalysisConfig::default();
        config.destructive_confidence_threshold = 95;
        config.backup_dir = Some(PathBuf::from("/backups"));

        let options = ExecutionOptions::from_config(&config);
        assert_eq!(options.threshold, 95);
        assert_eq!(options.backup_dir, Some(PathBuf::from("/backups")));

        let action = OptimizationAction {
            id: ActionId::new("a"),
            kind: ActionKind::RemoveTemporaryFiles,
            targets: vec![PathBuf::from("/x.tmp")],
            keep_path: None,
            destination: None,
            estimated_space_saved_bytes: 1,
            confidence: 92,
            severity: None,
            sampled_match: false,
            requires_confirmation: false,
            description: String::new(),
            steps: Vec::new(),
        };
        assert!(!options.authorizes(&action));
        assert!(ExecutionOptions::default().authorizes(&action));
    }

    #[test]
    fn test_owning_root_prefers_innermost() {
        let roots = vec![
            StorageRoot::new("outer", "/sync"),
            StorageRoot::new("inner", "/sync/inner"),
        ];
        let (root, rel) = owning_root(&roots, Path::new("/sync/inner/a/b.txt")).unwrap();
        assert_eq!(root.id, "inner");
        assert_eq!(rel, PathBuf::from("a/b.txt"));

        assert!(owning_root(&roots, Path::new("/elsewhere/c")).is_none());
        assert_eq!(strip_root(Path::new("/elsewhere/c")), PathBuf::from("elsewhere/c"));
    }
}
