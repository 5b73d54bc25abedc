//! Turns duplicate groups, nesting issues and housekeeping findings into an
//! ordered [`ExecutionPlan`].
//!
//! The planner only proposes. Remediation for structural problems is carried
//! as advisory steps; nothing here touches the filesystem or a sync client's
//! settings.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

use syncsift_analyze::{
    CanonicalSelection, CanonicalSelector, DuplicateGroup, FileBatch, HousekeepingReport,
};
use syncsift_core::{
    ActionId, ActionKind, AnalysisConfig, ConfidenceTier, ExecutionPlan, FileRecord,
    NestingIssue, NestingKind, OptimizationAction, REVIEW_CONFIDENCE, StorageRoot, format_size,
};

/// Confidence of a stale-file archive proposal.
pub const ARCHIVE_CONFIDENCE: u8 = 70;
/// Confidence of removing temporary files older than the protection window.
pub const SETTLED_TEMP_CONFIDENCE: u8 = 95;
/// Confidence of removing temporary files inside the protection window.
pub const RECENT_TEMP_CONFIDENCE: u8 = 60;

/// Hex characters kept from the action digest.
const ACTION_ID_LEN: usize = 12;

/// Builds execution plans.
#[derive(Debug, Clone)]
pub struct ActionPlanner {
    selector: CanonicalSelector,
    roots: Vec<StorageRoot>,
    age_protection: Duration,
}

impl ActionPlanner {
    /// Create a planner with default settings.
    pub fn new(roots: Vec<StorageRoot>) -> Self {
        Self {
            selector: CanonicalSelector::new().with_roots(&roots),
            roots,
            age_protection: AnalysisConfig::default().age_protection(),
        }
    }

    /// Create a planner from an analysis config.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            selector: CanonicalSelector::from_config(config),
            roots: config.roots.clone(),
            age_protection: config.age_protection(),
        }
    }

    /// Plan deduplication and nesting remediation.
    pub fn plan(
        &self,
        groups: &[DuplicateGroup],
        issues: &[NestingIssue],
        now: SystemTime,
    ) -> ExecutionPlan {
        self.plan_with_housekeeping(groups, issues, &HousekeepingReport::default(), now)
    }

    /// Plan deduplication, nesting remediation and housekeeping.
    ///
    /// Housekeeping never targets a file that a deduplication action already
    /// removes or keeps.
    pub fn plan_with_housekeeping(
        &self,
        groups: &[DuplicateGroup],
        issues: &[NestingIssue],
        housekeeping: &HousekeepingReport,
        now: SystemTime,
    ) -> ExecutionPlan {
        let mut actions = Vec::new();
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        for group in groups {
            let Some(selection) = self.selector.select(group, now) else {
                continue;
            };
            claimed.insert(selection.canonical.record.path.clone());
            if let Some(action) = dedup_action(group, &selection) {
                claimed.extend(action.targets.iter().cloned());
                actions.push(action);
            }
        }

        for issue in issues {
            actions.push(self.nesting_action(issue));
        }

        for batch in &housekeeping.stale {
            let files = unclaimed(batch, &claimed);
            if let Some(action) = archive_action(&batch.root_id, &files) {
                actions.push(action);
            }
        }

        for batch in &housekeeping.temporary {
            let (settled, recent): (Vec<&FileRecord>, Vec<&FileRecord>) =
                unclaimed(batch, &claimed)
                    .into_iter()
                    .partition(|f| f.freshness_age(now) >= self.age_protection);
            for (files, confidence) in [
                (settled, SETTLED_TEMP_CONFIDENCE),
                (recent, RECENT_TEMP_CONFIDENCE),
            ] {
                if let Some(action) = temporary_action(&batch.root_id, &files, confidence) {
                    actions.push(action);
                }
            }
        }

        actions.sort_by(display_order);
        debug!(actions = actions.len(), "plan built");
        ExecutionPlan::new(actions, self.roots.clone())
    }

    fn root(&self, id: &str) -> Option<&StorageRoot> {
        self.roots.iter().find(|r| r.id == id)
    }

    fn root_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.root(id).map_or(id, StorageRoot::display_name)
    }

    fn nesting_action(&self, issue: &NestingIssue) -> OptimizationAction {
        let names: Vec<&str> = issue
            .involved_roots
            .iter()
            .map(|id| self.root_name(id))
            .collect();
        let folder = issue.path.clone();

        match issue.kind {
            NestingKind::ContainsRoot => {
                let outer = issue.involved_roots.first().and_then(|id| self.root(id));
                let destination = match (outer, &folder) {
                    (Some(outer), Some(nested)) => standalone_destination(&outer.path, nested),
                    _ => None,
                };
                let outer_name = names.first().copied().unwrap_or("the outer root");
                let inner_name = names.get(1).copied().unwrap_or("the nested root");
                let mut steps = vec![format!("Pause synchronization of {inner_name}")];
                if let Some(dest) = &destination {
                    steps.push(format!("Move its folder to {}", dest.display()));
                }
                steps.push(format!("Point {inner_name} at the new location"));
                steps.push(format!(
                    "Exclude the old location from {outer_name} and resume synchronization"
                ));

                structural(
                    ActionKind::RelocateNestedRoot,
                    issue,
                    folder.into_iter().collect(),
                    destination,
                    format!(
                        "Relocate {inner_name} outside {outer_name}: {} synced twice",
                        format_size(issue.estimated_wasted_bytes)
                    ),
                    steps,
                )
            }
            NestingKind::Cycle => {
                let chain = names.join(" -> ");
                structural(
                    ActionKind::RelocateNestedRoot,
                    issue,
                    Vec::new(),
                    None,
                    format!("Break the sync cycle {chain}"),
                    vec![
                        "Pause synchronization of every root in the cycle".to_string(),
                        "Choose one root to hold the shared content".to_string(),
                        "Move the other roots out of each other's folders".to_string(),
                        "Resume synchronization one root at a time".to_string(),
                    ],
                )
            }
            NestingKind::UniversalSync => {
                let folder_name = folder
                    .as_deref()
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "folder".to_string());
                let keeper = issue
                    .involved_roots
                    .iter()
                    .filter_map(|id| self.root(id))
                    .min_by_key(|root| root.priority)
                    .map(StorageRoot::display_name)
                    .or_else(|| names.first().copied())
                    .unwrap_or("one service");
                structural(
                    ActionKind::NarrowMultiSyncFolder,
                    issue,
                    folder.into_iter().collect(),
                    None,
                    format!(
                        "{folder_name} is synced by {}: keep one service",
                        names.join(", ")
                    ),
                    vec![
                        format!("Keep {folder_name} in {keeper}"),
                        format!("Exclude {folder_name} from every other service"),
                    ],
                )
            }
            NestingKind::BackupInSync => structural(
                ActionKind::ArchiveOldFiles,
                issue,
                folder.into_iter().collect(),
                None,
                format!(
                    "Archive backup folder out of {} ({})",
                    names.join(", "),
                    format_size(issue.estimated_wasted_bytes)
                ),
                vec![
                    "Check the folder is not the only copy of its content".to_string(),
                    "Move it into the backup area outside the synced root".to_string(),
                ],
            ),
            NestingKind::SystemFolderInRoot => structural(
                ActionKind::RemoveTemporaryFiles,
                issue,
                folder.into_iter().collect(),
                None,
                format!(
                    "Remove system folder from {} ({})",
                    names.join(", "),
                    format_size(issue.estimated_wasted_bytes)
                ),
                vec![
                    "Back the folder up".to_string(),
                    "Remove it and add it to the service's exclusion list".to_string(),
                ],
            ),
        }
    }
}

/// One dedup action per group, holding every safe or review removal.
fn dedup_action(group: &DuplicateGroup, selection: &CanonicalSelection) -> Option<OptimizationAction> {
    let removals: Vec<_> = selection
        .removals
        .iter()
        .filter(|r| r.tier() >= ConfidenceTier::Review)
        .collect();
    let confidence = removals.iter().map(|r| r.confidence).min()?;
    let targets: Vec<PathBuf> = removals.iter().map(|r| r.file.record.path.clone()).collect();
    let keep = selection.canonical.record.path.clone();
    let saved = group.size * targets.len() as u64;

    let mut description = format!(
        "Keep {}, remove {} duplicate{} ({})",
        keep.display(),
        targets.len(),
        if targets.len() == 1 { "" } else { "s" },
        format_size(saved)
    );
    if selection.sampled {
        description.push_str("; matched on sampled content");
    }

    Some(OptimizationAction {
        id: action_id(ActionKind::DeduplicateFile, &targets, Some(&keep)),
        kind: ActionKind::DeduplicateFile,
        targets,
        keep_path: Some(keep),
        destination: None,
        estimated_space_saved_bytes: saved,
        confidence,
        severity: None,
        sampled_match: selection.sampled,
        requires_confirmation: false,
        description,
        steps: Vec::new(),
    })
}

fn structural(
    kind: ActionKind,
    issue: &NestingIssue,
    targets: Vec<PathBuf>,
    destination: Option<PathBuf>,
    description: String,
    steps: Vec<String>,
) -> OptimizationAction {
    let advisory = kind == ActionKind::NarrowMultiSyncFolder || targets.is_empty();
    let id = if targets.is_empty() {
        let roots: Vec<PathBuf> = issue.involved_roots.iter().map(|r| PathBuf::from(r.as_str())).collect();
        action_id(kind, &roots, None)
    } else {
        action_id(kind, &targets, destination.as_deref())
    };

    OptimizationAction {
        id,
        kind,
        targets,
        keep_path: None,
        destination,
        estimated_space_saved_bytes: issue.estimated_wasted_bytes,
        confidence: if advisory { 0 } else { REVIEW_CONFIDENCE },
        severity: Some(issue.severity),
        sampled_match: false,
        requires_confirmation: !advisory,
        description,
        steps,
    }
}

fn archive_action(root_id: &str, files: &[&FileRecord]) -> Option<OptimizationAction> {
    if files.is_empty() {
        return None;
    }
    let targets: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
    let bytes: u64 = files.iter().map(|f| f.size).sum();
    Some(OptimizationAction {
        id: action_id(ActionKind::ArchiveOldFiles, &targets, None),
        kind: ActionKind::ArchiveOldFiles,
        estimated_space_saved_bytes: bytes,
        confidence: ARCHIVE_CONFIDENCE,
        severity: None,
        keep_path: None,
        destination: None,
        sampled_match: false,
        requires_confirmation: false,
        description: format!(
            "Archive {} stale file{} from {root_id} ({})",
            targets.len(),
            if targets.len() == 1 { "" } else { "s" },
            format_size(bytes)
        ),
        targets,
        steps: Vec::new(),
    })
}

fn temporary_action(
    root_id: &str,
    files: &[&FileRecord],
    confidence: u8,
) -> Option<OptimizationAction> {
    if files.is_empty() {
        return None;
    }
    let targets: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
    let bytes: u64 = files.iter().map(|f| f.size).sum();
    Some(OptimizationAction {
        id: action_id(ActionKind::RemoveTemporaryFiles, &targets, None),
        kind: ActionKind::RemoveTemporaryFiles,
        estimated_space_saved_bytes: bytes,
        confidence,
        severity: None,
        keep_path: None,
        destination: None,
        sampled_match: false,
        requires_confirmation: false,
        description: format!(
            "Remove {} temporary file{} from {root_id} ({})",
            targets.len(),
            if targets.len() == 1 { "" } else { "s" },
            format_size(bytes)
        ),
        targets,
        steps: Vec::new(),
    })
}

fn unclaimed<'a>(batch: &'a FileBatch, claimed: &HashSet<PathBuf>) -> Vec<&'a FileRecord> {
    batch
        .files
        .iter()
        .filter(|f| !claimed.contains(&f.path))
        .collect()
}

/// `<parent of outer root>/<nested name>_standalone`.
fn standalone_destination(outer: &Path, nested: &Path) -> Option<PathBuf> {
    let name = nested.file_name()?.to_string_lossy();
    Some(outer.parent()?.join(format!("{name}_standalone")))
}

/// Stable confirmation token: truncated BLAKE3 over kind and paths.
pub fn action_id(kind: ActionKind, targets: &[PathBuf], extra: Option<&Path>) -> ActionId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(format!("{kind:?}").as_bytes());
    for target in targets {
        hasher.update(b"\0");
        hasher.update(target.to_string_lossy().as_bytes());
    }
    if let Some(extra) = extra {
        hasher.update(b"\x01");
        hasher.update(extra.to_string_lossy().as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    ActionId::new(&hex.as_str()[..ACTION_ID_LEN])
}

fn display_order(a: &OptimizationAction, b: &OptimizationAction) -> Ordering {
    b.sort_rank()
        .cmp(&a.sort_rank())
        .then_with(|| b.estimated_space_saved_bytes.cmp(&a.estimated_space_saved_bytes))
        .then_with(|| a.id.cmp(&b.id))
}
