//! End-to-end analysis: inventory, grouping, nesting and housekeeping, then
//! planning.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

use syncsift_analyze::{DuplicateGroup, DuplicateGrouper, HousekeepingFinder, NestingAnalyzer};
use syncsift_core::{
    AnalysisConfig, ExecutionPlan, InventoryStats, NestingIssue, ScanWarning, SiftError,
};
use syncsift_scan::{Fingerprinter, InventoryBuilder, ScanProgress};

use crate::planner::ActionPlanner;

/// Everything one analysis pass produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    /// The proposed plan.
    pub plan: ExecutionPlan,
    /// Duplicate groups found.
    pub groups: Vec<DuplicateGroup>,
    /// Structural problems found.
    pub issues: Vec<NestingIssue>,
    /// Inventory statistics.
    pub stats: InventoryStats,
    /// Non-fatal problems from inventory and fingerprinting.
    pub warnings: Vec<ScanWarning>,
    /// Whether the pass stopped early.
    pub cancelled: bool,
}

/// Runs a full analysis pass over the configured roots.
pub struct AnalysisPipeline {
    inventory: InventoryBuilder,
}

impl AnalysisPipeline {
    /// Create a new pipeline.
    pub fn new() -> Self {
        Self {
            inventory: InventoryBuilder::new(),
        }
    }

    /// Subscribe to inventory progress.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.inventory.subscribe()
    }

    /// Run the pass. Only configuration problems are errors.
    pub fn run(
        &self,
        config: &AnalysisConfig,
        now: SystemTime,
        cancel: &CancellationToken,
    ) -> Result<AnalysisRun, SiftError> {
        let housekeeping = HousekeepingFinder::from_config(config)?;
        let inventory = self.inventory.build_with_cancel(config, cancel)?;

        let grouper = DuplicateGrouper::with_fingerprinter(Fingerprinter::from_config(config));
        let grouping = grouper.group(&inventory.records, cancel);
        let issues = NestingAnalyzer::from_config(config).analyze(&config.roots, cancel);
        let findings = housekeeping.find(&inventory.records, now);

        let mut plan = ActionPlanner::from_config(config).plan_with_housekeeping(
            &grouping.groups,
            &issues,
            &findings,
            now,
        );
        plan.mode = config.mode;
        plan.backup_root = config.backup_dir.clone();
        plan.unanalyzable_files = inventory.stats.unanalyzable_files + grouping.unanalyzable_files;

        let mut stats = inventory.stats;
        stats.unanalyzable_files = plan.unanalyzable_files;

        let mut warnings = inventory.warnings;
        warnings.extend(grouping.warnings);

        info!(
            files = stats.files_seen,
            groups = grouping.groups.len(),
            issues = issues.len(),
            actions = plan.actions.len(),
            "analysis complete"
        );

        Ok(AnalysisRun {
            plan,
            groups: grouping.groups,
            issues,
            stats,
            warnings,
            cancelled: inventory.cancelled || grouping.cancelled || cancel.is_cancelled(),
        })
    }
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new()
    }
}
