//! Core types for syncsift.
//!
//! This crate provides the data model shared by the scan, analyze and ops
//! crates: file records and fingerprints, storage roots, nesting issues,
//! optimization actions, execution plans and reports, configuration and
//! errors.

mod action;
mod config;
mod error;
mod format;
mod inventory;
mod issue;
mod record;
mod report;
mod root;

pub use action::{
    ActionId, ActionKind, ConfidenceTier, ExecutionMode, ExecutionPlan, OptimizationAction,
    PlanSummary, REVIEW_CONFIDENCE, SAFE_CONFIDENCE,
};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, DEFAULT_IGNORED_DIRS, DEFAULT_TEMPORARY_PATTERNS,
};
pub use error::{ScanWarning, SiftError, WarningKind};
pub use format::{format_age, format_size};
pub use inventory::{Inventory, InventoryStats, RootStats};
pub use issue::{NestingIssue, NestingKind, Severity};
pub use record::{FileRecord, Fingerprint, FingerprintKind, MetadataHint, ScoredFile, extension_of};
pub use report::{ActionError, ActionOutcome, ActionStatus, ExecutionReport};
pub use root::{StorageRoot, is_descendant, normalize_lexically, validate_roots};
