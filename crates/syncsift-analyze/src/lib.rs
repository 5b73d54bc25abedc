//! Analysis algorithms for syncsift.
//!
//! This crate turns an inventory into findings:
//!
//! - **Duplicate grouping** - partition by size, then by BLAKE3 fingerprint
//! - **Quality scoring** - recency, intrinsic quality, name and format signals
//! - **Canonical selection** - keep the best copy, rate every removal
//! - **Nesting analysis** - roots inside roots, cycles, folders synced twice
//! - **Housekeeping** - stale large files and temporary files
//!
//! # Duplicates
//!
//! ```rust,ignore
//! use std::time::SystemTime;
//! use syncsift_analyze::{CanonicalSelector, DuplicateGrouper};
//! use tokio_util::sync::CancellationToken;
//!
//! let report = DuplicateGrouper::new().group(&inventory.records, &CancellationToken::new());
//! let selector = CanonicalSelector::new();
//! for group in &report.groups {
//!     if let Some(selection) = selector.select(group, SystemTime::now()) {
//!         println!("keep {}", selection.canonical.path().display());
//!     }
//! }
//! ```
//!
//! # Nesting
//!
//! ```rust,ignore
//! use syncsift_analyze::NestingAnalyzer;
//!
//! let issues = NestingAnalyzer::from_config(&config).analyze(&config.roots, &cancel);
//! for issue in &issues {
//!     println!("[{}] {}", issue.severity, issue.description);
//! }
//! ```

mod canonical;
mod duplicates;
mod housekeeping;
mod nesting;
mod score;

pub use canonical::{CanonicalSelection, CanonicalSelector, RemovalCandidate};
pub use duplicates::{DuplicateGroup, DuplicateGrouper, GroupingReport};
pub use housekeeping::{FileBatch, HousekeepingFinder, HousekeepingReport, TemporaryFileMatcher};
pub use nesting::{
    BACKUP_KEYWORDS, NestingAnalyzer, NestingGraph, SYSTEM_FOLDERS, WELL_KNOWN_FOLDERS,
};
pub use score::{FileCategory, QualityScorer, ScoreBreakdown};

// Re-export core types
pub use syncsift_core::{FileRecord, NestingIssue, NestingKind, ScoredFile, Severity};
