//! Structural problems between storage roots.

use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Kind of nesting problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum NestingKind {
    /// One registered root lies inside another.
    #[strum(to_string = "Root inside root")]
    ContainsRoot,
    /// A well-known user folder is synchronized by several roots.
    #[strum(to_string = "Folder synced by several roots")]
    UniversalSync,
    /// Containment relationships loop back on themselves.
    #[strum(to_string = "Sync cycle")]
    Cycle,
    /// A backup-style folder lives inside a synced root.
    #[strum(to_string = "Backup inside sync")]
    BackupInSync,
    /// A system or cache folder lives directly inside a synced root.
    #[strum(to_string = "System folder inside sync")]
    SystemFolderInRoot,
}

/// Severity of a nesting problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Rank on the 0-100 scale used to sort actions next to confidences.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 100,
            Self::High => 85,
            Self::Medium => 70,
        }
    }
}

/// A detected structural problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestingIssue {
    /// Kind of problem.
    pub kind: NestingKind,
    /// Ids of the roots involved, in a kind-specific order (outer root
    /// first for containment, traversal order for cycles).
    pub involved_roots: Vec<CompactString>,
    /// The offending folder, when the problem is tied to one.
    pub path: Option<PathBuf>,
    /// Estimated bytes stored more than once. Zero when unbounded.
    pub estimated_wasted_bytes: u64,
    /// Severity.
    pub severity: Severity,
    /// Human-readable summary.
    pub description: String,
}

impl NestingIssue {
    /// Create an issue.
    pub fn new(
        kind: NestingKind,
        involved_roots: Vec<CompactString>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            involved_roots,
            path: None,
            estimated_wasted_bytes: 0,
            severity,
            description: description.into(),
        }
    }

    /// Attach the offending folder.
    pub fn at(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the wasted-space estimate.
    pub fn wasting(mut self, bytes: u64) -> Self {
        self.estimated_wasted_bytes = bytes;
        self
    }
}
