//! Flat file inventory across storage roots.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::ScanWarning;
use crate::record::FileRecord;

/// Per-root counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootStats {
    /// Files recorded.
    pub files: u64,
    /// Bytes recorded.
    pub bytes: u64,
}

/// Summary statistics for an inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    /// Files recorded.
    pub files_seen: u64,
    /// Bytes recorded.
    pub bytes_seen: u64,
    /// Directories visited.
    pub dirs_seen: u64,
    /// Files seen but not recorded because their metadata was unreadable.
    pub unanalyzable_files: u64,
    /// Counters per root id.
    pub per_root: BTreeMap<CompactString, RootStats>,
    /// Largest file recorded (path, size).
    pub largest_file: Option<(PathBuf, u64)>,
    /// The depth limit cut off at least one subtree.
    pub depth_limit_hit: bool,
    /// The per-directory entry limit truncated at least one directory.
    pub level_limit_hit: bool,
    /// The total byte budget stopped the walk.
    pub byte_limit_hit: bool,
}

impl InventoryStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a file record.
    pub fn record_file(&mut self, record: &FileRecord) {
        self.files_seen += 1;
        self.bytes_seen += record.size;

        let root = self.per_root.entry(record.root_id.clone()).or_default();
        root.files += 1;
        root.bytes += record.size;

        if self.largest_file.as_ref().is_none_or(|(_, s)| record.size > *s) {
            self.largest_file = Some((record.path.clone(), record.size));
        }
    }

    /// Record a visited directory.
    pub fn record_dir(&mut self) {
        self.dirs_seen += 1;
    }

    /// Whether any scan limit truncated the inventory.
    pub fn limits_hit(&self) -> bool {
        self.depth_limit_hit || self.level_limit_hit || self.byte_limit_hit
    }
}

/// Records found under every root, plus statistics and warnings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    /// File records ordered by path.
    pub records: Vec<FileRecord>,
    /// Summary statistics.
    pub stats: InventoryStats,
    /// Non-fatal problems found during the walk.
    pub warnings: Vec<ScanWarning>,
    /// Time spent walking.
    pub scan_duration: Duration,
    /// Whether the walk stopped early on cancellation.
    pub cancelled: bool,
}

impl Inventory {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no file was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total bytes across all records.
    pub fn total_bytes(&self) -> u64 {
        self.stats.bytes_seen
    }

    /// Check if there were any warnings during the walk.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Records belonging to one root.
    pub fn records_for<'a>(&'a self, root_id: &'a str) -> impl Iterator<Item = &'a FileRecord> + 'a {
        self.records.iter().filter(move |r| r.root_id == root_id)
    }
}
