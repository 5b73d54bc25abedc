//! Duplicate grouping by size, then fingerprint.
//!
//! 1. Partition records by exact size; singletons cannot have duplicates.
//! 2. Fingerprint members of multi-member partitions in parallel.
//! 3. Partition by fingerprint and keep groups of two or more.
//!
//! Zero-length files are never grouped.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use syncsift_core::{FileRecord, Fingerprint, ScanWarning, WarningKind};
use syncsift_scan::Fingerprinter;

/// Files sharing one fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Shared fingerprint.
    pub fingerprint: Fingerprint,
    /// Size of each member in bytes.
    pub size: u64,
    /// Members ordered by path, each carrying its fingerprint.
    pub members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Number of members.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Bytes freed by keeping a single member.
    pub fn wasted_bytes(&self) -> u64 {
        self.size * self.members.len().saturating_sub(1) as u64
    }

    /// Whether membership relied on a sampled fingerprint.
    pub fn is_sampled(&self) -> bool {
        self.fingerprint.is_sampled()
    }

    /// Paths of all members.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.members.iter().map(|m| &m.path)
    }
}

/// Results from duplicate grouping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupingReport {
    /// Groups ordered by their first member's path.
    pub groups: Vec<DuplicateGroup>,
    /// Records considered (non-empty files).
    pub files_considered: u64,
    /// Records that were fingerprinted.
    pub files_fingerprinted: u64,
    /// Records whose content could not be read.
    pub unanalyzable_files: u64,
    /// One warning per unreadable file.
    pub warnings: Vec<ScanWarning>,
    /// Whether grouping stopped early on cancellation.
    pub cancelled: bool,
}

impl GroupingReport {
    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Total bytes recoverable by keeping one member per group.
    pub fn total_wasted_bytes(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::wasted_bytes).sum()
    }
}

enum Hashed {
    Done(FileRecord),
    Unreadable(ScanWarning),
    Skipped,
}

/// Groups file records into duplicate sets.
pub struct DuplicateGrouper {
    fingerprinter: Fingerprinter,
}

impl DuplicateGrouper {
    /// Create a grouper with the default fingerprinter.
    pub fn new() -> Self {
        Self {
            fingerprinter: Fingerprinter::new(),
        }
    }

    /// Create a grouper with a custom fingerprinter.
    pub fn with_fingerprinter(fingerprinter: Fingerprinter) -> Self {
        Self { fingerprinter }
    }

    /// Group `records`. Records that already carry a fingerprint are not
    /// re-read.
    pub fn group(&self, records: &[FileRecord], cancel: &CancellationToken) -> GroupingReport {
        let mut report = GroupingReport::default();

        let mut by_size: BTreeMap<u64, Vec<&FileRecord>> = BTreeMap::new();
        for record in records.iter().filter(|r| r.size > 0) {
            by_size.entry(record.size).or_default().push(record);
        }
        report.files_considered = by_size.values().map(|v| v.len() as u64).sum();

        let candidates: Vec<&FileRecord> = by_size
            .into_values()
            .filter(|members| members.len() > 1)
            .flatten()
            .collect();

        debug!(candidates = candidates.len(), "fingerprinting size-matched files");

        let hashed: Vec<Hashed> = candidates
            .par_iter()
            .map(|record| {
                if cancel.is_cancelled() {
                    return Hashed::Skipped;
                }
                if record.fingerprint.is_some() {
                    return Hashed::Done((*record).clone());
                }
                match self.fingerprinter.fingerprint_record(record) {
                    Ok(r) => Hashed::Done(r),
                    Err(err) => {
                        warn!(path = %record.path.display(), "cannot fingerprint: {err}");
                        Hashed::Unreadable(ScanWarning::new(
                            &record.path,
                            err.to_string(),
                            WarningKind::ReadError,
                        ))
                    }
                }
            })
            .collect();

        let mut by_fingerprint: BTreeMap<(u64, Fingerprint), Vec<FileRecord>> = BTreeMap::new();
        for item in hashed {
            match item {
                Hashed::Done(record) => {
                    report.files_fingerprinted += 1;
                    if let Some(fp) = record.fingerprint {
                        by_fingerprint.entry((record.size, fp)).or_default().push(record);
                    }
                }
                Hashed::Unreadable(warning) => {
                    report.unanalyzable_files += 1;
                    report.warnings.push(warning);
                }
                Hashed::Skipped => report.cancelled = true,
            }
        }

        let mut groups: Vec<DuplicateGroup> = by_fingerprint
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|((size, fingerprint), mut members)| {
                members.sort_by(|a, b| a.path.cmp(&b.path));
                DuplicateGroup {
                    fingerprint,
                    size,
                    members,
                }
            })
            .collect();

        groups.sort_by(|a, b| a.members[0].path.cmp(&b.members[0].path));
        report.warnings.sort_by(|a, b| a.path.cmp(&b.path));
        report.groups = groups;
        report
    }
}

impl Default for DuplicateGrouper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn record(path: PathBuf, root: &str) -> FileRecord {
        let size = fs::metadata(&path).unwrap().len();
        FileRecord::new(path, size, SystemTime::now(), root)
    }

    #[test]
    fn test_groups_identical_content() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.txt"), "same content").unwrap();
        fs::write(temp.path().join("a.txt"), "same content").unwrap();
        fs::write(temp.path().join("c.txt"), "diff content").unwrap();
        fs::write(temp.path().join("d.txt"), "unique").unwrap();

        let records: Vec<FileRecord> = ["a.txt", "b.txt", "c.txt", "d.txt"]
            .iter()
            .map(|n| record(temp.path().join(n), "r"))
            .collect();

        let report = DuplicateGrouper::new().group(&records, &CancellationToken::new());
        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert_eq!(group.count(), 2);
        assert!(group.members[0].path.ends_with("a.txt"));
        assert!(group.members[1].path.ends_with("b.txt"));
        assert_eq!(group.wasted_bytes(), 12);
        assert_eq!(report.files_fingerprinted, 3);
    }

    #[test]
    fn test_zero_length_files_are_excluded() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("x")).unwrap();
        fs::write(temp.path().join("empty"), "").unwrap();
        fs::write(temp.path().join("x/empty"), "").unwrap();

        let records = vec![
            record(temp.path().join("empty"), "r"),
            record(temp.path().join("x/empty"), "r"),
        ];
        let report = DuplicateGrouper::new().group(&records, &CancellationToken::new());
        assert!(!report.has_duplicates());
        assert_eq!(report.files_considered, 0);
    }

    #[test]
    fn test_unreadable_file_is_counted() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "12345").unwrap();
        let records = vec![
            record(temp.path().join("a"), "r"),
            FileRecord::new(temp.path().join("gone"), 5, SystemTime::now(), "r"),
        ];
        let report = DuplicateGrouper::new().group(&records, &CancellationToken::new());
        assert!(!report.has_duplicates());
        assert_eq!(report.unanalyzable_files, 1);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_cancelled_grouping_reports_cancellation() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "x").unwrap();
        fs::write(temp.path().join("b"), "x").unwrap();
        let records = vec![
            record(temp.path().join("a"), "r"),
            record(temp.path().join("b"), "r"),
        ];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = DuplicateGrouper::new().group(&records, &cancel);
        assert!(report.cancelled);
        assert!(!report.has_duplicates());
    }
}
