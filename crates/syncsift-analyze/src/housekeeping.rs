//! Stale and temporary file detection.
//!
//! Works on inventory records only and never touches the filesystem.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use compact_str::CompactString;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use syncsift_core::{AnalysisConfig, FileRecord, SiftError};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Files from one storage root sharing a housekeeping category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBatch {
    /// Storage root the files belong to.
    pub root_id: CompactString,
    /// Files ordered by path.
    pub files: Vec<FileRecord>,
}

impl FileBatch {
    /// Total size of the batch.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the batch has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Results from housekeeping detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HousekeepingReport {
    /// Large files untouched for a long time, one batch per root.
    pub stale: Vec<FileBatch>,
    /// Temporary and lock files, one batch per root.
    pub temporary: Vec<FileBatch>,
}

impl HousekeepingReport {
    /// Check if anything was found.
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty() && self.temporary.is_empty()
    }
}

/// Case-insensitive file name matcher for temporary files.
#[derive(Debug, Clone)]
pub struct TemporaryFileMatcher {
    set: GlobSet,
}

impl TemporaryFileMatcher {
    /// Compile `patterns`. An invalid pattern is a configuration error.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, SiftError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .literal_separator(true)
                .build()
                .map_err(|e| SiftError::config(format!("Invalid temporary pattern '{pattern}': {e}")))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| SiftError::config(format!("Invalid temporary patterns: {e}")))?;
        Ok(Self { set })
    }

    /// Check a file name.
    pub fn is_match(&self, name: &str) -> bool {
        self.set.is_match(name)
    }
}

/// Finds stale files worth archiving and temporary files worth removing.
#[derive(Debug, Clone)]
pub struct HousekeepingFinder {
    matcher: TemporaryFileMatcher,
    stale_after: Duration,
    min_archive_bytes: u64,
}

impl HousekeepingFinder {
    /// Create a finder from an analysis config.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, SiftError> {
        Ok(Self {
            matcher: TemporaryFileMatcher::new(config.temporary_patterns.as_slice())?,
            stale_after: Duration::from_secs(config.stale_after_days * SECS_PER_DAY),
            min_archive_bytes: config.min_archive_bytes,
        })
    }

    /// Classify `records` relative to `now`. A temporary file is never also
    /// reported as stale.
    pub fn find(&self, records: &[FileRecord], now: SystemTime) -> HousekeepingReport {
        let mut stale: BTreeMap<CompactString, Vec<FileRecord>> = BTreeMap::new();
        let mut temporary: BTreeMap<CompactString, Vec<FileRecord>> = BTreeMap::new();

        for record in records {
            if self.matcher.is_match(record.name()) {
                temporary
                    .entry(record.root_id.clone())
                    .or_default()
                    .push(record.clone());
            } else if record.size >= self.min_archive_bytes && record.age(now) >= self.stale_after {
                stale
                    .entry(record.root_id.clone())
                    .or_default()
                    .push(record.clone());
            }
        }

        let report = HousekeepingReport {
            stale: into_batches(stale),
            temporary: into_batches(temporary),
        };
        debug!(
            stale_batches = report.stale.len(),
            temporary_batches = report.temporary.len(),
            "housekeeping scan complete"
        );
        report
    }
}

fn into_batches(map: BTreeMap<CompactString, Vec<FileRecord>>) -> Vec<FileBatch> {
    map.into_iter()
        .map(|(root_id, mut files)| {
            files.sort_by(|a, b| a.path.cmp(&b.path));
            FileBatch { root_id, files }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncsift_core::DEFAULT_TEMPORARY_PATTERNS;

    const MIB: u64 = 1024 * 1024;

    fn record(path: &str, size: u64, days: u64, root: &str, now: SystemTime) -> FileRecord {
        FileRecord::new(path, size, now - Duration::from_secs(days * SECS_PER_DAY), root)
    }

    #[test]
    fn test_default_patterns() {
        let matcher = TemporaryFileMatcher::new(DEFAULT_TEMPORARY_PATTERNS).unwrap();
        assert!(matcher.is_match("~$report.docx"));
        assert!(matcher.is_match("build.TMP"));
        assert!(matcher.is_match(".DS_Store"));
        assert!(matcher.is_match("thumbs.db"));
        assert!(!matcher.is_match("report.docx"));
        assert!(!matcher.is_match("template.txt"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = TemporaryFileMatcher::new(&["[oops"][..]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_find_groups_per_root() {
        let now = SystemTime::now();
        let records = vec![
            record("/d/old.iso", 20 * MIB, 400, "drive", now),
            record("/d/new.iso", 20 * MIB, 10, "drive", now),
            record("/d/small.txt", 10, 400, "drive", now),
            record("/d/~$memo.docx", 162, 2, "drive", now),
            record("/b/x.bak", 30 * MIB, 500, "box", now),
            record("/b/a.tmp", 5, 0, "box", now),
        ];

        let finder = HousekeepingFinder::from_config(&AnalysisConfig::default()).unwrap();
        let report = finder.find(&records, now);

        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].root_id, "drive");
        assert_eq!(report.stale[0].len(), 1);
        assert_eq!(report.stale[0].total_bytes(), 20 * MIB);

        assert_eq!(report.temporary.len(), 2);
        assert_eq!(report.temporary[0].root_id, "box");
        assert!(report.temporary[0].files[0].path.ends_with("a.tmp"));
        assert_eq!(report.temporary[1].root_id, "drive");
    }
}
