//! Inventory progress reporting.

use std::path::PathBuf;
use std::time::Duration;

use compact_str::CompactString;

/// Progress information during an inventory walk.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    /// Id of the root being walked.
    pub current_root: CompactString,
    /// Number of files recorded so far.
    pub files_scanned: u64,
    /// Number of directories visited so far.
    pub dirs_scanned: u64,
    /// Total bytes recorded so far.
    pub bytes_scanned: u64,
    /// Last path recorded.
    pub current_path: PathBuf,
    /// Number of warnings so far.
    pub errors_count: u64,
    /// Time elapsed since the walk started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Get total items scanned (files + dirs).
    pub fn total_items(&self) -> u64 {
        self.files_scanned + self.dirs_scanned
    }
}
