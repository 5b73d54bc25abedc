//! Bounded, read-only inventory walk over storage roots.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, UNIX_EPOCH};

use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use syncsift_core::{
    AnalysisConfig, FileRecord, Inventory, InventoryStats, ScanWarning, SiftError, StorageRoot,
    WarningKind, is_descendant,
};

use crate::progress::ScanProgress;

/// Files recorded between two progress snapshots.
const PROGRESS_INTERVAL: u64 = 1000;

/// Walks storage roots with jwalk and produces a flat [`Inventory`].
///
/// A file is attributed to the innermost registered root containing it: when
/// one root is nested inside another, the outer walk skips the nested root's
/// directory and the nested root is walked on its own.
pub struct InventoryBuilder {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl InventoryBuilder {
    /// Create a new inventory builder.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Walk every root in `config`.
    pub fn build(&self, config: &AnalysisConfig) -> Result<Inventory, SiftError> {
        self.build_with_cancel(config, &CancellationToken::new())
    }

    /// Walk every root in `config`, stopping early when `cancel` fires.
    ///
    /// Only an invalid configuration is an error. Missing roots, unreadable
    /// directories and unreadable metadata become warnings.
    pub fn build_with_cancel(
        &self,
        config: &AnalysisConfig,
        cancel: &CancellationToken,
    ) -> Result<Inventory, SiftError> {
        config.validate()?;
        let start = Instant::now();

        let mut walk = Walk {
            config,
            cancel,
            progress_tx: &self.progress_tx,
            start,
            stats: InventoryStats::new(),
            warnings: Vec::new(),
            records: Vec::new(),
            cancelled: false,
            budget_exhausted: false,
        };

        let resolved: Vec<(StorageRoot, PathBuf)> = config
            .roots
            .iter()
            .map(|root| (root.clone(), root.normalized_path()))
            .collect();

        let mut seen_paths = HashSet::new();
        for (root, path) in &resolved {
            if cancel.is_cancelled() {
                walk.cancelled = true;
            }
            if walk.cancelled || walk.budget_exhausted {
                break;
            }
            if !seen_paths.insert(path.clone()) {
                warn!(root = %root.id, path = %path.display(), "root path already inventoried");
                walk.warnings.push(ScanWarning::traversal(
                    path,
                    format!("Root '{}' shares its path with another root", root.id),
                ));
                continue;
            }

            let nested: Vec<PathBuf> = resolved
                .iter()
                .filter(|(_, other)| is_descendant(other, path))
                .map(|(_, other)| other.clone())
                .collect();

            walk.walk_root(root, path, nested);
        }

        walk.records.sort_by(|a, b| a.path.cmp(&b.path));
        let scan_duration = start.elapsed();

        info!(
            files = walk.stats.files_seen,
            bytes = walk.stats.bytes_seen,
            warnings = walk.warnings.len(),
            "inventory complete in {:?}",
            scan_duration
        );

        Ok(Inventory {
            records: walk.records,
            stats: walk.stats,
            warnings: walk.warnings,
            scan_duration,
            cancelled: walk.cancelled,
        })
    }
}

impl Default for InventoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable state of one inventory run.
struct Walk<'a> {
    config: &'a AnalysisConfig,
    cancel: &'a CancellationToken,
    progress_tx: &'a broadcast::Sender<ScanProgress>,
    start: Instant,
    stats: InventoryStats,
    warnings: Vec<ScanWarning>,
    records: Vec<FileRecord>,
    cancelled: bool,
    budget_exhausted: bool,
}

impl Walk<'_> {
    fn walk_root(&mut self, root: &StorageRoot, path: &Path, nested: Vec<PathBuf>) {
        if !path.exists() {
            warn!(root = %root.id, path = %path.display(), "root not found, skipping");
            self.warnings.push(ScanWarning::new(
                path,
                format!("Root '{}' does not exist", root.id),
                WarningKind::TraversalError,
            ));
            return;
        }
        if !path.is_dir() {
            let err = SiftError::NotADirectory {
                path: path.to_path_buf(),
            };
            warn!(root = %root.id, "{err}");
            self.warnings.push(ScanWarning::traversal(path, err.to_string()));
            return;
        }

        debug!(root = %root.id, path = %path.display(), nested = nested.len(), "walking root");

        let max_depth = self.config.max_depth as usize;
        let per_level = self.config.max_files_per_level;
        let ignored: Arc<Vec<String>> = Arc::new(self.config.ignored_dirs.clone());
        let nested = Arc::new(nested);
        let truncated_dirs: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
        let level_limit_hit = Arc::new(AtomicBool::new(false));

        let walker = {
            let truncated_dirs = Arc::clone(&truncated_dirs);
            let level_limit_hit = Arc::clone(&level_limit_hit);
            WalkDir::new(path)
                .parallelism(Parallelism::RayonDefaultPool {
                    busy_timeout: Duration::from_millis(100),
                })
                .sort(true)
                .skip_hidden(!self.config.include_hidden)
                .follow_links(self.config.follow_symlinks)
                .min_depth(1)
                .max_depth(max_depth)
                .process_read_dir(move |depth, dir_path, _state, children| {
                    if depth.is_none() {
                        return;
                    }
                    children.retain(|entry| {
                        let Ok(entry) = entry else { return true };
                        if !entry.file_type().is_dir() {
                            return true;
                        }
                        let name = entry.file_name().to_string_lossy();
                        if ignored.iter().any(|d| *d == name) {
                            return false;
                        }
                        let child = entry.path();
                        !nested.iter().any(|n| *n == child)
                    });
                    if children.len() > per_level {
                        children.truncate(per_level);
                        level_limit_hit.store(true, Ordering::Relaxed);
                        if let Ok(mut dirs) = truncated_dirs.lock() {
                            dirs.push(dir_path.to_path_buf());
                        }
                    }
                })
        };

        let mut depth_warning_recorded = false;

        for entry_result in walker {
            if self.cancel.is_cancelled() {
                debug!(root = %root.id, "inventory cancelled");
                self.cancelled = true;
                break;
            }

            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    let denied = err
                        .io_error()
                        .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied);
                    warn!(path = %path.display(), "skipping subtree: {err}");
                    self.warnings.push(if denied {
                        ScanWarning::permission_denied(path)
                    } else {
                        ScanWarning::traversal(path, err.to_string())
                    });
                    continue;
                }
            };

            let file_type = entry.file_type();
            let entry_path = entry.path();

            if file_type.is_dir() {
                self.stats.record_dir();
                if entry.depth >= max_depth {
                    self.stats.depth_limit_hit = true;
                    if !depth_warning_recorded {
                        depth_warning_recorded = true;
                        self.warnings.push(ScanWarning::new(
                            &entry_path,
                            format!("Depth limit {max_depth} reached under '{}'", root.id),
                            WarningKind::LimitReached,
                        ));
                    }
                }
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    debug!(path = %entry_path.display(), "metadata unreadable: {err}");
                    self.stats.unanalyzable_files += 1;
                    self.warnings.push(ScanWarning::new(
                        &entry_path,
                        err.to_string(),
                        WarningKind::MetadataError,
                    ));
                    continue;
                }
            };

            let size = metadata.len();
            if self
                .config
                .max_total_scan_bytes
                .is_some_and(|limit| self.stats.bytes_seen + size > limit)
            {
                info!(root = %root.id, "total scan byte budget reached");
                self.stats.byte_limit_hit = true;
                self.budget_exhausted = true;
                self.warnings.push(ScanWarning::new(
                    &entry_path,
                    "Total scan byte budget reached",
                    WarningKind::LimitReached,
                ));
                break;
            }

            let record = FileRecord::new(
                entry_path,
                size,
                metadata.modified().unwrap_or(UNIX_EPOCH),
                root.id.clone(),
            )
            .with_created(metadata.created().ok());

            self.stats.record_file(&record);

            if self.stats.files_seen % PROGRESS_INTERVAL == 0 {
                let _ = self.progress_tx.send(ScanProgress {
                    current_root: root.id.clone(),
                    files_scanned: self.stats.files_seen,
                    dirs_scanned: self.stats.dirs_seen,
                    bytes_scanned: self.stats.bytes_seen,
                    current_path: record.path.clone(),
                    errors_count: self.warnings.len() as u64,
                    elapsed: self.start.elapsed(),
                });
            }

            self.records.push(record);
        }

        if level_limit_hit.load(Ordering::Relaxed) {
            self.stats.level_limit_hit = true;
            if let Ok(dirs) = truncated_dirs.lock() {
                for dir in dirs.iter() {
                    warn!(path = %dir.display(), "directory truncated at {per_level} entries");
                    self.warnings.push(ScanWarning::new(
                        dir,
                        format!("Only the first {per_level} entries were inventoried"),
                        WarningKind::LimitReached,
                    ));
                }
            }
        }
    }
}
