//! Analysis configuration types.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::action::ExecutionMode;
use crate::error::SiftError;
use crate::root::{StorageRoot, validate_roots};

/// Directory names skipped by default during inventory.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    "node_modules",
    "__pycache__",
    ".Trash",
    "$RECYCLE.BIN",
    "System Volume Information",
];

/// File name patterns treated as temporary content by default.
pub const DEFAULT_TEMPORARY_PATTERNS: &[&str] = &[
    "~$*",
    "*.tmp",
    "*.temp",
    "*.bak",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
];

/// Configuration for an analysis run.
///
/// Every field has a default, so a TOML file only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct AnalysisConfig {
    /// Storage roots to analyze.
    #[builder(default)]
    pub roots: Vec<StorageRoot>,

    /// Maximum directory depth below each root.
    #[builder(default = "default_max_depth()")]
    pub max_depth: u32,

    /// Maximum number of entries read from a single directory.
    #[builder(default = "default_max_files_per_level()")]
    pub max_files_per_level: usize,

    /// Total bytes of file content to inventory (None = unbounded).
    #[builder(default)]
    pub max_total_scan_bytes: Option<u64>,

    /// Files at or above this size get a sampled fingerprint.
    #[builder(default = "default_large_file_threshold()")]
    pub large_file_threshold_bytes: u64,

    /// Minimum confidence for unconfirmed destructive actions.
    #[builder(default = "default_destructive_threshold()")]
    pub destructive_confidence_threshold: u8,

    /// Files younger than this are protected from close-call removals.
    #[builder(default = "default_age_protection_hours()")]
    pub age_protection_hours: u64,

    /// Execution mode.
    #[builder(default)]
    pub mode: ExecutionMode,

    /// Directory names never descended into.
    #[builder(default = "default_ignored_dirs()")]
    pub ignored_dirs: Vec<String>,

    /// Include dotfiles and dot-directories.
    #[builder(default = "false")]
    pub include_hidden: bool,

    /// Follow symbolic links.
    #[builder(default = "false")]
    pub follow_symlinks: bool,

    /// Files untouched for this many days are archive candidates.
    #[builder(default = "default_stale_after_days()")]
    pub stale_after_days: u64,

    /// Minimum size of a single archive candidate.
    #[builder(default = "default_min_archive_bytes()")]
    pub min_archive_bytes: u64,

    /// Glob patterns (matched case-insensitively against file names) of
    /// temporary files proposed for removal.
    #[builder(default = "default_temporary_patterns()")]
    pub temporary_patterns: Vec<String>,

    /// Where per-run backup folders are created.
    #[builder(default)]
    pub backup_dir: Option<PathBuf>,

    /// Home directory used for well-known folder checks.
    #[builder(default)]
    pub home_dir: Option<PathBuf>,
}

fn default_max_depth() -> u32 {
    4
}

fn default_max_files_per_level() -> usize {
    10_000
}

fn default_large_file_threshold() -> u64 {
    1024 * 1024
}

fn default_destructive_threshold() -> u8 {
    90
}

fn default_age_protection_hours() -> u64 {
    24
}

fn default_ignored_dirs() -> Vec<String> {
    DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect()
}

fn default_temporary_patterns() -> Vec<String> {
    DEFAULT_TEMPORARY_PATTERNS.iter().map(|s| s.to_string()).collect()
}

fn default_stale_after_days() -> u64 {
    365
}

fn default_min_archive_bytes() -> u64 {
    10 * 1024 * 1024
}

impl AnalysisConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.destructive_confidence_threshold.is_some_and(|t| t > 100) {
            return Err("Destructive confidence threshold must be at most 100".to_string());
        }
        if self.max_files_per_level == Some(0) {
            return Err("Per-level file limit must be positive".to_string());
        }
        if self.large_file_threshold_bytes == Some(0) {
            return Err("Large file threshold must be positive".to_string());
        }
        if let Some(ref roots) = self.roots {
            validate_roots(roots).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl AnalysisConfig {
    /// Create a new config builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Default configuration for the given roots.
    pub fn new(roots: Vec<StorageRoot>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    /// Validate a configuration that did not go through the builder
    /// (deserialized or mutated in place).
    pub fn validate(&self) -> Result<(), SiftError> {
        if self.destructive_confidence_threshold > 100 {
            return Err(SiftError::config(
                "Destructive confidence threshold must be at most 100",
            ));
        }
        if self.max_files_per_level == 0 {
            return Err(SiftError::config("Per-level file limit must be positive"));
        }
        if self.large_file_threshold_bytes == 0 {
            return Err(SiftError::config("Large file threshold must be positive"));
        }
        validate_roots(&self.roots)
    }

    /// Age protection window.
    pub fn age_protection(&self) -> Duration {
        Duration::from_secs(self.age_protection_hours * 3600)
    }

    /// Check if a directory name is on the ignore list.
    pub fn should_ignore_dir(&self, name: &str) -> bool {
        self.ignored_dirs.iter().any(|d| d == name)
    }

    /// Check if a hidden entry should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            max_depth: default_max_depth(),
            max_files_per_level: default_max_files_per_level(),
            max_total_scan_bytes: None,
            large_file_threshold_bytes: default_large_file_threshold(),
            destructive_confidence_threshold: default_destructive_threshold(),
            age_protection_hours: default_age_protection_hours(),
            mode: ExecutionMode::Simulate,
            ignored_dirs: default_ignored_dirs(),
            include_hidden: false,
            follow_symlinks: false,
            stale_after_days: default_stale_after_days(),
            min_archive_bytes: default_min_archive_bytes(),
            temporary_patterns: default_temporary_patterns(),
            backup_dir: None,
            home_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_files_per_level, 10_000);
        assert_eq!(config.max_total_scan_bytes, None);
        assert_eq!(config.large_file_threshold_bytes, 1024 * 1024);
        assert_eq!(config.destructive_confidence_threshold, 90);
        assert_eq!(config.age_protection(), Duration::from_secs(24 * 3600));
        assert_eq!(config.mode, ExecutionMode::Simulate);
    }

    #[test]
    fn test_config_builder() {
        let config = AnalysisConfig::builder()
            .roots(vec![StorageRoot::new("drive", "/cloud/drive")])
            .max_depth(2u32)
            .destructive_confidence_threshold(80u8)
            .build()
            .unwrap();

        assert_eq!(config.max_depth, 2);
        assert_eq!(config.destructive_confidence_threshold, 80);
        assert_eq!(config.stale_after_days, 365);
        assert!(config.should_ignore_dir("node_modules"));
    }

    #[test]
    fn test_builder_rejects_bad_threshold() {
        let result = AnalysisConfig::builder()
            .destructive_confidence_threshold(150u8)
            .build();
        assert!(result.is_err());

        let result = AnalysisConfig::builder()
            .roots(vec![
                StorageRoot::new("a", "/x"),
                StorageRoot::new("a", "/y"),
            ])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_deserialized() {
        let mut config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        config.max_files_per_level = 0;
        assert!(config.validate().unwrap_err().is_fatal());
    }

    #[test]
    fn test_should_skip_hidden() {
        let mut config = AnalysisConfig::default();
        assert!(config.should_skip_hidden(".cache"));
        assert!(!config.should_skip_hidden("Photos"));

        config.include_hidden = true;
        assert!(!config.should_skip_hidden(".cache"));
    }
}
