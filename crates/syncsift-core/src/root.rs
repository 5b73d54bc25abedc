//! Storage root descriptors.

use std::path::{Component, Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::SiftError;

/// A top-level directory mirroring one sync service.
///
/// Supplied by the caller and never written by the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageRoot {
    /// Unique identifier.
    pub id: CompactString,
    /// Local path of the mirror.
    pub path: PathBuf,
    /// Canonical-location preference, lower is preferred.
    #[serde(default)]
    pub priority: u32,
    /// Service name (e.g. "Google Drive").
    #[serde(default)]
    pub label: Option<CompactString>,
}

impl StorageRoot {
    /// Create a root with default priority and no label.
    pub fn new(id: impl Into<CompactString>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            priority: 0,
            label: None,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the service label.
    pub fn with_label(mut self, label: impl Into<CompactString>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label if present, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(self.id.as_str())
    }

    /// Path normalized for containment checks.
    ///
    /// Uses the canonical path when the directory exists, and a lexical
    /// normalization otherwise.
    pub fn normalized_path(&self) -> PathBuf {
        self.path
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexically(&self.path))
    }

    /// Whether `path` lies under this root.
    pub fn contains(&self, path: &Path) -> bool {
        is_descendant(path, &self.path)
    }
}

/// Remove `.` components and resolve `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether `child` is strictly below `parent`, compared by path components.
pub fn is_descendant(child: &Path, parent: &Path) -> bool {
    child != parent && child.starts_with(parent)
}

/// Check a root list for empty ids, empty paths and duplicate ids.
pub fn validate_roots(roots: &[StorageRoot]) -> Result<(), SiftError> {
    let mut seen = std::collections::HashSet::new();
    for root in roots {
        if root.id.is_empty() {
            return Err(SiftError::config("Storage root id cannot be empty"));
        }
        if root.path.as_os_str().is_empty() {
            return Err(SiftError::config(format!(
                "Storage root '{}' has an empty path",
                root.id
            )));
        }
        if !seen.insert(root.id.clone()) {
            return Err(SiftError::config(format!(
                "Duplicate storage root id '{}'",
                root.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descendant_is_component_based() {
        assert!(is_descendant(
            Path::new("/Cloud/Drive/OtherSync"),
            Path::new("/Cloud/Drive")
        ));
        assert!(!is_descendant(
            Path::new("/Cloud/DriveBackup"),
            Path::new("/Cloud/Drive")
        ));
        assert!(!is_descendant(Path::new("/Cloud/Drive"), Path::new("/Cloud/Drive")));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
    }

    #[test]
    fn test_validate_roots_rejects_duplicates() {
        let roots = vec![
            StorageRoot::new("drive", "/a"),
            StorageRoot::new("drive", "/b"),
        ];
        assert!(validate_roots(&roots).is_err());

        let roots = vec![StorageRoot::new("", "/a")];
        assert!(validate_roots(&roots).is_err());

        let roots = vec![
            StorageRoot::new("drive", "/a").with_label("Google Drive"),
            StorageRoot::new("box", "/b").with_priority(2),
        ];
        assert!(validate_roots(&roots).is_ok());
        assert_eq!(roots[0].display_name(), "Google Drive");
        assert_eq!(roots[1].display_name(), "box");
    }
}
