//! Blocking filesystem primitives used by the executor.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use syncsift_scan::path_size;
use tokio_util::sync::CancellationToken;

/// Copy a file or directory tree to `dest`, creating parent directories.
/// Returns the bytes copied.
pub fn copy_item(source: &Path, dest: &Path) -> io::Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::symlink_metadata(source)?.is_dir() {
        copy_dir_recursive(source, dest)
    } else {
        fs::copy(source, dest)
    }
}

fn copy_dir_recursive(source: &Path, dest: &Path) -> io::Result<u64> {
    fs::create_dir_all(dest)?;

    let mut total_bytes = 0u64;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            total_bytes += copy_dir_recursive(&path, &dest_path)?;
        } else {
            total_bytes += fs::copy(&path, &dest_path)?;
        }
    }
    Ok(total_bytes)
}

/// Move a file or directory, falling back to copy and delete across
/// filesystems. Returns the bytes moved.
pub fn move_item(source: &Path, dest: &Path) -> io::Result<u64> {
    let size = path_size(source, &CancellationToken::new());

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    // Fast path on the same filesystem.
    if fs::rename(source, dest).is_ok() {
        return Ok(size);
    }

    copy_item(source, dest)?;
    remove_item(source)?;
    Ok(size)
}

/// Remove a file or a directory tree.
pub fn remove_item(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// First free variant of `path`: `name`, `name-1`, `name-2`, ...
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let extension = path.extension().and_then(|e| e.to_str());

    let mut i = 1u32;
    loop {
        let name = match extension {
            Some(ext) => format!("{stem}-{i}.{ext}"),
            None => format!("{stem}-{i}"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_and_remove_tree() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.txt"), "hello").unwrap();
        fs::write(src.join("nested/b.txt"), "world!").unwrap();

        let dest = temp.path().join("out/copy");
        assert_eq!(copy_item(&src, &dest).unwrap(), 11);
        assert_eq!(fs::read_to_string(dest.join("nested/b.txt")).unwrap(), "world!");
        assert_eq!(path_size(&dest, &CancellationToken::new()), 11);

        remove_item(&src).unwrap();
        assert!(!src.exists());
    }

    #[test]
    fn test_move_file_creates_parents() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.bin");
        fs::write(&src, [0u8; 64]).unwrap();

        let dest = temp.path().join("deep/er/a.bin");
        assert_eq!(move_item(&src, &dest).unwrap(), 64);
        assert!(!src.exists());
        assert!(dest.exists());
    }

    #[test]
    fn test_unique_path() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("run");
        assert_eq!(unique_path(&base), base);

        fs::create_dir(&base).unwrap();
        assert_eq!(unique_path(&base), temp.path().join("run-1"));

        let file = temp.path().join("x.txt");
        fs::write(&file, "").unwrap();
        assert_eq!(unique_path(&file), temp.path().join("x-1.txt"));
    }

    #[test]
    fn test_remove_missing_is_error() {
        let temp = TempDir::new().unwrap();
        let err = remove_item(&temp.path().join("gone")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
