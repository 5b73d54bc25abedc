//! Directory size measurement.

use std::fs;
use std::path::Path;

use jwalk::WalkDir;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Total size in bytes of the regular files below `path`.
///
/// Hidden entries are included and symbolic links are not followed.
/// Unreadable entries count as zero. Returns the partial sum when `cancel`
/// fires.
pub fn directory_size(path: &Path, cancel: &CancellationToken) -> u64 {
    let mut total = 0u64;
    for entry in WalkDir::new(path).skip_hidden(false).follow_links(false) {
        if cancel.is_cancelled() {
            break;
        }
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                total += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
            Ok(_) => {}
            Err(err) => debug!(path = %path.display(), "size walk error: {err}"),
        }
    }
    total
}

/// Size of a file, or the total size of the regular files below a directory.
/// Missing paths measure zero.
pub fn path_size(path: &Path, cancel: &CancellationToken) -> u64 {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => directory_size(path, cancel),
        Ok(meta) => meta.len(),
        Err(err) => {
            debug!(path = %path.display(), "cannot measure: {err}");
            0
        }
    }
}
