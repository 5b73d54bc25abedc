//! Size-tiered content fingerprints.
//!
//! Files below the large-file threshold are hashed in full. Larger files
//! are hashed from their size plus a head and a tail sample, which is fast
//! but cannot tell apart two files that only differ in the middle.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use blake3::Hasher;

use syncsift_core::{AnalysisConfig, FileRecord, Fingerprint, FingerprintKind, SiftError};

/// Bytes read from each end of a large file.
pub const SAMPLE_BYTES: u64 = 1024;

/// Computes [`Fingerprint`]s for files on disk.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprinter {
    large_file_threshold: u64,
}

impl Fingerprinter {
    /// Create a fingerprinter with the default 1 MiB threshold.
    pub fn new() -> Self {
        Self {
            large_file_threshold: 1024 * 1024,
        }
    }

    /// Create a fingerprinter with a custom large-file threshold.
    pub fn with_threshold(large_file_threshold: u64) -> Self {
        Self {
            large_file_threshold,
        }
    }

    /// Create a fingerprinter from an analysis config.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::with_threshold(config.large_file_threshold_bytes)
    }

    /// The large-file threshold in bytes.
    pub fn threshold(&self) -> u64 {
        self.large_file_threshold
    }

    /// Fingerprint the file at `path`, whose size is `size`.
    ///
    /// Zero-length files get a sentinel derived from their name, so two
    /// empty files only match when they share a name.
    pub fn fingerprint(&self, path: &Path, size: u64) -> Result<Fingerprint, SiftError> {
        if size == 0 {
            return Ok(empty_sentinel(path));
        }
        if size < self.large_file_threshold {
            full_hash(path)
        } else {
            sampled_hash(path, size)
        }
    }

    /// Produce a copy of `record` carrying its fingerprint.
    pub fn fingerprint_record(&self, record: &FileRecord) -> Result<FileRecord, SiftError> {
        let fingerprint = self.fingerprint(&record.path, record.size)?;
        Ok(record.clone().with_fingerprint(fingerprint))
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_sentinel(path: &Path) -> Fingerprint {
    let mut hasher = Hasher::new();
    hasher.update(b"empty:");
    if let Some(name) = path.file_name() {
        hasher.update(name.as_encoded_bytes());
    }
    Fingerprint::new(*hasher.finalize().as_bytes(), FingerprintKind::Exact)
}

fn full_hash(path: &Path) -> Result<Fingerprint, SiftError> {
    let mut file = File::open(path).map_err(|e| SiftError::io(path, e))?;
    let mut hasher = Hasher::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| SiftError::io(path, e))?;
    Ok(Fingerprint::new(
        *hasher.finalize().as_bytes(),
        FingerprintKind::Exact,
    ))
}

fn sampled_hash(path: &Path, size: u64) -> Result<Fingerprint, SiftError> {
    let mut file = File::open(path).map_err(|e| SiftError::io(path, e))?;
    let mut hasher = Hasher::new();
    hasher.update(&size.to_le_bytes());

    let head_len = SAMPLE_BYTES.min(size);
    let mut head = vec![0u8; head_len as usize];
    file.read_exact(&mut head)
        .map_err(|e| SiftError::io(path, e))?;
    hasher.update(&head);

    let tail_len = SAMPLE_BYTES.min(size);
    let mut tail = vec![0u8; tail_len as usize];
    file.seek(SeekFrom::Start(size - tail_len))
        .map_err(|e| SiftError::io(path, e))?;
    file.read_exact(&mut tail)
        .map_err(|e| SiftError::io(path, e))?;
    hasher.update(&tail);

    Ok(Fingerprint::new(
        *hasher.finalize().as_bytes(),
        FingerprintKind::Sampled,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_small_file_is_exact() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();

        let fp = Fingerprinter::new().fingerprint(&path, 5).unwrap();
        assert_eq!(fp.kind, FingerprintKind::Exact);
        assert_eq!(fp.digest, *blake3::hash(b"hello").as_bytes());
    }

    #[test]
    fn test_threshold_boundary_is_sampled() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.bin");
        fs::write(&path, vec![7u8; 4096]).unwrap();

        let fingerprinter = Fingerprinter::with_threshold(4096);
        assert!(fingerprinter.fingerprint(&path, 4096).unwrap().is_sampled());

        let fingerprinter = Fingerprinter::with_threshold(4097);
        assert!(!fingerprinter.fingerprint(&path, 4096).unwrap().is_sampled());
    }

    #[test]
    fn test_empty_files_match_by_name_only() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("x")).unwrap();
        fs::write(temp.path().join("a.txt"), b"").unwrap();
        fs::write(temp.path().join("x/a.txt"), b"").unwrap();
        fs::write(temp.path().join("b.txt"), b"").unwrap();

        let f = Fingerprinter::new();
        let a = f.fingerprint(&temp.path().join("a.txt"), 0).unwrap();
        let xa = f.fingerprint(&temp.path().join("x/a.txt"), 0).unwrap();
        let b = f.fingerprint(&temp.path().join("b.txt"), 0).unwrap();
        assert_eq!(a, xa);
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let err = Fingerprinter::new()
            .fingerprint(&temp.path().join("gone"), 10)
            .unwrap_err();
        assert!(matches!(err, SiftError::NotFound { .. }));
        assert!(!err.is_fatal());
    }
}
