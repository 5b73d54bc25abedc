//! File inventory records and content fingerprints.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// How a fingerprint was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintKind {
    /// Hash of the complete file content.
    Exact,
    /// Hash of size plus head and tail samples. Two files with the same head
    /// and tail but a different middle collide.
    Sampled,
}

/// BLAKE3 content fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Raw digest bytes.
    pub digest: [u8; 32],
    /// Strategy that produced the digest.
    pub kind: FingerprintKind,
}

impl Fingerprint {
    /// Create a fingerprint from raw digest bytes.
    pub fn new(digest: [u8; 32], kind: FingerprintKind) -> Self {
        Self { digest, kind }
    }

    /// Get the digest as a hex string.
    pub fn to_hex(&self) -> String {
        self.digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Whether the fingerprint only sampled the content.
    pub fn is_sampled(&self) -> bool {
        self.kind == FingerprintKind::Sampled
    }
}

/// Optional metadata supplied by an external extractor (EXIF, media probes).
///
/// The core never computes these values itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataHint {
    /// Pixel width for images and videos.
    pub width: Option<u32>,
    /// Pixel height for images and videos.
    pub height: Option<u32>,
    /// Audio bitrate in kbit/s.
    pub bitrate_kbps: Option<u32>,
}

impl MetadataHint {
    /// Megapixel count when both dimensions are known.
    pub fn megapixels(&self) -> Option<f64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(f64::from(w) * f64::from(h) / 1_000_000.0),
            _ => None,
        }
    }
}

/// One file found under a storage root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path, unique within a scan.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Creation time (platform-dependent).
    pub created: Option<SystemTime>,
    /// Content fingerprint, absent until computed or when unreadable.
    pub fingerprint: Option<Fingerprint>,
    /// Id of the storage root this file was found under.
    pub root_id: CompactString,
    /// Externally supplied metadata.
    pub metadata_hint: Option<MetadataHint>,
}

impl FileRecord {
    /// Create a record without fingerprint.
    pub fn new(
        path: impl Into<PathBuf>,
        size: u64,
        modified: SystemTime,
        root_id: impl Into<CompactString>,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            created: None,
            fingerprint: None,
            root_id: root_id.into(),
            metadata_hint: None,
        }
    }

    /// Set the creation time.
    pub fn with_created(mut self, created: Option<SystemTime>) -> Self {
        self.created = created;
        self
    }

    /// Attach a metadata hint.
    pub fn with_metadata_hint(mut self, hint: MetadataHint) -> Self {
        self.metadata_hint = Some(hint);
        self
    }

    /// Produce a copy of this record carrying the given fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// File name (last path component).
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Lowercased extension including the leading dot, or empty.
    pub fn extension(&self) -> String {
        extension_of(&self.path)
    }

    /// Age relative to `now`, measured from the modification time.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or(Duration::ZERO)
    }

    /// Age relative to `now`, measured from the most recent of the
    /// modification and creation times.
    pub fn freshness_age(&self, now: SystemTime) -> Duration {
        let latest = match self.created {
            Some(created) if created > self.modified => created,
            _ => self.modified,
        };
        now.duration_since(latest).unwrap_or(Duration::ZERO)
    }

    /// Whole days since the last modification.
    pub fn age_days(&self, now: SystemTime) -> u64 {
        self.age(now).as_secs() / SECS_PER_DAY
    }
}

/// Lowercased extension of a path including the leading dot, or empty.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// A record with its quality score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFile {
    /// The scored record.
    pub record: FileRecord,
    /// Quality score in `0..=100`, higher is better.
    pub quality_score: u8,
    /// Whole days since the last modification.
    pub age_days: u64,
}

impl ScoredFile {
    /// Path of the underlying record.
    pub fn path(&self) -> &Path {
        &self.record.path
    }
}
