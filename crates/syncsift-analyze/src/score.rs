//! Heuristic quality scoring.
//!
//! A score in `0..=100` is the sum of four rule tables: recency (35),
//! intrinsic quality by file type (30), file name (20) and extension (15).
//! Scoring is pure: the caller supplies `now`.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use strum::Display;

use syncsift_core::{FileRecord, MetadataHint, ScoredFile};

const MIB: f64 = 1024.0 * 1024.0;
const SECS_PER_DAY: f64 = 86_400.0;

/// Recency table: (age below this many days, points). Older files get
/// [`RECENCY_FLOOR`].
const RECENCY: &[(f64, u8)] = &[(1.0, 35), (7.0, 30), (30.0, 20), (365.0, 10)];
const RECENCY_FLOOR: u8 = 2;

/// Coarse file category used by the intrinsic-quality table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl FileCategory {
    /// Category of a lowercased extension including the dot.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            ".jpg" | ".jpeg" | ".png" | ".gif" | ".bmp" | ".heic" | ".webp" | ".tiff"
            | ".tif" => Self::Image,
            ".mp4" | ".avi" | ".mov" | ".mkv" | ".wmv" | ".webm" => Self::Video,
            ".mp3" | ".wav" | ".flac" | ".aac" | ".m4a" | ".ogg" => Self::Audio,
            ".pdf" | ".doc" | ".docx" | ".txt" | ".xls" | ".xlsx" | ".ppt" | ".pptx" => {
                Self::Document
            }
            _ => Self::Other,
        }
    }
}

/// One row of an intrinsic-quality table. Rows are tried in order and the
/// first match wins.
#[derive(Debug, Clone, Copy)]
enum IntrinsicRule {
    /// Size in MiB within `[min, max)`.
    Size { min: f64, max: f64, points: u8 },
    /// Exact extension.
    Extension { ext: &'static str, points: u8 },
}

impl IntrinsicRule {
    fn matches(&self, size_mib: f64, ext: &str) -> Option<u8> {
        match *self {
            Self::Size { min, max, points } => (size_mib >= min && size_mib < max).then_some(points),
            Self::Extension { ext: e, points } => (e == ext).then_some(points),
        }
    }
}

const IMAGE_RULES: &[IntrinsicRule] = &[
    IntrinsicRule::Size { min: 1.0, max: 25.0, points: 25 },
    IntrinsicRule::Size { min: 50.0, max: f64::INFINITY, points: 30 },
    IntrinsicRule::Size { min: 0.0, max: 0.1, points: 5 },
];

const VIDEO_RULES: &[IntrinsicRule] = &[
    IntrinsicRule::Size { min: 50.0, max: 2000.0, points: 25 },
    IntrinsicRule::Size { min: 2000.0, max: f64::INFINITY, points: 30 },
    IntrinsicRule::Size { min: 0.0, max: 5.0, points: 5 },
];

const AUDIO_RULES: &[IntrinsicRule] = &[
    IntrinsicRule::Size { min: 3.0, max: 100.0, points: 25 },
    IntrinsicRule::Extension { ext: ".flac", points: 30 },
    IntrinsicRule::Size { min: 0.0, max: 1.0, points: 5 },
];

const DOCUMENT_RULES: &[IntrinsicRule] = &[IntrinsicRule::Size {
    min: 0.01,
    max: 50.0,
    points: 20,
}];

/// Points when no row matches.
const fn intrinsic_fallback(category: FileCategory) -> u8 {
    match category {
        FileCategory::Image | FileCategory::Video | FileCategory::Audio => 15,
        FileCategory::Document | FileCategory::Other => 10,
    }
}

/// Metadata bands: (minimum value, points), highest first.
const MEGAPIXEL_BANDS: &[(f64, u8)] = &[(12.0, 30), (8.0, 25), (5.0, 20), (2.0, 15)];
const VIDEO_HEIGHT_BANDS: &[(f64, u8)] = &[(1080.0, 30), (720.0, 25), (480.0, 20)];
const BITRATE_BANDS: &[(f64, u8)] = &[(320.0, 30), (256.0, 25), (192.0, 20), (128.0, 15)];
const METADATA_FLOOR: u8 = 10;

/// Name penalties matched case-insensitively anywhere in the file name.
const NAME_PENALTIES: &[(&str, i32)] = &[
    ("copy", -8),
    ("copie", -8),
    ("temp", -10),
    ("tmp", -10),
    ("nouveau", -6),
    ("untitled", -8),
    ("sans nom", -8),
];
const NAME_BASE: i32 = 20;
const LOCK_PREFIX: &str = "~$";
const LOCK_PENALTY: i32 = -15;
const DATE_BONUS: i32 = 3;
const DATE_RUN: usize = 4;

/// Extension bonuses.
const EXTENSION_BONUS: &[(&str, u8)] = &[
    (".tiff", 15),
    (".flac", 15),
    (".png", 12),
    (".mkv", 12),
    (".wav", 12),
    (".heic", 10),
    (".mp4", 10),
    (".pdf", 10),
    (".m4a", 8),
    (".docx", 8),
];

/// Per-component points of a score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Recency points (0-35).
    pub recency: u8,
    /// Intrinsic quality points (0-30).
    pub intrinsic: u8,
    /// File name points (0-20).
    pub name: u8,
    /// Extension points (0-15).
    pub extension: u8,
}

impl ScoreBreakdown {
    /// Sum of all components, clamped to 100.
    pub fn total(&self) -> u8 {
        let sum = u16::from(self.recency)
            + u16::from(self.intrinsic)
            + u16::from(self.name)
            + u16::from(self.extension);
        sum.min(100) as u8
    }
}

/// Rule-table quality scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl QualityScorer {
    /// Create a scorer.
    pub fn new() -> Self {
        Self
    }

    /// Score a record.
    pub fn score(&self, record: &FileRecord, now: SystemTime) -> ScoredFile {
        ScoredFile {
            quality_score: self.breakdown(record, now).total(),
            age_days: record.age_days(now),
            record: record.clone(),
        }
    }

    /// Per-component points for a record.
    pub fn breakdown(&self, record: &FileRecord, now: SystemTime) -> ScoreBreakdown {
        let ext = record.extension();
        ScoreBreakdown {
            recency: recency_points(record.age(now).as_secs_f64() / SECS_PER_DAY),
            intrinsic: intrinsic_points(record.size, &ext, record.metadata_hint.as_ref()),
            name: name_points(record.name()),
            extension: extension_points(&ext),
        }
    }
}

fn recency_points(age_days: f64) -> u8 {
    RECENCY
        .iter()
        .find(|(limit, _)| age_days < *limit)
        .map_or(RECENCY_FLOOR, |(_, points)| *points)
}

fn intrinsic_points(size: u64, ext: &str, hint: Option<&MetadataHint>) -> u8 {
    let category = FileCategory::from_extension(ext);

    if let Some(points) = hint.and_then(|h| metadata_points(category, h)) {
        return points;
    }

    let rules = match category {
        FileCategory::Image => IMAGE_RULES,
        FileCategory::Video => VIDEO_RULES,
        FileCategory::Audio => AUDIO_RULES,
        FileCategory::Document => DOCUMENT_RULES,
        FileCategory::Other => &[],
    };
    let size_mib = size as f64 / MIB;
    rules
        .iter()
        .find_map(|rule| rule.matches(size_mib, ext))
        .unwrap_or(intrinsic_fallback(category))
}

fn metadata_points(category: FileCategory, hint: &MetadataHint) -> Option<u8> {
    let (value, bands) = match category {
        FileCategory::Image => (hint.megapixels()?, MEGAPIXEL_BANDS),
        FileCategory::Video => (f64::from(hint.height?), VIDEO_HEIGHT_BANDS),
        FileCategory::Audio => (f64::from(hint.bitrate_kbps?), BITRATE_BANDS),
        FileCategory::Document | FileCategory::Other => return None,
    };
    Some(
        bands
            .iter()
            .find(|(min, _)| value >= *min)
            .map_or(METADATA_FLOOR, |(_, points)| *points),
    )
}

fn name_points(name: &str) -> u8 {
    let lower = name.to_lowercase();
    let mut points = NAME_BASE;

    for (pattern, penalty) in NAME_PENALTIES {
        if lower.contains(pattern) {
            points += penalty;
        }
    }
    if let Some(n) = numeric_suffix(&lower) {
        points += match n {
            1 => -5,
            2 => -7,
            _ => -10,
        };
    }
    if lower.starts_with(LOCK_PREFIX) {
        points += LOCK_PENALTY;
    }
    if has_date_run(stem(&lower)) {
        points += DATE_BONUS;
    }

    points.clamp(0, NAME_BASE) as u8
}

/// File name without its last extension.
fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    }
}

/// Number `n` of the first `(n)` group in a name, for `n >= 1`.
pub(crate) fn numeric_suffix(name: &str) -> Option<u32> {
    let mut rest = name;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let digits: &str = &after[..after.find(|c: char| !c.is_ascii_digit()).unwrap_or(after.len())];
        if !digits.is_empty() && after[digits.len()..].starts_with(')') {
            if let Ok(n) = digits.parse::<u32>() {
                if n >= 1 {
                    return Some(n);
                }
            }
        }
        rest = after;
    }
    None
}

/// Whether `s` contains at least [`DATE_RUN`] consecutive digits.
fn has_date_run(s: &str) -> bool {
    let mut run = 0;
    for c in s.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run >= DATE_RUN {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

fn extension_points(ext: &str) -> u8 {
    EXTENSION_BONUS
        .iter()
        .find(|(e, _)| *e == ext)
        .map_or(0, |(_, points)| *points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const DAY: u64 = 86_400;

    fn record(name: &str, size: u64, age_secs: u64, now: SystemTime) -> FileRecord {
        FileRecord::new(
            format!("/root/{name}"),
            size,
            now - Duration::from_secs(age_secs),
            "r",
        )
    }

    #[test]
    fn test_recency_table() {
        assert_eq!(recency_points(0.5), 35);
        assert_eq!(recency_points(3.0), 30);
        assert_eq!(recency_points(10.0), 20);
        assert_eq!(recency_points(40.0), 10);
        assert_eq!(recency_points(400.0), 2);
    }

    #[test]
    fn test_intrinsic_image_bands() {
        let mib = 1024 * 1024;
        assert_eq!(intrinsic_points(2 * mib, ".jpg", None), 25);
        assert_eq!(intrinsic_points(60 * mib, ".jpg", None), 30);
        assert_eq!(intrinsic_points(10 * 1024, ".jpg", None), 5);
        assert_eq!(intrinsic_points(30 * mib, ".jpg", None), 15);
        assert_eq!(intrinsic_points(512 * 1024, ".jpg", None), 15);
    }

    #[test]
    fn test_intrinsic_audio_lossless() {
        let mib = 1024 * 1024;
        assert_eq!(intrinsic_points(200 * mib, ".flac", None), 30);
        assert_eq!(intrinsic_points(200 * mib, ".mp3", None), 15);
        assert_eq!(intrinsic_points(5 * mib, ".flac", None), 25);
    }

    #[test]
    fn test_metadata_hint_overrides_size() {
        let hint = MetadataHint {
            width: Some(4000),
            height: Some(3000),
            bitrate_kbps: None,
        };
        assert_eq!(intrinsic_points(10 * 1024, ".jpg", Some(&hint)), 30);

        let hint = MetadataHint {
            width: None,
            height: Some(720),
            bitrate_kbps: None,
        };
        assert_eq!(intrinsic_points(1024, ".mp4", Some(&hint)), 25);

        let no_bitrate = MetadataHint::default();
        assert_eq!(intrinsic_points(5 * 1024 * 1024, ".mp3", Some(&no_bitrate)), 25);
    }

    #[test]
    fn test_name_points() {
        assert_eq!(name_points("a.jpg"), 20);
        assert_eq!(name_points("a_copy.jpg"), 12);
        assert_eq!(name_points("a(1).jpg"), 15);
        assert_eq!(name_points("a (2).jpg"), 13);
        assert_eq!(name_points("a (7).jpg"), 10);
        assert_eq!(name_points("~$report.docx"), 5);
        assert_eq!(name_points("temp copy untitled.txt"), 0);
        assert_eq!(name_points("IMG_20230412 copy.jpg"), 15);
    }

    #[test]
    fn test_numeric_suffix() {
        assert_eq!(numeric_suffix("a(1).jpg"), Some(1));
        assert_eq!(numeric_suffix("report (12).pdf"), Some(12));
        assert_eq!(numeric_suffix("(draft) v(3)"), Some(3));
        assert_eq!(numeric_suffix("a(0).jpg"), None);
        assert_eq!(numeric_suffix("a().jpg"), None);
    }

    #[test]
    fn test_extension_bonus() {
        assert_eq!(extension_points(".tiff"), 15);
        assert_eq!(extension_points(".png"), 12);
        assert_eq!(extension_points(".jpg"), 0);
    }

    #[test]
    fn test_scores_for_copy_scenario() {
        let now = SystemTime::now();
        let mib = 2 * 1024 * 1024;
        let scorer = QualityScorer::new();

        assert_eq!(scorer.score(&record("a.jpg", mib, 3600, now), now).quality_score, 80);
        assert_eq!(
            scorer
                .score(&record("a_copy.jpg", mib, 40 * DAY, now), now)
                .quality_score,
            47
        );
        assert_eq!(scorer.score(&record("a(1).jpg", mib, 600, now), now).quality_score, 75);
    }

    #[test]
    fn test_score_monotone_in_recency() {
        let now = SystemTime::now();
        let scorer = QualityScorer::new();
        let mut last = u8::MAX;
        for age in [0, DAY, 10 * DAY, 100 * DAY, 1000 * DAY] {
            let score = scorer.score(&record("x.pdf", 4096, age, now), now).quality_score;
            assert!(score <= last);
            last = score;
        }
    }
}
