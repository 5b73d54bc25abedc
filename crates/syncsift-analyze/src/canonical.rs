//! Canonical copy selection and removal confidence.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use syncsift_core::{AnalysisConfig, ConfidenceTier, ScoredFile, StorageRoot};

use crate::duplicates::DuplicateGroup;
use crate::score::{QualityScorer, numeric_suffix};

const BASE_CONFIDENCE: i32 = 50;
const MAX_SCORE_BONUS: i32 = 30;
const OLDER_BY_DAY_BONUS: i32 = 15;
const OLDER_BONUS: i32 = 5;
const COPY_NAME_BONUS: i32 = 20;
const TEMP_NAME_BONUS: i32 = 15;
/// Score gap below which young files are protected.
const PROTECTION_SCORE_GAP: i32 = 15;
const ONE_DAY: Duration = Duration::from_secs(86_400);

/// A duplicate proposed for removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalCandidate {
    /// The scored file.
    pub file: ScoredFile,
    /// Confidence in `0..=100` that removing it is safe.
    pub confidence: u8,
    /// Canonical score minus this file's score.
    pub score_delta: i32,
}

impl RemovalCandidate {
    /// Tier of the removal confidence.
    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_confidence(self.confidence)
    }
}

/// Outcome of canonical selection for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSelection {
    /// File to keep.
    pub canonical: ScoredFile,
    /// Files proposed for removal, in selection order.
    pub removals: Vec<RemovalCandidate>,
    /// Young files with a close score, never proposed.
    pub protected: Vec<ScoredFile>,
    /// Whether the group matched on sampled fingerprints. Confidence is not
    /// reduced for it; callers surface the flag instead.
    pub sampled: bool,
}

/// Picks the best copy in each duplicate group.
///
/// Members are ordered by (score desc, size desc, modified desc, root
/// priority asc, path asc) and the first one is kept. Files of unknown roots
/// sort after every known root.
#[derive(Debug, Clone)]
pub struct CanonicalSelector {
    scorer: QualityScorer,
    age_protection: Duration,
    priorities: HashMap<CompactString, u32>,
}

impl CanonicalSelector {
    /// Create a selector with the default 24 hour protection window.
    pub fn new() -> Self {
        Self {
            scorer: QualityScorer::new(),
            age_protection: Duration::from_secs(24 * 3600),
            priorities: HashMap::new(),
        }
    }

    /// Prefer files in roots with a lower priority value when everything
    /// else ties.
    pub fn with_roots(mut self, roots: &[StorageRoot]) -> Self {
        self.priorities = roots.iter().map(|r| (r.id.clone(), r.priority)).collect();
        self
    }

    /// Create a selector from an analysis config.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            scorer: QualityScorer::new(),
            age_protection: config.age_protection(),
            priorities: HashMap::new(),
        }
        .with_roots(&config.roots)
    }

    /// Select the canonical file of `group`. Returns `None` for groups with
    /// fewer than two members.
    pub fn select(&self, group: &DuplicateGroup, now: SystemTime) -> Option<CanonicalSelection> {
        if group.count() < 2 {
            return None;
        }

        let mut scored: Vec<ScoredFile> = group
            .members
            .iter()
            .map(|m| self.scorer.score(m, now))
            .collect();
        scored.sort_by(|a, b| self.canonical_order(a, b));

        let mut members = scored.into_iter();
        let canonical = members.next()?;
        let sampled = group.is_sampled();

        let mut removals = Vec::new();
        let mut protected = Vec::new();

        for file in members {
            let score_delta = i32::from(canonical.quality_score) - i32::from(file.quality_score);

            if file.record.freshness_age(now) < self.age_protection
                && score_delta < PROTECTION_SCORE_GAP
            {
                debug!(
                    path = %file.path().display(),
                    score_delta,
                    "protected: recent file with close score"
                );
                protected.push(file);
                continue;
            }

            let confidence = removal_confidence(&canonical, &file, score_delta);
            removals.push(RemovalCandidate {
                file,
                confidence,
                score_delta,
            });
        }

        Some(CanonicalSelection {
            canonical,
            removals,
            protected,
            sampled,
        })
    }

    fn priority(&self, file: &ScoredFile) -> u32 {
        self.priorities
            .get(&file.record.root_id)
            .copied()
            .unwrap_or(u32::MAX)
    }

    fn canonical_order(&self, a: &ScoredFile, b: &ScoredFile) -> Ordering {
        b.quality_score
            .cmp(&a.quality_score)
            .then_with(|| b.record.size.cmp(&a.record.size))
            .then_with(|| b.record.modified.cmp(&a.record.modified))
            .then_with(|| self.priority(a).cmp(&self.priority(b)))
            .then_with(|| a.record.path.cmp(&b.record.path))
    }
}

impl Default for CanonicalSelector {
    fn default() -> Self {
        Self::new()
    }
}

fn removal_confidence(canonical: &ScoredFile, candidate: &ScoredFile, score_delta: i32) -> u8 {
    let mut confidence = BASE_CONFIDENCE + score_delta.clamp(0, MAX_SCORE_BONUS);

    if let Ok(gap) = canonical.record.modified.duration_since(candidate.record.modified) {
        if gap > ONE_DAY {
            confidence += OLDER_BY_DAY_BONUS;
        } else if gap > Duration::ZERO {
            confidence += OLDER_BONUS;
        }
    }

    let name = candidate.record.name().to_lowercase();
    if name.contains("copy") || name.contains("copie") || numeric_suffix(&name).is_some() {
        confidence += COPY_NAME_BONUS;
    } else if name.contains("tmp") || name.contains("temp") {
        confidence += TEMP_NAME_BONUS;
    }

    confidence.clamp(0, 100) as u8
}
