//! Scoring of candidate records against a citation record.
//!
//! The score blends a title similarity ratio with author-set overlap. Both
//! inputs go through [`normalize`] first, so case, punctuation and spacing
//! never affect the result.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::normalize::normalize;
use crate::{CitationRecord, CoreError};

/// Relative weight of the title and author components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub title: f64,
    pub author: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            title: 0.7,
            author: 0.3,
        }
    }
}

impl ScoringWeights {
    /// Weights must be non-negative and sum to 1.0 so the blended score
    /// stays inside `[0, 1]`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title < 0.0 || self.author < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "scoring weights must be non-negative (title={}, author={})",
                self.title, self.author
            )));
        }
        if ((self.title + self.author) - 1.0).abs() > 1e-6 {
            return Err(CoreError::InvalidConfig(format!(
                "scoring weights must sum to 1.0 (title={}, author={})",
                self.title, self.author
            )));
        }
        Ok(())
    }
}

/// How the author component compares the two author sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorOverlap {
    /// `|cited ∩ found| / |cited|`. The citation's own list is what we are
    /// trying to confirm, so extra authors on the candidate cost nothing.
    #[default]
    Recall,
    /// `|cited ∩ found| / |cited ∪ found|`.
    Jaccard,
}

/// Everything that parameterizes [`Scorer`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub author_overlap: AuthorOverlap,
}

/// Source-agnostic match scorer. Pure; one call per source per citation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Result<Self, CoreError> {
        config.weights.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Blend of title and author similarity, in `[0, 1]`.
    pub fn score(
        &self,
        citation: &CitationRecord,
        candidate_title: Option<&str>,
        candidate_authors: &[String],
    ) -> f64 {
        let title = match (citation.title.as_deref(), candidate_title) {
            (Some(cited), Some(found)) if !cited.is_empty() && !found.is_empty() => {
                title_similarity(cited, found)
            }
            _ => 0.0,
        };
        let authors = author_overlap(
            &citation.authors,
            candidate_authors,
            self.config.author_overlap,
        );

        let weights = self.config.weights;
        (weights.title * title + weights.author * authors).clamp(0.0, 1.0)
    }
}

/// Score with the default weights (0.7 title, 0.3 author) and recall overlap.
pub fn score(
    citation: &CitationRecord,
    candidate_title: Option<&str>,
    candidate_authors: &[String],
) -> f64 {
    Scorer::default().score(citation, candidate_title, candidate_authors)
}

/// Normalized InDel similarity of two titles after [`normalize`].
///
/// Identical normalized forms score 1.0, including two titles that both
/// normalize to nothing.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let norm_a = normalize(a);
    let norm_b = normalize(b);
    if norm_a == norm_b {
        return 1.0;
    }
    rapidfuzz::fuzz::ratio(norm_a.chars(), norm_b.chars()).clamp(0.0, 1.0)
}

/// Overlap between the normalized author name sets. Empty strings are skipped
/// before normalizing; a name that normalizes to nothing still counts. If
/// either side ends up empty the overlap is 0.0.
pub fn author_overlap(cited: &[String], found: &[String], mode: AuthorOverlap) -> f64 {
    let cited = name_set(cited);
    let found = name_set(found);
    if cited.is_empty() || found.is_empty() {
        return 0.0;
    }

    let shared = cited.intersection(&found).count() as f64;
    match mode {
        AuthorOverlap::Recall => shared / cited.len() as f64,
        AuthorOverlap::Jaccard => shared / cited.union(&found).count() as f64,
    }
}

fn name_set(names: &[String]) -> HashSet<String> {
    names
        .iter()
        .filter(|n| !n.is_empty())
        .map(|n| normalize(n))
        .collect()
}
