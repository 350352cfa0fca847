use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub mod backend;
pub mod checker;
pub mod config_file;
pub mod db;
pub mod extractor;
pub mod matching;
pub mod normalize;
pub mod orchestrator;
pub mod report;

// Re-export for convenience
pub use backend::{BackendError, PlainTextSource, TextSource};
pub use checker::Verifier;
pub use db::{LookupBackend, LookupError, LookupOutcome};
pub use extractor::{CitationExtractor, ExtractorConfig};
pub use matching::{AuthorOverlap, Scorer, ScoringConfig, ScoringWeights, score};
pub use normalize::normalize;
pub use orchestrator::verify_citation;
pub use report::{Report, ReportStats, VerificationEntry};

/// A citation as structured by the extractor. Untrusted: the title may be
/// missing and the author list may be empty or partly hallucinated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CitationRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub authors: Vec<String>,
}

impl CitationRecord {
    pub fn new(title: impl Into<String>, authors: Vec<String>) -> Self {
        Self {
            title: Some(title.into()),
            authors,
        }
    }

    /// Title trimmed, or `None` when missing or blank.
    pub fn query_title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// First non-blank author name.
    pub fn first_author(&self) -> Option<&str> {
        self.authors
            .iter()
            .map(|a| a.trim())
            .find(|a| !a.is_empty())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let names: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(names.unwrap_or_default().into_iter().flatten().collect())
}

/// A possible match returned by one lookup backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandidateRecord {
    pub title: Option<String>,
    pub authors: Vec<String>,
}

/// The scored candidate from one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    #[serde(skip)]
    pub source: String,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub score: f64,
}

/// One source's slot in a verification entry. `result` is `None` when the
/// source had no candidate, failed, or timed out.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMatch {
    pub source: String,
    pub result: Option<MatchResult>,
}

impl SourceMatch {
    pub fn score(&self) -> f64 {
        self.result.as_ref().map_or(0.0, |m| m.score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Verified,
    Unverified,
}

impl Classification {
    /// Inclusive threshold: a score equal to `min_score` is verified.
    pub fn from_score(score: f64, min_score: f64) -> Self {
        if score >= min_score {
            Classification::Verified
        } else {
            Classification::Unverified
        }
    }
}

/// How one lookup ended, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Found,
    NotFound,
    Timeout,
    RateLimited,
    Error,
}

/// Progress events emitted during verification.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Checking {
        index: usize,
        total: usize,
        title: String,
    },
    SourceComplete {
        index: usize,
        source: String,
        status: SourceStatus,
        elapsed: Duration,
    },
    Result {
        index: usize,
        total: usize,
        entry: Box<VerificationEntry>,
    },
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("text extraction failed: {0}")]
    Backend(#[from] BackendError),
    #[error("no text could be extracted from {0}")]
    EmptyText(String),
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error("citation extractor request failed: {0}")]
    ExtractorRequest(String),
    #[error("could not parse citation extractor response: {0}")]
    ExtractorParse(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("verification cancelled")]
    Cancelled,
}

/// Configuration for the verifier and the citation extractor.
#[derive(Clone)]
pub struct Config {
    pub s2_api_key: Option<String>,
    /// Concurrent citations in flight.
    pub num_workers: usize,
    /// Upper bound on a single lookup, request included.
    pub lookup_timeout_secs: u64,
    /// Source ids (`semantic_scholar`, `arxiv`) or display names to skip.
    pub disabled_sources: Vec<String>,
    pub min_score: f64,
    pub scoring: ScoringConfig,
    pub extractor: ExtractorConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("s2_api_key", &self.s2_api_key.as_ref().map(|_| "***"))
            .field("num_workers", &self.num_workers)
            .field("lookup_timeout_secs", &self.lookup_timeout_secs)
            .field("disabled_sources", &self.disabled_sources)
            .field("min_score", &self.min_score)
            .field("scoring", &self.scoring)
            .field("extractor", &self.extractor)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            s2_api_key: None,
            num_workers: 4,
            lookup_timeout_secs: 20,
            disabled_sources: vec![],
            min_score: 0.5,
            scoring: ScoringConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl Config {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    /// Check the verification settings. The extractor credential is checked
    /// separately by [`CitationExtractor::new`] since a run that loads
    /// citations from a file never needs it.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(CoreError::InvalidConfig(format!(
                "min_score must be within [0, 1], got {}",
                self.min_score
            )));
        }
        if self.num_workers == 0 {
            return Err(CoreError::InvalidConfig("num_workers must be at least 1".into()));
        }
        if self.lookup_timeout_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "lookup_timeout_secs must be at least 1".into(),
            ));
        }
        self.scoring.weights.validate()
    }

    pub fn is_source_disabled(&self, id: &str, name: &str) -> bool {
        self.disabled_sources
            .iter()
            .any(|d| d.eq_ignore_ascii_case(id) || d.eq_ignore_ascii_case(name))
    }
}
