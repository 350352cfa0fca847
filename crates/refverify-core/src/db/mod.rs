//! Lookup backend trait and implementations for querying bibliographic services.

pub mod arxiv;
pub mod mock;
pub mod semantic_scholar;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::{CandidateRecord, SourceStatus};

/// Result of a raw backend query: `None` means the service had no match.
pub type LookupResult = Result<Option<CandidateRecord>, LookupError>;

/// Why a lookup produced no usable candidate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("timed out after {0:.1}s")]
    Timeout(f64),
    #[error("rate limited (429)")]
    RateLimited,
    #[error("HTTP {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl LookupError {
    pub fn timeout(after: Duration) -> Self {
        LookupError::Timeout(after.as_secs_f64())
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LookupError::Network(format!("request timed out: {}", e))
        } else if e.is_decode() {
            LookupError::Malformed(e.to_string())
        } else {
            LookupError::Network(e.to_string())
        }
    }
}

/// Outcome of one lookup. `NotFound` and `Error` both mean "absent, scores
/// 0.0" once they reach the scorer; the difference only matters for logs and
/// progress output.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(CandidateRecord),
    NotFound,
    Error(LookupError),
}

impl LookupOutcome {
    pub fn candidate(&self) -> Option<&CandidateRecord> {
        match self {
            LookupOutcome::Found(c) => Some(c),
            _ => None,
        }
    }

    pub fn status(&self) -> SourceStatus {
        match self {
            LookupOutcome::Found(_) => SourceStatus::Found,
            LookupOutcome::NotFound => SourceStatus::NotFound,
            LookupOutcome::Error(LookupError::Timeout(_)) => SourceStatus::Timeout,
            LookupOutcome::Error(LookupError::RateLimited) => SourceStatus::RateLimited,
            LookupOutcome::Error(_) => SourceStatus::Error,
        }
    }
}

impl From<LookupResult> for LookupOutcome {
    fn from(result: LookupResult) -> Self {
        match result {
            Ok(Some(candidate)) => LookupOutcome::Found(candidate),
            Ok(None) => LookupOutcome::NotFound,
            Err(e) => LookupOutcome::Error(e),
        }
    }
}

/// A bibliographic search service that returns at most one candidate.
pub trait LookupBackend: Send + Sync {
    /// Stable identifier, used as the report key (e.g. `semantic_scholar`).
    fn id(&self) -> &str;

    /// Human-readable name (e.g. "Semantic Scholar").
    fn name(&self) -> &str;

    /// Search for a publication by title and, where the service supports it,
    /// first author. A missing match is `Ok(None)`, never an error.
    fn query<'a>(
        &'a self,
        title: Option<&'a str>,
        first_author: Option<&'a str>,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = LookupResult> + Send + 'a>>;
}

/// Map a non-success HTTP status to a lookup error.
pub(crate) fn status_error(status: reqwest::StatusCode) -> LookupError {
    if status.as_u16() == 429 {
        LookupError::RateLimited
    } else {
        LookupError::Http(status.as_u16())
    }
}

/// Collapse internal whitespace runs; `None` for blank strings.
pub(crate) fn clean_field(s: &str) -> Option<String> {
    let joined = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() { None } else { Some(joined) }
}
