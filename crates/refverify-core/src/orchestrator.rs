use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;

use crate::db::{LookupBackend, LookupError, LookupOutcome};
use crate::matching::Scorer;
use crate::report::VerificationEntry;
use crate::{CitationRecord, Classification, MatchResult, SourceMatch, SourceStatus};

/// Outcome of one source for one citation, as seen by the progress callback.
#[derive(Debug, Clone)]
pub struct SourceCompletion {
    pub source: String,
    pub status: SourceStatus,
    pub elapsed: Duration,
}

/// Query one backend with a hard upper bound. A timeout is reported exactly
/// like a failed request.
pub async fn lookup(
    backend: &dyn LookupBackend,
    citation: &CitationRecord,
    client: &reqwest::Client,
    timeout: Duration,
) -> LookupOutcome {
    let query = backend.query(citation.query_title(), citation.first_author(), client, timeout);
    match tokio::time::timeout(timeout, query).await {
        Ok(result) => result.into(),
        Err(_) => LookupOutcome::Error(LookupError::timeout(timeout)),
    }
}

/// Verify one citation against every backend.
///
/// All backends are queried concurrently and the results are joined back in
/// backend order. Errors and timeouts leave that source's slot empty (score
/// 0.0); they never fail the citation.
pub async fn verify_citation(
    citation: &CitationRecord,
    backends: &[Arc<dyn LookupBackend>],
    client: &reqwest::Client,
    scorer: &Scorer,
    timeout: Duration,
    min_score: f64,
    on_source_complete: Option<&(dyn Fn(SourceCompletion) + Send + Sync)>,
) -> VerificationEntry {
    let queries = backends.iter().map(|backend| async move {
        let start = Instant::now();
        let outcome = lookup(backend.as_ref(), citation, client, timeout).await;
        let elapsed = start.elapsed();

        match &outcome {
            LookupOutcome::Found(_) => {
                tracing::debug!(source = backend.id(), ?elapsed, "candidate found")
            }
            LookupOutcome::NotFound => {
                tracing::debug!(source = backend.id(), ?elapsed, "no candidate")
            }
            LookupOutcome::Error(err) => tracing::warn!(
                source = backend.id(),
                title = citation.title.as_deref().unwrap_or(""),
                error = %err,
                "lookup failed, treating source as absent"
            ),
        }

        if let Some(cb) = on_source_complete {
            cb(SourceCompletion {
                source: backend.id().to_string(),
                status: outcome.status(),
                elapsed,
            });
        }

        (backend.id().to_string(), outcome)
    });

    let sources: Vec<SourceMatch> = join_all(queries)
        .await
        .into_iter()
        .map(|(source, outcome)| {
            let result = outcome.candidate().map(|candidate| MatchResult {
                source: source.clone(),
                score: scorer.score(citation, candidate.title.as_deref(), &candidate.authors),
                title: candidate.title.clone(),
                authors: candidate.authors.clone(),
            });
            SourceMatch { source, result }
        })
        .collect();

    let score = sources.iter().map(SourceMatch::score).fold(0.0, f64::max);

    VerificationEntry {
        title: citation.title.clone(),
        authors: citation.authors.clone(),
        sources,
        score,
        classification: Classification::from_score(score, min_score),
    }
}
