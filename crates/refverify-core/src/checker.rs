use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::db::LookupBackend;
use crate::db::arxiv::Arxiv;
use crate::db::semantic_scholar::SemanticScholar;
use crate::matching::Scorer;
use crate::orchestrator::{SourceCompletion, verify_citation};
use crate::report::{Report, VerificationEntry};
use crate::{CitationRecord, Config, CoreError, ProgressEvent};

/// Cross-checks citation records against the configured lookup backends.
///
/// Citations are verified concurrently, at most `num_workers` at a time,
/// through an order-preserving buffer, so the report buckets always follow
/// input order regardless of which lookups finish first.
pub struct Verifier {
    backends: Vec<Arc<dyn LookupBackend>>,
    client: reqwest::Client,
    scorer: Scorer,
    timeout: Duration,
    num_workers: usize,
}

impl Verifier {
    /// Build a verifier with the real backends, Semantic Scholar first, then
    /// arXiv. Sources named in `disabled_sources` are left out entirely.
    pub fn new(config: &Config) -> Result<Self, CoreError> {
        let candidates: Vec<Arc<dyn LookupBackend>> = vec![
            Arc::new(SemanticScholar::new(config.s2_api_key.clone())),
            Arc::new(Arxiv::default()),
        ];
        let backends = candidates
            .into_iter()
            .filter(|b| !config.is_source_disabled(b.id(), b.name()))
            .collect();
        Self::with_backends(config, backends)
    }

    /// Build a verifier over explicit backends, queried in the given order.
    pub fn with_backends(
        config: &Config,
        backends: Vec<Arc<dyn LookupBackend>>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            backends,
            client,
            scorer: Scorer::new(config.scoring)?,
            timeout: config.lookup_timeout(),
            num_workers: config.num_workers.max(1),
        })
    }

    /// Ids of the backends this verifier queries, in order.
    pub fn source_ids(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.id().to_string()).collect()
    }

    /// Verify every citation and partition the results by `min_score`.
    ///
    /// Never fails: lookup errors only lower a citation's score.
    pub async fn verify(&self, citations: &[CitationRecord], min_score: f64) -> Report {
        Report::from_entries(self.verify_entries(citations, min_score, None).await)
    }

    /// Like [`verify`](Self::verify), emitting progress events and honoring
    /// cancellation. A cancelled run yields [`CoreError::Cancelled`] rather
    /// than a partial report.
    pub async fn verify_with_progress(
        &self,
        citations: &[CitationRecord],
        min_score: f64,
        progress: impl Fn(ProgressEvent) + Send + Sync,
        cancel: CancellationToken,
    ) -> Result<Report, CoreError> {
        let progress: &(dyn Fn(ProgressEvent) + Send + Sync) = &progress;
        let entries = tokio::select! {
            entries = self.verify_entries(citations, min_score, Some(progress)) => entries,
            _ = cancel.cancelled() => {
                tracing::info!("verification cancelled");
                return Err(CoreError::Cancelled);
            }
        };
        Ok(Report::from_entries(entries))
    }

    async fn verify_entries(
        &self,
        citations: &[CitationRecord],
        min_score: f64,
        progress: Option<&(dyn Fn(ProgressEvent) + Send + Sync)>,
    ) -> Vec<VerificationEntry> {
        let total = citations.len();
        tracing::info!(
            total,
            sources = ?self.source_ids(),
            workers = self.num_workers,
            "verifying citations"
        );

        stream::iter(citations.iter().enumerate())
            .map(|(index, citation)| async move {
                if let Some(emit) = progress {
                    emit(ProgressEvent::Checking {
                        index,
                        total,
                        title: citation.title.clone().unwrap_or_default(),
                    });
                }

                let on_source: &(dyn Fn(SourceCompletion) + Send + Sync) =
                    &|c: SourceCompletion| {
                        if let Some(emit) = progress {
                            emit(ProgressEvent::SourceComplete {
                                index,
                                source: c.source,
                                status: c.status,
                                elapsed: c.elapsed,
                            });
                        }
                    };

                let entry = verify_citation(
                    citation,
                    &self.backends,
                    &self.client,
                    &self.scorer,
                    self.timeout,
                    min_score,
                    Some(on_source),
                )
                .await;

                if let Some(emit) = progress {
                    emit(ProgressEvent::Result {
                        index,
                        total,
                        entry: Box::new(entry.clone()),
                    });
                }
                entry
            })
            .buffered(self.num_workers)
            .collect()
            .await
    }
}
