//! Mock lookup backend for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{LookupBackend, LookupError, LookupResult};
use crate::CandidateRecord;

/// A configurable mock response for [`MockDb`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Simulate a candidate being returned.
    Found {
        title: Option<String>,
        authors: Vec<String>,
    },
    /// Simulate "no match in this service".
    NotFound,
    /// Simulate a failed request.
    Error(LookupError),
}

impl MockResponse {
    pub fn found(title: &str, authors: &[&str]) -> Self {
        MockResponse::Found {
            title: Some(title.to_string()),
            authors: authors.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// A hand-rolled mock implementing [`LookupBackend`].
///
/// Supports a fixed response, a per-call sequence (the last response repeats
/// once exhausted), a response keyed on the queried title, simulated latency
/// and call counting.
pub struct MockDb {
    id: &'static str,
    name: &'static str,
    /// Reversed so `pop()` yields the next response.
    responses: Mutex<Vec<MockResponse>>,
    by_title: Vec<(String, MockResponse)>,
    fallback: MockResponse,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    queries: Mutex<Vec<(Option<String>, Option<String>)>>,
}

impl MockDb {
    /// Create a mock that always returns `response`.
    pub fn new(id: &'static str, response: MockResponse) -> Self {
        Self {
            id,
            name: id,
            responses: Mutex::new(Vec::new()),
            by_title: Vec::new(),
            fallback: response,
            delay: None,
            call_count: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(id: &'static str, mut responses: Vec<MockResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        let fallback = responses[responses.len() - 1].clone();
        responses.reverse();
        let mut db = Self::new(id, fallback);
        db.responses = Mutex::new(responses);
        db
    }

    /// Return `response` whenever the queried title equals `title`.
    pub fn on_title(mut self, title: &str, response: MockResponse) -> Self {
        self.by_title.push((title.to_string(), response));
        self
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `query()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The `(title, first_author)` pairs seen so far, in call order.
    pub fn queries(&self) -> Vec<(Option<String>, Option<String>)> {
        self.queries.lock().unwrap().clone()
    }

    fn next_response(&self, title: Option<&str>) -> MockResponse {
        if let Some((_, resp)) = self
            .by_title
            .iter()
            .find(|(t, _)| Some(t.as_str()) == title)
        {
            return resp.clone();
        }
        let mut seq = self.responses.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl LookupBackend for MockDb {
    fn id(&self) -> &str {
        self.id
    }

    fn name(&self) -> &str {
        self.name
    }

    fn query<'a>(
        &'a self,
        title: Option<&'a str>,
        first_author: Option<&'a str>,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = LookupResult> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap()
            .push((title.map(String::from), first_author.map(String::from)));
        let response = self.next_response(title);
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }

            match response {
                MockResponse::Found { title, authors } => {
                    Ok(Some(CandidateRecord { title, authors }))
                }
                MockResponse::NotFound => Ok(None),
                MockResponse::Error(e) => Err(e),
            }
        })
    }
}
