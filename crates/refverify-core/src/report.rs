//! The verification report and its JSON form.
//!
//! Each entry serializes its per-source results under the source id, so a
//! two-source run produces
//! `{"title", "authors", "semantic_scholar", "arxiv", "score"}` with `null` for
//! a source that yielded nothing.

use std::collections::BTreeMap;
use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::{Classification, SourceMatch};

/// The verdict for one citation record.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationEntry {
    pub title: Option<String>,
    pub authors: Vec<String>,
    /// One slot per queried source, in source order.
    pub sources: Vec<SourceMatch>,
    /// Max over `sources`, absent sources counting as 0.0.
    pub score: f64,
    pub classification: Classification,
}

impl VerificationEntry {
    /// The source whose candidate produced the overall score, if any did.
    pub fn best_source(&self) -> Option<&SourceMatch> {
        self.sources
            .iter()
            .filter(|s| s.result.is_some())
            .max_by(|a, b| a.score().total_cmp(&b.score()))
    }
}

impl Serialize for VerificationEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.sources.len()))?;
        map.serialize_entry("title", &self.title)?;
        map.serialize_entry("authors", &self.authors)?;
        for slot in &self.sources {
            map.serialize_entry(&slot.source, &slot.result)?;
        }
        map.serialize_entry("score", &self.score)?;
        map.end()
    }
}

/// Citations split by classification. Both buckets keep input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub verified: Vec<VerificationEntry>,
    pub unverified: Vec<VerificationEntry>,
}

/// Summary counts for a finished report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub total: usize,
    pub verified: usize,
    pub unverified: usize,
    /// How many entries each source returned a candidate for.
    pub source_hits: BTreeMap<String, usize>,
}

impl Report {
    /// Stable partition of entries by their classification.
    pub fn from_entries(entries: impl IntoIterator<Item = VerificationEntry>) -> Self {
        let mut report = Report::default();
        for entry in entries {
            match entry.classification {
                Classification::Verified => report.verified.push(entry),
                Classification::Unverified => report.unverified.push(entry),
            }
        }
        report
    }

    pub fn len(&self) -> usize {
        self.verified.len() + self.unverified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ReportStats {
        let mut source_hits = BTreeMap::new();
        for entry in self.verified.iter().chain(&self.unverified) {
            for slot in &entry.sources {
                let hits = source_hits.entry(slot.source.clone()).or_insert(0);
                if slot.result.is_some() {
                    *hits += 1;
                }
            }
        }
        ReportStats {
            total: self.len(),
            verified: self.verified.len(),
            unverified: self.unverified.len(),
            source_hits,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as pretty-printed JSON, replacing any existing file.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json_pretty().map_err(std::io::Error::other)?;
        std::fs::write(path, json + "\n")
    }
}
