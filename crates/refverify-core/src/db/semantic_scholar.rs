use super::{LookupBackend, LookupError, LookupResult, clean_field, status_error};
use crate::CandidateRecord;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org";

/// Semantic Scholar title match (`/graph/v1/paper/search/match`).
///
/// The endpoint returns its single best title match, so only the title is
/// sent; the first author is ignored.
pub struct SemanticScholar {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl SemanticScholar {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl LookupBackend for SemanticScholar {
    fn id(&self) -> &str {
        "semantic_scholar"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn query<'a>(
        &'a self,
        title: Option<&'a str>,
        _first_author: Option<&'a str>,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = LookupResult> + Send + 'a>> {
        Box::pin(async move {
            let Some(title) = title else {
                return Ok(None);
            };

            let url = format!(
                "{}/graph/v1/paper/search/match?query={}&fields=title,authors",
                self.base_url.trim_end_matches('/'),
                urlencoding::encode(title)
            );

            let mut req = client
                .get(&url)
                .header("User-Agent", "refverify citation checker")
                .timeout(timeout);

            if let Some(ref key) = self.api_key {
                req = req.header("x-api-key", key);
            }

            let resp = req.send().await?;

            let status = resp.status();
            // The match endpoint answers 404 when no title matches.
            if status.as_u16() == 404 {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(status_error(status));
            }

            let body = resp.text().await?;
            parse_match_response(&body)
        })
    }
}

/// Take the first element of `data[]`. Missing fields degrade to `None` /
/// empty rather than failing the lookup.
pub(crate) fn parse_match_response(body: &str) -> LookupResult {
    let data: serde_json::Value =
        serde_json::from_str(body).map_err(|e| LookupError::Malformed(e.to_string()))?;

    let Some(item) = data["data"].as_array().and_then(|items| items.first()) else {
        return Ok(None);
    };

    let title = item["title"].as_str().and_then(clean_field);
    let authors: Vec<String> = item["authors"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|a| a["name"].as_str().and_then(clean_field))
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(CandidateRecord { title, authors }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_match() {
        let body = r#"{"data": [
            {"paperId": "204e3073", "title": "Attention is All you Need",
             "matchScore": 183.2,
             "authors": [{"authorId": "40348417", "name": "Ashish Vaswani"},
                         {"authorId": "1846258", "name": "Noam M. Shazeer"}]},
            {"paperId": "x", "title": "Second", "authors": []}
        ]}"#;
        let candidate = parse_match_response(body).unwrap().unwrap();
        assert_eq!(candidate.title.as_deref(), Some("Attention is All you Need"));
        assert_eq!(candidate.authors, vec!["Ashish Vaswani", "Noam M. Shazeer"]);
    }

    #[test]
    fn empty_data_is_not_found() {
        assert_eq!(parse_match_response(r#"{"data": []}"#).unwrap(), None);
        assert_eq!(parse_match_response(r#"{"total": 0}"#).unwrap(), None);
    }

    #[test]
    fn partial_item_degrades() {
        let body = r#"{"data": [{"paperId": "abc", "authors": [{"authorId": "1"}, {"name": "Jane Roe"}]}]}"#;
        let candidate = parse_match_response(body).unwrap().unwrap();
        assert_eq!(candidate.title, None);
        assert_eq!(candidate.authors, vec!["Jane Roe"]);
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_match_response("<html>oops</html>"),
            Err(LookupError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn missing_title_skips_request() {
        let backend = SemanticScholar {
            api_key: None,
            base_url: "http://127.0.0.1:9".into(),
        };
        let client = reqwest::Client::new();
        let result = backend
            .query(None, Some("Someone"), &client, Duration::from_secs(1))
            .await;
        assert_eq!(result, Ok(None));
    }
}
