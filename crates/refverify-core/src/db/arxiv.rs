use super::{LookupBackend, LookupError, LookupResult, clean_field, status_error};
use crate::CandidateRecord;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://export.arxiv.org";

pub struct Arxiv {
    pub base_url: String,
}

impl Default for Arxiv {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl LookupBackend for Arxiv {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn query<'a>(
        &'a self,
        title: Option<&'a str>,
        first_author: Option<&'a str>,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = LookupResult> + Send + 'a>> {
        Box::pin(async move {
            let Some(search) = build_search_query(title, first_author) else {
                return Ok(None);
            };
            let url = format!(
                "{}/api/query?search_query={}&start=0&max_results=1",
                self.base_url.trim_end_matches('/'),
                urlencoding::encode(&search)
            );

            let resp = client.get(&url).timeout(timeout).send().await?;

            if !resp.status().is_success() {
                return Err(status_error(resp.status()));
            }

            let body = resp.text().await?;

            // Parse Atom XML feed
            parse_arxiv_response(&body)
        })
    }
}

/// `ti:"<title>" AND au:"<author>"`, each part only when present.
pub(crate) fn build_search_query(title: Option<&str>, first_author: Option<&str>) -> Option<String> {
    let quoted = |field: &str, value: &str| {
        let value = value.replace('"', " ");
        format!("{}:\"{}\"", field, value.split_whitespace().collect::<Vec<_>>().join(" "))
    };

    let mut parts = Vec::new();
    if let Some(t) = title.filter(|t| !t.trim().is_empty()) {
        parts.push(quoted("ti", t));
    }
    if let Some(a) = first_author.filter(|a| !a.trim().is_empty()) {
        parts.push(quoted("au", a));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" AND "))
    }
}

/// Read the first `<entry>` of an arXiv Atom feed.
///
/// The API reports bad queries as a regular entry whose id lives under
/// `/api/errors`; that is surfaced as an error, not a candidate.
pub(crate) fn parse_arxiv_response(xml: &str) -> LookupResult {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);

    let mut in_entry = false;
    let mut in_title = false;
    let mut in_id = false;
    let mut in_author = false;
    let mut in_name = false;

    let mut current_title = String::new();
    let mut current_id = String::new();
    let mut current_name = String::new();
    let mut current_authors: Vec<String> = Vec::new();

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"entry" => in_entry = true,
                b"title" if in_entry => in_title = true,
                b"id" if in_entry && !in_author => in_id = true,
                b"author" if in_entry => {
                    in_author = true;
                    current_name.clear();
                }
                b"name" if in_author => in_name = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| LookupError::Malformed(format!("XML text error: {}", err)))?;
                if in_title {
                    current_title.push_str(&text);
                } else if in_id {
                    current_id.push_str(&text);
                } else if in_name {
                    current_name.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"entry" if in_entry => {
                    if current_id.contains("/api/errors") {
                        let reason = clean_field(&current_title)
                            .unwrap_or_else(|| "arXiv API error".to_string());
                        return Err(LookupError::Malformed(reason));
                    }
                    return Ok(Some(CandidateRecord {
                        title: clean_field(&current_title),
                        authors: current_authors,
                    }));
                }
                b"title" => in_title = false,
                b"id" => in_id = false,
                b"author" if in_author => {
                    if let Some(name) = clean_field(&current_name) {
                        current_authors.push(name);
                    }
                    in_author = false;
                }
                b"name" => in_name = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(LookupError::Malformed(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=ti:"attention"</title>
  <id>http://arxiv.org/api/cHxbiOdZaP56ODnBPIenZhzg5f8</id>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <title>Attention Is All
      You Need</title>
    <author>
      <name>Ashish Vaswani</name>
    </author>
    <author>
      <name>Noam Shazeer</name>
      <arxiv:affiliation>Google Brain</arxiv:affiliation>
    </author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/0000.00000v1</id>
    <title>Not this one</title>
  </entry>
</feed>"#;

    #[test]
    fn parses_first_entry() {
        let candidate = parse_arxiv_response(FEED).unwrap().unwrap();
        assert_eq!(candidate.title.as_deref(), Some("Attention Is All You Need"));
        assert_eq!(candidate.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
    }

    #[test]
    fn empty_feed_is_not_found() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <title>ArXiv Query</title>
            <opensearch:totalResults xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">0</opensearch:totalResults>
        </feed>"#;
        assert_eq!(parse_arxiv_response(xml).unwrap(), None);
    }

    #[test]
    fn error_entry_is_error() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <id>http://arxiv.org/api/errors#incorrect_id_format_for_1234</id>
            <title>Error</title>
            <summary>incorrect id format for 1234</summary>
          </entry>
        </feed>"#;
        assert!(matches!(
            parse_arxiv_response(xml),
            Err(LookupError::Malformed(_))
        ));
    }

    #[test]
    fn entry_without_title_degrades() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry><id>http://arxiv.org/abs/1</id><author><name>Solo Author</name></author></entry>
        </feed>"#;
        let candidate = parse_arxiv_response(xml).unwrap().unwrap();
        assert_eq!(candidate.title, None);
        assert_eq!(candidate.authors, vec!["Solo Author"]);
    }

    #[test]
    fn broken_xml_is_error() {
        assert!(parse_arxiv_response("<feed><entry><title>x</entry></feed>").is_err());
    }

    #[test]
    fn search_query_parts() {
        assert_eq!(
            build_search_query(Some("Deep  \"Residual\" Learning"), Some("Kaiming He")).as_deref(),
            Some(r#"ti:"Deep Residual Learning" AND au:"Kaiming He""#)
        );
        assert_eq!(
            build_search_query(None, Some("Kaiming He")).as_deref(),
            Some(r#"au:"Kaiming He""#)
        );
        assert_eq!(build_search_query(Some("  "), None), None);
    }
}
