//! LLM-backed citation structuring over an OpenAI-compatible
//! chat-completions endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CitationRecord, CoreError};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_MODEL: &str = "deepseek-reasoner";

const SYSTEM_PROMPT: &str = "Return strict JSON only.";
const USER_PROMPT: &str = "Extract citations from the references section below. \
Return strict JSON only: an array of objects with keys \"title\" and \"authors\" \
(authors as a list of full names). No extra text.";

#[derive(Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Reasoning models can take minutes on a long bibliography.
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 300,
        }
    }
}

impl std::fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ExtractorConfig {
    /// The only place the extractor credential is checked.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(CoreError::MissingCredential(
                "DEEPSEEK_API_KEY is not set (use --deepseek-api-key, the environment, or [api_keys] in the config file)"
                    .into(),
            )),
        }
    }
}

/// Turns a reference block into citation records with one LLM call.
pub struct CitationExtractor {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl CitationExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let api_key = config.api_key.clone().unwrap_or_default();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    pub async fn extract(&self, reference_text: &str) -> Result<Vec<CitationRecord>, CoreError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("{}\n\n{}", USER_PROMPT, reference_text)},
            ],
        });

        tracing::info!(model = %self.model, chars = reference_text.len(), "requesting citation extraction");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::ExtractorRequest(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(CoreError::ExtractorRequest(format!(
                "HTTP {}: {}",
                status.as_u16(),
                detail.trim()
            )));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CoreError::ExtractorParse(e.to_string()))?;
        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| CoreError::ExtractorParse("response has no message content".into()))?;

        let citations = parse_citations(content)?;
        tracing::info!(count = citations.len(), "citations extracted");
        Ok(citations)
    }
}

/// Parse the model's reply into citation records.
///
/// Accepts a bare JSON array, the same wrapped in a Markdown code fence, or
/// an object holding the array under `citations` or `references`.
pub fn parse_citations(content: &str) -> Result<Vec<CitationRecord>, CoreError> {
    let json = strip_code_fence(content.trim());
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| CoreError::ExtractorParse(e.to_string()))?;

    let array = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => map
            .remove("citations")
            .or_else(|| map.remove("references"))
            .filter(|v| v.is_array())
            .ok_or_else(|| CoreError::ExtractorParse("expected a JSON array of citations".into()))?,
        _ => {
            return Err(CoreError::ExtractorParse(
                "expected a JSON array of citations".into(),
            ));
        }
    };

    serde_json::from_value(array).map_err(|e| CoreError::ExtractorParse(e.to_string()))
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string (```json).
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
