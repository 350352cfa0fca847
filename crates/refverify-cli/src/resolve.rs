//! Effective configuration: CLI flags over environment over config file over
//! defaults.

use anyhow::Context;
use clap::Args;

use refverify_core::Config;
use refverify_core::config_file::ConfigFile;

pub const ENV_DEEPSEEK_API_KEY: &str = "DEEPSEEK_API_KEY";
pub const ENV_DEEPSEEK_BASE_URL: &str = "DEEPSEEK_BASE_URL";
pub const ENV_S2_API_KEY: &str = "S2_API_KEY";
pub const ENV_TIMEOUT: &str = "REFVERIFY_TIMEOUT";

/// Flags that override the environment and the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// DeepSeek API key for citation extraction
    #[arg(long)]
    pub deepseek_api_key: Option<String>,

    /// Chat model used for citation extraction
    #[arg(long)]
    pub model: Option<String>,

    /// Semantic Scholar API key
    #[arg(long)]
    pub s2_api_key: Option<String>,

    /// Comma-separated list of sources to skip (semantic_scholar, arxiv)
    #[arg(long, value_delimiter = ',')]
    pub disable_sources: Vec<String>,

    /// Citations verified concurrently
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-lookup timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Minimum score for a citation to count as verified
    #[arg(long)]
    pub min_score: Option<f64>,
}

/// Build the effective config. `env` looks up an environment variable; blank
/// values count as unset.
pub fn resolve_config(
    file: &ConfigFile,
    env: impl Fn(&str) -> Option<String>,
    cli: &Overrides,
) -> anyhow::Result<Config> {
    let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    let mut config = Config::default();
    file.apply_to(&mut config);

    if let Some(key) = env(ENV_DEEPSEEK_API_KEY) {
        config.extractor.api_key = Some(key);
    }
    if let Some(url) = env(ENV_DEEPSEEK_BASE_URL) {
        config.extractor.base_url = url;
    }
    if let Some(key) = env(ENV_S2_API_KEY) {
        config.s2_api_key = Some(key);
    }
    if let Some(secs) = env(ENV_TIMEOUT) {
        config.lookup_timeout_secs = secs
            .trim()
            .parse()
            .with_context(|| format!("{ENV_TIMEOUT} must be a whole number of seconds, got {secs:?}"))?;
    }

    if let Some(key) = &cli.deepseek_api_key {
        config.extractor.api_key = Some(key.clone());
    }
    if let Some(model) = &cli.model {
        config.extractor.model = model.clone();
    }
    if let Some(key) = &cli.s2_api_key {
        config.s2_api_key = Some(key.clone());
    }
    if !cli.disable_sources.is_empty() {
        config.disabled_sources = cli.disable_sources.clone();
    }
    if let Some(n) = cli.workers {
        config.num_workers = n;
    }
    if let Some(secs) = cli.timeout {
        config.lookup_timeout_secs = secs;
    }
    if let Some(min) = cli.min_score {
        config.min_score = min;
    }

    config.validate()?;
    Ok(config)
}
