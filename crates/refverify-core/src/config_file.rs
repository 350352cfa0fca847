use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{AuthorOverlap, Config, ScoringWeights};

pub const CWD_CONFIG_NAME: &str = ".refverify.toml";

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api_keys: Option<ApiKeysConfig>,
    pub llm: Option<LlmConfig>,
    pub verification: Option<VerificationConfig>,
    pub scoring: Option<ScoringFileConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub deepseek_api_key: Option<String>,
    pub s2_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub min_score: Option<f64>,
    pub num_workers: Option<usize>,
    pub lookup_timeout_secs: Option<u64>,
    pub disabled_sources: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringFileConfig {
    pub title_weight: Option<f64>,
    pub author_weight: Option<f64>,
    pub author_overlap: Option<AuthorOverlap>,
}

/// Platform config directory path: `<config_dir>/refverify/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("refverify").join("config.toml"))
}

/// Load config by cascading CWD `.refverify.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(CWD_CONFIG_NAME));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed; a parse failure is logged.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
            None
        }
    }
}

/// First `Some` of overlay, then base.
fn pick<S, T>(overlay: &Option<S>, base: &Option<S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        api_keys: Some(ApiKeysConfig {
            deepseek_api_key: pick(&overlay.api_keys, &base.api_keys, |a| a.deepseek_api_key.clone()),
            s2_api_key: pick(&overlay.api_keys, &base.api_keys, |a| a.s2_api_key.clone()),
        }),
        llm: Some(LlmConfig {
            model: pick(&overlay.llm, &base.llm, |l| l.model.clone()),
            base_url: pick(&overlay.llm, &base.llm, |l| l.base_url.clone()),
            timeout_secs: pick(&overlay.llm, &base.llm, |l| l.timeout_secs),
        }),
        verification: Some(VerificationConfig {
            min_score: pick(&overlay.verification, &base.verification, |v| v.min_score),
            num_workers: pick(&overlay.verification, &base.verification, |v| v.num_workers),
            lookup_timeout_secs: pick(&overlay.verification, &base.verification, |v| {
                v.lookup_timeout_secs
            }),
            disabled_sources: pick(&overlay.verification, &base.verification, |v| {
                v.disabled_sources.clone()
            }),
        }),
        scoring: Some(ScoringFileConfig {
            title_weight: pick(&overlay.scoring, &base.scoring, |s| s.title_weight),
            author_weight: pick(&overlay.scoring, &base.scoring, |s| s.author_weight),
            author_overlap: pick(&overlay.scoring, &base.scoring, |s| s.author_overlap),
        }),
    }
}

impl ConfigFile {
    /// Layer this file's values over `config`. Unset fields leave `config`
    /// untouched, so defaults survive a partial file.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(keys) = &self.api_keys {
            if let Some(k) = &keys.deepseek_api_key {
                config.extractor.api_key = Some(k.clone());
            }
            if let Some(k) = &keys.s2_api_key {
                config.s2_api_key = Some(k.clone());
            }
        }
        if let Some(llm) = &self.llm {
            if let Some(model) = &llm.model {
                config.extractor.model = model.clone();
            }
            if let Some(url) = &llm.base_url {
                config.extractor.base_url = url.clone();
            }
            if let Some(secs) = llm.timeout_secs {
                config.extractor.timeout_secs = secs;
            }
        }
        if let Some(v) = &self.verification {
            if let Some(min) = v.min_score {
                config.min_score = min;
            }
            if let Some(n) = v.num_workers {
                config.num_workers = n;
            }
            if let Some(secs) = v.lookup_timeout_secs {
                config.lookup_timeout_secs = secs;
            }
            if let Some(disabled) = &v.disabled_sources {
                config.disabled_sources = disabled.clone();
            }
        }
        if let Some(s) = &self.scoring {
            // Setting one weight alone implies the other.
            config.scoring.weights = match (s.title_weight, s.author_weight) {
                (Some(title), Some(author)) => ScoringWeights { title, author },
                (Some(title), None) => ScoringWeights { title, author: 1.0 - title },
                (None, Some(author)) => ScoringWeights { title: 1.0 - author, author },
                (None, None) => config.scoring.weights,
            };
            if let Some(mode) = s.author_overlap {
                config.scoring.author_overlap = mode;
            }
        }
    }
}

/// Save the config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    save_to_path(config, &path)?;
    Ok(path)
}

pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_deserializes() {
        let toml_str = "[verification]\nmin_score = 0.6\n\n[scoring]\nauthor_overlap = \"jaccard\"\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        assert!(parsed.api_keys.is_none());
        let v = parsed.verification.unwrap();
        assert_eq!(v.min_score, Some(0.6));
        assert!(v.num_workers.is_none());
        assert_eq!(parsed.scoring.unwrap().author_overlap, Some(AuthorOverlap::Jaccard));
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                s2_api_key: Some("base-s2".into()),
                deepseek_api_key: Some("base-ds".into()),
            }),
            verification: Some(VerificationConfig {
                num_workers: Some(2),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                s2_api_key: Some("cwd-s2".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let keys = merged.api_keys.unwrap();
        assert_eq!(keys.s2_api_key.as_deref(), Some("cwd-s2"));
        assert_eq!(keys.deepseek_api_key.as_deref(), Some("base-ds"));
        assert_eq!(merged.verification.unwrap().num_workers, Some(2));
    }

    #[test]
    fn apply_only_touches_set_fields() {
        let file = ConfigFile {
            verification: Some(VerificationConfig {
                lookup_timeout_secs: Some(5),
                disabled_sources: Some(vec!["arxiv".into()]),
                ..Default::default()
            }),
            llm: Some(LlmConfig {
                model: Some("deepseek-chat".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut config = Config::default();
        file.apply_to(&mut config);
        assert_eq!(config.lookup_timeout_secs, 5);
        assert_eq!(config.disabled_sources, vec!["arxiv"]);
        assert_eq!(config.extractor.model, "deepseek-chat");
        assert_eq!(config.min_score, 0.5);
        assert_eq!(config.num_workers, 4);
    }

    #[test]
    fn single_weight_implies_the_other() {
        let file = ConfigFile {
            scoring: Some(ScoringFileConfig {
                title_weight: Some(0.8),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut config = Config::default();
        file.apply_to(&mut config);
        assert!((config.scoring.weights.author - 0.2).abs() < 1e-9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                s2_api_key: Some("k".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        save_to_path(&config, &path).unwrap();
        assert_eq!(load_from_path(&path), Some(config));
    }

    #[test]
    fn unparsable_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "verification = [[[").unwrap();
        assert_eq!(load_from_path(&path), None);
    }
}
