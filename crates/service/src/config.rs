use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "readingtype.toml";
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Values shipped in sample `.env` files; treated the same as no key at all.
const PLACEHOLDER_KEYS: [&str; 2] = ["your_deepseek_api_key_here", "your_api_key_here"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 3000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DictionarySource {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub upstream: UpstreamConfig,
    pub dictionary: DictionarySource,
}

impl ServiceConfig {
    /// Reads the file named by `READINGTYPE_CONFIG`, or the default path.
    pub fn from_env() -> Result<Self> {
        let path = env::var("READINGTYPE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load(Path::new(&path))
    }

    /// A missing file yields the defaults; an unreadable or invalid one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }
}

pub fn api_key_from_env() -> Option<String> {
    env::var("DEEPSEEK_API_KEY")
        .ok()
        .and_then(|raw| usable_api_key(&raw))
}

/// `None` means the relay runs in demo mode.
pub fn usable_api_key(raw: &str) -> Option<String> {
    let key = raw.trim();
    if key.is_empty() || PLACEHOLDER_KEYS.contains(&key) {
        None
    } else {
        Some(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_keys_mean_demo_mode() {
        assert_eq!(usable_api_key(""), None);
        assert_eq!(usable_api_key("  "), None);
        assert_eq!(usable_api_key("your_api_key_here"), None);
        assert_eq!(usable_api_key("your_deepseek_api_key_here\n"), None);
        assert_eq!(usable_api_key(" sk-123 "), Some("sk-123".to_string()));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.upstream.max_tokens, 3000);
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readingtype.toml");
        fs::write(
            &path,
            "[upstream]\nmodel = \"deepseek-reasoner\"\n\n[dictionary]\npath = \"dict.json\"\n",
        )
        .unwrap();
        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.upstream.model, "deepseek-reasoner");
        assert_eq!(config.upstream.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.dictionary.path, Some(PathBuf::from("dict.json")));

        fs::write(&path, "[upstream\n").unwrap();
        assert!(ServiceConfig::load(&path).is_err());
    }
}
