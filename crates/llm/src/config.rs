use std::env;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/api/chat";
pub const DEFAULT_REVEAL_STEP: usize = 10;
pub const DEFAULT_REVEAL_PAUSE_MS: u64 = 50;

/// How a whole-body reply is replayed as progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealPacing {
    pub step_chars: usize,
    pub pause: Duration,
}

impl RevealPacing {
    pub fn immediate() -> Self {
        Self {
            step_chars: DEFAULT_REVEAL_STEP,
            pause: Duration::ZERO,
        }
    }
}

impl Default for RevealPacing {
    fn default() -> Self {
        Self {
            step_chars: DEFAULT_REVEAL_STEP,
            pause: Duration::from_millis(DEFAULT_REVEAL_PAUSE_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub stream: bool,
    pub reveal: RevealPacing,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            stream: true,
            reveal: RevealPacing::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let endpoint = env::var("READINGTYPE_CHAT_URL").unwrap_or(defaults.endpoint);
        let stream = env::var("READINGTYPE_STREAM")
            .map(|value| parse_bool(&value))
            .unwrap_or(defaults.stream);
        let step_chars = env::var("READINGTYPE_REVEAL_STEP")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REVEAL_STEP);
        let pause_ms = env::var("READINGTYPE_REVEAL_PAUSE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REVEAL_PAUSE_MS);
        Self {
            endpoint,
            stream,
            reveal: RevealPacing {
                step_chars,
                pause: Duration::from_millis(pause_ms),
            },
        }
    }

    /// Applies values from a `[chat]` config table over these settings.
    pub fn merge(mut self, file: &ChatFileConfig) -> Self {
        if let Some(endpoint) = &file.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(stream) = file.stream {
            self.stream = stream;
        }
        if let Some(step) = file.reveal_step_chars {
            self.reveal.step_chars = step;
        }
        if let Some(pause_ms) = file.reveal_pause_ms {
            self.reveal.pause = Duration::from_millis(pause_ms);
        }
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatFileConfig {
    pub endpoint: Option<String>,
    pub stream: Option<bool>,
    pub reveal_step_chars: Option<usize>,
    pub reveal_pause_ms: Option<u64>,
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overrides_only_present_values() {
        let file: ChatFileConfig = toml::from_str(
            r#"
endpoint = "http://relay.local/api/chat"
reveal_pause_ms = 0
"#,
        )
        .unwrap();
        let merged = ClientConfig::default().merge(&file);
        assert_eq!(merged.endpoint, "http://relay.local/api/chat");
        assert!(merged.stream);
        assert_eq!(merged.reveal.step_chars, DEFAULT_REVEAL_STEP);
        assert!(merged.reveal.pause.is_zero());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool(" Yes "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("off"));
    }
}
