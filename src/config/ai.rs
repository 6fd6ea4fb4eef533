// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_language() -> String {
    "English".to_string()
}
fn env_marker() -> String {
    "ENV".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Only "openai" (any OpenAI-compatible endpoint) is supported.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "env_marker")]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-call timeout; expiry counts as a transport failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Language of the generated summaries.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: env_marker(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            language: default_language(),
        }
    }
}

impl AiConfig {
    /// Normalize provider and resolve the key. `mock` skips the key entirely.
    pub fn resolve(&mut self, mock: bool) -> anyhow::Result<()> {
        self.provider = self.provider.trim().to_lowercase();
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        if mock {
            return Ok(());
        }
        if self.provider != "openai" {
            anyhow::bail!("Unsupported provider in config: {}", self.provider);
        }
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?;
        }
        Ok(())
    }
}
