//! Run configuration: one TOML file plus credentials from the environment.
//!
//! Lookup: `$DIGEST_CONFIG_PATH`, else `config/digest.toml`. Secret fields set
//! to `"ENV"` are read from `OPENAI_API_KEY`, `TELEGRAM_BOT_TOKEN` and
//! `TELEGRAM_CHAT_ID`. Missing credentials fail the run before any I/O.

pub mod ai;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analyze::keywords::KeywordCategories;
use crate::ingest::types::SourceSpec;
use crate::ledger::DEFAULT_RETENTION_DAYS;
use crate::notify::RetryPolicy;
use crate::pacing::{Pacing, RateLimit};

pub use ai::AiConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
/// `1` sends digests to stdout instead of Telegram.
pub const ENV_DRY_RUN: &str = "DIGEST_DRY_RUN";
/// `mock` swaps the oracle for a fixed-reply one.
pub const ENV_AI_TEST_MODE: &str = "AI_TEST_MODE";

fn env_marker() -> String {
    "ENV".to_string()
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn resolve_secret(value: &mut String, env_name: &str) -> Result<()> {
    if value.trim().eq_ignore_ascii_case("env") {
        *value = std::env::var(env_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("Missing {env_name} env var"))?;
    }
    if value.trim().is_empty() {
        bail!("{env_name} is empty");
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: env_marker(),
            chat_id: env_marker(),
            max_retries: 3,
            retry_backoff_ms: 1_000,
            timeout_secs: 10,
        }
    }
}

impl TelegramConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: PathBuf,
    pub retention_days: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/sent_news.json"),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub relevance_batch_size: usize,
    pub relevance_batch_delay_ms: u64,
    pub impact_delay_ms: u64,
    pub summary_delay_ms: u64,
    pub chunk_delay_ms: u64,
    pub message_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            relevance_batch_size: 5,
            relevance_batch_delay_ms: 1_000,
            impact_delay_ms: 500,
            summary_delay_ms: 500,
            chunk_delay_ms: 500,
            message_delay_ms: 1_500,
        }
    }
}

impl PacingConfig {
    pub fn to_pacing(&self) -> Pacing {
        let ms = Duration::from_millis;
        Pacing {
            relevance: RateLimit::batched(self.relevance_batch_size, ms(self.relevance_batch_delay_ms)),
            impact: RateLimit::sequential(ms(self.impact_delay_ms)),
            summary: RateLimit::sequential(ms(self.summary_delay_ms)),
            chunk: RateLimit::sequential(ms(self.chunk_delay_ms)),
            message: RateLimit::sequential(ms(self.message_delay_ms)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Keep only the top-N items (by impact) per run.
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus textfile written at the end of each run.
    pub textfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Overrides the built-in keyword sets when present.
    #[serde(default)]
    pub keywords: Option<KeywordCategories>,
    #[serde(default)]
    pub rss: Vec<SourceSpec>,
    #[serde(default)]
    pub web: Vec<SourceSpec>,
    #[serde(skip)]
    pub dry_run: bool,
    #[serde(skip)]
    pub mock_ai: bool,
}

impl AppConfig {
    /// Parse without touching the environment.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.resolve()?;
        Ok(cfg)
    }

    pub fn load_default() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Apply env switches, resolve credentials and validate sources.
    pub fn resolve(&mut self) -> Result<()> {
        self.dry_run = env_flag(ENV_DRY_RUN);
        self.mock_ai = std::env::var(ENV_AI_TEST_MODE)
            .map(|v| v == "mock")
            .unwrap_or(false);

        self.ai.resolve(self.mock_ai)?;
        if !self.dry_run {
            resolve_secret(&mut self.telegram.bot_token, "TELEGRAM_BOT_TOKEN")?;
            resolve_secret(&mut self.telegram.chat_id, "TELEGRAM_CHAT_ID")?;
        }

        if self.rss.is_empty() && self.web.is_empty() {
            bail!("no [[rss]] or [[web]] sources configured");
        }
        for src in &self.web {
            let sel = src
                .selector
                .as_deref()
                .filter(|sel| !sel.trim().is_empty())
                .ok_or_else(|| anyhow!("web source `{}` needs a selector", src.name))?;
            scraper::Selector::parse(sel).map_err(|e| {
                anyhow!("web source `{}` has an invalid selector `{sel}`: {e:?}", src.name)
            })?;
        }
        self.keywords = self.keywords.take().map(KeywordCategories::lowercased);
        Ok(())
    }

    pub fn keyword_categories(&self) -> KeywordCategories {
        self.keywords.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[[rss]]
name = "Wire"
url = "https://wire.test/rss"
"#;

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = AppConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(cfg.pacing.relevance_batch_size, 5);
        assert_eq!(cfg.ledger.retention_days, 30);
        assert_eq!(cfg.telegram.bot_token, "ENV");
        assert_eq!(cfg.ai.model, "gpt-4o-mini");
        assert_eq!(cfg.rss[0].name, "Wire");
        assert!(cfg.keywords.is_none());
    }

    #[test]
    fn pacing_maps_to_rate_limits() {
        let p = PacingConfig::default().to_pacing();
        assert_eq!(p.relevance.concurrency, 5);
        assert_eq!(p.impact.concurrency, 1);
        assert_eq!(p.message.interval, Duration::from_millis(1_500));
    }
}
