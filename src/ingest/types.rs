// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of collaborator produced a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Rss,
    Web,
}

/// Source descriptor as configured in `[[rss]]` / `[[web]]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSpec {
    pub name: String,
    pub url: String,
    /// CSS selector for web sources; ignored for RSS.
    #[serde(default)]
    pub selector: Option<String>,
}

/// Un-normalized record as handed over by a fetch collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub published: Option<String>,
}

/// Uniform news record; `url` is the identity key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub origin: Origin,
}

/// Fetch one configured source. May fail independently of other sources.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawRecord>>;
    fn name(&self) -> &str;
    fn origin(&self) -> Origin;
    /// Base URL used to resolve relative links.
    fn base_url(&self) -> &str;
}
