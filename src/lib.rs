// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod bootstrap;
pub mod config;
pub mod ledger;
pub mod metrics;
pub mod pacing;
pub mod pipeline;

// Source collaborators + normalization
pub mod ingest;

// Keyword / AI stages (relevance, impact, summaries)
pub mod analyze;

// Delivery: chunking, retry, Telegram
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::analyze::ai_adapter;
pub use crate::ingest::types::{NewsItem, Origin, RawRecord, SourceProvider, SourceSpec};
pub use crate::notify::chunker;
pub use crate::pipeline::{Pipeline, RunOutcome, RunReport, Stage};

use crate::notify::chunker::{split, MESSAGE_LIMIT};

/// Text of the single best-effort notice sent when a run aborts.
pub fn failure_notice(err: &anyhow::Error) -> String {
    let text = format!("❌ Crypto news digest run failed:\n{err:#}");
    split(&text, MESSAGE_LIMIT)
        .into_iter()
        .next()
        .unwrap_or(text)
}
