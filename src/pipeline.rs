//! # Pipeline orchestrator
//! fetch → keyword prefilter → AI relevance → impact scoring (ranked) →
//! ledger dedup → summaries → chunked delivery → ledger commit.
//!
//! An empty stage ends the run early with a notice (not an error). The ledger
//! only ever records items whose messages were delivered.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};

use crate::analyze::ai_adapter::OracleHandle;
use crate::analyze::keywords::KeywordCategories;
use crate::analyze::{impact, relevance, summarize, AnnotatedNews};
use crate::ingest::types::{NewsItem, SourceProvider};
use crate::ledger::Ledger;
use crate::metrics::ensure_metrics_described;
use crate::notify::chunker::{plan_messages, MESSAGE_LIMIT};
use crate::notify::{deliver_message, send_with_retry, Notifier, RetryPolicy};
use crate::pacing::Pacing;

/// Stage at which a run ran out of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Keywords,
    Relevance,
    Dedup,
}

impl Stage {
    pub fn notice(&self) -> &'static str {
        match self {
            Stage::Fetch => "ℹ️ Crypto news digest: no news could be fetched from any source.",
            Stage::Keywords => "ℹ️ Crypto news digest: no news matched the keyword filter.",
            Stage::Relevance => "ℹ️ Crypto news digest: no news passed the AI relevance check.",
            Stage::Dedup => "ℹ️ Crypto news digest: no new news since the last digest.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Delivered,
    ShortCircuit(Stage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub fetched: usize,
    pub keyword_kept: usize,
    pub ai_kept: usize,
    pub unsent: usize,
    pub delivered: usize,
    /// URLs in delivery order.
    pub delivered_urls: Vec<String>,
    pub outcome: RunOutcome,
}

impl RunReport {
    fn empty() -> Self {
        Self {
            fetched: 0,
            keyword_kept: 0,
            ai_kept: 0,
            unsent: 0,
            delivered: 0,
            delivered_urls: Vec::new(),
            outcome: RunOutcome::Delivered,
        }
    }
}

pub struct Pipeline {
    rss: Vec<Box<dyn SourceProvider>>,
    web: Vec<Box<dyn SourceProvider>>,
    oracle: OracleHandle,
    notifier: Arc<dyn Notifier>,
    ledger: Ledger,
    keywords: KeywordCategories,
    pacing: Pacing,
    retry: RetryPolicy,
    language: String,
    max_items: Option<usize>,
    message_limit: usize,
}

impl Pipeline {
    pub fn new(oracle: OracleHandle, notifier: Arc<dyn Notifier>, ledger: Ledger) -> Self {
        Self {
            rss: Vec::new(),
            web: Vec::new(),
            oracle,
            notifier,
            ledger,
            keywords: KeywordCategories::default(),
            pacing: Pacing::default(),
            retry: RetryPolicy::default(),
            language: "English".to_string(),
            max_items: None,
            message_limit: MESSAGE_LIMIT,
        }
    }

    pub fn with_rss(mut self, providers: Vec<Box<dyn SourceProvider>>) -> Self {
        self.rss = providers;
        self
    }

    pub fn with_web(mut self, providers: Vec<Box<dyn SourceProvider>>) -> Self {
        self.web = providers;
        self
    }

    pub fn with_keywords(mut self, keywords: KeywordCategories) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn with_max_items(mut self, max_items: Option<usize>) -> Self {
        self.max_items = max_items.filter(|n| *n > 0);
        self
    }

    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.message_limit = limit.clamp(1, MESSAGE_LIMIT);
        self
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub async fn run(&self) -> Result<RunReport> {
        self.run_at(Utc::now()).await
    }

    async fn short_circuit(&self, mut report: RunReport, stage: Stage) -> Result<RunReport> {
        tracing::info!(target: "pipeline", ?stage, "nothing left to deliver, stopping early");
        if let Err(e) = send_with_retry(self.notifier.as_ref(), stage.notice(), self.retry).await {
            tracing::warn!(target: "pipeline", error = %e, "could not send short-circuit notice");
        }
        report.outcome = RunOutcome::ShortCircuit(stage);
        Ok(report)
    }

    /// One full run with `now` as the run timestamp.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        ensure_metrics_described();
        gauge!("digest_last_run_ts").set(now.timestamp() as f64);
        let mut report = RunReport::empty();

        let sent = self.ledger.load(now);

        let items = crate::ingest::collect(&self.rss, &self.web, now).await;
        report.fetched = items.len();
        if items.is_empty() {
            return self.short_circuit(report, Stage::Fetch).await;
        }

        let screened = self.keywords.filter(items);
        report.keyword_kept = screened.len();
        counter!("digest_keyword_kept_total").increment(screened.len() as u64);
        tracing::info!(target: "pipeline", fetched = report.fetched, kept = screened.len(), "keyword filter");
        if screened.is_empty() {
            return self.short_circuit(report, Stage::Keywords).await;
        }

        let relevant =
            relevance::filter_by_ai(&self.oracle, screened, self.pacing.relevance).await;
        report.ai_kept = relevant.len();
        counter!("digest_ai_kept_total").increment(relevant.len() as u64);
        tracing::info!(target: "pipeline", kept = relevant.len(), "ai relevance filter");
        if relevant.is_empty() {
            return self.short_circuit(report, Stage::Relevance).await;
        }

        let ranked = impact::score_all(&self.oracle, relevant, self.pacing.impact).await;

        let mut unsent = Ledger::filter_unsent(ranked, &sent, |n: &AnnotatedNews| {
            n.item.url.as_str()
        });
        report.unsent = unsent.len();
        tracing::info!(target: "pipeline", unsent = unsent.len(), "ledger dedup");
        if unsent.is_empty() {
            return self.short_circuit(report, Stage::Dedup).await;
        }
        if let Some(max) = self.max_items {
            unsent.truncate(max);
        }

        let summarized =
            summarize::summarize_all(&self.oracle, unsent, self.pacing.summary, &self.language)
                .await;

        let (delivered, failed) = self.deliver(&summarized, now).await;

        if !delivered.is_empty() {
            self.ledger.commit(&delivered, sent.records, now)?;
        }
        counter!("digest_delivered_total").increment(delivered.len() as u64);
        report.delivered = delivered.len();
        report.delivered_urls = delivered.iter().map(|it| it.url.clone()).collect();

        if failed > 0 {
            counter!("digest_delivery_failures_total").increment(failed as u64);
            return Err(anyhow!(
                "{failed} digest message(s) could not be delivered; {} item(s) were recorded",
                delivered.len()
            ));
        }
        tracing::info!(target: "pipeline", delivered = report.delivered, "digest delivered");
        Ok(report)
    }

    /// Send header + planned messages. Returns the delivered items (in
    /// delivery order) and the number of failed messages.
    async fn deliver(
        &self,
        summarized: &[(AnnotatedNews, String)],
        now: DateTime<Utc>,
    ) -> (Vec<NewsItem>, usize) {
        let header = format!(
            "📰 Crypto news digest — {} item(s) ({})",
            summarized.len(),
            now.format("%Y-%m-%d %H:%M UTC")
        );
        if let Err(e) = send_with_retry(self.notifier.as_ref(), &header, self.retry).await {
            tracing::warn!(target: "notify", error = %e, "digest header not delivered");
        }

        let texts: Vec<String> = summarized.iter().map(|(_, text)| text.clone()).collect();
        let plan = plan_messages(&texts, self.message_limit);

        let mut message_throttle = self.pacing.message.throttle();
        let mut chunk_throttle = self.pacing.chunk.throttle();
        let mut delivered = Vec::new();
        let mut failed = 0usize;
        for message in &plan {
            message_throttle.ready().await;
            match deliver_message(self.notifier.as_ref(), message, self.retry, &mut chunk_throttle)
                .await
            {
                Ok(()) => delivered.extend(message.covers.iter().map(|&i| summarized[i].0.item.clone())),
                Err(e) => {
                    failed += 1;
                    tracing::error!(target: "notify", error = %format!("{e:#}"), covers = ?message.covers, "message not delivered");
                }
            }
        }
        (delivered, failed)
    }
}
