// Shared test doubles: scripted oracle, recording notifier, static sources.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use crypto_news_digest::ai_adapter::{Oracle, OracleHandle};
use crypto_news_digest::notify::Notifier;
use crypto_news_digest::{Origin, RawRecord, SourceProvider};

type Script = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Oracle answering through a closure over the prompt.
pub struct ScriptedOracle {
    script: Script,
    pub calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(f: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(f),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(prompt)
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

pub fn handle(oracle: Arc<ScriptedOracle>) -> OracleHandle {
    OracleHandle::new(oracle, Duration::from_secs(5))
}

/// `Title: ...` line of a stage prompt.
pub fn title_of(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|l| l.strip_prefix("Title: "))
        .unwrap_or_default()
        .to_string()
}

pub fn is_relevance_prompt(prompt: &str) -> bool {
    prompt.starts_with("Decide whether")
}

pub fn is_impact_prompt(prompt: &str) -> bool {
    prompt.starts_with("Rate the expected impact")
}

pub fn is_summary_prompt(prompt: &str) -> bool {
    prompt.starts_with("Summarize this news")
}

/// Records every text; fails texts matching `fail_when`.
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
    fail_when: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Self::failing_when(|_| false)
    }

    pub fn failing_when(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_when: Box::new(f),
        })
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, text: &str) -> Result<()> {
        if (self.fail_when)(text) {
            return Err(anyhow!("HTTP 500 from chat API"));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Source returning fixed records (or failing).
pub struct StaticProvider {
    pub name: String,
    pub origin: Origin,
    pub base: String,
    pub records: Vec<RawRecord>,
    pub fail: bool,
}

impl StaticProvider {
    pub fn rss(name: &str, records: Vec<RawRecord>) -> Box<dyn SourceProvider> {
        Box::new(Self {
            name: name.to_string(),
            origin: Origin::Rss,
            base: "https://wire.example.com/".to_string(),
            records,
            fail: false,
        })
    }

    pub fn failing(name: &str, origin: Origin) -> Box<dyn SourceProvider> {
        Box::new(Self {
            name: name.to_string(),
            origin,
            base: "https://down.example.com/".to_string(),
            records: Vec::new(),
            fail: true,
        })
    }
}

#[async_trait::async_trait]
impl SourceProvider for StaticProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawRecord>> {
        if self.fail {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.records.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn base_url(&self) -> &str {
        &self.base
    }
}

pub fn raw(title: &str, description: &str, link: &str) -> RawRecord {
    RawRecord {
        title: Some(title.to_string()),
        description: Some(description.to_string()),
        link: Some(link.to_string()),
        published: Some("Mon, 03 Mar 2025 09:00:00 +0000".to_string()),
    }
}
