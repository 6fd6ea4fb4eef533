//! Persisted record of delivered news URLs with age-based eviction.
//!
//! Read once at run start, written once after delivery. A missing or corrupt
//! file loads as an empty ledger; a failed write is an error.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::NewsItem;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DedupRecord {
    pub url: String,
    pub title: String,
    pub sent_at: DateTime<Utc>,
}

/// On-disk document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerFile {
    #[serde(default)]
    records: Vec<DedupRecord>,
    last_updated: Option<DateTime<Utc>>,
}

/// Ledger contents after `load`/`commit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub records: Vec<DedupRecord>,
    pub known_urls: HashSet<String>,
}

impl LedgerSnapshot {
    fn from_records(records: Vec<DedupRecord>) -> Self {
        let known_urls = records.iter().map(|r| r.url.clone()).collect();
        Self {
            records,
            known_urls,
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.known_urls.contains(url)
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    retention: Duration,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retention: Duration::days(DEFAULT_RETENTION_DAYS),
        }
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention = Duration::days(days.max(0));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn retain_recent(&self, records: Vec<DedupRecord>, now: DateTime<Utc>) -> Vec<DedupRecord> {
        let horizon = now - self.retention;
        records.into_iter().filter(|r| r.sent_at >= horizon).collect()
    }

    /// Load and evict expired records. Never fails: a missing file is created
    /// empty (best effort) and an unreadable one is treated as empty.
    pub fn load(&self, now: DateTime<Utc>) -> LedgerSnapshot {
        let records = match fs::read_to_string(&self.path) {
            Ok(s) => match serde_json::from_str::<LedgerFile>(&s) {
                Ok(file) => file.records,
                Err(e) => {
                    tracing::warn!(target: "ledger", error = %e, path = %self.path.display(), "corrupt ledger, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(target: "ledger", path = %self.path.display(), "no ledger yet, creating");
                if let Err(e) = self.write(&[], now) {
                    tracing::warn!(target: "ledger", error = %e, "could not create empty ledger");
                }
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(target: "ledger", error = %e, path = %self.path.display(), "unreadable ledger, starting empty");
                Vec::new()
            }
        };
        let before = records.len();
        let records = self.retain_recent(records, now);
        tracing::debug!(target: "ledger", kept = records.len(), expired = before - records.len(), "ledger loaded");
        LedgerSnapshot::from_records(records)
    }

    /// Drop items whose URL was already delivered.
    pub fn filter_unsent<T, F>(items: Vec<T>, known: &LedgerSnapshot, url_of: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        items
            .into_iter()
            .filter(|it| !known.contains(url_of(it)))
            .collect()
    }

    /// Record delivered items, evict expired records from the union, persist.
    /// Call only after delivery of `delivered` was confirmed.
    pub fn commit(
        &self,
        delivered: &[NewsItem],
        existing: Vec<DedupRecord>,
        now: DateTime<Utc>,
    ) -> Result<LedgerSnapshot> {
        let fresh: HashSet<&str> = delivered.iter().map(|it| it.url.as_str()).collect();
        let mut records: Vec<DedupRecord> = existing
            .into_iter()
            .filter(|r| !fresh.contains(r.url.as_str()))
            .collect();
        records.extend(delivered.iter().map(|it| DedupRecord {
            url: it.url.clone(),
            title: it.title.clone(),
            sent_at: now,
        }));
        let records = self.retain_recent(records, now);

        self.write(&records, now)
            .with_context(|| format!("persisting ledger to {}", self.path.display()))?;
        tracing::info!(target: "ledger", added = delivered.len(), total = records.len(), "ledger committed");
        Ok(LedgerSnapshot::from_records(records))
    }

    /// Write-temp-then-rename.
    fn write(&self, records: &[DedupRecord], now: DateTime<Utc>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let doc = LedgerFile {
            records: records.to_vec(),
            last_updated: Some(now),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
