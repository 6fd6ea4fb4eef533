// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::{NewsItem, Origin, RawRecord, SourceProvider};
use crate::metrics::ensure_metrics_described;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::future::join_all;
use metrics::counter;
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use url::Url;

/// Hard cap for normalized descriptions, in chars.
const MAX_TEXT_CHARS: usize = 1500;

/// Normalize text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}

/// Resolve `link` against `base` and return a canonical absolute http(s) URL
/// without fragment.
pub fn resolve_url(base: &str, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    let mut url = match Url::parse(link) {
        Ok(u) => u,
        Err(_) => Url::parse(base).ok()?.join(link).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

/// Lenient date parsing; anything unparseable (or missing) becomes `now`.
pub fn parse_published(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(parse_lenient)
        .unwrap_or(now)
}

fn parse_lenient(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return DateTime::from_timestamp(dt.unix_timestamp(), 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Turn one raw record into a `NewsItem`. Records without a usable title or
/// a resolvable URL are dropped.
pub fn normalize_record(
    raw: RawRecord,
    source: &str,
    origin: Origin,
    base_url: &str,
    now: DateTime<Utc>,
) -> Option<NewsItem> {
    let title = normalize_text(raw.title.as_deref().unwrap_or_default());
    let url = raw.link.as_deref().and_then(|l| resolve_url(base_url, l));
    let url = match url {
        Some(u) if !title.is_empty() => u,
        _ => return None,
    };
    Some(NewsItem {
        title,
        description: normalize_text(raw.description.as_deref().unwrap_or_default()),
        url,
        published_at: parse_published(raw.published.as_deref(), now),
        source: source.to_string(),
        origin,
    })
}

async fn fetch_one(provider: &dyn SourceProvider, now: DateTime<Utc>) -> Vec<NewsItem> {
    match provider.fetch_latest().await {
        Ok(raw) => {
            let items: Vec<NewsItem> = raw
                .into_iter()
                .filter_map(|r| {
                    normalize_record(r, provider.name(), provider.origin(), provider.base_url(), now)
                })
                .collect();
            tracing::debug!(target: "ingest", source = provider.name(), count = items.len(), "source fetched");
            items
        }
        Err(e) => {
            tracing::warn!(target: "ingest", error = ?e, source = provider.name(), "provider error");
            counter!("digest_provider_errors_total").increment(1);
            Vec::new()
        }
    }
}

/// Fetch every source of a group concurrently; a failing source contributes nothing.
async fn gather(providers: &[Box<dyn SourceProvider>], now: DateTime<Utc>) -> Vec<NewsItem> {
    join_all(providers.iter().map(|p| fetch_one(p.as_ref(), now)))
        .await
        .into_iter()
        .flatten()
        .collect()
}

/// Keep the first occurrence of every URL.
pub fn dedup_by_url(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|it| seen.insert(it.url.clone()))
        .collect()
}

/// Run RSS and web groups concurrently and merge their results (RSS first).
pub async fn collect(
    rss: &[Box<dyn SourceProvider>],
    web: &[Box<dyn SourceProvider>],
    now: DateTime<Utc>,
) -> Vec<NewsItem> {
    ensure_metrics_described();

    let (mut from_rss, from_web) = tokio::join!(gather(rss, now), gather(web, now));
    tracing::info!(target: "ingest", rss = from_rss.len(), web = from_web.len(), "fetch finished");

    from_rss.extend(from_web);
    let items = dedup_by_url(from_rss);
    counter!("digest_fetched_total").increment(items.len() as u64);
    items
}
