//! Keyword prefilter: cheap, deterministic early-exit stage.
//!
//! Three categories of case-insensitive substring patterns. An item survives
//! when at least [`MIN_CATEGORY_MATCHES`] categories hit on `title + description`.

use serde::{Deserialize, Serialize};

use crate::analyze::AnnotatedNews;
use crate::ingest::types::NewsItem;

pub const MIN_CATEGORY_MATCHES: usize = 2;

const CRYPTO: &[&str] = &[
    "bitcoin",
    "btc",
    "ethereum",
    "crypto",
    "stablecoin",
    "blockchain",
    "digital asset",
    "spot etf",
    "solana",
    "defi",
    "binance",
    "coinbase",
];

const FED: &[&str] = &[
    "federal reserve",
    "fomc",
    "powell",
    "the fed",
    "fed chair",
    "fed's",
    "rate cut",
    "rate hike",
    "interest rate",
    "monetary policy",
    "central bank",
    "quantitative tightening",
    "balance sheet",
];

const MACRO: &[&str] = &[
    "inflation",
    "cpi",
    "pce",
    "gdp",
    "unemployment",
    "jobs report",
    "nonfarm",
    "payrolls",
    "recession",
    "tariff",
    "treasury yield",
    "bond yield",
    "dollar index",
    "liquidity",
];

/// Per-category match record attached to retained items.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordHits {
    pub crypto: bool,
    pub fed: bool,
    #[serde(rename = "macro")]
    pub macro_: bool,
}

impl KeywordHits {
    pub fn count(&self) -> usize {
        [self.crypto, self.fed, self.macro_]
            .iter()
            .filter(|hit| **hit)
            .count()
    }
}

/// The three keyword sets. Patterns are stored lowercased.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KeywordCategories {
    pub crypto: Vec<String>,
    pub fed: Vec<String>,
    #[serde(rename = "macro")]
    pub macro_: Vec<String>,
}

impl Default for KeywordCategories {
    fn default() -> Self {
        fn own(v: &[&str]) -> Vec<String> {
            v.iter().map(|s| s.to_string()).collect()
        }
        Self {
            crypto: own(CRYPTO),
            fed: own(FED),
            macro_: own(MACRO),
        }
    }
}

impl KeywordCategories {
    pub fn new(crypto: Vec<String>, fed: Vec<String>, macro_: Vec<String>) -> Self {
        Self {
            crypto,
            fed,
            macro_,
        }
        .lowercased()
    }

    /// Lowercase and drop blank patterns (config may contain either).
    pub fn lowercased(self) -> Self {
        fn clean(v: Vec<String>) -> Vec<String> {
            v.into_iter()
                .map(|s| s.to_lowercase())
                .filter(|s| !s.trim().is_empty())
                .collect()
        }
        Self {
            crypto: clean(self.crypto),
            fed: clean(self.fed),
            macro_: clean(self.macro_),
        }
    }

    pub fn hits(&self, item: &NewsItem) -> KeywordHits {
        let text = format!("{} {}", item.title, item.description).to_lowercase();
        let any = |set: &[String]| set.iter().any(|kw| text.contains(kw.as_str()));
        KeywordHits {
            crypto: any(&self.crypto),
            fed: any(&self.fed),
            macro_: any(&self.macro_),
        }
    }

    /// Keep items matching at least two categories, annotated with their hits.
    pub fn filter(&self, items: Vec<NewsItem>) -> Vec<AnnotatedNews> {
        items
            .into_iter()
            .filter_map(|item| {
                let hits = self.hits(&item);
                (hits.count() >= MIN_CATEGORY_MATCHES).then(|| AnnotatedNews::new(item, hits))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Origin;
    use chrono::Utc;

    fn item(title: &str, description: &str) -> NewsItem {
        NewsItem {
            title: title.into(),
            description: description.into(),
            url: format!("https://x.test/{}", title.len()),
            published_at: Utc::now(),
            source: "test".into(),
            origin: Origin::Rss,
        }
    }

    #[test]
    fn two_categories_required() {
        let k = KeywordCategories::default();
        let kept = k.filter(vec![
            item("Bitcoin rallies", "Traders cheer"),
            item("Bitcoin rallies as Powell hints", "at a rate cut"),
            item("CPI hotter than expected", "FOMC on hold; BTC slides"),
        ]);
        assert_eq!(kept.len(), 2);
        assert_eq!(
            kept[0].keywords,
            KeywordHits {
                crypto: true,
                fed: true,
                macro_: false
            }
        );
        assert_eq!(kept[1].keywords.count(), 3);
    }

    #[test]
    fn matching_ignores_case_and_uses_description() {
        let k = KeywordCategories::new(vec!["ETH".into()], vec!["FED".into()], vec!["".into()]);
        assert_eq!(k.macro_.len(), 0);
        let h = k.hits(&item("market wrap", "eth up, fed quiet"));
        assert!(h.crypto && h.fed && !h.macro_);
    }
}
