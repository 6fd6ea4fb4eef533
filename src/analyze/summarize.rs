// src/analyze/summarize.rs
//! Per-item digest text: oracle summary + market-impact narrative rendered
//! into a fixed template, with a deterministic fallback when the oracle fails.

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::analyze::ai_adapter::{as_text, OracleHandle, OracleReply};
use crate::analyze::impact::{Direction, ImpactLevel, ImpactScore};
use crate::analyze::AnnotatedNews;
use crate::pacing::RateLimit;

pub const MARKET_IMPACT_PLACEHOLDER: &str = "Market impact analysis unavailable.";

/// Oracle output for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub summary: String,
    pub market_impact: String,
}

pub fn severity_emoji(level: ImpactLevel) -> &'static str {
    match level {
        ImpactLevel::Critical => "🔴",
        ImpactLevel::High => "🟠",
        ImpactLevel::Medium => "🟡",
        ImpactLevel::Low => "🟢",
        ImpactLevel::Negligible => "⚪",
    }
}

pub fn direction_emoji(direction: Direction) -> &'static str {
    match direction {
        Direction::Bullish => "⬆️",
        Direction::Bearish => "⬇️",
        Direction::Neutral => "➡️",
    }
}

pub fn build_prompt(news: &AnnotatedNews, language: &str) -> String {
    let item = &news.item;
    format!(
        "Summarize this news for crypto traders. Write in {language}.\n\n\
         Title: {}\nDescription: {}\nSource: {}\n\n\
         Give 2-4 sentences of core points and 1-2 sentences on the likely market impact \
         (BTC, ETH, risk sentiment).\n\n\
         Reply with JSON only, no markdown:\n\
         {{\"summary\": \"...\", \"market_impact\": \"...\"}}",
        item.title, item.description, item.source
    )
}

fn string_field_from_raw(raw: &str, field: &str) -> Option<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#""(summary|market_impact)"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("field regex")
    });
    re.captures_iter(raw)
        .find(|c| &c[1] == field)
        .map(|c| c[2].replace("\\n", "\n").replace("\\\"", "\""))
        .filter(|s| !s.trim().is_empty())
}

/// `None` means: render the fallback.
pub fn digest_from_reply(reply: OracleReply) -> Option<Digest> {
    let (summary, market_impact) = match reply {
        OracleReply::Parsed(v) => (as_text(v.get("summary")), as_text(v.get("market_impact"))),
        OracleReply::Malformed(raw) => (
            string_field_from_raw(&raw, "summary"),
            string_field_from_raw(&raw, "market_impact"),
        ),
        OracleReply::Transport(_) => (None, None),
    };
    summary.map(|summary| Digest {
        summary,
        market_impact: market_impact.unwrap_or_else(|| MARKET_IMPACT_PLACEHOLDER.to_string()),
    })
}

fn render_impact(out: &mut String, impact: &ImpactScore) {
    out.push_str(&format!(
        "📊 Impact score: {}/100 {} {}\n",
        impact.total_score,
        severity_emoji(impact.level),
        impact.level.label().to_uppercase()
    ));
    out.push_str(&format!("• Policy strength: {}/25\n", impact.policy_strength));
    out.push_str(&format!("• Expectation gap: {}/25\n", impact.expectation_gap));
    out.push_str(&format!("• Time urgency: {}/25\n", impact.time_urgency));
    out.push_str(&format!("• Crypto relevance: {}/25\n", impact.crypto_relevance));
    out.push_str(&format!(
        "Direction: {} {}\n\n",
        direction_emoji(impact.direction),
        impact.direction.label()
    ));
}

/// Fixed digest template. The impact block appears only for scored items.
pub fn render(news: &AnnotatedNews, digest: Option<&Digest>) -> String {
    let item = &news.item;
    let mut out = String::new();
    out.push_str(&format!("📰 {}\n", item.title));
    out.push_str(&format!(
        "🕐 {}\n\n",
        item.published_at.format("%Y-%m-%d %H:%M UTC")
    ));
    if let Some(impact) = &news.impact {
        render_impact(&mut out, impact);
    }

    let (core, market) = match digest {
        Some(d) => (d.summary.as_str(), d.market_impact.as_str()),
        None if item.description.is_empty() => (item.title.as_str(), MARKET_IMPACT_PLACEHOLDER),
        None => (item.description.as_str(), MARKET_IMPACT_PLACEHOLDER),
    };
    out.push_str(&format!("📌 Core points:\n{core}\n\n"));
    out.push_str(&format!("💹 Market impact:\n{market}\n\n"));
    out.push_str(&format!("🔗 {}: {}", item.source, item.url));
    out
}

pub async fn summarize(oracle: &OracleHandle, news: &AnnotatedNews, language: &str) -> String {
    let reply = oracle.ask(&build_prompt(news, language)).await;
    if let OracleReply::Transport(cause) = &reply {
        tracing::warn!(target: "oracle", url = %news.item.url, %cause, "summary call failed");
    }
    let digest = digest_from_reply(reply);
    if digest.is_none() {
        counter!("digest_oracle_fallback_total", "stage" => "summary").increment(1);
    }
    render(news, digest.as_ref())
}

/// Summarize items one at a time, keeping each text next to its item.
pub async fn summarize_all(
    oracle: &OracleHandle,
    items: Vec<AnnotatedNews>,
    limit: RateLimit,
    language: &str,
) -> Vec<(AnnotatedNews, String)> {
    let mut throttle = limit.throttle();
    let mut out = Vec::with_capacity(items.len());
    for news in items {
        throttle.ready().await;
        let text = summarize(oracle, &news, language).await;
        out.push((news, text));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::keywords::KeywordHits;
    use crate::ingest::types::{NewsItem, Origin};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn news() -> AnnotatedNews {
        AnnotatedNews::new(
            NewsItem {
                title: "Fed cuts rates by 50bp".into(),
                description: "Bitcoin jumps after the decision.".into(),
                url: "https://news.test/fed".into(),
                published_at: Utc.with_ymd_and_hms(2025, 9, 17, 18, 5, 0).unwrap(),
                source: "Wire".into(),
                origin: Origin::Rss,
            },
            KeywordHits::default(),
        )
    }

    #[test]
    fn template_with_impact_block() {
        let mut impact = ImpactScore::fallback("x");
        impact.total_score = 85;
        impact.level = ImpactLevel::Critical;
        impact.direction = Direction::Bullish;
        let n = news().with_impact(impact);
        let d = Digest {
            summary: "Big cut.".into(),
            market_impact: "Risk-on.".into(),
        };
        let text = render(&n, Some(&d));
        assert!(text.starts_with("📰 Fed cuts rates by 50bp\n🕐 2025-09-17 18:05 UTC\n"));
        assert!(text.contains("📊 Impact score: 85/100 🔴 CRITICAL"));
        assert!(text.contains("• Policy strength: 10/25"));
        assert!(text.contains("Direction: ⬆️ bullish"));
        assert!(text.contains("📌 Core points:\nBig cut."));
        assert!(text.ends_with("🔗 Wire: https://news.test/fed"));
    }

    #[test]
    fn fallback_uses_description_and_keeps_no_impact_block() {
        let text = render(&news(), None);
        assert!(!text.contains("Impact score"));
        assert!(text.contains("📌 Core points:\nBitcoin jumps after the decision."));
        assert!(text.contains(MARKET_IMPACT_PLACEHOLDER));
        assert!(text.contains("https://news.test/fed"));
    }

    #[test]
    fn fallback_keeps_impact_block_and_link() {
        let mut impact = ImpactScore::fallback("x");
        impact.total_score = 65;
        impact.level = ImpactLevel::High;
        let text = render(&news().with_impact(impact), None);
        assert!(text.contains("📊 Impact score: 65/100 🟠 HIGH"));
        assert!(text.contains("Direction: ➡️ neutral"));
        assert!(text.contains("📌 Core points:\nBitcoin jumps after the decision."));
        assert!(text.contains(&format!("💹 Market impact:\n{MARKET_IMPACT_PLACEHOLDER}")));
        assert!(text.ends_with("🔗 Wire: https://news.test/fed"));
    }

    #[test]
    fn reply_parsing_policy() {
        let d = digest_from_reply(OracleReply::Parsed(json!({"summary": "S"}))).unwrap();
        assert_eq!(d.market_impact, MARKET_IMPACT_PLACEHOLDER);

        let raw = r#"{"summary": "Line one\nline \"two\"", "market_impact": "Up"   (truncated"#;
        let d = digest_from_reply(OracleReply::Malformed(raw.into())).unwrap();
        assert_eq!(d.summary, "Line one\nline \"two\"");
        assert_eq!(d.market_impact, "Up");

        assert!(digest_from_reply(OracleReply::Transport("down".into())).is_none());
        assert!(digest_from_reply(OracleReply::Parsed(json!({"summary": ""}))).is_none());
    }
}
