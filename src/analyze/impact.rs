//! Impact scoring: four bounded sub-dimensions plus an oracle-reported total.
//!
//! Every number is clamped on its own; the total is never recomputed from the
//! sub-scores. After scoring, items are ranked by total (stable, descending).

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analyze::ai_adapter::{as_number, as_text, OracleHandle, OracleReply};
use crate::analyze::AnnotatedNews;
use crate::ingest::types::NewsItem;
use crate::pacing::RateLimit;

pub const SUB_SCORE_MAX: u8 = 25;
pub const TOTAL_MAX: u8 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Critical,
    High,
    Medium,
    Low,
    Negligible,
}

impl ImpactLevel {
    /// Bands: >=80 critical, >=60 high, >=40 medium, >=20 low, else negligible.
    pub fn from_total(total: u8) -> Self {
        match total {
            80..=u8::MAX => Self::Critical,
            60..=79 => Self::High,
            40..=59 => Self::Medium,
            20..=39 => Self::Low,
            _ => Self::Negligible,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Negligible => "negligible",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullish" | "positive" | "up" => Self::Bullish,
            "bearish" | "negative" | "down" => Self::Bearish,
            _ => Self::Neutral,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImpactScore {
    pub policy_strength: u8,
    pub expectation_gap: u8,
    pub time_urgency: u8,
    pub crypto_relevance: u8,
    pub total_score: u8,
    pub level: ImpactLevel,
    pub direction: Direction,
    pub reasoning: String,
}

impl ImpactScore {
    /// Neutral mid-range score used when the oracle gives nothing usable.
    pub fn fallback(reasoning: impl Into<String>) -> Self {
        Self {
            policy_strength: 10,
            expectation_gap: 10,
            time_urgency: 10,
            crypto_relevance: 10,
            total_score: 40,
            level: ImpactLevel::Medium,
            direction: Direction::Neutral,
            reasoning: reasoning.into(),
        }
    }

    /// Clamp every field of a parsed reply independently; missing numbers are 0.
    pub fn from_json(v: &Value) -> Self {
        fn bounded(v: Option<&Value>, max: u8) -> u8 {
            as_number(v).unwrap_or(0.0).clamp(0.0, f64::from(max)).round() as u8
        }
        let total_score = bounded(v.get("totalScore"), TOTAL_MAX);
        Self {
            policy_strength: bounded(v.get("policyStrength"), SUB_SCORE_MAX),
            expectation_gap: bounded(v.get("expectationGap"), SUB_SCORE_MAX),
            time_urgency: bounded(v.get("timeUrgency"), SUB_SCORE_MAX),
            crypto_relevance: bounded(v.get("cryptoRelevance"), SUB_SCORE_MAX),
            total_score,
            level: ImpactLevel::from_total(total_score),
            direction: v
                .get("direction")
                .and_then(Value::as_str)
                .map(Direction::parse)
                .unwrap_or(Direction::Neutral),
            reasoning: as_text(v.get("reasoning")).unwrap_or_default(),
        }
    }
}

pub fn build_prompt(item: &NewsItem) -> String {
    format!(
        "Rate the expected impact of this news on the cryptocurrency market.\n\n\
         Title: {}\nDescription: {}\nSource: {}\nPublished: {}\n\n\
         Score four dimensions, each 0-25:\n\
         - policyStrength: how forceful the policy or event is\n\
         - expectationGap: how far it deviates from market expectations\n\
         - timeUrgency: how soon it takes effect\n\
         - cryptoRelevance: how directly it touches crypto assets\n\
         Then give totalScore (0-100), direction (bullish|bearish|neutral) and a short reasoning.\n\n\
         Reply with JSON only, no markdown:\n\
         {{\"policyStrength\": 0, \"expectationGap\": 0, \"timeUrgency\": 0, \"cryptoRelevance\": 0, \
         \"totalScore\": 0, \"direction\": \"neutral\", \"reasoning\": \"...\"}}",
        item.title,
        item.description,
        item.source,
        item.published_at.to_rfc3339()
    )
}

/// Apply the validation/fallback policy to one oracle reply.
pub fn impact_from_reply(reply: OracleReply) -> ImpactScore {
    match reply {
        OracleReply::Parsed(v) => ImpactScore::from_json(&v),
        OracleReply::Malformed(_) => {
            counter!("digest_oracle_fallback_total", "stage" => "impact").increment(1);
            ImpactScore::fallback("impact analysis unavailable: unparseable oracle reply")
        }
        OracleReply::Transport(cause) => {
            counter!("digest_oracle_fallback_total", "stage" => "impact").increment(1);
            ImpactScore::fallback(format!("impact analysis unavailable: {cause}"))
        }
    }
}

pub async fn score(oracle: &OracleHandle, item: &NewsItem) -> ImpactScore {
    let reply = oracle.ask(&build_prompt(item)).await;
    if let OracleReply::Transport(cause) = &reply {
        tracing::warn!(target: "oracle", url = %item.url, %cause, "impact call failed");
    }
    impact_from_reply(reply)
}

/// Stable descending sort by total score.
pub fn rank(mut items: Vec<AnnotatedNews>) -> Vec<AnnotatedNews> {
    items.sort_by_key(|n| std::cmp::Reverse(n.total_score()));
    items
}

/// Score items one at a time, then rank them.
pub async fn score_all(
    oracle: &OracleHandle,
    items: Vec<AnnotatedNews>,
    limit: RateLimit,
) -> Vec<AnnotatedNews> {
    let mut throttle = limit.throttle();
    let mut scored = Vec::with_capacity(items.len());
    for news in items {
        throttle.ready().await;
        let impact = score(oracle, &news.item).await;
        tracing::debug!(
            target: "oracle",
            url = %news.item.url,
            total = impact.total_score,
            level = impact.level.label(),
            "impact scored"
        );
        scored.push(news.with_impact(impact));
    }
    rank(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn level_bands() {
        assert_eq!(ImpactLevel::from_total(100), ImpactLevel::Critical);
        assert_eq!(ImpactLevel::from_total(80), ImpactLevel::Critical);
        assert_eq!(ImpactLevel::from_total(79), ImpactLevel::High);
        assert_eq!(ImpactLevel::from_total(60), ImpactLevel::High);
        assert_eq!(ImpactLevel::from_total(40), ImpactLevel::Medium);
        assert_eq!(ImpactLevel::from_total(20), ImpactLevel::Low);
        assert_eq!(ImpactLevel::from_total(19), ImpactLevel::Negligible);
    }

    #[test]
    fn fields_clamp_independently() {
        let s = ImpactScore::from_json(&json!({
            "policyStrength": -5,
            "expectationGap": 40,
            "timeUrgency": "12",
            "totalScore": 250,
            "direction": "Bearish",
        }));
        assert_eq!(s.policy_strength, 0);
        assert_eq!(s.expectation_gap, 25);
        assert_eq!(s.time_urgency, 12);
        assert_eq!(s.crypto_relevance, 0);
        assert_eq!(s.total_score, 100);
        assert_eq!(s.level, ImpactLevel::Critical);
        assert_eq!(s.direction, Direction::Bearish);
    }

    #[test]
    fn total_is_not_recomputed() {
        let s = ImpactScore::from_json(&json!({
            "policyStrength": 25, "expectationGap": 25, "timeUrgency": 25,
            "cryptoRelevance": 25, "totalScore": 30
        }));
        assert_eq!(s.total_score, 30);
        assert_eq!(s.level, ImpactLevel::Low);
    }

    #[test]
    fn failures_use_mid_range_default() {
        let s = impact_from_reply(OracleReply::Malformed("??".into()));
        assert_eq!(s, ImpactScore::fallback(s.reasoning.clone()));
        assert_eq!(s.total_score, 40);

        let s = impact_from_reply(OracleReply::Transport("connection reset".into()));
        assert_eq!(s.level, ImpactLevel::Medium);
        assert_eq!(s.direction, Direction::Neutral);
        assert!(s.reasoning.contains("connection reset"));
    }
}
