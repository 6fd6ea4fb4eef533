// src/analyze/relevance.rs
//! AI relevance gate. Biased towards keeping items: a dropped relevant
//! story costs more than a noisy one.

use futures::future::join_all;
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analyze::ai_adapter::{as_bool, as_number, as_text, OracleHandle, OracleReply};
use crate::analyze::AnnotatedNews;
use crate::ingest::types::NewsItem;
use crate::pacing::RateLimit;

/// Score assumed when the oracle gives nothing usable.
pub const FALLBACK_SCORE: f32 = 5.0;
/// Scores at or above this count as relevant when the verdict must be inferred.
pub const RELEVANT_FROM: f32 = 6.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelevanceVerdict {
    /// 0..=10
    pub score: f32,
    pub reason: String,
    pub relevant: bool,
}

pub fn build_prompt(item: &NewsItem) -> String {
    format!(
        "Decide whether the following news is relevant for cryptocurrency market participants \
         (prices, liquidity, regulation, monetary policy, macro data that moves risk assets).\n\n\
         Title: {}\nDescription: {}\nSource: {}\n\n\
         Reply with JSON only, no markdown:\n\
         {{\"score\": <integer 0-10>, \"reason\": \"<one sentence>\", \"relevant\": <true|false>}}",
        item.title, item.description, item.source
    )
}

fn score_from_raw(raw: &str) -> Option<f32> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?i)"?score"?\s*[:=]\s*"?(-?\d+(?:\.\d+)?)"#).expect("score regex")
    });
    re.captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok())
}

fn inferred(raw: &str) -> RelevanceVerdict {
    let score = score_from_raw(raw)
        .unwrap_or(FALLBACK_SCORE)
        .clamp(0.0, 10.0);
    RelevanceVerdict {
        score,
        reason: "unstructured oracle reply".to_string(),
        relevant: score >= RELEVANT_FROM,
    }
}

/// Apply the fallback policy to one oracle reply.
pub fn verdict_from_reply(reply: OracleReply) -> RelevanceVerdict {
    match reply {
        OracleReply::Parsed(v) => {
            let score = as_number(v.get("score"));
            let relevant = as_bool(v.get("relevant"));
            match (score, relevant) {
                (Some(score), Some(relevant)) => RelevanceVerdict {
                    score: (score as f32).clamp(0.0, 10.0),
                    reason: as_text(v.get("reason")).unwrap_or_default(),
                    relevant,
                },
                (Some(score), None) => {
                    counter!("digest_oracle_fallback_total", "stage" => "relevance").increment(1);
                    let score = (score as f32).clamp(0.0, 10.0);
                    RelevanceVerdict {
                        score,
                        reason: as_text(v.get("reason"))
                            .unwrap_or_else(|| "relevance inferred from score".to_string()),
                        relevant: score >= RELEVANT_FROM,
                    }
                }
                // Only the score is worth digging out of the raw text.
                (None, _) => {
                    counter!("digest_oracle_fallback_total", "stage" => "relevance").increment(1);
                    inferred(&v.to_string())
                }
            }
        }
        OracleReply::Malformed(raw) => {
            counter!("digest_oracle_fallback_total", "stage" => "relevance").increment(1);
            tracing::debug!(target: "oracle", len = raw.len(), "relevance reply without JSON");
            inferred(&raw)
        }
        OracleReply::Transport(cause) => {
            counter!("digest_oracle_fallback_total", "stage" => "relevance").increment(1);
            RelevanceVerdict {
                score: FALLBACK_SCORE,
                reason: format!("oracle unavailable, kept by default: {cause}"),
                relevant: true,
            }
        }
    }
}

pub async fn judge(oracle: &OracleHandle, item: &NewsItem) -> RelevanceVerdict {
    let reply = oracle.ask(&build_prompt(item)).await;
    if let OracleReply::Transport(cause) = &reply {
        tracing::warn!(target: "oracle", url = %item.url, %cause, "relevance call failed");
    }
    verdict_from_reply(reply)
}

/// Judge items in concurrent batches and keep the relevant ones.
/// Each item travels with its own future, so a failed call can never be
/// attributed to a neighbour.
pub async fn filter_by_ai(
    oracle: &OracleHandle,
    items: Vec<AnnotatedNews>,
    limit: RateLimit,
) -> Vec<AnnotatedNews> {
    let mut throttle = limit.throttle();
    let mut kept = Vec::with_capacity(items.len());
    let mut pending = items.into_iter().peekable();

    while pending.peek().is_some() {
        let batch: Vec<AnnotatedNews> = pending.by_ref().take(limit.concurrency).collect();
        throttle.ready().await;
        let judged = join_all(batch.into_iter().map(|news| async move {
            let verdict = judge(oracle, &news.item).await;
            news.with_relevance(verdict)
        }))
        .await;

        for news in judged {
            let keep = news.relevance.as_ref().is_some_and(|r| r.relevant);
            tracing::debug!(target: "oracle", url = %news.item.url, keep, "relevance verdict");
            if keep {
                kept.push(news);
            }
        }
    }
    kept
}
