//! Oracle adapter: provider abstraction, tagged JSON replies, per-call timeout.
//!
//! Every AI-calling stage goes through [`OracleHandle::ask`], which never fails:
//! the caller gets an [`OracleReply`] and applies its own fallback policy.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Text-completion collaborator: prompt in, free text out.
#[async_trait::async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynOracle = Arc<dyn Oracle>;

/// Outcome of one oracle call, before any stage-specific fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleReply {
    /// First balanced JSON object found in the response.
    Parsed(Value),
    /// The call succeeded but no JSON object could be extracted.
    Malformed(String),
    /// Network, auth, rate-limit or timeout failure.
    Transport(String),
}

/// Explicitly constructed client handed to each stage.
#[derive(Clone)]
pub struct OracleHandle {
    inner: DynOracle,
    timeout: Duration,
}

impl OracleHandle {
    pub fn new(inner: DynOracle, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    pub async fn ask(&self, prompt: &str) -> OracleReply {
        match tokio::time::timeout(self.timeout, self.inner.complete(prompt)).await {
            Err(_) => OracleReply::Transport(format!(
                "oracle timed out after {}s",
                self.timeout.as_secs_f32()
            )),
            Ok(Err(e)) => OracleReply::Transport(format!("{e:#}")),
            Ok(Ok(text)) => match extract_json_object(&text) {
                Some(v) => OracleReply::Parsed(v),
                None => OracleReply::Malformed(text),
            },
        }
    }
}

/// Find the first balanced `{...}` that parses as a JSON object.
/// Tolerates prose around it and markdown fences.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(rel) = text[start..].find('{') {
        let open = start + rel;
        if let Some(close) = matching_brace(bytes, open) {
            if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(&text[open..=close]) {
                return Some(v);
            }
        }
        start = open + 1;
    }
    None
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_str {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_str = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Lenient numeric coercion: JSON numbers and numeric strings.
pub fn as_number(v: Option<&Value>) -> Option<f64> {
    let n = match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|x| x.is_finite())
}

/// Lenient boolean coercion: JSON bools and "true"/"false" strings.
pub fn as_bool(v: Option<&Value>) -> Option<bool> {
    match v? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn as_text(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ------------------------------------------------------------
// Concrete oracles
// ------------------------------------------------------------

/// OpenAI-compatible chat completions oracle.
pub struct OpenAiOracle {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiOracle {
    pub fn new(api_key: String, model: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("crypto-news-digest/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building oracle http client")?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait::async_trait]
impl Oracle for OpenAiOracle {
    async fn complete(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let sys = "You are a financial news analyst for crypto markets. Always answer with a single JSON object and nothing else.";
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: sys,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.2,
            max_tokens: 800,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("oracle request")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("oracle HTTP {status}"));
        }
        let body: Resp = resp.json().await.context("oracle response body")?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("oracle returned no choices"))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Returns the same text for every prompt; used with `AI_TEST_MODE=mock`.
#[derive(Clone)]
pub struct FixedOracle {
    pub reply: String,
}

impl FixedOracle {
    pub fn neutral() -> Self {
        Self {
            reply: r#"{"score": 7, "reason": "mock", "relevant": true,
                "policyStrength": 10, "expectationGap": 10, "timeUrgency": 10, "cryptoRelevance": 10,
                "totalScore": 40, "direction": "neutral", "reasoning": "mock",
                "summary": "Mock summary.", "market_impact": "Mock market impact."}"#
                .to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Oracle for FixedOracle {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(self.reply.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_fenced_prose() {
        let raw = "Sure!\n```json\n{\"score\": 8, \"reason\": \"a {brace} in text\"}\n```\nDone.";
        let v = extract_json_object(raw).unwrap();
        assert_eq!(v["score"], 8);
        assert_eq!(v["reason"], "a {brace} in text");
    }

    #[test]
    fn skips_unbalanced_prefix_and_returns_none_for_truncated() {
        assert!(extract_json_object("{\"score\": 8, \"reason\": \"cut off").is_none());
        assert!(extract_json_object("no json at all").is_none());
        let v = extract_json_object("{not json} then {\"ok\": true}").unwrap();
        assert_eq!(v["ok"], true);
    }

    #[test]
    fn coercions_are_lenient() {
        let v: Value = serde_json::json!({"a": "7.5", "b": 3, "c": "yes", "d": [1]});
        assert_eq!(as_number(v.get("a")), Some(7.5));
        assert_eq!(as_number(v.get("b")), Some(3.0));
        assert_eq!(as_number(v.get("d")), None);
        assert_eq!(as_bool(v.get("c")), Some(true));
        assert_eq!(as_bool(v.get("missing")), None);
    }

    struct Slow;

    #[async_trait::async_trait]
    impl Oracle for Slow {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("{}".into())
        }
        fn provider_name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn timeout_is_a_transport_failure() {
        let h = OracleHandle::new(Arc::new(Slow), Duration::from_millis(20));
        assert!(matches!(h.ask("x").await, OracleReply::Transport(_)));
    }
}
