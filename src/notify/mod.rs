pub mod chunker;
pub mod telegram;

use anyhow::Result;
use std::time::Duration;

use crate::notify::chunker::OutboundMessage;
use crate::pacing::Throttle;

/// Delivery collaborator: one text chunk to one channel.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fixed attempt count with linear backoff (`backoff * attempt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

pub async fn send_with_retry(
    notifier: &dyn Notifier,
    text: &str,
    policy: RetryPolicy,
) -> Result<()> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match notifier.send_text(text).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    target: "notify",
                    error = %e,
                    attempt,
                    notifier = notifier.name(),
                    "send failed, retrying"
                );
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            Err(e) => {
                return Err(e.context(format!(
                    "{} delivery failed after {attempt} attempts",
                    notifier.name()
                )))
            }
        }
    }
}

/// Send every chunk of one message in order; stops at the first chunk that
/// still fails after retries.
pub async fn deliver_message(
    notifier: &dyn Notifier,
    message: &OutboundMessage,
    policy: RetryPolicy,
    chunk_throttle: &mut Throttle,
) -> Result<()> {
    for chunk in &message.chunks {
        chunk_throttle.ready().await;
        send_with_retry(notifier, chunk, policy).await?;
    }
    Ok(())
}

/// Prints messages instead of sending them (dry runs).
pub struct StdoutNotifier;

#[async_trait::async_trait]
impl Notifier for StdoutNotifier {
    async fn send_text(&self, text: &str) -> Result<()> {
        println!("{text}\n");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        fail_first: u32,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl Notifier for Flaky {
        async fn send_text(&self, _text: &str) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                Err(anyhow!("HTTP 502"))
            } else {
                Ok(())
            }
        }
        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let n = Flaky {
            fail_first: 2,
            calls: AtomicU32::new(0),
        };
        send_with_retry(&n, "hi", RetryPolicy::default()).await.unwrap();
        assert_eq!(n.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let n = Flaky {
            fail_first: 10,
            calls: AtomicU32::new(0),
        };
        let err = send_with_retry(&n, "hi", RetryPolicy::default())
            .await
            .unwrap_err();
        assert_eq!(n.calls.load(Ordering::SeqCst), 3);
        assert!(format!("{err:#}").contains("after 3 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_is_linear() {
        let n = Flaky {
            fail_first: 2,
            calls: AtomicU32::new(0),
        };
        let t0 = tokio::time::Instant::now();
        send_with_retry(&n, "hi", RetryPolicy::default()).await.unwrap();
        // 1s after the first failure, 2s after the second
        assert_eq!(t0.elapsed().as_secs(), 3);
    }
}
