//! Self-imposed rate limits for upstream collaborators.
//!
//! A [`RateLimit`] is a concurrency bound plus a minimum spacing between
//! call starts; [`Throttle`] enforces the spacing.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Calls allowed in flight at once (always >= 1).
    pub concurrency: usize,
    /// Minimum time between the start of two consecutive calls (or batches).
    pub interval: Duration,
}

impl RateLimit {
    pub fn sequential(interval: Duration) -> Self {
        Self {
            concurrency: 1,
            interval,
        }
    }

    pub fn batched(concurrency: usize, interval: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            interval,
        }
    }

    pub fn throttle(&self) -> Throttle {
        Throttle::new(self.interval)
    }
}

/// Spaces out call starts by at least `interval`. The first call never waits.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub async fn ready(&mut self) {
        if let Some(last) = self.last {
            let wait = self.interval.saturating_sub(last.elapsed());
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Rate limits for every stage that talks to an external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub relevance: RateLimit,
    pub impact: RateLimit,
    pub summary: RateLimit,
    /// Between chunks of one message.
    pub chunk: RateLimit,
    /// Between independent messages.
    pub message: RateLimit,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            relevance: RateLimit::batched(5, Duration::from_millis(1_000)),
            impact: RateLimit::sequential(Duration::from_millis(500)),
            summary: RateLimit::sequential(Duration::from_millis(500)),
            chunk: RateLimit::sequential(Duration::from_millis(500)),
            message: RateLimit::sequential(Duration::from_millis(1_500)),
        }
    }
}

impl Pacing {
    /// No waiting anywhere; relevance batches keep their default width.
    pub fn immediate() -> Self {
        Self {
            relevance: RateLimit::batched(5, Duration::ZERO),
            impact: RateLimit::sequential(Duration::ZERO),
            summary: RateLimit::sequential(Duration::ZERO),
            chunk: RateLimit::sequential(Duration::ZERO),
            message: RateLimit::sequential(Duration::ZERO),
        }
    }
}
