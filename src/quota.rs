//! Quota backend boundary and the in-process GCRA implementation.
//!
//! The rate limit guard never counts requests itself. It asks a
//! [`QuotaBackend`] whether a bucket may admit one more request within a
//! window and turns the answer into a [`RateLimitDecision`]. A distributed
//! store (Redis or similar) plugs in behind the same trait; the
//! [`GovernorQuotaBackend`] shipped here keeps its counters in memory and is
//! shared by every request on the process.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use thiserror::Error;
use tracing::debug;

/// Errors returned by a quota backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    /// The bucket is exhausted for the current window.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    Exceeded { retry_after: Duration },

    /// The backend could not answer.
    #[error("quota backend unavailable: {0}")]
    Unavailable(String),
}

impl QuotaError {
    /// Time until the bucket admits requests again.
    ///
    /// Backend failures carry no retry hint and report zero.
    pub fn retry_after(&self) -> Duration {
        match self {
            QuotaError::Exceeded { retry_after } => *retry_after,
            QuotaError::Unavailable(_) => Duration::ZERO,
        }
    }
}

/// Counter-with-TTL service consulted once per request.
///
/// Implementations must be safe for concurrent use from any number of
/// in-flight requests.
#[async_trait]
pub trait QuotaBackend: Send + Sync {
    /// Admit one request against `key` if fewer than `limit` requests were
    /// admitted within the trailing `duration`.
    async fn allow_with_duration(
        &self,
        key: &str,
        limit: u32,
        duration: Duration,
    ) -> Result<(), QuotaError>;
}

/// A rejected quota check, as exposed through the rate-limit headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limit: u32,
    pub remaining: u32,
    /// Time until the window admits requests again.
    pub retry_after: Duration,
    /// Absolute instant at which the caller may retry.
    pub retry_at: DateTime<Utc>,
}

impl RateLimitDecision {
    pub fn rejected(limit: u32, retry_after: Duration) -> Self {
        let delta = TimeDelta::from_std(retry_after).unwrap_or_else(|_| TimeDelta::zero());
        Self {
            limit,
            remaining: 0,
            retry_after,
            retry_at: Utc::now() + delta,
        }
    }

    /// Seconds until reset with microsecond precision, e.g. `12.300000`.
    pub fn reset_after_header(&self) -> String {
        format!("{:.6}", self.retry_after.as_secs_f64())
    }
}

/// Type alias for a keyed GCRA limiter.
type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// In-process quota backend built on Governor.
///
/// One keyed limiter exists per `(limit, window)` pair; buckets within it
/// are keyed by the caller-provided key. Each limiter admits `limit`
/// requests in a burst and replenishes one cell every `window / limit`.
#[derive(Default)]
pub struct GovernorQuotaBackend {
    limiters: Mutex<HashMap<(u32, Duration), Arc<KeyedLimiter>>>,
}

impl GovernorQuotaBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn limiter_for(&self, limit: u32, duration: Duration) -> Result<Arc<KeyedLimiter>, QuotaError> {
        let burst = NonZeroU32::new(limit)
            .ok_or_else(|| QuotaError::Unavailable("limit must be greater than 0".to_string()))?;
        let quota = Quota::with_period(duration / limit)
            .ok_or_else(|| QuotaError::Unavailable("window must be non-zero".to_string()))?
            .allow_burst(burst);

        let mut limiters = self
            .limiters
            .lock()
            .map_err(|_| QuotaError::Unavailable("limiter registry poisoned".to_string()))?;

        Ok(limiters
            .entry((limit, duration))
            .or_insert_with(|| Arc::new(RateLimiter::keyed(quota)))
            .clone())
    }
}

#[async_trait]
impl QuotaBackend for GovernorQuotaBackend {
    async fn allow_with_duration(
        &self,
        key: &str,
        limit: u32,
        duration: Duration,
    ) -> Result<(), QuotaError> {
        let limiter = self.limiter_for(limit, duration)?;

        match limiter.check_key(&key.to_string()) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let retry_after = not_until.wait_time_from(DefaultClock::default().now());
                debug!(key, limit, retry_after_ms = retry_after.as_millis() as u64, "Quota exhausted");
                Err(QuotaError::Exceeded { retry_after })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_admits_up_to_limit() {
        let backend = GovernorQuotaBackend::new();
        let window = Duration::from_secs(60);

        for _ in 0..3 {
            backend.allow_with_duration("http-api", 3, window).await.unwrap();
        }

        let err = backend
            .allow_with_duration("http-api", 3, window)
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::Exceeded { .. }));
        assert!(err.retry_after() > Duration::ZERO);
        assert!(err.retry_after() <= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_backend_keys_are_independent() {
        let backend = GovernorQuotaBackend::new();
        let window = Duration::from_secs(60);

        backend.allow_with_duration("a", 1, window).await.unwrap();
        assert!(backend.allow_with_duration("a", 1, window).await.is_err());
        assert!(backend.allow_with_duration("b", 1, window).await.is_ok());
    }

    #[tokio::test]
    async fn test_backend_rejects_zero_limit() {
        let backend = GovernorQuotaBackend::new();
        let err = backend
            .allow_with_duration("a", 0, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::Unavailable(_)));
        assert_eq!(err.retry_after(), Duration::ZERO);
    }

    #[test]
    fn test_rejected_decision() {
        let decision = RateLimitDecision::rejected(600, Duration::from_secs(30));
        assert_eq!(decision.limit, 600);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_after_header(), "30.000000");

        let delta = decision.retry_at.timestamp() - Utc::now().timestamp();
        assert!((29..=30).contains(&delta));
    }

    #[test]
    fn test_reset_after_keeps_fraction() {
        let decision = RateLimitDecision::rejected(10, Duration::from_millis(1));
        assert_eq!(decision.reset_after_header(), "0.001000");

        let decision = RateLimitDecision::rejected(10, Duration::ZERO);
        assert_eq!(decision.reset_after_header(), "0.000000");
    }
}
