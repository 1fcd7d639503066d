//! Request pacing and retry policy for the contents API.
//!
//! The contents API enforces a per-credential request budget. Two pieces
//! keep the fetcher inside it:
//!
//! - [`RequestPacer`] spaces consecutive requests by a fixed minimum
//!   interval (disabled at 0 ms).
//! - [`RetryPolicy`] decides whether a failed listing is worth retrying and
//!   how long to wait first.
//!
//! # Retry Strategy
//!
//! - HTTP 429, or 403 with `x-ratelimit-remaining: 0` → retry
//! - HTTP 5xx → retry
//! - network errors → retry
//! - any other 4xx → fail immediately
//! - Backoff: 1s, 2s, 4s, 8s, ... capped at `max_backoff`, unless the
//!   server sent `Retry-After`, which is honored up to the same cap.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::GithubConfig;
use crate::error::FetchErrorKind;

/// Enforces a minimum spacing between requests.
pub struct RequestPacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait until the next request may be sent, then reserve the slot after it.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        let start = match *next {
            Some(at) if at > now => at,
            _ => now,
        };
        *next = Some(start + self.interval);
        drop(next);
        tokio::time::sleep_until(start).await;
    }
}

/// Classify a non-success listing status.
pub fn classify_status(status: StatusCode, headers: &HeaderMap) -> FetchErrorKind {
    match status.as_u16() {
        404 => FetchErrorKind::NotFound,
        429 => FetchErrorKind::RateLimited,
        403 if rate_limit_exhausted(headers) => FetchErrorKind::RateLimited,
        401 | 403 => FetchErrorKind::Unauthorized,
        _ => FetchErrorKind::Status,
    }
}

fn rate_limit_exhausted(headers: &HeaderMap) -> bool {
    let remaining_zero = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    remaining_zero || headers.contains_key(reqwest::header::RETRY_AFTER)
}

/// Retry and backoff settings for listing requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &GithubConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
        }
    }

    /// `status` is `None` when no response was received.
    pub fn should_retry(&self, kind: FetchErrorKind, status: Option<StatusCode>, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        match kind {
            FetchErrorKind::RateLimited | FetchErrorKind::Transport => true,
            _ => status.is_some_and(|s| s.is_server_error()),
        }
    }

    /// Delay before retry number `attempt + 1`.
    pub fn delay(&self, attempt: u32, headers: &HeaderMap) -> Duration {
        if let Some(secs) = headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            return Duration::from_secs(secs).min(self.max_backoff);
        }
        let factor = 1u32 << attempt.min(5);
        (self.base_delay * factor).min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn forbidden_with_exhausted_budget_is_rate_limited() {
        let exhausted = headers(&[("x-ratelimit-remaining", "0")]);
        let plenty = headers(&[("x-ratelimit-remaining", "4999")]);
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, &exhausted),
            FetchErrorKind::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, &plenty),
            FetchErrorKind::Unauthorized
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, &exhausted),
            FetchErrorKind::NotFound
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()),
            FetchErrorKind::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, &HeaderMap::new()),
            FetchErrorKind::Status
        );
    }

    #[test]
    fn transient_failures_retry_until_budget_spent() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(32),
        };
        let forbidden = Some(StatusCode::FORBIDDEN);
        let bad_gateway = Some(StatusCode::BAD_GATEWAY);
        assert!(policy.should_retry(FetchErrorKind::RateLimited, forbidden, 0));
        assert!(policy.should_retry(FetchErrorKind::Status, bad_gateway, 1));
        assert!(!policy.should_retry(FetchErrorKind::Status, bad_gateway, 2));
        assert!(policy.should_retry(FetchErrorKind::Transport, None, 0));
        assert!(!policy.should_retry(FetchErrorKind::NotFound, Some(StatusCode::NOT_FOUND), 0));
        assert!(!policy.should_retry(FetchErrorKind::Unauthorized, forbidden, 0));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
        };
        let none = HeaderMap::new();
        assert_eq!(policy.delay(0, &none), Duration::from_secs(1));
        assert_eq!(policy.delay(1, &none), Duration::from_secs(2));
        assert_eq!(policy.delay(3, &none), Duration::from_secs(8));
        assert_eq!(policy.delay(4, &none), Duration::from_secs(10));
        assert_eq!(
            policy.delay(0, &headers(&[("retry-after", "3")])),
            Duration::from_secs(3)
        );
        assert_eq!(
            policy.delay(0, &headers(&[("retry-after", "600")])),
            Duration::from_secs(10)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_spaces_requests() {
        let pacer = RequestPacer::new(Duration::from_millis(500));
        let start = Instant::now();
        pacer.acquire().await;
        pacer.acquire().await;
        pacer.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
