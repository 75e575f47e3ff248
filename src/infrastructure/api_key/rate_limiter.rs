//! Per-key fixed-window rate limiting
//!
//! One window per key, sized at one minute, with the ceiling taken from the
//! key's own configuration. Windows live behind a per-key mutex so that
//! concurrent validations of the same key serialize on one counter and
//! unrelated keys never contend.
//!
//! State is process-local. A multi-process deployment needs the window
//! state in a shared store; that is a deployment dependency, not something
//! this component papers over.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::domain::clock::Clock;

const WINDOW_SECONDS: i64 = 60;
const EVICTION_INTERVAL_SECONDS: i64 = 300;

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Ceiling for the window
    pub limit: u32,
    /// When the window rolls over and the ceiling fully resets
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Seconds until the window resets, for the Retry-After hint
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at - now).num_seconds().max(1) as u64
    }
}

#[derive(Debug)]
struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Fixed-window rate limiter keyed by API key id
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    windows: RwLock<HashMap<String, Arc<Mutex<Window>>>>,
    clock: Arc<dyn Clock>,
    last_eviction: Mutex<DateTime<Utc>>,
}

impl FixedWindowRateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();

        Self {
            windows: RwLock::new(HashMap::new()),
            clock,
            last_eviction: Mutex::new(now),
        }
    }

    /// Try to consume one request from the key's current window.
    ///
    /// Denied requests do not consume quota; in a fixed window the outcome
    /// is identical either way, and they are accounted for in usage records.
    pub async fn try_acquire(&self, key_id: &str, limit: u32) -> RateLimitDecision {
        self.maybe_evict().await;

        let now = self.clock.now();
        let window = self.window_for(key_id, now).await;
        let mut window = window.lock().await;

        if now - window.started_at >= Duration::seconds(WINDOW_SECONDS) {
            window.started_at = now;
            window.count = 0;
        }

        let reset_at = window.started_at + Duration::seconds(WINDOW_SECONDS);

        if window.count >= limit {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                limit,
                reset_at,
            };
        }

        window.count += 1;

        RateLimitDecision {
            allowed: true,
            remaining: limit - window.count,
            limit,
            reset_at,
        }
    }

    /// Drop a key's window, e.g. when its limits change or it is revoked
    pub async fn reset(&self, key_id: &str) {
        let mut windows = self.windows.write().await;
        windows.remove(key_id);
    }

    async fn window_for(&self, key_id: &str, now: DateTime<Utc>) -> Arc<Mutex<Window>> {
        {
            let windows = self.windows.read().await;
            if let Some(window) = windows.get(key_id) {
                return window.clone();
            }
        }

        let mut windows = self.windows.write().await;
        windows
            .entry(key_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Window {
                    started_at: now,
                    count: 0,
                }))
            })
            .clone()
    }

    /// Periodically drop windows that have been idle past their boundary
    async fn maybe_evict(&self) {
        let now = self.clock.now();

        {
            let mut last = self.last_eviction.lock().await;
            if now - *last < Duration::seconds(EVICTION_INTERVAL_SECONDS) {
                return;
            }
            *last = now;
        }

        let cutoff = now - Duration::seconds(2 * WINDOW_SECONDS);
        let mut windows = self.windows.write().await;

        windows.retain(|_, window| match window.try_lock() {
            Ok(window) => window.started_at >= cutoff,
            // Locked means in use right now
            Err(_) => true,
        });
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::clock::test::ManualClock;

    fn limiter() -> (Arc<ManualClock>, FixedWindowRateLimiter) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = FixedWindowRateLimiter::new(clock.clone());
        (clock, limiter)
    }

    #[tokio::test]
    async fn test_allows_up_to_the_ceiling_then_denies() {
        let (_clock, limiter) = limiter();

        for i in 0..5 {
            let decision = limiter.try_acquire("key-1", 5).await;
            assert!(decision.allowed, "request {} should be allowed", i + 1);
            assert_eq!(decision.remaining, 4 - i);
        }

        let denied = limiter.try_acquire("key-1", 5).await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.limit, 5);
    }

    #[tokio::test]
    async fn test_ceiling_resets_at_window_boundary() {
        let (clock, limiter) = limiter();

        for _ in 0..5 {
            limiter.try_acquire("key-1", 5).await;
        }
        assert!(!limiter.try_acquire("key-1", 5).await.allowed);

        clock.advance(Duration::seconds(61));

        let decision = limiter.try_acquire("key-1", 5).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }

    #[tokio::test]
    async fn test_keys_do_not_share_windows() {
        let (_clock, limiter) = limiter();

        assert!(limiter.try_acquire("key-1", 1).await.allowed);
        assert!(!limiter.try_acquire("key-1", 1).await.allowed);

        assert!(limiter.try_acquire("key-2", 1).await.allowed);
    }

    #[tokio::test]
    async fn test_denied_requests_do_not_extend_the_window() {
        let (clock, limiter) = limiter();

        assert!(limiter.try_acquire("key-1", 1).await.allowed);

        clock.advance(Duration::seconds(30));
        assert!(!limiter.try_acquire("key-1", 1).await.allowed);

        // The boundary is anchored to the first request, not the denial
        clock.advance(Duration::seconds(31));
        assert!(limiter.try_acquire("key-1", 1).await.allowed);
    }

    #[tokio::test]
    async fn test_reset_clears_the_window() {
        let (_clock, limiter) = limiter();

        assert!(limiter.try_acquire("key-1", 1).await.allowed);
        assert!(!limiter.try_acquire("key-1", 1).await.allowed);

        limiter.reset("key-1").await;

        assert!(limiter.try_acquire("key-1", 1).await.allowed);
    }

    #[tokio::test]
    async fn test_zero_limit_denies_everything() {
        let (_clock, limiter) = limiter();

        assert!(!limiter.try_acquire("key-1", 0).await.allowed);
    }

    #[tokio::test]
    async fn test_reset_at_and_retry_after() {
        let (clock, limiter) = limiter();
        let start = clock.now();

        let decision = limiter.try_acquire("key-1", 1).await;
        assert_eq!(decision.reset_at, start + Duration::seconds(60));

        clock.advance(Duration::seconds(20));
        let denied = limiter.try_acquire("key-1", 1).await;
        assert_eq!(denied.retry_after_secs(clock.now()), 40);
    }

    #[tokio::test]
    async fn test_eviction_drops_idle_windows() {
        let (clock, limiter) = limiter();

        limiter.try_acquire("key-1", 5).await;
        assert_eq!(limiter.windows.read().await.len(), 1);

        // Past the eviction interval and the idle cutoff
        clock.advance(Duration::seconds(301));
        limiter.try_acquire("key-2", 5).await;

        let windows = limiter.windows.read().await;
        assert!(!windows.contains_key("key-1"));
        assert!(windows.contains_key("key-2"));
    }

    #[tokio::test]
    async fn test_concurrent_acquires_on_same_key_respect_ceiling() {
        let (_clock, limiter) = limiter();
        let limiter = Arc::new(limiter);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.try_acquire("key-1", 5).await.allowed
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 5);
    }
}
