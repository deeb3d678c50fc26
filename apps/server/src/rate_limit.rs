//! In-memory sliding-window rate limiter.
//!
//! Protects the login endpoint from credential stuffing. Constructed once
//! at startup and injected through application state; one process, one
//! limiter. A multi-node deployment would move this into Redis, which is
//! why the interface is already async.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// Sliding-window request limiter keyed by an opaque identifier
/// (username, client address).
pub struct RateLimiter {
    /// Max requests per identifier within the window.
    limit: u32,
    /// Window length.
    window: Duration,
    /// Request timestamps per identifier.
    requests: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `limit` requests per `window`.
    pub fn new(limit: u32, window: Duration) -> Self {
        RateLimiter {
            limit,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Records an attempt and returns whether it is allowed.
    ///
    /// Timestamps outside the window are pruned on every call, so the
    /// map stays bounded by the number of recently active identifiers.
    pub async fn check(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.lock().await;

        let timestamps = requests.entry(identifier.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() < self.limit as usize {
            timestamps.push(now);
            true
        } else {
            debug!(identifier = %identifier, "Rate limit exceeded");
            false
        }
    }

    /// Clears an identifier's history (e.g. after a successful login).
    pub async fn reset(&self, identifier: &str) {
        self.requests.lock().await.remove(identifier);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));

        assert!(limiter.check("alice").await);
        assert!(limiter.check("alice").await);
        assert!(limiter.check("alice").await);
        assert!(!limiter.check("alice").await);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.check("alice").await);
        assert!(!limiter.check("alice").await);
        assert!(limiter.check("bob").await);
    }

    #[tokio::test]
    async fn test_window_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));

        assert!(limiter.check("alice").await);
        assert!(!limiter.check("alice").await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.check("alice").await);
    }

    #[tokio::test]
    async fn test_reset() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.check("alice").await);
        limiter.reset("alice").await;
        assert!(limiter.check("alice").await);
    }
}
