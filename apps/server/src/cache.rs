//! Redis-backed read cache for hot lookups.
//!
//! The cache is strictly optional: when Redis is absent or misbehaving,
//! every operation degrades to a miss with a `warn` log and the caller
//! falls through to the database. No request ever fails because of the
//! cache.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

/// Read-through cache over an optional Redis connection.
#[derive(Clone)]
pub struct Cache {
    conn: Option<ConnectionManager>,
    ttl_secs: u64,
}

impl Cache {
    /// Connects to Redis when a URL is configured; otherwise builds the
    /// disabled cache. Connection failures disable the cache rather than
    /// failing startup.
    pub async fn connect(redis_url: Option<&str>, ttl_secs: u64) -> Self {
        let conn = match redis_url {
            Some(url) => match redis::Client::open(url) {
                Ok(client) => match client.get_connection_manager().await {
                    Ok(manager) => {
                        info!("Connected to Redis");
                        Some(manager)
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to connect to Redis, caching disabled");
                        None
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Invalid Redis URL, caching disabled");
                    None
                }
            },
            None => None,
        };

        Cache { conn, ttl_secs }
    }

    /// A cache that never hits. Used in tests and when Redis is not
    /// configured.
    pub fn disabled() -> Self {
        Cache {
            conn: None,
            ttl_secs: 0,
        }
    }

    /// Whether a Redis connection is live.
    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    /// Gets a JSON value. Any failure is a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone()?;

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %key, error = %e, "Dropping undecodable cache entry");
                    let _: Result<(), _> = conn.del(key).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Stores a JSON value with the configured TTL. Failures are logged
    /// and swallowed.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = conn.set_ex::<_, _, ()>(key, raw, self.ttl_secs).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// Drops a key after its underlying row changed.
    pub async fn invalidate(&self, key: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };

        if let Err(e) = conn.del::<_, ()>(key).await {
            warn!(key = %key, error = %e, "Cache invalidation failed");
        }
    }
}

/// Cache key for a product row.
pub fn product_key(id: &str) -> String {
    format!("product:{id}")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_cache_is_all_misses() {
        let cache = Cache::disabled();
        assert!(!cache.is_enabled());

        cache.set_json("k", &42u32).await;
        assert_eq!(cache.get_json::<u32>("k").await, None);
        cache.invalidate("k").await;
    }

    #[tokio::test]
    async fn test_connect_without_url_disables() {
        let cache = Cache::connect(None, 300).await;
        assert!(!cache.is_enabled());
    }

    #[test]
    fn test_product_key() {
        assert_eq!(product_key("abc"), "product:abc");
    }
}
