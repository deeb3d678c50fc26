//! Shared application state.
//!
//! Every service object is constructed once in `main` and injected here;
//! handlers receive the state through axum's `State` extractor. There are
//! no module-level singletons and no import-time side effects, so tests
//! can build as many isolated states as they want.

use std::sync::Arc;

use crate::auth::JwtManager;
use crate::cache::Cache;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;
use regal_db::Database;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database handle (repositories + stock coordinator).
    pub db: Database,

    /// JWT token manager.
    pub jwt: Arc<JwtManager>,

    /// Optional Redis read cache.
    pub cache: Cache,

    /// Login rate limiter.
    pub rate_limiter: Arc<RateLimiter>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Assembles the state from constructed services.
    pub fn new(
        db: Database,
        jwt: JwtManager,
        cache: Cache,
        rate_limiter: RateLimiter,
        config: ServerConfig,
    ) -> Self {
        AppState {
            db,
            jwt: Arc::new(jwt),
            cache,
            rate_limiter: Arc::new(rate_limiter),
            config: Arc::new(config),
        }
    }
}
