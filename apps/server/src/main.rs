//! # Regal Server
//!
//! HTTP API server for Regal POS.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tracing init                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ServerConfig::load()       ← env vars with dev defaults               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new()            ← pool + embedded migrations               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  bootstrap admin            ← only when the users table is empty       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Cache::connect()           ← optional Redis, degrades to the DB       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  axum::serve(/api router)   ← trace + CORS layers, ctrl-c shutdown     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every service object is constructed here and handed to handlers through
//! `AppState`; nothing is initialized at import time.

mod auth;
mod cache;
mod config;
mod error;
mod rate_limit;
mod routes;
mod state;

use std::time::Duration;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::auth::JwtManager;
use crate::cache::Cache;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;
use regal_core::Role;
use regal_db::{Database, DbConfig, NewUser};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Regal POS server...");

    let config = ServerConfig::load()?;
    info!(
        bind_addr = %config.bind_addr,
        database = %config.database_path,
        "Configuration loaded"
    );

    let db = Database::new(DbConfig::new(&config.database_path)).await?;
    info!("Database ready");

    bootstrap_admin(&db, &config).await?;

    let cache = Cache::connect(config.redis_url.as_deref(), config.cache_ttl_secs).await;
    if !cache.is_enabled() {
        info!("Running without Redis cache");
    }

    let jwt = JwtManager::new(
        config.jwt_secret.clone(),
        config.jwt_access_lifetime_secs,
        config.jwt_refresh_lifetime_secs,
    );

    let rate_limiter = RateLimiter::new(
        config.rate_limit_max,
        Duration::from_secs(config.rate_limit_window_secs),
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(db.clone(), jwt, cache, rate_limiter, config);

    let app = routes::api_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    db.close().await;

    Ok(())
}

/// Creates the admin account on a fresh database.
///
/// Runs only when the users table is empty, so an existing deployment is
/// never touched.
async fn bootstrap_admin(db: &Database, config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if db.users().count().await? > 0 {
        return Ok(());
    }

    warn!(
        username = %config.admin_username,
        "No users found, creating bootstrap admin account"
    );

    db.users()
        .insert(&NewUser {
            username: config.admin_username.clone(),
            password_hash: auth::hash_password(&config.admin_password)
                .map_err(|e| format!("failed to hash admin password: {}", e.message))?,
            role: Role::Admin,
        })
        .await?;

    Ok(())
}

/// Resolves when ctrl-c (or SIGTERM where available) arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
