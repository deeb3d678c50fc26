//! Server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults, so a bare `cargo run` starts a working development server.

use std::env;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,

    /// Path to the SQLite database file.
    pub database_path: String,

    /// Redis connection string (optional).
    pub redis_url: Option<String>,

    /// JWT secret key for signing tokens.
    pub jwt_secret: String,

    /// JWT access token lifetime in seconds.
    pub jwt_access_lifetime_secs: i64,

    /// JWT refresh token lifetime in seconds.
    pub jwt_refresh_lifetime_secs: i64,

    /// Login attempts allowed per identifier per window.
    pub rate_limit_max: u32,

    /// Rate limit window in seconds.
    pub rate_limit_window_secs: u64,

    /// Product cache TTL in seconds.
    pub cache_ttl_secs: u64,

    /// Username for the bootstrap admin account.
    pub admin_username: String,

    /// Password for the bootstrap admin account, used only when the
    /// users table is empty at startup.
    pub admin_password: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ServerConfig {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),

            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./regal.db".to_string()),

            redis_url: env::var("REDIS_URL").ok(),

            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| {
                // In production this MUST be set via environment variable
                "regal-dev-secret-change-in-production".to_string()
            }),

            jwt_access_lifetime_secs: env::var("JWT_ACCESS_LIFETIME_SECS")
                .unwrap_or_else(|_| "3600".to_string()) // 1 hour
                .parse()
                .map_err(|_| ConfigError::InvalidValue("JWT_ACCESS_LIFETIME_SECS".to_string()))?,

            jwt_refresh_lifetime_secs: env::var("JWT_REFRESH_LIFETIME_SECS")
                .unwrap_or_else(|_| "604800".to_string()) // 7 days
                .parse()
                .map_err(|_| ConfigError::InvalidValue("JWT_REFRESH_LIFETIME_SECS".to_string()))?,

            rate_limit_max: env::var("RATE_LIMIT_MAX")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RATE_LIMIT_MAX".to_string()))?,

            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RATE_LIMIT_WINDOW_SECS".to_string()))?,

            cache_ttl_secs: env::var("CACHE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CACHE_TTL_SECS".to_string()))?,

            admin_username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),

            admin_password: env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| "change-me-now".to_string()),
        };

        Ok(config)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
