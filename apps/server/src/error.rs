//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Regal Server                           │
//! │                                                                         │
//! │  DbError / CoreError                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError { code, message, details } ← this module                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  HTTP response:                                                        │
//! │    insufficient stock, bad input   → 400                               │
//! │    missing/bad credentials         → 401                               │
//! │    role denied                     → 403                               │
//! │    unknown id                      → 404                               │
//! │    duplicate / concurrent conflict → 409                               │
//! │    rate limited                    → 429                               │
//! │    storage trouble                 → 500 / 503                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use regal_core::CoreError;
use regal_db::DbError;

/// API error returned from HTTP handlers.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for 1 product(s)",
///   "details": {"shortages": [{"sku": "COKE-330", "available": 3, "requested": 5}]}
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling.
    pub code: ErrorCode,

    /// Human-readable error message for display.
    pub message: String,

    /// Optional structured context (e.g. the shortage report).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    InsufficientStock,
    BusinessRule,
    Conflict,
    AuthFailed,
    Forbidden,
    RateLimited,
    Unavailable,
    Internal,
}

impl ErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::InsufficientStock => StatusCode::BAD_REQUEST,
            ErrorCode::BusinessRule => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::AuthFailed => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates an error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a NOT_FOUND error.
    pub fn not_found(entity: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{entity} not found: {id}"))
    }

    /// Creates a VALIDATION_ERROR.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an AUTH_FAILED error.
    pub fn auth_failed(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::AuthFailed, message)
    }

    /// Creates a FORBIDDEN error.
    pub fn forbidden() -> Self {
        ApiError::new(ErrorCode::Forbidden, "Insufficient permissions")
    }

    /// Attaches structured context.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();

        if status.is_server_error() {
            tracing::error!(code = ?self.code, message = %self.message, "Request failed");
        }

        (status, Json(self)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::Validation(_) => ApiError::new(ErrorCode::ValidationError, err.to_string()),
            _ => ApiError::new(ErrorCode::BusinessRule, err.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, err.to_string()),

            DbError::InsufficientStock { ref shortages } => {
                let details = serde_json::json!({ "shortages": shortages });
                ApiError::new(ErrorCode::InsufficientStock, err.to_string()).with_details(details)
            }

            DbError::ConcurrentModification { .. } => {
                ApiError::new(ErrorCode::Conflict, err.to_string())
            }

            DbError::UniqueViolation { .. } => ApiError::new(ErrorCode::Conflict, err.to_string()),

            DbError::ForeignKeyViolation { .. } => {
                ApiError::new(ErrorCode::ValidationError, err.to_string())
            }

            DbError::Domain(core) => ApiError::from(core),

            DbError::Busy(_) | DbError::PoolExhausted => {
                ApiError::new(ErrorCode::Unavailable, err.to_string())
            }

            _ => ApiError::new(ErrorCode::Internal, err.to_string()),
        }
    }
}

/// Result type for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use regal_core::{InvoiceStatus, StockShortage};

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InsufficientStock.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::AuthFailed.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_insufficient_stock_carries_shortages() {
        let err = DbError::InsufficientStock {
            shortages: vec![StockShortage {
                product_id: "p1".to_string(),
                sku: "COKE-330".to_string(),
                available: 3,
                requested: 5,
            }],
        };

        let api: ApiError = err.into();
        assert_eq!(api.code, ErrorCode::InsufficientStock);
        let details = api.details.unwrap();
        assert_eq!(details["shortages"][0]["sku"], "COKE-330");
    }

    #[test]
    fn test_domain_errors_are_bad_requests() {
        let err = DbError::Domain(CoreError::ItemsLocked {
            status: InvoiceStatus::Issued,
        });
        let api: ApiError = err.into();
        assert_eq!(api.code, ErrorCode::BusinessRule);
    }

    #[test]
    fn test_concurrent_modification_is_conflict() {
        let err = DbError::ConcurrentModification {
            entity: "Invoice".to_string(),
            id: "inv-1".to_string(),
        };
        let api: ApiError = err.into();
        assert_eq!(api.code, ErrorCode::Conflict);
    }
}
