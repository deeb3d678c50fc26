//! JWT authentication module.
//!
//! Handles JWT token generation, validation, and refresh, plus argon2
//! password hashing. Role decisions themselves live in `regal_core::access`;
//! this module only gets a verified role out of the token and hands it to
//! that predicate.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use regal_core::{authorize, Role};

// =============================================================================
// Claims
// =============================================================================

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Username, for display and audit readability
    pub username: String,

    /// Role at token issue time
    pub role: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,

    /// Token type ("access" or "refresh")
    pub token_type: String,
}

// =============================================================================
// JWT Manager
// =============================================================================

/// JWT token manager.
pub struct JwtManager {
    secret: String,
    access_lifetime_secs: i64,
    refresh_lifetime_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(secret: String, access_lifetime_secs: i64, refresh_lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            access_lifetime_secs,
            refresh_lifetime_secs,
        }
    }

    /// Generate an access token.
    pub fn generate_access_token(
        &self,
        user_id: &str,
        username: &str,
        role: Role,
    ) -> Result<String, ApiError> {
        self.generate(user_id, username, role, "access", self.access_lifetime_secs)
    }

    /// Generate a refresh token.
    pub fn generate_refresh_token(
        &self,
        user_id: &str,
        username: &str,
        role: Role,
    ) -> Result<String, ApiError> {
        self.generate(
            user_id,
            username,
            role,
            "refresh",
            self.refresh_lifetime_secs,
        )
    }

    fn generate(
        &self,
        user_id: &str,
        username: &str,
        role: Role,
        token_type: &str,
        lifetime_secs: i64,
    ) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(lifetime_secs);

        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: token_type.to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            ApiError::new(
                crate::error::ErrorCode::Internal,
                format!("Failed to generate token: {e}"),
            )
        })
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::default();

        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| ApiError::auth_failed(format!("Invalid token: {e}")))?;

        Ok(token_data.claims)
    }

    /// Validate that a token is an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, ApiError> {
        let claims = self.validate_token(token)?;

        if claims.token_type != "access" {
            return Err(ApiError::auth_failed("Expected access token"));
        }

        Ok(claims)
    }

    /// Validate that a token is a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, ApiError> {
        let claims = self.validate_token(token)?;

        if claims.token_type != "refresh" {
            return Err(ApiError::auth_failed("Expected refresh token"));
        }

        Ok(claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| {
        ApiError::new(
            crate::error::ErrorCode::Internal,
            format!("Failed to hash password: {e}"),
        )
    })?;

    Ok(hash.to_string())
}

/// Verify a password against its stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

// =============================================================================
// Request Extractor
// =============================================================================

/// The authenticated caller, decoded from the bearer token.
///
/// Handlers take this as an argument and call [`AuthUser::require`] once
/// with the role set the endpoint demands.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Authorization check: one call per handler, pure underneath.
    pub fn require(&self, required: &[Role]) -> Result<(), ApiError> {
        if authorize(self.role, required) {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::auth_failed("Missing authorization header"))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::auth_failed("Expected bearer token"))?;

        let claims = state.jwt.validate_access_token(token)?;

        let role = Role::parse(&claims.role)
            .ok_or_else(|| ApiError::auth_failed(format!("Unknown role: {}", claims.role)))?;

        Ok(AuthUser {
            user_id: claims.sub,
            username: claims.username,
            role,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test-secret".to_string(), 3600, 86400)
    }

    #[test]
    fn test_jwt_roundtrip() {
        let access_token = manager()
            .generate_access_token("user-001", "alice", Role::Cashier)
            .unwrap();

        let claims = manager().validate_access_token(&access_token).unwrap();

        assert_eq!(claims.sub, "user-001");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, "cashier");
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_refresh_token() {
        let refresh_token = manager()
            .generate_refresh_token("user-001", "alice", Role::Admin)
            .unwrap();

        let claims = manager().validate_refresh_token(&refresh_token).unwrap();
        assert_eq!(claims.token_type, "refresh");
    }

    #[test]
    fn test_wrong_token_type() {
        let access_token = manager()
            .generate_access_token("user-001", "alice", Role::Cashier)
            .unwrap();

        // Try to validate access token as refresh token
        assert!(manager().validate_refresh_token(&access_token).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = manager()
            .generate_access_token("user-001", "alice", Role::Cashier)
            .unwrap();

        let other = JwtManager::new("other-secret".to_string(), 3600, 86400);
        assert!(other.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn test_require_uses_role_predicate() {
        let cashier = AuthUser {
            user_id: "u1".to_string(),
            username: "alice".to_string(),
            role: Role::Cashier,
        };

        assert!(cashier.require(regal_core::access::STAFF).is_ok());
        assert!(cashier.require(regal_core::access::ADMIN_ONLY).is_err());
    }
}
