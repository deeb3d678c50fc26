//! Authentication endpoints: login, token refresh, current user.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{verify_password, AuthUser};
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::AppState;
use regal_core::User;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// POST /api/auth/login
///
/// Rate limited per username so credential stuffing burns out quickly.
/// The same error is returned for unknown users and wrong passwords.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let identifier = req.username.trim().to_lowercase();

    if !state.rate_limiter.check(&identifier).await {
        return Err(ApiError::new(
            ErrorCode::RateLimited,
            "Too many login attempts, try again later",
        ));
    }

    let user = state
        .db
        .users()
        .get_by_username(req.username.trim())
        .await?;

    let user = match user {
        Some(user) if verify_password(&req.password, &user.password_hash) => user,
        _ => return Err(ApiError::auth_failed("Invalid username or password")),
    };

    let access_token = state
        .jwt
        .generate_access_token(&user.id, &user.username, user.role)?;
    let refresh_token = state
        .jwt
        .generate_refresh_token(&user.id, &user.username, user.role)?;

    state.rate_limiter.reset(&identifier).await;

    info!(username = %user.username, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        refresh_token,
        user,
    }))
}

/// POST /api/auth/refresh
///
/// The user is re-read so a deactivated account or changed role takes
/// effect at the next refresh, not at token expiry.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<AccessTokenResponse>> {
    let claims = state.jwt.validate_refresh_token(&req.refresh_token)?;

    let user = state
        .db
        .users()
        .get_by_id(&claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::auth_failed("Account is no longer active"))?;

    let access_token = state
        .jwt
        .generate_access_token(&user.id, &user.username, user.role)?;

    Ok(Json(AccessTokenResponse { access_token }))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<User>> {
    let user = state
        .db
        .users()
        .get_by_id(&caller.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", &caller.user_id))?;

    Ok(Json(user))
}
