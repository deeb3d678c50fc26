//! User management endpoints. Admin only.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{hash_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::routes::Pagination;
use crate::state::AppState;
use regal_core::access::ADMIN_ONLY;
use regal_core::{Role, User};
use regal_db::NewUser;

#[derive(Debug, Deserialize)]
pub struct UserCreateRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UserUpdateRequest {
    pub role: Option<Role>,
    pub password: Option<String>,
}

/// GET /api/users
pub async fn list(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<User>>> {
    caller.require(ADMIN_ONLY)?;

    let users = state.db.users().list(page.limit(), page.offset()).await?;
    Ok(Json(users))
}

/// POST /api/users
pub async fn create(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<UserCreateRequest>,
) -> ApiResult<Json<User>> {
    caller.require(ADMIN_ONLY)?;

    if req.password.len() < 8 {
        return Err(ApiError::validation(
            "password must be at least 8 characters",
        ));
    }

    let user = state
        .db
        .users()
        .insert(&NewUser {
            username: req.username,
            password_hash: hash_password(&req.password)?,
            role: req.role,
        })
        .await?;

    state
        .db
        .audit()
        .record(
            &caller.user_id,
            "User",
            &user.id,
            "CREATE",
            Some(json!({"username": user.username, "role": user.role})),
        )
        .await;

    Ok(Json(user))
}

/// GET /api/users/:id
pub async fn get(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    caller.require(ADMIN_ONLY)?;

    let user = state
        .db
        .users()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", &id))?;

    Ok(Json(user))
}

/// PUT /api/users/:id
pub async fn update(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UserUpdateRequest>,
) -> ApiResult<Json<User>> {
    caller.require(ADMIN_ONLY)?;

    if let Some(role) = req.role {
        state.db.users().set_role(&id, role).await?;
    }

    if let Some(password) = &req.password {
        if password.len() < 8 {
            return Err(ApiError::validation(
                "password must be at least 8 characters",
            ));
        }
        state
            .db
            .users()
            .set_password_hash(&id, &hash_password(password)?)
            .await?;
    }

    let user = state
        .db
        .users()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", &id))?;

    state
        .db
        .audit()
        .record(
            &caller.user_id,
            "User",
            &id,
            "UPDATE",
            Some(json!({"role": user.role})),
        )
        .await;

    Ok(Json(user))
}

/// DELETE /api/users/:id
pub async fn delete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require(ADMIN_ONLY)?;

    if id == caller.user_id {
        return Err(ApiError::validation("cannot deactivate your own account"));
    }

    state.db.users().soft_delete(&id).await?;

    state
        .db
        .audit()
        .record(&caller.user_id, "User", &id, "DELETE", None)
        .await;

    Ok(Json(json!({"deleted": id})))
}
