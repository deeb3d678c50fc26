//! Customer endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::Pagination;
use crate::state::AppState;
use regal_core::access::STAFF;
use regal_core::Customer;

#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// GET /api/customers
pub async fn list(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Customer>>> {
    caller.require(STAFF)?;

    let customers = state
        .db
        .customers()
        .list(page.limit(), page.offset())
        .await?;
    Ok(Json(customers))
}

/// POST /api/customers
pub async fn create(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<CustomerRequest>,
) -> ApiResult<Json<Customer>> {
    caller.require(STAFF)?;

    let customer = state
        .db
        .customers()
        .insert(
            &req.name,
            req.phone.as_deref(),
            req.email.as_deref(),
            req.address.as_deref(),
        )
        .await?;

    state
        .db
        .audit()
        .record(
            &caller.user_id,
            "Customer",
            &customer.id,
            "CREATE",
            Some(json!({"name": customer.name})),
        )
        .await;

    Ok(Json(customer))
}

/// GET /api/customers/:id
pub async fn get(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Customer>> {
    caller.require(STAFF)?;

    let customer = state
        .db
        .customers()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", &id))?;

    Ok(Json(customer))
}

/// PUT /api/customers/:id
pub async fn update(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CustomerRequest>,
) -> ApiResult<Json<Customer>> {
    caller.require(STAFF)?;

    let customer = state
        .db
        .customers()
        .update(
            &id,
            &req.name,
            req.phone.as_deref(),
            req.email.as_deref(),
            req.address.as_deref(),
        )
        .await?;

    state
        .db
        .audit()
        .record(&caller.user_id, "Customer", &id, "UPDATE", None)
        .await;

    Ok(Json(customer))
}

/// DELETE /api/customers/:id
pub async fn delete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require(STAFF)?;

    state.db.customers().soft_delete(&id).await?;

    state
        .db
        .audit()
        .record(&caller.user_id, "Customer", &id, "DELETE", None)
        .await;

    Ok(Json(json!({"deleted": id})))
}
