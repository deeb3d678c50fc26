//! # HTTP Routes
//!
//! One module per resource; this module assembles them into the `/api`
//! router and holds the shared query types.
//!
//! ## Route Map
//! ```text
//! /api
//! ├── /health                      GET
//! ├── /auth/login                  POST   (rate limited, no token)
//! ├── /auth/refresh                POST   (no token)
//! ├── /auth/me                     GET
//! ├── /products                    GET POST
//! ├── /products/:id                GET PUT DELETE
//! ├── /customers                   GET POST
//! ├── /customers/:id               GET PUT DELETE
//! ├── /users                       GET POST            (admin)
//! ├── /users/:id                   GET PUT DELETE      (admin)
//! ├── /stock/entries               GET POST
//! ├── /stock/entries/:id           DELETE
//! ├── /stock/level/:product_id     GET
//! ├── /invoices                    GET POST
//! ├── /invoices/:id                GET DELETE
//! ├── /invoices/:id/items          PUT                 (Draft only)
//! ├── /invoices/:id/status         PUT
//! ├── /invoices/:id/pay            POST
//! ├── /refunds                     GET POST
//! ├── /refunds/:id                 GET DELETE
//! └── /pos/quick-sell              POST
//! ```

pub mod auth;
pub mod customers;
pub mod health;
pub mod invoices;
pub mod pos;
pub mod products;
pub mod refunds;
pub mod stock;
pub mod users;

use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::Deserialize;

use crate::state::AppState;

/// Shared offset/limit query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Clamped page size.
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 500)
    }

    /// Non-negative offset.
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Builds the `/api` router with all routes attached.
pub fn api_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health))
        // auth
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/me", get(auth::me))
        // products
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/:id",
            get(products::get)
                .put(products::update)
                .delete(products::delete),
        )
        // customers
        .route("/customers", get(customers::list).post(customers::create))
        .route(
            "/customers/:id",
            get(customers::get)
                .put(customers::update)
                .delete(customers::delete),
        )
        // users
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
        // stock
        .route(
            "/stock/entries",
            get(stock::list_entries).post(stock::create_entry),
        )
        .route("/stock/entries/:id", delete(stock::delete_entry))
        .route("/stock/level/:product_id", get(stock::level))
        // invoices
        .route("/invoices", get(invoices::list).post(invoices::create))
        .route(
            "/invoices/:id",
            get(invoices::get).delete(invoices::delete),
        )
        .route("/invoices/:id/items", put(invoices::update_items))
        .route("/invoices/:id/status", put(invoices::update_status))
        .route("/invoices/:id/pay", post(invoices::pay))
        // refunds
        .route("/refunds", get(refunds::list).post(refunds::create))
        .route("/refunds/:id", get(refunds::get).delete(refunds::delete))
        // pos
        .route("/pos/quick-sell", post(pos::quick_sell));

    Router::new().nest("/api", api).with_state(state)
}

// =============================================================================
// Router Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, JwtManager};
    use crate::cache::Cache;
    use crate::config::ServerConfig;
    use crate::rate_limit::RateLimiter;
    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::{Request, StatusCode};
    use regal_core::Role;
    use regal_db::{Database, DbConfig, NewUser};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            database_path: ":memory:".to_string(),
            redis_url: None,
            jwt_secret: "test-secret".to_string(),
            jwt_access_lifetime_secs: 3600,
            jwt_refresh_lifetime_secs: 86400,
            rate_limit_max: 100,
            rate_limit_window_secs: 60,
            cache_ttl_secs: 300,
            admin_username: "admin".to_string(),
            admin_password: "admin-password".to_string(),
        }
    }

    async fn test_app() -> (Router, AppState) {
        let config = test_config();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.users()
            .insert(&NewUser {
                username: "admin".to_string(),
                password_hash: hash_password("admin-password").unwrap(),
                role: Role::Admin,
            })
            .await
            .unwrap();

        let state = AppState::new(
            db,
            JwtManager::new(config.jwt_secret.clone(), 3600, 86400),
            Cache::disabled(),
            RateLimiter::new(config.rate_limit_max, Duration::from_secs(60)),
            config,
        );

        (api_router(state.clone()), state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn login(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/auth/login",
                None,
                json!({"username": "admin", "password": "admin-password"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let (app, _) = test_app().await;

        let response = app.oneshot(get_req("/api/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], true);
    }

    #[tokio::test]
    async fn test_login_and_me() {
        let (app, _) = test_app().await;
        let token = login(&app).await;

        let response = app
            .oneshot(get_req("/api/auth/me", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["username"], "admin");
        // The hash never leaves the process.
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_bad_credentials_are_unauthorized() {
        let (app, _) = test_app().await;

        let response = app
            .oneshot(post_json(
                "/api/auth/login",
                None,
                json!({"username": "admin", "password": "wrong"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (app, _) = test_app().await;

        let response = app.oneshot(get_req("/api/products", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cashier_cannot_manage_users() {
        let (app, state) = test_app().await;

        state
            .db
            .users()
            .insert(&NewUser {
                username: "till1".to_string(),
                password_hash: hash_password("cashier-pass").unwrap(),
                role: Role::Cashier,
            })
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/auth/login",
                None,
                json!({"username": "till1", "password": "cashier-pass"}),
            ))
            .await
            .unwrap();
        let token = body_json(response).await["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(get_req("/api/users", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_quick_sell_decreases_stock() {
        let (app, state) = test_app().await;
        let token = login(&app).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/products",
                Some(&token),
                json!({
                    "sku": "COKE-330",
                    "name": "Coca-Cola 330ml",
                    "unit_price_cents": 250,
                    "initial_stock": 10,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let product_id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/pos/quick-sell",
                Some(&token),
                json!({"product_id": product_id, "quantity": 4}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "issued");
        assert_eq!(body["total_cents"], 1000);

        assert_eq!(state.db.stock().quantity(&product_id).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_quick_sell_shortage_is_400_with_report() {
        let (app, state) = test_app().await;
        let token = login(&app).await;

        let product = state
            .db
            .products()
            .insert(&regal_db::NewProduct {
                sku: "RARE-1".to_string(),
                barcode: None,
                name: "Rare thing".to_string(),
                description: None,
                unit_price_cents: 9900,
                cost_price_cents: 5000,
                tax_rate_bps: 0,
                discount_bps: 0,
                initial_stock: 1,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(post_json(
                "/api/pos/quick-sell",
                Some(&token),
                json!({"product_id": product.id, "quantity": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");
        assert_eq!(body["details"]["shortages"][0]["available"], 1);

        // Nothing persisted.
        assert_eq!(state.db.stock().quantity(&product.id).await.unwrap(), 1);
        assert!(state.db.invoices().list(None, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_rate_limit() {
        let config = ServerConfig {
            rate_limit_max: 2,
            ..test_config()
        };
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(
            db,
            JwtManager::new("test-secret".to_string(), 3600, 86400),
            Cache::disabled(),
            RateLimiter::new(config.rate_limit_max, Duration::from_secs(60)),
            config,
        );
        let app = api_router(state);

        let attempt = || {
            post_json(
                "/api/auth/login",
                None,
                json!({"username": "ghost", "password": "nope"}),
            )
        };

        for _ in 0..2 {
            let response = app.clone().oneshot(attempt()).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = app.oneshot(attempt()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
