//! # WooSync Worker
//!
//! HTTP surface the ERP calls into, on top of the job queues and scheduler
//! from `woosync-sync`.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Worker Routes                                   │
//! │                                                                         │
//! │  ┌────────────────────────────┐  ┌──────────────────────────────────┐  │
//! │  │  Hooks                     │  │  Manual triggers                 │  │
//! │  │                            │  │                                  │  │
//! │  │ POST /hooks/stock-document │  │ POST /items/{code}/sync-stock    │  │
//! │  │ POST /hooks/item-price     │  │ POST /items/{code}/sync-price    │  │
//! │  └────────────────────────────┘  └──────────────────────────────────┘  │
//! │                                                                         │
//! │  ┌────────────────────────────┐  ┌──────────────────────────────────┐  │
//! │  │  Mirror                    │  │  Health                          │  │
//! │  │                            │  │                                  │  │
//! │  │ PUT/DELETE /mirror/servers │  │ GET /health                      │  │
//! │  │ PUT/DELETE /mirror/items   │  │                                  │  │
//! │  │ PUT /mirror/bins           │  │                                  │  │
//! │  │ PUT /mirror/item-prices    │  │                                  │  │
//! │  └────────────────────────────┘  └──────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! - `WOOSYNC_CONFIG` - path of the TOML config file (optional)
//! - `WOOSYNC_*` - per-setting overrides, see [`woosync_sync::config`]
//! - `RUST_LOG` - tracing filter (default `info,woosync=debug`)

pub mod error;
pub mod services;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use woosync_sync::SyncContext;

use crate::services::{health_service, hook_service, item_service, mirror_service};

pub use error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub ctx: SyncContext,
}

/// Builds the worker's router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_service::health))
        .route("/hooks/stock-document", post(hook_service::stock_document))
        .route("/hooks/item-price", post(hook_service::item_price))
        .route("/items/{item_code}/sync-stock", post(item_service::sync_stock))
        .route("/items/{item_code}/sync-price", post(item_service::sync_price))
        .route("/mirror/servers", put(mirror_service::put_server))
        .route("/mirror/servers/{name}", delete(mirror_service::delete_server))
        .route("/mirror/items", put(mirror_service::put_item))
        .route("/mirror/items/{item_code}", delete(mirror_service::delete_item))
        .route("/mirror/bins", put(mirror_service::put_bin))
        .route("/mirror/item-prices", put(mirror_service::put_item_price))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use woosync_sync::testing::TestHarness;
    use woosync_sync::{QueueName, SyncJob};

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn server_json() -> Value {
        json!({
            "name": "shop.test",
            "woocommerce_server_url": "https://shop.test",
            "api_consumer_key": "ck_test",
            "api_consumer_secret": "cs_test",
            "enable_sync": true,
            "enable_stock_level_synchronisation": true,
            "enable_price_list_sync": true,
            "price_list": "Retail",
            "price_list_delay_per_item": 0.0,
            "subtract_reserved_stock": false,
            "warehouses": ["Stores"],
            "enable_tax_lines_sync": false,
            "tax_account": null,
            "f_n_f_tax_account": null
        })
    }

    #[tokio::test]
    async fn test_health() {
        let h = TestHarness::new().await.unwrap();
        let app = app(AppState { ctx: h.ctx.clone() });

        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], true);
        assert_eq!(body["pending_jobs"]["long"], 0);
    }

    #[tokio::test]
    async fn test_stock_document_hook_enqueues_on_commit() {
        let h = TestHarness::new().await.unwrap();
        let app = app(AppState { ctx: h.ctx.clone() });

        let (status, _) = call(&app, "PUT", "/mirror/servers", Some(server_json())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let doc = json!({
            "doctype": "Stock Entry",
            "name": "STE-0001",
            "items": [
                {"item_code": "A", "s_warehouse": "Stores", "t_warehouse": "Transit"},
                {"item_code": "A", "t_warehouse": "Stores"}
            ]
        });
        let (status, body) = call(&app, "POST", "/hooks/stock-document", Some(doc)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "enqueued");
        assert_eq!(body["item_codes"], json!(["A"]));

        let jobs = h.queue.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(
            jobs[0].0,
            SyncJob::UpdateStockLevels {
                item_codes: vec!["A".into()]
            }
        );
    }

    #[tokio::test]
    async fn test_item_price_hook_stores_price_and_enqueues() {
        let h = TestHarness::new().await.unwrap();
        let app = app(AppState { ctx: h.ctx.clone() });

        let price = json!({
            "name": "IP-0001",
            "item_code": "A",
            "price_list": "Retail",
            "price_list_rate": 12.5
        });
        let (status, body) = call(&app, "POST", "/hooks/item-price", Some(price)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "enqueued");

        let stored = h.ctx.db.item_prices().get("IP-0001").await.unwrap().unwrap();
        assert_eq!(stored.price_list_rate, 12.5);
        assert_eq!(h.queue.jobs()[0].1.queue, QueueName::Long);
    }

    #[tokio::test]
    async fn test_manual_trigger_is_debounced() {
        let h = TestHarness::new().await.unwrap();
        let app = app(AppState { ctx: h.ctx.clone() });

        let (_, first) = call(&app, "POST", "/items/A/sync-price", None).await;
        let (_, second) = call(&app, "POST", "/items/A/sync-price", None).await;

        assert_eq!(first["outcome"], "enqueued");
        assert_eq!(second["outcome"], "debounced");
        assert_eq!(h.queue.jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_server_is_rejected() {
        let h = TestHarness::new().await.unwrap();
        let app = app(AppState { ctx: h.ctx.clone() });

        let mut server = server_json();
        server["api_consumer_secret"] = json!("");
        let (status, body) = call(&app, "PUT", "/mirror/servers", Some(server)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("api_consumer_secret"));
    }

    #[tokio::test]
    async fn test_mirror_item_roundtrip_and_delete() {
        let h = TestHarness::new().await.unwrap();
        let app = app(AppState { ctx: h.ctx.clone() });

        let item = json!({
            "item_code": "A",
            "item_name": "Widget",
            "is_stock_item": true,
            "disabled": false,
            "woocommerce_servers": [
                {"item_code": "A", "woocommerce_server": "shop.test", "woocommerce_id": "10", "enabled": true}
            ]
        });
        let (status, _) = call(&app, "PUT", "/mirror/items", Some(item)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(h.ctx.db.items().get("A").await.unwrap().is_some());

        let (status, _) = call(&app, "DELETE", "/mirror/items/A", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, "DELETE", "/mirror/items/A", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
