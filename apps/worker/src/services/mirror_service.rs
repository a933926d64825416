//! # Mirror Service
//!
//! Keeps the local copy of ERP records current. The ERP pushes servers,
//! items (with their links), bins and prices here as they change; hooks and
//! jobs read only from the mirror.
//!
//! ```text
//!   PUT    /mirror/servers              WooCommerceServer (validated)
//!   DELETE /mirror/servers/{name}
//!   PUT    /mirror/items                Item with woocommerce_servers
//!   DELETE /mirror/items/{item_code}
//!   PUT    /mirror/bins                 Bin
//!   PUT    /mirror/item-prices          ItemPrice (no hook)
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::debug;

use woosync_core::validation::{validate_item_code, validate_server};
use woosync_core::{Bin, Item, ItemPrice, WooCommerceServer};
use woosync_db::DbError;

use crate::error::ApiResult;
use crate::AppState;

pub async fn put_server(
    State(state): State<AppState>,
    Json(server): Json<WooCommerceServer>,
) -> ApiResult<StatusCode> {
    validate_server(&server)?;
    state.ctx.db.servers().upsert(&server).await?;
    debug!(server = %server.name, "Server mirrored");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_server(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    if !state.ctx.db.servers().delete(&name).await? {
        return Err(DbError::not_found("WooCommerce Server", &name).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn put_item(State(state): State<AppState>, Json(item): Json<Item>) -> ApiResult<StatusCode> {
    validate_item_code(&item.item_code)?;
    state.ctx.db.items().upsert(&item).await?;
    debug!(item_code = %item.item_code, links = item.woocommerce_servers.len(), "Item mirrored");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_item(State(state): State<AppState>, Path(item_code): Path<String>) -> ApiResult<StatusCode> {
    if !state.ctx.db.items().delete(&item_code).await? {
        return Err(DbError::not_found("Item", &item_code).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn put_bin(State(state): State<AppState>, Json(bin): Json<Bin>) -> ApiResult<StatusCode> {
    validate_item_code(&bin.item_code)?;
    state.ctx.db.bins().upsert(&bin).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn put_item_price(
    State(state): State<AppState>,
    Json(price): Json<ItemPrice>,
) -> ApiResult<StatusCode> {
    validate_item_code(&price.item_code)?;
    state.ctx.db.item_prices().upsert(&price).await?;
    Ok(StatusCode::NO_CONTENT)
}
