//! Document event hooks.
//!
//! The ERP calls these after its own save has committed, so each handler
//! commits its scope before answering.

use axum::extract::State;
use axum::Json;
use tracing::info;

use woosync_core::{ItemPrice, StockDocument};
use woosync_sync::{hooks, HookOutcome};

use crate::error::ApiResult;
use crate::AppState;

/// `POST /hooks/stock-document`
pub async fn stock_document(
    State(state): State<AppState>,
    Json(doc): Json<StockDocument>,
) -> ApiResult<Json<HookOutcome>> {
    let mut scope = state.ctx.scope();
    let outcome = hooks::on_stock_document(&state.ctx, &mut scope, &doc).await?;
    scope.commit().await?;

    info!(doctype = %doc.doctype, document = %doc.name, ?outcome, "Stock document hook");
    Ok(Json(outcome))
}

/// `POST /hooks/item-price`
///
/// Stores the price in the mirror, then runs the price hook.
pub async fn item_price(
    State(state): State<AppState>,
    Json(price): Json<ItemPrice>,
) -> ApiResult<Json<HookOutcome>> {
    let mut scope = state.ctx.scope();
    state.ctx.db.item_prices().upsert(&price).await?;
    let outcome = hooks::on_item_price_saved(&state.ctx, &mut scope, &price).await?;
    scope.commit().await?;

    info!(item_code = %price.item_code, price_list = %price.price_list, ?outcome, "Item price hook");
    Ok(Json(outcome))
}
