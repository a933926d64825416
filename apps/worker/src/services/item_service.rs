//! Manual per-item triggers behind the ERP's item form buttons.

use axum::extract::{Path, State};
use axum::Json;

use woosync_sync::{hooks, HookOutcome};

use crate::error::ApiResult;
use crate::AppState;

/// `POST /items/{item_code}/sync-stock`
pub async fn sync_stock(
    State(state): State<AppState>,
    Path(item_code): Path<String>,
) -> ApiResult<Json<HookOutcome>> {
    Ok(Json(hooks::enqueue_manual_item_stock_sync(&state.ctx, &item_code).await?))
}

/// `POST /items/{item_code}/sync-price`
pub async fn sync_price(
    State(state): State<AppState>,
    Path(item_code): Path<String>,
) -> ApiResult<Json<HookOutcome>> {
    Ok(Json(hooks::enqueue_manual_item_price_sync(&state.ctx, &item_code).await?))
}
