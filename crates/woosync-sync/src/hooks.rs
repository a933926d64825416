//! # Hooks
//!
//! Entry points called by the ERP side: document events, manual triggers
//! and scheduled passes. Hooks only decide and enqueue; the work itself
//! happens in queued jobs.
//!
//! ## Hook Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Event                              Job                     Queue      │
//! │  ─────────────────────────────────  ──────────────────────  ─────────  │
//! │  stock document saved/submitted ──► UpdateStockLevels       default *  │
//! │  item price saved ────────────────► SyncItemPrices(item)    long    *  │
//! │  manual stock sync (5 min guard) ─► UpdateStockLevels       short      │
//! │  manual price sync (30 min guard) ► SyncItemPrices(item)    long       │
//! │  daily stock sweep ───────────────► UpdateStockLevels × N   default    │
//! │  daily price pass (4 h lock) ─────► SyncItemPriceBatch × N  long  **   │
//! │                                                                         │
//! │  * deferred until the caller's CommitScope commits                     │
//! │  ** lock held until the last batch of the pass finishes                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Document and price hooks do nothing in test mode.

use serde::Serialize;
use tracing::{debug, info, warn};

use woosync_core::validation::validate_item_code;
use woosync_core::{
    manual_price_sync_key, manual_stock_sync_key, ItemPrice, PriceChange, StockDocument, StockTrigger,
    PRICE_SYNC_LOCK_KEY,
};

use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::price_sync::{release_price_lock, PriceSynchronizer};
use crate::queue::{CommitScope, JobOptions, QueueName, SyncJob};

/// What a hook did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HookOutcome {
    /// A job was enqueued (or deferred until commit).
    Enqueued { item_codes: Vec<String> },
    /// Nothing to do.
    Skipped { reason: String },
    /// The same trigger fired recently; ignored.
    Debounced,
}

impl HookOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        HookOutcome::Skipped { reason: reason.into() }
    }
}

// =============================================================================
// Document hooks
// =============================================================================

/// Stock hook for a saved or submitted stock-affecting document.
///
/// Enqueues one `UpdateStockLevels` job for the document's distinct items
/// when the document touches a warehouse that some stock-enabled server
/// syncs. The job is deferred until `scope` commits.
pub async fn on_stock_document(
    ctx: &SyncContext,
    scope: &mut CommitScope,
    doc: &StockDocument,
) -> SyncResult<HookOutcome> {
    if ctx.config.test_mode {
        return Ok(HookOutcome::skipped("test mode"));
    }

    let servers = ctx.db.servers().list_stock_enabled().await?;

    let item_codes = match woosync_core::stock::evaluate_stock_document(doc, &servers) {
        StockTrigger::Enqueue(codes) if !codes.is_empty() => codes,
        StockTrigger::Enqueue(_) => return Ok(HookOutcome::skipped("document has no items")),
        StockTrigger::NotStockDocument => return Ok(HookOutcome::skipped("not a stock document")),
        StockTrigger::StockNotUpdated => return Ok(HookOutcome::skipped("document does not update stock")),
        StockTrigger::NoEnabledServer => return Ok(HookOutcome::skipped("no server syncs stock")),
        StockTrigger::NoSyncedWarehouse => return Ok(HookOutcome::skipped("no synced warehouse touched")),
    };

    debug!(
        doctype = %doc.doctype,
        document = %doc.name,
        items = item_codes.len(),
        "Stock document triggers sync"
    );

    let options = JobOptions::new(QueueName::Default, ctx.config.stock.job_timeout(item_codes.len())).after_commit();
    scope
        .enqueue(
            SyncJob::UpdateStockLevels {
                item_codes: item_codes.clone(),
            },
            options,
        )
        .await?;

    Ok(HookOutcome::Enqueued { item_codes })
}

/// Price hook for a saved item price.
///
/// The new rate travels with the job, so the batch pushes it even if it
/// runs before the caller's save is visible to other readers.
pub async fn on_item_price_saved(
    ctx: &SyncContext,
    scope: &mut CommitScope,
    price: &ItemPrice,
) -> SyncResult<HookOutcome> {
    if ctx.config.test_mode {
        return Ok(HookOutcome::skipped("test mode"));
    }

    let options = JobOptions::new(QueueName::Long, ctx.config.price.job_timeout()).after_commit();
    scope
        .enqueue(
            SyncJob::SyncItemPrices {
                item_code: Some(price.item_code.clone()),
                change: Some(PriceChange::from(price)),
            },
            options,
        )
        .await?;

    debug!(item_code = %price.item_code, price_list = %price.price_list, "Item price triggers sync");
    Ok(HookOutcome::Enqueued {
        item_codes: vec![price.item_code.clone()],
    })
}

// =============================================================================
// Scheduled passes
// =============================================================================

/// Full-catalog price pass, guarded by the price lock.
///
/// The lock stays set until the last batch of the pass finishes (see
/// [`PricePassTracker`](crate::price_sync::PricePassTracker)). A pass that
/// plans nothing, or fails to plan, releases it right away.
///
/// ## Returns
/// * `Ok(true)` - planned and enqueued
/// * `Ok(false)` - another pass holds the lock; nothing done
pub async fn run_item_price_sync_in_background(ctx: &SyncContext) -> SyncResult<bool> {
    if !ctx
        .cache
        .acquire(PRICE_SYNC_LOCK_KEY, ctx.config.price.lock_ttl())
        .await?
    {
        info!("Price sync already running, skipping");
        return Ok(false);
    }

    let jobs = match PriceSynchronizer::new(ctx.clone()).plan(None, None).await {
        Ok(jobs) => jobs,
        Err(e) => {
            release_price_lock(ctx).await;
            return Err(e);
        }
    };

    if jobs.is_empty() {
        release_price_lock(ctx).await;
        info!("Full price sync found nothing to push");
        return Ok(true);
    }

    let total = jobs.len();
    let pass = ctx.price_pass.begin(total);

    for (enqueued, (mut job, options)) in jobs.into_iter().enumerate() {
        if let SyncJob::SyncItemPriceBatch { pass: slot, .. } = &mut job {
            *slot = Some(pass);
        }

        if let Err(e) = ctx.queue.enqueue(job, options).await {
            // Batches that never reached the queue will never count down.
            if ctx.price_pass.finish(pass, total - enqueued) {
                release_price_lock(ctx).await;
            }
            return Err(e);
        }
    }

    info!(batches = total, pass, "Full price sync planned");
    Ok(true)
}

/// Enqueues stock jobs covering every enabled stock item.
///
/// Walks the catalog in pages of `sweep_page_size` and splits the codes into
/// jobs of `sweep_job_batch_size`.
///
/// ## Returns
/// Number of jobs enqueued.
pub async fn update_stock_levels_for_all_enabled_items(ctx: &SyncContext) -> SyncResult<usize> {
    let page_size = ctx.config.stock.sweep_page_size.max(1);
    let job_size = ctx.config.stock.sweep_job_batch_size.max(1);

    let mut item_codes = Vec::new();
    let mut offset = 0;
    loop {
        let page = ctx.db.items().enabled_stock_item_codes(offset, page_size).await?;
        let done = (page.len() as u32) < page_size;
        item_codes.extend(page);
        if done {
            break;
        }
        offset += page_size;
    }

    let mut jobs = 0;
    for chunk in item_codes.chunks(job_size) {
        let options = JobOptions::new(QueueName::Default, ctx.config.stock.job_timeout(chunk.len()));
        ctx.queue
            .enqueue(
                SyncJob::UpdateStockLevels {
                    item_codes: chunk.to_vec(),
                },
                options,
            )
            .await?;
        jobs += 1;
    }

    info!(items = item_codes.len(), jobs, "Stock sweep enqueued");
    Ok(jobs)
}

// =============================================================================
// Manual triggers
// =============================================================================

/// Manual "sync stock now" for one item, debounced per item.
pub async fn enqueue_manual_item_stock_sync(ctx: &SyncContext, item_code: &str) -> SyncResult<HookOutcome> {
    validate_item_code(item_code)?;

    let key = manual_stock_sync_key(item_code);
    let window = std::time::Duration::from_secs(ctx.config.stock.manual_debounce_secs);
    if !ctx.cache.acquire(&key, window).await? {
        debug!(item_code, "Manual stock sync debounced");
        return Ok(HookOutcome::Debounced);
    }

    let job = SyncJob::UpdateStockLevels {
        item_codes: vec![item_code.to_string()],
    };
    let options = JobOptions::new(QueueName::Short, ctx.config.stock.job_timeout(1));
    enqueue_or_release(ctx, &key, job, options).await?;

    Ok(HookOutcome::Enqueued {
        item_codes: vec![item_code.to_string()],
    })
}

/// Manual "sync price now" for one item, debounced per item.
pub async fn enqueue_manual_item_price_sync(ctx: &SyncContext, item_code: &str) -> SyncResult<HookOutcome> {
    validate_item_code(item_code)?;

    let key = manual_price_sync_key(item_code);
    let window = std::time::Duration::from_secs(ctx.config.price.manual_debounce_secs);
    if !ctx.cache.acquire(&key, window).await? {
        debug!(item_code, "Manual price sync debounced");
        return Ok(HookOutcome::Debounced);
    }

    let job = SyncJob::SyncItemPrices {
        item_code: Some(item_code.to_string()),
        change: None,
    };
    let options = JobOptions::new(QueueName::Long, ctx.config.price.job_timeout());
    enqueue_or_release(ctx, &key, job, options).await?;

    Ok(HookOutcome::Enqueued {
        item_codes: vec![item_code.to_string()],
    })
}

/// A trigger whose job never made it onto the queue must not stay debounced.
async fn enqueue_or_release(ctx: &SyncContext, key: &str, job: SyncJob, options: JobOptions) -> SyncResult<()> {
    if let Err(e) = ctx.queue.enqueue(job, options).await {
        if let Err(release) = ctx.cache.release(key).await {
            warn!(error = %release, key, "Failed to release debounce key");
        }
        return Err(e);
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
