//! # Price Synchroniser
//!
//! Two stages: planning turns eligible price rows into batch jobs, and each
//! batch job compares and pushes the prices of its rows.
//!
//! ## Planning
//! ```text
//!   for server in servers with enable_sync + price sync + price list:
//!       rows = eligible_for_server(server, price_list, item_code?)
//!       for batch in batch_rows(rows, batch_size):
//!           enqueue SyncItemPriceBatch { server, batch, change }   (long)
//! ```
//!
//! A batch's timeout grows with its size and the server's per-row delay
//! (see [`WorkerConfig::price_batch_timeout`](crate::config::WorkerConfig::price_batch_timeout)).
//!
//! ## Full pass
//! The scheduled pass tags its batches with a pass id. [`PricePassTracker`]
//! counts them down and the last one to finish, fail or time out releases
//! `woo_price_sync_lock`.
//!
//! ## Batch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for row in batch (sleep price_list_delay_per_item between rows):      │
//! │     endpoint ── product / variation (parent must be linked) ──► skip   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │     GET endpoint ──► regular_price                                     │
//! │        │                                                                │
//! │        ▼ decide_price_update                                           │
//! │     equal ─────────────────────────────────────► unchanged             │
//! │     differs ──► PUT {"regular_price": "<rate>"} ► updated              │
//! │     any error ─► "WooCommerce Error: Price List Sync" log ─► failed    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use woosync_core::endpoint::endpoint_for;
use woosync_core::price::{batch_rows, decide_price_update, format_price, item_delay};
use woosync_core::{EligiblePrice, PriceChange, ProductEndpoint, WooCommerceServer, PRICE_SYNC_LOCK_KEY};

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::queue::{JobOptions, QueueName, SyncJob};
use crate::woocommerce::WooCommerceApi;

/// Error log title for failed price rows.
pub const PRICE_ERROR_TITLE: &str = "WooCommerce Error: Price List Sync";

/// What one batch did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceSyncReport {
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum RowOutcome {
    Updated,
    Unchanged,
    Skipped,
}

/// Compares ERP rates with WooCommerce prices and fixes the differences.
pub struct PriceSynchronizer {
    ctx: SyncContext,
}

impl PriceSynchronizer {
    pub fn new(ctx: SyncContext) -> Self {
        PriceSynchronizer { ctx }
    }

    /// Plans price batches and enqueues one job per batch.
    ///
    /// ## Arguments
    /// * `item_code` - one item, or `None` for every eligible row
    /// * `change` - an unsaved rate that overrides the stored one for its
    ///   item on servers using its price list
    ///
    /// ## Returns
    /// Number of batch jobs enqueued.
    pub async fn run(&self, item_code: Option<&str>, change: Option<&PriceChange>) -> SyncResult<usize> {
        let jobs = self.plan(item_code, change).await?;
        let enqueued = jobs.len();

        for (job, options) in jobs {
            self.ctx.queue.enqueue(job, options).await?;
        }

        info!(item_code = ?item_code, batches = enqueued, "Price sync planned");
        Ok(enqueued)
    }

    /// Builds the batch jobs for every price-enabled server without
    /// enqueuing them.
    pub async fn plan(
        &self,
        item_code: Option<&str>,
        change: Option<&PriceChange>,
    ) -> SyncResult<Vec<(SyncJob, JobOptions)>> {
        let servers = self.ctx.db.servers().list_price_enabled().await?;
        let batch_size = self.ctx.config.price.batch_size;
        let mut jobs = Vec::new();

        for server in &servers {
            let Some(price_list) = server.price_sync_list() else {
                debug!(server = %server.name, "No price list, skipping server");
                continue;
            };

            let rows = self
                .ctx
                .db
                .item_prices()
                .eligible_for_server(&server.name, price_list, item_code)
                .await?;

            debug!(
                server = %server.name,
                price_list,
                rows = rows.len(),
                "Planning price sync"
            );

            let delay = item_delay(server.price_list_delay_per_item);
            for batch in batch_rows(rows, batch_size) {
                let timeout = self.ctx.config.price_batch_timeout(batch.len(), delay);
                jobs.push((
                    SyncJob::SyncItemPriceBatch {
                        server: server.name.clone(),
                        rows: batch,
                        change: change.cloned(),
                        pass: None,
                    },
                    JobOptions::new(QueueName::Long, timeout),
                ));
            }
        }

        Ok(jobs)
    }

    /// Compares and pushes the prices of one batch on one server.
    ///
    /// Row failures are logged and counted; only a failure to reach the
    /// database or build the client fails the batch.
    pub async fn sync_batch(
        &self,
        server_name: &str,
        rows: &[EligiblePrice],
        change: Option<&PriceChange>,
    ) -> SyncResult<PriceSyncReport> {
        let mut report = PriceSyncReport::default();

        let server = self.ctx.db.servers().get(server_name).await?;
        let Some((server, price_list)) = server
            .as_ref()
            .and_then(|s| s.price_sync_list().map(|list| (s, list.to_string())))
        else {
            warn!(server = server_name, rows = rows.len(), "Server no longer syncs prices");
            report.skipped = rows.len();
            return Ok(report);
        };

        let api = self.ctx.api.api_for(server)?;
        let delay = item_delay(server.price_list_delay_per_item);

        for (index, row) in rows.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.sync_row(server, &price_list, &api, row, change).await {
                Ok(RowOutcome::Updated) => report.updated += 1,
                Ok(RowOutcome::Unchanged) => report.unchanged += 1,
                Ok(RowOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    self.ctx
                        .log_error(PRICE_ERROR_TITLE, &row_error_message(row, &e))
                        .await;
                }
            }
        }

        info!(
            server = server_name,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed = report.failed,
            "Price batch done"
        );

        Ok(report)
    }

    async fn sync_row(
        &self,
        server: &WooCommerceServer,
        price_list: &str,
        api: &Arc<dyn WooCommerceApi>,
        row: &EligiblePrice,
        change: Option<&PriceChange>,
    ) -> SyncResult<RowOutcome> {
        let Some(endpoint) = self.endpoint(server, row).await? else {
            debug!(item_code = %row.item_code, server = %server.name, "Parent not linked, skipping");
            return Ok(RowOutcome::Skipped);
        };
        let path = endpoint.path();

        let product = api.get(&path).await?.error_for_status()?.json()?;

        let Some(rate) = decide_price_update(row, price_list, change, product.get("regular_price"))? else {
            return Ok(RowOutcome::Unchanged);
        };

        let body = json!({ "regular_price": format_price(rate) });
        api.put(&path, &body).await?.error_for_status()?;

        debug!(item_code = %row.item_code, endpoint = %path, rate, "Price pushed");
        Ok(RowOutcome::Updated)
    }

    async fn endpoint(&self, server: &WooCommerceServer, row: &EligiblePrice) -> SyncResult<Option<ProductEndpoint>> {
        let parent = match &row.variant_of {
            Some(parent) => self.ctx.db.items().get(parent).await?,
            None => None,
        };

        Ok(endpoint_for(
            &row.woocommerce_id,
            &server.name,
            row.variant_of.as_deref(),
            parent.as_ref(),
        ))
    }
}

// =============================================================================
// Full pass tracking
// =============================================================================

/// Outstanding batches of the running full price pass.
///
/// Only one pass is tracked. When a pass outlives its lock TTL and a new
/// one begins, batches of the old pass no longer count.
#[derive(Debug, Default)]
pub struct PricePassTracker {
    next_id: AtomicU64,
    current: Mutex<Option<(u64, usize)>>,
}

impl PricePassTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a pass of `batches` batches. Returns its id.
    pub fn begin(&self, batches: usize) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state() = Some((id, batches));
        id
    }

    /// Marks `count` batches of pass `id` finished.
    ///
    /// Returns true exactly once, when the last batch of the current pass
    /// finishes.
    pub fn finish(&self, id: u64, count: usize) -> bool {
        let mut state = self.state();
        let Some((current, remaining)) = state.as_mut() else {
            return false;
        };
        if *current != id {
            return false;
        }

        *remaining = remaining.saturating_sub(count);
        let done = *remaining == 0;
        if done {
            *state = None;
        }
        done
    }

    /// Batches of the current pass still to finish.
    pub fn outstanding(&self) -> usize {
        self.state().map(|(_, remaining)| remaining).unwrap_or(0)
    }

    fn state(&self) -> MutexGuard<'_, Option<(u64, usize)>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counts one batch of a full pass down, releasing the price lock after
/// the last one.
///
/// Call [`finish`](Self::finish) when the batch returns. A guard dropped
/// without it (job timed out or panicked) still counts down and releases
/// the lock from a spawned task.
pub struct PassBatchGuard {
    ctx: SyncContext,
    pass: u64,
    finished: bool,
}

impl PassBatchGuard {
    pub fn new(ctx: SyncContext, pass: u64) -> Self {
        PassBatchGuard {
            ctx,
            pass,
            finished: false,
        }
    }

    pub async fn finish(mut self) {
        self.finished = true;
        if self.ctx.price_pass.finish(self.pass, 1) {
            release_price_lock(&self.ctx).await;
        }
    }
}

impl Drop for PassBatchGuard {
    fn drop(&mut self) {
        if self.finished || !self.ctx.price_pass.finish(self.pass, 1) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let ctx = self.ctx.clone();
                handle.spawn(async move { release_price_lock(&ctx).await });
            }
            Err(_) => warn!(pass = self.pass, "No runtime to release price sync lock, leaving it to expire"),
        }
    }
}

/// Releases `woo_price_sync_lock`, warning on failure.
pub(crate) async fn release_price_lock(ctx: &SyncContext) {
    match ctx.cache.release(PRICE_SYNC_LOCK_KEY).await {
        Ok(()) => debug!("Price sync lock released"),
        Err(e) => warn!(error = %e, "Failed to release price sync lock"),
    }
}

fn row_error_message(row: &EligiblePrice, error: &SyncError) -> String {
    format!(
        "Item: {}\nItem Price: {}\nServer: {}\nWooCommerce ID: {}\n\n{}",
        row.item_code, row.name, row.woocommerce_server, row.woocommerce_id, error
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{price_server, TestHarness};
    use std::time::Duration;
    use woosync_core::{Item, ItemPrice, ItemWooCommerceServer};

    fn item(code: &str, variant_of: Option<&str>, server: &str, id: &str) -> Item {
        Item {
            item_code: code.into(),
            item_name: code.into(),
            is_stock_item: true,
            disabled: false,
            variant_of: variant_of.map(String::from),
            woocommerce_servers: vec![ItemWooCommerceServer {
                item_code: code.into(),
                woocommerce_server: server.into(),
                woocommerce_id: Some(id.into()),
                enabled: true,
            }],
        }
    }

    fn price(code: &str, list: &str, rate: f64) -> ItemPrice {
        ItemPrice {
            name: format!("IP-{}-{}", code, list),
            item_code: code.into(),
            price_list: list.into(),
            price_list_rate: rate,
        }
    }

    fn batch_rows_of(jobs: &[(SyncJob, JobOptions)]) -> Vec<Vec<EligiblePrice>> {
        jobs.iter()
            .filter_map(|(job, _)| match job {
                SyncJob::SyncItemPriceBatch { rows, .. } => Some(rows.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_run_batches_eligible_rows_per_server() {
        let mut config = crate::config::WorkerConfig::default();
        config.price.batch_size = 2;
        let h = TestHarness::with_config(config).await.unwrap();

        h.ctx.db.servers().upsert(&price_server("shop.test", "Retail")).await.unwrap();
        for (i, code) in ["A", "B", "C"].iter().enumerate() {
            h.ctx.db.items().upsert(&item(code, None, "shop.test", &format!("{}", i + 1))).await.unwrap();
            h.ctx.db.item_prices().upsert(&price(code, "Retail", 10.0)).await.unwrap();
        }
        h.ctx.db.item_prices().upsert(&price("A", "Wholesale", 8.0)).await.unwrap();

        let batches = PriceSynchronizer::new(h.ctx.clone()).run(None, None).await.unwrap();
        assert_eq!(batches, 2);

        let jobs = h.queue.jobs();
        assert!(jobs.iter().all(|(_, opts)| opts.queue == QueueName::Long && !opts.after_commit));
        let rows = batch_rows_of(&jobs);
        assert_eq!(rows.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(rows[1][0].item_code, "C");
    }

    #[tokio::test]
    async fn test_run_for_one_item_carries_change() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.db.servers().upsert(&price_server("shop.test", "Retail")).await.unwrap();
        h.ctx.db.items().upsert(&item("A", None, "shop.test", "1")).await.unwrap();
        h.ctx.db.items().upsert(&item("B", None, "shop.test", "2")).await.unwrap();
        h.ctx.db.item_prices().upsert(&price("A", "Retail", 10.0)).await.unwrap();
        h.ctx.db.item_prices().upsert(&price("B", "Retail", 10.0)).await.unwrap();

        let change = PriceChange {
            item_code: "A".into(),
            price_list: "Retail".into(),
            price_list_rate: 12.0,
        };
        PriceSynchronizer::new(h.ctx.clone())
            .run(Some("A"), Some(&change))
            .await
            .unwrap();

        let jobs = h.queue.jobs();
        assert_eq!(jobs.len(), 1);
        match &jobs[0].0 {
            SyncJob::SyncItemPriceBatch {
                server,
                rows,
                change: Some(c),
                pass: None,
            } => {
                assert_eq!(server, "shop.test");
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].item_code, "A");
                assert_eq!(c.price_list_rate, 12.0);
            }
            other => panic!("unexpected job {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_batch_writes_only_differing_prices() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.db.servers().upsert(&price_server("shop.test", "Retail")).await.unwrap();
        for (code, id) in [("SAME", "1"), ("DIFF", "2"), ("EMPTY", "3")] {
            h.ctx.db.items().upsert(&item(code, None, "shop.test", id)).await.unwrap();
            h.ctx.db.item_prices().upsert(&price(code, "Retail", 19.99)).await.unwrap();
        }
        h.store.respond("shop.test", "products/1", 200, json!({"regular_price": "19.99"}));
        h.store.respond("shop.test", "products/2", 200, json!({"regular_price": "25.00"}));
        h.store.respond("shop.test", "products/3", 200, json!({"regular_price": ""}));

        let rows = h
            .ctx
            .db
            .item_prices()
            .eligible_for_server("shop.test", "Retail", None)
            .await
            .unwrap();
        let report = PriceSynchronizer::new(h.ctx.clone())
            .sync_batch("shop.test", &rows, None)
            .await
            .unwrap();

        assert_eq!(report.updated, 2);
        assert_eq!(report.unchanged, 1);
        let mut puts: Vec<_> = h.store.puts().into_iter().map(|c| (c.endpoint, c.body)).collect();
        puts.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            puts,
            vec![
                ("products/2".to_string(), Some(json!({"regular_price": "19.99"}))),
                ("products/3".to_string(), Some(json!({"regular_price": "19.99"}))),
            ]
        );
    }

    #[tokio::test]
    async fn test_change_overrides_stored_rate() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.db.servers().upsert(&price_server("shop.test", "Retail")).await.unwrap();
        h.ctx.db.items().upsert(&item("A", None, "shop.test", "1")).await.unwrap();
        h.ctx.db.item_prices().upsert(&price("A", "Retail", 10.0)).await.unwrap();
        h.store.respond("shop.test", "products/1", 200, json!({"regular_price": "10"}));

        let rows = h.ctx.db.item_prices().eligible_for_server("shop.test", "Retail", Some("A")).await.unwrap();
        let change = PriceChange {
            item_code: "A".into(),
            price_list: "Retail".into(),
            price_list_rate: 12.5,
        };
        let report = PriceSynchronizer::new(h.ctx.clone())
            .sync_batch("shop.test", &rows, Some(&change))
            .await
            .unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(h.store.puts()[0].body, Some(json!({"regular_price": "12.5"})));
    }

    #[tokio::test]
    async fn test_variant_without_linked_parent_is_skipped() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.db.servers().upsert(&price_server("shop.test", "Retail")).await.unwrap();
        h.ctx.db.items().upsert(&item("TPL", None, "other.test", "50")).await.unwrap();
        h.ctx.db.items().upsert(&item("TPL-RED", Some("TPL"), "shop.test", "51")).await.unwrap();
        h.ctx.db.item_prices().upsert(&price("TPL-RED", "Retail", 5.0)).await.unwrap();

        let rows = h.ctx.db.item_prices().eligible_for_server("shop.test", "Retail", None).await.unwrap();
        let report = PriceSynchronizer::new(h.ctx.clone())
            .sync_batch("shop.test", &rows, None)
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert!(h.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_row_failure_is_logged_and_batch_continues() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.db.servers().upsert(&price_server("shop.test", "Retail")).await.unwrap();
        h.ctx.db.items().upsert(&item("A", None, "shop.test", "1")).await.unwrap();
        h.ctx.db.items().upsert(&item("B", None, "shop.test", "2")).await.unwrap();
        h.ctx.db.item_prices().upsert(&price("A", "Retail", 3.0)).await.unwrap();
        h.ctx.db.item_prices().upsert(&price("B", "Retail", 3.0)).await.unwrap();
        h.store.respond("shop.test", "products/1", 404, json!({"code": "woocommerce_rest_product_invalid_id"}));

        let rows = h.ctx.db.item_prices().eligible_for_server("shop.test", "Retail", None).await.unwrap();
        let report = PriceSynchronizer::new(h.ctx.clone())
            .sync_batch("shop.test", &rows, None)
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.updated, 1);

        let errors = h.ctx.db.error_log().recent(10).await.unwrap();
        assert_eq!(errors[0].title, PRICE_ERROR_TITLE);
        assert!(errors[0].message.contains("404"));
    }

    #[tokio::test]
    async fn test_batch_for_disabled_server_is_skipped() {
        let h = TestHarness::new().await.unwrap();
        let mut server = price_server("shop.test", "Retail");
        server.enable_price_list_sync = false;
        h.ctx.db.servers().upsert(&server).await.unwrap();

        let rows = vec![EligiblePrice {
            name: "IP-A".into(),
            item_code: "A".into(),
            price_list_rate: 1.0,
            woocommerce_server: "shop.test".into(),
            woocommerce_id: "1".into(),
            variant_of: None,
        }];
        let report = PriceSynchronizer::new(h.ctx.clone())
            .sync_batch("shop.test", &rows, None)
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert!(h.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_timeout_covers_row_delay() {
        let mut config = crate::config::WorkerConfig::default();
        config.price.batch_size = 50;
        let h = TestHarness::with_config(config).await.unwrap();

        let mut server = price_server("slow.test", "Retail");
        server.price_list_delay_per_item = 30.0;
        h.ctx.db.servers().upsert(&server).await.unwrap();
        for i in 0..50 {
            let code = format!("ITEM-{:02}", i);
            h.ctx.db.items().upsert(&item(&code, None, "slow.test", &format!("{}", i + 1))).await.unwrap();
            h.ctx.db.item_prices().upsert(&price(&code, "Retail", 10.0)).await.unwrap();
        }

        let jobs = PriceSynchronizer::new(h.ctx.clone()).plan(None, None).await.unwrap();
        assert_eq!(jobs.len(), 1);

        let pauses = Duration::from_secs(30 * 49);
        let timeout = jobs[0].1.timeout;
        assert!(timeout > pauses, "timeout {:?} does not cover {:?} of pauses", timeout, pauses);
        assert!(timeout >= h.ctx.config.price.job_timeout());
        assert!(h.queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_delay_does_not_panic() {
        let h = TestHarness::new().await.unwrap();
        let mut server = price_server("shop.test", "Retail");
        server.price_list_delay_per_item = 1e20;
        h.ctx.db.servers().upsert(&server).await.unwrap();
        h.ctx.db.items().upsert(&item("A", None, "shop.test", "1")).await.unwrap();
        h.ctx.db.item_prices().upsert(&price("A", "Retail", 4.0)).await.unwrap();

        let rows = h.ctx.db.item_prices().eligible_for_server("shop.test", "Retail", None).await.unwrap();
        let report = PriceSynchronizer::new(h.ctx.clone())
            .sync_batch("shop.test", &rows, None)
            .await
            .unwrap();
        assert_eq!(report.updated, 1);

        let jobs = PriceSynchronizer::new(h.ctx.clone()).plan(None, None).await.unwrap();
        assert!(jobs[0].1.timeout < Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn test_pass_tracker_counts_down_current_pass() {
        let tracker = PricePassTracker::new();
        let first = tracker.begin(2);
        assert!(!tracker.finish(first, 1));
        assert_eq!(tracker.outstanding(), 1);
        assert!(tracker.finish(first, 1));
        assert!(!tracker.finish(first, 1));

        let stale = tracker.begin(3);
        let current = tracker.begin(1);
        assert!(!tracker.finish(stale, 3));
        assert_eq!(tracker.outstanding(), 1);
        assert!(tracker.finish(current, 1));
        assert_eq!(tracker.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_dropped_batch_guard_releases_lock() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.cache.acquire(PRICE_SYNC_LOCK_KEY, Duration::from_secs(60)).await.unwrap();
        let pass = h.ctx.price_pass.begin(1);

        drop(PassBatchGuard::new(h.ctx.clone(), pass));

        while h.ctx.cache.is_set(PRICE_SYNC_LOCK_KEY).await.unwrap() {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.ctx.price_pass.outstanding(), 0);
    }
}
