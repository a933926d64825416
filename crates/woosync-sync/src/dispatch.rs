//! # Job Dispatcher
//!
//! Routes queued [`SyncJob`]s to the synchronisers.
//!
//! ```text
//!   UpdateStockLevels   ──► StockSynchronizer::update_stock_levels
//!   SyncItemPrices      ──► PriceSynchronizer::run
//!   SyncItemPriceBatch  ──► PriceSynchronizer::sync_batch (+ pass countdown)
//!   ScheduledPriceSync  ──► hooks::run_item_price_sync_in_background
//! ```

use async_trait::async_trait;
use tracing::debug;

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::hooks;
use crate::price_sync::{PassBatchGuard, PriceSynchronizer};
use crate::queue::{JobHandler, SyncJob};
use crate::stock_sync::StockSynchronizer;

/// Error log title for jobs that failed or timed out as a whole.
pub const JOB_ERROR_TITLE: &str = "WooSync Job Failed";

/// Runs jobs against a [`SyncContext`].
#[derive(Clone)]
pub struct JobDispatcher {
    ctx: SyncContext,
}

impl JobDispatcher {
    pub fn new(ctx: SyncContext) -> Self {
        JobDispatcher { ctx }
    }
}

#[async_trait]
impl JobHandler for JobDispatcher {
    async fn handle(&self, job: &SyncJob) -> SyncResult<()> {
        match job {
            SyncJob::UpdateStockLevels { item_codes } => {
                let report = StockSynchronizer::new(self.ctx.clone())
                    .update_stock_levels(item_codes)
                    .await;
                debug!(?report, "Stock job finished");
                Ok(())
            }
            SyncJob::SyncItemPrices { item_code, change } => {
                PriceSynchronizer::new(self.ctx.clone())
                    .run(item_code.as_deref(), change.as_ref())
                    .await?;
                Ok(())
            }
            SyncJob::SyncItemPriceBatch {
                server,
                rows,
                change,
                pass,
            } => {
                let guard = pass.map(|pass| PassBatchGuard::new(self.ctx.clone(), pass));
                let result = PriceSynchronizer::new(self.ctx.clone())
                    .sync_batch(server, rows, change.as_ref())
                    .await;
                if let Some(guard) = guard {
                    guard.finish().await;
                }

                let report = result?;
                debug!(?report, "Price batch job finished");
                Ok(())
            }
            SyncJob::ScheduledPriceSync => {
                hooks::run_item_price_sync_in_background(&self.ctx).await?;
                Ok(())
            }
        }
    }

    async fn report_failure(&self, job: &SyncJob, error: &SyncError) {
        self.ctx
            .log_error(JOB_ERROR_TITLE, &format!("Job: {}\n\n{}", job.name(), error))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{price_server, stock_server, TestHarness};
    use serde_json::json;
    use woosync_core::{Bin, Item, ItemPrice, ItemWooCommerceServer, PRICE_SYNC_LOCK_KEY};

    fn linked(code: &str, server: &str, id: &str) -> Item {
        Item {
            item_code: code.into(),
            item_name: code.into(),
            is_stock_item: true,
            disabled: false,
            variant_of: None,
            woocommerce_servers: vec![ItemWooCommerceServer {
                item_code: code.into(),
                woocommerce_server: server.into(),
                woocommerce_id: Some(id.into()),
                enabled: true,
            }],
        }
    }

    #[tokio::test]
    async fn test_stock_job_pushes() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.db.servers().upsert(&stock_server("shop.test", &["Stores"])).await.unwrap();
        h.ctx.db.items().upsert(&linked("A", "shop.test", "7")).await.unwrap();
        h.ctx.db
            .bins()
            .upsert(&Bin {
                item_code: "A".into(),
                warehouse: "Stores".into(),
                actual_qty: 4.0,
                reserved_qty: 0.0,
            })
            .await
            .unwrap();

        let dispatcher = JobDispatcher::new(h.ctx.clone());
        dispatcher
            .handle(&SyncJob::UpdateStockLevels {
                item_codes: vec!["A".into()],
            })
            .await
            .unwrap();

        assert_eq!(h.store.puts()[0].body, Some(json!({"stock_quantity": 4})));
    }

    #[tokio::test]
    async fn test_price_jobs_plan_then_push() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.db.servers().upsert(&price_server("shop.test", "Retail")).await.unwrap();
        h.ctx.db.items().upsert(&linked("A", "shop.test", "7")).await.unwrap();
        h.ctx.db
            .item_prices()
            .upsert(&ItemPrice {
                name: "IP-A".into(),
                item_code: "A".into(),
                price_list: "Retail".into(),
                price_list_rate: 2.5,
            })
            .await
            .unwrap();

        let dispatcher = JobDispatcher::new(h.ctx.clone());
        dispatcher.handle(&SyncJob::ScheduledPriceSync).await.unwrap();

        let planned = h.queue.take();
        assert_eq!(planned.len(), 1);
        assert!(h.ctx.cache.is_set(PRICE_SYNC_LOCK_KEY).await.unwrap());
        dispatcher.handle(&planned[0].0).await.unwrap();

        assert_eq!(h.store.puts()[0].body, Some(json!({"regular_price": "2.5"})));
        assert!(!h.ctx.cache.is_set(PRICE_SYNC_LOCK_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_failure_report_goes_to_error_log() {
        let h = TestHarness::new().await.unwrap();
        let dispatcher = JobDispatcher::new(h.ctx.clone());

        dispatcher
            .report_failure(
                &SyncJob::ScheduledPriceSync,
                &SyncError::JobTimedOut {
                    job: "scheduled_price_sync".into(),
                    secs: 900,
                },
            )
            .await;

        let errors = h.ctx.db.error_log().recent(1).await.unwrap();
        assert_eq!(errors[0].title, JOB_ERROR_TITLE);
        assert!(errors[0].message.contains("900"));
    }
}
