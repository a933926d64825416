//! # Stock Synchroniser
//!
//! Pushes per-server stock quantities for a list of items.
//!
//! ## Flow per item
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  item_code                                                              │
//! │     │                                                                   │
//! │     ├── item missing ───────────────────────────► skipped (warn)        │
//! │     ├── no links / not stock / disabled ────────► skipped (debug)       │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  bins + parent item (variants)                                         │
//! │     │                                                                   │
//! │     ▼  plan_stock_pushes                                                │
//! │  per link:                                                              │
//! │     ├── Skip ──────────────────────────────────► skipped (debug)        │
//! │     └── Push ──► PUT {endpoint} {"stock_quantity": q}                   │
//! │                   ├── 2xx ──────────────────────► pushed                │
//! │                   └── error ─► "WooCommerce Error" log ─► failed        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failure on one link or one item never stops the rest of the batch.

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use woosync_core::stock::{check_item, plan_stock_pushes};
use woosync_core::{Item, StockDecision, StockPush, WooCommerceServer};

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};

/// Error log title for failed stock pushes.
pub const STOCK_ERROR_TITLE: &str = "WooCommerce Error";

/// What one call to [`StockSynchronizer::update_stock_levels`] did.
///
/// Item-level skips count once; link-level skips count once per link.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockSyncReport {
    pub pushed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Pushes stock levels to WooCommerce.
pub struct StockSynchronizer {
    ctx: SyncContext,
}

impl StockSynchronizer {
    pub fn new(ctx: SyncContext) -> Self {
        StockSynchronizer { ctx }
    }

    /// Pushes the current stock of every item in `item_codes`.
    ///
    /// Never fails as a whole: per-item problems are logged and counted.
    pub async fn update_stock_levels(&self, item_codes: &[String]) -> StockSyncReport {
        let mut report = StockSyncReport::default();

        let servers = match self.ctx.db.servers().list().await {
            Ok(servers) => servers,
            Err(e) => {
                self.ctx
                    .log_error(STOCK_ERROR_TITLE, &format!("Failed to load servers: {}", e))
                    .await;
                report.failed = item_codes.len();
                return report;
            }
        };

        for item_code in item_codes {
            if let Err(e) = self.sync_item(item_code, &servers, &mut report).await {
                report.failed += 1;
                self.ctx
                    .log_error(STOCK_ERROR_TITLE, &format!("Item: {}\n\n{}", item_code, e))
                    .await;
            }
        }

        info!(
            items = item_codes.len(),
            pushed = report.pushed,
            skipped = report.skipped,
            failed = report.failed,
            "Stock levels updated"
        );

        report
    }

    async fn sync_item(
        &self,
        item_code: &str,
        servers: &[WooCommerceServer],
        report: &mut StockSyncReport,
    ) -> SyncResult<()> {
        let Some(item) = self.ctx.db.items().get(item_code).await? else {
            warn!(item_code, "Item not found, skipping stock sync");
            report.skipped += 1;
            return Ok(());
        };

        if let Err(reason) = check_item(&item) {
            debug!(item_code, %reason, "Skipping stock sync");
            report.skipped += 1;
            return Ok(());
        }

        let bins = self.ctx.db.bins().for_item(item_code).await?;
        let parent = self.load_parent(&item).await?;

        let decisions = match plan_stock_pushes(&item, &bins, servers, parent.as_ref()) {
            Ok(decisions) => decisions,
            Err(reason) => {
                debug!(item_code, %reason, "Skipping stock sync");
                report.skipped += 1;
                return Ok(());
            }
        };

        for decision in decisions {
            match decision {
                StockDecision::Skip { server, reason } => {
                    debug!(item_code, server = %server, %reason, "Skipping link");
                    report.skipped += 1;
                }
                StockDecision::Push(push) => {
                    let Some(server) = servers.iter().find(|s| s.name == push.server) else {
                        report.skipped += 1;
                        continue;
                    };
                    match self.push(server, &push).await {
                        Ok(()) => report.pushed += 1,
                        Err(e) => {
                            report.failed += 1;
                            self.ctx
                                .log_error(STOCK_ERROR_TITLE, &push_error_message(item_code, &push, &e))
                                .await;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn load_parent(&self, item: &Item) -> SyncResult<Option<Item>> {
        match &item.variant_of {
            Some(parent) => Ok(self.ctx.db.items().get(parent).await?),
            None => Ok(None),
        }
    }

    async fn push(&self, server: &WooCommerceServer, push: &StockPush) -> SyncResult<()> {
        let api = self.ctx.api.api_for(server)?;
        let body = json!({ "stock_quantity": push.quantity });

        api.put(&push.endpoint.path(), &body).await?.error_for_status()?;

        debug!(
            server = %push.server,
            endpoint = %push.endpoint,
            quantity = push.quantity,
            "Stock pushed"
        );
        Ok(())
    }
}

fn push_error_message(item_code: &str, push: &StockPush, error: &SyncError) -> String {
    format!(
        "Item: {}\nServer: {}\nEndpoint: {}\n\nData in PUT request:\n{}\n\n{}",
        item_code,
        push.server,
        push.endpoint,
        json!({ "stock_quantity": push.quantity }),
        error
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stock_server, TestHarness};
    use serde_json::json;
    use woosync_core::{Bin, ItemWooCommerceServer};

    fn item(code: &str, variant_of: Option<&str>, links: &[(&str, Option<&str>)]) -> Item {
        Item {
            item_code: code.into(),
            item_name: code.into(),
            is_stock_item: true,
            disabled: false,
            variant_of: variant_of.map(String::from),
            woocommerce_servers: links
                .iter()
                .map(|(server, id)| ItemWooCommerceServer {
                    item_code: code.into(),
                    woocommerce_server: server.to_string(),
                    woocommerce_id: id.map(String::from),
                    enabled: true,
                })
                .collect(),
        }
    }

    fn bin(item: &str, warehouse: &str, actual: f64, reserved: f64) -> Bin {
        Bin {
            item_code: item.into(),
            warehouse: warehouse.into(),
            actual_qty: actual,
            reserved_qty: reserved,
        }
    }

    fn codes(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_quantity_sums_synced_warehouses_and_floors_once() {
        let h = TestHarness::new().await.unwrap();
        let mut server = stock_server("shop.test", &["WH1", "WH2"]);
        server.subtract_reserved_stock = true;
        h.ctx.db.servers().upsert(&server).await.unwrap();

        h.ctx.db.items().upsert(&item("X", None, &[("shop.test", Some("10"))])).await.unwrap();
        for b in [bin("X", "WH1", 10.5, 2.0), bin("X", "WH2", 4.75, 0.0), bin("X", "WH3", 99.0, 0.0)] {
            h.ctx.db.bins().upsert(&b).await.unwrap();
        }

        let report = StockSynchronizer::new(h.ctx.clone())
            .update_stock_levels(&codes(&["X"]))
            .await;

        assert_eq!(report, StockSyncReport { pushed: 1, skipped: 0, failed: 0 });
        let puts = h.store.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].endpoint, "products/10");
        // 10.5 - 2 + 4.75 = 13.25
        assert_eq!(puts[0].body, Some(json!({"stock_quantity": 13})));
    }

    #[tokio::test]
    async fn test_variant_uses_parent_product_endpoint() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.db.servers().upsert(&stock_server("shop.test", &["WH1"])).await.unwrap();
        h.ctx.db.items().upsert(&item("TSHIRT", None, &[("shop.test", Some("57"))])).await.unwrap();
        h.ctx.db
            .items()
            .upsert(&item("TSHIRT-RED", Some("TSHIRT"), &[("shop.test", Some("812"))]))
            .await
            .unwrap();
        h.ctx.db.bins().upsert(&bin("TSHIRT-RED", "WH1", 3.0, 0.0)).await.unwrap();

        StockSynchronizer::new(h.ctx.clone())
            .update_stock_levels(&codes(&["TSHIRT-RED"]))
            .await;

        assert_eq!(h.store.puts()[0].endpoint, "products/57/variations/812");
    }

    #[tokio::test]
    async fn test_skips_are_counted_not_pushed() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.db.servers().upsert(&stock_server("shop.test", &["WH1"])).await.unwrap();

        let mut not_stock = item("SERVICE", None, &[("shop.test", Some("1"))]);
        not_stock.is_stock_item = false;
        h.ctx.db.items().upsert(&not_stock).await.unwrap();
        h.ctx.db.items().upsert(&item("NOID", None, &[("shop.test", None)])).await.unwrap();
        h.ctx.db.items().upsert(&item("ORPHAN", Some("MISSING"), &[("shop.test", Some("5"))])).await.unwrap();

        let report = StockSynchronizer::new(h.ctx.clone())
            .update_stock_levels(&codes(&["SERVICE", "NOID", "ORPHAN", "GHOST"]))
            .await;

        assert_eq!(report, StockSyncReport { pushed: 0, skipped: 4, failed: 0 });
        assert!(h.store.calls().is_empty());
        assert_eq!(h.ctx.db.error_log().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_on_one_server_does_not_stop_others() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.db.servers().upsert(&stock_server("a.test", &["WH1"])).await.unwrap();
        h.ctx.db.servers().upsert(&stock_server("b.test", &["WH1"])).await.unwrap();
        h.ctx.db
            .items()
            .upsert(&item("X", None, &[("a.test", Some("1")), ("b.test", Some("2"))]))
            .await
            .unwrap();
        h.ctx.db.items().upsert(&item("Y", None, &[("b.test", Some("3"))])).await.unwrap();
        h.store.respond("a.test", "products/1", 500, json!({"code": "internal_error"}));

        let report = StockSynchronizer::new(h.ctx.clone())
            .update_stock_levels(&codes(&["X", "Y"]))
            .await;

        assert_eq!(report, StockSyncReport { pushed: 2, skipped: 0, failed: 1 });

        let errors = h.ctx.db.error_log().recent(10).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, STOCK_ERROR_TITLE);
        assert!(errors[0].message.contains("stock_quantity"));
        assert!(errors[0].message.contains("500"));
    }

    #[tokio::test]
    async fn test_disabled_stock_sync_server_is_skipped() {
        let h = TestHarness::new().await.unwrap();
        let mut server = stock_server("shop.test", &["WH1"]);
        server.enable_stock_level_synchronisation = false;
        h.ctx.db.servers().upsert(&server).await.unwrap();
        h.ctx.db.items().upsert(&item("X", None, &[("shop.test", Some("1"))])).await.unwrap();

        let report = StockSynchronizer::new(h.ctx.clone())
            .update_stock_levels(&codes(&["X"]))
            .await;

        assert_eq!(report.skipped, 1);
        assert!(h.store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_item_outside_synced_warehouses_pushes_zero() {
        let h = TestHarness::new().await.unwrap();
        h.ctx.db.servers().upsert(&stock_server("shop.test", &["WH1"])).await.unwrap();
        h.ctx.db.items().upsert(&item("X", None, &[("shop.test", Some("10"))])).await.unwrap();
        h.ctx.db.bins().upsert(&bin("X", "WH9", 25.0, 0.0)).await.unwrap();

        let report = StockSynchronizer::new(h.ctx.clone())
            .update_stock_levels(&codes(&["X"]))
            .await;

        assert_eq!(report.pushed, 1);
        let puts = h.store.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].body, Some(json!({"stock_quantity": 0})));
    }
}
