//! # Data Patches
//!
//! One-off backfills of existing rows, run once per database after the schema
//! migrations. Each applied patch is recorded in `patch_log`.
//!
//! ```text
//!   run_pending()
//!        │
//!        ├── v1.enable_woocommerce_server_tax_settings
//!        │      every server: enable_tax_lines_sync = 1
//!        │
//!        └── v1.set_shipping_tax_account
//!               every server: f_n_f_tax_account = tax_account
//! ```
//!
//! A patch runs in one transaction together with its `patch_log` row. A
//! failure rolls both back, is logged, and the patch is tried again on the
//! next start.

use chrono::Utc;
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};

use crate::error::DbResult;

/// Every data patch, in the order they run.
pub const PATCHES: &[&str] = &[
    "v1.enable_woocommerce_server_tax_settings",
    "v1.set_shipping_tax_account",
];

/// What a [`run_pending`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    /// Patches applied by this call.
    pub applied: Vec<String>,
    /// Patches that were already recorded.
    pub skipped: Vec<String>,
    /// Patches that failed (retried on the next call).
    pub failed: Vec<String>,
}

/// Runs every patch not yet recorded in `patch_log`.
pub async fn run_pending(pool: &SqlitePool) -> DbResult<PatchReport> {
    let mut report = PatchReport::default();

    for &patch in PATCHES {
        if is_applied(pool, patch).await? {
            report.skipped.push(patch.to_string());
            continue;
        }

        match apply(pool, patch).await {
            Ok(rows) => {
                info!(patch, rows, "Data patch applied");
                report.applied.push(patch.to_string());
            }
            Err(e) => {
                warn!(patch, error = %e, "Data patch failed");
                report.failed.push(patch.to_string());
            }
        }
    }

    Ok(report)
}

/// True when `patch` is recorded in `patch_log`.
pub async fn is_applied(pool: &SqlitePool, patch: &str) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patch_log WHERE patch = ?1")
        .bind(patch)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

async fn apply(pool: &SqlitePool, patch: &str) -> DbResult<u64> {
    let mut tx = pool.begin().await?;

    let rows = match patch {
        "v1.enable_woocommerce_server_tax_settings" => enable_tax_lines_sync(&mut tx).await?,
        "v1.set_shipping_tax_account" => copy_shipping_tax_account(&mut tx).await?,
        _ => 0,
    };

    sqlx::query("INSERT INTO patch_log (patch, applied_at) VALUES (?1, ?2)")
        .bind(patch)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(rows)
}

/// Turns on tax line sync for every server.
async fn enable_tax_lines_sync(tx: &mut Transaction<'_, Sqlite>) -> DbResult<u64> {
    let result = sqlx::query("UPDATE woocommerce_servers SET enable_tax_lines_sync = 1")
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

/// Copies the tax account into the fees-and-freight tax account.
async fn copy_shipping_tax_account(tx: &mut Transaction<'_, Sqlite>) -> DbResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE woocommerce_servers
        SET f_n_f_tax_account = tax_account
        WHERE tax_account IS NOT NULL AND tax_account != ''
        "#,
    )
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use woosync_core::WooCommerceServer;

    #[tokio::test]
    async fn test_patches_run_once_on_startup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        for patch in PATCHES {
            assert!(is_applied(db.pool(), patch).await.unwrap());
        }

        let report = db.run_patches().await.unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(report.skipped.len(), PATCHES.len());
    }

    #[tokio::test]
    async fn test_patches_backfill_existing_servers() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();
        db.run_migrations().await.unwrap();

        let mut with_account = WooCommerceServer::new("a.test", "https://a.test");
        with_account.tax_account = Some("VAT - CO".into());
        db.servers().upsert(&with_account).await.unwrap();

        let without_account = WooCommerceServer::new("b.test", "https://b.test");
        db.servers().upsert(&without_account).await.unwrap();

        let report = db.run_patches().await.unwrap();
        assert_eq!(report.applied.len(), 2);
        assert!(report.failed.is_empty());

        let a = db.servers().get("a.test").await.unwrap().unwrap();
        assert!(a.enable_tax_lines_sync);
        assert_eq!(a.f_n_f_tax_account.as_deref(), Some("VAT - CO"));

        let b = db.servers().get("b.test").await.unwrap().unwrap();
        assert!(b.enable_tax_lines_sync);
        assert_eq!(b.f_n_f_tax_account, None);
    }
}
