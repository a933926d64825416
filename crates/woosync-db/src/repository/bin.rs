//! # Bin Repository
//!
//! Per-warehouse stock ledger (`actual_qty`, `reserved_qty`) of each item.

use sqlx::SqlitePool;

use crate::error::DbResult;
use woosync_core::Bin;

/// Repository for stock bins.
#[derive(Debug, Clone)]
pub struct BinRepository {
    pool: SqlitePool,
}

impl BinRepository {
    /// Creates a new BinRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BinRepository { pool }
    }

    /// Every bin of an item, ordered by warehouse.
    pub async fn for_item(&self, item_code: &str) -> DbResult<Vec<Bin>> {
        let bins = sqlx::query_as(
            r#"
            SELECT item_code, warehouse, actual_qty, reserved_qty
            FROM bins
            WHERE item_code = ?1
            ORDER BY warehouse
            "#,
        )
        .bind(item_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(bins)
    }

    /// Inserts or replaces the bin for `(item_code, warehouse)`.
    pub async fn upsert(&self, bin: &Bin) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bins (item_code, warehouse, actual_qty, reserved_qty)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(item_code, warehouse) DO UPDATE SET
                actual_qty = excluded.actual_qty,
                reserved_qty = excluded.reserved_qty
            "#,
        )
        .bind(&bin.item_code)
        .bind(&bin.warehouse)
        .bind(bin.actual_qty)
        .bind(bin.reserved_qty)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use woosync_core::Bin;

    #[tokio::test]
    async fn test_upsert_overwrites_quantities() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.bins();

        let mut bin = Bin {
            item_code: "MUG".into(),
            warehouse: "Stores - CO".into(),
            actual_qty: 10.0,
            reserved_qty: 1.0,
        };
        repo.upsert(&bin).await.unwrap();

        bin.actual_qty = 7.5;
        repo.upsert(&bin).await.unwrap();

        repo.upsert(&Bin {
            item_code: "OTHER".into(),
            warehouse: "Stores - CO".into(),
            actual_qty: 3.0,
            reserved_qty: 0.0,
        })
        .await
        .unwrap();

        assert_eq!(repo.for_item("MUG").await.unwrap(), vec![bin]);
        assert!(repo.for_item("NOPE").await.unwrap().is_empty());
    }
}
