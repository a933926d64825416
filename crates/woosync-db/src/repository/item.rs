//! # Item Repository
//!
//! Items and their WooCommerce links (the `woocommerce_servers` child table of
//! an ERP item).
//!
//! ## Catalog walk
//! ```text
//! enabled_stock_item_codes(offset=0,   limit=500)  → codes 1..500
//! enabled_stock_item_codes(offset=500, limit=500)  → codes 501..1000
//! ...                                              → short page = done
//! ```

use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use woosync_core::{Item, ItemWooCommerceServer};

#[derive(Debug, FromRow)]
struct ItemRow {
    item_code: String,
    item_name: String,
    is_stock_item: bool,
    disabled: bool,
    variant_of: Option<String>,
}

/// Repository for items and item ↔ server links.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Loads an item with its links, in link order.
    pub async fn get(&self, item_code: &str) -> DbResult<Option<Item>> {
        let row: Option<ItemRow> = sqlx::query_as(
            r#"
            SELECT item_code, item_name, is_stock_item, disabled, variant_of
            FROM items
            WHERE item_code = ?1
            "#,
        )
        .bind(item_code)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let links = self.links(&row.item_code).await?;

        Ok(Some(Item {
            item_code: row.item_code,
            item_name: row.item_name,
            is_stock_item: row.is_stock_item,
            disabled: row.disabled,
            variant_of: row.variant_of,
            woocommerce_servers: links,
        }))
    }

    /// Links of one item, in the order they were saved.
    pub async fn links(&self, item_code: &str) -> DbResult<Vec<ItemWooCommerceServer>> {
        let links = sqlx::query_as(
            r#"
            SELECT item_code, woocommerce_server, woocommerce_id, enabled
            FROM item_woocommerce_servers
            WHERE item_code = ?1
            ORDER BY id
            "#,
        )
        .bind(item_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    /// Inserts or replaces an item and its links.
    pub async fn upsert(&self, item: &Item) -> DbResult<()> {
        debug!(item_code = %item.item_code, links = item.woocommerce_servers.len(), "Upserting item");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO items (item_code, item_name, is_stock_item, disabled, variant_of)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(item_code) DO UPDATE SET
                item_name = excluded.item_name,
                is_stock_item = excluded.is_stock_item,
                disabled = excluded.disabled,
                variant_of = excluded.variant_of
            "#,
        )
        .bind(&item.item_code)
        .bind(&item.item_name)
        .bind(item.is_stock_item)
        .bind(item.disabled)
        .bind(&item.variant_of)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM item_woocommerce_servers WHERE item_code = ?1")
            .bind(&item.item_code)
            .execute(&mut *tx)
            .await?;

        for link in &item.woocommerce_servers {
            sqlx::query(
                r#"
                INSERT INTO item_woocommerce_servers (item_code, woocommerce_server, woocommerce_id, enabled)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&item.item_code)
            .bind(&link.woocommerce_server)
            .bind(&link.woocommerce_id)
            .bind(link.enabled)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// One page of enabled stock item codes, ordered by code.
    pub async fn enabled_stock_item_codes(&self, offset: u32, limit: u32) -> DbResult<Vec<String>> {
        let codes = sqlx::query_scalar(
            r#"
            SELECT item_code
            FROM items
            WHERE disabled = 0 AND is_stock_item = 1
            ORDER BY item_code
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    /// Deletes an item; its links go with it.
    pub async fn delete(&self, item_code: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE item_code = ?1")
            .bind(item_code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use woosync_core::{Item, ItemWooCommerceServer};

    fn item(code: &str, links: &[(&str, Option<&str>)]) -> Item {
        Item {
            item_code: code.to_string(),
            item_name: format!("{} name", code),
            is_stock_item: true,
            disabled: false,
            variant_of: None,
            woocommerce_servers: links
                .iter()
                .map(|(server, id)| ItemWooCommerceServer {
                    item_code: code.to_string(),
                    woocommerce_server: server.to_string(),
                    woocommerce_id: id.map(String::from),
                    enabled: true,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_keeps_link_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        let it = item("MUG", &[("b.test", Some("2")), ("a.test", None)]);
        repo.upsert(&it).await.unwrap();

        let loaded = repo.get("MUG").await.unwrap().unwrap();
        assert_eq!(loaded, it);
        assert!(repo.get("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_links() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        repo.upsert(&item("MUG", &[("a.test", Some("1"))])).await.unwrap();
        repo.upsert(&item("MUG", &[("b.test", Some("9"))])).await.unwrap();

        let links = repo.links("MUG").await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].woocommerce_server, "b.test");
    }

    #[tokio::test]
    async fn test_enabled_stock_item_codes_pages() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        for code in ["A", "B", "C", "D"] {
            repo.upsert(&item(code, &[])).await.unwrap();
        }
        let mut disabled = item("E", &[]);
        disabled.disabled = true;
        repo.upsert(&disabled).await.unwrap();
        let mut service = item("F", &[]);
        service.is_stock_item = false;
        repo.upsert(&service).await.unwrap();

        assert_eq!(repo.enabled_stock_item_codes(0, 3).await.unwrap(), vec!["A", "B", "C"]);
        assert_eq!(repo.enabled_stock_item_codes(3, 3).await.unwrap(), vec!["D"]);
        assert!(repo.enabled_stock_item_codes(6, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_links() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        repo.upsert(&item("MUG", &[("a.test", Some("1"))])).await.unwrap();
        assert!(repo.delete("MUG").await.unwrap());
        assert!(repo.links("MUG").await.unwrap().is_empty());
    }
}
