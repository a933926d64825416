//! # Item Price Repository
//!
//! Item prices, and the join that decides which prices a server receives.
//!
//! ## Eligible prices
//! ```text
//! item_prices ip ──item_code──► items i            (i.disabled = 0)
//!        │
//!        └──item_code──► item_woocommerce_servers l (l.woocommerce_server = ?,
//!                                                    l.enabled = 1,
//!                                                    l.woocommerce_id set)
//! WHERE ip.price_list = <server's price list>
//!   AND (no item filter OR ip.item_code = ?)
//! ```

use sqlx::SqlitePool;

use crate::error::DbResult;
use woosync_core::{EligiblePrice, ItemPrice};

/// Repository for item prices.
#[derive(Debug, Clone)]
pub struct ItemPriceRepository {
    pool: SqlitePool,
}

impl ItemPriceRepository {
    /// Creates a new ItemPriceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemPriceRepository { pool }
    }

    /// Looks up a price record by name.
    pub async fn get(&self, name: &str) -> DbResult<Option<ItemPrice>> {
        let price = sqlx::query_as(
            r#"
            SELECT name, item_code, price_list, price_list_rate
            FROM item_prices
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(price)
    }

    /// Inserts or replaces a price record.
    pub async fn upsert(&self, price: &ItemPrice) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_prices (name, item_code, price_list, price_list_rate)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO UPDATE SET
                item_code = excluded.item_code,
                price_list = excluded.price_list,
                price_list_rate = excluded.price_list_rate
            "#,
        )
        .bind(&price.name)
        .bind(&price.item_code)
        .bind(&price.price_list)
        .bind(price.price_list_rate)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Prices on `price_list` for items linked to `server`.
    ///
    /// ## Arguments
    /// * `server` - server name the link must point at
    /// * `price_list` - the server's price list
    /// * `item_code` - restrict to one item, or `None` for the whole catalog
    ///
    /// Rows come back ordered by item code, then price name.
    pub async fn eligible_for_server(
        &self,
        server: &str,
        price_list: &str,
        item_code: Option<&str>,
    ) -> DbResult<Vec<EligiblePrice>> {
        let rows = sqlx::query_as(
            r#"
            SELECT
                ip.name AS name,
                ip.item_code AS item_code,
                ip.price_list_rate AS price_list_rate,
                l.woocommerce_server AS woocommerce_server,
                TRIM(l.woocommerce_id) AS woocommerce_id,
                i.variant_of AS variant_of
            FROM item_prices ip
            INNER JOIN items i ON i.item_code = ip.item_code
            INNER JOIN item_woocommerce_servers l ON l.item_code = ip.item_code
            WHERE ip.price_list = ?1
              AND l.woocommerce_server = ?2
              AND l.enabled = 1
              AND l.woocommerce_id IS NOT NULL
              AND TRIM(l.woocommerce_id) != ''
              AND i.disabled = 0
              AND (?3 IS NULL OR ip.item_code = ?3)
            ORDER BY ip.item_code, ip.name
            "#,
        )
        .bind(price_list)
        .bind(server)
        .bind(item_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use woosync_core::{Item, ItemPrice, ItemWooCommerceServer};

    fn item(code: &str, server: &str, id: Option<&str>, enabled: bool) -> Item {
        Item {
            item_code: code.to_string(),
            item_name: code.to_string(),
            is_stock_item: true,
            disabled: false,
            variant_of: None,
            woocommerce_servers: vec![ItemWooCommerceServer {
                item_code: code.to_string(),
                woocommerce_server: server.to_string(),
                woocommerce_id: id.map(String::from),
                enabled,
            }],
        }
    }

    fn price(code: &str, list: &str, rate: f64) -> ItemPrice {
        ItemPrice {
            name: format!("{}-{}", code, list),
            item_code: code.to_string(),
            price_list: list.to_string(),
            price_list_rate: rate,
        }
    }

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.items().upsert(&item("A", "shop.test", Some("1"), true)).await.unwrap();
        db.items().upsert(&item("B", "shop.test", Some(" 2 "), true)).await.unwrap();
        db.items().upsert(&item("NOID", "shop.test", None, true)).await.unwrap();
        db.items().upsert(&item("OFF", "shop.test", Some("4"), false)).await.unwrap();
        db.items().upsert(&item("ELSEWHERE", "other.test", Some("5"), true)).await.unwrap();

        let mut disabled = item("DIS", "shop.test", Some("6"), true);
        disabled.disabled = true;
        db.items().upsert(&disabled).await.unwrap();

        for code in ["A", "B", "NOID", "OFF", "ELSEWHERE", "DIS"] {
            db.item_prices().upsert(&price(code, "Standard Selling", 10.0)).await.unwrap();
        }
        db.item_prices().upsert(&price("A", "Wholesale", 8.0)).await.unwrap();

        db
    }

    #[tokio::test]
    async fn test_eligible_prices_filter_links_and_lists() {
        let db = seeded().await;

        let rows = db
            .item_prices()
            .eligible_for_server("shop.test", "Standard Selling", None)
            .await
            .unwrap();

        let codes: Vec<_> = rows.iter().map(|r| r.item_code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B"]);
        assert_eq!(rows[1].woocommerce_id, "2");
        assert_eq!(rows[0].price_list_rate, 10.0);
    }

    #[tokio::test]
    async fn test_eligible_prices_for_one_item() {
        let db = seeded().await;

        let rows = db
            .item_prices()
            .eligible_for_server("shop.test", "Wholesale", Some("A"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price_list_rate, 8.0);

        let rows = db
            .item_prices()
            .eligible_for_server("shop.test", "Standard Selling", Some("B"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_code, "B");
    }

    #[tokio::test]
    async fn test_get_and_upsert() {
        let db = seeded().await;
        let repo = db.item_prices();

        let mut p = repo.get("A-Standard Selling").await.unwrap().unwrap();
        p.price_list_rate = 12.5;
        repo.upsert(&p).await.unwrap();

        assert_eq!(repo.get("A-Standard Selling").await.unwrap(), Some(p));
        assert_eq!(repo.get("missing").await.unwrap(), None);
    }
}
