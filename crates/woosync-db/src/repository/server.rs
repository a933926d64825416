//! # Server Repository
//!
//! WooCommerce server records. The warehouse list lives in its own table and
//! is loaded alongside every server.

use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use woosync_core::WooCommerceServer;

/// Flat `woocommerce_servers` row.
#[derive(Debug, FromRow)]
struct ServerRow {
    name: String,
    woocommerce_server_url: String,
    api_consumer_key: String,
    api_consumer_secret: String,
    enable_sync: bool,
    enable_stock_level_synchronisation: bool,
    enable_price_list_sync: bool,
    price_list: Option<String>,
    price_list_delay_per_item: f64,
    subtract_reserved_stock: bool,
    enable_tax_lines_sync: bool,
    tax_account: Option<String>,
    f_n_f_tax_account: Option<String>,
}

impl ServerRow {
    fn into_server(self, warehouses: Vec<String>) -> WooCommerceServer {
        WooCommerceServer {
            name: self.name,
            woocommerce_server_url: self.woocommerce_server_url,
            api_consumer_key: self.api_consumer_key,
            api_consumer_secret: self.api_consumer_secret,
            enable_sync: self.enable_sync,
            enable_stock_level_synchronisation: self.enable_stock_level_synchronisation,
            enable_price_list_sync: self.enable_price_list_sync,
            price_list: self.price_list,
            price_list_delay_per_item: self.price_list_delay_per_item,
            subtract_reserved_stock: self.subtract_reserved_stock,
            warehouses,
            enable_tax_lines_sync: self.enable_tax_lines_sync,
            tax_account: self.tax_account,
            f_n_f_tax_account: self.f_n_f_tax_account,
        }
    }
}

const SELECT_SERVER: &str = r#"
    SELECT
        name, woocommerce_server_url, api_consumer_key, api_consumer_secret,
        enable_sync, enable_stock_level_synchronisation, enable_price_list_sync,
        price_list, price_list_delay_per_item, subtract_reserved_stock,
        enable_tax_lines_sync, tax_account, f_n_f_tax_account
    FROM woocommerce_servers
"#;

/// Repository for WooCommerce server records.
#[derive(Debug, Clone)]
pub struct ServerRepository {
    pool: SqlitePool,
}

impl ServerRepository {
    /// Creates a new ServerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ServerRepository { pool }
    }

    /// Every server, ordered by name.
    pub async fn list(&self) -> DbResult<Vec<WooCommerceServer>> {
        let rows: Vec<ServerRow> = sqlx::query_as(&format!("{} ORDER BY name", SELECT_SERVER))
            .fetch_all(&self.pool)
            .await?;

        let mut servers = Vec::with_capacity(rows.len());
        for row in rows {
            let warehouses = self.warehouses(&row.name).await?;
            servers.push(row.into_server(warehouses));
        }
        Ok(servers)
    }

    /// Servers with both `enable_sync` and stock level sync switched on.
    pub async fn list_stock_enabled(&self) -> DbResult<Vec<WooCommerceServer>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(WooCommerceServer::is_stock_sync_enabled)
            .collect())
    }

    /// Servers that take part in price sync (enabled, with a price list).
    pub async fn list_price_enabled(&self) -> DbResult<Vec<WooCommerceServer>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|s| s.price_sync_list().is_some())
            .collect())
    }

    /// Looks up a server by name.
    pub async fn get(&self, name: &str) -> DbResult<Option<WooCommerceServer>> {
        let row: Option<ServerRow> = sqlx::query_as(&format!("{} WHERE name = ?1", SELECT_SERVER))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let warehouses = self.warehouses(&row.name).await?;
                Ok(Some(row.into_server(warehouses)))
            }
            None => Ok(None),
        }
    }

    /// Inserts or replaces a server and its warehouse list.
    pub async fn upsert(&self, server: &WooCommerceServer) -> DbResult<()> {
        debug!(server = %server.name, "Upserting WooCommerce server");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO woocommerce_servers (
                name, woocommerce_server_url, api_consumer_key, api_consumer_secret,
                enable_sync, enable_stock_level_synchronisation, enable_price_list_sync,
                price_list, price_list_delay_per_item, subtract_reserved_stock,
                enable_tax_lines_sync, tax_account, f_n_f_tax_account
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(name) DO UPDATE SET
                woocommerce_server_url = excluded.woocommerce_server_url,
                api_consumer_key = excluded.api_consumer_key,
                api_consumer_secret = excluded.api_consumer_secret,
                enable_sync = excluded.enable_sync,
                enable_stock_level_synchronisation = excluded.enable_stock_level_synchronisation,
                enable_price_list_sync = excluded.enable_price_list_sync,
                price_list = excluded.price_list,
                price_list_delay_per_item = excluded.price_list_delay_per_item,
                subtract_reserved_stock = excluded.subtract_reserved_stock,
                enable_tax_lines_sync = excluded.enable_tax_lines_sync,
                tax_account = excluded.tax_account,
                f_n_f_tax_account = excluded.f_n_f_tax_account
            "#,
        )
        .bind(&server.name)
        .bind(&server.woocommerce_server_url)
        .bind(&server.api_consumer_key)
        .bind(&server.api_consumer_secret)
        .bind(server.enable_sync)
        .bind(server.enable_stock_level_synchronisation)
        .bind(server.enable_price_list_sync)
        .bind(&server.price_list)
        .bind(server.price_list_delay_per_item)
        .bind(server.subtract_reserved_stock)
        .bind(server.enable_tax_lines_sync)
        .bind(&server.tax_account)
        .bind(&server.f_n_f_tax_account)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM woocommerce_server_warehouses WHERE server = ?1")
            .bind(&server.name)
            .execute(&mut *tx)
            .await?;

        for (idx, warehouse) in server.warehouses.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO woocommerce_server_warehouses (server, warehouse, idx)
                VALUES (?1, ?2, ?3)
                "#,
            )
            .bind(&server.name)
            .bind(warehouse)
            .bind(idx as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Deletes a server. Item links to it are kept and reported by the worker.
    pub async fn delete(&self, name: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM woocommerce_servers WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn warehouses(&self, server: &str) -> DbResult<Vec<String>> {
        let warehouses = sqlx::query_scalar(
            "SELECT warehouse FROM woocommerce_server_warehouses WHERE server = ?1 ORDER BY idx",
        )
        .bind(server)
        .fetch_all(&self.pool)
        .await?;
        Ok(warehouses)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use woosync_core::WooCommerceServer;

    fn server(name: &str) -> WooCommerceServer {
        let mut s = WooCommerceServer::new(name, format!("https://{}", name));
        s.enable_sync = true;
        s.enable_stock_level_synchronisation = true;
        s.api_consumer_key = "ck".into();
        s.api_consumer_secret = "cs".into();
        s.warehouses = vec!["Stores - CO".into(), "Finished Goods - CO".into()];
        s
    }

    #[tokio::test]
    async fn test_upsert_and_get_round_trips_warehouses() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.servers();

        let s = server("shop.test");
        repo.upsert(&s).await.unwrap();

        let loaded = repo.get("shop.test").await.unwrap().unwrap();
        assert_eq!(loaded, s);
        assert!(repo.get("missing.test").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_warehouses() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.servers();

        let mut s = server("shop.test");
        repo.upsert(&s).await.unwrap();

        s.warehouses = vec!["Outlet - CO".into()];
        s.subtract_reserved_stock = true;
        repo.upsert(&s).await.unwrap();

        let loaded = repo.get("shop.test").await.unwrap().unwrap();
        assert_eq!(loaded.warehouses, vec!["Outlet - CO".to_string()]);
        assert!(loaded.subtract_reserved_stock);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_enabled_filters() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.servers();

        let stock = server("stock.test");
        let mut price = server("price.test");
        price.enable_stock_level_synchronisation = false;
        price.enable_price_list_sync = true;
        price.price_list = Some("Standard Selling".into());
        let mut off = server("off.test");
        off.enable_sync = false;

        for s in [&stock, &price, &off] {
            repo.upsert(s).await.unwrap();
        }

        let names: Vec<_> = repo
            .list_stock_enabled()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["stock.test"]);

        let names: Vec<_> = repo
            .list_price_enabled()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["price.test"]);

        assert!(repo.delete("off.test").await.unwrap());
        assert!(!repo.delete("off.test").await.unwrap());
    }
}
