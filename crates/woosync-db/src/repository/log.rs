//! # Worker Logs
//!
//! Two append-only tables the worker writes while it runs:
//!
//! - `woocommerce_request_log`: one row per HTTP call to a WooCommerce
//!   server, pruned by the scheduler after a retention period
//! - `error_log`: one row per failed job or failed item, for the operator

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use woosync_core::{ErrorLogEntry, RequestLogEntry};

// =============================================================================
// Request Log
// =============================================================================

/// Repository for the WooCommerce request log.
#[derive(Debug, Clone)]
pub struct RequestLogRepository {
    pool: SqlitePool,
}

impl RequestLogRepository {
    /// Creates a new RequestLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RequestLogRepository { pool }
    }

    /// Appends a request log row.
    pub async fn insert(&self, entry: &RequestLogEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO woocommerce_request_log (
                id, method, url, endpoint, request_body,
                status_code, response_body, error, elapsed_ms, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.method)
        .bind(&entry.url)
        .bind(&entry.endpoint)
        .bind(&entry.request_body)
        .bind(entry.status_code)
        .bind(&entry.response_body)
        .bind(&entry.error)
        .bind(entry.elapsed_ms)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent rows first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<RequestLogEntry>> {
        let entries = sqlx::query_as(
            r#"
            SELECT id, method, url, endpoint, request_body,
                   status_code, response_body, error, elapsed_ms, created_at
            FROM woocommerce_request_log
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Deletes rows older than `days` days and returns how many went.
    pub async fn delete_older_than(&self, days: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));

        let result = sqlx::query("DELETE FROM woocommerce_request_log WHERE created_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        debug!(days, deleted = result.rows_affected(), "Pruned request log");
        Ok(result.rows_affected())
    }

    /// Number of rows in the log.
    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM woocommerce_request_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Error Log
// =============================================================================

/// Repository for the operator-facing error log.
#[derive(Debug, Clone)]
pub struct ErrorLogRepository {
    pool: SqlitePool,
}

impl ErrorLogRepository {
    /// Creates a new ErrorLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ErrorLogRepository { pool }
    }

    /// Records an error.
    ///
    /// ## Example
    /// ```rust,ignore
    /// db.error_log()
    ///     .insert("WooCommerce Stock Sync Error", "products/57: HTTP 500")
    ///     .await?;
    /// ```
    pub async fn insert(&self, title: &str, message: &str) -> DbResult<ErrorLogEntry> {
        let entry = ErrorLogEntry {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO error_log (id, title, message, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&entry.id)
            .bind(&entry.title)
            .bind(&entry.message)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Most recent errors first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<ErrorLogEntry>> {
        let entries = sqlx::query_as(
            r#"
            SELECT id, title, message, created_at
            FROM error_log
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Number of recorded errors.
    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM error_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
