//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Remote        │  │     Payload             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  RequestFailed  │  │  InvalidResponse        │ │
//! │  │  InvalidUrl     │  │  HttpStatus     │  │  SerializationFailed    │ │
//! │  │  ConfigLoad     │  │  Timeout        │  │  Domain                 │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Database     │  │     Queue       │  │      Cache              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  DatabaseError  │  │  QueueClosed    │  │  CacheError             │ │
//! │  │                 │  │  JobTimedOut    │  │                         │ │
//! │  │                 │  │  JobPanicked    │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here is fatal to the worker: job runners log the error and move
//! on to the next item, row or job.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid worker configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid WooCommerce or cache URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("Request to {url} failed: {message}")]
    RequestFailed { url: String, message: String },

    /// The store answered with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus { status: u16, url: String, body: String },

    /// The request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // Payload Errors
    // =========================================================================
    /// The store answered 2xx with a body we could not use.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Failed to serialize or deserialize JSON.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// A domain rule rejected the data.
    #[error("Domain error: {0}")]
    Domain(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Database query failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    // =========================================================================
    // Queue / Cache Errors
    // =========================================================================
    /// The named queue no longer accepts jobs.
    #[error("Queue '{0}' is closed")]
    QueueClosed(String),

    /// A job ran past its timeout and was cancelled.
    #[error("Job {job} timed out after {secs} seconds")]
    JobTimedOut { job: String, secs: u64 },

    /// A job panicked. The worker that ran it keeps going.
    #[error("Job {job} panicked: {message}")]
    JobPanicked { job: String, message: String },

    /// Cache backend failure.
    #[error("Cache error: {0}")]
    CacheError(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<woosync_db::DbError> for SyncError {
    fn from(err: woosync_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<woosync_core::CoreError> for SyncError {
    fn from(err: woosync_core::CoreError) -> Self {
        SyncError::Domain(err.to_string())
    }
}

impl From<woosync_core::ValidationError> for SyncError {
    fn from(err: woosync_core::ValidationError) -> Self {
        SyncError::Domain(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else {
            SyncError::RequestFailed {
                url,
                message: err.to_string(),
            }
        }
    }
}

impl From<redis::RedisError> for SyncError {
    fn from(err: redis::RedisError) -> Self {
        SyncError::CacheError(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidUrl("x".into()).is_config_error());
        assert!(!SyncError::QueueClosed("long".into()).is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::HttpStatus {
            status: 500,
            url: "https://shop.test/wp-json/wc/v3/products/1".into(),
            body: "oops".into(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("products/1"));
    }

    #[test]
    fn test_db_error_conversion() {
        let err: SyncError = woosync_db::DbError::not_found("Item", "X").into();
        assert!(matches!(err, SyncError::DatabaseError(_)));
    }
}
