//! # Error Types
//!
//! Domain-specific error types for woosync-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  woosync-core errors (this file)                                       │
//! │  ├── CoreError        - Domain errors (bad remote data, bad config)    │
//! │  └── ValidationError  - Server configuration validation failures      │
//! │                                                                         │
//! │  woosync-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  woosync-sync errors (separate crate)                                  │
//! │  └── SyncError        - Remote calls, queue, cache, config loading     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → error log             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Note that most "nothing to do" situations (no enabled server, no remote id,
//! no parent link for a variant) are NOT errors. They are skips and are
//! reported through [`crate::stock::SkipReason`].

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The remote product carried a `regular_price` that is not a number.
    ///
    /// ## When This Occurs
    /// - A shop plugin writes a formatted price ("€ 19,99") into the field
    /// - The field holds an object or array instead of a string/number
    #[error("Remote price is not numeric: {value}")]
    InvalidRemotePrice { value: String },

    /// A price-list rate cannot be pushed (NaN or infinite).
    #[error("Price list rate for {item_code} is not a finite number")]
    InvalidRate { item_code: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Value exceeds its upper bound.
    #[error("{field} must not exceed {max}")]
    TooLarge { field: String, max: String },

    /// Invalid format (e.g., invalid URL).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidRemotePrice {
            value: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Remote price is not numeric: abc");

        let err = ValidationError::Required {
            field: "api_consumer_key".to_string(),
        };
        assert_eq!(err.to_string(), "api_consumer_key is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Negative {
            field: "price_list_delay_per_item".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
