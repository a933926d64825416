//! # Validation Module
//!
//! Checks an administrator-edited server record before sync code trusts it.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: ERP form (mandatory fields, checkboxes)                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - rules that only matter when sync is on         │
//! │  ├── URL is http(s)                                                    │
//! │  ├── credentials present                                               │
//! │  ├── price delay within 0..=300 s                                      │
//! │  └── price list present when price sync is on                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (NOT NULL, UNIQUE, foreign keys)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use woosync_core::types::WooCommerceServer;
//! use woosync_core::validation::validate_server;
//!
//! let server = WooCommerceServer::new("shop.test", "https://shop.test");
//! validate_server(&server).unwrap();
//! ```

use url::Url;

use crate::error::ValidationError;
use crate::price::MAX_ITEM_DELAY_SECS;
use crate::types::WooCommerceServer;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates an item code.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - Must not contain `/` (item codes travel in URL paths)
pub fn validate_item_code(code: &str) -> ValidationResult<()> {
    if code.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "item_code".to_string(),
        });
    }

    if code.contains('/') {
        return Err(ValidationError::InvalidFormat {
            field: "item_code".to_string(),
            reason: "must not contain '/'".to_string(),
        });
    }

    Ok(())
}

/// Validates a server URL.
///
/// ## Rules
/// - Must parse as an absolute URL
/// - Scheme must be `http` or `https`
pub fn validate_server_url(url: &str) -> ValidationResult<()> {
    if url.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "woocommerce_server_url".to_string(),
        });
    }

    let parsed = Url::parse(url.trim()).map_err(|e| ValidationError::InvalidFormat {
        field: "woocommerce_server_url".to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidFormat {
            field: "woocommerce_server_url".to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates a server record.
///
/// Credentials and the price list are only required when the feature that
/// needs them is switched on, so a half-configured, disabled server is valid.
pub fn validate_server(server: &WooCommerceServer) -> ValidationResult<()> {
    if server.name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    validate_server_url(&server.woocommerce_server_url)?;

    if server.price_list_delay_per_item < 0.0 || !server.price_list_delay_per_item.is_finite() {
        return Err(ValidationError::Negative {
            field: "price_list_delay_per_item".to_string(),
        });
    }

    if server.price_list_delay_per_item > MAX_ITEM_DELAY_SECS {
        return Err(ValidationError::TooLarge {
            field: "price_list_delay_per_item".to_string(),
            max: format!("{} seconds", MAX_ITEM_DELAY_SECS),
        });
    }

    if !server.enable_sync {
        return Ok(());
    }

    if server.api_consumer_key.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "api_consumer_key".to_string(),
        });
    }

    if server.api_consumer_secret.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "api_consumer_secret".to_string(),
        });
    }

    if server.enable_price_list_sync && server.price_sync_list().is_none() {
        return Err(ValidationError::Required {
            field: "price_list".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_server() -> WooCommerceServer {
        let mut s = WooCommerceServer::new("shop.test", "https://shop.test");
        s.enable_sync = true;
        s.api_consumer_key = "ck_123".into();
        s.api_consumer_secret = "cs_456".into();
        s
    }

    #[test]
    fn test_validate_item_code() {
        assert!(validate_item_code("TSHIRT-RED-M").is_ok());
        assert!(validate_item_code("").is_err());
        assert!(validate_item_code("   ").is_err());
        assert!(validate_item_code("a/b").is_err());
    }

    #[test]
    fn test_validate_server_url() {
        assert!(validate_server_url("https://shop.test").is_ok());
        assert!(validate_server_url("http://localhost:8080/wp").is_ok());
        assert!(validate_server_url("").is_err());
        assert!(validate_server_url("shop.test").is_err());
        assert!(validate_server_url("ftp://shop.test").is_err());
    }

    #[test]
    fn test_disabled_server_needs_no_credentials() {
        let s = WooCommerceServer::new("shop.test", "https://shop.test");
        assert!(validate_server(&s).is_ok());
    }

    #[test]
    fn test_enabled_server_needs_credentials() {
        let mut s = enabled_server();
        assert!(validate_server(&s).is_ok());

        s.api_consumer_secret.clear();
        assert!(validate_server(&s).is_err());
    }

    #[test]
    fn test_price_sync_needs_price_list() {
        let mut s = enabled_server();
        s.enable_price_list_sync = true;
        assert!(validate_server(&s).is_err());

        s.price_list = Some("Standard Selling".into());
        assert!(validate_server(&s).is_ok());
    }

    #[test]
    fn test_negative_delay_is_rejected() {
        let mut s = enabled_server();
        s.price_list_delay_per_item = -1.0;
        assert!(validate_server(&s).is_err());
    }

    #[test]
    fn test_oversized_delay_is_rejected() {
        let mut s = enabled_server();
        s.price_list_delay_per_item = MAX_ITEM_DELAY_SECS;
        assert!(validate_server(&s).is_ok());

        s.price_list_delay_per_item = 1e20;
        assert!(matches!(
            validate_server(&s),
            Err(ValidationError::TooLarge { .. })
        ));
    }
}
