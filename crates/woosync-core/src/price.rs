//! # Price Decisions
//!
//! Pure functions behind the price synchroniser.
//!
//! ## Per-row decision
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EligiblePrice row (item, rate from storage)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  effective rate = PriceChange.rate   if change.item == row.item and    │
//! │                                         change.price_list == server's   │
//! │                   row.price_list_rate otherwise                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  remote = regular_price coerced to a number                            │
//! │           null / "" / missing / false  →  0                             │
//! │           "19.99"                      →  19.99                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  write only when remote ≠ effective rate                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! WooCommerce stores prices as decimal strings, so values are compared after
//! parsing, never as text: `"19.990"` and `19.99` are the same price.

use serde_json::Value;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::types::{EligiblePrice, PriceChange};

/// Two prices closer than this are considered equal.
///
/// Rates are stored as doubles on both sides. Anything below a millionth of
/// a currency unit is representation noise, not a price change.
pub const PRICE_EPSILON: f64 = 1e-6;

/// Upper bound of a server's `price_list_delay_per_item` (seconds).
pub const MAX_ITEM_DELAY_SECS: f64 = 300.0;

/// Coerces a remote `regular_price` to a number.
///
/// ## Rules
/// - `null`, missing, `""`, whitespace, `false` → `0.0`
/// - numeric strings and JSON numbers → their value
/// - anything else → [`CoreError::InvalidRemotePrice`]
pub fn parse_remote_price(value: Option<&Value>) -> CoreResult<f64> {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(0.0),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| CoreError::InvalidRemotePrice {
            value: n.to_string(),
        }),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(0.0);
            }
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| CoreError::InvalidRemotePrice { value: s.to_string() })
        }
        Some(other) => Err(CoreError::InvalidRemotePrice {
            value: other.to_string(),
        }),
    }
}

/// The rate to push for `row` on a server tied to `server_price_list`.
pub fn effective_rate(row: &EligiblePrice, server_price_list: &str, change: Option<&PriceChange>) -> f64 {
    match change {
        Some(change) if change.item_code == row.item_code && change.price_list == server_price_list => {
            change.price_list_rate
        }
        _ => row.price_list_rate,
    }
}

/// True when the remote price must be overwritten.
#[inline]
pub fn prices_differ(remote: f64, rate: f64) -> bool {
    (remote - rate).abs() > PRICE_EPSILON
}

/// Decides the write for one row.
///
/// ## Returns
/// * `Ok(Some(rate))` - remote differs, push `rate`
/// * `Ok(None)` - remote already matches
/// * `Err(_)` - remote price unreadable or rate not finite
pub fn decide_price_update(
    row: &EligiblePrice,
    server_price_list: &str,
    change: Option<&PriceChange>,
    remote_regular_price: Option<&Value>,
) -> CoreResult<Option<f64>> {
    let rate = effective_rate(row, server_price_list, change);
    if !rate.is_finite() {
        return Err(CoreError::InvalidRate {
            item_code: row.item_code.clone(),
        });
    }

    let remote = parse_remote_price(remote_regular_price)?;
    Ok(prices_differ(remote, rate).then_some(rate))
}

/// Formats a rate the way WooCommerce stores it: a plain decimal string.
///
/// ## Example
/// ```rust
/// use woosync_core::price::format_price;
///
/// assert_eq!(format_price(19.99), "19.99");
/// assert_eq!(format_price(20.0), "20");
/// assert_eq!(format_price(0.1 + 0.2), "0.3");
/// ```
pub fn format_price(rate: f64) -> String {
    let fixed = format!("{:.6}", rate);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Pause between two price pushes on one server.
///
/// Non-finite and non-positive delays mean no pause; anything above
/// [`MAX_ITEM_DELAY_SECS`] is capped.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use woosync_core::price::item_delay;
///
/// assert_eq!(item_delay(0.5), Duration::from_millis(500));
/// assert_eq!(item_delay(1e20), Duration::from_secs(300));
/// assert_eq!(item_delay(f64::NAN), Duration::ZERO);
/// ```
pub fn item_delay(secs: f64) -> Duration {
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs.min(MAX_ITEM_DELAY_SECS)).unwrap_or(Duration::ZERO)
}

/// Splits eligible rows into fixed-size batches (last one may be short).
///
/// A `size` of zero is treated as one, so every row still lands in a batch.
pub fn batch_rows(rows: Vec<EligiblePrice>, size: usize) -> Vec<Vec<EligiblePrice>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(rows.len().div_ceil(size));
    let mut rows = rows.into_iter().peekable();

    while rows.peek().is_some() {
        batches.push(rows.by_ref().take(size).collect());
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(item: &str, rate: f64) -> EligiblePrice {
        EligiblePrice {
            name: format!("IP-{}", item),
            item_code: item.to_string(),
            price_list_rate: rate,
            woocommerce_server: "shop.test".into(),
            woocommerce_id: "10".into(),
            variant_of: None,
        }
    }

    #[test]
    fn test_parse_remote_price() {
        assert_eq!(parse_remote_price(None).unwrap(), 0.0);
        assert_eq!(parse_remote_price(Some(&json!(null))).unwrap(), 0.0);
        assert_eq!(parse_remote_price(Some(&json!(""))).unwrap(), 0.0);
        assert_eq!(parse_remote_price(Some(&json!(false))).unwrap(), 0.0);
        assert_eq!(parse_remote_price(Some(&json!("19.99"))).unwrap(), 19.99);
        assert_eq!(parse_remote_price(Some(&json!(" 5 "))).unwrap(), 5.0);
        assert_eq!(parse_remote_price(Some(&json!(12.5))).unwrap(), 12.5);

        assert!(parse_remote_price(Some(&json!("abc"))).is_err());
        assert!(parse_remote_price(Some(&json!({"amount": 1}))).is_err());
    }

    #[test]
    fn test_matching_price_is_not_written() {
        let r = row("X", 19.99);
        let decision = decide_price_update(&r, "Standard Selling", None, Some(&json!("19.99"))).unwrap();
        assert_eq!(decision, None);
    }

    #[test]
    fn test_mismatching_price_is_written() {
        let r = row("X", 19.99);
        let decision = decide_price_update(&r, "Standard Selling", None, Some(&json!("20.00"))).unwrap();
        assert_eq!(decision, Some(19.99));
    }

    #[test]
    fn test_empty_remote_price_counts_as_zero() {
        let r = row("X", 0.0);
        assert_eq!(decide_price_update(&r, "Standard Selling", None, Some(&json!(""))).unwrap(), None);

        let r = row("X", 3.0);
        assert_eq!(
            decide_price_update(&r, "Standard Selling", None, Some(&json!(""))).unwrap(),
            Some(3.0)
        );
    }

    #[test]
    fn test_price_change_wins_only_when_it_matches() {
        let r = row("X", 10.0);
        let change = PriceChange {
            item_code: "X".into(),
            price_list: "Standard Selling".into(),
            price_list_rate: 12.0,
        };
        assert_eq!(effective_rate(&r, "Standard Selling", Some(&change)), 12.0);
        assert_eq!(effective_rate(&r, "Wholesale", Some(&change)), 10.0);

        let other_item = PriceChange {
            item_code: "Y".into(),
            ..change
        };
        assert_eq!(effective_rate(&r, "Standard Selling", Some(&other_item)), 10.0);
    }

    #[test]
    fn test_non_finite_rate_is_rejected() {
        let r = row("X", f64::NAN);
        assert!(matches!(
            decide_price_update(&r, "Standard Selling", None, None),
            Err(CoreError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(19.99), "19.99");
        assert_eq!(format_price(20.0), "20");
        assert_eq!(format_price(0.0), "0");
        assert_eq!(format_price(1234.5), "1234.5");
    }

    #[test]
    fn test_batch_rows() {
        let rows: Vec<_> = (0..5).map(|i| row(&format!("I{}", i), 1.0)).collect();

        let batches = batch_rows(rows.clone(), 2);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert_eq!(batches[2][0].item_code, "I4");

        assert_eq!(batch_rows(rows.clone(), 0).len(), 5);
        assert_eq!(batch_rows(Vec::new(), 10).len(), 0);
    }
}
