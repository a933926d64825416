//! # Domain Types
//!
//! Records WooSync reads from the ERP side, plus the few values it derives.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌────────────────────┐        ┌──────────────────────────┐            │
//! │  │ WooCommerceServer  │◄───────│ ItemWooCommerceServer    │            │
//! │  │ ────────────────── │  link  │ ──────────────────────── │            │
//! │  │ name (domain)      │        │ item_code                │            │
//! │  │ enable_* toggles   │        │ woocommerce_server       │            │
//! │  │ warehouses[]       │        │ woocommerce_id           │            │
//! │  │ price_list         │        │ enabled                  │            │
//! │  └────────────────────┘        └────────────▲─────────────┘            │
//! │                                             │ woocommerce_servers[]     │
//! │  ┌────────────────────┐        ┌────────────┴─────────────┐            │
//! │  │ Bin                │───────►│ Item                     │            │
//! │  │ warehouse          │ item   │ is_stock_item, disabled  │            │
//! │  │ actual/reserved    │        │ variant_of (parent item) │            │
//! │  └────────────────────┘        └──────────────────────────┘            │
//! │                                                                         │
//! │  ┌────────────────────┐        ┌──────────────────────────┐            │
//! │  │ ItemPrice          │        │ StockDocument            │            │
//! │  │ item, price list,  │        │ doctype, rows[] with     │            │
//! │  │ rate               │        │ warehouse / s_ / t_      │            │
//! │  └────────────────────┘        └──────────────────────────┘            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! ERP records are keyed by their business name (`item_code`, server domain,
//! price entry name). WooCommerce ids are opaque strings because the ERP
//! stores them as `Data` fields.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

// =============================================================================
// Check fields
// =============================================================================

/// Reads an ERP check field. The ERP sends `0`/`1` (sometimes as strings);
/// our own serializer writes booleans.
fn deserialize_check<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Check {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Check::deserialize(deserializer)? {
        Check::Bool(value) => Ok(value),
        Check::Int(0) => Ok(false),
        Check::Int(1) => Ok(true),
        Check::Int(other) => Err(de::Error::custom(format!("check field must be 0 or 1, got {}", other))),
        Check::Text(text) => match text.trim() {
            "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            other => Err(de::Error::custom(format!("check field must be 0 or 1, got {:?}", other))),
        },
    }
}

// =============================================================================
// WooCommerce Server
// =============================================================================

/// A configured storefront connection.
///
/// Created and edited by an administrator. Sync code only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WooCommerceServer {
    /// Server domain, used as the record name (e.g. `shop.example.com`).
    pub name: String,

    /// Base URL of the WordPress site.
    pub woocommerce_server_url: String,

    /// REST API consumer key.
    pub api_consumer_key: String,

    /// REST API consumer secret.
    pub api_consumer_secret: String,

    /// Master toggle for everything this server does.
    #[serde(deserialize_with = "deserialize_check")]
    pub enable_sync: bool,

    /// Push stock levels to this server.
    #[serde(deserialize_with = "deserialize_check")]
    pub enable_stock_level_synchronisation: bool,

    /// Push price-list rates to this server.
    #[serde(deserialize_with = "deserialize_check")]
    pub enable_price_list_sync: bool,

    /// The price list whose rates are pushed.
    pub price_list: Option<String>,

    /// Seconds to wait between consecutive price pushes.
    pub price_list_delay_per_item: f64,

    /// Subtract reserved quantity from on-hand quantity.
    #[serde(deserialize_with = "deserialize_check")]
    pub subtract_reserved_stock: bool,

    /// Warehouses that count towards this server's stock figures.
    pub warehouses: Vec<String>,

    /// Sync tax lines on orders.
    #[serde(deserialize_with = "deserialize_check")]
    pub enable_tax_lines_sync: bool,

    /// Account head for order tax lines.
    pub tax_account: Option<String>,

    /// Account head for shipping ("freight and forwarding") tax.
    pub f_n_f_tax_account: Option<String>,
}

impl WooCommerceServer {
    /// Creates a server with every toggle off and no warehouses.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        WooCommerceServer {
            name: name.into(),
            woocommerce_server_url: url.into(),
            api_consumer_key: String::new(),
            api_consumer_secret: String::new(),
            enable_sync: false,
            enable_stock_level_synchronisation: false,
            enable_price_list_sync: false,
            price_list: None,
            price_list_delay_per_item: 0.0,
            subtract_reserved_stock: false,
            warehouses: Vec::new(),
            enable_tax_lines_sync: false,
            tax_account: None,
            f_n_f_tax_account: None,
        }
    }

    /// True when both the master toggle and stock sync are on.
    #[inline]
    pub fn is_stock_sync_enabled(&self) -> bool {
        self.enable_sync && self.enable_stock_level_synchronisation
    }

    /// Returns the price list to push when price sync is fully configured.
    pub fn price_sync_list(&self) -> Option<&str> {
        if !(self.enable_sync && self.enable_price_list_sync) {
            return None;
        }
        self.price_list.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// True when `warehouse` is one of this server's synced warehouses.
    pub fn syncs_warehouse(&self, warehouse: &str) -> bool {
        self.warehouses.iter().any(|w| w == warehouse)
    }
}

// =============================================================================
// Item ↔ WooCommerce link
// =============================================================================

/// Per-item, per-server link to a remote product or variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ItemWooCommerceServer {
    /// The ERP item this link belongs to.
    pub item_code: String,

    /// Server name (domain).
    pub woocommerce_server: String,

    /// Remote product id, or variation id for variants.
    pub woocommerce_id: Option<String>,

    /// Link-level toggle.
    #[serde(deserialize_with = "deserialize_check")]
    pub enabled: bool,
}

impl ItemWooCommerceServer {
    /// The remote id, when present and non-blank.
    pub fn remote_id(&self) -> Option<&str> {
        self.woocommerce_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

// =============================================================================
// Item
// =============================================================================

/// An ERP item with its WooCommerce links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_code: String,
    pub item_name: String,
    #[serde(deserialize_with = "deserialize_check")]
    pub is_stock_item: bool,
    #[serde(deserialize_with = "deserialize_check")]
    pub disabled: bool,

    /// Template item this item is a variant of.
    pub variant_of: Option<String>,

    pub woocommerce_servers: Vec<ItemWooCommerceServer>,
}

impl Item {
    /// Returns this item's link to `server`, if any.
    pub fn link_for(&self, server: &str) -> Option<&ItemWooCommerceServer> {
        self.woocommerce_servers
            .iter()
            .find(|link| link.woocommerce_server == server)
    }

    #[inline]
    pub fn is_variant(&self) -> bool {
        self.variant_of.is_some()
    }
}

// =============================================================================
// Bin
// =============================================================================

/// Per-item, per-warehouse stock record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Bin {
    pub item_code: String,
    pub warehouse: String,
    pub actual_qty: f64,
    pub reserved_qty: f64,
}

// =============================================================================
// Prices
// =============================================================================

/// An ERP price-list entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ItemPrice {
    pub name: String,
    pub item_code: String,
    pub price_list: String,
    pub price_list_rate: f64,
}

/// A just-written price entry, carried from the hook into the worker.
///
/// The worker prefers this over the stored rate when item and price list
/// match, because the stored row may not be visible yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub item_code: String,
    pub price_list: String,
    pub price_list_rate: f64,
}

impl From<&ItemPrice> for PriceChange {
    fn from(price: &ItemPrice) -> Self {
        PriceChange {
            item_code: price.item_code.clone(),
            price_list: price.price_list.clone(),
            price_list_rate: price.price_list_rate,
        }
    }
}

/// A price entry that is eligible for push to one server.
///
/// Result row of the price/link/item join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct EligiblePrice {
    /// Price entry name.
    pub name: String,
    pub item_code: String,
    pub price_list_rate: f64,
    pub woocommerce_server: String,
    pub woocommerce_id: String,

    /// Parent item, for variants.
    pub variant_of: Option<String>,
}

// =============================================================================
// Stock-affecting documents
// =============================================================================

/// Document types whose save/submit can move stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "Stock Entry")]
    StockEntry,
    #[serde(rename = "Stock Reconciliation")]
    StockReconciliation,
    #[serde(rename = "Sales Invoice")]
    SalesInvoice,
    #[serde(rename = "Delivery Note")]
    DeliveryNote,
    /// Anything else. Never triggers a stock sync.
    #[serde(other)]
    Other,
}

impl DocumentType {
    /// True for the doctypes the stock hook listens to.
    pub const fn is_stock_affecting(&self) -> bool {
        !matches!(self, DocumentType::Other)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentType::StockEntry => write!(f, "Stock Entry"),
            DocumentType::StockReconciliation => write!(f, "Stock Reconciliation"),
            DocumentType::SalesInvoice => write!(f, "Sales Invoice"),
            DocumentType::DeliveryNote => write!(f, "Delivery Note"),
            DocumentType::Other => write!(f, "Other"),
        }
    }
}

/// One line of a stock-affecting document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRow {
    pub item_code: String,

    /// Plain warehouse (invoices, delivery notes, reconciliations).
    #[serde(default)]
    pub warehouse: Option<String>,

    /// Source warehouse (stock entries).
    #[serde(default)]
    pub s_warehouse: Option<String>,

    /// Target warehouse (stock entries).
    #[serde(default)]
    pub t_warehouse: Option<String>,
}

/// A saved or submitted stock-affecting document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDocument {
    pub doctype: DocumentType,
    pub name: String,

    /// Only meaningful for sales invoices: did the invoice move stock?
    #[serde(default = "default_update_stock", deserialize_with = "deserialize_check")]
    pub update_stock: bool,

    pub items: Vec<DocumentRow>,
}

fn default_update_stock() -> bool {
    true
}

// =============================================================================
// Logs
// =============================================================================

/// One recorded WooCommerce request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RequestLogEntry {
    pub id: String,
    pub method: String,
    pub url: String,
    pub endpoint: String,
    pub request_body: Option<String>,
    pub status_code: Option<i64>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub elapsed_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// A persisted sync failure, readable by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ErrorLogEntry {
    pub id: String,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_sync_list_requires_all_toggles() {
        let mut server = WooCommerceServer::new("shop.test", "https://shop.test");
        server.price_list = Some("Standard Selling".into());
        assert_eq!(server.price_sync_list(), None);

        server.enable_sync = true;
        assert_eq!(server.price_sync_list(), None);

        server.enable_price_list_sync = true;
        assert_eq!(server.price_sync_list(), Some("Standard Selling"));

        server.price_list = Some("  ".into());
        assert_eq!(server.price_sync_list(), None);
    }

    #[test]
    fn test_remote_id_ignores_blank() {
        let mut link = ItemWooCommerceServer {
            item_code: "A".into(),
            woocommerce_server: "shop.test".into(),
            woocommerce_id: Some(" ".into()),
            enabled: true,
        };
        assert_eq!(link.remote_id(), None);

        link.woocommerce_id = Some("42".into());
        assert_eq!(link.remote_id(), Some("42"));
    }

    #[test]
    fn test_document_type_deserialization() {
        let doc: StockDocument = serde_json::from_str(
            r#"{
                "doctype": "Stock Entry",
                "name": "MAT-STE-0001",
                "items": [{"item_code": "A", "s_warehouse": "Stores - X"}]
            }"#,
        )
        .unwrap();
        assert_eq!(doc.doctype, DocumentType::StockEntry);
        assert!(doc.update_stock);
        assert_eq!(doc.items[0].s_warehouse.as_deref(), Some("Stores - X"));

        let other: DocumentType = serde_json::from_str(r#""Purchase Order""#).unwrap();
        assert_eq!(other, DocumentType::Other);
        assert!(!other.is_stock_affecting());
    }

    #[test]
    fn test_check_fields_accept_erp_integers() {
        let invoice: StockDocument = serde_json::from_str(
            r#"{
                "doctype": "Sales Invoice",
                "name": "ACC-SINV-0001",
                "update_stock": 0,
                "items": [{"item_code": "A", "warehouse": "Stores - X"}]
            }"#,
        )
        .unwrap();
        assert!(!invoice.update_stock);

        let item: Item = serde_json::from_str(
            r#"{
                "item_code": "A",
                "item_name": "A",
                "is_stock_item": 1,
                "disabled": "0",
                "variant_of": null,
                "woocommerce_servers": [
                    {"item_code": "A", "woocommerce_server": "shop.test", "woocommerce_id": "7", "enabled": true}
                ]
            }"#,
        )
        .unwrap();
        assert!(item.is_stock_item);
        assert!(!item.disabled);
        assert!(item.woocommerce_servers[0].enabled);

        let bad = serde_json::from_str::<StockDocument>(
            r#"{"doctype": "Sales Invoice", "name": "X", "update_stock": 2, "items": []}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_server_toggles_accept_erp_integers() {
        let server: WooCommerceServer = serde_json::from_str(
            r#"{
                "name": "shop.test",
                "woocommerce_server_url": "https://shop.test",
                "api_consumer_key": "ck",
                "api_consumer_secret": "cs",
                "enable_sync": 1,
                "enable_stock_level_synchronisation": 1,
                "enable_price_list_sync": 0,
                "price_list": null,
                "price_list_delay_per_item": 0.0,
                "subtract_reserved_stock": 0,
                "warehouses": ["Stores - X"],
                "enable_tax_lines_sync": false,
                "tax_account": null,
                "f_n_f_tax_account": null
            }"#,
        )
        .unwrap();
        assert!(server.is_stock_sync_enabled());
        assert!(!server.enable_price_list_sync);
        assert!(!server.subtract_reserved_stock);
    }
}
