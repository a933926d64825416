//! # Stock Decisions
//!
//! Pure functions behind the stock hook and the stock worker.
//!
//! ## Hook: should this document trigger a sync?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  StockDocument                                                          │
//! │       │                                                                 │
//! │       ├── doctype not stock-affecting ───────────────► NotStockDocument │
//! │       ├── Sales Invoice with update_stock = 0 ───────► StockNotUpdated  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  synced = ⋃ warehouses of servers with enable_sync + stock sync        │
//! │       ├── no such server ────────────────────────────► NoEnabledServer  │
//! │       │                                                                 │
//! │  touched = ⋃ warehouse / s_warehouse / t_warehouse over rows           │
//! │       ├── synced ∩ touched = ∅ ──────────────────────► NoSyncedWarehouse│
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Enqueue(distinct item codes, first-seen order)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Worker: what to push for one item
//! ```text
//!   qty(server) = floor( Σ  bin.actual_qty [- bin.reserved_qty] )
//!                       bins with warehouse ∈ server.warehouses
//! ```
//! The floor is taken once, after summation. Flooring each bin first would
//! under-report fractional stock spread over warehouses.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::endpoint::{endpoint_for, ProductEndpoint};
use crate::types::{Bin, DocumentType, Item, StockDocument, WooCommerceServer};

// =============================================================================
// Hook decision
// =============================================================================

/// Outcome of evaluating a stock-affecting document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockTrigger {
    /// Doctype is not one the stock hook listens to.
    NotStockDocument,
    /// Sales invoice that did not move stock.
    StockNotUpdated,
    /// No server has both `enable_sync` and stock sync switched on.
    NoEnabledServer,
    /// The document does not touch any synced warehouse.
    NoSyncedWarehouse,
    /// Sync these items (deduplicated).
    Enqueue(Vec<String>),
}

/// Union of the warehouses of every stock-enabled server.
pub fn synced_warehouses(servers: &[WooCommerceServer]) -> BTreeSet<String> {
    servers
        .iter()
        .filter(|s| s.is_stock_sync_enabled())
        .flat_map(|s| s.warehouses.iter().cloned())
        .collect()
}

/// Every warehouse a document's rows mention, in any of the three fields.
pub fn document_warehouses(doc: &StockDocument) -> BTreeSet<String> {
    doc.items
        .iter()
        .flat_map(|row| [&row.warehouse, &row.s_warehouse, &row.t_warehouse])
        .filter_map(|w| w.as_deref())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Distinct item codes of a document, in first-seen order.
pub fn affected_item_codes(doc: &StockDocument) -> Vec<String> {
    let mut seen = BTreeSet::new();
    doc.items
        .iter()
        .map(|row| row.item_code.as_str())
        .filter(|code| !code.is_empty() && seen.insert(*code))
        .map(str::to_string)
        .collect()
}

/// Decides whether a saved/submitted document should enqueue a stock sync.
pub fn evaluate_stock_document(doc: &StockDocument, servers: &[WooCommerceServer]) -> StockTrigger {
    if !doc.doctype.is_stock_affecting() {
        return StockTrigger::NotStockDocument;
    }

    if doc.doctype == DocumentType::SalesInvoice && !doc.update_stock {
        return StockTrigger::StockNotUpdated;
    }

    if !servers.iter().any(WooCommerceServer::is_stock_sync_enabled) {
        return StockTrigger::NoEnabledServer;
    }

    let synced = synced_warehouses(servers);
    let touched = document_warehouses(doc);
    if synced.is_disjoint(&touched) {
        return StockTrigger::NoSyncedWarehouse;
    }

    StockTrigger::Enqueue(affected_item_codes(doc))
}

// =============================================================================
// Worker decision
// =============================================================================

/// Sellable quantity of an item for one server.
///
/// ## Example
/// ```rust
/// use woosync_core::stock::stock_quantity;
/// use woosync_core::types::{Bin, WooCommerceServer};
///
/// let mut server = WooCommerceServer::new("shop.test", "https://shop.test");
/// server.warehouses = vec!["WH1".into(), "WH2".into()];
/// server.subtract_reserved_stock = true;
///
/// let bins = vec![
///     Bin { item_code: "X".into(), warehouse: "WH1".into(), actual_qty: 10.0, reserved_qty: 2.0 },
///     Bin { item_code: "X".into(), warehouse: "WH2".into(), actual_qty: 5.0, reserved_qty: 0.0 },
/// ];
/// assert_eq!(stock_quantity(&bins, &server), 13);
/// ```
pub fn stock_quantity(bins: &[Bin], server: &WooCommerceServer) -> i64 {
    let total: f64 = bins
        .iter()
        .filter(|bin| server.syncs_warehouse(&bin.warehouse))
        .map(|bin| {
            if server.subtract_reserved_stock {
                bin.actual_qty - bin.reserved_qty
            } else {
                bin.actual_qty
            }
        })
        .sum();

    total.floor() as i64
}

/// Why an item, or one of its server links, was not pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    // Item level
    NoLinkedServers,
    NotStockItem,
    ItemDisabled,

    // Link level
    NoRemoteId,
    ServerMissing,
    SyncDisabled,
    LinkDisabled,
    StockSyncDisabled,
    MissingParentLink,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::NoLinkedServers => "item has no linked WooCommerce servers",
            SkipReason::NotStockItem => "item is not a stock item",
            SkipReason::ItemDisabled => "item is disabled",
            SkipReason::NoRemoteId => "link has no WooCommerce id",
            SkipReason::ServerMissing => "server does not exist",
            SkipReason::SyncDisabled => "server sync is disabled",
            SkipReason::LinkDisabled => "link is disabled",
            SkipReason::StockSyncDisabled => "stock level sync is disabled",
            SkipReason::MissingParentLink => "parent item has no link to this server",
        };
        f.write_str(text)
    }
}

/// A stock value ready to be PUT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockPush {
    pub server: String,
    pub endpoint: ProductEndpoint,
    pub quantity: i64,
}

/// Per-link outcome of planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockDecision {
    Push(StockPush),
    Skip { server: String, reason: SkipReason },
}

/// Item-level gate: linked, stock-tracked and enabled.
pub fn check_item(item: &Item) -> Result<(), SkipReason> {
    if item.woocommerce_servers.is_empty() {
        return Err(SkipReason::NoLinkedServers);
    }
    if !item.is_stock_item {
        return Err(SkipReason::NotStockItem);
    }
    if item.disabled {
        return Err(SkipReason::ItemDisabled);
    }
    Ok(())
}

/// Plans the stock pushes for one item across all of its links.
///
/// ## Arguments
/// * `item` - the item with its links
/// * `bins` - every bin of the item
/// * `servers` - server records (looked up by link server name)
/// * `parent` - the template item when `item` is a variant
///
/// ## Returns
/// * `Err(reason)` when the item itself is not syncable
/// * `Ok(decisions)` with one decision per link, in link order
pub fn plan_stock_pushes(
    item: &Item,
    bins: &[Bin],
    servers: &[WooCommerceServer],
    parent: Option<&Item>,
) -> Result<Vec<StockDecision>, SkipReason> {
    check_item(item)?;

    let decisions = item
        .woocommerce_servers
        .iter()
        .map(|link| {
            let server_name = link.woocommerce_server.clone();
            let skip = |reason| StockDecision::Skip {
                server: server_name.clone(),
                reason,
            };

            let Some(remote_id) = link.remote_id() else {
                return skip(SkipReason::NoRemoteId);
            };
            let Some(server) = servers.iter().find(|s| s.name == link.woocommerce_server) else {
                return skip(SkipReason::ServerMissing);
            };
            if !server.enable_sync {
                return skip(SkipReason::SyncDisabled);
            }
            if !link.enabled {
                return skip(SkipReason::LinkDisabled);
            }
            if !server.enable_stock_level_synchronisation {
                return skip(SkipReason::StockSyncDisabled);
            }

            let quantity = stock_quantity(bins, server);

            match endpoint_for(remote_id, &server.name, item.variant_of.as_deref(), parent) {
                Some(endpoint) => StockDecision::Push(StockPush {
                    server: server.name.clone(),
                    endpoint,
                    quantity,
                }),
                None => skip(SkipReason::MissingParentLink),
            }
        })
        .collect();

    Ok(decisions)
}

// =============================================================================
// Unit Tests
// =============================================================================
