//! # Remote Product Endpoints
//!
//! WooCommerce addresses a simple product as `products/{id}` and a variation
//! through its parent: `products/{parent_id}/variations/{id}`.
//!
//! ```text
//!   Item "TSHIRT-RED-M"  ──variant_of──►  Item "TSHIRT"
//!   link(shop.test) id=812                link(shop.test) id=57
//!             │                                    │
//!             └──────────────┬─────────────────────┘
//!                            ▼
//!            products/57/variations/812
//! ```
//!
//! A variation id on its own addresses nothing, so a variant whose parent has
//! no link to the same server cannot be synced to that server.

use serde::{Deserialize, Serialize};

use crate::types::Item;

/// An addressable WooCommerce product resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProductEndpoint {
    Product { id: String },
    Variation { parent_id: String, id: String },
}

impl ProductEndpoint {
    /// REST path relative to the API root (`…/wp-json/wc/v3/`).
    pub fn path(&self) -> String {
        match self {
            ProductEndpoint::Product { id } => format!("products/{}", id),
            ProductEndpoint::Variation { parent_id, id } => {
                format!("products/{}/variations/{}", parent_id, id)
            }
        }
    }

    /// The remote id of the resource itself.
    pub fn id(&self) -> &str {
        match self {
            ProductEndpoint::Product { id } => id,
            ProductEndpoint::Variation { id, .. } => id,
        }
    }
}

impl std::fmt::Display for ProductEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// Resolves the endpoint for a remote id on `server`.
///
/// ## Arguments
/// * `remote_id` - the item's own remote id on `server`
/// * `variant_of` - the item's template, if it is a variant
/// * `parent` - the loaded template item (ignored for non-variants)
///
/// ## Returns
/// * `Some(Product)` for non-variants
/// * `Some(Variation)` when the parent has a remote id on the same server
/// * `None` for a variant whose parent is missing or unlinked on `server`
pub fn endpoint_for(
    remote_id: &str,
    server: &str,
    variant_of: Option<&str>,
    parent: Option<&Item>,
) -> Option<ProductEndpoint> {
    if variant_of.is_none() {
        return Some(ProductEndpoint::Product {
            id: remote_id.to_string(),
        });
    }

    // First link to the same server wins, enabled or not: the parent product
    // id is only an address here.
    let parent_id = parent?.link_for(server)?.remote_id()?;

    Some(ProductEndpoint::Variation {
        parent_id: parent_id.to_string(),
        id: remote_id.to_string(),
    })
}

/// Resolves the endpoint for `item`'s link to `server`.
pub fn resolve_endpoint(item: &Item, server: &str, parent: Option<&Item>) -> Option<ProductEndpoint> {
    let remote_id = item.link_for(server)?.remote_id()?;
    endpoint_for(remote_id, server, item.variant_of.as_deref(), parent)
}
