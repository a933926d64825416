//! # Repository Module
//!
//! Database repository implementations for WooSync.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Queue worker                                                          │
//! │       │                                                                 │
//! │       │  db.items().get("TSHIRT-RED-M")                                │
//! │       ▼                                                                 │
//! │  ItemRepository                                                        │
//! │  ├── get(&self, item_code)            item + server links              │
//! │  ├── upsert(&self, item)              mirror an ERP item               │
//! │  └── enabled_stock_item_codes(..)     paged catalog walk               │
//! │       │                                                                 │
//! │       │  SQL Query (runtime-checked)                                    │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ServerRepository`] - WooCommerce servers and their warehouses
//! - [`ItemRepository`] - Items and item ↔ server links
//! - [`BinRepository`] - Per-warehouse stock ledger
//! - [`ItemPriceRepository`] - Item prices and eligible-price lookups
//! - [`RequestLogRepository`] / [`ErrorLogRepository`] - Worker bookkeeping

pub mod bin;
pub mod item;
pub mod item_price;
pub mod log;
pub mod server;

pub use bin::BinRepository;
pub use item::ItemRepository;
pub use item_price::ItemPriceRepository;
pub use log::{ErrorLogRepository, RequestLogRepository};
pub use server::ServerRepository;
