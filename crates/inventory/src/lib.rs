//! Inventory domain: per-store stock, transfers between stores, and sales.
//!
//! Pure, deterministic business rules (no IO, no storage). The infra crate's
//! `InventoryLedger` reads and writes these records through a store.

/// Declares a tenant-scoped identifier wrapping an `AggregateId`.
macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub retailpos_core::AggregateId);

        impl $name {
            pub fn new(id: retailpos_core::AggregateId) -> Self {
                Self(id)
            }

            /// Fresh identifier (UUIDv7).
            pub fn generate() -> Self {
                Self(retailpos_core::AggregateId::new())
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

pub mod sale;
pub mod stock;
pub mod transfer;

pub use sale::{Sale, SaleId, SaleItem, SaleStatus};
pub use stock::{
    DEFAULT_LOW_STOCK_THRESHOLD, ProductId, StockKey, StockMovement, StockRecord, StoreId,
};
pub use transfer::{Transfer, TransferId, TransferItem, TransferStatus};
