//! Persistent store boundary.
//!
//! Tenant-scoped, typed read/insert/update/delete operations for each record
//! kind the ledger touches. Adapters surface every failure as `StoreError` and
//! never retry.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{
    RecordStore, RolePermissionStore, SaleStore, StockStore, StoreError, TransferStore,
};
