//! Infrastructure layer: record stores, the inventory ledger, configuration.

pub mod config;
pub mod ledger;
pub mod store;


pub use config::{StoreConfig, connect_store};
pub use ledger::{InventoryLedger, LedgerError, StepError};
pub use store::{InMemoryStore, PostgresStore, RecordStore, StoreError};
