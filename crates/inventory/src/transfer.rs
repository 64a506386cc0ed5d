use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use retailpos_core::{AggregateRoot, DomainError, DomainResult, TenantId, UserId};

use crate::stock::{ProductId, StockKey, StoreId};

record_id! {
    /// Stock transfer identifier (tenant-scoped via `tenant_id`).
    TransferId
}

/// Transfer lifecycle: `Pending` is initial, `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Completed,
}

impl core::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransferStatus::Pending => f.write_str("pending"),
            TransferStatus::Completed => f.write_str("completed"),
        }
    }
}

impl core::str::FromStr for TransferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "completed" => Ok(TransferStatus::Completed),
            other => Err(DomainError::validation(format!(
                "unknown transfer status '{other}'"
            ))),
        }
    }
}

/// One product line of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Aggregate root: stock transfer between two stores of the same company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub tenant_id: TenantId,
    pub source_store_id: StoreId,
    pub destination_store_id: StoreId,
    pub user_id: UserId,
    pub transfer_date: DateTime<Utc>,
    pub status: TransferStatus,
    pub items: Vec<TransferItem>,
    pub version: u64,
}

impl Transfer {
    /// Create a pending transfer.
    ///
    /// Items keep the caller's order; they are applied one by one in that order.
    pub fn new(
        id: TransferId,
        tenant_id: TenantId,
        source_store_id: StoreId,
        destination_store_id: StoreId,
        user_id: UserId,
        items: Vec<TransferItem>,
        transfer_date: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if source_store_id == destination_store_id {
            return Err(DomainError::validation(
                "source and destination store must differ",
            ));
        }
        validate_items(&items)?;

        Ok(Self {
            id,
            tenant_id,
            source_store_id,
            destination_store_id,
            user_id,
            transfer_date,
            status: TransferStatus::Pending,
            items,
            version: 1,
        })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, TransferStatus::Completed)
    }

    pub fn ensure_pending(&self) -> DomainResult<()> {
        if self.is_completed() {
            return Err(DomainError::conflict(format!(
                "transfer {} is already completed",
                self.id
            )));
        }
        Ok(())
    }

    /// Re-check the item invariants (rows loaded from a store are not trusted).
    pub fn validate(&self) -> DomainResult<()> {
        if self.source_store_id == self.destination_store_id {
            return Err(DomainError::validation(
                "source and destination store must differ",
            ));
        }
        validate_items(&self.items)
    }

    pub fn source_key(&self, product_id: ProductId) -> StockKey {
        StockKey::new(product_id, self.source_store_id)
    }

    pub fn destination_key(&self, product_id: ProductId) -> StockKey {
        StockKey::new(product_id, self.destination_store_id)
    }

    /// Sum of all item quantities (widened, so large item lists cannot overflow).
    pub fn total_quantity(&self) -> i128 {
        self.items.iter().map(|i| i128::from(i.quantity)).sum()
    }

    /// The single `pending -> completed` transition.
    pub fn complete(&mut self) -> DomainResult<()> {
        self.ensure_pending()?;
        self.status = TransferStatus::Completed;
        self.version += 1;
        Ok(())
    }
}

fn validate_items(items: &[TransferItem]) -> DomainResult<()> {
    if items.is_empty() {
        return Err(DomainError::validation("transfer must have at least one item"));
    }

    let mut seen = HashSet::new();
    for (idx, item) in items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "item {idx}: quantity must be positive"
            )));
        }
        if !seen.insert(item.product_id) {
            return Err(DomainError::validation(format!(
                "item {idx}: product {} appears more than once",
                item.product_id
            )));
        }
    }
    Ok(())
}

impl AggregateRoot for Transfer {
    type Id = TransferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_item(quantity: i64) -> TransferItem {
        TransferItem {
            product_id: ProductId::generate(),
            quantity,
        }
    }

    fn test_transfer(items: Vec<TransferItem>) -> DomainResult<Transfer> {
        Transfer::new(
            TransferId::generate(),
            TenantId::new(),
            StoreId::generate(),
            StoreId::generate(),
            UserId::new(),
            items,
            Utc::now(),
        )
    }

    #[test]
    fn new_transfer_starts_pending() {
        let transfer = test_transfer(vec![test_item(10), test_item(3)]).unwrap();
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(transfer.version, 1);
        assert_eq!(transfer.total_quantity(), 13);
        assert!(transfer.ensure_pending().is_ok());
    }

    #[test]
    fn total_quantity_does_not_overflow() {
        let transfer = test_transfer(vec![test_item(i64::MAX), test_item(i64::MAX)]).unwrap();
        assert_eq!(transfer.total_quantity(), 2 * i128::from(i64::MAX));
    }

    #[test]
    fn empty_transfer_is_rejected() {
        let err = test_transfer(vec![]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("at least one item")));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let err = test_transfer(vec![test_item(4), test_item(0)]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.starts_with("item 1")));
    }

    #[test]
    fn duplicate_product_is_rejected() {
        let item = test_item(2);
        let err = test_transfer(vec![item, item]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("more than once")));
    }

    #[test]
    fn same_store_transfer_is_rejected() {
        let store = StoreId::generate();
        let err = Transfer::new(
            TransferId::generate(),
            TenantId::new(),
            store,
            store,
            UserId::new(),
            vec![test_item(1)],
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn complete_is_terminal() {
        let mut transfer = test_transfer(vec![test_item(1)]).unwrap();
        transfer.complete().unwrap();
        assert!(transfer.is_completed());
        assert_eq!(transfer.version, 2);

        let err = transfer.complete().unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(transfer.version, 2);
    }

    #[test]
    fn status_uses_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_value(TransferStatus::Completed).unwrap(),
            serde_json::json!("completed")
        );
        assert_eq!("pending".parse::<TransferStatus>().unwrap(), TransferStatus::Pending);
        assert!("cancelled".parse::<TransferStatus>().is_err());
    }
}
