//! Inventory ledger: multi-record stock operations over a `RecordStore`.
//!
//! Every operation runs its store calls one after another and stops at the
//! first failure. Nothing is rolled back automatically. Writes that already
//! landed are reported in `LedgerError::PartiallyApplied` so the caller can
//! decide whether to hand them to [`InventoryLedger::revert_movements`].
//!
//! Stock writes are read-modify-write guarded by the version just read, so a
//! concurrent writer surfaces as `StoreError::Conflict` instead of a lost
//! update. Conflicts are not retried here.

mod permissions;
mod sale;
mod stock;
mod transfer;

use thiserror::Error;

use retailpos_core::{DomainError, ExpectedVersion, TenantId};
use retailpos_inventory::{StockKey, StockMovement, StockRecord};

use crate::store::{RecordStore, StoreError};

/// Ledger operation error.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Rejected before any write (bad input, wrong state, wrong tenant).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A store call failed before any stock write landed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A step failed after some stock writes had already landed.
    #[error("failed after {} stock write(s): {cause}", .applied.len())]
    PartiallyApplied {
        applied: Vec<StockMovement>,
        #[source]
        cause: StepError,
    },
}

/// Why a single step of a multi-write operation failed.
#[derive(Debug, Error)]
pub enum StepError {
    /// The adjustment itself was rejected (e.g. quantity out of range).
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<StepError> for LedgerError {
    fn from(err: StepError) -> Self {
        match err {
            StepError::Domain(e) => LedgerError::Domain(e),
            StepError::Store(e) => LedgerError::Store(e),
        }
    }
}

impl LedgerError {
    /// The underlying store failure, if this error came from the store.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            LedgerError::Store(e) => Some(e),
            LedgerError::PartiallyApplied {
                cause: StepError::Store(e),
                ..
            } => Some(e),
            _ => None,
        }
    }

    /// Stock writes that landed before the failure (empty unless partial).
    pub fn applied(&self) -> &[StockMovement] {
        match self {
            LedgerError::PartiallyApplied { applied, .. } => applied,
            _ => &[],
        }
    }
}

/// Stock writes applied so far by one operation.
#[derive(Debug, Default)]
struct MovementLog {
    applied: Vec<StockMovement>,
}

impl MovementLog {
    fn push(&mut self, movement: StockMovement) {
        self.applied.push(movement);
    }

    /// Turn a step failure into the right ledger error for this point in the operation.
    fn fail(&mut self, cause: impl Into<StepError>) -> LedgerError {
        let cause = cause.into();
        if self.applied.is_empty() {
            cause.into()
        } else {
            LedgerError::PartiallyApplied {
                applied: std::mem::take(&mut self.applied),
                cause,
            }
        }
    }

    fn into_inner(self) -> Vec<StockMovement> {
        self.applied
    }
}

/// Applies stock adjustments, transfers, sales and permission reconciliation.
#[derive(Debug, Clone)]
pub struct InventoryLedger<S> {
    store: S,
}

impl<S> InventoryLedger<S>
where
    S: RecordStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Subtract `quantity` from an existing record.
    ///
    /// Returns `None` without writing when no record exists: there is nothing
    /// to decrement and no record is fabricated.
    async fn debit_existing(
        &self,
        tenant_id: TenantId,
        key: StockKey,
        quantity: i64,
    ) -> Result<Option<(StockRecord, StockMovement)>, StepError> {
        let Some(current) = self.store.get_stock(tenant_id, key).await? else {
            tracing::debug!(%key, quantity, "no stock record to decrement; skipping");
            return Ok(None);
        };

        let delta = quantity.checked_neg().ok_or_else(|| {
            DomainError::validation(format!("decrement of {key} out of range: {quantity}"))
        })?;
        let next = current.adjusted(delta)?;
        if next.is_negative() {
            tracing::warn!(%key, quantity = next.quantity, "stock went negative");
        }
        let stored = self
            .store
            .update_stock(tenant_id, next, ExpectedVersion::Exact(current.version))
            .await?;

        Ok(Some((
            stored,
            StockMovement {
                key,
                delta,
                created: false,
            },
        )))
    }

    /// Add `quantity` to a record, creating it on first receipt.
    async fn credit_or_create(
        &self,
        tenant_id: TenantId,
        key: StockKey,
        quantity: i64,
    ) -> Result<(StockRecord, StockMovement), StepError> {
        let (stored, created) = match self.store.get_stock(tenant_id, key).await? {
            Some(current) => {
                let next = current.adjusted(quantity)?;
                let stored = self
                    .store
                    .update_stock(tenant_id, next, ExpectedVersion::Exact(current.version))
                    .await?;
                (stored, false)
            }
            None => {
                let stored = self
                    .store
                    .insert_stock(tenant_id, StockRecord::new(key, quantity))
                    .await?;
                (stored, true)
            }
        };

        Ok((
            stored,
            StockMovement {
                key,
                delta: quantity,
                created,
            },
        ))
    }
}

fn ensure_tenant(expected: TenantId, actual: TenantId) -> Result<(), DomainError> {
    if expected != actual {
        return Err(DomainError::TenantMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use retailpos_inventory::{ProductId, StoreId};

    fn test_movement(delta: i64) -> StockMovement {
        StockMovement {
            key: StockKey::new(ProductId::generate(), StoreId::generate()),
            delta,
            created: false,
        }
    }

    #[test]
    fn failure_before_any_write_is_a_plain_store_error() {
        let mut log = MovementLog::default();
        let err = log.fail(StoreError::backend("timeout"));
        assert!(matches!(err, LedgerError::Store(StoreError::Backend(_))));
        assert!(err.applied().is_empty());
    }

    #[test]
    fn rejected_step_after_writes_is_partial_without_store_cause() {
        let mut log = MovementLog::default();
        log.push(test_movement(-1));

        let err = log.fail(DomainError::validation("out of range"));
        assert_eq!(err.applied().len(), 1);
        assert!(err.store_error().is_none());
        assert!(matches!(
            err,
            LedgerError::PartiallyApplied {
                cause: StepError::Domain(DomainError::Validation(_)),
                ..
            }
        ));
    }

    #[test]
    fn rejected_step_before_writes_is_a_domain_error() {
        let mut log = MovementLog::default();
        let err = log.fail(DomainError::validation("out of range"));
        assert!(matches!(err, LedgerError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn failure_after_writes_carries_the_log() {
        let mut log = MovementLog::default();
        log.push(test_movement(-4));
        log.push(test_movement(4));

        let err = log.fail(StoreError::conflict("stale"));
        assert_eq!(err.applied().len(), 2);
        assert!(matches!(err.store_error(), Some(StoreError::Conflict(_))));
        assert!(err.to_string().starts_with("failed after 2 stock write(s)"));
    }

    #[test]
    fn domain_errors_have_no_store_cause() {
        let err = LedgerError::from(DomainError::TenantMismatch);
        assert!(err.store_error().is_none());
    }
}
