use tracing::instrument;

use retailpos_auth::SessionContext;
use retailpos_core::{DomainError, ExpectedVersion};
use retailpos_inventory::{StockKey, StockMovement, StockRecord, StoreId};

use super::{InventoryLedger, LedgerError, MovementLog};
use crate::store::{RecordStore, StoreError};

impl<S> InventoryLedger<S>
where
    S: RecordStore,
{
    /// Add received goods to a store, creating the stock record on first receipt.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id), err)]
    pub async fn receive_stock(
        &self,
        ctx: &SessionContext,
        key: StockKey,
        quantity: i64,
    ) -> Result<StockRecord, LedgerError> {
        if quantity <= 0 {
            return Err(DomainError::validation("received quantity must be positive").into());
        }
        let (record, _) = self.credit_or_create(ctx.tenant_id, key, quantity).await?;
        Ok(record)
    }

    /// Records at `store_id` at or under their low-stock threshold, lowest first.
    pub async fn low_stock(
        &self,
        ctx: &SessionContext,
        store_id: StoreId,
    ) -> Result<Vec<StockRecord>, LedgerError> {
        let mut low: Vec<StockRecord> = self
            .store
            .list_stock(ctx.tenant_id, store_id)
            .await?
            .into_iter()
            .filter(StockRecord::is_low_stock)
            .collect();
        low.sort_by_key(|r| (r.quantity, r.key));
        Ok(low)
    }

    /// Undo logged movements, newest first.
    ///
    /// Compensation is explicit: callers pass the `applied` list of a
    /// `PartiallyApplied` error (or any other movement log) when they decide to
    /// back it out. Records created by a movement are brought back to zero,
    /// not deleted.
    #[instrument(skip(self, ctx, movements), fields(tenant_id = %ctx.tenant_id, movements = movements.len()), err)]
    pub async fn revert_movements(
        &self,
        ctx: &SessionContext,
        movements: &[StockMovement],
    ) -> Result<Vec<StockMovement>, LedgerError> {
        let mut log = MovementLog::default();

        for movement in movements.iter().rev() {
            let inverse = movement.inverse();
            let current = self
                .store
                .get_stock(ctx.tenant_id, inverse.key)
                .await
                .map_err(|e| log.fail(e))?
                .ok_or_else(|| StoreError::not_found(format!("stock record {}", inverse.key)))
                .map_err(|e| log.fail(e))?;

            let next = current.adjusted(inverse.delta).map_err(|e| log.fail(e))?;
            self.store
                .update_stock(ctx.tenant_id, next, ExpectedVersion::Exact(current.version))
                .await
                .map_err(|e| log.fail(e))?;
            log.push(inverse);
        }

        tracing::info!(reverted = movements.len(), "stock movements reverted");
        Ok(log.into_inner())
    }
}
