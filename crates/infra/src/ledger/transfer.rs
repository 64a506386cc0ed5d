use chrono::Utc;
use tracing::instrument;

use retailpos_auth::SessionContext;
use retailpos_core::ExpectedVersion;
use retailpos_inventory::{StoreId, Transfer, TransferId, TransferItem};

use super::{InventoryLedger, LedgerError, MovementLog, ensure_tenant};
use crate::store::RecordStore;

impl<S> InventoryLedger<S>
where
    S: RecordStore,
{
    /// Persist a new pending transfer raised by the caller.
    #[instrument(skip(self, ctx, items), fields(tenant_id = %ctx.tenant_id, source = %source_store_id, destination = %destination_store_id), err)]
    pub async fn create_transfer(
        &self,
        ctx: &SessionContext,
        source_store_id: StoreId,
        destination_store_id: StoreId,
        items: Vec<TransferItem>,
    ) -> Result<Transfer, LedgerError> {
        let transfer = Transfer::new(
            TransferId::generate(),
            ctx.tenant_id,
            source_store_id,
            destination_store_id,
            ctx.user_id,
            items,
            Utc::now(),
        )?;
        Ok(self.store.insert_transfer(ctx.tenant_id, transfer).await?)
    }

    /// Load a stored transfer and apply it.
    pub async fn complete_transfer(
        &self,
        ctx: &SessionContext,
        transfer_id: TransferId,
    ) -> Result<Transfer, LedgerError> {
        let transfer = self.store.get_transfer(ctx.tenant_id, transfer_id).await?;
        self.apply_transfer(ctx, transfer).await
    }

    /// Move every item from the source store to the destination store, then
    /// mark the transfer completed.
    ///
    /// Items are processed one at a time in their stored order, each against a
    /// fresh read of current stock:
    /// - source: decremented when a record exists (no floor), skipped otherwise;
    /// - destination: incremented, or created with the item quantity.
    ///
    /// On failure the transfer stays `pending` and already-applied writes stay
    /// applied (see [`LedgerError::PartiallyApplied`]).
    #[instrument(skip(self, ctx, transfer), fields(tenant_id = %ctx.tenant_id, transfer_id = %transfer.id, items = transfer.items.len()), err)]
    pub async fn apply_transfer(
        &self,
        ctx: &SessionContext,
        transfer: Transfer,
    ) -> Result<Transfer, LedgerError> {
        ensure_tenant(ctx.tenant_id, transfer.tenant_id)?;
        transfer.ensure_pending()?;
        transfer.validate()?;

        let tenant_id = ctx.tenant_id;
        let mut log = MovementLog::default();

        for item in &transfer.items {
            let source = transfer.source_key(item.product_id);
            if let Some((_, movement)) = self
                .debit_existing(tenant_id, source, item.quantity)
                .await
                .map_err(|e| log.fail(e))?
            {
                log.push(movement);
            }

            let destination = transfer.destination_key(item.product_id);
            let (_, movement) = self
                .credit_or_create(tenant_id, destination, item.quantity)
                .await
                .map_err(|e| log.fail(e))?;
            log.push(movement);
        }

        let expected = ExpectedVersion::Exact(transfer.version);
        let mut completed = transfer;
        completed.complete()?;
        let stored = self
            .store
            .update_transfer(tenant_id, completed, expected)
            .await
            .map_err(|e| log.fail(e))?;

        tracing::info!(
            writes = log.into_inner().len(),
            quantity = %stored.total_quantity(),
            "transfer completed"
        );
        Ok(stored)
    }
}
