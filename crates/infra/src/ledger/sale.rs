use chrono::Utc;
use tracing::instrument;

use retailpos_auth::SessionContext;
use retailpos_core::ExpectedVersion;
use retailpos_inventory::{Sale, SaleId, SaleItem, SaleStatus, StockKey, StockMovement, StoreId};

use super::{InventoryLedger, LedgerError, MovementLog};
use crate::store::RecordStore;

impl<S> InventoryLedger<S>
where
    S: RecordStore,
{
    /// Decrement stock at `store_id` for every sale line carrying both a
    /// product and a quantity.
    ///
    /// Lines whose product has no stock record at the store are skipped; no
    /// record is created and there is no floor at zero. Returns the writes
    /// that were made.
    #[instrument(skip(self, ctx, items), fields(tenant_id = %ctx.tenant_id, store_id = %store_id, lines = items.len()), err)]
    pub async fn apply_sale_decrement(
        &self,
        ctx: &SessionContext,
        store_id: StoreId,
        items: &[SaleItem],
    ) -> Result<Vec<StockMovement>, LedgerError> {
        let mut log = MovementLog::default();

        for (product_id, quantity) in items.iter().filter_map(SaleItem::stock_line) {
            let key = StockKey::new(product_id, store_id);
            if let Some((_, movement)) = self
                .debit_existing(ctx.tenant_id, key, quantity)
                .await
                .map_err(|e| log.fail(e))?
            {
                log.push(movement);
            }
        }

        Ok(log.into_inner())
    }

    /// Record a completed sale and take its lines out of stock.
    #[instrument(skip(self, ctx, items), fields(tenant_id = %ctx.tenant_id, store_id = %store_id), err)]
    pub async fn record_sale(
        &self,
        ctx: &SessionContext,
        store_id: StoreId,
        items: Vec<SaleItem>,
    ) -> Result<Sale, LedgerError> {
        let sale = Sale::new(
            SaleId::generate(),
            ctx.tenant_id,
            store_id,
            ctx.user_id,
            items,
            Utc::now(),
        );
        let sale = self.store.insert_sale(ctx.tenant_id, sale).await?;
        self.apply_sale_decrement(ctx, store_id, &sale.items).await?;

        tracing::info!(sale_id = %sale.id, total = %sale.total(), "sale recorded");
        Ok(sale)
    }

    /// Change a sale's status. Stock is not touched.
    pub async fn set_sale_status(
        &self,
        ctx: &SessionContext,
        sale_id: SaleId,
        status: SaleStatus,
    ) -> Result<Sale, LedgerError> {
        let mut sale = self.store.get_sale(ctx.tenant_id, sale_id).await?;
        let expected = ExpectedVersion::Exact(sale.version);
        sale.set_status(status);
        Ok(self.store.update_sale(ctx.tenant_id, sale, expected).await?)
    }
}
