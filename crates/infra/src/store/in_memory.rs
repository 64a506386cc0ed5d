use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use retailpos_auth::{PermissionId, RoleId};
use retailpos_core::{AggregateRoot, Entity, ExpectedVersion, TenantId};
use retailpos_inventory::{Sale, SaleId, StockKey, StockRecord, StoreId, Transfer, TransferId};

use super::r#trait::{RolePermissionStore, SaleStore, StockStore, StoreError, TransferStore};

/// In-memory record store for tests/dev.
///
/// Every map is keyed by tenant first, so a row written for one company is
/// invisible to every other.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    stock: RwLock<HashMap<(TenantId, StockKey), StockRecord>>,
    transfers: RwLock<HashMap<(TenantId, TransferId), Transfer>>,
    sales: RwLock<HashMap<(TenantId, SaleId), Sale>>,
    role_permissions: RwLock<BTreeSet<(TenantId, RoleId, PermissionId)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::backend("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::backend("in-memory store lock poisoned"))
}

fn check_version(kind: &str, expected: ExpectedVersion, actual: u64) -> Result<(), StoreError> {
    expected
        .check(actual)
        .map_err(|e| StoreError::conflict(format!("{kind}: {e}")))
}

#[async_trait]
impl StockStore for InMemoryStore {
    async fn get_stock(
        &self,
        tenant_id: TenantId,
        key: StockKey,
    ) -> Result<Option<StockRecord>, StoreError> {
        Ok(read(&self.stock)?.get(&(tenant_id, key)).cloned())
    }

    async fn insert_stock(
        &self,
        tenant_id: TenantId,
        record: StockRecord,
    ) -> Result<StockRecord, StoreError> {
        let mut stock = write(&self.stock)?;
        let slot = (tenant_id, record.key);
        if stock.contains_key(&slot) {
            return Err(StoreError::conflict(format!(
                "stock record {} already exists",
                record.key
            )));
        }
        stock.insert(slot, record.clone());
        Ok(record)
    }

    async fn update_stock(
        &self,
        tenant_id: TenantId,
        record: StockRecord,
        expected: ExpectedVersion,
    ) -> Result<StockRecord, StoreError> {
        let mut stock = write(&self.stock)?;
        let current = stock
            .get_mut(&(tenant_id, record.key))
            .ok_or_else(|| StoreError::not_found(format!("stock record {}", record.key)))?;
        check_version("stock record", expected, current.version())?;
        *current = record.clone();
        Ok(record)
    }

    async fn list_stock(
        &self,
        tenant_id: TenantId,
        store_id: StoreId,
    ) -> Result<Vec<StockRecord>, StoreError> {
        let stock = read(&self.stock)?;
        let mut records: Vec<StockRecord> = stock
            .iter()
            .filter(|((t, key), _)| *t == tenant_id && key.store_id == store_id)
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by_key(|r| r.key);
        Ok(records)
    }
}

#[async_trait]
impl TransferStore for InMemoryStore {
    async fn insert_transfer(
        &self,
        tenant_id: TenantId,
        transfer: Transfer,
    ) -> Result<Transfer, StoreError> {
        if transfer.tenant_id != tenant_id {
            return Err(StoreError::constraint("transfer belongs to another tenant"));
        }
        let mut transfers = write(&self.transfers)?;
        let slot = (tenant_id, transfer.id);
        if transfers.contains_key(&slot) {
            return Err(StoreError::conflict(format!(
                "transfer {} already exists",
                transfer.id
            )));
        }
        transfers.insert(slot, transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(
        &self,
        tenant_id: TenantId,
        transfer_id: TransferId,
    ) -> Result<Transfer, StoreError> {
        read(&self.transfers)?
            .get(&(tenant_id, transfer_id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("transfer {transfer_id}")))
    }

    async fn update_transfer(
        &self,
        tenant_id: TenantId,
        transfer: Transfer,
        expected: ExpectedVersion,
    ) -> Result<Transfer, StoreError> {
        let mut transfers = write(&self.transfers)?;
        let current = transfers
            .get_mut(&(tenant_id, transfer.id))
            .ok_or_else(|| StoreError::not_found(format!("transfer {}", transfer.id)))?;
        check_version("transfer", expected, current.version())?;
        *current = transfer.clone();
        Ok(transfer)
    }
}

#[async_trait]
impl SaleStore for InMemoryStore {
    async fn insert_sale(&self, tenant_id: TenantId, sale: Sale) -> Result<Sale, StoreError> {
        if sale.tenant_id != tenant_id {
            return Err(StoreError::constraint("sale belongs to another tenant"));
        }
        let mut sales = write(&self.sales)?;
        let slot = (tenant_id, sale.id);
        if sales.contains_key(&slot) {
            return Err(StoreError::conflict(format!("sale {} already exists", sale.id)));
        }
        sales.insert(slot, sale.clone());
        Ok(sale)
    }

    async fn get_sale(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<Sale, StoreError> {
        read(&self.sales)?
            .get(&(tenant_id, sale_id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("sale {sale_id}")))
    }

    async fn update_sale(
        &self,
        tenant_id: TenantId,
        sale: Sale,
        expected: ExpectedVersion,
    ) -> Result<Sale, StoreError> {
        let mut sales = write(&self.sales)?;
        let current = sales
            .get_mut(&(tenant_id, sale.id))
            .ok_or_else(|| StoreError::not_found(format!("sale {}", sale.id)))?;
        check_version("sale", expected, current.version())?;
        *current = sale.clone();
        Ok(sale)
    }
}

#[async_trait]
impl RolePermissionStore for InMemoryStore {
    async fn list_role_permissions(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> Result<Vec<PermissionId>, StoreError> {
        Ok(read(&self.role_permissions)?
            .iter()
            .filter(|(t, r, _)| *t == tenant_id && *r == role_id)
            .map(|(_, _, p)| *p)
            .collect())
    }

    async fn insert_role_permissions(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<(), StoreError> {
        let mut assignments = write(&self.role_permissions)?;

        // The batch lands whole or not at all.
        let mut batch = BTreeSet::new();
        for id in permission_ids {
            let row = (tenant_id, role_id, *id);
            if assignments.contains(&row) || !batch.insert(row) {
                return Err(StoreError::constraint(format!(
                    "permission {id} is already assigned to role {role_id}"
                )));
            }
        }
        assignments.extend(batch);
        Ok(())
    }

    async fn delete_role_permission(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StoreError> {
        write(&self.role_permissions)?.remove(&(tenant_id, role_id, permission_id));
        Ok(())
    }
}
