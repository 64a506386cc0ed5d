use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use retailpos_auth::{PermissionId, RoleId};
use retailpos_core::{ExpectedVersion, TenantId};
use retailpos_inventory::{Sale, SaleId, StockKey, StockRecord, StoreId, Transfer, TransferId};

/// Store operation error.
///
/// The only error kind the persistence boundary produces. Variants carry the
/// backend-supplied message; callers that only need to display the failure
/// can use `Display`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A single-row fetch or an update found no row.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stale version on update, or a row that already exists on insert.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Any other constraint violation (duplicate assignment, bad reference, ...).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Network, pool or driver failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Per-(product, store) stock rows.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Maybe-single fetch: `Ok(None)` when no row exists yet.
    async fn get_stock(
        &self,
        tenant_id: TenantId,
        key: StockKey,
    ) -> Result<Option<StockRecord>, StoreError>;

    /// Insert a new row. Fails with `Conflict` if the key already exists.
    async fn insert_stock(
        &self,
        tenant_id: TenantId,
        record: StockRecord,
    ) -> Result<StockRecord, StoreError>;

    /// Replace a row, provided the stored version satisfies `expected`.
    async fn update_stock(
        &self,
        tenant_id: TenantId,
        record: StockRecord,
        expected: ExpectedVersion,
    ) -> Result<StockRecord, StoreError>;

    /// Every row held at one store.
    async fn list_stock(
        &self,
        tenant_id: TenantId,
        store_id: StoreId,
    ) -> Result<Vec<StockRecord>, StoreError>;
}

/// Transfers and their items (stored and loaded together).
#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn insert_transfer(
        &self,
        tenant_id: TenantId,
        transfer: Transfer,
    ) -> Result<Transfer, StoreError>;

    /// Single fetch: a missing transfer is `NotFound`.
    async fn get_transfer(
        &self,
        tenant_id: TenantId,
        transfer_id: TransferId,
    ) -> Result<Transfer, StoreError>;

    async fn update_transfer(
        &self,
        tenant_id: TenantId,
        transfer: Transfer,
        expected: ExpectedVersion,
    ) -> Result<Transfer, StoreError>;
}

/// Sales and their lines.
#[async_trait]
pub trait SaleStore: Send + Sync {
    async fn insert_sale(&self, tenant_id: TenantId, sale: Sale) -> Result<Sale, StoreError>;

    /// Single fetch: a missing sale is `NotFound`.
    async fn get_sale(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<Sale, StoreError>;

    async fn update_sale(
        &self,
        tenant_id: TenantId,
        sale: Sale,
        expected: ExpectedVersion,
    ) -> Result<Sale, StoreError>;
}

/// The `role_id → {permission_id}` relation.
#[async_trait]
pub trait RolePermissionStore: Send + Sync {
    async fn list_role_permissions(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> Result<Vec<PermissionId>, StoreError>;

    /// Batch insert. An already-assigned pair is a `Constraint` error.
    async fn insert_role_permissions(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<(), StoreError>;

    /// Remove one assignment (no-op when absent).
    async fn delete_role_permission(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StoreError>;
}

/// Everything the inventory ledger needs from a backend.
pub trait RecordStore: StockStore + TransferStore + SaleStore + RolePermissionStore {}

impl<T> RecordStore for T where T: StockStore + TransferStore + SaleStore + RolePermissionStore {}

#[async_trait]
impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    async fn get_stock(
        &self,
        tenant_id: TenantId,
        key: StockKey,
    ) -> Result<Option<StockRecord>, StoreError> {
        (**self).get_stock(tenant_id, key).await
    }

    async fn insert_stock(
        &self,
        tenant_id: TenantId,
        record: StockRecord,
    ) -> Result<StockRecord, StoreError> {
        (**self).insert_stock(tenant_id, record).await
    }

    async fn update_stock(
        &self,
        tenant_id: TenantId,
        record: StockRecord,
        expected: ExpectedVersion,
    ) -> Result<StockRecord, StoreError> {
        (**self).update_stock(tenant_id, record, expected).await
    }

    async fn list_stock(
        &self,
        tenant_id: TenantId,
        store_id: StoreId,
    ) -> Result<Vec<StockRecord>, StoreError> {
        (**self).list_stock(tenant_id, store_id).await
    }
}

#[async_trait]
impl<S> TransferStore for Arc<S>
where
    S: TransferStore + ?Sized,
{
    async fn insert_transfer(
        &self,
        tenant_id: TenantId,
        transfer: Transfer,
    ) -> Result<Transfer, StoreError> {
        (**self).insert_transfer(tenant_id, transfer).await
    }

    async fn get_transfer(
        &self,
        tenant_id: TenantId,
        transfer_id: TransferId,
    ) -> Result<Transfer, StoreError> {
        (**self).get_transfer(tenant_id, transfer_id).await
    }

    async fn update_transfer(
        &self,
        tenant_id: TenantId,
        transfer: Transfer,
        expected: ExpectedVersion,
    ) -> Result<Transfer, StoreError> {
        (**self).update_transfer(tenant_id, transfer, expected).await
    }
}

#[async_trait]
impl<S> SaleStore for Arc<S>
where
    S: SaleStore + ?Sized,
{
    async fn insert_sale(&self, tenant_id: TenantId, sale: Sale) -> Result<Sale, StoreError> {
        (**self).insert_sale(tenant_id, sale).await
    }

    async fn get_sale(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<Sale, StoreError> {
        (**self).get_sale(tenant_id, sale_id).await
    }

    async fn update_sale(
        &self,
        tenant_id: TenantId,
        sale: Sale,
        expected: ExpectedVersion,
    ) -> Result<Sale, StoreError> {
        (**self).update_sale(tenant_id, sale, expected).await
    }
}

#[async_trait]
impl<S> RolePermissionStore for Arc<S>
where
    S: RolePermissionStore + ?Sized,
{
    async fn list_role_permissions(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> Result<Vec<PermissionId>, StoreError> {
        (**self).list_role_permissions(tenant_id, role_id).await
    }

    async fn insert_role_permissions(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<(), StoreError> {
        (**self)
            .insert_role_permissions(tenant_id, role_id, permission_ids)
            .await
    }

    async fn delete_role_permission(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StoreError> {
        (**self)
            .delete_role_permission(tenant_id, role_id, permission_id)
            .await
    }
}
