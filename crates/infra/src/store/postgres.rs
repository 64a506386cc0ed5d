//! Postgres-backed record store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Row already exists (stock key, transfer id, assignment) |
//! | Database (other integrity) | `23xxx` | `Constraint` | Check / foreign key violation |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | RowNotFound | N/A | `NotFound` | Single-row fetch found nothing |
//! | Other | N/A | `Backend` | Network errors, pool closed, decode failures |
//!
//! Guarded updates (`ExpectedVersion::Exact`) add `AND version = $n`; when no
//! row is touched the store looks the row up again to tell a stale version
//! (`Conflict`) from a missing row (`NotFound`).

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use retailpos_auth::{PermissionId, RoleId};
use retailpos_core::{AggregateId, ExpectedVersion, TenantId, UserId};
use retailpos_inventory::{
    ProductId, Sale, SaleId, SaleItem, StockKey, StockRecord, StoreId, Transfer, TransferId,
    TransferItem,
};

use super::r#trait::{RolePermissionStore, SaleStore, StockStore, StoreError, TransferStore};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Postgres-backed store for stock, transfers, sales and role assignments.
///
/// Every query filters on `tenant_id`. Each call is its own statement (or
/// its own short transaction when a transfer and its items are written
/// together); nothing spans more than one trait call.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn stock_exists(&self, tenant_id: TenantId, key: StockKey) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT 1 FROM stock_records WHERE tenant_id = $1 AND product_id = $2 AND store_id = $3",
        )
        .bind(tenant_id.as_uuid())
        .bind(key.product_id.0.as_uuid())
        .bind(key.store_id.0.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_exists", e))?;
        Ok(row.is_some())
    }

    async fn row_exists(
        &self,
        table: &'static str,
        tenant_id: TenantId,
        id: Uuid,
    ) -> Result<bool, StoreError> {
        let sql = format!("SELECT 1 FROM {table} WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("row_exists", e))?;
        Ok(row.is_some())
    }

    async fn load_transfer_items(
        &self,
        tenant_id: TenantId,
        transfer_id: TransferId,
    ) -> Result<Vec<TransferItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity
            FROM transfer_items
            WHERE tenant_id = $1 AND transfer_id = $2
            ORDER BY line_no
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(transfer_id.0.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_transfer_items", e))?;

        rows.iter()
            .map(|row| {
                Ok(TransferItem {
                    product_id: ProductId::new(AggregateId::from_uuid(row.try_get("product_id")?)),
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("decode_transfer_items", e))
    }
}

/// `None` for `ExpectedVersion::Any`, bound as a nullable guard.
fn version_guard(expected: ExpectedVersion) -> Option<i64> {
    match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::Exact(v) => Some(v as i64),
    }
}

fn stock_from_row(row: &PgRow) -> Result<StockRecord, sqlx::Error> {
    Ok(StockRecord {
        key: StockKey::new(
            ProductId::new(AggregateId::from_uuid(row.try_get("product_id")?)),
            StoreId::new(AggregateId::from_uuid(row.try_get("store_id")?)),
        ),
        quantity: row.try_get("quantity")?,
        low_stock_threshold: row.try_get("low_stock_threshold")?,
        version: row.try_get::<i64, _>("version")? as u64,
    })
}

fn transfer_from_row(
    tenant_id: TenantId,
    row: &PgRow,
    items: Vec<TransferItem>,
) -> Result<Transfer, StoreError> {
    let decode = |e| map_sqlx_error("decode_transfer", e);
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(Transfer {
        id: TransferId::new(AggregateId::from_uuid(row.try_get("id").map_err(decode)?)),
        tenant_id,
        source_store_id: StoreId::new(AggregateId::from_uuid(
            row.try_get("source_store_id").map_err(decode)?,
        )),
        destination_store_id: StoreId::new(AggregateId::from_uuid(
            row.try_get("destination_store_id").map_err(decode)?,
        )),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(decode)?),
        transfer_date: row.try_get("transfer_date").map_err(decode)?,
        status: status
            .parse()
            .map_err(|e| StoreError::backend(format!("decode_transfer: {e}")))?,
        items,
        version: row.try_get::<i64, _>("version").map_err(decode)? as u64,
    })
}

fn sale_from_row(tenant_id: TenantId, row: &PgRow) -> Result<Sale, StoreError> {
    let decode = |e| map_sqlx_error("decode_sale", e);
    let status: String = row.try_get("status").map_err(decode)?;
    let items: Json<Vec<SaleItem>> = row.try_get("items").map_err(decode)?;
    Ok(Sale {
        id: SaleId::new(AggregateId::from_uuid(row.try_get("id").map_err(decode)?)),
        tenant_id,
        store_id: StoreId::new(AggregateId::from_uuid(row.try_get("store_id").map_err(decode)?)),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(decode)?),
        items: items.0,
        status: status
            .parse()
            .map_err(|e| StoreError::backend(format!("decode_sale: {e}")))?,
        created_at: row.try_get("created_at").map_err(decode)?,
        version: row.try_get::<i64, _>("version").map_err(decode)? as u64,
    })
}

#[async_trait]
impl StockStore for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, key = %key), err)]
    async fn get_stock(
        &self,
        tenant_id: TenantId,
        key: StockKey,
    ) -> Result<Option<StockRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT product_id, store_id, quantity, low_stock_threshold, version
            FROM stock_records
            WHERE tenant_id = $1 AND product_id = $2 AND store_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(key.product_id.0.as_uuid())
        .bind(key.store_id.0.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_stock", e))?;

        row.as_ref()
            .map(stock_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("decode_stock", e))
    }

    #[instrument(skip(self, record), fields(tenant_id = %tenant_id, key = %record.key), err)]
    async fn insert_stock(
        &self,
        tenant_id: TenantId,
        record: StockRecord,
    ) -> Result<StockRecord, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_records (
                tenant_id, product_id, store_id, quantity, low_stock_threshold, version
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(record.key.product_id.0.as_uuid())
        .bind(record.key.store_id.0.as_uuid())
        .bind(record.quantity)
        .bind(record.low_stock_threshold)
        .bind(record.version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_stock", e))?;
        Ok(record)
    }

    #[instrument(skip(self, record), fields(tenant_id = %tenant_id, key = %record.key), err)]
    async fn update_stock(
        &self,
        tenant_id: TenantId,
        record: StockRecord,
        expected: ExpectedVersion,
    ) -> Result<StockRecord, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE stock_records
            SET quantity = $4,
                low_stock_threshold = $5,
                version = $6,
                updated_at = NOW()
            WHERE tenant_id = $1
                AND product_id = $2
                AND store_id = $3
                AND ($7::bigint IS NULL OR version = $7)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(record.key.product_id.0.as_uuid())
        .bind(record.key.store_id.0.as_uuid())
        .bind(record.quantity)
        .bind(record.low_stock_threshold)
        .bind(record.version as i64)
        .bind(version_guard(expected))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_stock", e))?;

        if result.rows_affected() == 0 {
            return Err(if self.stock_exists(tenant_id, record.key).await? {
                StoreError::conflict(format!("stock record {}: stale version", record.key))
            } else {
                StoreError::not_found(format!("stock record {}", record.key))
            });
        }
        Ok(record)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, store_id = %store_id), err)]
    async fn list_stock(
        &self,
        tenant_id: TenantId,
        store_id: StoreId,
    ) -> Result<Vec<StockRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, store_id, quantity, low_stock_threshold, version
            FROM stock_records
            WHERE tenant_id = $1 AND store_id = $2
            ORDER BY product_id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(store_id.0.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stock", e))?;

        rows.iter()
            .map(stock_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_stock", e))
    }
}

#[async_trait]
impl TransferStore for PostgresStore {
    #[instrument(skip(self, transfer), fields(tenant_id = %tenant_id, transfer_id = %transfer.id), err)]
    async fn insert_transfer(
        &self,
        tenant_id: TenantId,
        transfer: Transfer,
    ) -> Result<Transfer, StoreError> {
        if transfer.tenant_id != tenant_id {
            return Err(StoreError::constraint("transfer belongs to another tenant"));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO transfers (
                tenant_id, id, source_store_id, destination_store_id,
                user_id, transfer_date, status, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(transfer.id.0.as_uuid())
        .bind(transfer.source_store_id.0.as_uuid())
        .bind(transfer.destination_store_id.0.as_uuid())
        .bind(transfer.user_id.as_uuid())
        .bind(transfer.transfer_date)
        .bind(transfer.status.to_string())
        .bind(transfer.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transfer", e))?;

        for (line_no, item) in transfer.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transfer_items (tenant_id, transfer_id, line_no, product_id, quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(transfer.id.0.as_uuid())
            .bind(line_no as i32)
            .bind(item.product_id.0.as_uuid())
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_transfer_item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(transfer)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, transfer_id = %transfer_id), err)]
    async fn get_transfer(
        &self,
        tenant_id: TenantId,
        transfer_id: TransferId,
    ) -> Result<Transfer, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, source_store_id, destination_store_id, user_id,
                   transfer_date, status, version
            FROM transfers
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(transfer_id.0.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_transfer", e))?
        .ok_or_else(|| StoreError::not_found(format!("transfer {transfer_id}")))?;

        let items = self.load_transfer_items(tenant_id, transfer_id).await?;
        transfer_from_row(tenant_id, &row, items)
    }

    #[instrument(skip(self, transfer), fields(tenant_id = %tenant_id, transfer_id = %transfer.id), err)]
    async fn update_transfer(
        &self,
        tenant_id: TenantId,
        transfer: Transfer,
        expected: ExpectedVersion,
    ) -> Result<Transfer, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE transfers
            SET status = $3, version = $4
            WHERE tenant_id = $1
                AND id = $2
                AND ($5::bigint IS NULL OR version = $5)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(transfer.id.0.as_uuid())
        .bind(transfer.status.to_string())
        .bind(transfer.version as i64)
        .bind(version_guard(expected))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_transfer", e))?;

        if result.rows_affected() == 0 {
            return Err(
                if self.row_exists("transfers", tenant_id, *transfer.id.0.as_uuid()).await? {
                    StoreError::conflict(format!("transfer {}: stale version", transfer.id))
                } else {
                    StoreError::not_found(format!("transfer {}", transfer.id))
                },
            );
        }
        Ok(transfer)
    }
}

#[async_trait]
impl SaleStore for PostgresStore {
    #[instrument(skip(self, sale), fields(tenant_id = %tenant_id, sale_id = %sale.id), err)]
    async fn insert_sale(&self, tenant_id: TenantId, sale: Sale) -> Result<Sale, StoreError> {
        if sale.tenant_id != tenant_id {
            return Err(StoreError::constraint("sale belongs to another tenant"));
        }

        sqlx::query(
            r#"
            INSERT INTO sales (tenant_id, id, store_id, user_id, status, items, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(sale.id.0.as_uuid())
        .bind(sale.store_id.0.as_uuid())
        .bind(sale.user_id.as_uuid())
        .bind(sale.status.to_string())
        .bind(Json(&sale.items))
        .bind(sale.created_at)
        .bind(sale.version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_sale", e))?;
        Ok(sale)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, sale_id = %sale_id), err)]
    async fn get_sale(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<Sale, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, store_id, user_id, status, items, created_at, version
            FROM sales
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(sale_id.0.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_sale", e))?
        .ok_or_else(|| StoreError::not_found(format!("sale {sale_id}")))?;

        sale_from_row(tenant_id, &row)
    }

    #[instrument(skip(self, sale), fields(tenant_id = %tenant_id, sale_id = %sale.id), err)]
    async fn update_sale(
        &self,
        tenant_id: TenantId,
        sale: Sale,
        expected: ExpectedVersion,
    ) -> Result<Sale, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sales
            SET status = $3, items = $4, version = $5
            WHERE tenant_id = $1
                AND id = $2
                AND ($6::bigint IS NULL OR version = $6)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(sale.id.0.as_uuid())
        .bind(sale.status.to_string())
        .bind(Json(&sale.items))
        .bind(sale.version as i64)
        .bind(version_guard(expected))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_sale", e))?;

        if result.rows_affected() == 0 {
            return Err(
                if self.row_exists("sales", tenant_id, *sale.id.0.as_uuid()).await? {
                    StoreError::conflict(format!("sale {}: stale version", sale.id))
                } else {
                    StoreError::not_found(format!("sale {}", sale.id))
                },
            );
        }
        Ok(sale)
    }
}

#[async_trait]
impl RolePermissionStore for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, role_id = %role_id), err)]
    async fn list_role_permissions(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> Result<Vec<PermissionId>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT permission_id
            FROM role_permissions
            WHERE tenant_id = $1 AND role_id = $2
            ORDER BY permission_id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(role_id.0.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_role_permissions", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<Uuid, _>("permission_id")
                    .map(|id| PermissionId::new(AggregateId::from_uuid(id)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_role_permissions", e))
    }

    #[instrument(skip(self, permission_ids), fields(tenant_id = %tenant_id, role_id = %role_id, count = permission_ids.len()), err)]
    async fn insert_role_permissions(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<(), StoreError> {
        let ids: Vec<Uuid> = permission_ids.iter().map(|p| *p.0.as_uuid()).collect();

        // One statement for the whole batch.
        sqlx::query(
            r#"
            INSERT INTO role_permissions (tenant_id, role_id, permission_id)
            SELECT $1, $2, permission_id
            FROM UNNEST($3::uuid[]) AS batch(permission_id)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(role_id.0.as_uuid())
        .bind(&ids)
        .execute(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert_role_permissions", e) {
            StoreError::Conflict(msg) => StoreError::Constraint(msg),
            other => other,
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, role_id = %role_id, permission_id = %permission_id), err)]
    async fn delete_role_permission(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM role_permissions WHERE tenant_id = $1 AND role_id = $2 AND permission_id = $3",
        )
        .bind(tenant_id.as_uuid())
        .bind(role_id.0.as_uuid())
        .bind(permission_id.0.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_role_permission", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some(code) if code.starts_with("23") => StoreError::Constraint(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("no row in {operation}")),
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_version_binds_null_guard() {
        assert_eq!(version_guard(ExpectedVersion::Any), None);
        assert_eq!(version_guard(ExpectedVersion::Exact(4)), Some(4));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = map_sqlx_error("get_transfer", sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::NotFound(msg) if msg.contains("get_transfer")));
    }

    #[test]
    fn pool_closed_maps_to_backend() {
        let err = map_sqlx_error("list_stock", sqlx::Error::PoolClosed);
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn schema_declares_every_table() {
        for table in [
            "stock_records",
            "transfers",
            "transfer_items",
            "sales",
            "role_permissions",
        ] {
            assert!(SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")));
        }
    }
}
