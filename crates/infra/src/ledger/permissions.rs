use tracing::instrument;

use retailpos_auth::{PermissionDiff, PermissionId, RoleId, SessionContext};

use super::{InventoryLedger, LedgerError};
use crate::store::RecordStore;

impl<S> InventoryLedger<S>
where
    S: RecordStore,
{
    /// Bring a role's permission set to exactly `desired`.
    ///
    /// One batch insert for the missing permissions (skipped when none) and one
    /// delete per surplus permission. Not transactional: if a later write fails
    /// the role keeps whatever earlier writes did. Calling again with the same
    /// set issues no writes. Returns the diff that was applied.
    #[instrument(skip(self, ctx, desired), fields(tenant_id = %ctx.tenant_id, desired = desired.len()), err)]
    pub async fn reconcile_permissions(
        &self,
        ctx: &SessionContext,
        role_id: RoleId,
        desired: &[PermissionId],
    ) -> Result<PermissionDiff, LedgerError> {
        let current = self
            .store
            .list_role_permissions(ctx.tenant_id, role_id)
            .await?;
        let diff = PermissionDiff::compute(current, desired.iter().copied());

        if diff.is_empty() {
            tracing::debug!("role permissions already up to date");
            return Ok(diff);
        }

        if !diff.to_add.is_empty() {
            self.store
                .insert_role_permissions(ctx.tenant_id, role_id, &diff.to_add)
                .await?;
        }
        for permission_id in &diff.to_remove {
            self.store
                .delete_role_permission(ctx.tenant_id, role_id, *permission_id)
                .await?;
        }

        tracing::info!(
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            "role permissions reconciled"
        );
        Ok(diff)
    }
}
