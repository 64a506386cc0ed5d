use serde::{Deserialize, Serialize};

use retailpos_core::{TenantId, UserId};

use crate::{Permission, Role, RoleId};

/// Resolved caller context, passed explicitly into every ledger call.
///
/// `tenant_id` scopes every store query; `user_id` is recorded on transfers
/// and sales the caller creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role_id: RoleId,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl SessionContext {
    pub fn new(user_id: UserId, tenant_id: TenantId, role_id: RoleId, role: Role) -> Self {
        Self {
            user_id,
            tenant_id,
            role_id,
            role,
            permissions: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retailpos_core::AggregateId;

    fn test_context() -> SessionContext {
        SessionContext::new(
            UserId::new(),
            TenantId::new(),
            RoleId::new(AggregateId::new()),
            Role::new("cashier"),
        )
    }

    #[test]
    fn new_context_carries_identity_and_no_permissions() {
        let ctx = test_context();
        assert_eq!(ctx.role.as_str(), "cashier");
        assert!(ctx.permissions.is_empty());
    }

    #[test]
    fn with_permissions_appends() {
        let ctx = test_context()
            .with_permissions([Permission::new("sales.create")])
            .with_permissions([Permission::new("inventory.transfer")]);
        let names: Vec<&str> = ctx.permissions.iter().map(Permission::as_str).collect();
        assert_eq!(names, vec!["sales.create", "inventory.transfer"]);
    }

    #[test]
    fn serializes_role_and_permissions_as_plain_strings() {
        let ctx = test_context().with_permissions([Permission::new("roles.manage")]);
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["role"], "cashier");
        assert_eq!(json["permissions"], serde_json::json!(["roles.manage"]));
    }
}
