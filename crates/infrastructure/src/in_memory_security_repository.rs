//! In-memory security repository for tests and embedded use.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use wakala_application::{AuthorizationRepository, RoleUpsert, SecurityAdminRepository};
use wakala_core::{AppError, AppResult};
use wakala_domain::{
    ActorAccount, ActorId, ActorSnapshot, PermissionDefinition, PermissionName, Role, RoleId,
};

/// In-memory implementation of the authorization and admin ports.
///
/// One struct backs both ports so actor records, roles, assignments and the
/// permission catalog stay consistent with each other.
#[derive(Debug, Default)]
pub struct InMemorySecurityRepository {
    actors: RwLock<HashMap<ActorId, ActorAccount>>,
    roles: RwLock<Vec<Role>>,
    assignments: RwLock<HashMap<(ActorId, RoleId), bool>>,
    permissions: RwLock<Vec<PermissionDefinition>>,
}

impl InMemorySecurityRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an actor record.
    pub async fn put_actor(&self, account: ActorAccount) {
        self.actors.write().await.insert(account.id, account);
    }

    /// Returns one actor record, if present.
    pub async fn find_actor(&self, actor_id: ActorId) -> Option<ActorAccount> {
        self.actors.read().await.get(&actor_id).cloned()
    }
}

#[async_trait]
impl AuthorizationRepository for InMemorySecurityRepository {
    async fn find_actor_snapshot(&self, actor_id: ActorId) -> AppResult<Option<ActorSnapshot>> {
        let Some(account) = self.actors.read().await.get(&actor_id).cloned() else {
            return Ok(None);
        };

        let assignments = self.assignments.read().await;
        let roles = self
            .roles
            .read()
            .await
            .iter()
            .filter(|role| {
                assignments
                    .get(&(actor_id, role.id))
                    .copied()
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        Ok(Some(account.into_snapshot(roles)))
    }

    async fn list_active_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        Ok(self
            .permissions
            .read()
            .await
            .iter()
            .filter(|definition| definition.active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SecurityAdminRepository for InMemorySecurityRepository {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let mut roles = self.roles.read().await.clone();
        roles.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(roles)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .iter()
            .find(|role| role.id == role_id)
            .cloned())
    }

    async fn insert_role(&self, role: Role) -> AppResult<Role> {
        let mut roles = self.roles.write().await;
        if roles.iter().any(|stored| stored.name == role.name) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name
            )));
        }

        roles.push(role.clone());
        Ok(role)
    }

    async fn update_role(&self, role: Role) -> AppResult<Role> {
        let mut roles = self.roles.write().await;
        if roles
            .iter()
            .any(|stored| stored.id != role.id && stored.name == role.name)
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name
            )));
        }

        let Some(slot) = roles.iter_mut().find(|stored| stored.id == role.id) else {
            return Err(AppError::NotFound(format!("role '{}'", role.id)));
        };
        *slot = role.clone();
        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        let before = roles.len();
        roles.retain(|role| role.id != role_id);
        if roles.len() == before {
            return Err(AppError::NotFound(format!("role '{role_id}'")));
        }

        self.assignments
            .write()
            .await
            .retain(|(_, assigned_role), _| *assigned_role != role_id);
        Ok(())
    }

    async fn count_active_assignments(&self, role_id: RoleId) -> AppResult<usize> {
        Ok(self
            .assignments
            .read()
            .await
            .iter()
            .filter(|((_, assigned_role), active)| *assigned_role == role_id && **active)
            .count())
    }

    async fn assign_role(&self, actor_id: ActorId, role_id: RoleId) -> AppResult<()> {
        self.assignments
            .write()
            .await
            .insert((actor_id, role_id), true);
        Ok(())
    }

    async fn unassign_role(&self, actor_id: ActorId, role_id: RoleId) -> AppResult<()> {
        self.assignments
            .write()
            .await
            .insert((actor_id, role_id), false);
        Ok(())
    }

    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        let mut permissions = self.permissions.read().await.clone();
        permissions.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(permissions)
    }

    async fn upsert_permission(&self, definition: PermissionDefinition) -> AppResult<()> {
        let mut permissions = self.permissions.write().await;
        if let Some(slot) = permissions
            .iter_mut()
            .find(|stored| stored.name == definition.name)
        {
            *slot = definition;
        } else {
            permissions.push(definition);
        }
        Ok(())
    }

    async fn set_permission_active(&self, name: &PermissionName, active: bool) -> AppResult<()> {
        let mut permissions = self.permissions.write().await;
        let Some(slot) = permissions.iter_mut().find(|stored| &stored.name == name) else {
            return Err(AppError::NotFound(format!("permission '{name}'")));
        };
        slot.active = active;
        Ok(())
    }

    async fn upsert_role(&self, upsert: RoleUpsert) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        if let Some(slot) = roles.iter_mut().find(|stored| stored.name == upsert.name) {
            slot.display_name = upsert.display_name;
            slot.is_system_role = upsert.is_system_role;
            slot.permissions = upsert.permissions;
        } else {
            roles.push(Role {
                id: RoleId::new(),
                name: upsert.name,
                display_name: upsert.display_name,
                permissions: upsert.permissions,
                is_system_role: upsert.is_system_role,
                active: true,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use wakala_application::{AccessService, SecurityAdminService};
    use wakala_domain::{
        ActorAccount, ActorId, LegacyPermissionFlags, PermissionName, PrimaryRole,
        SeedCatalog,
    };

    use super::{InMemorySecurityRepository, SecurityAdminRepository};

    fn account(primary_role: PrimaryRole) -> ActorAccount {
        ActorAccount {
            id: ActorId::new(),
            username: "test".to_owned(),
            primary_role,
            legacy: LegacyPermissionFlags::default(),
            commission_rate: Decimal::ZERO,
            active: true,
            failed_logins: 0,
            locked_until: None,
        }
    }

    fn catalog() -> SeedCatalog {
        let payload = serde_json::json!({
            "permissions": [
                { "name": "roles.read", "display_name": "View roles" },
                { "name": "orders.view_own", "display_name": "Own orders" }
            ],
            "roles": [
                { "name": "admin", "display_name": "Administrator", "grant_all": true },
                {
                    "name": "distributor",
                    "display_name": "Distributor",
                    "permissions": ["orders.view_own"]
                }
            ]
        });
        serde_json::from_value(payload).unwrap_or_else(|_| panic!("test catalog must parse"))
    }

    fn name(value: &str) -> PermissionName {
        PermissionName::new(value).unwrap_or_else(|_| panic!("test permission name"))
    }

    #[tokio::test]
    async fn assigned_role_grants_flow_into_the_snapshot() {
        let repository = Arc::new(InMemorySecurityRepository::new());
        let admin_service = SecurityAdminService::new(repository.clone());
        let access = AccessService::new(repository.clone());

        assert!(admin_service.seed_catalog(&catalog()).await.is_ok());

        let actor = account(PrimaryRole::Employee);
        let actor_id = actor.id;
        repository.put_actor(actor).await;

        let distributor_role = repository
            .list_roles()
            .await
            .ok()
            .and_then(|roles| roles.into_iter().find(|role| role.name == "distributor"));
        let Some(distributor_role) = distributor_role else {
            return;
        };

        assert_eq!(
            access
                .has_permission(actor_id, &name("orders.view_own"))
                .await
                .ok(),
            Some(false)
        );

        assert!(
            admin_service
                .assign_role(actor_id, distributor_role.id)
                .await
                .is_ok()
        );
        assert_eq!(
            access
                .has_permission(actor_id, &name("orders.view_own"))
                .await
                .ok(),
            Some(true)
        );

        assert!(
            admin_service
                .unassign_role(actor_id, distributor_role.id)
                .await
                .is_ok()
        );
        assert_eq!(
            access
                .has_permission(actor_id, &name("orders.view_own"))
                .await
                .ok(),
            Some(false)
        );
    }

    #[tokio::test]
    async fn deleting_a_role_removes_its_assignments() {
        let repository = Arc::new(InMemorySecurityRepository::new());
        let admin_service = SecurityAdminService::new(repository.clone());
        assert!(admin_service.seed_catalog(&catalog()).await.is_ok());

        let created = admin_service
            .create_role(wakala_application::CreateRoleInput {
                name: "auditor".to_owned(),
                display_name: "Auditor".to_owned(),
                permissions: vec![name("roles.read")],
            })
            .await;
        let Ok(created) = created else {
            return;
        };

        let actor_id = ActorId::new();
        assert!(admin_service.assign_role(actor_id, created.id).await.is_ok());
        assert!(
            admin_service
                .unassign_role(actor_id, created.id)
                .await
                .is_ok()
        );
        assert!(admin_service.delete_role(created.id).await.is_ok());
        assert_eq!(
            repository.count_active_assignments(created.id).await.ok(),
            Some(0)
        );
    }
}
