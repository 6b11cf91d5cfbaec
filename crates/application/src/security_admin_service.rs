//! Role and permission-catalog administration.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use wakala_core::{AppError, AppResult, NonEmptyString};
use wakala_domain::{
    ActorId, PermissionDefinition, PermissionName, Role, RoleId, SeedCatalog,
};

/// System-role payload applied during seeding, keyed by unique name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleUpsert {
    /// Unique role name.
    pub name: String,
    /// Human-readable label.
    pub display_name: String,
    /// Whether the role is system-owned after seeding.
    pub is_system_role: bool,
    /// Effective grants after the upsert.
    pub permissions: BTreeSet<PermissionName>,
}

/// Repository port for role, assignment and catalog administration.
#[async_trait]
pub trait SecurityAdminRepository: Send + Sync {
    /// Lists every role.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Finds one role by identifier.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Persists a new role; the role name is unique.
    async fn insert_role(&self, role: Role) -> AppResult<Role>;

    /// Replaces a stored role.
    async fn update_role(&self, role: Role) -> AppResult<Role>;

    /// Deletes a role.
    async fn delete_role(&self, role_id: RoleId) -> AppResult<()>;

    /// Counts active assignments of a role across all actors.
    async fn count_active_assignments(&self, role_id: RoleId) -> AppResult<usize>;

    /// Attaches a role to an actor; an existing inactive assignment is
    /// reactivated instead of duplicated.
    async fn assign_role(&self, actor_id: ActorId, role_id: RoleId) -> AppResult<()>;

    /// Deactivates an actor's role assignment.
    async fn unassign_role(&self, actor_id: ActorId, role_id: RoleId) -> AppResult<()>;

    /// Lists the full permission catalog.
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>>;

    /// Inserts or updates a catalog permission, keyed by name.
    async fn upsert_permission(&self, definition: PermissionDefinition) -> AppResult<()>;

    /// Flips a permission's active flag.
    async fn set_permission_active(
        &self,
        name: &PermissionName,
        active: bool,
    ) -> AppResult<()>;

    /// Inserts or updates a role by unique name, preserving the stored
    /// identifier and any existing assignments.
    async fn upsert_role(&self, upsert: RoleUpsert) -> AppResult<()>;
}

/// Input payload for creating custom roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role name.
    pub name: String,
    /// Human-readable label.
    pub display_name: String,
    /// Grants to attach to the role.
    pub permissions: Vec<PermissionName>,
}

/// Replacement values for an existing custom role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRoleInput {
    /// New unique role name.
    pub name: String,
    /// New human-readable label.
    pub display_name: String,
    /// New grants.
    pub permissions: Vec<PermissionName>,
    /// New active flag.
    pub active: bool,
}

/// Application service for role and catalog administration.
///
/// System roles are seeded configuration: they can never be edited or
/// deleted through this service, and a role with active assignments cannot
/// be deleted until those assignments are removed.
#[derive(Clone)]
pub struct SecurityAdminService {
    repository: Arc<dyn SecurityAdminRepository>,
}

impl SecurityAdminService {
    /// Creates the service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn SecurityAdminRepository>) -> Self {
        Self { repository }
    }

    /// Lists every role.
    pub async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.repository.list_roles().await
    }

    /// Lists the full permission catalog.
    pub async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        self.repository.list_permissions().await
    }

    /// Creates a custom role with validated grants.
    pub async fn create_role(&self, input: CreateRoleInput) -> AppResult<Role> {
        let name = NonEmptyString::new(input.name)?;
        self.ensure_known_grants(&input.permissions).await?;

        let role = Role {
            id: RoleId::new(),
            name: name.into(),
            display_name: input.display_name,
            permissions: input.permissions.into_iter().collect(),
            is_system_role: false,
            active: true,
        };

        self.repository.insert_role(role).await
    }

    /// Updates a custom role; system roles are immutable.
    pub async fn update_role(&self, role_id: RoleId, input: UpdateRoleInput) -> AppResult<Role> {
        let current = self.find_role(role_id).await?;
        if current.is_system_role {
            return Err(AppError::SystemRoleImmutable(current.name));
        }

        let name = NonEmptyString::new(input.name)?;
        self.ensure_known_grants(&input.permissions).await?;

        let updated = Role {
            id: current.id,
            name: name.into(),
            display_name: input.display_name,
            permissions: input.permissions.into_iter().collect(),
            is_system_role: false,
            active: input.active,
        };

        self.repository.update_role(updated).await
    }

    /// Deletes a custom role with no active assignments.
    pub async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let current = self.find_role(role_id).await?;
        if current.is_system_role {
            return Err(AppError::SystemRoleImmutable(current.name));
        }

        let assignments = self.repository.count_active_assignments(role_id).await?;
        if assignments > 0 {
            return Err(AppError::RoleInUse {
                role: current.name,
                assignments,
            });
        }

        self.repository.delete_role(role_id).await
    }

    /// Attaches a role to an actor, reactivating a prior assignment if one
    /// exists.
    pub async fn assign_role(&self, actor_id: ActorId, role_id: RoleId) -> AppResult<()> {
        let _ = self.find_role(role_id).await?;
        self.repository.assign_role(actor_id, role_id).await
    }

    /// Deactivates an actor's role assignment.
    pub async fn unassign_role(&self, actor_id: ActorId, role_id: RoleId) -> AppResult<()> {
        self.repository.unassign_role(actor_id, role_id).await
    }

    /// Flips a catalog permission's active flag — the only mutation allowed
    /// on a permission once roles reference it.
    pub async fn set_permission_active(
        &self,
        name: &PermissionName,
        active: bool,
    ) -> AppResult<()> {
        self.repository.set_permission_active(name, active).await
    }

    /// Applies a seed catalog: idempotent upserts keyed by unique name,
    /// never a delete-and-recreate, so re-running against a populated store
    /// is safe and preserves custom roles and assignments.
    pub async fn seed_catalog(&self, catalog: &SeedCatalog) -> AppResult<()> {
        catalog.validate()?;

        for permission in &catalog.permissions {
            self.repository
                .upsert_permission(PermissionDefinition {
                    name: permission.name.clone(),
                    display_name: permission.display_name.clone(),
                    active: permission.active,
                })
                .await?;
        }

        for role in &catalog.roles {
            let permissions: BTreeSet<PermissionName> = if role.grant_all {
                catalog
                    .permissions
                    .iter()
                    .filter(|permission| permission.active)
                    .map(|permission| permission.name.clone())
                    .collect()
            } else {
                role.permissions.iter().cloned().collect()
            };

            self.repository
                .upsert_role(RoleUpsert {
                    name: role.name.clone(),
                    display_name: role.display_name.clone(),
                    is_system_role: role.is_system_role,
                    permissions,
                })
                .await?;
        }

        Ok(())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Role> {
        self.repository
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}'")))
    }

    async fn ensure_known_grants(&self, grants: &[PermissionName]) -> AppResult<()> {
        if grants.is_empty() {
            return Ok(());
        }

        let known: BTreeSet<PermissionName> = self
            .repository
            .list_permissions()
            .await?
            .into_iter()
            .map(|definition| definition.name)
            .collect();

        for grant in grants {
            if !known.contains(grant) {
                return Err(AppError::Validation(format!(
                    "unknown permission '{grant}'"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::RwLock;
    use wakala_core::{AppError, AppResult};
    use wakala_domain::{
        ActorId, PermissionDefinition, PermissionName, Role, RoleId, SeedCatalog,
    };

    use super::{
        CreateRoleInput, RoleUpsert, SecurityAdminRepository, SecurityAdminService,
        UpdateRoleInput,
    };

    #[derive(Default)]
    struct FakeSecurityAdminRepository {
        roles: RwLock<Vec<Role>>,
        permissions: RwLock<Vec<PermissionDefinition>>,
        assignments: RwLock<HashMap<(ActorId, RoleId), bool>>,
    }

    #[async_trait]
    impl SecurityAdminRepository for FakeSecurityAdminRepository {
        async fn list_roles(&self) -> AppResult<Vec<Role>> {
            Ok(self.roles.read().await.clone())
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
            let Some(slot) = roles.iter_mut().find(|stored| stored.id == role.id) else {
                return Err(AppError::NotFound(format!("role '{}'", role.id)));
            };
            *slot = role.clone();
            Ok(role)
        }

        async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
            self.roles.write().await.retain(|role| role.id != role_id);
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
            Ok(self.permissions.read().await.clone())
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

        async fn set_permission_active(
            &self,
            name: &PermissionName,
            active: bool,
        ) -> AppResult<()> {
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

    fn name(value: &str) -> PermissionName {
        PermissionName::new(value).unwrap_or_else(|_| panic!("test permission name"))
    }

    fn service() -> (SecurityAdminService, Arc<FakeSecurityAdminRepository>) {
        let repository = Arc::new(FakeSecurityAdminRepository::default());
        (SecurityAdminService::new(repository.clone()), repository)
    }

    fn sample_catalog() -> SeedCatalog {
        let payload = serde_json::json!({
            "permissions": [
                { "name": "roles.read", "display_name": "View roles" },
                { "name": "roles.create", "display_name": "Create roles" },
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

    async fn seeded() -> (SecurityAdminService, Arc<FakeSecurityAdminRepository>) {
        let (service, repository) = service();
        let result = service.seed_catalog(&sample_catalog()).await;
        assert!(result.is_ok());
        (service, repository)
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let (service, repository) = seeded().await;

        let custom = service
            .create_role(CreateRoleInput {
                name: "auditor".to_owned(),
                display_name: "Auditor".to_owned(),
                permissions: vec![name("roles.read")],
            })
            .await;
        assert!(custom.is_ok());

        // Re-running the seed must not duplicate or destroy anything.
        let rerun = service.seed_catalog(&sample_catalog()).await;
        assert!(rerun.is_ok());

        let roles = repository.roles.read().await;
        assert_eq!(roles.len(), 3);
        assert!(roles.iter().any(|role| role.name == "auditor"));
    }

    #[tokio::test]
    async fn grant_all_expands_to_the_active_catalog() {
        let (service, _) = seeded().await;
        let roles = service.list_roles().await;
        let admin = roles
            .ok()
            .and_then(|roles| roles.into_iter().find(|role| role.name == "admin"));
        assert!(admin.is_some_and(|role| role.permissions.len() == 3));
    }

    #[tokio::test]
    async fn system_roles_cannot_be_updated() {
        let (service, repository) = seeded().await;
        let role_id = repository
            .roles
            .read()
            .await
            .iter()
            .find(|role| role.name == "admin")
            .map(|role| role.id);
        let Some(role_id) = role_id else {
            return;
        };

        let result = service
            .update_role(
                role_id,
                UpdateRoleInput {
                    name: "admin".to_owned(),
                    display_name: "Renamed".to_owned(),
                    permissions: Vec::new(),
                    active: true,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::SystemRoleImmutable(_))));
    }

    #[tokio::test]
    async fn system_roles_cannot_be_deleted() {
        let (service, repository) = seeded().await;
        let role_id = repository
            .roles
            .read()
            .await
            .iter()
            .find(|role| role.name == "distributor")
            .map(|role| role.id);
        let Some(role_id) = role_id else {
            return;
        };

        let result = service.delete_role(role_id).await;
        assert!(matches!(result, Err(AppError::SystemRoleImmutable(_))));
    }

    #[tokio::test]
    async fn role_with_active_assignment_cannot_be_deleted() {
        let (service, _) = seeded().await;
        let custom = service
            .create_role(CreateRoleInput {
                name: "auditor".to_owned(),
                display_name: "Auditor".to_owned(),
                permissions: vec![name("roles.read")],
            })
            .await;
        let Ok(custom) = custom else {
            return;
        };

        let actor = ActorId::new();
        assert!(service.assign_role(actor, custom.id).await.is_ok());

        let blocked = service.delete_role(custom.id).await;
        assert!(matches!(blocked, Err(AppError::RoleInUse { .. })));

        // Removing the assignment frees the role for deletion.
        assert!(service.unassign_role(actor, custom.id).await.is_ok());
        assert!(service.delete_role(custom.id).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_grants_are_rejected() {
        let (service, _) = seeded().await;
        let result = service
            .create_role(CreateRoleInput {
                name: "auditor".to_owned(),
                display_name: "Auditor".to_owned(),
                permissions: vec![name("reports.export")],
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn duplicate_role_name_conflicts() {
        let (service, _) = seeded().await;
        let input = CreateRoleInput {
            name: "auditor".to_owned(),
            display_name: "Auditor".to_owned(),
            permissions: Vec::new(),
        };
        assert!(service.create_role(input.clone()).await.is_ok());
        let duplicate = service.create_role(input).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn permission_active_flag_can_be_toggled() {
        let (service, repository) = seeded().await;
        let result = service.set_permission_active(&name("roles.read"), false).await;
        assert!(result.is_ok());

        let toggled = repository
            .permissions
            .read()
            .await
            .iter()
            .find(|definition| definition.name == name("roles.read"))
            .map(|definition| definition.active);
        assert_eq!(toggled, Some(false));

        let missing = service
            .set_permission_active(&name("reports.export"), false)
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn deleting_a_missing_role_is_not_found() {
        let (service, _) = service();
        let result = service.delete_role(RoleId::new()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
