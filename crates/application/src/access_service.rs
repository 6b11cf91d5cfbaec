//! Actor permission resolution service.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use wakala_core::{AppError, AppResult};
use wakala_domain::{ActorId, ActorSnapshot, PermissionDefinition, PermissionName, access};

/// Repository port for actor and catalog lookups.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Fetches the resolution snapshot for one actor: primary role, legacy
    /// flags, and attached roles with their permission sets.
    async fn find_actor_snapshot(&self, actor_id: ActorId) -> AppResult<Option<ActorSnapshot>>;

    /// Lists all active permissions in the catalog.
    async fn list_active_permissions(&self) -> AppResult<Vec<PermissionDefinition>>;
}

/// Application service answering permission questions about actors.
///
/// Evaluation is fetch-then-decide: one snapshot read, then the pure
/// resolution functions from the domain crate. The service never mutates the
/// actor record and is safe to share across tasks.
#[derive(Clone)]
pub struct AccessService {
    repository: Arc<dyn AuthorizationRepository>,
}

impl AccessService {
    /// Creates an access service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuthorizationRepository>) -> Self {
        Self { repository }
    }

    /// Returns whether the actor holds the named permission.
    ///
    /// A missing actor record is an authentication failure
    /// ([`AppError::Unauthorized`]), never a silent `false`.
    pub async fn has_permission(
        &self,
        actor_id: ActorId,
        permission: &PermissionName,
    ) -> AppResult<bool> {
        let snapshot = self.snapshot(actor_id).await?;
        Ok(access::has_permission(&snapshot, permission))
    }

    /// Ensures the actor holds the named permission.
    pub async fn require_permission(
        &self,
        actor_id: ActorId,
        permission: &PermissionName,
    ) -> AppResult<()> {
        if self.has_permission(actor_id, permission).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "actor '{actor_id}' is missing permission '{permission}'"
        )))
    }

    /// Returns whether the actor holds every named permission.
    ///
    /// Vacuously true for an empty list.
    pub async fn has_all_permissions(
        &self,
        actor_id: ActorId,
        permissions: &[PermissionName],
    ) -> AppResult<bool> {
        let snapshot = self.snapshot(actor_id).await?;
        Ok(access::has_all_permissions(&snapshot, permissions))
    }

    /// Returns whether the actor holds at least one named permission.
    ///
    /// False for an empty list.
    pub async fn has_any_permission(
        &self,
        actor_id: ActorId,
        permissions: &[PermissionName],
    ) -> AppResult<bool> {
        let snapshot = self.snapshot(actor_id).await?;
        Ok(access::has_any_permission(&snapshot, permissions))
    }

    /// Materializes the actor's full permission set, deduplicated across
    /// attached roles; a superuser receives every active catalog permission.
    pub async fn effective_permissions(
        &self,
        actor_id: ActorId,
    ) -> AppResult<BTreeSet<PermissionName>> {
        let snapshot = self.snapshot(actor_id).await?;

        // The catalog is only needed for the superuser substitution.
        let catalog = if snapshot.primary_role.is_superuser() {
            self.repository.list_active_permissions().await?
        } else {
            Vec::new()
        };

        Ok(access::effective_permissions(&snapshot, &catalog))
    }

    async fn snapshot(&self, actor_id: ActorId) -> AppResult<ActorSnapshot> {
        self.repository
            .find_actor_snapshot(actor_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(format!("actor '{actor_id}' not found")))
    }
}
