use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use wakala_application::{AuthorizationRepository, RoleUpsert, SecurityAdminRepository};
use wakala_core::{AppError, AppResult};
use wakala_domain::{
    ActorAccount, ActorId, ActorSnapshot, LegacyPermissionFlags, PermissionDefinition,
    PermissionName, PrimaryRole, Role, RoleId,
};

/// PostgreSQL-backed repository for actor snapshots, roles and the
/// permission catalog.
#[derive(Clone)]
pub struct PostgresSecurityRepository {
    pool: PgPool,
}

impl PostgresSecurityRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ActorRow {
    id: uuid::Uuid,
    username: String,
    primary_role: String,
    can_create_companies: bool,
    can_create_invoices: bool,
    can_manage_clients: bool,
    can_view_reports: bool,
    commission_rate: Decimal,
    active: bool,
    failed_logins: i32,
    locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: uuid::Uuid,
    name: String,
    display_name: String,
    is_system_role: bool,
    active: bool,
    permission: Option<String>,
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    name: String,
    display_name: String,
    active: bool,
}

impl ActorRow {
    fn into_account(self) -> AppResult<ActorAccount> {
        let primary_role = PrimaryRole::from_str(self.primary_role.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "invalid stored primary role for actor '{}': {error}",
                self.id
            ))
        })?;

        Ok(ActorAccount {
            id: ActorId::from_uuid(self.id),
            username: self.username,
            primary_role,
            legacy: LegacyPermissionFlags {
                can_create_companies: self.can_create_companies,
                can_create_invoices: self.can_create_invoices,
                can_manage_clients: self.can_manage_clients,
                can_view_reports: self.can_view_reports,
            },
            commission_rate: self.commission_rate,
            active: self.active,
            failed_logins: u32::try_from(self.failed_logins).unwrap_or(0),
            locked_until: self.locked_until,
        })
    }
}

impl PermissionRow {
    fn into_definition(self) -> AppResult<PermissionDefinition> {
        let name = PermissionName::new(self.name.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "invalid stored permission name '{}': {error}",
                self.name
            ))
        })?;

        Ok(PermissionDefinition {
            name,
            display_name: self.display_name,
            active: self.active,
        })
    }
}

fn aggregate_roles(rows: Vec<RoleRow>) -> AppResult<Vec<Role>> {
    let mut by_id: BTreeMap<uuid::Uuid, Role> = BTreeMap::new();

    for row in rows {
        let role = by_id.entry(row.id).or_insert_with(|| Role {
            id: RoleId::from_uuid(row.id),
            name: row.name.clone(),
            display_name: row.display_name.clone(),
            permissions: BTreeSet::new(),
            is_system_role: row.is_system_role,
            active: row.active,
        });

        if let Some(permission_value) = row.permission {
            let permission =
                PermissionName::new(permission_value.as_str()).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid stored grant '{permission_value}' on role '{}': {error}",
                        row.name
                    ))
                })?;
            role.permissions.insert(permission);
        }
    }

    let mut roles = by_id.into_values().collect::<Vec<_>>();
    roles.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(roles)
}

fn map_role_conflict(error: sqlx::Error, role_name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("role '{role_name}' already exists"));
    }

    AppError::Internal(format!("failed to persist role: {error}"))
}

#[async_trait]
impl AuthorizationRepository for PostgresSecurityRepository {
    async fn find_actor_snapshot(&self, actor_id: ActorId) -> AppResult<Option<ActorSnapshot>> {
        let row = sqlx::query_as::<_, ActorRow>(
            r#"
            SELECT
                id,
                username,
                primary_role,
                can_create_companies,
                can_create_invoices,
                can_manage_clients,
                can_view_reports,
                commission_rate,
                active,
                failed_logins,
                locked_until
            FROM actors
            WHERE id = $1
            "#,
        )
        .bind(actor_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load actor: {error}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let account = row.into_account()?;

        let role_rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id,
                roles.name,
                roles.display_name,
                roles.is_system_role,
                roles.active,
                grants.permission
            FROM actor_roles
            INNER JOIN roles
                ON roles.id = actor_roles.role_id
            LEFT JOIN role_grants AS grants
                ON grants.role_id = roles.id
            WHERE actor_roles.actor_id = $1
                AND actor_roles.active
            ORDER BY roles.name, grants.permission
            "#,
        )
        .bind(actor_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load actor roles: {error}")))?;

        let roles = aggregate_roles(role_rows)?;
        Ok(Some(account.into_snapshot(roles)))
    }

    async fn list_active_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT name, display_name, active
            FROM permissions
            WHERE active
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?;

        rows.into_iter().map(PermissionRow::into_definition).collect()
    }
}

#[async_trait]
impl SecurityAdminRepository for PostgresSecurityRepository {
    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id,
                roles.name,
                roles.display_name,
                roles.is_system_role,
                roles.active,
                grants.permission
            FROM roles
            LEFT JOIN role_grants AS grants
                ON grants.role_id = roles.id
            ORDER BY roles.name, grants.permission
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        aggregate_roles(rows)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id,
                roles.name,
                roles.display_name,
                roles.is_system_role,
                roles.active,
                grants.permission
            FROM roles
            LEFT JOIN role_grants AS grants
                ON grants.role_id = roles.id
            WHERE roles.id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?;

        Ok(aggregate_roles(rows)?.into_iter().next())
    }

    async fn insert_role(&self, role: Role) -> AppResult<Role> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, display_name, is_system_role, active)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.name.as_str())
        .bind(role.display_name.as_str())
        .bind(role.is_system_role)
        .bind(role.active)
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_role_conflict(error, role.name.as_str()))?;

        for permission in &role.permissions {
            sqlx::query(
                r#"
                INSERT INTO role_grants (role_id, permission)
                VALUES ($1, $2)
                ON CONFLICT (role_id, permission) DO NOTHING
                "#,
            )
            .bind(role.id.as_uuid())
            .bind(permission.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist role grants: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(role)
    }

    async fn update_role(&self, role: Role) -> AppResult<Role> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE roles
            SET name = $2, display_name = $3, is_system_role = $4, active = $5
            WHERE id = $1
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.name.as_str())
        .bind(role.display_name.as_str())
        .bind(role.is_system_role)
        .bind(role.active)
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_role_conflict(error, role.name.as_str()))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("role '{}'", role.id)));
        }

        sqlx::query("DELETE FROM role_grants WHERE role_id = $1")
            .bind(role.id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to clear role grants: {error}"))
            })?;

        for permission in &role.permissions {
            sqlx::query(
                r#"
                INSERT INTO role_grants (role_id, permission)
                VALUES ($1, $2)
                "#,
            )
            .bind(role.id.as_uuid())
            .bind(permission.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist role grants: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        sqlx::query("DELETE FROM actor_roles WHERE role_id = $1")
            .bind(role_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to clear role assignments: {error}"))
            })?;

        sqlx::query("DELETE FROM role_grants WHERE role_id = $1")
            .bind(role_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to clear role grants: {error}"))
            })?;

        let rows_affected = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?
            .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("role '{role_id}'")));
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }

    async fn count_active_assignments(&self, role_id: RoleId) -> AppResult<usize> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM actor_roles
            WHERE role_id = $1 AND active
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count assignments: {error}")))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn assign_role(&self, actor_id: ActorId, role_id: RoleId) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO actor_roles (actor_id, role_id, active)
            VALUES ($1, $2, true)
            ON CONFLICT (actor_id, role_id) DO UPDATE
            SET active = true
            "#,
        )
        .bind(actor_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to assign role: {error}")))?;

        Ok(())
    }

    async fn unassign_role(&self, actor_id: ActorId, role_id: RoleId) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE actor_roles
            SET active = false
            WHERE actor_id = $1 AND role_id = $2
            "#,
        )
        .bind(actor_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to unassign role: {error}")))?;

        Ok(())
    }

    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT name, display_name, active
            FROM permissions
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?;

        rows.into_iter().map(PermissionRow::into_definition).collect()
    }

    async fn upsert_permission(&self, definition: PermissionDefinition) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO permissions (name, display_name, active)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                active = EXCLUDED.active
            "#,
        )
        .bind(definition.name.as_str())
        .bind(definition.display_name.as_str())
        .bind(definition.active)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to upsert permission: {error}")))?;

        Ok(())
    }

    async fn set_permission_active(&self, name: &PermissionName, active: bool) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE permissions
            SET active = $2
            WHERE name = $1
            "#,
        )
        .bind(name.as_str())
        .bind(active)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update permission: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("permission '{name}'")));
        }

        Ok(())
    }

    async fn upsert_role(&self, upsert: RoleUpsert) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let role_id = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            INSERT INTO roles (id, name, display_name, is_system_role, active)
            VALUES ($1, $2, $3, $4, true)
            ON CONFLICT (name) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                is_system_role = EXCLUDED.is_system_role
            RETURNING id
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(upsert.name.as_str())
        .bind(upsert.display_name.as_str())
        .bind(upsert.is_system_role)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to upsert role: {error}")))?;

        sqlx::query("DELETE FROM role_grants WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to clear role grants: {error}"))
            })?;

        for permission in &upsert.permissions {
            sqlx::query(
                r#"
                INSERT INTO role_grants (role_id, permission)
                VALUES ($1, $2)
                "#,
            )
            .bind(role_id)
            .bind(permission.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist role grants: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        tracing::debug!(role = %upsert.name, "seeded role upserted");
        Ok(())
    }
}
