//! Permission catalog, role graph, and actor snapshot types.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wakala_core::{AppError, AppResult};

/// Validated `module.action` permission identifier.
///
/// The catalog is external configuration data, so names are open strings
/// rather than a closed enum: lowercase letters, digits, `_` and `-`, with
/// exactly one `.` separating a non-empty module from a non-empty action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionName(String);

impl PermissionName {
    /// Creates a validated permission name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        let Some((module, action)) = trimmed.split_once('.') else {
            return Err(AppError::Validation(format!(
                "permission name '{trimmed}' must be 'module.action'"
            )));
        };

        if module.is_empty() || action.is_empty() || action.contains('.') {
            return Err(AppError::Validation(format!(
                "permission name '{trimmed}' must be 'module.action'"
            )));
        }

        let valid_half = |half: &str| {
            half.chars()
                .all(|character| character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_' || character == '-')
        };
        if !valid_half(module) || !valid_half(action) {
            return Err(AppError::Validation(format!(
                "permission name '{trimmed}' contains unsupported characters"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the full `module.action` identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the module half of the identifier.
    #[must_use]
    pub fn module(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(module, _)| module)
    }

    /// Returns the action half of the identifier.
    #[must_use]
    pub fn action(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, action)| action)
    }
}

impl TryFrom<String> for PermissionName {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PermissionName> for String {
    fn from(value: PermissionName) -> Self {
        value.0
    }
}

impl FromStr for PermissionName {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl Display for PermissionName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Catalog entry for one known permission.
///
/// Immutable once referenced by a role, except for the `active` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    /// Unique `module.action` identifier.
    pub name: PermissionName,
    /// Human-readable label for administrative screens.
    pub display_name: String,
    /// Inactive permissions stay in the catalog but grant nothing.
    pub active: bool,
}

/// Unique identifier for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A named, reusable bundle of permissions assignable to actors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Unique role name.
    pub name: String,
    /// Human-readable label.
    pub display_name: String,
    /// Permission identifiers granted by this role.
    pub permissions: BTreeSet<PermissionName>,
    /// System roles are seeded and can never be edited or deleted.
    pub is_system_role: bool,
    /// Inactive roles grant nothing during resolution.
    pub active: bool,
}

impl Role {
    /// Returns whether this role grants the named permission.
    #[must_use]
    pub fn grants(&self, permission: &PermissionName) -> bool {
        self.permissions.contains(permission)
    }
}

/// Unique identifier for an actor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Creates a new random actor identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an actor identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ActorId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Primary discriminator role carried by every actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryRole {
    /// Superuser; bypasses every other permission check.
    Admin,
    /// Commission-earning distributor.
    Distributor,
    /// Manager with administrative grants through attached roles.
    Manager,
    /// Employee with limited grants through attached roles.
    Employee,
}

impl PrimaryRole {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Distributor => "distributor",
            Self::Manager => "manager",
            Self::Employee => "employee",
        }
    }

    /// Returns whether this role bypasses all permission checks.
    #[must_use]
    pub fn is_superuser(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl FromStr for PrimaryRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "distributor" => Ok(Self::Distributor),
            "manager" => Ok(Self::Manager),
            "employee" => Ok(Self::Employee),
            _ => Err(AppError::Validation(format!(
                "unknown primary role '{value}'"
            ))),
        }
    }
}

/// Legacy boolean permission bundle kept for backward compatibility.
///
/// Actors created under the old flag-only model carry these four booleans;
/// the resolver consults them through the fixed legacy mapping table before
/// any role-graph lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPermissionFlags {
    /// Grants create/update/delete on companies.
    pub can_create_companies: bool,
    /// Grants create/update/delete on invoices.
    pub can_create_invoices: bool,
    /// Grants create/update/delete on clients.
    pub can_manage_clients: bool,
    /// Grants read access to reports.
    pub can_view_reports: bool,
}

/// Stored actor record, before role resolution.
///
/// Repositories persist this shape; the resolver works on [`ActorSnapshot`],
/// which adds the resolved role graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorAccount {
    /// Stable actor identifier.
    pub id: ActorId,
    /// Unique login name.
    pub username: String,
    /// Primary discriminator role.
    pub primary_role: PrimaryRole,
    /// Legacy boolean permission bundle.
    pub legacy: LegacyPermissionFlags,
    /// Flat default commission percentage; meaningful for distributors.
    pub commission_rate: Decimal,
    /// Inactive actors cannot authenticate.
    pub active: bool,
    /// Consecutive failed login attempts.
    pub failed_logins: u32,
    /// Lockout expiry; the account is locked while this lies in the future.
    pub locked_until: Option<DateTime<Utc>>,
}

impl ActorAccount {
    /// Builds the resolution snapshot from this record and its attached
    /// roles.
    #[must_use]
    pub fn into_snapshot(self, roles: Vec<Role>) -> ActorSnapshot {
        ActorSnapshot {
            id: self.id,
            username: self.username,
            primary_role: self.primary_role,
            legacy: self.legacy,
            roles,
            active: self.active,
            failed_logins: self.failed_logins,
            locked_until: self.locked_until,
        }
    }
}

/// Read-only actor projection used for permission resolution.
///
/// Fetched once per check (fetch-then-decide); the resolver never mutates it
/// and never reaches back into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorSnapshot {
    /// Stable actor identifier.
    pub id: ActorId,
    /// Unique login name.
    pub username: String,
    /// Primary discriminator role.
    pub primary_role: PrimaryRole,
    /// Legacy boolean permission bundle.
    pub legacy: LegacyPermissionFlags,
    /// Roles attached to the actor, with their resolved permission sets.
    pub roles: Vec<Role>,
    /// Inactive actors cannot authenticate; resolution still answers.
    pub active: bool,
    /// Consecutive failed login attempts.
    pub failed_logins: u32,
    /// Lockout expiry; the account is locked while this lies in the future.
    pub locked_until: Option<DateTime<Utc>>,
}

impl ActorSnapshot {
    /// Returns whether the account is locked out at the given instant.
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{Duration, Utc};

    use super::{ActorId, ActorSnapshot, LegacyPermissionFlags, PermissionName, PrimaryRole};

    #[test]
    fn permission_name_splits_module_and_action() {
        let name = PermissionName::new("commission-tiers.read");
        assert!(name.is_ok());
        if let Ok(name) = name {
            assert_eq!(name.module(), "commission-tiers");
            assert_eq!(name.action(), "read");
        }
    }

    #[test]
    fn permission_name_requires_both_halves() {
        assert!(PermissionName::new("invoices").is_err());
        assert!(PermissionName::new(".create").is_err());
        assert!(PermissionName::new("invoices.").is_err());
        assert!(PermissionName::new("a.b.c").is_err());
    }

    #[test]
    fn permission_name_rejects_uppercase() {
        assert!(PermissionName::new("Invoices.create").is_err());
    }

    #[test]
    fn permission_name_accepts_underscored_actions() {
        assert!(PermissionName::new("orders.view_own").is_ok());
    }

    #[test]
    fn primary_role_roundtrip_storage_value() {
        let role = PrimaryRole::Manager;
        assert_eq!(PrimaryRole::from_str(role.as_str()).ok(), Some(role));
    }

    #[test]
    fn only_admin_is_superuser() {
        assert!(PrimaryRole::Admin.is_superuser());
        assert!(!PrimaryRole::Distributor.is_superuser());
        assert!(!PrimaryRole::Manager.is_superuser());
        assert!(!PrimaryRole::Employee.is_superuser());
    }

    #[test]
    fn lockout_expires() {
        let snapshot = ActorSnapshot {
            id: ActorId::new(),
            username: "karim".to_owned(),
            primary_role: PrimaryRole::Distributor,
            legacy: LegacyPermissionFlags::default(),
            roles: Vec::new(),
            active: true,
            failed_logins: 5,
            locked_until: Some(Utc::now() - Duration::minutes(1)),
        };
        assert!(!snapshot.is_locked(Utc::now()));

        let locked = ActorSnapshot {
            locked_until: Some(Utc::now() + Duration::minutes(15)),
            ..snapshot
        };
        assert!(locked.is_locked(Utc::now()));
    }
}
