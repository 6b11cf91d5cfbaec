//! Seed catalog: externally supplied permission and system-role data.
//!
//! The catalog is deployment configuration, not code. Seeding is an
//! idempotent upsert keyed by unique name, never a delete-and-recreate, so
//! re-running it against a populated store is safe.

use serde::{Deserialize, Serialize};
use wakala_core::{AppError, AppResult};

use crate::security::PermissionName;

/// One permission definition to upsert into the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSeed {
    /// Unique `module.action` identifier.
    pub name: PermissionName,
    /// Human-readable label.
    pub display_name: String,
    /// Whether the permission starts active.
    #[serde(default = "default_active")]
    pub active: bool,
}

/// One system role to upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSeed {
    /// Unique role name.
    pub name: String,
    /// Human-readable label.
    pub display_name: String,
    /// Whether the seeded role is system-owned (immutable afterwards).
    #[serde(default = "default_active")]
    pub is_system_role: bool,
    /// Grants every active catalog permission instead of a fixed list.
    #[serde(default)]
    pub grant_all: bool,
    /// Explicit permission grants; ignored when `grant_all` is set.
    #[serde(default)]
    pub permissions: Vec<PermissionName>,
}

/// Full seed payload: the permission catalog plus the system roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedCatalog {
    /// Permission definitions to upsert.
    pub permissions: Vec<PermissionSeed>,
    /// System roles to upsert.
    pub roles: Vec<RoleSeed>,
}

impl SeedCatalog {
    /// Validates internal consistency: unique names, and every role grant
    /// referencing a permission defined in this catalog.
    pub fn validate(&self) -> AppResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for permission in &self.permissions {
            if !seen.insert(&permission.name) {
                return Err(AppError::Validation(format!(
                    "duplicate permission '{}' in seed catalog",
                    permission.name
                )));
            }
        }

        let mut role_names = std::collections::BTreeSet::new();
        for role in &self.roles {
            if !role_names.insert(role.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "duplicate role '{}' in seed catalog",
                    role.name
                )));
            }

            for grant in &role.permissions {
                if !seen.contains(grant) {
                    return Err(AppError::Validation(format!(
                        "role '{}' references unknown permission '{grant}'",
                        role.name
                    )));
                }
            }
        }

        Ok(())
    }
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::SeedCatalog;

    #[test]
    fn catalog_deserializes_from_configuration_json() {
        let payload = serde_json::json!({
            "permissions": [
                { "name": "roles.read", "display_name": "View roles" },
                { "name": "roles.create", "display_name": "Create roles" },
                { "name": "system.backup", "display_name": "Backups", "active": false }
            ],
            "roles": [
                { "name": "admin", "display_name": "Administrator", "grant_all": true },
                {
                    "name": "auditor",
                    "display_name": "Auditor",
                    "is_system_role": false,
                    "permissions": ["roles.read"]
                }
            ]
        });

        let catalog: Result<SeedCatalog, _> = serde_json::from_value(payload);
        assert!(catalog.is_ok());
        if let Ok(catalog) = catalog {
            assert!(catalog.validate().is_ok());
            assert!(catalog.roles[0].grant_all);
            assert!(!catalog.roles[1].is_system_role);
        }
    }

    #[test]
    fn invalid_permission_name_fails_deserialization() {
        let payload = serde_json::json!({
            "permissions": [{ "name": "NotValid", "display_name": "x" }],
            "roles": []
        });
        let catalog: Result<SeedCatalog, _> = serde_json::from_value(payload);
        assert!(catalog.is_err());
    }

    #[test]
    fn unknown_role_grant_is_rejected() {
        let payload = serde_json::json!({
            "permissions": [{ "name": "roles.read", "display_name": "View roles" }],
            "roles": [
                { "name": "auditor", "display_name": "Auditor", "permissions": ["roles.delete"] }
            ]
        });
        let catalog: Result<SeedCatalog, _> = serde_json::from_value(payload);
        assert!(catalog.is_ok());
        if let Ok(catalog) = catalog {
            assert!(catalog.validate().is_err());
        }
    }
}
