//! Pure permission resolution over an actor snapshot.
//!
//! Resolution order, first decisive answer wins:
//! 1. superuser primary role grants everything;
//! 2. the fixed legacy mapping table translates the four backward-compatible
//!    boolean flags;
//! 3. the union of attached active roles' permission sets;
//! 4. otherwise denied.

use std::collections::BTreeSet;

use crate::security::{ActorSnapshot, LegacyPermissionFlags, PermissionDefinition, PermissionName};

/// Translates a permission name through the fixed legacy flag table.
///
/// Returns `None` for names outside the table, in which case resolution
/// falls through to the role graph. Read actions on companies, invoices and
/// clients are hard-wired to `true`; `reports.read` maps to the report flag.
#[must_use]
pub fn legacy_grant(flags: &LegacyPermissionFlags, permission: &PermissionName) -> Option<bool> {
    match permission.as_str() {
        "companies.create" | "companies.update" | "companies.delete" => {
            Some(flags.can_create_companies)
        }
        "invoices.create" | "invoices.update" | "invoices.delete" => {
            Some(flags.can_create_invoices)
        }
        "clients.create" | "clients.update" | "clients.delete" => Some(flags.can_manage_clients),
        "companies.read" | "invoices.read" | "clients.read" => Some(true),
        "reports.read" => Some(flags.can_view_reports),
        _ => None,
    }
}

/// Returns whether the actor holds the named permission.
///
/// Pure over the snapshot; safe to call concurrently and never mutates the
/// actor record. Callers that could not find the actor at all must surface
/// that as an authentication failure instead of calling this with a stand-in.
#[must_use]
pub fn has_permission(actor: &ActorSnapshot, permission: &PermissionName) -> bool {
    if actor.primary_role.is_superuser() {
        return true;
    }

    if let Some(granted) = legacy_grant(&actor.legacy, permission) {
        return granted;
    }

    actor
        .roles
        .iter()
        .any(|role| role.active && role.grants(permission))
}

/// Returns whether the actor holds every named permission.
///
/// Vacuously true for an empty list; short-circuits on the first denial.
#[must_use]
pub fn has_all_permissions(actor: &ActorSnapshot, permissions: &[PermissionName]) -> bool {
    permissions
        .iter()
        .all(|permission| has_permission(actor, permission))
}

/// Returns whether the actor holds at least one named permission.
///
/// False for an empty list; short-circuits on the first grant.
#[must_use]
pub fn has_any_permission(actor: &ActorSnapshot, permissions: &[PermissionName]) -> bool {
    permissions
        .iter()
        .any(|permission| has_permission(actor, permission))
}

/// Materializes the actor's full permission set.
///
/// The union across attached active roles, deduplicated by identity; a
/// superuser substitutes every active permission in the catalog.
#[must_use]
pub fn effective_permissions(
    actor: &ActorSnapshot,
    catalog: &[PermissionDefinition],
) -> BTreeSet<PermissionName> {
    if actor.primary_role.is_superuser() {
        return catalog
            .iter()
            .filter(|definition| definition.active)
            .map(|definition| definition.name.clone())
            .collect();
    }

    actor
        .roles
        .iter()
        .filter(|role| role.active)
        .flat_map(|role| role.permissions.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::security::{
        ActorId, ActorSnapshot, LegacyPermissionFlags, PermissionDefinition, PermissionName,
        PrimaryRole, Role, RoleId,
    };

    use super::{
        effective_permissions, has_all_permissions, has_any_permission, has_permission,
        legacy_grant,
    };

    fn name(value: &str) -> PermissionName {
        PermissionName::new(value).unwrap_or_else(|_| panic!("test permission name"))
    }

    fn actor(primary_role: PrimaryRole, legacy: LegacyPermissionFlags, roles: Vec<Role>) -> ActorSnapshot {
        ActorSnapshot {
            id: ActorId::new(),
            username: "test".to_owned(),
            primary_role,
            legacy,
            roles,
            active: true,
            failed_logins: 0,
            locked_until: None,
        }
    }

    fn role(permissions: &[&str], active: bool) -> Role {
        Role {
            id: RoleId::new(),
            name: "custom".to_owned(),
            display_name: "Custom".to_owned(),
            permissions: permissions.iter().map(|value| name(value)).collect(),
            is_system_role: false,
            active,
        }
    }

    #[test]
    fn admin_bypasses_everything() {
        let admin = actor(PrimaryRole::Admin, LegacyPermissionFlags::default(), Vec::new());
        assert!(has_permission(&admin, &name("roles.delete")));
        assert!(has_permission(&admin, &name("anything.at-all")));
    }

    #[test]
    fn legacy_flags_drive_mapped_names_without_roles() {
        let flags = LegacyPermissionFlags {
            can_create_invoices: true,
            ..LegacyPermissionFlags::default()
        };
        let subject = actor(PrimaryRole::Distributor, flags, Vec::new());

        assert!(has_permission(&subject, &name("invoices.create")));
        assert!(has_permission(&subject, &name("invoices.update")));
        assert!(!has_permission(&subject, &name("companies.create")));
        assert!(!has_permission(&subject, &name("roles.read")));
    }

    #[test]
    fn mapped_read_actions_are_always_granted() {
        let subject = actor(
            PrimaryRole::Employee,
            LegacyPermissionFlags::default(),
            Vec::new(),
        );
        assert!(has_permission(&subject, &name("companies.read")));
        assert!(has_permission(&subject, &name("invoices.read")));
        assert!(has_permission(&subject, &name("clients.read")));
    }

    #[test]
    fn reports_read_follows_the_report_flag() {
        let without = actor(
            PrimaryRole::Employee,
            LegacyPermissionFlags::default(),
            Vec::new(),
        );
        assert!(!has_permission(&without, &name("reports.read")));

        let with = actor(
            PrimaryRole::Employee,
            LegacyPermissionFlags {
                can_view_reports: true,
                ..LegacyPermissionFlags::default()
            },
            Vec::new(),
        );
        assert!(has_permission(&with, &name("reports.read")));
    }

    #[test]
    fn legacy_table_takes_precedence_over_role_grants() {
        // The role grants invoices.create, but the legacy flag is false and
        // the table is checked first.
        let subject = actor(
            PrimaryRole::Employee,
            LegacyPermissionFlags::default(),
            vec![role(&["invoices.create"], true)],
        );
        assert!(!has_permission(&subject, &name("invoices.create")));
    }

    #[test]
    fn unmapped_names_fall_through_to_roles() {
        let subject = actor(
            PrimaryRole::Employee,
            LegacyPermissionFlags::default(),
            vec![role(&["orders.view_own", "roles.read"], true)],
        );
        assert!(has_permission(&subject, &name("roles.read")));
        assert!(has_permission(&subject, &name("orders.view_own")));
        assert!(!has_permission(&subject, &name("roles.delete")));
    }

    #[test]
    fn inactive_roles_grant_nothing() {
        let subject = actor(
            PrimaryRole::Employee,
            LegacyPermissionFlags::default(),
            vec![role(&["roles.read"], false)],
        );
        assert!(!has_permission(&subject, &name("roles.read")));
    }

    #[test]
    fn union_spans_all_attached_roles() {
        let subject = actor(
            PrimaryRole::Manager,
            LegacyPermissionFlags::default(),
            vec![role(&["roles.read"], true), role(&["roles.create"], true)],
        );
        assert!(has_permission(&subject, &name("roles.read")));
        assert!(has_permission(&subject, &name("roles.create")));
    }

    #[test]
    fn all_permissions_is_vacuously_true_on_empty() {
        let subject = actor(
            PrimaryRole::Employee,
            LegacyPermissionFlags::default(),
            Vec::new(),
        );
        assert!(has_all_permissions(&subject, &[]));
    }

    #[test]
    fn any_permission_is_false_on_empty() {
        let subject = actor(PrimaryRole::Admin, LegacyPermissionFlags::default(), Vec::new());
        assert!(!has_any_permission(&subject, &[]));
    }

    #[test]
    fn all_and_any_composites_resolve_per_name() {
        let subject = actor(
            PrimaryRole::Employee,
            LegacyPermissionFlags::default(),
            vec![role(&["roles.read"], true)],
        );
        assert!(has_all_permissions(&subject, &[name("roles.read")]));
        assert!(!has_all_permissions(
            &subject,
            &[name("roles.read"), name("roles.delete")]
        ));
        assert!(has_any_permission(
            &subject,
            &[name("roles.delete"), name("roles.read")]
        ));
        assert!(!has_any_permission(&subject, &[name("roles.delete")]));
    }

    #[test]
    fn effective_permissions_deduplicate_across_roles() {
        let subject = actor(
            PrimaryRole::Manager,
            LegacyPermissionFlags::default(),
            vec![
                role(&["roles.read", "orders.create"], true),
                role(&["roles.read"], true),
                role(&["orders.delete"], false),
            ],
        );
        let effective = effective_permissions(&subject, &[]);
        let expected: BTreeSet<_> = [name("roles.read"), name("orders.create")].into();
        assert_eq!(effective, expected);
    }

    #[test]
    fn superuser_effective_set_is_the_active_catalog() {
        let catalog = vec![
            PermissionDefinition {
                name: name("roles.read"),
                display_name: "View roles".to_owned(),
                active: true,
            },
            PermissionDefinition {
                name: name("system.backup"),
                display_name: "Backups".to_owned(),
                active: false,
            },
        ];
        let admin = actor(PrimaryRole::Admin, LegacyPermissionFlags::default(), Vec::new());
        let effective = effective_permissions(&admin, &catalog);
        assert!(effective.contains(&name("roles.read")));
        assert!(!effective.contains(&name("system.backup")));
    }

    #[test]
    fn legacy_table_covers_only_the_four_modules() {
        let flags = LegacyPermissionFlags::default();
        assert!(legacy_grant(&flags, &name("companies.delete")).is_some());
        assert!(legacy_grant(&flags, &name("reports.read")).is_some());
        assert!(legacy_grant(&flags, &name("roles.read")).is_none());
        assert!(legacy_grant(&flags, &name("commission-tiers.create")).is_none());
    }
}
