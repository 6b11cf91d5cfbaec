//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod billing;
mod commission;
mod party;
mod security;
mod seed;

pub mod access;

pub use billing::{CommissionAmounts, Invoice, InvoiceId, RateCard};
pub use commission::{
    CommissionTier, EntityKind, EntityRef, TierId, applicable_rate, find_overlap, validate_range,
    validate_rate,
};
pub use party::{Client, ClientId, Company, CompanyId, FileId, FileRecord};
pub use security::{
    ActorAccount, ActorId, ActorSnapshot, LegacyPermissionFlags, PermissionDefinition, PermissionName,
    PrimaryRole, Role, RoleId,
};
pub use seed::{PermissionSeed, RoleSeed, SeedCatalog};
