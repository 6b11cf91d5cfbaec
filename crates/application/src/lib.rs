//! Application services and ports.

#![forbid(unsafe_code)]

mod access_service;
mod billing_service;
mod commission_service;
mod security_admin_service;

pub use access_service::{AccessService, AuthorizationRepository};
pub use billing_service::{BillingService, InvoiceInput, InvoiceRepository};
pub use commission_service::{
    CommissionTierRepository, CommissionTierService, NewTierInput, PartyDirectory, TierChanges,
};
pub use security_admin_service::{
    CreateRoleInput, RoleUpsert, SecurityAdminRepository, SecurityAdminService, UpdateRoleInput,
};
