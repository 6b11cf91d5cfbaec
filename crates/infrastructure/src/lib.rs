//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_commission_tier_repository;
mod in_memory_directory;
mod in_memory_invoice_repository;
mod in_memory_security_repository;
mod postgres_billing_repository;
mod postgres_commission_tier_repository;
mod postgres_security_repository;

pub use in_memory_commission_tier_repository::InMemoryCommissionTierRepository;
pub use in_memory_directory::InMemoryDirectory;
pub use in_memory_invoice_repository::InMemoryInvoiceRepository;
pub use in_memory_security_repository::InMemorySecurityRepository;
pub use postgres_billing_repository::PostgresBillingRepository;
pub use postgres_commission_tier_repository::PostgresCommissionTierRepository;
pub use postgres_security_repository::PostgresSecurityRepository;
