//! Companies, clients, and file records referenced by invoices.

use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wakala_core::AppResult;

use crate::commission::validate_rate;

/// Unique identifier for a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(Uuid);

impl CompanyId {
    /// Creates a new random company identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a company identifier from an existing UUID value.
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

impl Default for CompanyId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CompanyId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Creates a new random client identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a client identifier from an existing UUID value.
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

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ClientId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier for an uploaded file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(Uuid);

impl FileId {
    /// Creates a new random file identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a file identifier from an existing UUID value.
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

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for FileId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A company owning uploaded files and earning commission on their invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Stable company identifier.
    pub id: CompanyId,
    /// Company name.
    pub name: String,
    /// Flat default commission percentage used when no tier matches.
    pub commission_rate: Decimal,
    /// Inactive companies are hidden from new invoices.
    pub active: bool,
}

impl Company {
    /// Creates a company, validating the default commission rate.
    pub fn new(name: impl Into<String>, commission_rate: Decimal) -> AppResult<Self> {
        validate_rate(commission_rate)?;
        Ok(Self {
            id: CompanyId::new(),
            name: name.into(),
            commission_rate,
            active: true,
        })
    }
}

/// An invoiced client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Stable client identifier.
    pub id: ClientId,
    /// Client full name.
    pub full_name: String,
    /// Flat default commission percentage used when no tier matches.
    pub commission_rate: Decimal,
    /// Inactive clients are hidden from new invoices.
    pub active: bool,
}

impl Client {
    /// Creates a client, validating the default commission rate.
    pub fn new(full_name: impl Into<String>, commission_rate: Decimal) -> AppResult<Self> {
        validate_rate(commission_rate)?;
        Ok(Self {
            id: ClientId::new(),
            full_name: full_name.into(),
            commission_rate,
            active: true,
        })
    }
}

/// An uploaded file, optionally owned by a company.
///
/// Invoices reference a file; the owning company, when present, earns a
/// commission on the invoice amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Stable file identifier.
    pub id: FileId,
    /// Original file name.
    pub file_name: String,
    /// Owning company, if the file has one.
    pub company_id: Option<CompanyId>,
}
