//! Invoices and the commission rates frozen onto them.

use std::fmt::{Display, Formatter};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wakala_core::{AppError, AppResult, NonEmptyString};

use crate::commission::validate_rate;
use crate::party::{ClientId, FileId};
use crate::security::ActorId;

/// Unique identifier for an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(Uuid);

impl InvoiceId {
    /// Creates a new random invoice identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an invoice identifier from an existing UUID value.
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

impl Default for InvoiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for InvoiceId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// The three commission rates resolved for one invoice amount.
///
/// A snapshot: later tier or default-rate changes never alter it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCard {
    /// Commission percentage owed to the client.
    pub client_rate: Decimal,
    /// Commission percentage owed to the distributor.
    pub distributor_rate: Decimal,
    /// Commission percentage owed to the file's company; 0 when the file has
    /// no company association.
    pub company_rate: Decimal,
}

impl RateCard {
    /// Creates a rate card, validating each percentage.
    pub fn new(
        client_rate: Decimal,
        distributor_rate: Decimal,
        company_rate: Decimal,
    ) -> AppResult<Self> {
        validate_rate(client_rate)?;
        validate_rate(distributor_rate)?;
        validate_rate(company_rate)?;

        Ok(Self {
            client_rate,
            distributor_rate,
            company_rate,
        })
    }

    /// Computes `amount * rate / 100` per participant, rounded to 2 places.
    #[must_use]
    pub fn commission_amounts(&self, amount: Decimal) -> CommissionAmounts {
        let share = |rate: Decimal| (amount * rate / Decimal::ONE_HUNDRED).round_dp(2);
        CommissionAmounts {
            client: share(self.client_rate),
            distributor: share(self.distributor_rate),
            company: share(self.company_rate),
        }
    }
}

/// Monetary commission owed to each participant of one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionAmounts {
    /// Amount owed to the client.
    pub client: Decimal,
    /// Amount owed to the distributor.
    pub distributor: Decimal,
    /// Amount owed to the company.
    pub company: Decimal,
}

/// An invoice with its amount and frozen commission rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    code: NonEmptyString,
    client_id: ClientId,
    file_id: FileId,
    distributor_id: ActorId,
    invoice_date: NaiveDate,
    amount: Decimal,
    rates: RateCard,
    created_by: ActorId,
}

impl Invoice {
    /// Creates an invoice, freezing the supplied rate card.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        code: NonEmptyString,
        client_id: ClientId,
        file_id: FileId,
        distributor_id: ActorId,
        invoice_date: NaiveDate,
        amount: Decimal,
        rates: RateCard,
        created_by: ActorId,
    ) -> AppResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "invoice amount {amount} must be positive"
            )));
        }

        Ok(Self {
            id: InvoiceId::new(),
            code,
            client_id,
            file_id,
            distributor_id,
            invoice_date,
            amount,
            rates,
            created_by,
        })
    }

    /// Rehydrates an invoice from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: InvoiceId,
        code: NonEmptyString,
        client_id: ClientId,
        file_id: FileId,
        distributor_id: ActorId,
        invoice_date: NaiveDate,
        amount: Decimal,
        rates: RateCard,
        created_by: ActorId,
    ) -> Self {
        Self {
            id,
            code,
            client_id,
            file_id,
            distributor_id,
            invoice_date,
            amount,
            rates,
            created_by,
        }
    }

    /// Returns a copy with replaced participants, amount, and re-frozen
    /// rates. The identifier and creator survive the update.
    #[allow(clippy::too_many_arguments)]
    pub fn updated(
        &self,
        code: NonEmptyString,
        client_id: ClientId,
        file_id: FileId,
        distributor_id: ActorId,
        invoice_date: NaiveDate,
        amount: Decimal,
        rates: RateCard,
    ) -> AppResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "invoice amount {amount} must be positive"
            )));
        }

        Ok(Self {
            id: self.id,
            code,
            client_id,
            file_id,
            distributor_id,
            invoice_date,
            amount,
            rates,
            created_by: self.created_by,
        })
    }

    /// Returns the invoice identifier.
    #[must_use]
    pub fn id(&self) -> InvoiceId {
        self.id
    }

    /// Returns the human-facing invoice code.
    #[must_use]
    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    /// Returns the invoiced client.
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Returns the referenced file.
    #[must_use]
    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    /// Returns the assigned distributor.
    #[must_use]
    pub fn distributor_id(&self) -> ActorId {
        self.distributor_id
    }

    /// Returns the invoice date.
    #[must_use]
    pub fn invoice_date(&self) -> NaiveDate {
        self.invoice_date
    }

    /// Returns the invoice amount.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the frozen rate card.
    #[must_use]
    pub fn rates(&self) -> RateCard {
        self.rates
    }

    /// Returns the actor that created the invoice.
    #[must_use]
    pub fn created_by(&self) -> ActorId {
        self.created_by
    }
}
