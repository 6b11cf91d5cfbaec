//! Invoice creation and the commission rates frozen at write time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use wakala_core::{AppError, AppResult, NonEmptyString};
use wakala_domain::{
    ActorId, ClientId, EntityRef, FileId, Invoice, InvoiceId, PermissionName, RateCard,
};

use crate::access_service::AccessService;
use crate::commission_service::{CommissionTierService, PartyDirectory};

/// Repository port for invoice persistence.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Persists a new invoice; the invoice code is unique.
    async fn insert_invoice(&self, invoice: Invoice) -> AppResult<Invoice>;

    /// Replaces a stored invoice.
    async fn update_invoice(&self, invoice: Invoice) -> AppResult<Invoice>;

    /// Finds one invoice by identifier.
    async fn find_invoice(&self, invoice_id: InvoiceId) -> AppResult<Option<Invoice>>;

    /// Lists invoices assigned to one distributor, newest first.
    async fn list_for_distributor(&self, distributor_id: ActorId) -> AppResult<Vec<Invoice>>;
}

/// Input for creating or re-pricing an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceInput {
    /// Human-facing invoice code.
    pub code: String,
    /// Invoiced client.
    pub client_id: ClientId,
    /// Referenced file; its owning company earns the company commission.
    pub file_id: FileId,
    /// Assigned distributor.
    pub distributor_id: ActorId,
    /// Invoice date.
    pub invoice_date: NaiveDate,
    /// Invoice amount.
    pub amount: Decimal,
}

/// Application service wiring both engines into the invoice flow.
///
/// Every mutation consults the permission resolver first; rates are resolved
/// per participant and frozen onto the invoice, so later tier or default
/// changes never alter stored invoices.
#[derive(Clone)]
pub struct BillingService {
    access: AccessService,
    rates: CommissionTierService,
    invoices: Arc<dyn InvoiceRepository>,
    directory: Arc<dyn PartyDirectory>,
}

impl BillingService {
    /// Creates the billing service from its collaborators.
    #[must_use]
    pub fn new(
        access: AccessService,
        rates: CommissionTierService,
        invoices: Arc<dyn InvoiceRepository>,
        directory: Arc<dyn PartyDirectory>,
    ) -> Self {
        Self {
            access,
            rates,
            invoices,
            directory,
        }
    }

    /// Resolves the three participant rates for a proposed amount.
    ///
    /// Client and distributor resolve directly; the company rate comes from
    /// the file's owning company, and a file without a company association
    /// prices at 0 — a policy fallback, not an error.
    pub async fn price_invoice(
        &self,
        client_id: ClientId,
        distributor_id: ActorId,
        file_id: FileId,
        amount: Decimal,
    ) -> AppResult<RateCard> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "invoice amount {amount} must be positive"
            )));
        }

        let client_rate = self
            .rates
            .resolve_rate(EntityRef::client(client_id.as_uuid()), amount)
            .await?;
        let distributor_rate = self
            .rates
            .resolve_rate(EntityRef::distributor(distributor_id.as_uuid()), amount)
            .await?;

        let company_rate = match self.directory.find_file(file_id).await? {
            Some(file) => match file.company_id {
                Some(company_id) => {
                    self.rates
                        .resolve_rate(EntityRef::company(company_id.as_uuid()), amount)
                        .await?
                }
                None => Decimal::ZERO,
            },
            None => Decimal::ZERO,
        };

        RateCard::new(client_rate, distributor_rate, company_rate)
    }

    /// Creates an invoice with rates frozen at creation time.
    pub async fn create_invoice(
        &self,
        actor_id: ActorId,
        input: InvoiceInput,
    ) -> AppResult<Invoice> {
        self.access
            .require_permission(actor_id, &PermissionName::new("invoices.create")?)
            .await?;

        let rates = self
            .price_invoice(input.client_id, input.distributor_id, input.file_id, input.amount)
            .await?;

        let invoice = Invoice::new(
            NonEmptyString::new(input.code)?,
            input.client_id,
            input.file_id,
            input.distributor_id,
            input.invoice_date,
            input.amount,
            rates,
            actor_id,
        )?;

        self.invoices.insert_invoice(invoice).await
    }

    /// Updates an invoice, re-pricing and re-freezing its rates.
    pub async fn update_invoice(
        &self,
        actor_id: ActorId,
        invoice_id: InvoiceId,
        input: InvoiceInput,
    ) -> AppResult<Invoice> {
        self.access
            .require_permission(actor_id, &PermissionName::new("invoices.update")?)
            .await?;

        let current = self
            .invoices
            .find_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("invoice '{invoice_id}'")))?;

        let rates = self
            .price_invoice(input.client_id, input.distributor_id, input.file_id, input.amount)
            .await?;

        let updated = current.updated(
            NonEmptyString::new(input.code)?,
            input.client_id,
            input.file_id,
            input.distributor_id,
            input.invoice_date,
            input.amount,
            rates,
        )?;

        self.invoices.update_invoice(updated).await
    }

    /// Lists the invoices assigned to one distributor.
    pub async fn invoices_for_distributor(
        &self,
        distributor_id: ActorId,
    ) -> AppResult<Vec<Invoice>> {
        self.invoices.list_for_distributor(distributor_id).await
    }
}
