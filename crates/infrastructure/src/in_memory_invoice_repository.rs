//! In-memory invoice store for tests and embedded use.

use async_trait::async_trait;
use tokio::sync::RwLock;
use wakala_application::InvoiceRepository;
use wakala_core::{AppError, AppResult};
use wakala_domain::{ActorId, Invoice, InvoiceId};

/// In-memory implementation of the invoice port.
#[derive(Debug, Default)]
pub struct InMemoryInvoiceRepository {
    invoices: RwLock<Vec<Invoice>>,
}

impl InMemoryInvoiceRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn insert_invoice(&self, invoice: Invoice) -> AppResult<Invoice> {
        let mut invoices = self.invoices.write().await;
        if invoices.iter().any(|stored| stored.code() == invoice.code()) {
            return Err(AppError::Conflict(format!(
                "invoice code '{}' already exists",
                invoice.code()
            )));
        }

        invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn update_invoice(&self, invoice: Invoice) -> AppResult<Invoice> {
        let mut invoices = self.invoices.write().await;
        if invoices
            .iter()
            .any(|stored| stored.id() != invoice.id() && stored.code() == invoice.code())
        {
            return Err(AppError::Conflict(format!(
                "invoice code '{}' already exists",
                invoice.code()
            )));
        }

        let Some(slot) = invoices
            .iter_mut()
            .find(|stored| stored.id() == invoice.id())
        else {
            return Err(AppError::NotFound(format!("invoice '{}'", invoice.id())));
        };
        *slot = invoice.clone();
        Ok(invoice)
    }

    async fn find_invoice(&self, invoice_id: InvoiceId) -> AppResult<Option<Invoice>> {
        Ok(self
            .invoices
            .read()
            .await
            .iter()
            .find(|invoice| invoice.id() == invoice_id)
            .cloned())
    }

    async fn list_for_distributor(&self, distributor_id: ActorId) -> AppResult<Vec<Invoice>> {
        let mut matching: Vec<Invoice> = self
            .invoices
            .read()
            .await
            .iter()
            .filter(|invoice| invoice.distributor_id() == distributor_id)
            .cloned()
            .collect();
        matching.sort_by(|left, right| right.invoice_date().cmp(&left.invoice_date()));
        Ok(matching)
    }
}
