use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use wakala_application::{InvoiceRepository, PartyDirectory};
use wakala_core::{AppError, AppResult, NonEmptyString};
use wakala_domain::{
    ActorId, ClientId, CompanyId, EntityKind, EntityRef, FileId, FileRecord, Invoice, InvoiceId,
    RateCard,
};

/// PostgreSQL-backed store for invoices and party lookups.
#[derive(Clone)]
pub struct PostgresBillingRepository {
    pool: PgPool,
}

impl PostgresBillingRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: uuid::Uuid,
    code: String,
    client_id: uuid::Uuid,
    file_id: uuid::Uuid,
    distributor_id: uuid::Uuid,
    invoice_date: NaiveDate,
    amount: Decimal,
    client_rate: Decimal,
    distributor_rate: Decimal,
    company_rate: Decimal,
    created_by: uuid::Uuid,
}

#[derive(Debug, FromRow)]
struct FileRow {
    id: uuid::Uuid,
    file_name: String,
    company_id: Option<uuid::Uuid>,
}

impl InvoiceRow {
    fn into_invoice(self) -> AppResult<Invoice> {
        let code = NonEmptyString::new(self.code.as_str()).map_err(|error| {
            AppError::Internal(format!("invalid stored invoice code '{}': {error}", self.id))
        })?;
        let rates = RateCard::new(self.client_rate, self.distributor_rate, self.company_rate)
            .map_err(|error| {
                AppError::Internal(format!(
                    "invalid stored rates for invoice '{}': {error}",
                    self.id
                ))
            })?;

        Ok(Invoice::restore(
            InvoiceId::from_uuid(self.id),
            code,
            ClientId::from_uuid(self.client_id),
            FileId::from_uuid(self.file_id),
            ActorId::from_uuid(self.distributor_id),
            self.invoice_date,
            self.amount,
            rates,
            ActorId::from_uuid(self.created_by),
        ))
    }
}

fn map_code_conflict(error: sqlx::Error, code: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("invoice code '{code}' already exists"));
    }

    AppError::Internal(format!("failed to persist invoice: {error}"))
}

#[async_trait]
impl InvoiceRepository for PostgresBillingRepository {
    async fn insert_invoice(&self, invoice: Invoice) -> AppResult<Invoice> {
        let rates = invoice.rates();
        sqlx::query(
            r#"
            INSERT INTO invoices
                (id, code, client_id, file_id, distributor_id, invoice_date, amount,
                 client_rate, distributor_rate, company_rate, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(invoice.id().as_uuid())
        .bind(invoice.code())
        .bind(invoice.client_id().as_uuid())
        .bind(invoice.file_id().as_uuid())
        .bind(invoice.distributor_id().as_uuid())
        .bind(invoice.invoice_date())
        .bind(invoice.amount())
        .bind(rates.client_rate)
        .bind(rates.distributor_rate)
        .bind(rates.company_rate)
        .bind(invoice.created_by().as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| map_code_conflict(error, invoice.code()))?;

        tracing::debug!(invoice = %invoice.id(), "invoice persisted");
        Ok(invoice)
    }

    async fn update_invoice(&self, invoice: Invoice) -> AppResult<Invoice> {
        let rates = invoice.rates();
        let rows_affected = sqlx::query(
            r#"
            UPDATE invoices
            SET code = $2, client_id = $3, file_id = $4, distributor_id = $5,
                invoice_date = $6, amount = $7, client_rate = $8,
                distributor_rate = $9, company_rate = $10
            WHERE id = $1
            "#,
        )
        .bind(invoice.id().as_uuid())
        .bind(invoice.code())
        .bind(invoice.client_id().as_uuid())
        .bind(invoice.file_id().as_uuid())
        .bind(invoice.distributor_id().as_uuid())
        .bind(invoice.invoice_date())
        .bind(invoice.amount())
        .bind(rates.client_rate)
        .bind(rates.distributor_rate)
        .bind(rates.company_rate)
        .execute(&self.pool)
        .await
        .map_err(|error| map_code_conflict(error, invoice.code()))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("invoice '{}'", invoice.id())));
        }

        Ok(invoice)
    }

    async fn find_invoice(&self, invoice_id: InvoiceId) -> AppResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT id, code, client_id, file_id, distributor_id, invoice_date, amount,
                   client_rate, distributor_rate, company_rate, created_by
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(invoice_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load invoice: {error}")))?;

        row.map(InvoiceRow::into_invoice).transpose()
    }

    async fn list_for_distributor(&self, distributor_id: ActorId) -> AppResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT id, code, client_id, file_id, distributor_id, invoice_date, amount,
                   client_rate, distributor_rate, company_rate, created_by
            FROM invoices
            WHERE distributor_id = $1
            ORDER BY invoice_date DESC, code
            "#,
        )
        .bind(distributor_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list invoices: {error}")))?;

        rows.into_iter().map(InvoiceRow::into_invoice).collect()
    }
}

#[async_trait]
impl PartyDirectory for PostgresBillingRepository {
    async fn default_commission_rate(&self, entity: EntityRef) -> AppResult<Option<Decimal>> {
        let query = match entity.kind {
            EntityKind::Company => {
                "SELECT commission_rate FROM companies WHERE id = $1 AND active"
            }
            EntityKind::Client => "SELECT commission_rate FROM clients WHERE id = $1 AND active",
            EntityKind::Distributor => {
                "SELECT commission_rate FROM actors WHERE id = $1 AND active"
            }
        };

        sqlx::query_scalar::<_, Decimal>(query)
            .bind(entity.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load default rate: {error}"))
            })
    }

    async fn find_file(&self, file_id: FileId) -> AppResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, file_name, company_id
            FROM files
            WHERE id = $1
            "#,
        )
        .bind(file_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load file: {error}")))?;

        Ok(row.map(|row| FileRecord {
            id: FileId::from_uuid(row.id),
            file_name: row.file_name,
            company_id: row.company_id.map(CompanyId::from_uuid),
        }))
    }
}
