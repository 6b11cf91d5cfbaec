//! In-memory party directory for tests and embedded use.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use wakala_application::PartyDirectory;
use wakala_core::AppResult;
use wakala_domain::{ActorId, Client, Company, EntityKind, EntityRef, FileId, FileRecord};

/// In-memory implementation of the party directory port.
///
/// Holds companies, clients, distributor default rates and file records;
/// inactive parties resolve no default rate.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    companies: RwLock<HashMap<uuid::Uuid, Company>>,
    clients: RwLock<HashMap<uuid::Uuid, Client>>,
    distributor_rates: RwLock<HashMap<ActorId, Decimal>>,
    files: RwLock<HashMap<FileId, FileRecord>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a company.
    pub async fn put_company(&self, company: Company) {
        self.companies
            .write()
            .await
            .insert(company.id.as_uuid(), company);
    }

    /// Inserts or replaces a client.
    pub async fn put_client(&self, client: Client) {
        self.clients
            .write()
            .await
            .insert(client.id.as_uuid(), client);
    }

    /// Records a distributor's flat default commission rate.
    pub async fn put_distributor_rate(&self, distributor_id: ActorId, rate: Decimal) {
        self.distributor_rates
            .write()
            .await
            .insert(distributor_id, rate);
    }

    /// Inserts or replaces a file record.
    pub async fn put_file(&self, file: FileRecord) {
        self.files.write().await.insert(file.id, file);
    }
}

#[async_trait]
impl PartyDirectory for InMemoryDirectory {
    async fn default_commission_rate(&self, entity: EntityRef) -> AppResult<Option<Decimal>> {
        let rate = match entity.kind {
            EntityKind::Company => self
                .companies
                .read()
                .await
                .get(&entity.id)
                .filter(|company| company.active)
                .map(|company| company.commission_rate),
            EntityKind::Client => self
                .clients
                .read()
                .await
                .get(&entity.id)
                .filter(|client| client.active)
                .map(|client| client.commission_rate),
            EntityKind::Distributor => self
                .distributor_rates
                .read()
                .await
                .get(&ActorId::from_uuid(entity.id))
                .copied(),
        };

        Ok(rate)
    }

    async fn find_file(&self, file_id: FileId) -> AppResult<Option<FileRecord>> {
        Ok(self.files.read().await.get(&file_id).cloned())
    }
}
