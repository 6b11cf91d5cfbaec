use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use wakala_application::CommissionTierRepository;
use wakala_core::{AppError, AppResult};
use wakala_domain::{
    ActorId, CommissionTier, EntityKind, EntityRef, TierId, find_overlap,
};

/// PostgreSQL-backed store for commission tiers.
///
/// Writes for one entity serialize on a transaction-scoped advisory lock, so
/// the overlap scan and the insert or update commit as one atomic unit.
#[derive(Clone)]
pub struct PostgresCommissionTierRepository {
    pool: PgPool,
}

impl PostgresCommissionTierRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_entity(
        transaction: &mut Transaction<'_, Postgres>,
        entity: EntityRef,
    ) -> AppResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(advisory_key(entity))
            .execute(&mut **transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to acquire tier write lock: {error}"))
            })?;

        Ok(())
    }

    async fn active_tiers_in_transaction(
        transaction: &mut Transaction<'_, Postgres>,
        entity: EntityRef,
    ) -> AppResult<Vec<CommissionTier>> {
        let rows = sqlx::query_as::<_, TierRow>(
            r#"
            SELECT id, entity_kind, entity_id, min_amount, max_amount, rate, active, created_by
            FROM commission_tiers
            WHERE entity_kind = $1 AND entity_id = $2 AND active
            ORDER BY min_amount
            "#,
        )
        .bind(entity.kind.as_str())
        .bind(entity.id)
        .fetch_all(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load tiers: {error}")))?;

        rows.into_iter().map(TierRow::into_tier).collect()
    }
}

/// Derives a stable advisory-lock key from the owning entity.
fn advisory_key(entity: EntityRef) -> i64 {
    let bytes = entity.id.as_bytes();
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[..8]);

    let kind_salt: u64 = match entity.kind {
        EntityKind::Company => 0x636f,
        EntityKind::Client => 0x636c,
        EntityKind::Distributor => 0x6469,
    };

    i64::from_le_bytes(head) ^ i64::from_le_bytes((kind_salt << 48).to_le_bytes())
}

#[derive(Debug, FromRow)]
struct TierRow {
    id: uuid::Uuid,
    entity_kind: String,
    entity_id: uuid::Uuid,
    min_amount: Decimal,
    max_amount: Decimal,
    rate: Decimal,
    active: bool,
    created_by: uuid::Uuid,
}

impl TierRow {
    fn into_tier(self) -> AppResult<CommissionTier> {
        let kind = EntityKind::from_str(self.entity_kind.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "invalid stored entity kind for tier '{}': {error}",
                self.id
            ))
        })?;

        CommissionTier::restore(
            TierId::from_uuid(self.id),
            EntityRef {
                kind,
                id: self.entity_id,
            },
            self.min_amount,
            self.max_amount,
            self.rate,
            self.active,
            ActorId::from_uuid(self.created_by),
        )
        .map_err(|error| {
            AppError::Internal(format!("invalid stored tier '{}': {error}", self.id))
        })
    }
}

#[async_trait]
impl CommissionTierRepository for PostgresCommissionTierRepository {
    async fn list_tiers(&self, entity: EntityRef) -> AppResult<Vec<CommissionTier>> {
        let rows = sqlx::query_as::<_, TierRow>(
            r#"
            SELECT id, entity_kind, entity_id, min_amount, max_amount, rate, active, created_by
            FROM commission_tiers
            WHERE entity_kind = $1 AND entity_id = $2
            ORDER BY min_amount
            "#,
        )
        .bind(entity.kind.as_str())
        .bind(entity.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list tiers: {error}")))?;

        rows.into_iter().map(TierRow::into_tier).collect()
    }

    async fn list_active_tiers(&self, entity: EntityRef) -> AppResult<Vec<CommissionTier>> {
        let rows = sqlx::query_as::<_, TierRow>(
            r#"
            SELECT id, entity_kind, entity_id, min_amount, max_amount, rate, active, created_by
            FROM commission_tiers
            WHERE entity_kind = $1 AND entity_id = $2 AND active
            ORDER BY min_amount
            "#,
        )
        .bind(entity.kind.as_str())
        .bind(entity.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list active tiers: {error}")))?;

        rows.into_iter().map(TierRow::into_tier).collect()
    }

    async fn find_tier(&self, tier_id: TierId) -> AppResult<Option<CommissionTier>> {
        let row = sqlx::query_as::<_, TierRow>(
            r#"
            SELECT id, entity_kind, entity_id, min_amount, max_amount, rate, active, created_by
            FROM commission_tiers
            WHERE id = $1
            "#,
        )
        .bind(tier_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load tier: {error}")))?;

        row.map(TierRow::into_tier).transpose()
    }

    async fn insert_tier(&self, tier: CommissionTier) -> AppResult<CommissionTier> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        Self::lock_entity(&mut transaction, tier.entity()).await?;

        let existing = Self::active_tiers_in_transaction(&mut transaction, tier.entity()).await?;
        if let Some(conflicting) =
            find_overlap(&existing, tier.min_amount(), tier.max_amount(), None)
        {
            tracing::debug!(
                entity = %tier.entity(),
                conflicting = %conflicting.id(),
                "tier insert rejected by overlap scan"
            );
            return Err(AppError::TierOverlap {
                conflicting: conflicting.id().as_uuid(),
                min: tier.min_amount(),
                max: tier.max_amount(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO commission_tiers
                (id, entity_kind, entity_id, min_amount, max_amount, rate, active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tier.id().as_uuid())
        .bind(tier.entity().kind.as_str())
        .bind(tier.entity().id)
        .bind(tier.min_amount())
        .bind(tier.max_amount())
        .bind(tier.rate())
        .bind(tier.is_active())
        .bind(tier.created_by().as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert tier: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(tier)
    }

    async fn update_tier(&self, tier: CommissionTier) -> AppResult<CommissionTier> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        Self::lock_entity(&mut transaction, tier.entity()).await?;

        if tier.is_active() {
            let existing =
                Self::active_tiers_in_transaction(&mut transaction, tier.entity()).await?;
            if let Some(conflicting) = find_overlap(
                &existing,
                tier.min_amount(),
                tier.max_amount(),
                Some(tier.id()),
            ) {
                tracing::debug!(
                    entity = %tier.entity(),
                    conflicting = %conflicting.id(),
                    "tier update rejected by overlap scan"
                );
                return Err(AppError::TierOverlap {
                    conflicting: conflicting.id().as_uuid(),
                    min: tier.min_amount(),
                    max: tier.max_amount(),
                });
            }
        }

        let rows_affected = sqlx::query(
            r#"
            UPDATE commission_tiers
            SET min_amount = $2, max_amount = $3, rate = $4, active = $5
            WHERE id = $1
            "#,
        )
        .bind(tier.id().as_uuid())
        .bind(tier.min_amount())
        .bind(tier.max_amount())
        .bind(tier.rate())
        .bind(tier.is_active())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update tier: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "commission tier '{}'",
                tier.id()
            )));
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(tier)
    }

    async fn delete_tier(&self, tier_id: TierId) -> AppResult<()> {
        let rows_affected = sqlx::query("DELETE FROM commission_tiers WHERE id = $1")
            .bind(tier_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete tier: {error}")))?
            .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("commission tier '{tier_id}'")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use wakala_domain::EntityRef;

    use super::advisory_key;

    #[test]
    fn advisory_key_is_stable_per_entity() {
        let id = Uuid::new_v4();
        assert_eq!(
            advisory_key(EntityRef::client(id)),
            advisory_key(EntityRef::client(id))
        );
    }

    #[test]
    fn advisory_key_separates_entity_kinds() {
        let id = Uuid::new_v4();
        assert_ne!(
            advisory_key(EntityRef::client(id)),
            advisory_key(EntityRef::company(id))
        );
    }
}
