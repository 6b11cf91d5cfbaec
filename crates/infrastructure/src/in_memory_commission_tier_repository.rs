//! In-memory commission tier store for tests and embedded use.

use async_trait::async_trait;
use tokio::sync::RwLock;
use wakala_application::CommissionTierRepository;
use wakala_core::{AppError, AppResult};
use wakala_domain::{CommissionTier, EntityRef, TierId, find_overlap};

/// In-memory implementation of the commission tier port.
///
/// The overlap scan and the write share one write-lock critical section, so
/// concurrent writers for the same entity serialize and never both commit
/// intersecting ranges.
#[derive(Debug, Default)]
pub struct InMemoryCommissionTierRepository {
    tiers: RwLock<Vec<CommissionTier>>,
}

impl InMemoryCommissionTierRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommissionTierRepository for InMemoryCommissionTierRepository {
    async fn list_tiers(&self, entity: EntityRef) -> AppResult<Vec<CommissionTier>> {
        Ok(self
            .tiers
            .read()
            .await
            .iter()
            .filter(|tier| tier.entity() == entity)
            .cloned()
            .collect())
    }

    async fn list_active_tiers(&self, entity: EntityRef) -> AppResult<Vec<CommissionTier>> {
        Ok(self
            .tiers
            .read()
            .await
            .iter()
            .filter(|tier| tier.entity() == entity && tier.is_active())
            .cloned()
            .collect())
    }

    async fn find_tier(&self, tier_id: TierId) -> AppResult<Option<CommissionTier>> {
        Ok(self
            .tiers
            .read()
            .await
            .iter()
            .find(|tier| tier.id() == tier_id)
            .cloned())
    }

    async fn insert_tier(&self, tier: CommissionTier) -> AppResult<CommissionTier> {
        let mut tiers = self.tiers.write().await;
        let same_entity: Vec<CommissionTier> = tiers
            .iter()
            .filter(|stored| stored.entity() == tier.entity())
            .cloned()
            .collect();
        if let Some(conflicting) =
            find_overlap(&same_entity, tier.min_amount(), tier.max_amount(), None)
        {
            return Err(AppError::TierOverlap {
                conflicting: conflicting.id().as_uuid(),
                min: tier.min_amount(),
                max: tier.max_amount(),
            });
        }

        tiers.push(tier.clone());
        Ok(tier)
    }

    async fn update_tier(&self, tier: CommissionTier) -> AppResult<CommissionTier> {
        let mut tiers = self.tiers.write().await;
        if tier.is_active() {
            let same_entity: Vec<CommissionTier> = tiers
                .iter()
                .filter(|stored| stored.entity() == tier.entity())
                .cloned()
                .collect();
            if let Some(conflicting) = find_overlap(
                &same_entity,
                tier.min_amount(),
                tier.max_amount(),
                Some(tier.id()),
            ) {
                return Err(AppError::TierOverlap {
                    conflicting: conflicting.id().as_uuid(),
                    min: tier.min_amount(),
                    max: tier.max_amount(),
                });
            }
        }

        let Some(slot) = tiers.iter_mut().find(|stored| stored.id() == tier.id()) else {
            return Err(AppError::NotFound(format!(
                "commission tier '{}'",
                tier.id()
            )));
        };
        *slot = tier.clone();
        Ok(tier)
    }

    async fn delete_tier(&self, tier_id: TierId) -> AppResult<()> {
        let mut tiers = self.tiers.write().await;
        let before = tiers.len();
        tiers.retain(|tier| tier.id() != tier_id);
        if tiers.len() == before {
            return Err(AppError::NotFound(format!("commission tier '{tier_id}'")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use uuid::Uuid;
    use wakala_core::AppError;
    use wakala_domain::{ActorId, CommissionTier, EntityRef};

    use super::{CommissionTierRepository, InMemoryCommissionTierRepository};

    fn tier(entity: EntityRef, min: i64, max: i64) -> CommissionTier {
        CommissionTier::new(
            entity,
            Decimal::from(min),
            Decimal::from(max),
            Decimal::from(5),
            ActorId::new(),
        )
        .unwrap_or_else(|_| panic!("test tier must be valid"))
    }

    #[tokio::test]
    async fn overlapping_insert_names_the_conflicting_tier() {
        let repository = InMemoryCommissionTierRepository::new();
        let entity = EntityRef::client(Uuid::new_v4());

        let first = repository.insert_tier(tier(entity, 0, 1000)).await;
        assert!(first.is_ok());
        let Ok(first) = first else {
            return;
        };

        let second = repository.insert_tier(tier(entity, 500, 1500)).await;
        match second {
            Err(AppError::TierOverlap { conflicting, .. }) => {
                assert_eq!(conflicting, first.id().as_uuid());
            }
            other => panic!("expected overlap rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_inserts_never_both_commit() {
        let repository = std::sync::Arc::new(InMemoryCommissionTierRepository::new());
        let entity = EntityRef::client(Uuid::new_v4());

        let left = {
            let repository = repository.clone();
            tokio::spawn(async move { repository.insert_tier(tier(entity, 0, 1000)).await })
        };
        let right = {
            let repository = repository.clone();
            tokio::spawn(async move { repository.insert_tier(tier(entity, 500, 1500)).await })
        };

        let outcomes = [left.await, right.await];
        let committed = outcomes
            .iter()
            .filter(|joined| matches!(joined, Ok(Ok(_))))
            .count();
        assert_eq!(committed, 1);
    }
}
