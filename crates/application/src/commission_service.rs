//! Commission tier store and rate resolution.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use wakala_core::{AppError, AppResult};
use wakala_domain::{ActorId, CommissionTier, EntityRef, FileId, FileRecord, TierId, applicable_rate};

/// Repository port for commission tiers.
///
/// `insert_tier` and `update_tier` must run the overlap scan and the write
/// as one atomic unit per owning entity: two concurrent writes for the same
/// entity must never both pass the scan and commit intersecting ranges.
/// Implementations reject intersections with [`AppError::TierOverlap`]; an
/// update excludes the tier being updated from its scan.
#[async_trait]
pub trait CommissionTierRepository: Send + Sync {
    /// Lists every tier of an entity, active or not.
    async fn list_tiers(&self, entity: EntityRef) -> AppResult<Vec<CommissionTier>>;

    /// Lists the active tiers of an entity.
    async fn list_active_tiers(&self, entity: EntityRef) -> AppResult<Vec<CommissionTier>>;

    /// Finds one tier by identifier.
    async fn find_tier(&self, tier_id: TierId) -> AppResult<Option<CommissionTier>>;

    /// Persists a new tier after the serialized overlap scan.
    async fn insert_tier(&self, tier: CommissionTier) -> AppResult<CommissionTier>;

    /// Replaces a stored tier after the serialized overlap scan.
    async fn update_tier(&self, tier: CommissionTier) -> AppResult<CommissionTier>;

    /// Deletes a tier, freeing its interval.
    async fn delete_tier(&self, tier_id: TierId) -> AppResult<()>;
}

/// Directory port resolving flat default rates and file ownership.
#[async_trait]
pub trait PartyDirectory: Send + Sync {
    /// Returns the entity's flat default commission rate, or `None` when the
    /// entity does not exist.
    async fn default_commission_rate(&self, entity: EntityRef) -> AppResult<Option<Decimal>>;

    /// Finds a file record by identifier.
    async fn find_file(&self, file_id: FileId) -> AppResult<Option<FileRecord>>;
}

/// Input for creating a commission tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTierInput {
    /// Owning entity.
    pub entity: EntityRef,
    /// Inclusive range minimum.
    pub min_amount: Decimal,
    /// Inclusive range maximum.
    pub max_amount: Decimal,
    /// Commission percentage for the range.
    pub rate: Decimal,
    /// Actor recording the tier.
    pub created_by: ActorId,
}

/// Replacement values for an existing tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierChanges {
    /// New inclusive range minimum.
    pub min_amount: Decimal,
    /// New inclusive range maximum.
    pub max_amount: Decimal,
    /// New commission percentage.
    pub rate: Decimal,
    /// New active flag.
    pub active: bool,
}

/// Application service owning tier administration and rate resolution.
#[derive(Clone)]
pub struct CommissionTierService {
    tiers: Arc<dyn CommissionTierRepository>,
    directory: Arc<dyn PartyDirectory>,
}

impl CommissionTierService {
    /// Creates the service from repository implementations.
    #[must_use]
    pub fn new(
        tiers: Arc<dyn CommissionTierRepository>,
        directory: Arc<dyn PartyDirectory>,
    ) -> Self {
        Self { tiers, directory }
    }

    /// Adds an active tier for an entity.
    ///
    /// Rejects inverted ranges ([`AppError::TierRange`]) and intersections
    /// with existing active tiers ([`AppError::TierOverlap`]) before any
    /// write.
    pub async fn add_tier(&self, input: NewTierInput) -> AppResult<CommissionTier> {
        let tier = CommissionTier::new(
            input.entity,
            input.min_amount,
            input.max_amount,
            input.rate,
            input.created_by,
        )?;

        self.tiers.insert_tier(tier).await
    }

    /// Replaces a tier's range, rate and active flag, re-running the range
    /// and overlap checks with the tier itself excluded from the scan.
    pub async fn update_tier(
        &self,
        tier_id: TierId,
        changes: TierChanges,
    ) -> AppResult<CommissionTier> {
        let current = self
            .tiers
            .find_tier(tier_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("commission tier '{tier_id}'")))?;

        let updated = current.updated(
            changes.min_amount,
            changes.max_amount,
            changes.rate,
            changes.active,
        )?;

        self.tiers.update_tier(updated).await
    }

    /// Deactivates a tier, freeing its interval for reuse.
    pub async fn deactivate_tier(&self, tier_id: TierId) -> AppResult<CommissionTier> {
        let current = self
            .tiers
            .find_tier(tier_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("commission tier '{tier_id}'")))?;

        let updated = current.updated(
            current.min_amount(),
            current.max_amount(),
            current.rate(),
            false,
        )?;

        self.tiers.update_tier(updated).await
    }

    /// Deletes a tier, freeing its interval for reuse.
    pub async fn remove_tier(&self, tier_id: TierId) -> AppResult<()> {
        self.tiers.delete_tier(tier_id).await
    }

    /// Lists an entity's tiers for administrative screens.
    pub async fn list_tiers(&self, entity: EntityRef) -> AppResult<Vec<CommissionTier>> {
        self.tiers.list_tiers(entity).await
    }

    /// Resolves the commission percentage for an entity and amount.
    ///
    /// The active tier covering the amount wins (at most one exists by the
    /// non-overlap invariant); otherwise the entity's flat default; otherwise
    /// 0 for a missing entity — a policy fallback, not an error. Read-only
    /// and idempotent.
    pub async fn resolve_rate(&self, entity: EntityRef, amount: Decimal) -> AppResult<Decimal> {
        let tiers = self.tiers.list_active_tiers(entity).await?;
        if let Some(rate) = applicable_rate(&tiers, amount) {
            return Ok(rate);
        }

        Ok(self
            .directory
            .default_commission_rate(entity)
            .await?
            .unwrap_or(Decimal::ZERO))
    }
}
