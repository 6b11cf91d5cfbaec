//! Commission tier ranges and the non-overlap invariant.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wakala_core::{AppError, AppResult};

use crate::security::ActorId;

/// Kind of entity that can own commission tiers and a flat default rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A company owning uploaded files.
    Company,
    /// An invoiced client.
    Client,
    /// A commission-earning distributor actor.
    Distributor,
}

impl EntityKind {
    /// Returns a stable storage value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Client => "client",
            Self::Distributor => "distributor",
        }
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "company" => Ok(Self::Company),
            "client" => Ok(Self::Client),
            "distributor" => Ok(Self::Distributor),
            _ => Err(AppError::Validation(format!(
                "unknown entity kind '{value}'"
            ))),
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

/// Reference to one tier-owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity identifier within its kind.
    pub id: Uuid,
}

impl EntityRef {
    /// References a company.
    #[must_use]
    pub fn company(id: Uuid) -> Self {
        Self {
            kind: EntityKind::Company,
            id,
        }
    }

    /// References a client.
    #[must_use]
    pub fn client(id: Uuid) -> Self {
        Self {
            kind: EntityKind::Client,
            id,
        }
    }

    /// References a distributor actor.
    #[must_use]
    pub fn distributor(id: Uuid) -> Self {
        Self {
            kind: EntityKind::Distributor,
            id,
        }
    }
}

impl Display for EntityRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.kind, self.id)
    }
}

/// Unique identifier for a commission tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierId(Uuid);

impl TierId {
    /// Creates a new random tier identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a tier identifier from an existing UUID value.
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

impl Default for TierId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TierId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validates that a tier range minimum lies strictly below its maximum.
pub fn validate_range(min_amount: Decimal, max_amount: Decimal) -> AppResult<()> {
    if min_amount >= max_amount {
        return Err(AppError::TierRange {
            min: min_amount,
            max: max_amount,
        });
    }

    Ok(())
}

/// Validates that a commission rate is a percentage in `[0, 100]`.
pub fn validate_rate(rate: Decimal) -> AppResult<()> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(AppError::Validation(format!(
            "commission rate {rate} must lie between 0 and 100"
        )));
    }

    Ok(())
}

/// One amount range with an associated commission rate for one entity.
///
/// Ranges are closed intervals. Among the active tiers of one entity no two
/// intervals may intersect; the store enforces that invariant at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionTier {
    id: TierId,
    entity: EntityRef,
    min_amount: Decimal,
    max_amount: Decimal,
    rate: Decimal,
    active: bool,
    created_by: ActorId,
}

impl CommissionTier {
    /// Creates a new active tier, validating range and rate.
    pub fn new(
        entity: EntityRef,
        min_amount: Decimal,
        max_amount: Decimal,
        rate: Decimal,
        created_by: ActorId,
    ) -> AppResult<Self> {
        validate_range(min_amount, max_amount)?;
        validate_rate(rate)?;

        Ok(Self {
            id: TierId::new(),
            entity,
            min_amount,
            max_amount,
            rate,
            active: true,
            created_by,
        })
    }

    /// Rehydrates a tier from stored fields, re-running validation.
    pub fn restore(
        id: TierId,
        entity: EntityRef,
        min_amount: Decimal,
        max_amount: Decimal,
        rate: Decimal,
        active: bool,
        created_by: ActorId,
    ) -> AppResult<Self> {
        validate_range(min_amount, max_amount)?;
        validate_rate(rate)?;

        Ok(Self {
            id,
            entity,
            min_amount,
            max_amount,
            rate,
            active,
            created_by,
        })
    }

    /// Returns a copy with replaced range, rate and active flag.
    pub fn updated(
        &self,
        min_amount: Decimal,
        max_amount: Decimal,
        rate: Decimal,
        active: bool,
    ) -> AppResult<Self> {
        validate_range(min_amount, max_amount)?;
        validate_rate(rate)?;

        Ok(Self {
            id: self.id,
            entity: self.entity,
            min_amount,
            max_amount,
            rate,
            active,
            created_by: self.created_by,
        })
    }

    /// Returns the tier identifier.
    #[must_use]
    pub fn id(&self) -> TierId {
        self.id
    }

    /// Returns the owning entity.
    #[must_use]
    pub fn entity(&self) -> EntityRef {
        self.entity
    }

    /// Returns the inclusive range minimum.
    #[must_use]
    pub fn min_amount(&self) -> Decimal {
        self.min_amount
    }

    /// Returns the inclusive range maximum.
    #[must_use]
    pub fn max_amount(&self) -> Decimal {
        self.max_amount
    }

    /// Returns the commission percentage for this range.
    #[must_use]
    pub fn rate(&self) -> Decimal {
        self.rate
    }

    /// Returns whether the tier participates in resolution.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the actor that created the tier.
    #[must_use]
    pub fn created_by(&self) -> ActorId {
        self.created_by
    }

    /// Returns whether the closed interval covers the amount.
    #[must_use]
    pub fn covers(&self, amount: Decimal) -> bool {
        self.min_amount <= amount && amount <= self.max_amount
    }

    /// Returns whether this tier's closed interval intersects `[min, max]`.
    ///
    /// Two closed intervals `[a, b]` and `[c, d]` intersect iff
    /// `a <= d && c <= b`; adjacent tiers sharing an exact boundary count as
    /// overlapping.
    #[must_use]
    pub fn intersects(&self, min_amount: Decimal, max_amount: Decimal) -> bool {
        self.min_amount <= max_amount && min_amount <= self.max_amount
    }
}

/// Finds an active tier of the same entity whose interval intersects the
/// proposed range, skipping `exclude` (the tier being updated).
#[must_use]
pub fn find_overlap<'a>(
    tiers: &'a [CommissionTier],
    min_amount: Decimal,
    max_amount: Decimal,
    exclude: Option<TierId>,
) -> Option<&'a CommissionTier> {
    tiers.iter().find(|tier| {
        tier.is_active()
            && exclude != Some(tier.id())
            && tier.intersects(min_amount, max_amount)
    })
}

/// Returns the rate of the active tier covering the amount, if any.
///
/// The store's non-overlap invariant guarantees at most one match.
#[must_use]
pub fn applicable_rate(tiers: &[CommissionTier], amount: Decimal) -> Option<Decimal> {
    tiers
        .iter()
        .find(|tier| tier.is_active() && tier.covers(amount))
        .map(CommissionTier::rate)
}
