use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::sync::Arc;
use drayage_core::CoreError;
use drayage_shared::{Container, ContainerSize, Shipment};

use crate::schedule::{ChargeTier, RateSchedule};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeKind {
    PerDiem,
    Demurrage,
}

impl fmt::Display for ChargeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChargeKind::PerDiem => f.write_str("per-diem"),
            ChargeKind::Demurrage => f.write_str("demurrage"),
        }
    }
}

/// What one tier contributed to a charge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierCharge {
    pub from_day: u32,
    pub to_day: Option<u32>,
    pub rate_per_day: Decimal,
    pub days_in_tier: u32,
    pub amount: Decimal,
}

/// Derived charge report; never a source of truth on its own
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeResult {
    pub kind: ChargeKind,
    pub days: u32,
    pub amount: Decimal,
    /// Instant chargeable days start counting from; `None` for a zero charge
    pub start_date: Option<DateTime<Utc>>,
    pub breakdown: Vec<TierCharge>,
}

impl ChargeResult {
    pub fn zero(kind: ChargeKind) -> Self {
        Self {
            kind,
            days: 0,
            amount: Decimal::ZERO,
            start_date: None,
            breakdown: Vec::new(),
        }
    }
}

/// Both charge kinds for one container at one instant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeSummary {
    pub container_id: uuid::Uuid,
    pub currency: String,
    pub evaluated_at: DateTime<Utc>,
    pub per_diem: ChargeResult,
    pub demurrage: ChargeResult,
    pub total: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum ChargeError {
    #[error("No {kind} rate table for container size {size}")]
    InvalidContainerSize { kind: ChargeKind, size: ContainerSize },
}

impl From<ChargeError> for CoreError {
    fn from(err: ChargeError) -> Self {
        match err {
            ChargeError::InvalidContainerSize { kind, size } => {
                CoreError::InvalidContainerSize(format!("{} ({})", size, kind))
            }
        }
    }
}

/// Tiered storage charge engine. Pure: the same inputs always produce the
/// same result, so it is safe to call for display and again for invoicing.
#[derive(Debug, Clone)]
pub struct ChargeCalculator {
    rates: Arc<RateSchedule>,
}

impl ChargeCalculator {
    pub fn new(rates: Arc<RateSchedule>) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &RateSchedule {
        &self.rates
    }

    pub fn calculate_per_diem(
        &self,
        container: &Container,
        shipment: &Shipment,
        now: DateTime<Utc>,
    ) -> Result<ChargeResult, ChargeError> {
        self.calculate(ChargeKind::PerDiem, container, shipment, now)
    }

    pub fn calculate_demurrage(
        &self,
        container: &Container,
        shipment: &Shipment,
        now: DateTime<Utc>,
    ) -> Result<ChargeResult, ChargeError> {
        self.calculate(ChargeKind::Demurrage, container, shipment, now)
    }

    pub fn summarize(
        &self,
        container: &Container,
        shipment: &Shipment,
        now: DateTime<Utc>,
    ) -> Result<ChargeSummary, ChargeError> {
        let per_diem = self.calculate_per_diem(container, shipment, now)?;
        let demurrage = self.calculate_demurrage(container, shipment, now)?;
        let total = per_diem.amount + demurrage.amount;

        Ok(ChargeSummary {
            container_id: container.id,
            currency: self.rates.currency.clone(),
            evaluated_at: now,
            per_diem,
            demurrage,
            total,
        })
    }

    fn calculate(
        &self,
        kind: ChargeKind,
        container: &Container,
        shipment: &Shipment,
        now: DateTime<Utc>,
    ) -> Result<ChargeResult, ChargeError> {
        if !shipment.is_import() {
            return Ok(ChargeResult::zero(kind));
        }

        let last_free_day = match shipment.last_free_day {
            Some(lfd) if now > lfd => lfd,
            _ => return Ok(ChargeResult::zero(kind)),
        };

        let (tiers, free_days) = match kind {
            ChargeKind::PerDiem => (self.rates.per_diem.tiers.get(&container.size), self.rates.per_diem.free_days),
            ChargeKind::Demurrage => (self.rates.demurrage.tiers.get(&container.size), 0),
        };
        let tiers = tiers.ok_or(ChargeError::InvalidContainerSize {
            kind,
            size: container.size,
        })?;

        let elapsed_days = (now - last_free_day).num_hours() / 24;
        let chargeable_days = elapsed_days - i64::from(free_days);
        if chargeable_days <= 0 {
            return Ok(ChargeResult::zero(kind));
        }
        let chargeable_days = u32::try_from(chargeable_days).unwrap_or(u32::MAX);

        let breakdown = apply_tiers(tiers, chargeable_days);
        let amount = breakdown.iter().map(|t| t.amount).sum();

        Ok(ChargeResult {
            kind,
            days: chargeable_days,
            amount,
            start_date: Some(last_free_day + Duration::days(i64::from(free_days))),
            breakdown,
        })
    }
}

/// Spread `chargeable_days` over an ascending tier list. Days past the last
/// closed tier bill at that tier's rate.
pub fn apply_tiers(tiers: &[ChargeTier], chargeable_days: u32) -> Vec<TierCharge> {
    let mut breakdown = Vec::new();

    for (index, tier) in tiers.iter().enumerate() {
        if tier.from_day > chargeable_days {
            break;
        }

        let is_last = index + 1 == tiers.len();
        let tier_end = match tier.to_day {
            Some(to_day) if !is_last => to_day.min(chargeable_days),
            _ => chargeable_days,
        };

        // An inverted tier covers no days
        let Some(span) = tier_end.checked_sub(tier.from_day) else {
            continue;
        };
        let days_in_tier = span + 1;
        let amount = (tier.rate_per_day * Decimal::from(days_in_tier))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        breakdown.push(TierCharge {
            from_day: tier.from_day,
            to_day: tier.to_day,
            rate_per_day: tier.rate_per_day,
            days_in_tier,
            amount,
        });

        if tier_end >= chargeable_days {
            break;
        }
    }

    breakdown
}
