use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;
use drayage_core::terminal::WeeklyGateHours;
use drayage_shared::ContainerSize;

/// One row of a rate table. Day numbers count chargeable days, starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeTier {
    pub from_day: u32,
    /// `None` means the tier runs open-ended
    #[serde(default)]
    pub to_day: Option<u32>,
    pub rate_per_day: Decimal,
}

/// Yard storage charged after the free period that follows LFD
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerDiemRates {
    #[serde(default)]
    pub free_days: u32,
    #[serde(default)]
    pub tiers: HashMap<ContainerSize, Vec<ChargeTier>>,
}

/// Steamship-line charge; accrues from the first day after LFD
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemurrageRates {
    #[serde(default)]
    pub tiers: HashMap<ContainerSize, Vec<ChargeTier>>,
}

/// Immutable, size-dependent rate tables for both charge kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSchedule {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub per_diem: PerDiemRates,
    #[serde(default)]
    pub demurrage: DemurrageRates,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid {table} rate table for {size}: {message}")]
pub struct RateScheduleError {
    pub table: &'static str,
    pub size: ContainerSize,
    pub message: String,
}

impl RateSchedule {
    pub fn validate(&self) -> Result<(), RateScheduleError> {
        for (size, tiers) in &self.per_diem.tiers {
            validate_tiers("per-diem", *size, tiers)?;
        }
        for (size, tiers) in &self.demurrage.tiers {
            validate_tiers("demurrage", *size, tiers)?;
        }
        Ok(())
    }
}

/// Tiers must start at day 1, ascend without gaps or overlaps, and only the
/// last one may be open-ended.
fn validate_tiers(table: &'static str, size: ContainerSize, tiers: &[ChargeTier]) -> Result<(), RateScheduleError> {
    let fail = |message: String| RateScheduleError { table, size, message };

    if tiers.is_empty() {
        return Err(fail("no tiers configured".to_string()));
    }

    let mut expected_from = 1;
    for (index, tier) in tiers.iter().enumerate() {
        if tier.from_day != expected_from {
            return Err(fail(format!(
                "tier {} starts at day {}, expected day {}",
                index + 1,
                tier.from_day,
                expected_from
            )));
        }
        if tier.rate_per_day.is_sign_negative() {
            return Err(fail(format!("tier {} has a negative rate", index + 1)));
        }
        match tier.to_day {
            Some(to_day) if to_day < tier.from_day => {
                return Err(fail(format!("tier {} ends before it starts", index + 1)));
            }
            Some(to_day) => expected_from = to_day + 1,
            None if index + 1 != tiers.len() => {
                return Err(fail(format!("open-ended tier {} must be the last one", index + 1)));
            }
            None => {}
        }
    }

    Ok(())
}

/// Scheduling constants consumed by the appointment scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingRules {
    #[serde(default = "default_min_lead_time_hours")]
    pub min_lead_time_hours: i64,
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    /// How early a truck may arrive and still count as on time
    #[serde(default = "default_arrival_grace_minutes")]
    pub arrival_grace_minutes: i64,
    #[serde(default = "default_confirmation_delay_seconds")]
    pub confirmation_delay_seconds: u64,
    #[serde(default = "default_slot_capacity")]
    pub default_slot_capacity: u32,
    #[serde(default)]
    pub slot_capacity: HashMap<Uuid, u32>,
    #[serde(default = "WeeklyGateHours::weekdays_six_to_six")]
    pub gate_hours: WeeklyGateHours,
    #[serde(default)]
    pub terminal_gate_hours: HashMap<Uuid, WeeklyGateHours>,
}

fn default_min_lead_time_hours() -> i64 { 2 }
fn default_window_minutes() -> i64 { 120 }
fn default_arrival_grace_minutes() -> i64 { 15 }
fn default_confirmation_delay_seconds() -> u64 { 5 }
fn default_slot_capacity() -> u32 { 10 }

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            min_lead_time_hours: default_min_lead_time_hours(),
            window_minutes: default_window_minutes(),
            arrival_grace_minutes: default_arrival_grace_minutes(),
            confirmation_delay_seconds: default_confirmation_delay_seconds(),
            default_slot_capacity: default_slot_capacity(),
            slot_capacity: HashMap::new(),
            gate_hours: WeeklyGateHours::weekdays_six_to_six(),
            terminal_gate_hours: HashMap::new(),
        }
    }
}

impl SchedulingRules {
    pub fn min_lead_time(&self) -> chrono::Duration {
        chrono::Duration::hours(self.min_lead_time_hours)
    }

    pub fn window_length(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.window_minutes)
    }

    pub fn arrival_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.arrival_grace_minutes)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_lead_time_hours < 0 {
            return Err("min_lead_time_hours must not be negative".to_string());
        }
        if self.window_minutes <= 0 {
            return Err("window_minutes must be positive".to_string());
        }
        if self.arrival_grace_minutes < 0 {
            return Err("arrival_grace_minutes must not be negative".to_string());
        }
        self.gate_hours.validate()?;
        for (terminal_id, hours) in &self.terminal_gate_hours {
            hours
                .validate()
                .map_err(|e| format!("terminal {}: {}", terminal_id, e))?;
        }
        Ok(())
    }
}
