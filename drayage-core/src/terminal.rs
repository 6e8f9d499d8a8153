use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use drayage_shared::TerminalAppointment;

use crate::repository::RepoError;

/// Gate open/close for one weekday, in terminal-local time. `[open, close)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl GateWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.open && time < self.close
    }
}

/// Weekly operating schedule of a terminal. A missing day means closed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyGateHours {
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub monday: Option<GateWindow>,
    #[serde(default)]
    pub tuesday: Option<GateWindow>,
    #[serde(default)]
    pub wednesday: Option<GateWindow>,
    #[serde(default)]
    pub thursday: Option<GateWindow>,
    #[serde(default)]
    pub friday: Option<GateWindow>,
    #[serde(default)]
    pub saturday: Option<GateWindow>,
    #[serde(default)]
    pub sunday: Option<GateWindow>,
}

impl WeeklyGateHours {
    /// Monday to Friday, 06:00 to 18:00 UTC
    pub fn weekdays_six_to_six() -> Self {
        let window = NaiveTime::from_hms_opt(6, 0, 0)
            .zip(NaiveTime::from_hms_opt(18, 0, 0))
            .map(|(open, close)| GateWindow { open, close });
        Self {
            utc_offset_minutes: 0,
            monday: window,
            tuesday: window,
            wednesday: window,
            thursday: window,
            friday: window,
            saturday: None,
            sunday: None,
        }
    }

    pub fn window_for(&self, weekday: Weekday) -> Option<GateWindow> {
        match weekday {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        let offset = match FixedOffset::east_opt(self.utc_offset_minutes * 60) {
            Some(offset) => offset,
            None => return false,
        };
        let local = at.with_timezone(&offset);
        self.window_for(local.weekday())
            .map_or(false, |window| window.contains(local.time()))
    }

    /// Every configured window must open before it closes
    pub fn validate(&self) -> Result<(), String> {
        if FixedOffset::east_opt(self.utc_offset_minutes * 60).is_none() {
            return Err(format!("utc_offset_minutes {} out of range", self.utc_offset_minutes));
        }
        let days = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        for day in days {
            if let Some(window) = self.window_for(day) {
                if window.open >= window.close {
                    return Err(format!("gate window for {} opens after it closes", day));
                }
            }
        }
        Ok(())
    }
}

/// Answers whether a terminal's gate is open at an instant
#[async_trait]
pub trait GateHours: Send + Sync {
    async fn is_open(
        &self,
        terminal_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, RepoError>;
}

/// Gate hours from configuration: one default schedule plus per-terminal overrides
#[derive(Debug, Clone, Default)]
pub struct ConfiguredGateHours {
    default: WeeklyGateHours,
    terminals: HashMap<Uuid, WeeklyGateHours>,
}

impl ConfiguredGateHours {
    pub fn new(default: WeeklyGateHours, terminals: HashMap<Uuid, WeeklyGateHours>) -> Self {
        Self { default, terminals }
    }

    pub fn schedule_for(&self, terminal_id: &Uuid) -> &WeeklyGateHours {
        self.terminals.get(terminal_id).unwrap_or(&self.default)
    }
}

#[async_trait]
impl GateHours for ConfiguredGateHours {
    async fn is_open(
        &self,
        terminal_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        Ok(self.schedule_for(&terminal_id).is_open_at(at))
    }
}

/// How many concurrent appointments a terminal accepts around an instant
#[async_trait]
pub trait SlotCapacity: Send + Sync {
    async fn capacity(
        &self,
        terminal_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u32, RepoError>;
}

#[derive(Debug, Clone)]
pub struct ConfiguredSlotCapacity {
    default: u32,
    terminals: HashMap<Uuid, u32>,
}

impl ConfiguredSlotCapacity {
    pub fn new(default: u32, terminals: HashMap<Uuid, u32>) -> Self {
        Self { default, terminals }
    }
}

#[async_trait]
impl SlotCapacity for ConfiguredSlotCapacity {
    async fn capacity(
        &self,
        terminal_id: Uuid,
        _at: DateTime<Utc>,
    ) -> Result<u32, RepoError> {
        Ok(self.terminals.get(&terminal_id).copied().unwrap_or(self.default))
    }
}

/// Terminal-side appointment system that issues confirmation numbers
#[async_trait]
pub trait TerminalGateway: Send + Sync {
    async fn request_confirmation(
        &self,
        appointment: &TerminalAppointment,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Confirms everything it is asked to; stands in for a real terminal API
pub struct SimulatedTerminalGateway;

#[async_trait]
impl TerminalGateway for SimulatedTerminalGateway {
    async fn request_confirmation(
        &self,
        appointment: &TerminalAppointment,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let short_id = appointment.id.simple().to_string()[..8].to_uppercase();
        tracing::info!(
            "Simulated terminal confirmation for appointment {} at terminal {}",
            appointment.id,
            appointment.terminal_id
        );
        Ok(format!("CNF-{}", short_id))
    }
}
