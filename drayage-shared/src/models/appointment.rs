use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentType {
    Pickup,
    Return,
    DropOff,
    Dual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Requested,
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Missed,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Requested | AppointmentStatus::Pending | AppointmentStatus::Confirmed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Requested => "REQUESTED",
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Missed => "MISSED",
            AppointmentStatus::Rescheduled => "RESCHEDULED",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled gate visit. Reschedules never mutate the time fields of an
/// existing record; they close it and link a new one via `rescheduled_from`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalAppointment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub terminal_id: Uuid,
    pub container_id: Uuid,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub requested_time: DateTime<Utc>,
    pub confirmed_time: Option<DateTime<Utc>>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub confirmation_number: Option<String>,
    pub confirmed_by: Option<String>,
    pub actual_arrival_time: Option<DateTime<Utc>>,
    pub arrival_gate: Option<String>,
    pub completion_time: Option<DateTime<Utc>>,
    pub ticket_number: Option<String>,
    pub rescheduled_from: Option<Uuid>,
    /// Why the record was cancelled or rescheduled
    pub status_reason: Option<String>,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TerminalAppointment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Confirmed, nobody showed up, and the window has closed
    pub fn is_missed(&self, now: DateTime<Utc>) -> bool {
        self.status == AppointmentStatus::Confirmed
            && self.actual_arrival_time.is_none()
            && now > self.window_end
    }

    /// `None` until an arrival is recorded
    pub fn arrived_on_time(&self, grace: Duration) -> Option<bool> {
        self.actual_arrival_time
            .map(|arrival| arrival >= self.window_start - grace && arrival <= self.window_end)
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.window_start < end && start < self.window_end
    }
}
