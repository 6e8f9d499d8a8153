use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use drayage_core::repository::AppointmentRepository;
use drayage_core::terminal::{GateHours, SlotCapacity};
use drayage_core::{CoreError, CoreResult};
use drayage_rates::SchedulingRules;
use drayage_shared::{AppointmentStatus, AppointmentType, Order, TerminalAppointment};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub order_id: Uuid,
    pub terminal_id: Uuid,
    pub appointment_type: AppointmentType,
    pub requested_time: DateTime<Utc>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

/// Terminal appointment rules. Reads appointments to check conflicts and
/// capacity but never writes; it hands back the records to persist.
pub struct AppointmentScheduler {
    rules: Arc<SchedulingRules>,
    gate_hours: Arc<dyn GateHours>,
    slots: Arc<dyn SlotCapacity>,
    appointments: Arc<dyn AppointmentRepository>,
}

impl AppointmentScheduler {
    pub fn new(
        rules: Arc<SchedulingRules>,
        gate_hours: Arc<dyn GateHours>,
        slots: Arc<dyn SlotCapacity>,
        appointments: Arc<dyn AppointmentRepository>,
    ) -> Self {
        Self {
            rules,
            gate_hours,
            slots,
            appointments,
        }
    }

    pub fn rules(&self) -> &SchedulingRules {
        &self.rules
    }

    /// Lead time first, then gate hours
    pub async fn validate_time(
        &self,
        terminal_id: Uuid,
        time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let lead_time = self.rules.min_lead_time();
        if time - now < lead_time {
            return Err(CoreError::validation(
                "requested_time",
                time.to_rfc3339(),
                format!(
                    "must be at least {} hours from now ({})",
                    self.rules.min_lead_time_hours,
                    now.to_rfc3339()
                ),
            ));
        }

        if !self.gate_hours.is_open(terminal_id, time).await? {
            return Err(CoreError::TerminalClosed {
                terminal_id: terminal_id.to_string(),
                at: time,
            });
        }

        Ok(())
    }

    async fn check_capacity(
        &self,
        terminal_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        replacing: Option<Uuid>,
    ) -> CoreResult<()> {
        let capacity = self.slots.capacity(terminal_id, start).await?;
        let booked = self
            .appointments
            .get_appointments_by_terminal(terminal_id, start, end)
            .await?
            .into_iter()
            .filter(|a| a.is_active() && a.overlaps(start, end) && Some(a.id) != replacing)
            .count();

        if booked >= capacity as usize {
            return Err(CoreError::SlotUnavailable {
                terminal_id: terminal_id.to_string(),
                at: start,
                capacity,
            });
        }

        Ok(())
    }

    pub async fn active_for_order(&self, order_id: Uuid) -> CoreResult<Option<TerminalAppointment>> {
        Ok(self
            .appointments
            .get_appointments_by_order(order_id)
            .await?
            .into_iter()
            .find(|a| a.is_active()))
    }

    /// Build a REQUESTED appointment after every precondition holds
    pub async fn prepare_request(
        &self,
        order: &Order,
        request: &AppointmentRequest,
        now: DateTime<Utc>,
    ) -> CoreResult<TerminalAppointment> {
        self.validate_time(request.terminal_id, request.requested_time, now).await?;

        if let Some(active) = self.active_for_order(order.id).await? {
            return Err(CoreError::conflict(
                "order",
                order.id,
                format!("appointment {} is already {}", active.id, active.status),
            ));
        }

        let window_start = request.requested_time;
        let window_end = window_start + self.rules.window_length();
        self.check_capacity(request.terminal_id, window_start, window_end, None).await?;

        Ok(TerminalAppointment {
            id: Uuid::new_v4(),
            order_id: order.id,
            terminal_id: request.terminal_id,
            container_id: order.container_id,
            appointment_type: request.appointment_type,
            status: AppointmentStatus::Requested,
            requested_time: request.requested_time,
            confirmed_time: None,
            window_start,
            window_end,
            confirmation_number: None,
            confirmed_by: None,
            actual_arrival_time: None,
            arrival_gate: None,
            completion_time: None,
            ticket_number: None,
            rescheduled_from: None,
            status_reason: None,
            special_instructions: request.special_instructions.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Request handed to the terminal, awaiting its answer
    pub fn mark_pending(&self, appointment: &TerminalAppointment, now: DateTime<Utc>) -> CoreResult<TerminalAppointment> {
        if appointment.status != AppointmentStatus::Requested {
            return Err(invalid_transition(appointment, AppointmentStatus::Pending));
        }
        let mut next = appointment.clone();
        next.status = AppointmentStatus::Pending;
        next.updated_at = now;
        Ok(next)
    }

    pub fn confirm(
        &self,
        appointment: &TerminalAppointment,
        confirmation_number: &str,
        confirmed_by: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<TerminalAppointment> {
        if !matches!(appointment.status, AppointmentStatus::Requested | AppointmentStatus::Pending) {
            return Err(invalid_transition(appointment, AppointmentStatus::Confirmed));
        }
        if confirmation_number.trim().is_empty() {
            return Err(CoreError::validation("confirmation_number", "", "must not be empty"));
        }

        let mut next = appointment.clone();
        next.status = AppointmentStatus::Confirmed;
        next.confirmation_number = Some(confirmation_number.to_string());
        next.confirmed_by = Some(confirmed_by.to_string());
        next.confirmed_time = Some(now);
        next.updated_at = now;
        Ok(next)
    }

    /// Returns `(closed, replacement)`; both must be written together
    pub async fn prepare_reschedule(
        &self,
        appointment: &TerminalAppointment,
        new_time: DateTime<Utc>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<(TerminalAppointment, TerminalAppointment)> {
        if !appointment.is_active() {
            return Err(invalid_transition(appointment, AppointmentStatus::Rescheduled));
        }

        self.validate_time(appointment.terminal_id, new_time, now).await?;

        let window_start = new_time;
        let window_end = window_start + self.rules.window_length();
        self.check_capacity(appointment.terminal_id, window_start, window_end, Some(appointment.id))
            .await?;

        let mut closed = appointment.clone();
        closed.status = AppointmentStatus::Rescheduled;
        closed.status_reason = Some(reason.to_string());
        closed.updated_at = now;

        let replacement = TerminalAppointment {
            id: Uuid::new_v4(),
            order_id: appointment.order_id,
            terminal_id: appointment.terminal_id,
            container_id: appointment.container_id,
            appointment_type: appointment.appointment_type,
            status: AppointmentStatus::Requested,
            requested_time: new_time,
            confirmed_time: None,
            window_start,
            window_end,
            confirmation_number: None,
            confirmed_by: None,
            actual_arrival_time: None,
            arrival_gate: None,
            completion_time: None,
            ticket_number: None,
            rescheduled_from: Some(appointment.id),
            status_reason: None,
            special_instructions: appointment.special_instructions.clone(),
            created_at: now,
            updated_at: now,
        };

        Ok((closed, replacement))
    }

    pub fn cancel(
        &self,
        appointment: &TerminalAppointment,
        reason: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<TerminalAppointment> {
        if !appointment.is_active() {
            return Err(invalid_transition(appointment, AppointmentStatus::Cancelled));
        }
        let mut next = appointment.clone();
        next.status = AppointmentStatus::Cancelled;
        next.status_reason = Some(reason.to_string());
        next.updated_at = now;
        Ok(next)
    }

    /// Stamps the arrival; on-time-ness is reported, never enforced
    pub fn record_arrival(
        &self,
        appointment: &TerminalAppointment,
        arrival_time: DateTime<Utc>,
        gate: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<(TerminalAppointment, bool)> {
        if !appointment.is_active() {
            return Err(CoreError::InvalidState {
                entity: "appointment",
                from: appointment.status.to_string(),
                to: "ARRIVED".to_string(),
                allowed: allowed_from(appointment.status),
            });
        }
        if let Some(previous) = appointment.actual_arrival_time {
            return Err(CoreError::conflict(
                "appointment",
                appointment.id,
                format!("arrival already recorded at {}", previous.to_rfc3339()),
            ));
        }

        let mut next = appointment.clone();
        next.actual_arrival_time = Some(arrival_time);
        next.arrival_gate = gate.map(str::to_string);
        next.updated_at = now;
        let on_time = next.arrived_on_time(self.rules.arrival_grace()).unwrap_or(false);
        Ok((next, on_time))
    }

    pub fn complete(
        &self,
        appointment: &TerminalAppointment,
        completion_time: DateTime<Utc>,
        ticket_number: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<TerminalAppointment> {
        if !appointment.is_active() || appointment.actual_arrival_time.is_none() {
            return Err(invalid_transition(appointment, AppointmentStatus::Completed));
        }
        let mut next = appointment.clone();
        next.status = AppointmentStatus::Completed;
        next.completion_time = Some(completion_time);
        next.ticket_number = ticket_number.map(str::to_string);
        next.updated_at = now;
        Ok(next)
    }
}

fn allowed_from(status: AppointmentStatus) -> Vec<String> {
    use AppointmentStatus::*;
    let targets: &[AppointmentStatus] = match status {
        Requested => &[Pending, Confirmed, Cancelled, Rescheduled, Completed],
        Pending => &[Confirmed, Cancelled, Rescheduled, Completed],
        Confirmed => &[Cancelled, Rescheduled, Completed],
        Cancelled | Completed | Missed | Rescheduled => &[],
    };
    targets.iter().map(|s| s.to_string()).collect()
}

fn invalid_transition(appointment: &TerminalAppointment, to: AppointmentStatus) -> CoreError {
    CoreError::InvalidState {
        entity: "appointment",
        from: appointment.status.to_string(),
        to: to.to_string(),
        allowed: allowed_from(appointment.status),
    }
}
