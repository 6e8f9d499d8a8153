use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;
use drayage_core::clock::{Clock, SystemClock};
use drayage_core::events::EventPublisher;
use drayage_core::repository::{
    AppointmentRepository, ContainerRepository, OrderRepository, ShipmentRepository,
};
use drayage_core::terminal::{
    ConfiguredGateHours, ConfiguredSlotCapacity, GateHours, SimulatedTerminalGateway,
    SlotCapacity, TerminalGateway,
};
use drayage_core::{CoreError, CoreResult};
use drayage_rates::{ChargeCalculator, ChargeSummary, RateSchedule, SchedulingRules};
use drayage_shared::models::events::*;
use drayage_shared::{
    AppointmentStatus, BillingStatus, Container, ContainerUpdate, DomainEvent, NewContainer, NewOrder,
    NewShipment, Order, OrderFilter, OrderStatus, Shipment, ShipmentStatus, ShipmentType,
    TerminalAppointment,
};

use crate::billing::apply_billing;
use crate::confirmation::ConfirmationTasks;
use crate::locks::KeyedLocks;
use crate::scheduler::{AppointmentRequest, AppointmentScheduler};
use crate::state_machine::OrderStateMachine;

/// Persistence contracts the coordinator writes through
#[derive(Clone)]
pub struct Repositories {
    pub shipments: Arc<dyn ShipmentRepository>,
    pub containers: Arc<dyn ContainerRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
}

/// Everything outside the engine that it consults or notifies
#[derive(Clone)]
pub struct Collaborators {
    pub gate_hours: Arc<dyn GateHours>,
    pub slots: Arc<dyn SlotCapacity>,
    pub gateway: Arc<dyn TerminalGateway>,
    pub events: Arc<dyn EventPublisher>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Gate hours and capacity from configuration, simulated terminal, wall clock
    pub fn from_rules(rules: &SchedulingRules, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            gate_hours: Arc::new(ConfiguredGateHours::new(
                rules.gate_hours.clone(),
                rules.terminal_gate_hours.clone(),
            )),
            slots: Arc::new(ConfiguredSlotCapacity::new(
                rules.default_slot_capacity,
                rules.slot_capacity.clone(),
            )),
            gateway: Arc::new(SimulatedTerminalGateway),
            events,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn TerminalGateway>) -> Self {
        self.gateway = gateway;
        self
    }
}

/// Outcome of a bulk status update. Orders that fail validation are
/// skipped with a reason; the rest are written in one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkUpdateReport {
    pub updated: Vec<Uuid>,
    pub skipped: Vec<SkippedOrder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedOrder {
    pub order_id: Uuid,
    pub reason: String,
}

/// An appointment released with its order, and the status it had
type Released = (AppointmentStatus, TerminalAppointment);

/// An appointment plus the facts readers derive from it
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: TerminalAppointment,
    pub is_missed: bool,
    pub on_time: Option<bool>,
}

/// Orchestrates the order state machine, appointment scheduler and charge
/// calculator. The only component that writes to repositories or
/// publishes events.
///
/// Every read-check-write sequence runs under a per-order lock (per
/// container for order creation). Appointment requests and reschedules
/// additionally take a per-terminal lock so slot capacity is checked and
/// claimed atomically. Lock order is always container, order, terminal;
/// shipment locks are never held together with another lock.
#[derive(Clone)]
pub struct LifecycleCoordinator {
    repos: Repositories,
    gateway: Arc<dyn TerminalGateway>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    calculator: Arc<ChargeCalculator>,
    scheduler: Arc<AppointmentScheduler>,
    confirmations: ConfirmationTasks,
    shipment_locks: Arc<KeyedLocks<Uuid>>,
    container_locks: Arc<KeyedLocks<Uuid>>,
    order_locks: Arc<KeyedLocks<Uuid>>,
    terminal_locks: Arc<KeyedLocks<Uuid>>,
}

impl LifecycleCoordinator {
    pub fn new(
        repos: Repositories,
        collaborators: Collaborators,
        rates: Arc<RateSchedule>,
        rules: Arc<SchedulingRules>,
    ) -> Self {
        let scheduler = AppointmentScheduler::new(
            rules,
            collaborators.gate_hours,
            collaborators.slots,
            repos.appointments.clone(),
        );

        Self {
            repos,
            gateway: collaborators.gateway,
            events: collaborators.events,
            clock: collaborators.clock,
            calculator: Arc::new(ChargeCalculator::new(rates)),
            scheduler: Arc::new(scheduler),
            confirmations: ConfirmationTasks::new(),
            shipment_locks: Arc::new(KeyedLocks::new()),
            container_locks: Arc::new(KeyedLocks::new()),
            order_locks: Arc::new(KeyedLocks::new()),
            terminal_locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn calculator(&self) -> &ChargeCalculator {
        &self.calculator
    }

    pub fn pending_confirmations(&self) -> usize {
        self.confirmations.pending()
    }

    // ============================================================================
    // Shipments and containers
    // ============================================================================

    /// Creates the shipment and its containers in one write
    pub async fn create_shipment(&self, request: NewShipment) -> CoreResult<(Shipment, Vec<Container>)> {
        let now = self.clock.now();
        let (shipment, new_containers) = request.into_shipment(now);
        shipment.validate()?;

        let mut seen = std::collections::HashSet::new();
        for c in &new_containers {
            if !seen.insert(c.number.clone()) {
                return Err(CoreError::validation(
                    "containers",
                    c.number.as_str(),
                    "container number appears more than once",
                ));
            }
        }

        let containers: Vec<Container> = new_containers
            .into_iter()
            .map(|c| c.into_container(shipment.id, now))
            .collect();

        self.repos.shipments.create_shipment(&shipment, &containers).await?;
        info!(
            "Created {:?} shipment {} ({}) with {} containers",
            shipment.shipment_type,
            shipment.id,
            shipment.reference_number,
            containers.len()
        );

        self.publish(DomainEvent::ShipmentCreated(ShipmentCreatedEvent {
            shipment_id: shipment.id,
            reference_number: shipment.reference_number.clone(),
            container_ids: containers.iter().map(|c| c.id).collect(),
            timestamp: now,
        }))
        .await;

        Ok((shipment, containers))
    }

    pub async fn get_shipment(&self, id: Uuid) -> CoreResult<Shipment> {
        self.repos
            .shipments
            .get_shipment(id)
            .await?
            .ok_or_else(|| CoreError::not_found("shipment", id))
    }

    pub async fn get_container(&self, id: Uuid) -> CoreResult<Container> {
        self.repos
            .containers
            .get_container(id)
            .await?
            .ok_or_else(|| CoreError::not_found("container", id))
    }

    pub async fn containers_for_shipment(&self, shipment_id: Uuid) -> CoreResult<Vec<Container>> {
        self.get_shipment(shipment_id).await?;
        Ok(self.repos.containers.get_containers_by_shipment(shipment_id).await?)
    }

    pub async fn add_container(&self, shipment_id: Uuid, request: NewContainer) -> CoreResult<Container> {
        let now = self.clock.now();
        let shipment = self.get_shipment(shipment_id).await?;

        let existing = self.repos.containers.get_containers_by_shipment(shipment.id).await?;
        if existing.iter().any(|c| c.number == request.number) {
            return Err(CoreError::conflict(
                "container",
                request.number.as_str(),
                format!("already on shipment {}", shipment.reference_number),
            ));
        }

        let container = request.into_container(shipment.id, now);
        self.repos.containers.create_container(&container).await?;
        info!("Added container {} to shipment {}", container.number, shipment.id);
        Ok(container)
    }

    pub async fn update_last_free_day(&self, shipment_id: Uuid, last_free_day: DateTime<Utc>) -> CoreResult<Shipment> {
        let _guard = self.shipment_locks.lock(shipment_id).await;
        let mut shipment = self.get_shipment(shipment_id).await?;
        if shipment.shipment_type != ShipmentType::Import {
            return Err(CoreError::validation(
                "last_free_day",
                last_free_day.to_rfc3339(),
                "only import shipments carry a last free day",
            ));
        }

        shipment.last_free_day = Some(last_free_day);
        shipment.updated_at = self.clock.now();
        self.repos.shipments.update_shipment(&shipment).await?;
        info!("Shipment {} last free day set to {}", shipment.id, last_free_day);
        Ok(shipment)
    }

    pub async fn update_shipment_status(&self, shipment_id: Uuid, to: ShipmentStatus) -> CoreResult<Shipment> {
        let _guard = self.shipment_locks.lock(shipment_id).await;
        let shipment = self.get_shipment(shipment_id).await?;
        if !shipment.status.can_transition(to) {
            return Err(CoreError::InvalidState {
                entity: "shipment",
                from: shipment.status.to_string(),
                to: to.to_string(),
                allowed: shipment
                    .status
                    .allowed_transitions()
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            });
        }

        let now = self.clock.now();
        let mut updated = shipment.clone();
        updated.status = to;
        updated.updated_at = now;
        self.repos.shipments.update_shipment(&updated).await?;
        info!("Shipment {} {} -> {}", shipment.id, shipment.status, to);

        self.publish(DomainEvent::ShipmentStatusChanged(ShipmentStatusChangedEvent {
            shipment_id: shipment.id,
            old_status: shipment.status,
            new_status: to,
            timestamp: now,
        }))
        .await;
        Ok(updated)
    }

    /// Records customs and location facts as the terminal or driver reports them
    pub async fn update_container(&self, container_id: Uuid, update: ContainerUpdate) -> CoreResult<Container> {
        if update.is_empty() {
            return Err(CoreError::validation("container", container_id, "no fields to update"));
        }

        let _guard = self.container_locks.lock(container_id).await;
        let container = self.get_container(container_id).await?;
        let now = self.clock.now();
        let updated = update.apply(&container, now);
        self.repos.containers.update_container(&updated).await?;
        debug!(
            "Container {} customs {:?}, {:?} at {:?}",
            updated.number, updated.customs_status, updated.physical_state, updated.location_type
        );

        self.publish(DomainEvent::ContainerUpdated(ContainerUpdatedEvent {
            container_id: updated.id,
            shipment_id: updated.shipment_id,
            customs_status: updated.customs_status,
            physical_state: updated.physical_state,
            location_type: updated.location_type,
            timestamp: now,
        }))
        .await;
        Ok(updated)
    }

    // ============================================================================
    // Orders
    // ============================================================================

    /// One active order per container, checked under the container lock
    pub async fn create_order(&self, shipment_id: Uuid, request: NewOrder) -> CoreResult<Order> {
        let shipment = self.get_shipment(shipment_id).await?;
        let container = self.get_container(request.container_id).await?;
        if container.shipment_id != shipment.id {
            return Err(CoreError::validation(
                "container_id",
                container.id,
                format!("container belongs to shipment {}", container.shipment_id),
            ));
        }

        let _guard = self.container_locks.lock(container.id).await;

        let existing = self.repos.orders.get_orders_by_container(container.id).await?;
        if let Some(active) = existing.iter().find(|o| o.is_active()) {
            return Err(CoreError::conflict(
                "container",
                container.id,
                format!("order {} is still {}", active.order_number, active.status),
            ));
        }

        let now = self.clock.now();
        let order_number = self.repos.orders.next_order_number().await?;
        let order = request.into_order(order_number, shipment.id, now);
        self.repos.orders.create_order(&order).await?;
        info!("Created order {} ({}) for container {}", order.order_number, order.id, container.number);

        self.publish(DomainEvent::OrderCreated(OrderCreatedEvent {
            order_id: order.id,
            order_number: order.order_number.clone(),
            shipment_id: order.shipment_id,
            container_id: order.container_id,
            timestamp: now,
        }))
        .await;

        Ok(order)
    }

    pub async fn get_order(&self, id: Uuid) -> CoreResult<Order> {
        self.repos
            .orders
            .get_order(id)
            .await?
            .ok_or_else(|| CoreError::not_found("order", id))
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>> {
        Ok(self.repos.orders.list_orders(filter).await?)
    }

    /// Applies one status transition. Moving to a terminal status releases
    /// the order's active appointment in the same write.
    pub async fn transition_order(&self, order_id: Uuid, to: OrderStatus, reason: &str) -> CoreResult<Order> {
        let _guard = self.order_locks.lock(order_id).await;
        let order = self.get_order(order_id).await?;
        let now = self.clock.now();

        let updated = OrderStateMachine::apply_transition(&order, to, reason, now)?;
        let released = self.plan_release(&updated, reason, now).await?;
        let released_rows: Vec<TerminalAppointment> = released.iter().map(|(_, a)| a.clone()).collect();
        self.repos
            .orders
            .update_orders(std::slice::from_ref(&updated), &released_rows)
            .await?;
        info!("Order {} {} -> {} ({})", order.id, order.status, updated.status, reason);

        self.after_transition(&order, &updated, released, reason, now).await;
        Ok(updated)
    }

    pub async fn cancel_order(&self, order_id: Uuid, reason: &str) -> CoreResult<Order> {
        self.transition_order(order_id, OrderStatus::Cancelled, reason).await
    }

    /// Validates each order on its own; bad ones are skipped and logged,
    /// the rest land in a single repository batch together with any
    /// appointments they release.
    pub async fn bulk_update_status(
        &self,
        order_ids: &[Uuid],
        to: OrderStatus,
        reason: &str,
    ) -> CoreResult<BulkUpdateReport> {
        let _guards = self.order_locks.lock_many(order_ids).await;
        let now = self.clock.now();
        let mut report = BulkUpdateReport::default();
        let mut batch: Vec<(Order, Order, Option<Released>)> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for &order_id in order_ids {
            if !seen.insert(order_id) {
                continue;
            }
            match self.prepare_bulk_item(order_id, to, reason, now).await {
                Ok(item) => batch.push(item),
                Err(e) => {
                    warn!("Bulk update skipped order {}: {}", order_id, e);
                    report.skipped.push(SkippedOrder {
                        order_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let updated: Vec<Order> = batch.iter().map(|(_, after, _)| after.clone()).collect();
        let released: Vec<TerminalAppointment> = batch
            .iter()
            .filter_map(|(_, _, released)| released.as_ref().map(|(_, a)| a.clone()))
            .collect();
        if !updated.is_empty() {
            self.repos.orders.update_orders(&updated, &released).await?;
        }
        info!(
            "Bulk update to {}: {} updated, {} skipped",
            to,
            updated.len(),
            report.skipped.len()
        );

        for (before, after, released) in batch {
            report.updated.push(after.id);
            self.after_transition(&before, &after, released, reason, now).await;
        }

        Ok(report)
    }

    async fn prepare_bulk_item(
        &self,
        order_id: Uuid,
        to: OrderStatus,
        reason: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<(Order, Order, Option<Released>)> {
        let order = self
            .repos
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("order", order_id))?;
        let updated = OrderStateMachine::apply_transition(&order, to, reason, now)?;
        let released = self.plan_release(&updated, reason, now).await?;
        Ok((order, updated, released))
    }

    pub async fn mark_billed(&self, order_id: Uuid) -> CoreResult<Order> {
        self.apply_billing_status(order_id, BillingStatus::Billed).await
    }

    pub async fn mark_paid(&self, order_id: Uuid) -> CoreResult<Order> {
        self.apply_billing_status(order_id, BillingStatus::Paid).await
    }

    async fn apply_billing_status(&self, order_id: Uuid, to: BillingStatus) -> CoreResult<Order> {
        let _guard = self.order_locks.lock(order_id).await;
        let order = self.get_order(order_id).await?;
        let updated = apply_billing(&order, to, self.clock.now())?;
        self.repos.orders.update_order(&updated).await?;
        info!("Order {} billing {} -> {}", order.id, order.billing_status, updated.billing_status);
        Ok(updated)
    }

    // ============================================================================
    // Charges
    // ============================================================================

    /// Read-only; runs without locks
    pub async fn charges_for_container(&self, container_id: Uuid) -> CoreResult<ChargeSummary> {
        let container = self.get_container(container_id).await?;
        let shipment = self.get_shipment(container.shipment_id).await?;
        let summary = self.calculator.summarize(&container, &shipment, self.clock.now())?;
        debug!(
            "Charges for container {}: per diem {} ({} days), demurrage {} ({} days)",
            container.number,
            summary.per_diem.amount,
            summary.per_diem.days,
            summary.demurrage.amount,
            summary.demurrage.days
        );
        Ok(summary)
    }

    pub async fn charges_for_order(&self, order_id: Uuid) -> CoreResult<ChargeSummary> {
        let order = self.get_order(order_id).await?;
        self.charges_for_container(order.container_id).await
    }

    // ============================================================================
    // Appointments
    // ============================================================================

    pub async fn request_appointment(&self, request: AppointmentRequest) -> CoreResult<TerminalAppointment> {
        let now = self.clock.now();
        // Cheap rejections before any lock or read
        self.scheduler.validate_time(request.terminal_id, request.requested_time, now).await?;

        let _order_guard = self.order_locks.lock(request.order_id).await;
        let order = self.get_order(request.order_id).await?;
        if !order.is_active() {
            return Err(CoreError::conflict(
                "order",
                order.id,
                format!("order is {}", order.status),
            ));
        }

        let _terminal_guard = self.terminal_locks.lock(request.terminal_id).await;
        let appointment = self.scheduler.prepare_request(&order, &request, now).await?;
        self.repos.appointments.create_appointment(&appointment).await?;
        info!(
            "Appointment {} requested for order {} at terminal {} ({} - {})",
            appointment.id, order.order_number, appointment.terminal_id, appointment.window_start, appointment.window_end
        );

        self.publish(DomainEvent::AppointmentRequested(AppointmentRequestedEvent {
            appointment_id: appointment.id,
            order_id: appointment.order_id,
            terminal_id: appointment.terminal_id,
            requested_time: appointment.requested_time,
            window_start: appointment.window_start,
            window_end: appointment.window_end,
            timestamp: now,
        }))
        .await;

        self.schedule_confirmation(appointment.id);
        Ok(appointment)
    }

    pub async fn confirm_appointment(
        &self,
        appointment_id: Uuid,
        confirmation_number: &str,
        confirmed_by: &str,
    ) -> CoreResult<TerminalAppointment> {
        let existing = self.get_appointment_record(appointment_id).await?;
        let _guard = self.order_locks.lock(existing.order_id).await;
        let appointment = self.get_appointment_record(appointment_id).await?;

        let confirmed = self.scheduler.confirm(&appointment, confirmation_number, confirmed_by, self.clock.now())?;
        self.repos.appointments.update_appointment(&confirmed).await?;
        // A manual confirmation supersedes the terminal's
        self.confirmations.cancel(appointment_id);
        info!("Appointment {} confirmed ({}) by {}", confirmed.id, confirmation_number, confirmed_by);

        self.publish(appointment_confirmed(&confirmed)).await;
        Ok(confirmed)
    }

    /// Closes the current record and opens its replacement in one write
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        new_time: DateTime<Utc>,
        reason: &str,
    ) -> CoreResult<TerminalAppointment> {
        let existing = self.get_appointment_record(appointment_id).await?;
        let _order_guard = self.order_locks.lock(existing.order_id).await;
        let order = self.get_order(existing.order_id).await?;
        if !order.is_active() {
            return Err(CoreError::conflict(
                "order",
                order.id,
                format!("order is {}", order.status),
            ));
        }

        let _terminal_guard = self.terminal_locks.lock(existing.terminal_id).await;
        let appointment = self.get_appointment_record(appointment_id).await?;
        let now = self.clock.now();

        let (closed, replacement) = self.scheduler.prepare_reschedule(&appointment, new_time, reason, now).await?;
        self.repos.appointments.replace_appointment(&closed, &replacement).await?;
        self.confirmations.cancel(closed.id);
        info!(
            "Appointment {} rescheduled to {} as {} ({})",
            closed.id, new_time, replacement.id, reason
        );

        self.publish(DomainEvent::AppointmentRescheduled(AppointmentRescheduledEvent {
            old_appointment_id: closed.id,
            new_appointment_id: replacement.id,
            order_id: replacement.order_id,
            old_time: closed.requested_time,
            new_time: replacement.requested_time,
            reason: reason.to_string(),
            timestamp: now,
        }))
        .await;

        self.schedule_confirmation(replacement.id);
        Ok(replacement)
    }

    pub async fn cancel_appointment(&self, appointment_id: Uuid, reason: &str) -> CoreResult<TerminalAppointment> {
        let existing = self.get_appointment_record(appointment_id).await?;
        let _guard = self.order_locks.lock(existing.order_id).await;
        let appointment = self.get_appointment_record(appointment_id).await?;
        let now = self.clock.now();

        let cancelled = self.scheduler.cancel(&appointment, reason, now)?;
        self.repos.appointments.update_appointment(&cancelled).await?;
        self.confirmations.cancel(cancelled.id);
        info!("Appointment {} cancelled ({})", cancelled.id, reason);

        self.publish(appointment_cancelled(&cancelled, appointment.status, reason, now)).await;
        Ok(cancelled)
    }

    pub async fn record_arrival(
        &self,
        appointment_id: Uuid,
        arrival_time: DateTime<Utc>,
        gate: Option<&str>,
    ) -> CoreResult<AppointmentView> {
        let existing = self.get_appointment_record(appointment_id).await?;
        let _guard = self.order_locks.lock(existing.order_id).await;
        let appointment = self.get_appointment_record(appointment_id).await?;
        let now = self.clock.now();

        let (arrived, on_time) = self.scheduler.record_arrival(&appointment, arrival_time, gate, now)?;
        self.repos.appointments.update_appointment(&arrived).await?;
        info!(
            "Arrival recorded for appointment {} at {} (on time: {})",
            arrived.id, arrival_time, on_time
        );

        self.publish(DomainEvent::AppointmentArrival(AppointmentArrivalEvent {
            appointment_id: arrived.id,
            order_id: arrived.order_id,
            arrival_time,
            gate: arrived.arrival_gate.clone(),
            on_time,
            timestamp: now,
        }))
        .await;

        Ok(self.view(arrived, now))
    }

    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        completion_time: DateTime<Utc>,
        ticket_number: Option<&str>,
    ) -> CoreResult<TerminalAppointment> {
        let existing = self.get_appointment_record(appointment_id).await?;
        let _guard = self.order_locks.lock(existing.order_id).await;
        let appointment = self.get_appointment_record(appointment_id).await?;
        let now = self.clock.now();

        let completed = self.scheduler.complete(&appointment, completion_time, ticket_number, now)?;
        self.repos.appointments.update_appointment(&completed).await?;
        self.confirmations.cancel(completed.id);
        info!("Appointment {} completed (ticket {:?})", completed.id, completed.ticket_number);

        self.publish(DomainEvent::AppointmentCompleted(AppointmentCompletedEvent {
            appointment_id: completed.id,
            order_id: completed.order_id,
            completion_time,
            ticket_number: completed.ticket_number.clone(),
            timestamp: now,
        }))
        .await;

        Ok(completed)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> CoreResult<AppointmentView> {
        let appointment = self.get_appointment_record(appointment_id).await?;
        Ok(self.view(appointment, self.clock.now()))
    }

    /// The full reschedule chain, oldest first
    pub async fn appointments_for_order(&self, order_id: Uuid) -> CoreResult<Vec<AppointmentView>> {
        self.get_order(order_id).await?;
        let now = self.clock.now();
        Ok(self
            .repos
            .appointments
            .get_appointments_by_order(order_id)
            .await?
            .into_iter()
            .map(|a| self.view(a, now))
            .collect())
    }

    // ============================================================================
    // Internals
    // ============================================================================

    async fn get_appointment_record(&self, id: Uuid) -> CoreResult<TerminalAppointment> {
        self.repos
            .appointments
            .get_appointment(id)
            .await?
            .ok_or_else(|| CoreError::not_found("appointment", id))
    }

    fn view(&self, appointment: TerminalAppointment, now: DateTime<Utc>) -> AppointmentView {
        AppointmentView {
            is_missed: appointment.is_missed(now),
            on_time: appointment.arrived_on_time(self.scheduler.rules().arrival_grace()),
            appointment,
        }
    }

    /// Caller holds the order lock. When `order` has reached a terminal
    /// status, returns its active appointment already cancelled, plus the
    /// status it had. Nothing is written here.
    async fn plan_release(
        &self,
        order: &Order,
        reason: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<Released>> {
        if !order.status.is_terminal() {
            return Ok(None);
        }
        let Some(active) = self.scheduler.active_for_order(order.id).await? else {
            return Ok(None);
        };

        let cancelled = self.scheduler.cancel(&active, reason, now)?;
        Ok(Some((active.status, cancelled)))
    }

    /// Runs once the transition and its released appointment are stored
    async fn after_transition(
        &self,
        before: &Order,
        after: &Order,
        released: Option<Released>,
        reason: &str,
        now: DateTime<Utc>,
    ) {
        if let Some((_, appointment)) = &released {
            self.confirmations.cancel(appointment.id);
            info!("Appointment {} released with order {}", appointment.id, after.id);
        }

        self.publish(status_changed(before, after, reason, now)).await;
        if after.status == OrderStatus::Cancelled {
            self.publish(DomainEvent::OrderCancelled(OrderCancelledEvent {
                order_id: after.id,
                old_status: before.status,
                reason: reason.to_string(),
                timestamp: now,
            }))
            .await;
        }
        if let Some((old_status, appointment)) = released {
            self.publish(appointment_cancelled(&appointment, old_status, reason, now)).await;
        }
    }

    fn schedule_confirmation(&self, appointment_id: Uuid) {
        let delay = Duration::from_secs(self.scheduler.rules().confirmation_delay_seconds);
        let coordinator = self.clone();
        self.confirmations.schedule(appointment_id, delay, move || async move {
            if let Err(e) = coordinator.run_confirmation(appointment_id).await {
                warn!("Terminal confirmation for appointment {} failed: {}", appointment_id, e);
            }
        });
    }

    /// Re-reads the appointment at every step; anything that is no longer
    /// active by the time the terminal answers is left alone.
    async fn run_confirmation(&self, appointment_id: Uuid) -> CoreResult<()> {
        let pending = {
            let existing = self.get_appointment_record(appointment_id).await?;
            let _guard = self.order_locks.lock(existing.order_id).await;
            let current = self.get_appointment_record(appointment_id).await?;
            match current.status {
                AppointmentStatus::Requested => {
                    let pending = self.scheduler.mark_pending(&current, self.clock.now())?;
                    self.repos.appointments.update_appointment(&pending).await?;
                    debug!("Appointment {} sent to terminal {}", pending.id, pending.terminal_id);
                    pending
                }
                AppointmentStatus::Pending => current,
                other => {
                    info!("Skipping terminal confirmation for appointment {} ({})", appointment_id, other);
                    return Ok(());
                }
            }
        };

        let confirmation_number = self
            .gateway
            .request_confirmation(&pending)
            .await
            .map_err(|e| CoreError::Repository(format!("terminal gateway: {}", e)))?;

        let _guard = self.order_locks.lock(pending.order_id).await;
        let current = self.get_appointment_record(appointment_id).await?;
        if !matches!(current.status, AppointmentStatus::Requested | AppointmentStatus::Pending) {
            info!(
                "Ignoring late terminal confirmation {} for appointment {} ({})",
                confirmation_number, appointment_id, current.status
            );
            return Ok(());
        }

        let confirmed = self.scheduler.confirm(&current, &confirmation_number, "terminal", self.clock.now())?;
        self.repos.appointments.update_appointment(&confirmed).await?;
        info!("Terminal confirmed appointment {} ({})", confirmed.id, confirmation_number);

        self.publish(appointment_confirmed(&confirmed)).await;
        Ok(())
    }

    /// Delivery is best-effort: failures are logged, never returned
    async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.events.publish(&event).await {
            warn!("Failed to publish {} for {}: {}", event.name(), event.key(), e);
        }
    }
}

fn status_changed(before: &Order, after: &Order, reason: &str, now: DateTime<Utc>) -> DomainEvent {
    DomainEvent::OrderStatusChanged(OrderStatusChangedEvent {
        order_id: after.id,
        old_status: before.status,
        new_status: after.status,
        reason: reason.to_string(),
        timestamp: now,
    })
}

fn appointment_cancelled(
    appointment: &TerminalAppointment,
    old_status: AppointmentStatus,
    reason: &str,
    now: DateTime<Utc>,
) -> DomainEvent {
    DomainEvent::AppointmentCancelled(AppointmentCancelledEvent {
        appointment_id: appointment.id,
        order_id: appointment.order_id,
        old_status,
        reason: reason.to_string(),
        timestamp: now,
    })
}

fn appointment_confirmed(appointment: &TerminalAppointment) -> DomainEvent {
    DomainEvent::AppointmentConfirmed(AppointmentConfirmedEvent {
        appointment_id: appointment.id,
        order_id: appointment.order_id,
        confirmation_number: appointment.confirmation_number.clone().unwrap_or_default(),
        confirmed_by: appointment.confirmed_by.clone().unwrap_or_default(),
        timestamp: appointment.updated_at,
    })
}
