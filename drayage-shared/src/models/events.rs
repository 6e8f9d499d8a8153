use uuid::Uuid;
use chrono::{DateTime, Utc};

use super::appointment::AppointmentStatus;
use super::container::{CustomsStatus, LocationType, PhysicalState};
use super::order::OrderStatus;
use super::shipment::ShipmentStatus;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ShipmentCreatedEvent {
    pub shipment_id: Uuid,
    pub reference_number: String,
    pub container_ids: Vec<Uuid>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ShipmentStatusChangedEvent {
    pub shipment_id: Uuid,
    pub old_status: ShipmentStatus,
    pub new_status: ShipmentStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ContainerUpdatedEvent {
    pub container_id: Uuid,
    pub shipment_id: Uuid,
    pub customs_status: CustomsStatus,
    pub physical_state: PhysicalState,
    pub location_type: LocationType,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCreatedEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub shipment_id: Uuid,
    pub container_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderStatusChangedEvent {
    pub order_id: Uuid,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCancelledEvent {
    pub order_id: Uuid,
    pub old_status: OrderStatus,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AppointmentRequestedEvent {
    pub appointment_id: Uuid,
    pub order_id: Uuid,
    pub terminal_id: Uuid,
    pub requested_time: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AppointmentConfirmedEvent {
    pub appointment_id: Uuid,
    pub order_id: Uuid,
    pub confirmation_number: String,
    pub confirmed_by: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AppointmentCancelledEvent {
    pub appointment_id: Uuid,
    pub order_id: Uuid,
    pub old_status: AppointmentStatus,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AppointmentRescheduledEvent {
    pub old_appointment_id: Uuid,
    pub new_appointment_id: Uuid,
    pub order_id: Uuid,
    pub old_time: DateTime<Utc>,
    pub new_time: DateTime<Utc>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AppointmentArrivalEvent {
    pub appointment_id: Uuid,
    pub order_id: Uuid,
    pub arrival_time: DateTime<Utc>,
    pub gate: Option<String>,
    pub on_time: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AppointmentCompletedEvent {
    pub appointment_id: Uuid,
    pub order_id: Uuid,
    pub completion_time: DateTime<Utc>,
    pub ticket_number: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Everything the lifecycle coordinator publishes. Serialized with the
/// bus name as the tag so consumers can route on `event`.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "event", content = "payload")]
pub enum DomainEvent {
    #[serde(rename = "shipment.created")]
    ShipmentCreated(ShipmentCreatedEvent),
    #[serde(rename = "shipment.status_changed")]
    ShipmentStatusChanged(ShipmentStatusChangedEvent),
    #[serde(rename = "container.updated")]
    ContainerUpdated(ContainerUpdatedEvent),
    #[serde(rename = "order.created")]
    OrderCreated(OrderCreatedEvent),
    #[serde(rename = "order.status_changed")]
    OrderStatusChanged(OrderStatusChangedEvent),
    #[serde(rename = "order.cancelled")]
    OrderCancelled(OrderCancelledEvent),
    #[serde(rename = "appointment.requested")]
    AppointmentRequested(AppointmentRequestedEvent),
    #[serde(rename = "appointment.confirmed")]
    AppointmentConfirmed(AppointmentConfirmedEvent),
    #[serde(rename = "appointment.cancelled")]
    AppointmentCancelled(AppointmentCancelledEvent),
    #[serde(rename = "appointment.rescheduled")]
    AppointmentRescheduled(AppointmentRescheduledEvent),
    #[serde(rename = "appointment.arrival")]
    AppointmentArrival(AppointmentArrivalEvent),
    #[serde(rename = "appointment.completed")]
    AppointmentCompleted(AppointmentCompletedEvent),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::ShipmentCreated(_) => "shipment.created",
            DomainEvent::ShipmentStatusChanged(_) => "shipment.status_changed",
            DomainEvent::ContainerUpdated(_) => "container.updated",
            DomainEvent::OrderCreated(_) => "order.created",
            DomainEvent::OrderStatusChanged(_) => "order.status_changed",
            DomainEvent::OrderCancelled(_) => "order.cancelled",
            DomainEvent::AppointmentRequested(_) => "appointment.requested",
            DomainEvent::AppointmentConfirmed(_) => "appointment.confirmed",
            DomainEvent::AppointmentCancelled(_) => "appointment.cancelled",
            DomainEvent::AppointmentRescheduled(_) => "appointment.rescheduled",
            DomainEvent::AppointmentArrival(_) => "appointment.arrival",
            DomainEvent::AppointmentCompleted(_) => "appointment.completed",
        }
    }

    /// Partition key: the shipment for shipment and container events, the
    /// order otherwise
    pub fn key(&self) -> Uuid {
        match self {
            DomainEvent::ShipmentCreated(e) => e.shipment_id,
            DomainEvent::ShipmentStatusChanged(e) => e.shipment_id,
            DomainEvent::ContainerUpdated(e) => e.shipment_id,
            DomainEvent::OrderCreated(e) => e.order_id,
            DomainEvent::OrderStatusChanged(e) => e.order_id,
            DomainEvent::OrderCancelled(e) => e.order_id,
            DomainEvent::AppointmentRequested(e) => e.order_id,
            DomainEvent::AppointmentConfirmed(e) => e.order_id,
            DomainEvent::AppointmentCancelled(e) => e.order_id,
            DomainEvent::AppointmentRescheduled(e) => e.order_id,
            DomainEvent::AppointmentArrival(e) => e.order_id,
            DomainEvent::AppointmentCompleted(e) => e.order_id,
        }
    }
}
