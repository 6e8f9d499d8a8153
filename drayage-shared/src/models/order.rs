use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;

/// Order status in the dispatch lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Ready,
    Dispatched,
    InProgress,
    Delivered,
    Hold,
    Completed,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::Ready,
        OrderStatus::Dispatched,
        OrderStatus::InProgress,
        OrderStatus::Delivered,
        OrderStatus::Hold,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Failed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Ready => "READY",
            OrderStatus::Dispatched => "DISPATCHED",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Hold => "HOLD",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingStatus {
    Unbilled,
    Billed,
    Paid,
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BillingStatus::Unbilled => "UNBILLED",
            BillingStatus::Billed => "BILLED",
            BillingStatus::Paid => "PAID",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Pickup,
    Delivery,
    Return,
    DropOff,
}

/// One requested movement of one container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub shipment_id: Uuid,
    pub container_id: Uuid,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub billing_status: BillingStatus,
    pub pickup_location_id: Option<Uuid>,
    pub delivery_location_id: Option<Uuid>,
    pub return_location_id: Option<Uuid>,
    pub requested_pickup_at: Option<DateTime<Utc>>,
    pub requested_delivery_at: Option<DateTime<Utc>>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub actual_pickup_at: Option<DateTime<Utc>>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-text reason recorded with the latest status change
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Occupies its container until it reaches a terminal status
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub container_id: Uuid,
    pub order_type: OrderType,
    #[serde(default)]
    pub pickup_location_id: Option<Uuid>,
    #[serde(default)]
    pub delivery_location_id: Option<Uuid>,
    #[serde(default)]
    pub return_location_id: Option<Uuid>,
    #[serde(default)]
    pub requested_pickup_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requested_delivery_at: Option<DateTime<Utc>>,
}

impl NewOrder {
    pub fn into_order(self, order_number: String, shipment_id: Uuid, now: DateTime<Utc>) -> Order {
        Order {
            id: Uuid::new_v4(),
            order_number,
            shipment_id,
            container_id: self.container_id,
            order_type: self.order_type,
            status: OrderStatus::Pending,
            billing_status: BillingStatus::Unbilled,
            pickup_location_id: self.pickup_location_id,
            delivery_location_id: self.delivery_location_id,
            return_location_id: self.return_location_id,
            requested_pickup_at: self.requested_pickup_at,
            requested_delivery_at: self.requested_delivery_at,
            dispatched_at: None,
            actual_pickup_at: None,
            actual_delivery_at: None,
            completed_at: None,
            status_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// List filter; `None` fields match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub billing_status: Option<BillingStatus>,
    pub shipment_id: Option<Uuid>,
    pub container_id: Option<Uuid>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.billing_status.map_or(true, |b| order.billing_status == b)
            && self.shipment_id.map_or(true, |id| order.shipment_id == id)
            && self.container_id.map_or(true, |id| order.container_id == id)
    }
}
