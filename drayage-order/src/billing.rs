use chrono::{DateTime, Utc};
use drayage_core::{CoreError, CoreResult};
use drayage_shared::{BillingStatus, Order, OrderStatus};

/// UNBILLED -> BILLED -> PAID. Only completed orders are invoiced.
pub fn apply_billing(order: &Order, to: BillingStatus, now: DateTime<Utc>) -> CoreResult<Order> {
    let legal = match (order.billing_status, to) {
        (BillingStatus::Unbilled, BillingStatus::Billed) => order.status == OrderStatus::Completed,
        (BillingStatus::Billed, BillingStatus::Paid) => true,
        _ => false,
    };

    if !legal {
        let allowed = match order.billing_status {
            BillingStatus::Unbilled if order.status == OrderStatus::Completed => vec![BillingStatus::Billed.to_string()],
            BillingStatus::Billed => vec![BillingStatus::Paid.to_string()],
            _ => Vec::new(),
        };
        return Err(CoreError::InvalidState {
            entity: "billing",
            from: order.billing_status.to_string(),
            to: to.to_string(),
            allowed,
        });
    }

    let mut next = order.clone();
    next.billing_status = to;
    next.updated_at = now;
    Ok(next)
}
