use chrono::{DateTime, Utc};
use drayage_core::{CoreError, CoreResult};
use drayage_shared::{Order, OrderStatus};

/// Validates and applies order status transitions. The only writer of
/// `Order::status`; publishing the change is the caller's job.
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Legal targets from `from`. Terminal states have none.
    pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match from {
            Pending => &[Ready, Hold, Cancelled],
            Ready => &[Dispatched, Hold, Cancelled],
            Dispatched => &[InProgress, Cancelled],
            InProgress => &[Delivered, Failed],
            Delivered => &[Completed],
            Hold => &[Pending, Cancelled],
            Completed | Cancelled | Failed => &[],
        }
    }

    pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
        Self::allowed_transitions(from).contains(&to)
    }

    /// Returns the transitioned copy; `order` itself is never touched, so a
    /// rejected transition leaves no trace.
    pub fn apply_transition(
        order: &Order,
        to: OrderStatus,
        reason: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Order> {
        if !Self::can_transition(order.status, to) {
            return Err(CoreError::InvalidState {
                entity: "order",
                from: order.status.to_string(),
                to: to.to_string(),
                allowed: Self::allowed_transitions(order.status)
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            });
        }

        let mut next = order.clone();
        next.status = to;
        next.status_reason = Some(reason.to_string());
        next.updated_at = now;

        match to {
            OrderStatus::Dispatched => next.dispatched_at = Some(now),
            OrderStatus::InProgress => next.actual_pickup_at = Some(now),
            OrderStatus::Delivered => next.actual_delivery_at = Some(now),
            OrderStatus::Completed => next.completed_at = Some(now),
            _ => {}
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drayage_shared::{NewOrder, OrderType};
    use uuid::Uuid;

    fn order_in(status: OrderStatus) -> Order {
        let mut order = NewOrder {
            container_id: Uuid::new_v4(),
            order_type: OrderType::Delivery,
            pickup_location_id: None,
            delivery_location_id: None,
            return_location_id: None,
            requested_pickup_at: None,
            requested_delivery_at: None,
        }
        .into_order("ORD-000001".to_string(), Uuid::new_v4(), Utc::now());
        order.status = status;
        order
    }

    #[test]
    fn test_happy_path_lifecycle() {
        let now = Utc::now();
        let mut order = order_in(OrderStatus::Pending);

        for next in [
            OrderStatus::Ready,
            OrderStatus::Dispatched,
            OrderStatus::InProgress,
            OrderStatus::Delivered,
            OrderStatus::Completed,
        ] {
            order = OrderStateMachine::apply_transition(&order, next, "driver update", now).unwrap();
            assert_eq!(order.status, next);
        }

        assert_eq!(order.dispatched_at, Some(now));
        assert_eq!(order.actual_pickup_at, Some(now));
        assert_eq!(order.actual_delivery_at, Some(now));
        assert_eq!(order.completed_at, Some(now));
        assert_eq!(order.status_reason.as_deref(), Some("driver update"));
    }

    #[test]
    fn test_hold_round_trip() {
        let now = Utc::now();
        let order = order_in(OrderStatus::Ready);
        let held = OrderStateMachine::apply_transition(&order, OrderStatus::Hold, "customs exam", now).unwrap();
        let released = OrderStateMachine::apply_transition(&held, OrderStatus::Pending, "exam cleared", now).unwrap();
        assert_eq!(released.status, OrderStatus::Pending);
    }

    #[test]
    fn test_unlisted_transitions_are_rejected() {
        let now = Utc::now();
        let mut legal = 0;

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let order = order_in(from);
                match OrderStateMachine::apply_transition(&order, to, "exhaustive check", now) {
                    Ok(_) => {
                        assert!(OrderStateMachine::can_transition(from, to));
                        legal += 1;
                    }
                    Err(CoreError::InvalidState { from: f, to: t, .. }) => {
                        assert_eq!(f, from.to_string());
                        assert_eq!(t, to.to_string());
                        assert_eq!(order.status, from);
                    }
                    Err(other) => panic!("unexpected error {:?}", other),
                }
            }
        }

        assert_eq!(legal, 13);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled, OrderStatus::Failed] {
            assert!(OrderStateMachine::allowed_transitions(status).is_empty());
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn test_rejection_reports_allowed_targets() {
        let order = order_in(OrderStatus::Pending);
        let err = OrderStateMachine::apply_transition(&order, OrderStatus::Delivered, "skip ahead", Utc::now())
            .unwrap_err();
        match err {
            CoreError::InvalidState { allowed, .. } => {
                assert_eq!(allowed, vec!["READY", "HOLD", "CANCELLED"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
