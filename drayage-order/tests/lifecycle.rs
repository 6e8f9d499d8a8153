use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use drayage_core::clock::FixedClock;
use drayage_core::events::EventPublisher;
use drayage_core::repository::{
    AppointmentRepository, ContainerRepository, OrderRepository, RepoError, ShipmentRepository,
};
use drayage_core::{CoreError, ErrorKind};
use drayage_order::{AppointmentRequest, Collaborators, LifecycleCoordinator, Repositories};
use drayage_rates::{ChargeTier, DemurrageRates, PerDiemRates, RateSchedule, SchedulingRules};
use drayage_shared::{
    AppointmentStatus, AppointmentType, BillingStatus, ContainerNumber, ContainerSize, ContainerType,
    ContainerUpdate, CustomsStatus, DomainEvent, LocationType, NewContainer, NewOrder, NewShipment, Order,
    OrderFilter, OrderStatus, OrderType, PhysicalState, Shipment, ShipmentStatus, ShipmentType,
    TerminalAppointment,
};
use drayage_store::MemoryStore;

/// Records every event; optionally fails each publish after recording it
#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
    fail: bool,
}

impl RecordingPublisher {
    fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(
        &self,
        event: &DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            return Err("broker unavailable".into());
        }
        Ok(())
    }
}

struct Harness {
    coordinator: LifecycleCoordinator,
    store: MemoryStore,
    clock: Arc<FixedClock>,
    events: Arc<RecordingPublisher>,
    terminal_id: Uuid,
}

fn tier(from_day: u32, to_day: Option<u32>, rate: rust_decimal::Decimal) -> ChargeTier {
    ChargeTier {
        from_day,
        to_day,
        rate_per_day: rate,
    }
}

fn rates() -> RateSchedule {
    let mut per_diem = HashMap::new();
    per_diem.insert(ContainerSize::Ft40, vec![tier(1, Some(5), dec!(85)), tier(6, None, dec!(125))]);
    let mut demurrage = HashMap::new();
    demurrage.insert(
        ContainerSize::Ft40,
        vec![tier(1, Some(5), dec!(100)), tier(6, Some(10), dec!(200)), tier(11, Some(20), dec!(400))],
    );
    RateSchedule {
        currency: "USD".to_string(),
        per_diem: PerDiemRates {
            free_days: 4,
            tiers: per_diem,
        },
        demurrage: DemurrageRates { tiers: demurrage },
    }
}

/// Monday 2026-03-02 07:00 UTC
fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap()
}

/// Appointment store whose per-order reads fail for chosen orders
struct UnreadableHistory {
    inner: MemoryStore,
    broken: Mutex<HashSet<Uuid>>,
}

impl UnreadableHistory {
    fn break_order(&self, order_id: Uuid) {
        self.broken.lock().unwrap().insert(order_id);
    }
}

#[async_trait]
impl AppointmentRepository for UnreadableHistory {
    async fn create_appointment(&self, appointment: &TerminalAppointment) -> Result<(), RepoError> {
        self.inner.create_appointment(appointment).await
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<TerminalAppointment>, RepoError> {
        self.inner.get_appointment(id).await
    }

    async fn update_appointment(&self, appointment: &TerminalAppointment) -> Result<(), RepoError> {
        self.inner.update_appointment(appointment).await
    }

    async fn replace_appointment(
        &self,
        previous: &TerminalAppointment,
        replacement: &TerminalAppointment,
    ) -> Result<(), RepoError> {
        self.inner.replace_appointment(previous, replacement).await
    }

    async fn get_appointments_by_order(&self, order_id: Uuid) -> Result<Vec<TerminalAppointment>, RepoError> {
        if self.broken.lock().unwrap().contains(&order_id) {
            return Err("appointment index unavailable".into());
        }
        self.inner.get_appointments_by_order(order_id).await
    }

    async fn get_appointments_by_terminal(
        &self,
        terminal_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TerminalAppointment>, RepoError> {
        self.inner.get_appointments_by_terminal(terminal_id, start, end).await
    }
}

fn build(
    events: RecordingPublisher,
    rules: SchedulingRules,
    appointments: impl FnOnce(&MemoryStore) -> Arc<dyn AppointmentRepository>,
) -> Harness {
    let store = MemoryStore::new();
    let clock = Arc::new(FixedClock::new(monday_morning()));
    let events = Arc::new(events);

    let repos = Repositories {
        shipments: Arc::new(store.clone()),
        containers: Arc::new(store.clone()),
        orders: Arc::new(store.clone()),
        appointments: appointments(&store),
    };
    let collaborators = Collaborators::from_rules(&rules, events.clone()).with_clock(clock.clone());
    let coordinator = LifecycleCoordinator::new(repos, collaborators, Arc::new(rates()), Arc::new(rules));

    Harness {
        coordinator,
        store,
        clock,
        events,
        terminal_id: Uuid::new_v4(),
    }
}

fn harness_with(events: RecordingPublisher, rules: SchedulingRules) -> Harness {
    build(events, rules, |store| Arc::new(store.clone()))
}

fn harness_with_unreadable_history() -> (Harness, Arc<UnreadableHistory>) {
    let mut history = None;
    let h = build(RecordingPublisher::default(), SchedulingRules::default(), |store| {
        let repo = Arc::new(UnreadableHistory {
            inner: store.clone(),
            broken: Mutex::new(HashSet::new()),
        });
        history = Some(repo.clone());
        repo
    });
    (h, history.unwrap())
}

fn harness() -> Harness {
    harness_with(RecordingPublisher::default(), SchedulingRules::default())
}

fn import_shipment(terminal_id: Uuid, numbers: &[&str]) -> NewShipment {
    NewShipment {
        shipment_type: ShipmentType::Import,
        reference_number: "MAEU-240118".to_string(),
        customer_id: Uuid::new_v4(),
        terminal_id,
        steamship_line_id: Some(Uuid::new_v4()),
        vessel_name: Some("MSC AURORA".to_string()),
        voyage_number: Some("FA412W".to_string()),
        vessel_eta: None,
        last_free_day: Some(Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap()),
        port_cutoff: None,
        doc_cutoff: None,
        containers: numbers.iter().map(|n| container(n)).collect(),
    }
}

fn container(number: &str) -> NewContainer {
    NewContainer {
        number: ContainerNumber::parse(number).unwrap(),
        size: ContainerSize::Ft40,
        container_type: ContainerType::Dry,
        weight_lbs: Some(42_000),
        is_hazmat: false,
        is_overweight: false,
    }
}

fn pickup(container_id: Uuid) -> NewOrder {
    NewOrder {
        container_id,
        order_type: OrderType::Pickup,
        pickup_location_id: None,
        delivery_location_id: None,
        return_location_id: None,
        requested_pickup_at: None,
        requested_delivery_at: None,
    }
}

impl Harness {
    async fn shipment_and_order(&self) -> (Shipment, Order) {
        let (shipment, containers) = self
            .coordinator
            .create_shipment(import_shipment(self.terminal_id, &["CSQU3054383"]))
            .await
            .unwrap();
        let order = self
            .coordinator
            .create_order(shipment.id, pickup(containers[0].id))
            .await
            .unwrap();
        (shipment, order)
    }

    fn request(&self, order_id: Uuid, at: DateTime<Utc>) -> AppointmentRequest {
        AppointmentRequest {
            order_id,
            terminal_id: self.terminal_id,
            appointment_type: AppointmentType::Pickup,
            requested_time: at,
            special_instructions: Some("Bring chassis".to_string()),
        }
    }

    async fn active_count(&self, order_id: Uuid) -> usize {
        self.store
            .get_appointments_by_order(order_id)
            .await
            .unwrap()
            .iter()
            .filter(|a| a.is_active())
            .count()
    }
}

#[tokio::test]
async fn test_shipment_with_containers_is_created_together() {
    let h = harness();
    let (shipment, containers) = h
        .coordinator
        .create_shipment(import_shipment(h.terminal_id, &["CSQU3054383", "MSKU9070323"]))
        .await
        .unwrap();

    assert_eq!(containers.len(), 2);
    assert_eq!(h.coordinator.containers_for_shipment(shipment.id).await.unwrap().len(), 2);
    assert_eq!(h.events.names(), vec!["shipment.created"]);
}

#[tokio::test]
async fn test_import_without_lfd_is_rejected_before_any_write() {
    let h = harness();
    let mut request = import_shipment(h.terminal_id, &["CSQU3054383"]);
    request.last_free_day = None;

    let err = h.coordinator.create_shipment(request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.events.names().is_empty());
}

#[tokio::test]
async fn test_duplicate_container_on_shipment_conflicts() {
    let h = harness();
    let (shipment, _) = h
        .coordinator
        .create_shipment(import_shipment(h.terminal_id, &["CSQU3054383"]))
        .await
        .unwrap();

    let added = h.coordinator.add_container(shipment.id, container("TGHU1234567")).await.unwrap();
    assert_eq!(added.shipment_id, shipment.id);

    let err = h.coordinator.add_container(shipment.id, container("CSQU3054383")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_one_active_order_per_container() {
    let h = harness();
    let (shipment, order) = h.shipment_and_order().await;
    assert_eq!(order.order_number, "ORD-000001");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.billing_status, BillingStatus::Unbilled);

    let err = h
        .coordinator
        .create_order(shipment.id, pickup(order.container_id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // A cancelled order frees the container
    h.coordinator.cancel_order(order.id, "booking withdrawn").await.unwrap();
    let next = h.coordinator.create_order(shipment.id, pickup(order.container_id)).await.unwrap();
    assert_eq!(next.order_number, "ORD-000002");
}

#[tokio::test]
async fn test_full_lifecycle_stamps_actual_dates() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;

    for to in [OrderStatus::Ready, OrderStatus::Dispatched, OrderStatus::InProgress, OrderStatus::Delivered] {
        h.clock.advance(Duration::hours(1));
        h.coordinator.transition_order(order.id, to, "dispatch board").await.unwrap();
    }
    let delivered = h.coordinator.get_order(order.id).await.unwrap();
    assert!(delivered.dispatched_at.is_some());
    assert!(delivered.actual_pickup_at.is_some());
    assert!(delivered.actual_delivery_at.is_some());

    // Billing waits for completion
    assert_eq!(h.coordinator.mark_billed(order.id).await.unwrap_err().kind(), ErrorKind::InvalidState);

    let completed = h
        .coordinator
        .transition_order(order.id, OrderStatus::Completed, "POD received")
        .await
        .unwrap();
    assert!(completed.completed_at.is_some());

    let billed = h.coordinator.mark_billed(order.id).await.unwrap();
    assert_eq!(billed.billing_status, BillingStatus::Billed);
    let paid = h.coordinator.mark_paid(order.id).await.unwrap();
    assert_eq!(paid.billing_status, BillingStatus::Paid);

    let changes = h
        .events
        .names()
        .into_iter()
        .filter(|n| *n == "order.status_changed")
        .count();
    assert_eq!(changes, 5);
}

#[tokio::test]
async fn test_illegal_transition_leaves_order_untouched() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;

    let err = h
        .coordinator
        .transition_order(order.id, OrderStatus::Delivered, "skip ahead")
        .await
        .unwrap_err();
    match err {
        CoreError::InvalidState { from, to, allowed, .. } => {
            assert_eq!(from, "PENDING");
            assert_eq!(to, "DELIVERED");
            assert_eq!(allowed, vec!["READY", "HOLD", "CANCELLED"]);
        }
        other => panic!("unexpected error {:?}", other),
    }

    let stored = h.coordinator.get_order(order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.updated_at, order.updated_at);
}

#[tokio::test]
async fn test_bulk_update_skips_invalid_orders() {
    let h = harness();
    let (shipment, first) = h.shipment_and_order().await;
    let second_container = h.coordinator.add_container(shipment.id, container("MSKU9070323")).await.unwrap();
    let second = h.coordinator.create_order(shipment.id, pickup(second_container.id)).await.unwrap();
    h.coordinator.transition_order(second.id, OrderStatus::Hold, "customs exam").await.unwrap();
    let unknown = Uuid::new_v4();

    let report = h
        .coordinator
        .bulk_update_status(&[first.id, second.id, unknown], OrderStatus::Ready, "vessel discharged")
        .await
        .unwrap();

    assert_eq!(report.updated, vec![first.id]);
    assert_eq!(report.skipped.len(), 2);
    assert!(report.skipped.iter().any(|s| s.order_id == second.id));
    assert!(report.skipped.iter().any(|s| s.order_id == unknown));

    assert_eq!(h.coordinator.get_order(first.id).await.unwrap().status, OrderStatus::Ready);
    assert_eq!(h.coordinator.get_order(second.id).await.unwrap().status, OrderStatus::Hold);

    let ready = h
        .coordinator
        .list_orders(&OrderFilter {
            status: Some(OrderStatus::Ready),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(ready.len(), 1);
}

#[tokio::test]
async fn test_demurrage_example_totals_2300() {
    let h = harness();
    let (shipment, order) = h.shipment_and_order().await;
    assert_eq!(shipment.last_free_day, Some(Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap()));

    h.clock.set(Utc.with_ymd_and_hms(2026, 1, 22, 0, 0, 0).unwrap());
    let summary = h.coordinator.charges_for_order(order.id).await.unwrap();

    assert_eq!(summary.demurrage.days, 12);
    assert_eq!(summary.demurrage.amount, dec!(2300));
    let amounts: Vec<_> = summary.demurrage.breakdown.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![dec!(500), dec!(1000), dec!(800)]);

    // 12 days past LFD less 4 free days: 5 at 85, 3 at 125
    assert_eq!(summary.per_diem.days, 8);
    assert_eq!(summary.per_diem.amount, dec!(800));
    assert_eq!(summary.total, dec!(3100));
}

#[tokio::test]
async fn test_moving_lfd_changes_charges() {
    let h = harness();
    let (shipment, order) = h.shipment_and_order().await;
    h.clock.set(Utc.with_ymd_and_hms(2026, 1, 22, 0, 0, 0).unwrap());

    h.coordinator
        .update_last_free_day(shipment.id, Utc.with_ymd_and_hms(2026, 1, 25, 0, 0, 0).unwrap())
        .await
        .unwrap();
    let summary = h.coordinator.charges_for_order(order.id).await.unwrap();
    assert_eq!(summary.total, dec!(0));
}

#[tokio::test]
async fn test_sunday_request_is_rejected_without_a_row() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;
    let sunday = Utc.with_ymd_and_hms(2026, 3, 8, 9, 0, 0).unwrap();

    let err = h.coordinator.request_appointment(h.request(order.id, sunday)).await.unwrap_err();
    assert!(matches!(err, CoreError::TerminalClosed { .. }));
    assert!(h.store.get_appointments_by_order(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_short_lead_time_is_rejected_without_a_row() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;

    let err = h
        .coordinator
        .request_appointment(h.request(order.id, monday_morning() + Duration::minutes(30)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.store.get_appointments_by_order(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_request_reschedule_cancel_keeps_one_active() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;
    let at = monday_morning() + Duration::hours(3);

    let first = h.coordinator.request_appointment(h.request(order.id, at)).await.unwrap();
    assert_eq!(first.status, AppointmentStatus::Requested);
    assert_eq!(h.active_count(order.id).await, 1);

    let dup = h
        .coordinator
        .request_appointment(h.request(order.id, at + Duration::hours(2)))
        .await
        .unwrap_err();
    assert_eq!(dup.kind(), ErrorKind::Conflict);
    assert_eq!(h.active_count(order.id).await, 1);

    let second = h
        .coordinator
        .reschedule_appointment(first.id, at + Duration::hours(4), "driver hours")
        .await
        .unwrap();
    assert_eq!(second.rescheduled_from, Some(first.id));
    assert_eq!(h.active_count(order.id).await, 1);

    let old = h.coordinator.get_appointment(first.id).await.unwrap();
    assert_eq!(old.appointment.status, AppointmentStatus::Rescheduled);
    let linked: Vec<_> = h
        .store
        .get_appointments_by_order(order.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.rescheduled_from == Some(first.id))
        .collect();
    assert_eq!(linked.len(), 1);

    h.coordinator.cancel_appointment(second.id, "customer closed").await.unwrap();
    assert_eq!(h.active_count(order.id).await, 0);

    let chain = h.coordinator.appointments_for_order(order.id).await.unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].appointment.id, first.id);
}

#[tokio::test]
async fn test_cancel_order_releases_appointment() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;
    let appt = h
        .coordinator
        .request_appointment(h.request(order.id, monday_morning() + Duration::hours(3)))
        .await
        .unwrap();

    h.coordinator.cancel_order(order.id, "freight on hold").await.unwrap();

    let stored = h.coordinator.get_appointment(appt.id).await.unwrap();
    assert_eq!(stored.appointment.status, AppointmentStatus::Cancelled);
    assert_eq!(h.coordinator.pending_confirmations(), 0);

    let names = h.events.names();
    assert!(names.contains(&"order.cancelled"));
    assert!(names.contains(&"appointment.cancelled"));

    // A cancelled order cannot book the terminal
    let err = h
        .coordinator
        .request_appointment(h.request(order.id, monday_morning() + Duration::hours(5)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_arrival_and_completion() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;
    let at = monday_morning() + Duration::hours(3);
    let appt = h.coordinator.request_appointment(h.request(order.id, at)).await.unwrap();
    h.coordinator.confirm_appointment(appt.id, "GATE-5531", "dispatcher").await.unwrap();

    let early = h.coordinator.complete_appointment(appt.id, at, Some("T-99")).await.unwrap_err();
    assert_eq!(early.kind(), ErrorKind::InvalidState);

    let arrived = h
        .coordinator
        .record_arrival(appt.id, at + Duration::minutes(20), Some("Gate 3"))
        .await
        .unwrap();
    assert_eq!(arrived.on_time, Some(true));

    let done = h
        .coordinator
        .complete_appointment(appt.id, at + Duration::minutes(55), Some("T-99"))
        .await
        .unwrap();
    assert_eq!(done.status, AppointmentStatus::Completed);

    let names = h.events.names();
    assert!(names.contains(&"appointment.arrival"));
    assert!(names.contains(&"appointment.completed"));
}

#[tokio::test]
async fn test_missed_is_derived_by_readers() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;
    let at = monday_morning() + Duration::hours(3);
    let appt = h.coordinator.request_appointment(h.request(order.id, at)).await.unwrap();
    h.coordinator.confirm_appointment(appt.id, "GATE-1", "dispatcher").await.unwrap();

    assert!(!h.coordinator.get_appointment(appt.id).await.unwrap().is_missed);
    h.clock.set(at + Duration::hours(3));
    let view = h.coordinator.get_appointment(appt.id).await.unwrap();
    assert!(view.is_missed);
    assert_eq!(view.appointment.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn test_publish_failure_does_not_roll_back() {
    let h = harness_with(RecordingPublisher::failing(), SchedulingRules::default());
    let (_, order) = h.shipment_and_order().await;

    let ready = h
        .coordinator
        .transition_order(order.id, OrderStatus::Ready, "released")
        .await
        .unwrap();
    assert_eq!(ready.status, OrderStatus::Ready);
    assert_eq!(h.store.get_order(order.id).await.unwrap().unwrap().status, OrderStatus::Ready);
    assert!(h.events.names().contains(&"order.status_changed"));
}

#[tokio::test]
async fn test_slot_capacity_is_shared_across_orders() {
    let rules = SchedulingRules {
        default_slot_capacity: 1,
        ..SchedulingRules::default()
    };
    let h = harness_with(RecordingPublisher::default(), rules);
    let (shipment, first) = h.shipment_and_order().await;
    let other = h.coordinator.add_container(shipment.id, container("OOLU0000008")).await.unwrap();
    let second = h.coordinator.create_order(shipment.id, pickup(other.id)).await.unwrap();
    let at = monday_morning() + Duration::hours(3);

    h.coordinator.request_appointment(h.request(first.id, at)).await.unwrap();
    let err = h
        .coordinator
        .request_appointment(h.request(second.id, at + Duration::minutes(60)))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::SlotUnavailable { capacity: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_terminal_confirms_after_delay() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;
    let appt = h
        .coordinator
        .request_appointment(h.request(order.id, monday_morning() + Duration::hours(3)))
        .await
        .unwrap();
    assert_eq!(h.coordinator.pending_confirmations(), 1);

    tokio::time::sleep(std::time::Duration::from_secs(6)).await;

    let view = h.coordinator.get_appointment(appt.id).await.unwrap();
    assert_eq!(view.appointment.status, AppointmentStatus::Confirmed);
    let expected = format!("CNF-{}", &appt.id.simple().to_string()[..8].to_uppercase());
    assert_eq!(view.appointment.confirmation_number.as_deref(), Some(expected.as_str()));
    assert_eq!(view.appointment.confirmed_by.as_deref(), Some("terminal"));
    assert!(h.events.names().contains(&"appointment.confirmed"));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_appointment_is_never_confirmed() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;
    let appt = h
        .coordinator
        .request_appointment(h.request(order.id, monday_morning() + Duration::hours(3)))
        .await
        .unwrap();

    h.coordinator.cancel_appointment(appt.id, "truck broke down").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;

    let view = h.coordinator.get_appointment(appt.id).await.unwrap();
    assert_eq!(view.appointment.status, AppointmentStatus::Cancelled);
    assert!(view.appointment.confirmation_number.is_none());
    assert!(!h.events.names().contains(&"appointment.confirmed"));
}

#[tokio::test]
async fn test_concurrent_requests_leave_one_active() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;
    let at = monday_morning() + Duration::hours(3);

    let mut handles = Vec::new();
    for i in 0..8 {
        let coordinator = h.coordinator.clone();
        let request = h.request(order.id, at + Duration::minutes(10 * i));
        handles.push(tokio::spawn(async move { coordinator.request_appointment(request).await }));
    }

    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(h.active_count(order.id).await, 1);
}

#[tokio::test]
async fn test_unknown_shipment_is_not_found() {
    let h = harness();
    let err = h.coordinator.get_shipment(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(h.store.get_shipment(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_reschedule_chain_is_oldest_first_under_a_fixed_clock() {
    // Every record in the chain shares the clock's instant
    for _ in 0..16 {
        let h = harness();
        let (_, order) = h.shipment_and_order().await;
        let at = monday_morning() + Duration::hours(3);

        let first = h.coordinator.request_appointment(h.request(order.id, at)).await.unwrap();
        let second = h
            .coordinator
            .reschedule_appointment(first.id, at + Duration::hours(1), "late vessel")
            .await
            .unwrap();
        let third = h
            .coordinator
            .reschedule_appointment(second.id, at + Duration::hours(2), "late vessel")
            .await
            .unwrap();

        let chain: Vec<Uuid> = h
            .coordinator
            .appointments_for_order(order.id)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.appointment.id)
            .collect();
        assert_eq!(chain, vec![first.id, second.id, third.id]);
    }
}

#[tokio::test]
async fn test_cancel_order_writes_nothing_when_appointment_cannot_be_released() {
    let (h, history) = harness_with_unreadable_history();
    let (_, order) = h.shipment_and_order().await;
    h.coordinator
        .request_appointment(h.request(order.id, monday_morning() + Duration::hours(3)))
        .await
        .unwrap();
    history.break_order(order.id);

    assert!(h.coordinator.cancel_order(order.id, "booking withdrawn").await.is_err());

    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(h.active_count(order.id).await, 1);
    assert!(!h.events.names().contains(&"order.cancelled"));
}

#[tokio::test]
async fn test_bulk_cancel_skips_orders_whose_release_fails() {
    let (h, history) = harness_with_unreadable_history();
    let (shipment, first) = h.shipment_and_order().await;
    let other = h.coordinator.add_container(shipment.id, container("MSKU9070323")).await.unwrap();
    let second = h.coordinator.create_order(shipment.id, pickup(other.id)).await.unwrap();
    let at = monday_morning() + Duration::hours(3);
    h.coordinator.request_appointment(h.request(first.id, at)).await.unwrap();
    h.coordinator.request_appointment(h.request(second.id, at)).await.unwrap();
    history.break_order(second.id);

    let report = h
        .coordinator
        .bulk_update_status(&[first.id, second.id], OrderStatus::Cancelled, "vessel rolled")
        .await
        .unwrap();

    assert_eq!(report.updated, vec![first.id]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].order_id, second.id);

    assert_eq!(h.store.get_order(first.id).await.unwrap().unwrap().status, OrderStatus::Cancelled);
    assert_eq!(h.active_count(first.id).await, 0);
    assert_eq!(h.store.get_order(second.id).await.unwrap().unwrap().status, OrderStatus::Pending);
    assert_eq!(h.active_count(second.id).await, 1);

    let names = h.events.names();
    assert_eq!(names.iter().filter(|n| **n == "order.cancelled").count(), 1);
    assert_eq!(names.iter().filter(|n| **n == "appointment.cancelled").count(), 1);
}

#[tokio::test]
async fn test_failed_order_releases_appointment_and_cannot_reschedule() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;
    let at = monday_morning() + Duration::hours(3);
    let appt = h.coordinator.request_appointment(h.request(order.id, at)).await.unwrap();

    for to in [OrderStatus::Ready, OrderStatus::Dispatched, OrderStatus::InProgress, OrderStatus::Failed] {
        h.coordinator.transition_order(order.id, to, "tractor breakdown").await.unwrap();
    }

    assert_eq!(h.active_count(order.id).await, 0);
    assert_eq!(h.coordinator.pending_confirmations(), 0);
    let released = h.coordinator.get_appointment(appt.id).await.unwrap();
    assert_eq!(released.appointment.status, AppointmentStatus::Cancelled);
    assert!(h.events.names().contains(&"appointment.cancelled"));
    assert!(!h.events.names().contains(&"order.cancelled"));

    let err = h
        .coordinator
        .reschedule_appointment(appt.id, at + Duration::hours(2), "retry")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.active_count(order.id).await, 0);
}

#[tokio::test]
async fn test_container_facts_are_recorded() {
    let h = harness();
    let (_, order) = h.shipment_and_order().await;

    let updated = h
        .coordinator
        .update_container(
            order.container_id,
            ContainerUpdate {
                customs_status: Some(CustomsStatus::Released),
                location_type: Some(LocationType::InTransit),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.customs_status, CustomsStatus::Released);
    assert_eq!(updated.physical_state, PhysicalState::Loaded);

    let stored = h.store.get_container(order.container_id).await.unwrap().unwrap();
    assert_eq!(stored.location_type, LocationType::InTransit);
    assert!(h.events.names().contains(&"container.updated"));

    let err = h
        .coordinator
        .update_container(order.container_id, ContainerUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_shipment_status_follows_its_lifecycle() {
    let h = harness();
    let (shipment, _) = h.shipment_and_order().await;
    assert_eq!(shipment.status, ShipmentStatus::Booked);

    let err = h
        .coordinator
        .update_shipment_status(shipment.id, ShipmentStatus::Completed)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let active = h.coordinator.update_shipment_status(shipment.id, ShipmentStatus::Active).await.unwrap();
    assert_eq!(active.status, ShipmentStatus::Active);
    let done = h.coordinator.update_shipment_status(shipment.id, ShipmentStatus::Completed).await.unwrap();
    assert_eq!(done.status, ShipmentStatus::Completed);
    assert!(h.events.names().contains(&"shipment.status_changed"));
}
