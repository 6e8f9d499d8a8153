use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use drayage_core::repository::{
    AppointmentRepository, ContainerRepository, OrderRepository, RepoError, ShipmentRepository,
};
use drayage_shared::{Container, Order, OrderFilter, Shipment, TerminalAppointment};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} already exists")]
    Duplicate { entity: &'static str, id: String },
    #[error("{entity} {id} does not exist")]
    Missing { entity: &'static str, id: String },
}

#[derive(Default)]
struct Tables {
    shipments: HashMap<Uuid, Shipment>,
    containers: HashMap<Uuid, Container>,
    orders: HashMap<Uuid, Order>,
    appointments: HashMap<Uuid, TerminalAppointment>,
    /// Insertion rank per appointment; breaks `created_at` ties
    appointment_rank: HashMap<Uuid, u64>,
    order_sequence: u64,
    appointment_sequence: u64,
}

impl Tables {
    fn insert_appointment(&mut self, appointment: &TerminalAppointment) {
        self.appointment_sequence += 1;
        self.appointment_rank.insert(appointment.id, self.appointment_sequence);
        self.appointments.insert(appointment.id, appointment.clone());
    }

    fn rank(&self, id: &Uuid) -> u64 {
        self.appointment_rank.get(id).copied().unwrap_or(u64::MAX)
    }
}

/// In-memory implementation of every repository contract. All tables sit
/// behind one lock, so multi-record writes are all-or-nothing: every
/// precondition is checked before the first row is touched.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(entity: &'static str, id: Uuid) -> RepoError {
    Box::new(StoreError::Missing {
        entity,
        id: id.to_string(),
    })
}

fn duplicate(entity: &'static str, id: impl ToString) -> RepoError {
    Box::new(StoreError::Duplicate {
        entity,
        id: id.to_string(),
    })
}

#[async_trait]
impl ShipmentRepository for MemoryStore {
    async fn create_shipment(
        &self,
        shipment: &Shipment,
        containers: &[Container],
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if tables.shipments.contains_key(&shipment.id) {
            return Err(duplicate("shipment", shipment.id));
        }
        if let Some(c) = containers.iter().find(|c| tables.containers.contains_key(&c.id)) {
            return Err(duplicate("container", c.id));
        }

        tables.shipments.insert(shipment.id, shipment.clone());
        for container in containers {
            tables.containers.insert(container.id, container.clone());
        }
        Ok(())
    }

    async fn get_shipment(
        &self,
        id: Uuid,
    ) -> Result<Option<Shipment>, RepoError> {
        Ok(self.tables.read().await.shipments.get(&id).cloned())
    }

    async fn update_shipment(
        &self,
        shipment: &Shipment,
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        match tables.shipments.get_mut(&shipment.id) {
            Some(row) => {
                *row = shipment.clone();
                Ok(())
            }
            None => Err(missing("shipment", shipment.id)),
        }
    }
}

#[async_trait]
impl ContainerRepository for MemoryStore {
    async fn create_container(
        &self,
        container: &Container,
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.shipments.contains_key(&container.shipment_id) {
            return Err(missing("shipment", container.shipment_id));
        }
        if tables.containers.contains_key(&container.id) {
            return Err(duplicate("container", container.id));
        }
        tables.containers.insert(container.id, container.clone());
        Ok(())
    }

    async fn get_container(
        &self,
        id: Uuid,
    ) -> Result<Option<Container>, RepoError> {
        Ok(self.tables.read().await.containers.get(&id).cloned())
    }

    async fn get_containers_by_shipment(
        &self,
        shipment_id: Uuid,
    ) -> Result<Vec<Container>, RepoError> {
        let tables = self.tables.read().await;
        let mut containers: Vec<Container> = tables
            .containers
            .values()
            .filter(|c| c.shipment_id == shipment_id)
            .cloned()
            .collect();
        containers.sort_by_key(|c| c.created_at);
        Ok(containers)
    }

    async fn update_container(
        &self,
        container: &Container,
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        match tables.containers.get_mut(&container.id) {
            Some(row) => {
                *row = container.clone();
                Ok(())
            }
            None => Err(missing("container", container.id)),
        }
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create_order(
        &self,
        order: &Order,
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(duplicate("order", order.id));
        }
        if tables.orders.values().any(|o| o.order_number == order.order_number) {
            return Err(duplicate("order number", &order.order_number));
        }
        if !tables.containers.contains_key(&order.container_id) {
            return Err(missing("container", order.container_id));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(
        &self,
        id: Uuid,
    ) -> Result<Option<Order>, RepoError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn update_order(
        &self,
        order: &Order,
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&order.id) {
            Some(row) => {
                *row = order.clone();
                Ok(())
            }
            None => Err(missing("order", order.id)),
        }
    }

    async fn update_orders(
        &self,
        orders: &[Order],
        released: &[TerminalAppointment],
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if let Some(o) = orders.iter().find(|o| !tables.orders.contains_key(&o.id)) {
            return Err(missing("order", o.id));
        }
        if let Some(a) = released.iter().find(|a| !tables.appointments.contains_key(&a.id)) {
            return Err(missing("appointment", a.id));
        }
        for order in orders {
            tables.orders.insert(order.id, order.clone());
        }
        for appointment in released {
            tables.appointments.insert(appointment.id, appointment.clone());
        }
        Ok(())
    }

    async fn get_orders_by_container(
        &self,
        container_id: Uuid,
    ) -> Result<Vec<Order>, RepoError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.container_id == container_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.order_number.cmp(&b.order_number));
        Ok(orders)
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, RepoError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.order_number.cmp(&b.order_number));
        Ok(orders)
    }

    async fn next_order_number(&self) -> Result<String, RepoError> {
        let mut tables = self.tables.write().await;
        tables.order_sequence += 1;
        Ok(format!("ORD-{:06}", tables.order_sequence))
    }
}

#[async_trait]
impl AppointmentRepository for MemoryStore {
    async fn create_appointment(
        &self,
        appointment: &TerminalAppointment,
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if tables.appointments.contains_key(&appointment.id) {
            return Err(duplicate("appointment", appointment.id));
        }
        tables.insert_appointment(appointment);
        Ok(())
    }

    async fn get_appointment(
        &self,
        id: Uuid,
    ) -> Result<Option<TerminalAppointment>, RepoError> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn update_appointment(
        &self,
        appointment: &TerminalAppointment,
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        match tables.appointments.get_mut(&appointment.id) {
            Some(row) => {
                *row = appointment.clone();
                Ok(())
            }
            None => Err(missing("appointment", appointment.id)),
        }
    }

    async fn replace_appointment(
        &self,
        previous: &TerminalAppointment,
        replacement: &TerminalAppointment,
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.appointments.contains_key(&previous.id) {
            return Err(missing("appointment", previous.id));
        }
        if tables.appointments.contains_key(&replacement.id) {
            return Err(duplicate("appointment", replacement.id));
        }
        tables.appointments.insert(previous.id, previous.clone());
        tables.insert_appointment(replacement);
        Ok(())
    }

    async fn get_appointments_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<TerminalAppointment>, RepoError> {
        let tables = self.tables.read().await;
        let mut appointments: Vec<TerminalAppointment> = tables
            .appointments
            .values()
            .filter(|a| a.order_id == order_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| (a.created_at, tables.rank(&a.id)));
        Ok(appointments)
    }

    async fn get_appointments_by_terminal(
        &self,
        terminal_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TerminalAppointment>, RepoError> {
        let tables = self.tables.read().await;
        let mut appointments: Vec<TerminalAppointment> = tables
            .appointments
            .values()
            .filter(|a| a.terminal_id == terminal_id && a.overlaps(start, end))
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.window_start);
        Ok(appointments)
    }
}
