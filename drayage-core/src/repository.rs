use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use drayage_shared::{Container, Order, OrderFilter, Shipment, TerminalAppointment};

pub type RepoError = Box<dyn std::error::Error + Send + Sync>;

/// Repository trait for shipment data access
#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    /// Persist a shipment and its containers in one transaction
    async fn create_shipment(
        &self,
        shipment: &Shipment,
        containers: &[Container],
    ) -> Result<(), RepoError>;

    async fn get_shipment(
        &self,
        id: Uuid,
    ) -> Result<Option<Shipment>, RepoError>;

    async fn update_shipment(
        &self,
        shipment: &Shipment,
    ) -> Result<(), RepoError>;
}

/// Repository trait for container data access
#[async_trait]
pub trait ContainerRepository: Send + Sync {
    async fn create_container(
        &self,
        container: &Container,
    ) -> Result<(), RepoError>;

    async fn get_container(
        &self,
        id: Uuid,
    ) -> Result<Option<Container>, RepoError>;

    async fn get_containers_by_shipment(
        &self,
        shipment_id: Uuid,
    ) -> Result<Vec<Container>, RepoError>;

    async fn update_container(
        &self,
        container: &Container,
    ) -> Result<(), RepoError>;
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(
        &self,
        order: &Order,
    ) -> Result<(), RepoError>;

    async fn get_order(
        &self,
        id: Uuid,
    ) -> Result<Option<Order>, RepoError>;

    async fn update_order(
        &self,
        order: &Order,
    ) -> Result<(), RepoError>;

    /// Write every order, and the appointments released with them, in one
    /// transaction. Nothing is written if any row is missing.
    async fn update_orders(
        &self,
        orders: &[Order],
        released: &[TerminalAppointment],
    ) -> Result<(), RepoError>;

    async fn get_orders_by_container(
        &self,
        container_id: Uuid,
    ) -> Result<Vec<Order>, RepoError>;

    async fn list_orders(
        &self,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, RepoError>;

    /// Atomically allocate the next order number
    async fn next_order_number(&self) -> Result<String, RepoError>;
}

/// Repository trait for terminal appointment data access
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn create_appointment(
        &self,
        appointment: &TerminalAppointment,
    ) -> Result<(), RepoError>;

    async fn get_appointment(
        &self,
        id: Uuid,
    ) -> Result<Option<TerminalAppointment>, RepoError>;

    async fn update_appointment(
        &self,
        appointment: &TerminalAppointment,
    ) -> Result<(), RepoError>;

    /// Close `previous` and insert `replacement` in one transaction
    async fn replace_appointment(
        &self,
        previous: &TerminalAppointment,
        replacement: &TerminalAppointment,
    ) -> Result<(), RepoError>;

    /// Oldest first; records created at the same instant keep insertion order
    async fn get_appointments_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<TerminalAppointment>, RepoError>;

    /// Appointments whose window overlaps `[start, end)`
    async fn get_appointments_by_terminal(
        &self,
        terminal_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TerminalAppointment>, RepoError>;
}
