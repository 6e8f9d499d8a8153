pub mod models;

pub use models::appointment::{AppointmentStatus, AppointmentType, TerminalAppointment};
pub use models::container::{
    Container, ContainerNumber, ContainerSize, ContainerType, ContainerUpdate, CustomsStatus, LocationType,
    NewContainer, PhysicalState,
};
pub use models::events::DomainEvent;
pub use models::order::{BillingStatus, NewOrder, Order, OrderFilter, OrderStatus, OrderType};
pub use models::shipment::{NewShipment, Shipment, ShipmentStatus, ShipmentType};
pub use models::ValidationError;
