pub mod billing;
pub mod confirmation;
pub mod coordinator;
pub mod locks;
pub mod scheduler;
pub mod state_machine;

pub use billing::apply_billing;
pub use confirmation::ConfirmationTasks;
pub use coordinator::{
    AppointmentView, BulkUpdateReport, Collaborators, LifecycleCoordinator, Repositories, SkippedOrder,
};
pub use locks::{KeyGuard, KeyedLocks};
pub use scheduler::{AppointmentRequest, AppointmentScheduler};
pub use state_machine::OrderStateMachine;
