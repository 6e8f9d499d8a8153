use drayage_order::LifecycleCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: LifecycleCoordinator,
}
