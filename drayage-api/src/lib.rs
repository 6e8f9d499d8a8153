use axum::{
    extract::State,
    http::Method,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use drayage_core::events::EventPublisher;
use drayage_order::{Collaborators, LifecycleCoordinator, Repositories};
use drayage_rates::{RateSchedule, SchedulingRules};
use drayage_store::MemoryStore;

pub mod appointments;
pub mod error;
pub mod orders;
pub mod shipments;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/v1/rates", get(rate_schedule))
        .merge(shipments::routes())
        .merge(orders::routes())
        .merge(appointments::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Coordinator over in-memory repositories; persistence lives outside this service
pub fn in_memory_state(
    rates: RateSchedule,
    rules: SchedulingRules,
    events: Arc<dyn EventPublisher>,
) -> AppState {
    let store = MemoryStore::new();
    let repos = Repositories {
        shipments: Arc::new(store.clone()),
        containers: Arc::new(store.clone()),
        orders: Arc::new(store.clone()),
        appointments: Arc::new(store),
    };
    let collaborators = Collaborators::from_rules(&rules, events);
    AppState {
        coordinator: LifecycleCoordinator::new(repos, collaborators, Arc::new(rates), Arc::new(rules)),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn rate_schedule(State(state): State<AppState>) -> Json<RateSchedule> {
    Json(state.coordinator.calculator().rates().clone())
}
