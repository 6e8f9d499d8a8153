use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use drayage_order::{AppointmentView, BulkUpdateReport};
use drayage_rates::ChargeSummary;
use drayage_shared::{NewOrder, Order, OrderFilter, OrderStatus};
use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shipment_id: Uuid,
    #[serde(flatten)]
    pub order: NewOrder,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkStatusRequest {
    pub order_ids: Vec<Uuid>,
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order).get(list_orders))
        .route("/v1/orders/bulk-status", post(bulk_update_status))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/status", post(transition_order))
        .route("/v1/orders/{id}/cancel", post(cancel_order))
        .route("/v1/orders/{id}/billed", post(mark_billed))
        .route("/v1/orders/{id}/paid", post(mark_paid))
        .route("/v1/orders/{id}/charges", get(order_charges))
        .route("/v1/orders/{id}/appointments", get(order_appointments))
        .route("/v1/containers/{id}/charges", get(container_charges))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders
async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = state.coordinator.create_order(req.shipment_id, req.order).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /v1/orders?status=READY&billing_status=UNBILLED
async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.coordinator.list_orders(&filter).await?))
}

/// GET /v1/orders/:id
async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.coordinator.get_order(id).await?))
}

/// POST /v1/orders/:id/status
async fn transition_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.coordinator.transition_order(id, req.status, &req.reason).await?;
    Ok(Json(order))
}

/// POST /v1/orders/:id/cancel
/// Also cancels the order's active appointment
async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.coordinator.cancel_order(id, &req.reason).await?))
}

/// POST /v1/orders/bulk-status
/// Invalid orders are reported in `skipped`; the call itself still succeeds
async fn bulk_update_status(
    State(state): State<AppState>,
    Json(req): Json<BulkStatusRequest>,
) -> Result<Json<BulkUpdateReport>, AppError> {
    if req.order_ids.is_empty() {
        return Err(AppError::BadRequest("order_ids must not be empty".to_string()));
    }
    let report = state
        .coordinator
        .bulk_update_status(&req.order_ids, req.status, &req.reason)
        .await?;
    Ok(Json(report))
}

/// POST /v1/orders/:id/billed
async fn mark_billed(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.coordinator.mark_billed(id).await?))
}

/// POST /v1/orders/:id/paid
async fn mark_paid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.coordinator.mark_paid(id).await?))
}

/// GET /v1/orders/:id/charges
async fn order_charges(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChargeSummary>, AppError> {
    Ok(Json(state.coordinator.charges_for_order(id).await?))
}

/// GET /v1/containers/:id/charges
async fn container_charges(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChargeSummary>, AppError> {
    Ok(Json(state.coordinator.charges_for_container(id).await?))
}

/// GET /v1/orders/:id/appointments
/// Whole reschedule chain, oldest first
async fn order_appointments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AppointmentView>>, AppError> {
    Ok(Json(state.coordinator.appointments_for_order(id).await?))
}
