use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use drayage_shared::{Container, ContainerUpdate, NewContainer, NewShipment, Shipment, ShipmentStatus};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ShipmentResponse {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub containers: Vec<Container>,
}

#[derive(Debug, Deserialize)]
pub struct LastFreeDayRequest {
    pub last_free_day: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ShipmentStatusRequest {
    pub status: ShipmentStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/shipments", post(create_shipment))
        .route("/v1/shipments/{id}", get(get_shipment))
        .route("/v1/shipments/{id}/containers", post(add_container))
        .route("/v1/shipments/{id}/last-free-day", put(update_last_free_day))
        .route("/v1/shipments/{id}/status", put(update_shipment_status))
        .route("/v1/containers/{id}", get(get_container).patch(update_container))
}

/// POST /v1/shipments
/// Shipment and its containers are created together or not at all
async fn create_shipment(
    State(state): State<AppState>,
    Json(req): Json<NewShipment>,
) -> Result<(StatusCode, Json<ShipmentResponse>), AppError> {
    let (shipment, containers) = state.coordinator.create_shipment(req).await?;
    Ok((StatusCode::CREATED, Json(ShipmentResponse { shipment, containers })))
}

/// GET /v1/shipments/:id
async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShipmentResponse>, AppError> {
    let shipment = state.coordinator.get_shipment(id).await?;
    let containers = state.coordinator.containers_for_shipment(id).await?;
    Ok(Json(ShipmentResponse { shipment, containers }))
}

/// POST /v1/shipments/:id/containers
async fn add_container(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewContainer>,
) -> Result<(StatusCode, Json<Container>), AppError> {
    let container = state.coordinator.add_container(id, req).await?;
    Ok((StatusCode::CREATED, Json(container)))
}

/// PUT /v1/shipments/:id/last-free-day
async fn update_last_free_day(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<LastFreeDayRequest>,
) -> Result<Json<Shipment>, AppError> {
    let shipment = state.coordinator.update_last_free_day(id, req.last_free_day).await?;
    Ok(Json(shipment))
}

/// GET /v1/containers/:id
async fn get_container(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Container>, AppError> {
    Ok(Json(state.coordinator.get_container(id).await?))
}

/// PATCH /v1/containers/:id
/// Customs and location facts; omitted fields are left as they are
async fn update_container(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ContainerUpdate>,
) -> Result<Json<Container>, AppError> {
    Ok(Json(state.coordinator.update_container(id, req).await?))
}

/// PUT /v1/shipments/:id/status
async fn update_shipment_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ShipmentStatusRequest>,
) -> Result<Json<Shipment>, AppError> {
    Ok(Json(state.coordinator.update_shipment_status(id, req.status).await?))
}
