use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use drayage_order::{AppointmentRequest, AppointmentView};
use drayage_shared::TerminalAppointment;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub confirmation_number: String,
    pub confirmed_by: String,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub new_time: DateTime<Utc>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ArrivalRequest {
    pub arrival_time: DateTime<Utc>,
    pub gate: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub completion_time: DateTime<Utc>,
    pub ticket_number: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/appointments", post(request_appointment))
        .route("/v1/appointments/{id}", get(get_appointment))
        .route("/v1/appointments/{id}/confirm", post(confirm_appointment))
        .route("/v1/appointments/{id}/reschedule", post(reschedule_appointment))
        .route("/v1/appointments/{id}/cancel", post(cancel_appointment))
        .route("/v1/appointments/{id}/arrival", post(record_arrival))
        .route("/v1/appointments/{id}/complete", post(complete_appointment))
}

/// POST /v1/appointments
/// Returns REQUESTED; the terminal confirms asynchronously
async fn request_appointment(
    State(state): State<AppState>,
    Json(req): Json<AppointmentRequest>,
) -> Result<(StatusCode, Json<TerminalAppointment>), AppError> {
    let appointment = state.coordinator.request_appointment(req).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn get_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AppointmentView>, AppError> {
    Ok(Json(state.coordinator.get_appointment(id).await?))
}

async fn confirm_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<TerminalAppointment>, AppError> {
    let appointment = state
        .coordinator
        .confirm_appointment(id, &req.confirmation_number, &req.confirmed_by)
        .await?;
    Ok(Json(appointment))
}

/// POST /v1/appointments/:id/reschedule
/// Returns the new appointment; the old one is closed as RESCHEDULED
async fn reschedule_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<(StatusCode, Json<TerminalAppointment>), AppError> {
    let appointment = state
        .coordinator
        .reschedule_appointment(id, req.new_time, &req.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn cancel_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<TerminalAppointment>, AppError> {
    Ok(Json(state.coordinator.cancel_appointment(id, &req.reason).await?))
}

async fn record_arrival(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ArrivalRequest>,
) -> Result<Json<AppointmentView>, AppError> {
    let view = state
        .coordinator
        .record_arrival(id, req.arrival_time, req.gate.as_deref())
        .await?;
    Ok(Json(view))
}

async fn complete_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<TerminalAppointment>, AppError> {
    let appointment = state
        .coordinator
        .complete_appointment(id, req.completion_time, req.ticket_number.as_deref())
        .await?;
    Ok(Json(appointment))
}
