pub mod clock;
pub mod events;
pub mod repository;
pub mod terminal;

use chrono::{DateTime, Utc};
use drayage_shared::ValidationError;
use serde::Serialize;

/// Coarse classification callers branch on (HTTP status, retry policy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    InvalidState,
    InsufficientResource,
    Configuration,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed for {field} ({value}): {message}")]
    Validation {
        field: String,
        value: String,
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} conflicts: {message}")]
    Conflict {
        entity: &'static str,
        id: String,
        message: String,
    },

    #[error("Invalid {entity} transition from {from} to {to}")]
    InvalidState {
        entity: &'static str,
        from: String,
        to: String,
        allowed: Vec<String>,
    },

    #[error("Terminal {terminal_id} is closed at {at}")]
    TerminalClosed { terminal_id: String, at: DateTime<Utc> },

    #[error("No slot available at terminal {terminal_id} for {at} (capacity {capacity})")]
    SlotUnavailable {
        terminal_id: String,
        at: DateTime<Utc>,
        capacity: u32,
    },

    #[error("Insufficient resource: {0}")]
    InsufficientResource(String),

    #[error("No rate table configured for container size {0}")]
    InvalidContainerSize(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Repository error: {0}")]
    Repository(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation { .. } | CoreError::TerminalClosed { .. } => ErrorKind::Validation,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Conflict { .. } => ErrorKind::Conflict,
            CoreError::InvalidState { .. } => ErrorKind::InvalidState,
            CoreError::SlotUnavailable { .. } | CoreError::InsufficientResource(_) => {
                ErrorKind::InsufficientResource
            }
            CoreError::InvalidContainerSize(_) | CoreError::Configuration(_) => ErrorKind::Configuration,
            CoreError::Repository(_) => ErrorKind::Internal,
        }
    }

    pub fn validation(field: &str, value: impl ToString, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.to_string(),
            value: value.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl ToString, message: impl Into<String>) -> Self {
        CoreError::Conflict {
            entity,
            id: id.to_string(),
            message: message.into(),
        }
    }

    /// Structured fields for operator-facing error bodies
    pub fn detail(&self) -> serde_json::Value {
        match self {
            CoreError::Validation { field, value, message } => {
                serde_json::json!({ "field": field, "value": value, "message": message })
            }
            CoreError::NotFound { entity, id } => serde_json::json!({ "entity": entity, "id": id }),
            CoreError::Conflict { entity, id, message } => {
                serde_json::json!({ "entity": entity, "id": id, "message": message })
            }
            CoreError::InvalidState { entity, from, to, allowed } => serde_json::json!({
                "entity": entity,
                "from": from,
                "to": to,
                "allowed": allowed,
            }),
            CoreError::TerminalClosed { terminal_id, at } => {
                serde_json::json!({ "terminal_id": terminal_id, "at": at })
            }
            CoreError::SlotUnavailable { terminal_id, at, capacity } => {
                serde_json::json!({ "terminal_id": terminal_id, "at": at, "capacity": capacity })
            }
            CoreError::InsufficientResource(msg)
            | CoreError::InvalidContainerSize(msg)
            | CoreError::Configuration(msg)
            | CoreError::Repository(msg) => serde_json::json!({ "message": msg }),
        }
    }
}

impl From<ValidationError> for CoreError {
    fn from(err: ValidationError) -> Self {
        CoreError::Validation {
            field: err.field,
            value: err.value,
            message: err.message,
        }
    }
}

impl From<repository::RepoError> for CoreError {
    fn from(err: repository::RepoError) -> Self {
        CoreError::Repository(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
