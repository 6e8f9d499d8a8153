pub mod appointment;
pub mod container;
pub mod events;
pub mod order;
pub mod shipment;

/// Input that fails a field-level invariant. Carries enough detail for an
/// operator screen to point at the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} ({value}): {message}")]
pub struct ValidationError {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, value: impl ToString, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
            message: message.into(),
        }
    }
}
