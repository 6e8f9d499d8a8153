use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use super::container::NewContainer;
use super::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentType {
    Import,
    Export,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Booked,
    Active,
    Completed,
    Cancelled,
}

impl ShipmentStatus {
    /// BOOKED -> ACTIVE -> COMPLETED, with CANCELLED reachable until completion
    pub fn allowed_transitions(&self) -> &'static [ShipmentStatus] {
        use ShipmentStatus::*;
        match self {
            Booked => &[Active, Cancelled],
            Active => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition(&self, to: ShipmentStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Booked => "BOOKED",
            ShipmentStatus::Active => "ACTIVE",
            ShipmentStatus::Completed => "COMPLETED",
            ShipmentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One import or export movement through a single terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub shipment_type: ShipmentType,
    pub reference_number: String,
    pub customer_id: Uuid,
    pub terminal_id: Uuid,
    pub steamship_line_id: Option<Uuid>,
    pub vessel_name: Option<String>,
    pub voyage_number: Option<String>,
    pub vessel_eta: Option<DateTime<Utc>>,
    /// Import only: storage charges accrue after this instant
    pub last_free_day: Option<DateTime<Utc>>,
    /// Export only
    pub port_cutoff: Option<DateTime<Utc>>,
    /// Export only
    pub doc_cutoff: Option<DateTime<Utc>>,
    pub status: ShipmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn is_import(&self) -> bool {
        self.shipment_type == ShipmentType::Import
    }

    /// Imports carry an LFD, exports carry both cutoffs
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.reference_number.trim().is_empty() {
            return Err(ValidationError::new("reference_number", "", "must not be empty"));
        }

        match self.shipment_type {
            ShipmentType::Import => {
                if self.last_free_day.is_none() {
                    return Err(ValidationError::new(
                        "last_free_day",
                        "null",
                        "import shipments must carry a last free day",
                    ));
                }
            }
            ShipmentType::Export => {
                if self.port_cutoff.is_none() {
                    return Err(ValidationError::new(
                        "port_cutoff",
                        "null",
                        "export shipments must carry a port cutoff",
                    ));
                }
                if self.doc_cutoff.is_none() {
                    return Err(ValidationError::new(
                        "doc_cutoff",
                        "null",
                        "export shipments must carry a documentation cutoff",
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Booking payload: a shipment plus the containers received with it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShipment {
    pub shipment_type: ShipmentType,
    pub reference_number: String,
    pub customer_id: Uuid,
    pub terminal_id: Uuid,
    #[serde(default)]
    pub steamship_line_id: Option<Uuid>,
    #[serde(default)]
    pub vessel_name: Option<String>,
    #[serde(default)]
    pub voyage_number: Option<String>,
    #[serde(default)]
    pub vessel_eta: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_free_day: Option<DateTime<Utc>>,
    #[serde(default)]
    pub port_cutoff: Option<DateTime<Utc>>,
    #[serde(default)]
    pub doc_cutoff: Option<DateTime<Utc>>,
    #[serde(default)]
    pub containers: Vec<NewContainer>,
}

impl NewShipment {
    pub fn into_shipment(self, now: DateTime<Utc>) -> (Shipment, Vec<NewContainer>) {
        let shipment = Shipment {
            id: Uuid::new_v4(),
            shipment_type: self.shipment_type,
            reference_number: self.reference_number,
            customer_id: self.customer_id,
            terminal_id: self.terminal_id,
            steamship_line_id: self.steamship_line_id,
            vessel_name: self.vessel_name,
            voyage_number: self.voyage_number,
            vessel_eta: self.vessel_eta,
            last_free_day: self.last_free_day,
            port_cutoff: self.port_cutoff,
            doc_cutoff: self.doc_cutoff,
            status: ShipmentStatus::Booked,
            created_at: now,
            updated_at: now,
        };
        (shipment, self.containers)
    }
}
