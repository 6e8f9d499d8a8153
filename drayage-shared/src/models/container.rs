use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Supported box lengths. Rate tables are keyed by this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContainerSize {
    #[serde(rename = "20")]
    Ft20,
    #[serde(rename = "40")]
    Ft40,
    #[serde(rename = "45")]
    Ft45,
}

impl ContainerSize {
    pub fn feet(&self) -> u16 {
        match self {
            ContainerSize::Ft20 => 20,
            ContainerSize::Ft40 => 40,
            ContainerSize::Ft45 => 45,
        }
    }
}

impl fmt::Display for ContainerSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ft", self.feet())
    }
}

impl TryFrom<u16> for ContainerSize {
    type Error = ValidationError;

    fn try_from(feet: u16) -> Result<Self, Self::Error> {
        match feet {
            20 => Ok(ContainerSize::Ft20),
            40 => Ok(ContainerSize::Ft40),
            45 => Ok(ContainerSize::Ft45),
            other => Err(ValidationError::new("size", other, "supported sizes are 20, 40 and 45 ft")),
        }
    }
}

impl FromStr for ContainerSize {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_end_matches("ft").trim_end_matches("FT");
        let feet: u16 = digits
            .parse()
            .map_err(|_| ValidationError::new("size", s, "not a container length"))?;
        ContainerSize::try_from(feet)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerType {
    Dry,
    HighCube,
    Reefer,
    OpenTop,
    FlatRack,
    Tank,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomsStatus {
    Pending,
    Hold,
    Released,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhysicalState {
    Loaded,
    Empty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Terminal,
    InTransit,
    CustomerSite,
    Yard,
    Depot,
}

/// ISO 6346 container identifier: 3-letter owner code, category letter
/// (U, J or Z), 6-digit serial and a check digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerNumber(String);

impl ContainerNumber {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect::<String>()
            .to_ascii_uppercase();

        let invalid = |message: &str| ValidationError::new("container_number", raw, message);

        if normalized.len() != 11 || !normalized.is_ascii() {
            return Err(invalid("expected 11 characters (AAAU1234567)"));
        }

        let bytes = normalized.as_bytes();
        if !bytes[..4].iter().all(u8::is_ascii_uppercase) {
            return Err(invalid("owner code and category must be letters"));
        }
        if !matches!(bytes[3], b'U' | b'J' | b'Z') {
            return Err(invalid("category identifier must be U, J or Z"));
        }
        if !bytes[4..].iter().all(u8::is_ascii_digit) {
            return Err(invalid("serial number and check digit must be digits"));
        }

        let expected = Self::check_digit(&normalized[..10]);
        let actual = u32::from(bytes[10] - b'0');
        if expected != actual {
            return Err(invalid(&format!("check digit should be {}", expected)));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn check_digit(prefix: &str) -> u32 {
        let sum: u32 = prefix
            .chars()
            .enumerate()
            .map(|(position, c)| Self::char_value(c) << position)
            .sum();
        sum % 11 % 10
    }

    // Letters start at 10 and skip multiples of 11
    fn char_value(c: char) -> u32 {
        if let Some(digit) = c.to_digit(10) {
            return digit;
        }
        let mut value = 10;
        for letter in 'A'..=c {
            if value % 11 == 0 {
                value += 1;
            }
            if letter == c {
                break;
            }
            value += 1;
        }
        value
    }
}

impl TryFrom<String> for ContainerNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ContainerNumber::parse(&value)
    }
}

impl From<ContainerNumber> for String {
    fn from(value: ContainerNumber) -> Self {
        value.0
    }
}

impl fmt::Display for ContainerNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A physical box tied to exactly one shipment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub number: ContainerNumber,
    pub size: ContainerSize,
    pub container_type: ContainerType,
    pub weight_lbs: Option<u32>,
    pub is_hazmat: bool,
    pub is_overweight: bool,
    pub is_reefer: bool,
    pub customs_status: CustomsStatus,
    pub physical_state: PhysicalState,
    pub location_type: LocationType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContainer {
    pub number: ContainerNumber,
    pub size: ContainerSize,
    #[serde(default = "default_container_type")]
    pub container_type: ContainerType,
    #[serde(default)]
    pub weight_lbs: Option<u32>,
    #[serde(default)]
    pub is_hazmat: bool,
    #[serde(default)]
    pub is_overweight: bool,
}

fn default_container_type() -> ContainerType {
    ContainerType::Dry
}

impl NewContainer {
    pub fn into_container(self, shipment_id: Uuid, now: DateTime<Utc>) -> Container {
        let is_reefer = self.container_type == ContainerType::Reefer;
        Container {
            id: Uuid::new_v4(),
            shipment_id,
            number: self.number,
            size: self.size,
            container_type: self.container_type,
            weight_lbs: self.weight_lbs,
            is_hazmat: self.is_hazmat,
            is_overweight: self.is_overweight,
            is_reefer,
            customs_status: CustomsStatus::Pending,
            physical_state: PhysicalState::Loaded,
            location_type: LocationType::Terminal,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Customs and location facts reported for a container. Unset fields keep
/// their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerUpdate {
    #[serde(default)]
    pub customs_status: Option<CustomsStatus>,
    #[serde(default)]
    pub physical_state: Option<PhysicalState>,
    #[serde(default)]
    pub location_type: Option<LocationType>,
}

impl ContainerUpdate {
    pub fn is_empty(&self) -> bool {
        self.customs_status.is_none() && self.physical_state.is_none() && self.location_type.is_none()
    }

    pub fn apply(&self, container: &Container, now: DateTime<Utc>) -> Container {
        let mut next = container.clone();
        if let Some(customs_status) = self.customs_status {
            next.customs_status = customs_status;
        }
        if let Some(physical_state) = self.physical_state {
            next.physical_state = physical_state;
        }
        if let Some(location_type) = self.location_type {
            next.location_type = location_type;
        }
        next.updated_at = now;
        next
    }
}
