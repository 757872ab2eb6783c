//! Slot and reservation types

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use slotbook_util::{ReservationId, format_date, is_past};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator used in the string form of a slot key.
/// Configuration validation keeps it out of every hour label and resource name.
pub const SLOT_KEY_SEPARATOR: char = '|';

/// Scheduling window. Each shift owns its own hour sequence and resource catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Shift {
    #[serde(rename = "matutino", alias = "morning")]
    Morning,
    #[serde(rename = "vespertino", alias = "evening")]
    Evening,
}

impl Shift {
    pub const ALL: [Shift; 2] = [Shift::Morning, Shift::Evening];

    /// Name the Reservation Store uses for this shift
    pub fn wire_name(&self) -> &'static str {
        match self {
            Shift::Morning => "matutino",
            Shift::Evening => "vespertino",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Shift::Morning => "morning",
            Shift::Evening => "evening",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown shift: {0}")]
pub struct UnknownShift(pub String);

impl FromStr for Shift {
    type Err = UnknownShift;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" | "matutino" => Ok(Shift::Morning),
            "evening" | "vespertino" => Ok(Shift::Evening),
            other => Err(UnknownShift(other.to_string())),
        }
    }
}

/// Shift-scoped hour label ("1era", "0", ...). The same label can mean a
/// different wall-clock hour in another shift.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HourLabel(String);

impl HourLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HourLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HourLabel {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for HourLabel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Bookable resource, drawn from the static catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(String);

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Resource {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Resource {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Composite identity of the atomic bookable unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub shift: Shift,
    pub hour: HourLabel,
    pub resource: Resource,
}

impl SlotKey {
    pub fn new(date: NaiveDate, shift: Shift, hour: HourLabel, resource: Resource) -> Self {
        Self {
            date,
            shift,
            hour,
            resource,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = SLOT_KEY_SEPARATOR;
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            format_date(self.date),
            self.shift.wire_name(),
            self.hour,
            self.resource
        )
    }
}

/// A contiguous run of hours on one resource, as checked or locked remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    pub date: NaiveDate,
    pub shift: Shift,
    pub resource: Resource,
    pub hours: Vec<HourLabel>,
}

impl SlotRange {
    /// Hours joined with commas, as the store expects them
    pub fn hours_param(&self) -> String {
        self.hours
            .iter()
            .map(HourLabel::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn slot_keys(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.hours.iter().map(|hour| {
            SlotKey::new(self.date, self.shift, hour.clone(), self.resource.clone())
        })
    }
}

/// One booked slot. A multi-hour booking produces one reservation per hour,
/// all sharing duration and requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,

    #[serde(rename = "fecha")]
    pub date: NaiveDate,

    #[serde(rename = "turno")]
    pub shift: Shift,

    #[serde(rename = "hora")]
    pub hour: HourLabel,

    #[serde(rename = "recurso")]
    pub resource: Resource,

    #[serde(rename = "nombre")]
    pub first_name: String,

    #[serde(rename = "apellido")]
    pub last_name: String,

    /// Requested duration of the whole booking, informational only
    #[serde(rename = "cantidadHoras")]
    pub duration: u32,

    #[serde(rename = "fechaReserva")]
    pub created_at: DateTime<Local>,
}

impl Reservation {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.date, self.shift, self.hour.clone(), self.resource.clone())
    }

    /// Active iff the reservation date is not strictly before today
    pub fn is_active(&self, today: NaiveDate) -> bool {
        !is_past(self.date, today)
    }

    pub fn requester(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// What the UI shell asks the booking protocol for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub date: NaiveDate,
    pub shift: Shift,
    pub start_hour: HourLabel,
    /// Number of consecutive hours
    pub duration: usize,
    pub resource: Resource,
    pub first_name: String,
    pub last_name: String,
}

impl BookingRequest {
    /// Build the reservation for one hour of this request
    pub fn reservation_for(
        &self,
        hour: HourLabel,
        id: ReservationId,
        created_at: DateTime<Local>,
    ) -> Reservation {
        Reservation {
            id,
            date: self.date,
            shift: self.shift,
            hour,
            resource: self.resource.clone(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            duration: self.duration as u32,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn shift_parses_both_vocabularies() {
        assert_eq!("morning".parse::<Shift>().unwrap(), Shift::Morning);
        assert_eq!("Vespertino".parse::<Shift>().unwrap(), Shift::Evening);
        assert!("night".parse::<Shift>().is_err());
    }

    #[test]
    fn shift_uses_store_names_on_the_wire() {
        assert_eq!(serde_json::to_string(&Shift::Morning).unwrap(), "\"matutino\"");
        let evening: Shift = serde_json::from_str("\"evening\"").unwrap();
        assert_eq!(evening, Shift::Evening);
    }

    #[test]
    fn slot_key_string_form() {
        let key = SlotKey::new(
            date("2025-03-10"),
            Shift::Morning,
            HourLabel::from("2da"),
            Resource::from("Cañón"),
        );
        assert_eq!(key.to_string(), "2025-03-10|matutino|2da|Cañón");
    }

    #[test]
    fn same_label_in_other_shift_is_another_slot() {
        let morning = SlotKey::new(
            date("2025-03-10"),
            Shift::Morning,
            HourLabel::from("1era"),
            Resource::from("Cañón"),
        );
        let evening = SlotKey {
            shift: Shift::Evening,
            ..morning.clone()
        };
        assert_ne!(morning, evening);
    }

    #[test]
    fn slot_range_hours_param() {
        let range = SlotRange {
            date: date("2025-03-10"),
            shift: Shift::Evening,
            resource: Resource::from("Salón 10"),
            hours: vec!["0".into(), "1era".into()],
        };
        assert_eq!(range.hours_param(), "0,1era");
        assert_eq!(range.slot_keys().count(), 2);
    }

    #[test]
    fn reservation_uses_store_field_names() {
        let request = BookingRequest {
            date: date("2025-03-10"),
            shift: Shift::Morning,
            start_hour: "1era".into(),
            duration: 2,
            resource: "Cañón".into(),
            first_name: " Ana ".into(),
            last_name: "Pérez".into(),
        };
        let reservation = request.reservation_for("1era".into(), ReservationId::new(1), slotbook_util::now());
        assert_eq!(reservation.first_name, "Ana");

        let json = serde_json::to_value(&reservation).unwrap();
        assert_eq!(json["fecha"], "2025-03-10");
        assert_eq!(json["turno"], "matutino");
        assert_eq!(json["hora"], "1era");
        assert_eq!(json["recurso"], "Cañón");
        assert_eq!(json["cantidadHoras"], 2);

        let back: Reservation = serde_json::from_value(json).unwrap();
        assert_eq!(back, reservation);
    }

    #[test]
    fn reservation_activity_is_date_only() {
        let request = BookingRequest {
            date: date("2025-03-10"),
            shift: Shift::Morning,
            start_hour: "1era".into(),
            duration: 1,
            resource: "Cañón".into(),
            first_name: "Ana".into(),
            last_name: "Pérez".into(),
        };
        let reservation = request.reservation_for("8va".into(), ReservationId::new(2), slotbook_util::now());
        assert!(reservation.is_active(date("2025-03-10")));
        assert!(reservation.is_active(date("2025-03-09")));
        assert!(!reservation.is_active(date("2025-03-11")));
    }
}
