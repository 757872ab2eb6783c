//! Reservation Store wire shapes
//!
//! The store is an external service whose responses are not always JSON.
//! Every response body goes through [`ParsedResponse::parse`], the only place
//! that falls back to keyword sniffing.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use slotbook_util::{LockId, ReservationId, SessionId, parse_store_date};
use std::time::Duration;
use thiserror::Error;

use crate::{HourLabel, Reservation, Resource, Shift, SlotRange};

/// Normalized form of a raw store response body
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// A JSON object carrying a `status` string
    Structured {
        status: String,
        fields: Map<String, Value>,
    },
    /// Plain text that reads like an acknowledgement
    UnstructuredSuccessHint,
    /// Plain text that reads like a collision report
    UnstructuredConflictHint,
    /// Anything else; carries the raw body for logging
    Unparseable(String),
}

const CONFLICT_KEYWORDS: &[&str] = &["conflict", "conflicto", "ocupad", "ya reservad"];
const SUCCESS_KEYWORDS: &[&str] = &["success", "éxito", "exito"];

impl ParsedResponse {
    pub fn parse(raw: &str) -> Self {
        if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(raw)
            && let Some(status) = fields.get("status").and_then(Value::as_str)
        {
            return ParsedResponse::Structured {
                status: status.trim().to_lowercase(),
                fields,
            };
        }

        let lowered = raw.to_lowercase();
        if CONFLICT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            ParsedResponse::UnstructuredConflictHint
        } else if SUCCESS_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            ParsedResponse::UnstructuredSuccessHint
        } else {
            ParsedResponse::Unparseable(raw.to_string())
        }
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            ParsedResponse::Structured { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            ParsedResponse::Structured { fields, .. } => fields.get(name),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<String> {
        self.field("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// `status: "ok"` (or `"success"`)
    pub fn is_ok(&self) -> bool {
        matches!(self.status(), Some("ok" | "success"))
    }

    /// Interpret as a create-reservation acknowledgement.
    /// `None` means the body could not be understood at all.
    pub fn create_ack(&self) -> Option<CreateAck> {
        match self {
            ParsedResponse::Structured { status, .. } => Some(match status.as_str() {
                "success" | "ok" => CreateAck::Created,
                "conflict" => CreateAck::Conflict(
                    self.message().unwrap_or_else(|| "slot already taken".into()),
                ),
                other => CreateAck::Rejected(self.message().unwrap_or_else(|| other.to_string())),
            }),
            ParsedResponse::UnstructuredSuccessHint => Some(CreateAck::Created),
            ParsedResponse::UnstructuredConflictHint => {
                Some(CreateAck::Conflict("slot already taken".into()))
            }
            ParsedResponse::Unparseable(_) => None,
        }
    }

    /// Interpret as an availability check. `None` unless the store answered `ok`.
    pub fn availability(&self) -> Option<bool> {
        if !self.is_ok() {
            return None;
        }
        self.field("disponible").and_then(Value::as_bool)
    }

    /// Interpret as a lock-and-check answer. `None` for an error status:
    /// only `ok`, `success` and `conflict` carry a grant. A missing
    /// `disponible` never reads as occupied.
    pub fn lock_grant(&self) -> Option<LockGrant> {
        match self {
            ParsedResponse::Structured { status, .. } => {
                if !matches!(status.as_str(), "ok" | "success" | "conflict") {
                    return None;
                }
                let acquired = self
                    .field("lockAcquired")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let available = self
                    .field("disponible")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                Some(LockGrant {
                    acquired,
                    available,
                    conflict: status == "conflict",
                    message: self.message(),
                })
            }
            ParsedResponse::UnstructuredConflictHint => Some(LockGrant {
                acquired: false,
                available: false,
                conflict: true,
                message: None,
            }),
            _ => None,
        }
    }

    /// Interpret as a full snapshot (`getAll`). `None` unless the response is
    /// structurally valid: status ok and a `reservas` array.
    pub fn records(&self) -> Option<Vec<StoreRecord>> {
        if !self.is_ok() {
            return None;
        }
        let items = self.field("reservas")?.as_array()?;
        Some(
            items
                .iter()
                .map(|item| serde_json::from_value(item.clone()).unwrap_or_default())
                .collect(),
        )
    }
}

/// Store answer to a create call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateAck {
    Created,
    Conflict(String),
    Rejected(String),
}

/// Store answer to a lock-and-check call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockGrant {
    pub acquired: bool,
    /// Whether the whole range is free
    pub available: bool,
    /// Store explicitly said another party holds an overlapping range
    pub conflict: bool,
    pub message: Option<String>,
}

impl LockGrant {
    pub fn is_usable(&self) -> bool {
        self.acquired && self.available && !self.conflict
    }
}

/// Lock acquisition request
#[derive(Debug, Clone)]
pub struct LockRequest {
    pub range: SlotRange,
    pub lock_id: LockId,
    pub session_id: SessionId,
    pub ttl: Duration,
}

/// Lock this booking attempt holds; carried on every create call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub lock_id: LockId,
    pub session_id: SessionId,
}

/// Body of a create call: the reservation plus the lock it was made under
#[derive(Debug, Serialize)]
pub struct CreatePayload<'a> {
    #[serde(flatten)]
    pub reservation: &'a Reservation,

    #[serde(rename = "lockId", skip_serializing_if = "Option::is_none")]
    pub lock_id: Option<&'a LockId>,

    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a SessionId>,
}

impl<'a> CreatePayload<'a> {
    pub fn new(reservation: &'a Reservation, lock: Option<&'a LockToken>) -> Self {
        Self {
            reservation,
            lock_id: lock.map(|l| &l.lock_id),
            session_id: lock.map(|l| &l.session_id),
        }
    }
}

/// Why a server record could not be turned into a reservation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("Missing or empty field: {0}")]
    MissingField(&'static str),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Unparseable date: {0}")]
    InvalidDate(String),

    #[error("Unknown shift: {0}")]
    UnknownShift(String),
}

/// Reservation as the store returns it: every field loosely typed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    #[serde(default)]
    pub id: Value,
    #[serde(default, rename = "fecha")]
    pub date: Value,
    #[serde(default, rename = "turno")]
    pub shift: Value,
    #[serde(default, rename = "hora")]
    pub hour: Value,
    #[serde(default, rename = "recurso")]
    pub resource: Value,
    #[serde(default, rename = "nombre")]
    pub first_name: Value,
    #[serde(default, rename = "apellido")]
    pub last_name: Value,
    #[serde(default, rename = "cantidadHoras")]
    pub duration: Value,
    #[serde(default, rename = "fechaReserva")]
    pub created_at: Value,
}

/// Text form of a scalar; spreadsheets turn "0" into 0
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl StoreRecord {
    /// Normalize into a reservation, with the date in canonical form
    pub fn normalize(&self) -> Result<Reservation, RecordError> {
        let id = match &self.id {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(ReservationId::new)
                .ok_or_else(|| RecordError::InvalidId(n.to_string()))?,
            Value::String(s) => s
                .parse::<ReservationId>()
                .map_err(|_| RecordError::InvalidId(s.clone()))?,
            _ => return Err(RecordError::MissingField("id")),
        };

        let raw_date = scalar_text(&self.date).ok_or(RecordError::MissingField("fecha"))?;
        let date = parse_store_date(&raw_date).ok_or(RecordError::InvalidDate(raw_date))?;

        let raw_shift = scalar_text(&self.shift).ok_or(RecordError::MissingField("turno"))?;
        let shift: Shift = raw_shift
            .parse()
            .map_err(|_| RecordError::UnknownShift(raw_shift))?;

        let hour = scalar_text(&self.hour).ok_or(RecordError::MissingField("hora"))?;
        let resource = scalar_text(&self.resource).ok_or(RecordError::MissingField("recurso"))?;

        let duration = scalar_text(&self.duration)
            .and_then(|d| d.parse::<u32>().ok())
            .unwrap_or(1);

        let created_at = scalar_text(&self.created_at)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Local))
            .unwrap_or_else(slotbook_util::now);

        Ok(Reservation {
            id,
            date,
            shift,
            hour: HourLabel::from(hour),
            resource: Resource::from(resource),
            first_name: scalar_text(&self.first_name).unwrap_or_default(),
            last_name: scalar_text(&self.last_name).unwrap_or_default(),
            duration,
            created_at,
        })
    }
}

impl From<&Reservation> for StoreRecord {
    fn from(r: &Reservation) -> Self {
        Self {
            id: Value::from(r.id.as_i64()),
            date: Value::from(slotbook_util::format_date(r.date)),
            shift: Value::from(r.shift.wire_name()),
            hour: Value::from(r.hour.as_str()),
            resource: Value::from(r.resource.as_str()),
            first_name: Value::from(r.first_name.as_str()),
            last_name: Value::from(r.last_name.as_str()),
            duration: Value::from(r.duration),
            created_at: Value::from(r.created_at.to_rfc3339()),
        }
    }
}
