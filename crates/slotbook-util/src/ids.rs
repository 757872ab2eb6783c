//! Strongly-typed identifiers for slotbook

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a single reservation.
///
/// Generated on the client through a [`ReservationIdBatch`]: wall-clock
/// milliseconds plus a small random spread, then the slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReservationId(i64);

impl ReservationId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReservationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i64> for ReservationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Serialize for ReservationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

// The store hands ids back either as JSON numbers or as strings.
impl<'de> Deserialize<'de> for ReservationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = ReservationId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an integer reservation id or its string form")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(ReservationId(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                i64::try_from(v)
                    .map(ReservationId)
                    .map_err(|_| E::custom("reservation id out of range"))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                if v.fract() == 0.0 && v.is_finite() {
                    Ok(ReservationId(v as i64))
                } else {
                    Err(E::custom("reservation id is not an integer"))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// Id source for the slots of one booking. The base is drawn once, so ids
/// within a batch never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationIdBatch {
    base: i64,
}

impl ReservationIdBatch {
    pub fn new() -> Self {
        let millis = crate::now().timestamp_millis();
        let spread = (Uuid::new_v4().as_u128() % 1000) as i64;
        Self {
            base: millis + spread,
        }
    }

    /// Id of the `index`-th slot of the batch
    pub fn id(&self, index: usize) -> ReservationId {
        ReservationId(self.base + index as i64)
    }
}

impl Default for ReservationIdBatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of this client session, sent along with lock requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one lock acquisition; fresh for every booking attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockId(Uuid);

impl LockId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
