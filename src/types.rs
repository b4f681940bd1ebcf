//! Primitive newtypes shared by the wire codec, routing table, and engine.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Reachability ceiling: a cost of 16 means "unreachable".
pub const INFINITY: u8 = 16;

pub const MIN_ROUTER_ID: u16 = 1;
pub const MAX_ROUTER_ID: u16 = 64000;
pub const MIN_PORT: u16 = 1024;
pub const MAX_PORT: u16 = 64000;

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum RangeError {
    #[error("router id {0} outside [{MIN_ROUTER_ID}, {MAX_ROUTER_ID}]")]
    RouterId(i64),
    #[error("port {0} outside [{MIN_PORT}, {MAX_PORT}]")]
    Port(i64),
}

/// A router identifier in [1, 64000]. Used as the routing table's key and as
/// `from_router_id` / destination id on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouterId(u16);

impl RouterId {
    pub fn new(value: u16) -> Result<Self, RangeError> {
        if (MIN_ROUTER_ID..=MAX_ROUTER_ID).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RangeError::RouterId(value as i64))
        }
    }

    /// Builds from a value that has already round-tripped through the wire
    /// codec's 16-bit field (see `wire::encode_router_id`/`decode_router_id`);
    /// the caller is responsible for range-checking before this is called.
    pub(crate) fn from_validated(value: u16) -> Self {
        debug_assert!((MIN_ROUTER_ID..=MAX_ROUTER_ID).contains(&value));
        Self(value)
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for RouterId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.0)
    }
}

impl<'de> Deserialize<'de> for RouterId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u16::deserialize(deserializer)?;
        RouterId::new(raw).map_err(serde::de::Error::custom)
    }
}

/// A UDP port in [1024, 64000].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port(u16);

impl Port {
    pub fn new(value: u16) -> Result<Self, RangeError> {
        if (MIN_PORT..=MAX_PORT).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RangeError::Port(value as i64))
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A route cost in [0, 16]. Arithmetic saturates at the reachability ceiling
/// rather than overflowing or panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cost(u8);

impl Cost {
    pub const INFINITY: Cost = Cost(INFINITY);
    pub const ZERO: Cost = Cost(0);

    /// Saturates any input to [0, 16]. Negative raw wire values are the one
    /// case the codec rejects outright rather than saturating (see
    /// `wire::decode_cost`); everything else funnels through here.
    pub fn saturating(raw: i64) -> Self {
        let clamped = raw.clamp(0, INFINITY as i64);
        Cost(clamped as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_unreachable(self) -> bool {
        self.0 >= INFINITY
    }

    /// `a ⊕ b = min(a + b, 16)`.
    pub fn saturating_add(self, other: Cost) -> Cost {
        Cost::saturating(self.0 as i64 + other.0 as i64)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Cost {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Cost {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        if raw > INFINITY {
            return Err(serde::de::Error::custom(format!(
                "cost {raw} outside [0, {INFINITY}]"
            )));
        }
        Ok(Cost(raw))
    }
}
