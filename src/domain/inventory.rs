use super::catalog::SegmentRef;
use crate::error::{ReservationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A category of accommodation (e.g. "second", "first", "sleeper").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatClass(String);

impl SeatClass {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ReservationError::InvalidRequest(
                "seat class must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SeatClass {
    type Error = ReservationError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SeatClass> for String {
    fn from(class: SeatClass) -> Self {
        class.0
    }
}

impl fmt::Display for SeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A positive number of seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Self = Self(1);

    pub fn new(value: u32) -> Result<Self> {
        if value >= 1 {
            Ok(Self(value))
        } else {
            Err(ReservationError::InvalidRequest(
                "quantity must be at least 1".to_string(),
            ))
        }
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Quantity {
    type Error = ReservationError;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

/// Identifies one inventory row: a seat class on a segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryKey {
    pub segment: SegmentRef,
    pub seat_class: SeatClass,
}

impl InventoryKey {
    pub fn new(segment: SegmentRef, seat_class: SeatClass) -> Self {
        Self {
            segment,
            seat_class,
        }
    }
}

impl fmt::Display for InventoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.segment, self.seat_class)
    }
}

/// Point-in-time view of one inventory row.
///
/// `held` never exceeds `capacity`; `capacity` is fixed when the row is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatClassInventory {
    pub capacity: u32,
    pub held: u32,
}

impl SeatClassInventory {
    pub fn new(capacity: u32) -> Self {
        Self { capacity, held: 0 }
    }

    /// Seats still open to new requests.
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.held)
    }
}

/// Proof of a successful `try_reserve`, carrying what must be released to undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationToken {
    pub key: InventoryKey,
    pub quantity: Quantity,
}
