use super::inventory::{InventoryKey, Quantity};
use crate::error::{ReservationError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PreorderId(Uuid);

impl PreorderId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl From<Uuid> for PreorderId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for PreorderId {
    type Err = ReservationError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ReservationError::InvalidRequest(format!("bad preorder id {s:?}: {e}")))
    }
}

impl fmt::Display for PreorderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a hold. `Active` is the only non-terminal state.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PreorderStatus {
    Active,
    Confirmed,
    Canceled,
    Expired,
}

impl PreorderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    pub fn can_transition_to(&self, next: PreorderStatus) -> bool {
        matches!(self, Self::Active) && next.is_terminal()
    }
}

impl fmt::Display for PreorderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Confirmed => "confirmed",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Everything needed to persist a fresh hold; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPreorder {
    pub requester: String,
    pub key: InventoryKey,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A requester's time-boxed claim on seats of one inventory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preorder {
    pub id: PreorderId,
    pub requester: String,
    pub key: InventoryKey,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: PreorderStatus,
}

impl Preorder {
    pub fn activate(id: PreorderId, new: NewPreorder) -> Self {
        Self {
            id,
            requester: new.requester,
            key: new.key,
            quantity: new.quantity,
            created_at: new.created_at,
            expires_at: new.expires_at,
            status: PreorderStatus::Active,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Guarded status change: only applies when the current status equals `from`.
    ///
    /// Callers hold whatever row-level exclusion their store provides.
    pub fn transition(&mut self, from: PreorderStatus, to: PreorderStatus) -> Result<()> {
        if !from.can_transition_to(to) {
            return Err(ReservationError::InvalidRequest(format!(
                "illegal transition {from} -> {to}"
            )));
        }
        if self.status != from {
            return Err(ReservationError::Conflict(format!(
                "preorder {} is {}, expected {}",
                self.id, self.status, from
            )));
        }
        self.status = to;
        Ok(())
    }
}
