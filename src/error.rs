use crate::domain::inventory::InventoryKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReservationError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Insufficient inventory for {key}: requested {requested}, available {available}")]
    InsufficientInventory {
        key: InventoryKey,
        requested: u32,
        available: u32,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl ReservationError {
    /// Outcomes that are part of normal operation under contention or bad input,
    /// as opposed to faults in the engine or its storage.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::InsufficientInventory { .. }
                | Self::Conflict(_)
                | Self::InvalidRequest(_)
        )
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for ReservationError {
    fn from(err: rocksdb::Error) -> Self {
        Self::PersistenceFailure(err.into_string())
    }
}

pub type Result<T> = std::result::Result<T, ReservationError>;
