use crate::domain::catalog::TrainServiceInstance;
use crate::domain::inventory::{InventoryKey, SeatClass};
use crate::error::{ReservationError, Result};
use crate::infrastructure::in_memory::{InMemoryInventoryLedger, InMemorySegmentCatalog};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;

/// One materialized service as produced by the calendar generator.
///
/// Every seat class gets the same capacity on every segment of the service.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceRecord {
    pub train_no: String,
    pub date: NaiveDate,
    pub stops: Vec<String>,
    pub seats: BTreeMap<String, i64>,
}

/// Services plus their inventory rows, ready to back the catalog and ledger.
#[derive(Debug, Default)]
pub struct MaterializedCatalog {
    pub services: Vec<TrainServiceInstance>,
    pub inventory: Vec<(InventoryKey, u32)>,
}

impl MaterializedCatalog {
    /// Reads a JSON array of `ServiceRecord`s.
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let records: Vec<ServiceRecord> = serde_json::from_reader(source)?;
        Self::from_records(records)
    }

    pub fn from_records(records: impl IntoIterator<Item = ServiceRecord>) -> Result<Self> {
        let mut catalog = Self::default();
        for record in records {
            if record.seats.is_empty() {
                return Err(ReservationError::InvalidRequest(format!(
                    "service {}@{} has no seat classes",
                    record.train_no, record.date
                )));
            }
            let svc = TrainServiceInstance::new(record.train_no, record.date, record.stops)?;
            let classes = record
                .seats
                .into_iter()
                .map(|(class, capacity)| {
                    let capacity = u32::try_from(capacity).map_err(|_| {
                        ReservationError::InvalidRequest(format!(
                            "capacity {capacity} for class {class} is out of range"
                        ))
                    })?;
                    Ok((SeatClass::new(class)?, capacity))
                })
                .collect::<Result<Vec<_>>>()?;

            for segment in svc.segments() {
                for (class, capacity) in &classes {
                    catalog
                        .inventory
                        .push((InventoryKey::new(segment.clone(), class.clone()), *capacity));
                }
            }
            catalog.services.push(svc);
        }
        Ok(catalog)
    }

    pub fn into_adapters(self) -> Result<(InMemorySegmentCatalog, InMemoryInventoryLedger)> {
        Ok((
            InMemorySegmentCatalog::new(self.services)?,
            InMemoryInventoryLedger::new(self.inventory)?,
        ))
    }
}
