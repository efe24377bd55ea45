#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use seat_hold::application::coordinator::{HoldRequest, ReservationCoordinator};
use seat_hold::application::sweeper::ExpirySweeper;
use seat_hold::config::EngineConfig;
use seat_hold::domain::inventory::SeatClass;
use seat_hold::domain::ports::{InventoryLedgerRef, PreorderStoreRef};
use seat_hold::infrastructure::clock::ManualClock;
use seat_hold::infrastructure::in_memory::{InMemoryInventoryLedger, InMemoryPreorderStore};
use seat_hold::interfaces::catalog_file::{MaterializedCatalog, ServiceRecord};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub const TRAIN: &str = "D5";

pub fn travel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()
}

pub fn start_time() -> DateTime<Utc> {
    "2025-09-20T08:00:00Z".parse().unwrap()
}

/// D5 on `travel_date()`, BJP -> JNX -> SHH, with `capacity` second-class seats.
pub fn service(capacity: u32) -> ServiceRecord {
    ServiceRecord {
        train_no: TRAIN.to_string(),
        date: travel_date(),
        stops: vec!["BJP".to_string(), "JNX".to_string(), "SHH".to_string()],
        seats: BTreeMap::from([("second".to_string(), i64::from(capacity))]),
    }
}

pub fn hold_request(requester: &str) -> HoldRequest {
    HoldRequest {
        requester: requester.to_string(),
        train_no: TRAIN.to_string(),
        date: travel_date(),
        from: "BJP".to_string(),
        to: "SHH".to_string(),
        seat_class: SeatClass::new("second").unwrap(),
    }
}

/// Everything a test needs to drive and inspect one engine instance.
pub struct Harness {
    pub coordinator: Arc<ReservationCoordinator>,
    pub sweeper: ExpirySweeper,
    pub ledger: InventoryLedgerRef,
    pub store: PreorderStoreRef,
    pub clock: ManualClock,
}

pub fn harness(capacity: u32) -> Harness {
    let (catalog, ledger) = MaterializedCatalog::from_records([service(capacity)])
        .unwrap()
        .into_adapters()
        .unwrap();
    let ledger: InventoryLedgerRef = Arc::new(ledger);
    harness_with(ledger, Arc::new(InMemoryPreorderStore::new()), catalog)
}

pub fn harness_with(
    ledger: InventoryLedgerRef,
    store: PreorderStoreRef,
    catalog: seat_hold::infrastructure::in_memory::InMemorySegmentCatalog,
) -> Harness {
    let clock = ManualClock::new(start_time());
    let coordinator = ReservationCoordinator::new(
        Arc::new(catalog),
        ledger.clone(),
        store.clone(),
        Arc::new(clock.clone()),
        &EngineConfig::default(),
    );
    let sweeper = ExpirySweeper::new(store.clone(), ledger.clone(), Arc::new(clock.clone()));
    Harness {
        coordinator: Arc::new(coordinator),
        sweeper,
        ledger,
        store,
        clock,
    }
}

/// Builds the adapters for `capacity` seats without wiring a coordinator.
pub fn adapters(
    capacity: u32,
) -> (
    seat_hold::infrastructure::in_memory::InMemorySegmentCatalog,
    InMemoryInventoryLedger,
) {
    MaterializedCatalog::from_records([service(capacity)])
        .unwrap()
        .into_adapters()
        .unwrap()
}

pub fn write_catalog(path: &Path, capacity: u32) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write!(
        file,
        r#"[{{"train_no": "D5", "date": "2025-10-01", "stops": ["BJP", "JNX", "SHH"], "seats": {{"second": {capacity}}}}}]"#
    )
}
