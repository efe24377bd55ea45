use crate::domain::catalog::{SegmentRef, TrainServiceInstance};
use crate::domain::inventory::{
    InventoryKey, Quantity, ReservationToken, SeatClass, SeatClassInventory,
};
use crate::domain::ports::{InventoryLedger, PreorderStore, SegmentCatalog};
use crate::domain::preorder::{NewPreorder, Preorder, PreorderId, PreorderStatus};
use crate::error::{ReservationError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Catalog of materialized services keyed by (train number, date).
///
/// Built once at startup and never mutated, so lookups need no locking.
#[derive(Default, Clone)]
pub struct InMemorySegmentCatalog {
    services: Arc<HashMap<(String, NaiveDate), TrainServiceInstance>>,
}

impl InMemorySegmentCatalog {
    pub fn new(services: impl IntoIterator<Item = TrainServiceInstance>) -> Result<Self> {
        let mut map = HashMap::new();
        for svc in services {
            let key = (svc.train_no().to_string(), svc.date());
            if map.contains_key(&key) {
                return Err(ReservationError::InvalidRequest(format!(
                    "service {}@{} materialized twice",
                    key.0, key.1
                )));
            }
            map.insert(key, svc);
        }
        Ok(Self {
            services: Arc::new(map),
        })
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[async_trait]
impl SegmentCatalog for InMemorySegmentCatalog {
    async fn resolve_segment(
        &self,
        train_no: &str,
        date: NaiveDate,
        from: &str,
        to: &str,
    ) -> Result<SegmentRef> {
        if from == to {
            return Err(ReservationError::InvalidRequest(
                "departure and destination cannot be the same".to_string(),
            ));
        }
        let svc = self
            .services
            .get(&(train_no.to_string(), date))
            .ok_or_else(|| {
                ReservationError::NotFound(format!("train service {train_no}@{date}"))
            })?;
        svc.segment(from, to).ok_or_else(|| {
            ReservationError::NotFound(format!("segment {from}->{to} on {train_no}@{date}"))
        })
    }
}

struct InventoryRow {
    capacity: u32,
    held: AtomicU32,
}

impl InventoryRow {
    fn view(&self) -> SeatClassInventory {
        SeatClassInventory {
            capacity: self.capacity,
            held: self.held.load(Ordering::Acquire),
        }
    }
}

/// Ledger of per-row atomic counters.
///
/// The row set is fixed at construction; each `held` counter is updated with a
/// compare-and-swap loop, so rows never contend with one another.
#[derive(Default, Clone)]
pub struct InMemoryInventoryLedger {
    rows: Arc<HashMap<InventoryKey, InventoryRow>>,
}

impl InMemoryInventoryLedger {
    pub fn new(rows: impl IntoIterator<Item = (InventoryKey, u32)>) -> Result<Self> {
        let mut map = HashMap::new();
        for (key, capacity) in rows {
            if capacity == 0 {
                return Err(ReservationError::InvalidRequest(format!(
                    "capacity for {key} must be positive"
                )));
            }
            if map.contains_key(&key) {
                return Err(ReservationError::InvalidRequest(format!(
                    "inventory row {key} defined twice"
                )));
            }
            map.insert(
                key,
                InventoryRow {
                    capacity,
                    held: AtomicU32::new(0),
                },
            );
        }
        Ok(Self {
            rows: Arc::new(map),
        })
    }

    fn row(&self, key: &InventoryKey) -> Result<&InventoryRow> {
        self.rows
            .get(key)
            .ok_or_else(|| ReservationError::NotFound(format!("inventory {key}")))
    }
}

#[async_trait]
impl InventoryLedger for InMemoryInventoryLedger {
    async fn try_reserve(
        &self,
        key: &InventoryKey,
        quantity: Quantity,
    ) -> Result<ReservationToken> {
        let row = self.row(key)?;
        let requested = quantity.value();
        row.held
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| {
                held.checked_add(requested)
                    .filter(|next| *next <= row.capacity)
            })
            .map(|_| ReservationToken {
                key: key.clone(),
                quantity,
            })
            .map_err(|held| ReservationError::InsufficientInventory {
                key: key.clone(),
                requested,
                available: row.capacity.saturating_sub(held),
            })
    }

    async fn release(&self, key: &InventoryKey, quantity: Quantity) -> Result<()> {
        let row = self.row(key)?;
        // Closure always returns Some, so this cannot fail.
        let _ = row
            .held
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| {
                Some(held.saturating_sub(quantity.value()))
            });
        Ok(())
    }

    async fn inventory(&self, key: &InventoryKey) -> Result<Option<SeatClassInventory>> {
        Ok(self.rows.get(key).map(InventoryRow::view))
    }

    async fn availability(&self, segment: &SegmentRef) -> Result<BTreeMap<SeatClass, u32>> {
        Ok(self
            .rows
            .iter()
            .filter(|(key, _)| &key.segment == segment)
            .map(|(key, row)| (key.seat_class.clone(), row.view().remaining()))
            .collect())
    }

    async fn snapshot(&self) -> Result<Vec<(InventoryKey, SeatClassInventory)>> {
        let mut rows: Vec<_> = self
            .rows
            .iter()
            .map(|(key, row)| (key.clone(), row.view()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows)
    }
}

/// A thread-safe in-memory preorder store.
///
/// Backed by a sharded `DashMap`; a status transition holds only the shard guard of
/// its own row for the duration of the compare-and-swap.
#[derive(Default, Clone)]
pub struct InMemoryPreorderStore {
    preorders: Arc<DashMap<PreorderId, Preorder>>,
}

impl InMemoryPreorderStore {
    /// Creates a new, empty in-memory preorder store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreorderStore for InMemoryPreorderStore {
    async fn create(&self, preorder: NewPreorder) -> Result<PreorderId> {
        let id = PreorderId::new_v4();
        match self.preorders.entry(id) {
            Entry::Occupied(_) => Err(ReservationError::Conflict(format!(
                "preorder id {id} already allocated"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(Preorder::activate(id, preorder));
                Ok(id)
            }
        }
    }

    async fn transition(
        &self,
        id: PreorderId,
        from: PreorderStatus,
        to: PreorderStatus,
    ) -> Result<Preorder> {
        let mut entry = self
            .preorders
            .get_mut(&id)
            .ok_or_else(|| ReservationError::NotFound(format!("preorder {id}")))?;
        entry.transition(from, to)?;
        Ok(entry.value().clone())
    }

    async fn get(&self, id: PreorderId) -> Result<Option<Preorder>> {
        Ok(self.preorders.get(&id).map(|p| p.value().clone()))
    }

    async fn list_expired_active(&self, as_of: DateTime<Utc>) -> Result<Vec<Preorder>> {
        Ok(self
            .preorders
            .iter()
            .filter(|p| p.status == PreorderStatus::Active && p.is_expired_at(as_of))
            .map(|p| p.value().clone())
            .collect())
    }

    async fn list_active(&self) -> Result<Vec<Preorder>> {
        Ok(self
            .preorders
            .iter()
            .filter(|p| p.status == PreorderStatus::Active)
            .map(|p| p.value().clone())
            .collect())
    }
}
