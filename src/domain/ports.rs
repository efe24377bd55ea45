use super::catalog::SegmentRef;
use super::inventory::{InventoryKey, Quantity, ReservationToken, SeatClass, SeatClassInventory};
use super::preorder::{NewPreorder, Preorder, PreorderId, PreorderStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only lookup of materialized train services and their segments.
#[async_trait]
pub trait SegmentCatalog: Send + Sync {
    /// Fails with `InvalidRequest` when `from == to`, and with `NotFound` when the
    /// service is unknown or the stations are not in forward travel order.
    async fn resolve_segment(
        &self,
        train_no: &str,
        date: NaiveDate,
        from: &str,
        to: &str,
    ) -> Result<SegmentRef>;
}

/// Owner of the per-row `held` counters.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Atomic check-and-increment scoped to one row. Never mutates on rejection.
    async fn try_reserve(&self, key: &InventoryKey, quantity: Quantity)
    -> Result<ReservationToken>;

    /// Decrements `held`, floored at zero. Exactly-once is the caller's job.
    async fn release(&self, key: &InventoryKey, quantity: Quantity) -> Result<()>;

    async fn inventory(&self, key: &InventoryKey) -> Result<Option<SeatClassInventory>>;

    /// Remaining seats per class on one segment.
    async fn availability(&self, segment: &SegmentRef) -> Result<BTreeMap<SeatClass, u32>>;

    async fn snapshot(&self) -> Result<Vec<(InventoryKey, SeatClassInventory)>>;
}

/// Durable record of holds. Status writes go through `transition` only.
#[async_trait]
pub trait PreorderStore: Send + Sync {
    async fn create(&self, preorder: NewPreorder) -> Result<PreorderId>;

    /// Compare-and-swap on status: succeeds only if the stored status equals `from`,
    /// otherwise `Conflict`. Returns the updated record.
    async fn transition(
        &self,
        id: PreorderId,
        from: PreorderStatus,
        to: PreorderStatus,
    ) -> Result<Preorder>;

    async fn get(&self, id: PreorderId) -> Result<Option<Preorder>>;

    /// Active preorders with `expires_at <= as_of`.
    async fn list_expired_active(&self, as_of: DateTime<Utc>) -> Result<Vec<Preorder>>;

    async fn list_active(&self) -> Result<Vec<Preorder>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SegmentCatalogRef = Arc<dyn SegmentCatalog>;
pub type InventoryLedgerRef = Arc<dyn InventoryLedger>;
pub type PreorderStoreRef = Arc<dyn PreorderStore>;
pub type ClockRef = Arc<dyn Clock>;
