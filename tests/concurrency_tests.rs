mod common;

use async_trait::async_trait;
use common::{adapters, harness, harness_with, hold_request};
use seat_hold::application::sweeper::SweepReport;
use seat_hold::domain::catalog::SegmentRef;
use seat_hold::domain::inventory::{
    InventoryKey, Quantity, ReservationToken, SeatClass, SeatClassInventory,
};
use seat_hold::domain::ports::InventoryLedger;
use seat_hold::domain::preorder::PreorderStatus;
use seat_hold::error::{ReservationError, Result};
use seat_hold::infrastructure::in_memory::{InMemoryInventoryLedger, InMemoryPreorderStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts releases on top of a real ledger.
struct CountingLedger {
    inner: InMemoryInventoryLedger,
    releases: AtomicUsize,
}

#[async_trait]
impl InventoryLedger for CountingLedger {
    async fn try_reserve(
        &self,
        key: &InventoryKey,
        quantity: Quantity,
    ) -> Result<ReservationToken> {
        self.inner.try_reserve(key, quantity).await
    }

    async fn release(&self, key: &InventoryKey, quantity: Quantity) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release(key, quantity).await
    }

    async fn inventory(&self, key: &InventoryKey) -> Result<Option<SeatClassInventory>> {
        self.inner.inventory(key).await
    }

    async fn availability(&self, segment: &SegmentRef) -> Result<BTreeMap<SeatClass, u32>> {
        self.inner.availability(segment).await
    }

    async fn snapshot(&self) -> Result<Vec<(InventoryKey, SeatClassInventory)>> {
        self.inner.snapshot().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_holds_never_oversell() {
    const CAPACITY: u32 = 20;
    const EXTRA: u32 = 30;
    let h = harness(CAPACITY);

    let mut tasks = Vec::new();
    for i in 0..CAPACITY + EXTRA {
        let coordinator = h.coordinator.clone();
        tasks.push(tokio::spawn(async move {
            coordinator
                .create_default_hold(&hold_request(&format!("user-{i}")))
                .await
        }));
    }

    let mut held = 0;
    let mut sold_out = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => held += 1,
            Err(ReservationError::InsufficientInventory { .. }) => sold_out += 1,
            Err(other) => panic!("unexpected error {other}"),
        }
    }

    assert_eq!(held, CAPACITY);
    assert_eq!(sold_out, EXTRA);
    let snapshot = h.coordinator.inventory_snapshot().await.unwrap();
    let full = snapshot
        .iter()
        .find(|(key, _)| key.segment.from == "BJP" && key.segment.to == "SHH")
        .unwrap();
    assert_eq!(full.1.held, CAPACITY);
    assert!(snapshot.iter().all(|(_, inv)| inv.held <= inv.capacity));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_sweep_releases_once() {
    for _ in 0..50 {
        let (catalog, inner) = adapters(1);
        let ledger = Arc::new(CountingLedger {
            inner,
            releases: AtomicUsize::new(0),
        });
        let h = harness_with(ledger.clone(), Arc::new(InMemoryPreorderStore::new()), catalog);

        let hold = h
            .coordinator
            .create_default_hold(&hold_request("alice"))
            .await
            .unwrap();
        h.clock.set(hold.expires_at);

        let coordinator = h.coordinator.clone();
        let cancel =
            tokio::spawn(async move { coordinator.cancel_hold(hold.preorder_id, "alice").await });
        let sweeper = h.sweeper.clone();
        let sweep = tokio::spawn(async move { sweeper.sweep_once().await });

        let canceled = cancel.await.unwrap();
        let report: SweepReport = sweep.await.unwrap().unwrap();

        assert_eq!(ledger.releases.load(Ordering::SeqCst), 1);
        let status = h.coordinator.get_preorder(hold.preorder_id).await.unwrap().status;
        match status {
            PreorderStatus::Canceled => {
                assert!(canceled.is_ok());
                assert_eq!(report.expired, 0);
            }
            PreorderStatus::Expired => {
                assert!(matches!(canceled, Err(ReservationError::Conflict(_))));
                assert_eq!(report.expired, 1);
            }
            other => panic!("unexpected status {other:?}"),
        }

        let key = h
            .coordinator
            .inventory_snapshot()
            .await
            .unwrap()
            .into_iter()
            .find(|(key, _)| key.segment.from == "BJP" && key.segment.to == "SHH")
            .unwrap();
        assert_eq!(key.1.held, 0);
    }
}

#[tokio::test]
async fn test_last_seat_cancel_then_retry() {
    let h = harness(1);

    let first = h
        .coordinator
        .create_default_hold(&hold_request("alice"))
        .await
        .unwrap();
    let sold_out = h.coordinator.create_default_hold(&hold_request("bob")).await;
    assert!(matches!(
        sold_out,
        Err(ReservationError::InsufficientInventory { available: 0, .. })
    ));

    h.coordinator
        .cancel_hold(first.preorder_id, "alice")
        .await
        .unwrap();
    assert!(
        h.coordinator
            .create_default_hold(&hold_request("bob"))
            .await
            .is_ok()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_double_cancel_single_release() {
    let (catalog, inner) = adapters(2);
    let ledger = Arc::new(CountingLedger {
        inner,
        releases: AtomicUsize::new(0),
    });
    let h = harness_with(ledger.clone(), Arc::new(InMemoryPreorderStore::new()), catalog);
    let hold = h
        .coordinator
        .create_default_hold(&hold_request("alice"))
        .await
        .unwrap();

    let a = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.cancel_hold(hold.preorder_id, "alice").await })
    };
    let b = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.cancel_hold(hold.preorder_id, "alice").await })
    };
    let results = [a.await.unwrap(), b.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(ledger.releases.load(Ordering::SeqCst), 1);
}
