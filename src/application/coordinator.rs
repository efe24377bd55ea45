use crate::config::EngineConfig;
use crate::domain::catalog::SegmentRef;
use crate::domain::inventory::{
    InventoryKey, Quantity, ReservationToken, SeatClass, SeatClassInventory,
};
use crate::domain::ports::{ClockRef, InventoryLedgerRef, PreorderStoreRef, SegmentCatalogRef};
use crate::domain::preorder::{NewPreorder, Preorder, PreorderId, PreorderStatus};
use crate::error::{ReservationError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// A request to hold one seat of `seat_class` between two stops of a service.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldRequest {
    pub requester: String,
    pub train_no: String,
    pub date: NaiveDate,
    pub from: String,
    pub to: String,
    pub seat_class: SeatClass,
}

/// A successfully placed hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hold {
    pub preorder_id: PreorderId,
    pub expires_at: DateTime<Utc>,
}

/// Orchestrates segment resolution, inventory reservation and preorder persistence.
///
/// Every hold reserves exactly one seat. The coordinator is the only caller of
/// `InventoryLedger::try_reserve`; releases happen here and in the expiry sweeper,
/// each gated on a successful preorder status transition.
pub struct ReservationCoordinator {
    catalog: SegmentCatalogRef,
    ledger: InventoryLedgerRef,
    store: PreorderStoreRef,
    clock: ClockRef,
    hold_duration: Duration,
}

impl ReservationCoordinator {
    /// Creates a new `ReservationCoordinator` instance.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Resolves (train, date, from, to) to a segment.
    /// * `ledger` - Owns the seat counters.
    /// * `store` - Persists holds.
    /// * `clock` - Source of creation and expiry timestamps.
    /// * `config` - Supplies the default hold duration.
    pub fn new(
        catalog: SegmentCatalogRef,
        ledger: InventoryLedgerRef,
        store: PreorderStoreRef,
        clock: ClockRef,
        config: &EngineConfig,
    ) -> Self {
        Self {
            catalog,
            ledger,
            store,
            clock,
            hold_duration: config.hold_duration,
        }
    }

    /// Places a hold using the configured hold duration.
    pub async fn create_default_hold(&self, request: &HoldRequest) -> Result<Hold> {
        self.create_hold(request, self.hold_duration).await
    }

    /// Places a time-limited hold on one seat.
    ///
    /// A sold-out seat class yields `InsufficientInventory` and is not retried. If the
    /// preorder cannot be persisted the reserved seat is released before returning.
    pub async fn create_hold(
        &self,
        request: &HoldRequest,
        hold_duration: Duration,
    ) -> Result<Hold> {
        if request.requester.trim().is_empty() {
            return Err(ReservationError::InvalidRequest(
                "requester must not be empty".to_string(),
            ));
        }
        if hold_duration <= Duration::zero() {
            return Err(ReservationError::InvalidRequest(
                "hold duration must be positive".to_string(),
            ));
        }

        let segment = self
            .catalog
            .resolve_segment(&request.train_no, request.date, &request.from, &request.to)
            .await?;
        let key = InventoryKey::new(segment, request.seat_class.clone());

        let created_at = self.clock.now();
        let expires_at = created_at.checked_add_signed(hold_duration).ok_or_else(|| {
            ReservationError::InvalidRequest(format!(
                "hold duration {hold_duration} overflows the expiry timestamp"
            ))
        })?;

        let token = self.ledger.try_reserve(&key, Quantity::ONE).await?;
        let new = NewPreorder {
            requester: request.requester.clone(),
            key,
            quantity: token.quantity,
            created_at,
            expires_at,
        };

        match self.store.create(new).await {
            Ok(preorder_id) => {
                debug!(
                    %preorder_id,
                    key = %token.key,
                    requester = %request.requester,
                    "hold created"
                );
                Ok(Hold {
                    preorder_id,
                    expires_at,
                })
            }
            Err(err) => {
                self.compensate(&token, &err).await;
                Err(match err {
                    ReservationError::Conflict(_) | ReservationError::PersistenceFailure(_) => err,
                    other => ReservationError::PersistenceFailure(other.to_string()),
                })
            }
        }
    }

    /// Cancels an active hold owned by `requester` and returns its seat to the pool.
    pub async fn cancel_hold(&self, id: PreorderId, requester: &str) -> Result<()> {
        self.owned_preorder(id, requester).await?;

        let canceled = self
            .store
            .transition(id, PreorderStatus::Active, PreorderStatus::Canceled)
            .await?;

        if let Err(err) = self.ledger.release(&canceled.key, canceled.quantity).await {
            error!(
                preorder_id = %id,
                key = %canceled.key,
                error = %err,
                "preorder canceled but its seat could not be released; manual reconciliation required"
            );
            return Err(err);
        }
        debug!(preorder_id = %id, key = %canceled.key, "hold canceled");
        Ok(())
    }

    /// Finalizes an active hold. The seat stays consumed.
    ///
    /// A hold past its expiry is lost even if the sweeper has not reclaimed it yet.
    pub async fn confirm_hold(&self, id: PreorderId, requester: &str) -> Result<Preorder> {
        let preorder = self.owned_preorder(id, requester).await?;

        if preorder.status == PreorderStatus::Active && preorder.is_expired_at(self.clock.now()) {
            return Err(ReservationError::Conflict(format!(
                "preorder {id} expired at {}",
                preorder.expires_at
            )));
        }

        let confirmed = self
            .store
            .transition(id, PreorderStatus::Active, PreorderStatus::Confirmed)
            .await?;
        debug!(preorder_id = %id, key = %confirmed.key, "hold confirmed");
        Ok(confirmed)
    }

    pub async fn get_preorder(&self, id: PreorderId) -> Result<Preorder> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("preorder {id}")))
    }

    /// Remaining seats per class on a segment.
    pub async fn get_availability(
        &self,
        segment: &SegmentRef,
    ) -> Result<BTreeMap<SeatClass, u32>> {
        self.ledger.availability(segment).await
    }

    /// Resolves a segment, then reports its remaining seats per class.
    pub async fn availability_between(
        &self,
        train_no: &str,
        date: NaiveDate,
        from: &str,
        to: &str,
    ) -> Result<BTreeMap<SeatClass, u32>> {
        let segment = self.catalog.resolve_segment(train_no, date, from, to).await?;
        self.ledger.availability(&segment).await
    }

    pub async fn inventory_snapshot(&self) -> Result<Vec<(InventoryKey, SeatClassInventory)>> {
        self.ledger.snapshot().await
    }

    /// Re-applies every active preorder in the store to the ledger.
    ///
    /// Must run once at startup, before any hold is served, when the store outlives
    /// the process. Returns the number of holds restored.
    pub async fn recover(&self) -> Result<usize> {
        let active = self.store.list_active().await?;
        let mut restored = 0;
        for preorder in &active {
            match self.ledger.try_reserve(&preorder.key, preorder.quantity).await {
                Ok(_) => restored += 1,
                Err(err) => error!(
                    preorder_id = %preorder.id,
                    key = %preorder.key,
                    error = %err,
                    "active preorder could not be restored to the ledger"
                ),
            }
        }
        info!(restored, total = active.len(), "recovered active holds");
        Ok(restored)
    }

    async fn owned_preorder(&self, id: PreorderId, requester: &str) -> Result<Preorder> {
        match self.store.get(id).await? {
            Some(preorder) if preorder.requester == requester => Ok(preorder),
            Some(_) => {
                warn!(preorder_id = %id, requester, "preorder accessed by non-owner");
                Err(ReservationError::NotFound(format!("preorder {id}")))
            }
            None => Err(ReservationError::NotFound(format!("preorder {id}"))),
        }
    }

    async fn compensate(&self, token: &ReservationToken, cause: &ReservationError) {
        match self.ledger.release(&token.key, token.quantity).await {
            Ok(()) => warn!(
                key = %token.key,
                error = %cause,
                "preorder not persisted; seat released"
            ),
            Err(release_err) => error!(
                key = %token.key,
                error = %cause,
                release_error = %release_err,
                "preorder not persisted and compensating release failed; seat leaked, manual reconciliation required"
            ),
        }
    }
}
