use crate::domain::ports::{ClockRef, InventoryLedgerRef, PreorderStoreRef};
use crate::domain::preorder::PreorderStatus;
use crate::error::{ReservationError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Outcome of one sweep cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Preorders moved to `Expired` whose seat was released.
    pub expired: usize,
    /// Candidates already finalized by someone else.
    pub skipped: usize,
    /// Candidates that hit a storage or ledger error.
    pub failed: usize,
}

/// Reclaims seats from holds that outlived their expiry.
///
/// A seat is released only after this sweeper wins the `Active -> Expired`
/// transition, so a concurrent cancel or confirm can never cause a double release.
#[derive(Clone)]
pub struct ExpirySweeper {
    store: PreorderStoreRef,
    ledger: InventoryLedgerRef,
    clock: ClockRef,
}

impl ExpirySweeper {
    pub fn new(store: PreorderStoreRef, ledger: InventoryLedgerRef, clock: ClockRef) -> Self {
        Self {
            store,
            ledger,
            clock,
        }
    }

    pub async fn sweep_once(&self) -> Result<SweepReport> {
        self.sweep_at(self.clock.now()).await
    }

    /// Expires every active preorder with `expires_at <= now`.
    ///
    /// A failure on one candidate is logged and does not stop the cycle.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let candidates = self.store.list_expired_active(now).await?;
        let mut report = SweepReport::default();

        for candidate in candidates {
            let id = candidate.id;
            match self
                .store
                .transition(id, PreorderStatus::Active, PreorderStatus::Expired)
                .await
            {
                Ok(expired) => match self.ledger.release(&expired.key, expired.quantity).await {
                    Ok(()) => {
                        debug!(preorder_id = %id, key = %expired.key, "hold expired");
                        report.expired += 1;
                    }
                    Err(err) => {
                        error!(
                            preorder_id = %id,
                            key = %expired.key,
                            error = %err,
                            "preorder expired but its seat could not be released; manual reconciliation required"
                        );
                        report.failed += 1;
                    }
                },
                Err(ReservationError::Conflict(reason)) => {
                    debug!(preorder_id = %id, %reason, "expiry lost the race; skipping");
                    report.skipped += 1;
                }
                Err(err) => {
                    warn!(preorder_id = %id, error = %err, "failed to expire preorder");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Runs `sweep_once` every `interval` on a background task until shut down.
    pub fn spawn(self, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "expiry sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => match self.sweep_once().await {
                        Ok(report) if report.expired > 0 || report.failed > 0 => info!(
                            expired = report.expired,
                            skipped = report.skipped,
                            failed = report.failed,
                            "sweep cycle finished"
                        ),
                        Ok(_) => {}
                        Err(err) => error!(error = %err, "sweep cycle failed"),
                    },
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("expiry sweeper stopped");
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running sweeper task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop and waits for its current cycle to finish.
    pub async fn shutdown(self) -> Result<()> {
        // A send error means the task already exited; joining still reports how.
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| ReservationError::Internal(Box::new(e)))
    }
}
