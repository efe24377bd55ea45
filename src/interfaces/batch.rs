use super::csv::request_reader::{Request, ScheduledRequest};
use crate::application::coordinator::{Hold, ReservationCoordinator};
use crate::application::sweeper::{ExpirySweeper, SweepReport};
use crate::domain::preorder::PreorderId;
use crate::error::{ReservationError, Result};
use crate::infrastructure::clock::ManualClock;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Held(Hold),
    Canceled,
    Confirmed,
    Swept(SweepReport),
}

/// Feeds parsed requests through the coordinator, resolving hold labels to ids.
pub struct BatchDriver {
    coordinator: ReservationCoordinator,
    sweeper: ExpirySweeper,
    replay_clock: Option<ManualClock>,
    labels: HashMap<String, PreorderId>,
}

impl BatchDriver {
    /// `replay_clock`, when given, must be the clock the coordinator and sweeper read;
    /// rows carrying an `at` timestamp move it before they run.
    pub fn new(
        coordinator: ReservationCoordinator,
        sweeper: ExpirySweeper,
        replay_clock: Option<ManualClock>,
    ) -> Self {
        Self {
            coordinator,
            sweeper,
            replay_clock,
            labels: HashMap::new(),
        }
    }

    pub fn coordinator(&self) -> &ReservationCoordinator {
        &self.coordinator
    }

    pub fn preorder_id(&self, label: &str) -> Option<PreorderId> {
        self.labels.get(label).copied()
    }

    pub async fn process(&mut self, scheduled: ScheduledRequest) -> Result<Outcome> {
        if let (Some(clock), Some(at)) = (&self.replay_clock, scheduled.at) {
            clock.set(at);
        }

        match scheduled.request {
            Request::Hold { label, request } => {
                if let Some(label) = &label
                    && self.labels.contains_key(label)
                {
                    return Err(ReservationError::InvalidRequest(format!(
                        "hold label {label} already used"
                    )));
                }
                let hold = self.coordinator.create_default_hold(&request).await?;
                if let Some(label) = label {
                    self.labels.insert(label, hold.preorder_id);
                }
                Ok(Outcome::Held(hold))
            }
            Request::Cancel { label, requester } => {
                let id = self.resolve(&label)?;
                self.coordinator.cancel_hold(id, &requester).await?;
                Ok(Outcome::Canceled)
            }
            Request::Confirm { label, requester } => {
                let id = self.resolve(&label)?;
                self.coordinator.confirm_hold(id, &requester).await?;
                Ok(Outcome::Confirmed)
            }
            Request::Sweep => Ok(Outcome::Swept(self.sweeper.sweep_once().await?)),
        }
    }

    fn resolve(&self, label: &str) -> Result<PreorderId> {
        self.preorder_id(label)
            .ok_or_else(|| ReservationError::NotFound(format!("hold label {label}")))
    }
}
