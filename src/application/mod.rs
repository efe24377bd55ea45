//! Application layer containing the reservation orchestration.
//!
//! `ReservationCoordinator` is the entry point for placing, canceling and confirming
//! holds. `ExpirySweeper` runs beside it as a background task, reclaiming seats from
//! holds whose deadline passed.

pub mod coordinator;
pub mod sweeper;
