//! Domain model of the seat inventory engine: segments, inventory rows, holds,
//! and the ports the application layer drives.

pub mod catalog;
pub mod inventory;
pub mod ports;
pub mod preorder;
