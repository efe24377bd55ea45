//! Edges of the engine: catalog materialization input, CSV request batches,
//! and the availability report.

pub mod batch;
pub mod catalog_file;
pub mod csv;
