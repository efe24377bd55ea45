use crate::domain::inventory::{InventoryKey, SeatClassInventory};
use crate::error::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize, PartialEq)]
struct AvailabilityRow<'a> {
    train: &'a str,
    date: NaiveDate,
    from: &'a str,
    to: &'a str,
    class: &'a str,
    capacity: u32,
    held: u32,
    available: u32,
}

/// Writes ledger rows as `train,date,from,to,class,capacity,held,available`.
pub struct AvailabilityWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AvailabilityWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes every row in the given order and flushes the sink.
    pub fn write_availability<'a, I>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a (InventoryKey, SeatClassInventory)>,
    {
        for (key, inventory) in rows {
            self.writer.serialize(AvailabilityRow {
                train: &key.segment.train_no,
                date: key.segment.date,
                from: &key.segment.from,
                to: &key.segment.to,
                class: key.seat_class.as_str(),
                capacity: inventory.capacity,
                held: inventory.held,
                available: inventory.remaining(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
