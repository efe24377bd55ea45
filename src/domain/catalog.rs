use crate::error::{ReservationError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Canonical identifier of one origin→destination leg of a train service on a date.
///
/// Ordering is by train, date, then stations, which gives reports a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentRef {
    pub train_no: String,
    pub date: NaiveDate,
    pub from: String,
    pub to: String,
}

impl fmt::Display for SegmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {}->{}", self.train_no, self.date, self.from, self.to)
    }
}

/// A train number running on one calendar date, with its ordered stops.
///
/// Immutable once built; every ordered stop pair is a bookable segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainServiceInstance {
    train_no: String,
    date: NaiveDate,
    stops: Vec<String>,
}

impl TrainServiceInstance {
    pub fn new(train_no: impl Into<String>, date: NaiveDate, stops: Vec<String>) -> Result<Self> {
        let train_no = train_no.into();
        if train_no.trim().is_empty() {
            return Err(ReservationError::InvalidRequest(
                "train number must not be empty".to_string(),
            ));
        }
        if stops.len() < 2 {
            return Err(ReservationError::InvalidRequest(format!(
                "service {train_no}@{date} needs at least two stops"
            )));
        }
        let mut seen = HashSet::with_capacity(stops.len());
        if let Some(dup) = stops.iter().find(|s| !seen.insert(s.as_str())) {
            return Err(ReservationError::InvalidRequest(format!(
                "service {train_no}@{date} visits {dup} twice"
            )));
        }

        Ok(Self {
            train_no,
            date,
            stops,
        })
    }

    pub fn train_no(&self) -> &str {
        &self.train_no
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn stops(&self) -> &[String] {
        &self.stops
    }

    /// Returns the segment between two stops when `from` strictly precedes `to`.
    pub fn segment(&self, from: &str, to: &str) -> Option<SegmentRef> {
        let from_idx = self.stops.iter().position(|s| s == from)?;
        let to_idx = self.stops.iter().position(|s| s == to)?;
        (from_idx < to_idx).then(|| self.segment_at(from_idx, to_idx))
    }

    /// All forward stop pairs of this service.
    pub fn segments(&self) -> impl Iterator<Item = SegmentRef> + '_ {
        let n = self.stops.len();
        (0..n).flat_map(move |i| ((i + 1)..n).map(move |j| self.segment_at(i, j)))
    }

    fn segment_at(&self, from_idx: usize, to_idx: usize) -> SegmentRef {
        SegmentRef {
            train_no: self.train_no.clone(),
            date: self.date,
            from: self.stops[from_idx].clone(),
            to: self.stops[to_idx].clone(),
        }
    }
}
