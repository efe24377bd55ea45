use crate::application::coordinator::HoldRequest;
use crate::domain::inventory::SeatClass;
use crate::error::{ReservationError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Hold,
    Cancel,
    Confirm,
    Sweep,
}

/// One raw CSV row: `op, requester, train, date, from, to, class, hold[, at]`.
///
/// `hold` is a caller-chosen label naming the preorder a `hold` row creates, so later
/// rows can cancel or confirm it. `at` pins the replay clock when one is in use.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct RequestRecord {
    pub op: RequestType,
    #[serde(default)]
    pub requester: Option<String>,
    #[serde(default)]
    pub train: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub hold: Option<String>,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

/// A validated request, ready for the batch driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Hold {
        label: Option<String>,
        request: HoldRequest,
    },
    Cancel {
        label: String,
        requester: String,
    },
    Confirm {
        label: String,
        requester: String,
    },
    Sweep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledRequest {
    pub at: Option<DateTime<Utc>>,
    pub request: Request,
}

fn required<T>(value: Option<T>, field: &str, op: RequestType) -> Result<T> {
    value.ok_or_else(|| {
        ReservationError::InvalidRequest(format!("{op:?} request is missing `{field}`"))
    })
}

impl TryFrom<RequestRecord> for ScheduledRequest {
    type Error = ReservationError;

    fn try_from(record: RequestRecord) -> Result<Self> {
        let op = record.op;
        let request = match op {
            RequestType::Hold => Request::Hold {
                label: record.hold,
                request: HoldRequest {
                    requester: required(record.requester, "requester", op)?,
                    train_no: required(record.train, "train", op)?,
                    date: required(record.date, "date", op)?,
                    from: required(record.from, "from", op)?,
                    to: required(record.to, "to", op)?,
                    seat_class: SeatClass::new(required(record.class, "class", op)?)?,
                },
            },
            RequestType::Cancel => Request::Cancel {
                label: required(record.hold, "hold", op)?,
                requester: required(record.requester, "requester", op)?,
            },
            RequestType::Confirm => Request::Confirm {
                label: required(record.hold, "hold", op)?,
                requester: required(record.requester, "requester", op)?,
            },
            RequestType::Sweep => Request::Sweep,
        };
        Ok(Self {
            at: record.at,
            request,
        })
    }
}

/// Reads booking requests from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths, so
/// trailing optional columns may be left off.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    /// Creates a new `RequestReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and validates requests.
    pub fn requests(self) -> impl Iterator<Item = Result<ScheduledRequest>> {
        self.reader.into_deserialize().map(|result| {
            result
                .map_err(ReservationError::from)
                .and_then(|record: RequestRecord| ScheduledRequest::try_from(record))
        })
    }
}
