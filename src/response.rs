use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AckError, SendError};
use crate::event::EventData;

/// Error message the transmission attaches to an event dropped by sampling.
pub(crate) const SAMPLING_DROP_MESSAGE: &str = "event dropped due to sampling";

/// Status codes the collector uses to accept an event.
const ACCEPTED_STATUS_CODES: [u16; 2] = [200, 202];

/// One acknowledgment from the transmission engine, reporting the outcome of
/// a previously submitted event. Batches of these arrive on the response
/// channel in arbitrary order relative to submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckRecord {
    /// Matches the pending event this acknowledgment belongs to. Absent on
    /// untracked sends; an unknown id means the event already settled.
    pub correlation_id: Option<Uuid>,

    /// HTTP status the collector returned for this event, when it was
    /// reached at all.
    pub status_code: Option<u16>,

    /// Delivery failure, queue overflow, or sampling drop.
    pub error: Option<AckError>,

    /// Wall-clock milliseconds the delivery attempt took.
    pub duration_ms: Option<f64>,

    /// Response body for this event, when the collector returned one.
    pub body: Option<serde_json::Value>,
}

impl AckRecord {
    pub fn success(correlation_id: Uuid, status_code: u16) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            status_code: Some(status_code),
            error: None,
            duration_ms: None,
            body: None,
        }
    }

    pub fn error(correlation_id: Option<Uuid>, error: AckError) -> Self {
        Self {
            correlation_id,
            status_code: None,
            error: Some(error),
            duration_ms: None,
            body: None,
        }
    }
}

/// Successful outcome of a submitted event.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// The collector accepted the event; carries the full acknowledgment.
    Delivered(AckRecord),

    /// The event was intentionally dropped by sampling policy. A success,
    /// not a failure.
    Dropped,

    /// The event was forwarded without correlation tracking and no
    /// acknowledgment was awaited; carries the raw submitted payload.
    Untracked(EventData),
}

/// Classify one acknowledgment record into its settlement outcome.
///
/// Total over all reachable record shapes:
/// - an error whose message matches the sampling-drop pattern resolves as
///   [`Settlement::Dropped`];
/// - any other error rejects with that error, unmodified;
/// - no error and an accepted status code (200, 202) resolves with the full
///   record;
/// - no error and any other status rejects with a message naming the code.
pub fn classify(record: AckRecord) -> Result<Settlement, SendError> {
    match (&record.error, record.status_code) {
        (Some(error), _) if error.message.contains(SAMPLING_DROP_MESSAGE) => {
            Ok(Settlement::Dropped)
        }
        (Some(error), _) => Err(SendError::Delivery(error.clone())),
        (None, Some(code)) if ACCEPTED_STATUS_CODES.contains(&code) => {
            Ok(Settlement::Delivered(record))
        }
        (None, status) => Err(SendError::UnexpectedStatus(status)),
    }
}
