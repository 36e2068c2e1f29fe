use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error carried by an acknowledgment record.
///
/// The transmission engine attaches one of these when an event could not be
/// delivered: a transport failure, a queue-capacity drop, or a sampling drop.
/// Only the message is inspected downstream (sampling drops are recognized by
/// their message), so the type stays deliberately small.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct AckError {
    pub message: String,
}

impl AckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Terminal failure of a submitted event.
///
/// Every future returned by [`HoneyClient::send_event`](crate::HoneyClient::send_event)
/// settles exactly once; these are the rejection outcomes. `Timeout` is the
/// only locally-originated error, everything else carries what the
/// transmission reported.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SendError {
    /// No acknowledgment arrived within the 5-second window.
    #[error("Sending event to honeycomb.io timed out (5000ms)")]
    Timeout,

    /// The transmission reported a delivery failure; carries its error unmodified.
    #[error("{0}")]
    Delivery(AckError),

    /// The acknowledgment carried a status code outside the accepted set.
    #[error("Response from honeycomb.io was a {}", status_label(.0))]
    UnexpectedStatus(Option<u16>),

    /// The client was dropped before the event settled.
    #[error("client closed before the event settled")]
    ClientClosed,
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_is_literal() {
        assert_eq!(
            SendError::Timeout.to_string(),
            "Sending event to honeycomb.io timed out (5000ms)"
        );
    }

    #[test]
    fn unexpected_status_includes_code() {
        assert_eq!(
            SendError::UnexpectedStatus(Some(503)).to_string(),
            "Response from honeycomb.io was a 503"
        );
        assert_eq!(
            SendError::UnexpectedStatus(None).to_string(),
            "Response from honeycomb.io was a unknown"
        );
    }

    #[test]
    fn delivery_error_preserves_message() {
        let error = SendError::Delivery(AckError::new("connection refused"));
        assert_eq!(error.to_string(), "connection refused");
    }
}
