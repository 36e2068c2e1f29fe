//! Honeycomb event client where every submitted event settles exactly once.
//!
//! The underlying pipeline batches events and reports delivery outcomes out
//! of band, in acknowledgment batches of arbitrary order. This crate adds
//! the correlation layer on top: each submission gets an opaque correlation
//! id and a parked future, and a later acknowledgment — or a five-second
//! timeout, whichever comes first — settles that future exactly once.
//!
//! Delivery outcomes map onto settlement as follows: an accepted status
//! resolves with the full acknowledgment, an intentional sampling drop
//! resolves as [`Settlement::Dropped`] (a success, not a failure), a
//! delivery error or unexpected status rejects, and silence rejects with a
//! timeout after five seconds.
//!
//! ```no_run
//! use honeysink::{ClientConfig, EventData, HoneyClient, Settlement};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let client = HoneyClient::new(ClientConfig::new("YOUR_WRITE_KEY", "my-dataset"))?;
//!
//! let mut payload = EventData::new();
//! payload.insert("service_name".into(), "checkout".into());
//! payload.insert("duration_ms".into(), 154.2.into());
//!
//! match client.send_event(payload).await {
//!     Ok(Settlement::Delivered(ack)) => println!("accepted: {:?}", ack.status_code),
//!     Ok(Settlement::Dropped) => println!("dropped by sampling"),
//!     Ok(Settlement::Untracked(_)) => println!("sent without tracking"),
//!     Err(error) => eprintln!("delivery failed: {error}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
mod correlator;
pub mod error;
pub mod event;
pub mod response;
mod timer;
pub mod transmission;

pub use client::{HoneyClient, Settling};
pub use config::ClientConfig;
pub use error::{AckError, SendError};
pub use event::{EventData, EventEnvelope};
pub use response::{AckRecord, Settlement};
pub use transmission::{HttpTransport, Transmission, Transport};
