use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use anyhow::Result;
use tokio::sync::oneshot;

use crate::config::ClientConfig;
use crate::correlator::{Correlator, SettleResult};
use crate::error::SendError;
use crate::event::{EventData, EventEnvelope};
use crate::response::Settlement;
use crate::transmission::{HttpTransport, Transmission, Transport};

/// Honeycomb event client where every submitted event settles exactly once.
///
/// Wraps the batching transmission engine so that [`send_event`](Self::send_event)
/// returns a future resolved by the event's delivery acknowledgment, a
/// sampling drop, or — after five seconds without either — a timeout
/// rejection. Must be constructed inside a tokio runtime.
pub struct HoneyClient {
    config: ClientConfig,
    correlator: Arc<Correlator>,
    transmission: Transmission,
}

impl HoneyClient {
    /// Create a client delivering over HTTP to the configured collector.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Create a client with a caller-provided transport. This is the seam
    /// tests use to script acknowledgments without a network.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let correlator = Arc::new(Correlator::new());
        let (transmission, mut responses) = Transmission::start(&config, transport);

        // Pump acknowledgment batches into the correlator until the engine
        // closes the channel.
        let dispatcher = Arc::clone(&correlator);
        tokio::spawn(async move {
            while let Some(batch) = responses.recv().await {
                dispatcher.handle_batch(batch);
            }
            tracing::debug!("Acknowledgment channel closed, dispatcher stopping");
        });

        Ok(Self {
            config,
            correlator,
            transmission,
        })
    }

    /// Submit one event.
    ///
    /// Registration, timeout arming, and the enqueue all happen before this
    /// returns; the returned future only waits for the settlement. It
    /// settles exactly once, within roughly five seconds.
    #[must_use = "the returned future resolves to the event's delivery outcome"]
    pub fn send_event(&self, data: EventData) -> Settling {
        match self.correlator.register() {
            Some((id, settled)) => {
                let envelope = EventEnvelope::new(data, &self.config.dataset, Some(id));
                tracing::debug!(
                    correlation_id = %id,
                    dataset = %envelope.dataset,
                    "Submitting event"
                );
                self.transmission.enqueue(envelope);
                Settling::pending(settled)
            }
            None => {
                // Collision fallback: forward untracked and settle now.
                let envelope = EventEnvelope::new(data.clone(), &self.config.dataset, None);
                self.transmission.enqueue(envelope);
                Settling::ready(Ok(Settlement::Untracked(data)))
            }
        }
    }

    /// Number of submitted events still awaiting settlement.
    pub fn pending_events(&self) -> usize {
        self.correlator.pending_count()
    }
}

/// Future returned by [`HoneyClient::send_event`].
///
/// Resolves with the event's [`Settlement`] or rejects with a [`SendError`];
/// never hangs past the timeout window.
#[must_use = "futures do nothing unless awaited"]
pub struct Settling {
    settled: oneshot::Receiver<SettleResult>,
}

impl Settling {
    fn pending(settled: oneshot::Receiver<SettleResult>) -> Self {
        Self { settled }
    }

    fn ready(result: SettleResult) -> Self {
        let (settle, settled) = oneshot::channel();
        let _ = settle.send(result);
        Self { settled }
    }
}

impl Future for Settling {
    type Output = Result<Settlement, SendError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.settled).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(SendError::ClientClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}
