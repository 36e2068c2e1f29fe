// ============================================================================
// Transmission engine
// ============================================================================
//
// The batching collaborator behind the correlation core. Events are enqueued
// fire-and-forget onto a bounded queue; a worker task accumulates them into
// batches (flushed on a size trigger or a time trigger, whichever first),
// applies sampling, groups by dataset, and hands batches to the transport.
// Every outcome — delivery status, transport failure, sampling drop, queue
// overflow — surfaces as acknowledgment records on the bounded response
// channel, never as a direct return value to the submitter.
//
// ============================================================================

pub mod transport;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::error::AckError;
use crate::event::EventEnvelope;
use crate::response::{AckRecord, SAMPLING_DROP_MESSAGE};

pub use transport::{HttpTransport, Transport};

/// Error message attached when the event queue is at capacity.
const QUEUE_OVERFLOW_MESSAGE: &str = "queue overflow";

/// Handle to a running transmission engine.
///
/// Dropping it closes the event queue; the worker flushes what it holds and
/// stops, after which the response channel closes too.
pub struct Transmission {
    event_tx: mpsc::Sender<EventEnvelope>,
    response_tx: mpsc::Sender<Vec<AckRecord>>,
}

impl Transmission {
    /// Start the engine and return it with the receiving half of the
    /// response channel.
    pub fn start(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> (Self, mpsc::Receiver<Vec<AckRecord>>) {
        let (event_tx, event_rx) = mpsc::channel(config.pending_work_capacity.max(1));
        let (response_tx, response_rx) = mpsc::channel(config.max_response_queue_size.max(1));

        let worker = BatchWorker {
            event_rx,
            response_tx: response_tx.clone(),
            transport,
            batch_size_trigger: config.batch_size_trigger.max(1),
            batch_time_trigger: Duration::from_millis(config.batch_time_trigger_ms),
            sample_rate: config.sample_rate,
            disabled: config.disabled,
            batch_permits: Arc::new(Semaphore::new(config.max_concurrent_batches.max(1))),
            buffer: Vec::new(),
        };
        tokio::spawn(worker.run());

        (
            Self {
                event_tx,
                response_tx,
            },
            response_rx,
        )
    }

    /// Fire-and-forget enqueue. A full queue drops the event and reports a
    /// queue-overflow acknowledgment instead of failing the caller.
    pub fn enqueue(&self, envelope: EventEnvelope) {
        match self.event_tx.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(envelope)) => {
                tracing::warn!(
                    dataset = %envelope.dataset,
                    "Event queue at capacity, dropping event"
                );
                push_response(
                    &self.response_tx,
                    vec![AckRecord::error(
                        envelope.correlation_id,
                        AckError::new(QUEUE_OVERFLOW_MESSAGE),
                    )],
                );
            }
            Err(TrySendError::Closed(envelope)) => {
                tracing::warn!(
                    dataset = %envelope.dataset,
                    "Transmission worker stopped, dropping event"
                );
                push_response(
                    &self.response_tx,
                    vec![AckRecord::error(
                        envelope.correlation_id,
                        AckError::new("transmission worker stopped"),
                    )],
                );
            }
        }
    }
}

fn push_response(response_tx: &mpsc::Sender<Vec<AckRecord>>, batch: Vec<AckRecord>) {
    if response_tx.try_send(batch).is_err() {
        tracing::warn!("Response queue full, dropping acknowledgment batch");
    }
}

struct BatchWorker {
    event_rx: mpsc::Receiver<EventEnvelope>,
    response_tx: mpsc::Sender<Vec<AckRecord>>,
    transport: Arc<dyn Transport>,
    batch_size_trigger: usize,
    batch_time_trigger: Duration,
    sample_rate: u32,
    disabled: bool,
    batch_permits: Arc<Semaphore>,
    buffer: Vec<EventEnvelope>,
}

impl BatchWorker {
    async fn run(mut self) {
        // Deadline of the currently open batch; set when the first event
        // lands in an empty buffer, cleared on flush.
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                received = self.event_rx.recv() => match received {
                    Some(envelope) => {
                        if self.admit(envelope) {
                            if self.buffer.len() == 1 {
                                deadline = Some(Instant::now() + self.batch_time_trigger);
                            }
                            if self.buffer.len() >= self.batch_size_trigger {
                                self.flush().await;
                                deadline = None;
                            }
                        }
                    }
                    None => {
                        self.flush().await;
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() =>
                {
                    self.flush().await;
                    deadline = None;
                }
            }
        }

        tracing::debug!("Transmission worker stopped");
    }

    /// Apply the disabled and sampling policies; buffer survivors with a
    /// send timestamp when the payload did not carry one.
    fn admit(&mut self, mut envelope: EventEnvelope) -> bool {
        if self.disabled {
            tracing::trace!(dataset = %envelope.dataset, "Transmission disabled, discarding event");
            return false;
        }

        if !self.keep_after_sampling() {
            tracing::debug!(dataset = %envelope.dataset, "Event dropped due to sampling");
            push_response(
                &self.response_tx,
                vec![AckRecord::error(
                    envelope.correlation_id,
                    AckError::new(SAMPLING_DROP_MESSAGE),
                )],
            );
            return false;
        }

        if envelope.timestamp.is_none() {
            envelope.timestamp = Some(Utc::now());
        }
        self.buffer.push(envelope);
        true
    }

    fn keep_after_sampling(&self) -> bool {
        self.sample_rate <= 1 || rand::thread_rng().gen_range(0..self.sample_rate) == 0
    }

    /// Drain the buffer and send one batch per dataset, bounded by the
    /// concurrency permits. Each batch reports its acknowledgments as soon
    /// as its own send finishes.
    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let mut by_dataset: HashMap<String, Vec<EventEnvelope>> = HashMap::new();
        for envelope in std::mem::take(&mut self.buffer) {
            by_dataset
                .entry(envelope.dataset.clone())
                .or_default()
                .push(envelope);
        }

        for (dataset, events) in by_dataset {
            let Ok(permit) = Arc::clone(&self.batch_permits).acquire_owned().await else {
                // The semaphore is never closed while the worker runs.
                return;
            };
            let transport = Arc::clone(&self.transport);
            let response_tx = self.response_tx.clone();

            tokio::spawn(async move {
                let _permit = permit;
                tracing::debug!(dataset = %dataset, count = events.len(), "Sending batch");
                let records = transport.send_batch(&dataset, &events).await;
                if !records.is_empty() {
                    push_response(&response_tx, records);
                }
            });
        }
    }
}
