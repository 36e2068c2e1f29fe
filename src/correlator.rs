// ============================================================================
// Pending-event correlation core
// ============================================================================
//
// Every tracked submission parks the sending half of a oneshot channel in the
// pending map, keyed by a generated correlation id, next to an armed timeout.
// Settlement happens exactly once because every path — acknowledgment or
// timeout — removes the entry from the map *before* acting on it, and the
// entry owns the only way to settle its future.
//
// The map is instance-owned (one per client) and guarded by a std mutex that
// is never held across an await point, so check-and-mutate is atomic.
//
// ============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::SendError;
use crate::response::{classify, AckRecord, Settlement};
use crate::timer::ScheduledTimeout;

/// How long a tracked event may stay pending before it is rejected.
pub(crate) const ACK_TIMEOUT: Duration = Duration::from_millis(5_000);

pub(crate) type SettleResult = Result<Settlement, SendError>;

type PendingMap = HashMap<Uuid, PendingEvent>;

/// One in-flight submission awaiting its acknowledgment.
struct PendingEvent {
    settle: oneshot::Sender<SettleResult>,
    timeout: ScheduledTimeout,
}

/// Owns the pending map: assigns correlation ids, arms and cancels per-event
/// timeouts, and matches acknowledgment batches back to parked futures.
///
/// Identifier collisions take a deliberate degraded-correctness fallback: the
/// event is forwarded untracked and its future resolves immediately with the
/// raw payload, without awaiting any acknowledgment. A v4 UUID colliding with
/// a live pending entry has probability around 2^-122 per pair, so the case
/// is escaped rather than retried.
pub(crate) struct Correlator {
    pending: Arc<Mutex<PendingMap>>,
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a new tracked submission.
    ///
    /// Generates a correlation id, arms its timeout, and parks the settle
    /// handle in the pending map, all before returning. `None` signals the
    /// collision fallback: nothing was registered and no acknowledgment will
    /// ever match, so the caller must settle the submission itself.
    pub(crate) fn register(&self) -> Option<(Uuid, oneshot::Receiver<SettleResult>)> {
        let id = Uuid::new_v4();
        let mut pending = lock_map(&self.pending);

        if pending.contains_key(&id) {
            tracing::warn!(
                correlation_id = %id,
                "Correlation id collision, sending event with an immediately settled future"
            );
            return None;
        }

        let (settle, settled) = oneshot::channel();
        let timeout = ScheduledTimeout::arm(ACK_TIMEOUT, {
            let map = Arc::clone(&self.pending);
            move || fire_timeout(&map, id)
        });

        pending.insert(id, PendingEvent { settle, timeout });
        Some((id, settled))
    }

    /// Process one acknowledgment batch from the transmission engine.
    ///
    /// Records are handled independently; a stale or unmatched record never
    /// affects its siblings.
    pub(crate) fn handle_batch(&self, records: Vec<AckRecord>) {
        for record in records {
            self.settle_record(record);
        }
    }

    fn settle_record(&self, record: AckRecord) {
        let Some(id) = record.correlation_id else {
            tracing::debug!("Acknowledgment without a correlation id, ignoring");
            return;
        };

        let entry = lock_map(&self.pending).remove(&id);
        let Some(event) = entry else {
            tracing::debug!(
                correlation_id = %id,
                "Acknowledgment for an unknown or already settled event, ignoring"
            );
            return;
        };

        event.timeout.cancel();
        let outcome = classify(record);
        // The caller may have dropped the future; nothing left to settle then.
        let _ = event.settle.send(outcome);
    }

    /// Number of submissions still awaiting settlement.
    pub(crate) fn pending_count(&self) -> usize {
        lock_map(&self.pending).len()
    }
}

/// Timeout path: remove-then-reject. An already settled (absent) id makes
/// the firing a no-op.
fn fire_timeout(pending: &Mutex<PendingMap>, id: Uuid) {
    let entry = lock_map(pending).remove(&id);
    match entry {
        Some(event) => {
            tracing::debug!(correlation_id = %id, "Sending event timed out");
            let _ = event.settle.send(Err(SendError::Timeout));
        }
        None => {
            tracing::debug!(
                correlation_id = %id,
                "Timeout fired for an already settled event"
            );
        }
    }
}

// A panicked holder cannot have left the map mid-mutation (single-statement
// critical sections), so recover the guard instead of propagating poison.
fn lock_map(map: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acknowledgment_settles_and_clears_the_entry() {
        let correlator = Correlator::new();
        let (id, settled) = correlator.register().expect("no collision expected");
        assert_eq!(correlator.pending_count(), 1);

        correlator.handle_batch(vec![AckRecord::success(id, 202)]);

        let outcome = settled.await.expect("settle handle should be used");
        match outcome {
            Ok(Settlement::Delivered(record)) => assert_eq!(record.status_code, Some(202)),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn unknown_acknowledgment_is_ignored() {
        let correlator = Correlator::new();
        let (_id, _settled) = correlator.register().expect("no collision expected");

        correlator.handle_batch(vec![AckRecord::success(Uuid::new_v4(), 202)]);
        correlator.handle_batch(vec![AckRecord {
            correlation_id: None,
            status_code: Some(202),
            error: None,
            duration_ms: None,
            body: None,
        }]);

        assert_eq!(correlator.pending_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_acknowledgments_settle_once() {
        let correlator = Correlator::new();
        let (id, settled) = correlator.register().expect("no collision expected");

        correlator.handle_batch(vec![
            AckRecord::success(id, 202),
            AckRecord::success(id, 500),
        ]);

        // The first record wins; the duplicate is a logged no-op.
        let outcome = settled.await.expect("settle handle should be used");
        assert!(matches!(outcome, Ok(Settlement::Delivered(_))));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_rejects_with_the_literal_message() {
        let correlator = Correlator::new();
        let (_id, settled) = correlator.register().expect("no collision expected");

        let outcome = settled.await.expect("settle handle should be used");
        match outcome {
            Err(error) => assert_eq!(
                error.to_string(),
                "Sending event to honeycomb.io timed out (5000ms)"
            ),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_acknowledgment_after_timeout_is_a_no_op() {
        let correlator = Correlator::new();
        let (id, settled) = correlator.register().expect("no collision expected");

        tokio::time::sleep(ACK_TIMEOUT + Duration::from_millis(1)).await;
        let outcome = settled.await.expect("settle handle should be used");
        assert_eq!(outcome, Err(SendError::Timeout));

        correlator.handle_batch(vec![AckRecord::success(id, 202)]);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn early_settlement_disarms_the_timeout() {
        let correlator = Correlator::new();
        let (id, settled) = correlator.register().expect("no collision expected");

        correlator.handle_batch(vec![AckRecord::success(id, 200)]);
        let outcome = settled.await.expect("settle handle should be used");
        assert!(matches!(outcome, Ok(Settlement::Delivered(_))));

        // Long past the timeout window nothing fires for the settled id.
        tokio::time::sleep(ACK_TIMEOUT * 2).await;
        assert_eq!(correlator.pending_count(), 0);
    }
}
