//! Correlation table matching outbound actions to their eventual responses.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use crate::connection::DisconnectReason;
use crate::error::{AmiError, AmiResult};
use crate::message::AmiMessage;

/// What a pending slot eventually resolves to: the correlated response, or
/// the failure that ended the wait.
pub(crate) type SlotResult = Result<AmiMessage, AmiError>;

enum TableState {
    /// Accepting registrations; one single-shot completion cell per ActionID.
    Open(HashMap<String, oneshot::Sender<SlotResult>>),
    /// Drained. Remembers why, so late registrations fail with the real reason.
    Closed(DisconnectReason),
}

/// The single structure mutated by both the publish side (register, discard)
/// and the reader loop (fulfill, drain).
///
/// Every operation is synchronous under one std mutex — nothing is held
/// across an await, so a fulfill racing a drain serializes cleanly: each slot
/// completes exactly once, by whichever side takes the lock first, and the
/// loser's lookup finds nothing.
pub(crate) struct PendingTable {
    state: Mutex<TableState>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState::Open(HashMap::new())),
        }
    }

    /// The critical sections are panic-free, so a poisoned lock still holds
    /// consistent state; recover rather than propagate.
    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the pending slot for a freshly-assigned identifier.
    ///
    /// Fails with [`AmiError::DuplicateActionId`] if the identifier is
    /// already pending (identifier generation makes this a bug, not a
    /// runtime condition) and with [`AmiError::Disconnected`] once the table
    /// has been drained.
    pub fn register(&self, id: &str) -> AmiResult<oneshot::Receiver<SlotResult>> {
        let mut state = self.lock();
        match &mut *state {
            TableState::Open(slots) => {
                if slots.contains_key(id) {
                    return Err(AmiError::DuplicateActionId { id: id.to_string() });
                }
                let (tx, rx) = oneshot::channel();
                slots.insert(id.to_string(), tx);
                Ok(rx)
            }
            TableState::Closed(reason) => Err(AmiError::Disconnected {
                reason: reason.clone(),
            }),
        }
    }

    /// Complete and remove the slot for `id`.
    ///
    /// Returns `false` when no slot exists — the caller already gave up
    /// (timeout) or never issued the action. That is an observable anomaly
    /// for the reader loop to log, never a failure.
    pub fn fulfill(&self, id: &str, outcome: SlotResult) -> bool {
        let tx = match &mut *self.lock() {
            TableState::Open(slots) => slots.remove(id),
            TableState::Closed(_) => None,
        };
        match tx {
            Some(tx) => {
                // A dropped receiver means the caller vanished between our
                // lookup and the send; the response is discarded either way.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Remove a slot without completing it (timeout/cancellation path).
    pub fn discard(&self, id: &str) -> bool {
        match &mut *self.lock() {
            TableState::Open(slots) => slots.remove(id).is_some(),
            TableState::Closed(_) => false,
        }
    }

    /// Fail every pending slot with a disconnection and refuse all future
    /// registrations. Idempotent; returns how many slots were failed.
    pub fn drain(&self, reason: DisconnectReason) -> usize {
        let mut state = self.lock();
        let slots = match &mut *state {
            TableState::Open(slots) => std::mem::take(slots),
            TableState::Closed(_) => return 0,
        };
        *state = TableState::Closed(reason.clone());
        drop(state);

        let drained = slots.len();
        for (id, tx) in slots {
            debug!(action_id = %id, "failing pending action on disconnect");
            let _ = tx.send(Err(AmiError::Disconnected {
                reason: reason.clone(),
            }));
        }
        drained
    }

    /// Number of in-flight actions, for diagnostics.
    pub fn len(&self) -> usize {
        match &*self.lock() {
            TableState::Open(slots) => slots.len(),
            TableState::Closed(_) => 0,
        }
    }
}
