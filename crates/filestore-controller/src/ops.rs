//! Pending multi-party operations.
//!
//! A pending operation aggregates store acknowledgements for one
//! in-flight store or remove: the target set fixed at operation start,
//! the monotonically growing ack set, the reply channel of the waiting
//! client, and the abort handle of the operation's one-shot timer.
//!
//! Completion and timer expiry race through the controller's state lock;
//! whichever removes the operation from its table first wins, and the
//! operation id lets a late timer recognize that the slot now belongs to
//! a newer operation on the same filename.

use filestore_protocol::LineSender;
use std::collections::BTreeSet;
use tokio::task::AbortHandle;

/// One in-flight store or remove operation.
#[derive(Debug)]
pub struct PendingOp {
    /// Globally unique operation id; timers act only on their own id.
    pub id: u64,
    /// Store ports that must acknowledge.
    pub targets: BTreeSet<u16>,
    /// Ports that have acknowledged so far. Grows monotonically.
    pub acked: BTreeSet<u16>,
    /// Reply channel of the client that initiated the operation.
    pub client: LineSender,
    /// Abort handle of the timeout task; aborted on completion.
    pub timer: AbortHandle,
}

impl PendingOp {
    pub fn new(id: u64, targets: BTreeSet<u16>, client: LineSender, timer: AbortHandle) -> Self {
        Self {
            id,
            targets,
            acked: BTreeSet::new(),
            client,
            timer,
        }
    }

    /// Record an acknowledgement. Acks from ports outside the target set
    /// are rejected; duplicates are absorbed. Returns `true` when the
    /// ack was admissible (caller then checks [`Self::is_complete`]).
    pub fn record_ack(&mut self, port: u16) -> bool {
        if !self.targets.contains(&port) {
            return false;
        }
        self.acked.insert(port);
        true
    }

    /// All targets have acknowledged.
    pub fn is_complete(&self) -> bool {
        self.acked == self.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(targets: &[u16]) -> PendingOp {
        let (client, _rx) = LineSender::channel();
        let timer = tokio::spawn(async {}).abort_handle();
        PendingOp::new(1, targets.iter().copied().collect(), client, timer)
    }

    #[tokio::test]
    async fn completes_only_when_every_target_acked() {
        let mut op = op(&[8001, 8002]);
        assert!(!op.is_complete());

        assert!(op.record_ack(8001));
        assert!(!op.is_complete());

        assert!(op.record_ack(8002));
        assert!(op.is_complete());
    }

    #[tokio::test]
    async fn duplicate_acks_are_absorbed() {
        let mut op = op(&[8001, 8002]);
        assert!(op.record_ack(8001));
        assert!(op.record_ack(8001));
        assert!(!op.is_complete());
        assert_eq!(op.acked.len(), 1);
    }

    #[tokio::test]
    async fn acks_from_outside_the_target_set_are_rejected() {
        let mut op = op(&[8001]);
        assert!(!op.record_ack(9999));
        assert!(op.acked.is_empty());

        assert!(op.record_ack(8001));
        assert!(op.is_complete());
    }
}
