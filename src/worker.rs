//! Deferred work from interrupt-like contexts (§5, §9): fallback,
//! subflow-initiate, and address-change events must not try to take the
//! master lock from the path that detected them. Modeled as
//! message-passing to a dedicated worker task, the way the teacher
//! defers its own background work onto `tokio::spawn` rather than
//! running it inline on the packet-arrival path
//! (`elvis_core::protocols::tcp::tcp_session`'s retransmission task).

use crate::address::Socket;
use crate::pathmanager::SubflowInitiateRequest;
use tokio::sync::mpsc;

/// A unit of work the packet-arrival path wants performed without
/// itself taking the MCB's lock.
#[derive(Debug, Clone)]
pub enum DeferredWork {
    /// §4.6 "Fallback invoked from an atomic context defers to a
    /// single-shot worker task."
    Fallback { token: u32 },
    /// §4.7 "Initiate-subflow", queued rather than connected inline.
    InitiateSubflow(SubflowInitiateRequest),
    /// §4.7 "Interface up/down".
    AddressDown { token: u32, local: Socket },
    AddressUp { token: u32, local: Socket },
}

/// The sending half handed to packet-arrival/interrupt-context code.
/// Cloning is cheap (an `mpsc::Sender` is a handle), matching every
/// caller's need for its own queue slot.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<DeferredWork>,
}

impl WorkerHandle {
    /// Enqueues work for the worker loop. Never blocks and never takes
    /// any MCB lock, satisfying §9's "do not attempt to take the master
    /// lock from the interrupt path".
    pub fn defer(&self, work: DeferredWork) {
        if self.tx.send(work).is_err() {
            tracing::warn!("deferred work queue is closed, dropping work item");
        }
    }
}

/// Owns the receive half; `run` drains it, handing each item to
/// `handle_fn`, until every [`WorkerHandle`] has been dropped.
pub struct Worker {
    rx: mpsc::UnboundedReceiver<DeferredWork>,
}

impl Worker {
    pub fn new() -> (WorkerHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (WorkerHandle { tx }, Self { rx })
    }

    /// Runs until the channel closes, invoking `handle_fn` for each
    /// queued item in arrival order (§5: one dedicated worker, not a
    /// thread pool, so MCB-affecting deferred work stays serialized per
    /// host the way the master lock would have serialized it inline).
    pub async fn run(mut self, mut handle_fn: impl FnMut(DeferredWork)) {
        while let Some(work) = self.rx.recv().await {
            handle_fn(work);
        }
    }
}
