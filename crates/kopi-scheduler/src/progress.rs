use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(pub u64);

/// Coarse "operation in progress" signal consumed by the surrounding
/// application (progress UI). A boundary concern, not a correctness one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { id: OperationId, title: String },
    Finished { id: OperationId },
}

pub type ProgressReceiver = broadcast::Receiver<ProgressEvent>;

#[derive(Clone)]
pub struct ProgressSender {
    tx: broadcast::Sender<ProgressEvent>,
    next_id: Arc<AtomicU64>,
}

impl ProgressSender {
    pub(crate) fn new(tx: broadcast::Sender<ProgressEvent>) -> Self {
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> ProgressReceiver {
        self.tx.subscribe()
    }

    pub fn start(&self, title: impl Into<String>) -> ProgressGuard {
        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let _ = self.tx.send(ProgressEvent::Started {
            id,
            title: title.into(),
        });
        ProgressGuard {
            id,
            tx: self.tx.clone(),
            finished: false,
        }
    }
}

/// Emits the matching `Finished` event when finished or dropped, so an
/// abandoned operation never leaves the progress UI spinning.
pub struct ProgressGuard {
    id: OperationId,
    tx: broadcast::Sender<ProgressEvent>,
    finished: bool,
}

impl ProgressGuard {
    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn finish(mut self) {
        self.emit_finished();
    }

    fn emit_finished(&mut self) {
        if !self.finished {
            self.finished = true;
            let _ = self.tx.send(ProgressEvent::Finished { id: self.id });
        }
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        self.emit_finished();
    }
}
