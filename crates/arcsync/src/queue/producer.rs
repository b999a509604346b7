use crossbeam_channel::Sender;

use crate::error::QueueError;

use super::WorkRef;

/// Enqueuing side of the work queue. Cheap to clone; discovery components
/// hold one each.
#[derive(Clone)]
pub struct Producer {
    sender: Sender<WorkRef>,
}

impl Producer {
    pub(crate) fn new(sender: Sender<WorkRef>) -> Self {
        Self { sender }
    }

    /// Enqueues a work reference. Blocks while the queue is at capacity.
    pub fn enqueue(&self, work: WorkRef) -> Result<(), QueueError> {
        self.sender.send(work).map_err(|_| QueueError::ChannelClosed)
    }

    /// Number of references currently queued.
    pub fn depth(&self) -> usize {
        self.sender.len()
    }
}
