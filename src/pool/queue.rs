//! Task queue for classification work
//!
//! All tasks are known before the pool starts, so the queue is filled up
//! front and then closed. Workers pull from it until it drains; a closed and
//! empty queue is the signal for a worker to exit.

use crate::discovery::InputFile;
use crate::error::WorkerError;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// One input file on its way through normalization and classification
#[derive(Debug, Clone)]
pub struct ClassificationTask {
    /// Submission order, unique within a run
    pub id: u64,

    /// The report to label
    pub file: InputFile,
}

/// Multi-consumer queue of classification tasks
pub struct TaskQueue {
    /// Sender for adding tasks; `None` once closed
    sender: Option<Sender<ClassificationTask>>,

    /// Receiver shared by all workers
    receiver: Receiver<ClassificationTask>,

    /// Id for the next submitted task
    next_id: u64,
}

impl TaskQueue {
    /// Create an empty, open queue
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender: Some(sender),
            receiver,
            next_id: 0,
        }
    }

    /// Add a task for `file`, returning its id
    pub fn submit(&mut self, file: InputFile) -> Result<u64, WorkerError> {
        let sender = self.sender.as_ref().ok_or(WorkerError::QueueSendFailed)?;
        let id = self.next_id;
        sender
            .send(ClassificationTask { id, file })
            .map_err(|_| WorkerError::QueueSendFailed)?;
        self.next_id += 1;
        Ok(id)
    }

    /// Stop accepting tasks; workers exit once the remaining tasks are taken
    pub fn close(&mut self) {
        self.sender = None;
    }

    /// Get a receiver for this queue (clone for each worker)
    pub fn receiver(&self) -> TaskReceiver {
        TaskReceiver {
            receiver: self.receiver.clone(),
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker side of the task queue
#[derive(Clone)]
pub struct TaskReceiver {
    receiver: Receiver<ClassificationTask>,
}

impl TaskReceiver {
    /// Block until a task is available; `None` once the queue is closed and drained
    pub fn recv(&self) -> Option<ClassificationTask> {
        self.receiver.recv().ok()
    }
}
