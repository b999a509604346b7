use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};

use crate::db::{status_repo, Database};
use crate::error::QueueError;
use crate::workflow::{Outcome, WorkflowEngine};

use super::{Producer, SyncOutcome, WorkRef};

/// Pool of sync workers consuming the work queue.
///
/// Each worker dequeues a `WorkRef`, loads the current record from the
/// store and hands it to the engine. References whose record no longer
/// exists are discarded. The engine's claim makes duplicate deliveries
/// of the same reference safe.
pub struct ConsumerPool {
    work_sender: Sender<WorkRef>,
    result_receiver: Receiver<SyncOutcome>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
}

impl ConsumerPool {
    pub fn new(
        db: Database,
        engine: Arc<WorkflowEngine>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Result<Self, QueueError> {
        if worker_count == 0 {
            return Err(QueueError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }

        let (work_sender, work_receiver) = bounded::<WorkRef>(queue_capacity);
        let (result_sender, result_receiver) = bounded::<SyncOutcome>(queue_capacity);
        let shutdown = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let work_rx = work_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let in_flight_count = Arc::clone(&in_flight);
            let worker_db = db.clone();
            let worker_engine = Arc::clone(&engine);

            let handle = thread::Builder::new()
                .name(format!("sync-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(
                        worker_id,
                        work_rx,
                        result_tx,
                        shutdown_flag,
                        in_flight_count,
                        worker_db,
                        worker_engine,
                    );
                })
                .map_err(|e| QueueError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} sync workers", worker_count);

        Ok(Self {
            work_sender,
            result_receiver,
            workers,
            shutdown,
            in_flight,
        })
    }

    /// Returns an enqueuing handle bound to this pool's queue.
    pub fn producer(&self) -> Producer {
        Producer::new(self.work_sender.clone())
    }

    pub fn try_recv_outcome(&self) -> Option<SyncOutcome> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_outcome(&self) -> Option<SyncOutcome> {
        self.result_receiver.recv().ok()
    }

    /// True when the queue is drained and no worker holds a task.
    ///
    /// Advisory: a reference that was just dequeued but not yet counted
    /// can make this momentarily optimistic. Callers that need certainty
    /// should drain the outcome channel instead.
    pub fn is_all_threads_completed(&self) -> bool {
        self.work_sender.is_empty() && self.in_flight.load(Ordering::SeqCst) == 0
    }

    pub fn shutdown(&self) {
        info!("Shutting down sync worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn wait(self) {
        // Dropping the sender lets idle workers observe disconnection.
        drop(self.work_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Sync worker {} panicked: {:?}", i, e);
            } else {
                debug!("Sync worker {} finished", i);
            }
        }

        info!("All sync workers have stopped");
    }
}

/// Holds the in-flight count for one dequeued reference. Dropping the
/// guard decrements, so the count stays correct even if processing panics.
struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_worker(
    worker_id: usize,
    work_receiver: Receiver<WorkRef>,
    result_sender: Sender<SyncOutcome>,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    db: Database,
    engine: Arc<WorkflowEngine>,
) {
    debug!("Sync worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Sync worker {} received shutdown signal", worker_id);
            break;
        }

        match work_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(work) => {
                let outcome = {
                    let _held = InFlightGuard::new(&in_flight);
                    process_work(&db, &engine, work)
                };

                if let Some(outcome) = outcome {
                    if let Err(e) = result_sender.send(outcome) {
                        error!("Sync worker {} failed to send outcome: {}", worker_id, e);
                        break;
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Sync worker {} work channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Sync worker {} stopped", worker_id);
}

fn process_work(db: &Database, engine: &WorkflowEngine, work: WorkRef) -> Option<SyncOutcome> {
    let status = match status_repo::find_by_id(db, work.object_id) {
        Ok(Some(status)) => status,
        Ok(None) => {
            debug!("Discarding reference to unknown record {}", work.object_id);
            return None;
        }
        Err(e) => {
            error!("Failed to load record {}: {}", work.object_id, e);
            return Some(SyncOutcome {
                object_id: work.object_id,
                original_file_path: String::new(),
                outcome: Outcome::Errored,
                error: Some(e.to_string()),
            });
        }
    };

    let original_file_path = status.original_file_path.clone();
    match engine.start(status) {
        Ok(outcome) => Some(SyncOutcome {
            object_id: work.object_id,
            original_file_path,
            outcome,
            error: None,
        }),
        Err(e) => {
            error!(
                "Workflow machinery failed for {}: {}",
                original_file_path, e
            );
            Some(SyncOutcome {
                object_id: work.object_id,
                original_file_path,
                outcome: Outcome::Errored,
                error: Some(e.to_string()),
            })
        }
    }
}
