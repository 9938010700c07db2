//! # Background Executor
//!
//! Dispatches whole microtasks to a fixed worker pool. Tasks run to
//! completion off the frame thread; completions come back over a bounded
//! channel and are surfaced only by `run_slice`, on the frame thread, so
//! component storage keeps a single writer.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::ecs::EntityId;

use super::{MicroTask, MicroTaskExecutor, TaskCompletion, TaskId, TaskOutcome, TaskStep};

/// Work handed to the pool.
struct WorkItem<R> {
    id: TaskId,
    owner: EntityId,
    task: Box<dyn MicroTask<R>>,
}

/// Worker-pool microtask executor.
///
/// Cancellation is cooperative at task granularity: a worker checks the
/// cancel set before starting a task, and `run_slice` discards the result
/// of any task cancelled while it was in flight.
pub struct BackgroundExecutor<R> {
    work_tx: Option<Sender<WorkItem<R>>>,
    result_rx: Receiver<TaskCompletion<R>>,
    cancelled: Arc<Mutex<HashSet<TaskId>>>,
    workers: Vec<JoinHandle<()>>,
    next_id: u64,
    in_flight: usize,
}

impl<R: Send + 'static> BackgroundExecutor<R> {
    /// Spawns the pool with the given number of worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero or a worker thread cannot be spawned.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "worker pool needs at least one thread");

        let (work_tx, work_rx) = unbounded::<WorkItem<R>>();
        let (result_tx, result_rx) = unbounded::<TaskCompletion<R>>();
        let cancelled = Arc::new(Mutex::new(HashSet::new()));

        let handles = (0..workers)
            .map(|n| {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let cancelled = Arc::clone(&cancelled);
                std::thread::Builder::new()
                    .name(format!("microtask-{n}"))
                    .spawn(move || worker_loop(&work_rx, &result_tx, &cancelled))
                    .expect("failed to spawn microtask worker thread")
            })
            .collect();

        tracing::debug!(workers, "background microtask pool started");

        Self {
            work_tx: Some(work_tx),
            result_rx,
            cancelled,
            workers: handles,
            next_id: 0,
            in_flight: 0,
        }
    }
}

/// Runs tasks from the queue until the executor is dropped.
fn worker_loop<R: Send>(
    work_rx: &Receiver<WorkItem<R>>,
    result_tx: &Sender<TaskCompletion<R>>,
    cancelled: &Mutex<HashSet<TaskId>>,
) {
    while let Ok(mut item) = work_rx.recv() {
        // A task cancelled before it started never runs.
        if cancelled.lock().contains(&item.id) {
            let _ = result_tx.send(TaskCompletion {
                task: item.id,
                owner: item.owner,
                outcome: TaskOutcome::Cancelled,
            });
            continue;
        }

        let outcome = loop {
            match item.task.step() {
                TaskStep::Continue => {}
                TaskStep::Done => break TaskOutcome::Finished(item.task.finish()),
                TaskStep::Failed => break TaskOutcome::Failed,
            }
        };

        let _ = result_tx.send(TaskCompletion {
            task: item.id,
            owner: item.owner,
            outcome,
        });
    }
}

impl<R: Send + 'static> MicroTaskExecutor<R> for BackgroundExecutor<R> {
    fn submit(&mut self, owner: EntityId, task: Box<dyn MicroTask<R>>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.in_flight += 1;

        if let Some(tx) = &self.work_tx {
            let _ = tx.send(WorkItem { id, owner, task });
        }
        id
    }

    fn cancel(&mut self, task: TaskId) {
        self.cancelled.lock().insert(task);
    }

    fn run_slice(&mut self) -> Vec<TaskCompletion<R>> {
        let mut completions = Vec::new();
        while let Ok(mut completion) = self.result_rx.try_recv() {
            self.in_flight -= 1;
            // Results of tasks cancelled while in flight are discarded on
            // arrival.
            if self.cancelled.lock().remove(&completion.task) {
                completion.outcome = TaskOutcome::Cancelled;
            }
            completions.push(completion);
        }
        completions
    }

    fn pending_count(&self) -> usize {
        self.in_flight
    }
}

impl<R> Drop for BackgroundExecutor<R> {
    fn drop(&mut self) {
        // Disconnecting the work channel stops the workers.
        self.work_tx = None;
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        tracing::debug!("background microtask pool stopped");
    }
}
