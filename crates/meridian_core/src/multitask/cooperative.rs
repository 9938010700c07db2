//! # Cooperative Executor
//!
//! Runs microtasks on the frame thread in budgeted slices. Each tick it
//! steps the front of the FIFO queue until either the queue drains or
//! the per-slice time budget is exhausted, then yields the remainder to
//! the next tick.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::ecs::EntityId;

use super::{MicroTask, MicroTaskExecutor, TaskCompletion, TaskId, TaskOutcome, TaskStep};

/// A queued task awaiting further steps.
struct QueuedTask<R> {
    id: TaskId,
    owner: EntityId,
    task: Box<dyn MicroTask<R>>,
}

/// Single-threaded, budget-bounded microtask executor.
///
/// Ordering: FIFO among tasks; a task's internal steps are strictly
/// ordered. A slice always makes progress: the first step of a slice runs
/// even if the budget is already spent, so a zero budget degrades to
/// one-step-per-tick rather than starvation.
pub struct CooperativeExecutor<R> {
    queue: VecDeque<QueuedTask<R>>,
    cancelled: HashSet<TaskId>,
    budget: Duration,
    next_id: u64,
}

impl<R> CooperativeExecutor<R> {
    /// Creates an executor with the given per-slice budget in
    /// milliseconds.
    #[must_use]
    pub fn new(budget_ms: u64) -> Self {
        Self {
            queue: VecDeque::new(),
            cancelled: HashSet::new(),
            budget: Duration::from_millis(budget_ms),
            next_id: 0,
        }
    }

    /// The configured per-slice budget.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }
}

impl<R: Send + 'static> MicroTaskExecutor<R> for CooperativeExecutor<R> {
    fn submit(&mut self, owner: EntityId, task: Box<dyn MicroTask<R>>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.queue.push_back(QueuedTask { id, owner, task });
        id
    }

    fn cancel(&mut self, task: TaskId) {
        self.cancelled.insert(task);
    }

    fn run_slice(&mut self) -> Vec<TaskCompletion<R>> {
        let mut completions = Vec::new();
        if self.queue.is_empty() {
            return completions;
        }

        let start = Instant::now();
        let mut stepped_once = false;

        while let Some(queued) = self.queue.pop_front() {
            let QueuedTask { id, owner, mut task } = queued;

            // Cancellation is honoured at the scheduling point.
            if self.cancelled.remove(&id) {
                completions.push(TaskCompletion {
                    task: id,
                    owner,
                    outcome: TaskOutcome::Cancelled,
                });
                continue;
            }

            // Terminal state of the inner stepping loop. We defer calling
            // `finish` (which consumes the task) to the post-loop match so
            // the move and the budget-yield push-back stay on disjoint
            // control-flow paths.
            enum SliceResult {
                Finished,
                Failed,
                Yielded,
            }

            let result = loop {
                match task.step() {
                    TaskStep::Continue => {
                        stepped_once = true;
                        if start.elapsed() >= self.budget {
                            break SliceResult::Yielded;
                        }
                    }
                    TaskStep::Done => {
                        stepped_once = true;
                        break SliceResult::Finished;
                    }
                    TaskStep::Failed => {
                        stepped_once = true;
                        break SliceResult::Failed;
                    }
                }
            };

            match result {
                SliceResult::Finished => completions.push(TaskCompletion {
                    task: id,
                    owner,
                    outcome: TaskOutcome::Finished(task.finish()),
                }),
                SliceResult::Failed => completions.push(TaskCompletion {
                    task: id,
                    owner,
                    outcome: TaskOutcome::Failed,
                }),
                SliceResult::Yielded => {
                    // Budget exhausted mid-task; it keeps its place at the
                    // front so its steps stay strictly ordered.
                    self.queue.push_front(QueuedTask { id, owner, task });
                    break;
                }
            }

            if stepped_once && start.elapsed() >= self.budget {
                break;
            }
        }

        completions
    }

    fn pending_count(&self) -> usize {
        self.queue.len()
    }
}
