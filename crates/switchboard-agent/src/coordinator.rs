//! Single-slot coordination of long-running tasks
//!
//! At most one long-running task is in flight across the whole agent. Each
//! completed task leaves a [`TaskRecord`] behind so callers can poll for its
//! result after the fact.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use switchboard_proto::Outcome;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Completed long-running task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    /// Task identifier handed out at start
    pub task_id: String,
    /// Start time, seconds since the Unix epoch
    pub started_at: u64,
    /// Completion time, seconds since the Unix epoch
    pub finished_at: u64,
    /// Outcome of the handler
    pub outcome: Outcome,
}

/// Answer to a status poll
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    /// The task is the one currently in flight
    Running,
    /// The task completed with this outcome
    Finished(Outcome),
    /// No running task or record matches
    Unknown,
}

impl TaskStatus {
    /// Reply published for this status
    pub fn into_outcome(self, task_id: &str) -> Outcome {
        match self {
            Self::Running => Outcome::task_running(),
            Self::Finished(outcome) => outcome,
            Self::Unknown => Outcome::unknown_task(task_id),
        }
    }
}

/// The long-running slot is occupied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("already running long running task {running}")]
pub struct AdmissionRejected {
    /// Task currently holding the slot
    pub running: String,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    running: Option<RunningSlot>,
    records: VecDeque<TaskRecord>,
}

#[derive(Debug)]
struct RunningSlot {
    task_id: String,
}

/// Lock-guarded coordinator state shared by all execution units
#[derive(Debug, Default)]
pub struct TaskCoordinator {
    state: Mutex<CoordinatorState>,
    /// Maximum number of records kept; `None` keeps all of them
    retention: Option<usize>,
}

impl TaskCoordinator {
    /// Create a coordinator that keeps every task record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coordinator keeping at most `retention` records
    pub fn with_retention(retention: Option<usize>) -> Self {
        Self {
            state: Mutex::new(CoordinatorState::default()),
            retention,
        }
    }

    /// Claim the long-running slot.
    ///
    /// The check and the claim happen under one lock acquisition, so two
    /// concurrent callers can never both succeed.
    pub fn start(self: &Arc<Self>) -> Result<RunningTask, AdmissionRejected> {
        let task_id = Uuid::new_v4().to_string();
        {
            let mut state = self.lock();
            if let Some(running) = &state.running {
                return Err(AdmissionRejected { running: running.task_id.clone() });
            }
            state.running = Some(RunningSlot { task_id: task_id.clone() });
        }

        info!("Started long-running task {}", task_id);
        Ok(RunningTask {
            coordinator: Arc::clone(self),
            task_id,
            started_at: unix_now(),
            finished: false,
        })
    }

    /// Report the status of a task
    pub fn poll(&self, task_id: &str) -> TaskStatus {
        let state = self.lock();
        if state.running.as_ref().is_some_and(|slot| slot.task_id == task_id) {
            return TaskStatus::Running;
        }
        state
            .records
            .iter()
            .rev()
            .find(|record| record.task_id == task_id)
            .map(|record| TaskStatus::Finished(record.outcome.clone()))
            .unwrap_or(TaskStatus::Unknown)
    }

    /// Id of the task currently in flight
    pub fn running_task(&self) -> Option<String> {
        self.lock().running.as_ref().map(|slot| slot.task_id.clone())
    }

    /// Snapshot of the stored task records, oldest first
    pub fn records(&self) -> Vec<TaskRecord> {
        self.lock().records.iter().cloned().collect()
    }

    /// Configured retention
    pub fn retention(&self) -> Option<usize> {
        self.retention
    }

    fn finish(&self, task_id: &str, started_at: u64, outcome: Option<Outcome>) {
        let mut state = self.lock();
        if let Some(outcome) = outcome {
            state.records.push_back(TaskRecord {
                task_id: task_id.to_string(),
                started_at,
                finished_at: unix_now(),
                outcome,
            });
            if let Some(limit) = self.retention {
                while state.records.len() > limit {
                    if let Some(evicted) = state.records.pop_front() {
                        debug!("Evicted task record {}", evicted.task_id);
                    }
                }
            }
        }
        if state.running.as_ref().is_some_and(|slot| slot.task_id == task_id) {
            state.running = None;
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        // No code path panics while holding the lock
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Claim on the long-running slot.
///
/// [`RunningTask::complete`] records the outcome and frees the slot. If the
/// claim is dropped without completing (undeclared handler error, panic), the
/// slot is freed and no record is written.
#[derive(Debug)]
pub struct RunningTask {
    coordinator: Arc<TaskCoordinator>,
    task_id: String,
    started_at: u64,
    finished: bool,
}

impl RunningTask {
    /// Task identifier
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Start time, seconds since the Unix epoch
    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    /// Record the outcome and release the slot
    pub fn complete(mut self, outcome: Outcome) {
        self.coordinator.finish(&self.task_id, self.started_at, Some(outcome));
        self.finished = true;
        info!("Completed long-running task {}", self.task_id);
    }
}

impl Drop for RunningTask {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Long-running task {} ended without an outcome", self.task_id);
            self.coordinator.finish(&self.task_id, self.started_at, None);
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
