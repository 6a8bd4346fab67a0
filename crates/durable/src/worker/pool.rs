//! Bounded task pool
//!
//! Runs submitted futures with a fixed concurrency ceiling, queues the rest in
//! submission order and exposes a drain barrier for end-of-run waiting.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error};

use super::report::{PoolReport, TaskOutcome, TaskStatus};

/// Result returned by every pool task
pub type TaskResult = anyhow::Result<()>;

/// Identifier assigned by the pool at submission time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Task pool errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Concurrency limit is not a positive integer
    #[error("invalid pool configuration: {0}")]
    InvalidConfiguration(String),
}

/// Bounded task pool
///
/// At most `limit` tasks run at once. A task submitted while a slot is free is
/// spawned before `submit` returns; otherwise it waits in a FIFO queue and is
/// promoted as soon as a running task finishes.
///
/// A task's error or panic is recorded in the [`PoolReport`] and logged; it
/// never affects sibling tasks or the pool itself. There is no cancellation:
/// once submitted, a task runs to completion.
///
/// `submit` spawns onto the current Tokio runtime and must be called from
/// within one.
///
/// # Example
///
/// ```no_run
/// use scrivener_durable::TaskPool;
///
/// # async fn demo() -> Result<(), scrivener_durable::PoolError> {
/// let pool = TaskPool::new(2)?;
/// for i in 0..5 {
///     pool.submit(format!("job-{i}"), async move {
///         tokio::time::sleep(std::time::Duration::from_millis(10 * i)).await;
///         Ok(())
///     });
/// }
/// pool.join().await;
/// assert_eq!(pool.report().succeeded, 5);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TaskPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    limit: usize,
    next_id: AtomicU64,
    state: Mutex<PoolState>,
}

#[derive(Default)]
struct PoolState {
    running: HashMap<TaskId, String>,
    queued: VecDeque<QueuedTask>,
    drain: Option<DrainBarrier>,
    report: PoolReport,
}

impl PoolState {
    fn is_idle(&self) -> bool {
        self.running.is_empty() && self.queued.is_empty()
    }
}

struct QueuedTask {
    id: TaskId,
    label: String,
    future: BoxFuture<'static, TaskResult>,
}

struct DrainBarrier {
    resolve: oneshot::Sender<()>,
    signal: Shared<oneshot::Receiver<()>>,
}

impl DrainBarrier {
    fn new() -> Self {
        let (resolve, rx) = oneshot::channel();
        Self {
            resolve,
            signal: rx.shared(),
        }
    }
}

impl TaskPool {
    /// Create a pool with the given concurrency ceiling
    pub fn new(limit: usize) -> Result<Self, PoolError> {
        if limit == 0 {
            return Err(PoolError::InvalidConfiguration(
                "concurrency limit must be a positive integer".into(),
            ));
        }

        Ok(Self {
            inner: Arc::new(PoolInner {
                limit,
                next_id: AtomicU64::new(1),
                state: Mutex::new(PoolState::default()),
            }),
        })
    }

    /// Concurrency ceiling
    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Number of tasks currently running
    pub fn running(&self) -> usize {
        self.inner.state.lock().running.len()
    }

    /// Number of tasks waiting for a slot
    pub fn queued(&self) -> usize {
        self.inner.state.lock().queued.len()
    }

    /// Whether nothing is running or queued
    pub fn is_idle(&self) -> bool {
        self.inner.state.lock().is_idle()
    }

    /// Submit a task
    ///
    /// Returns immediately. The returned id only identifies the task in the
    /// report; it is not a handle to the task's result.
    pub fn submit<F>(&self, label: impl Into<String>, task: F) -> TaskId
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let id = TaskId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let label = label.into();
        let future = task.boxed();

        let start_now = {
            let mut state = self.inner.state.lock();
            state.report.submitted += 1;

            if state.running.len() < self.inner.limit {
                state.running.insert(id, label.clone());
                Some(future)
            } else {
                debug!(%id, task = %label, queued = state.queued.len() + 1, "Pool saturated, queueing task");
                state.queued.push_back(QueuedTask { id, label: label.clone(), future });
                None
            }
        };

        if let Some(future) = start_now {
            self.inner.spawn(id, label, future);
        }

        id
    }

    /// Wait until nothing is running or queued
    ///
    /// Resolves immediately on an idle pool. Concurrent callers share one
    /// barrier; work submitted before the barrier resolves extends the wait.
    pub fn join(&self) -> Drain {
        let mut state = self.inner.state.lock();
        if state.is_idle() {
            return Drain { signal: None };
        }

        let barrier = state.drain.get_or_insert_with(DrainBarrier::new);
        Drain {
            signal: Some(barrier.signal.clone()),
        }
    }

    /// Snapshot of submitted, running, queued and finished tasks
    pub fn report(&self) -> PoolReport {
        let state = self.inner.state.lock();
        let mut report = state.report.clone();
        report.running = state.running.len();
        report.queued = state.queued.len();
        report
    }

    /// Labels of the tasks currently running
    pub fn running_labels(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut entries: Vec<_> = state.running.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        entries.into_iter().map(|(_, label)| label.clone()).collect()
    }
}

impl PoolInner {
    fn spawn(self: &Arc<Self>, id: TaskId, label: String, future: BoxFuture<'static, TaskResult>) {
        let pool = Arc::clone(self);

        tokio::spawn(async move {
            let started = Instant::now();
            debug!(%id, task = %label, "Task started");

            let status = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => TaskStatus::Succeeded,
                Ok(Err(e)) => {
                    let message = format!("{e:#}");
                    error!(%id, task = %label, error = %message, "Task failed; pool continues");
                    TaskStatus::Failed(message)
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(%id, task = %label, panic = %message, "Task panicked; pool continues");
                    TaskStatus::Panicked(message)
                }
            };

            pool.complete(TaskOutcome {
                id,
                label,
                status,
                elapsed: started.elapsed(),
            });
        });
    }

    fn complete(self: &Arc<Self>, outcome: TaskOutcome) {
        let mut promoted = Vec::new();

        let drained = {
            let mut state = self.state.lock();
            state.running.remove(&outcome.id);
            state.report.record(outcome);

            while state.running.len() < self.limit {
                let Some(next) = state.queued.pop_front() else {
                    break;
                };
                state.running.insert(next.id, next.label.clone());
                promoted.push(next);
            }

            if state.is_idle() {
                state.drain.take()
            } else {
                None
            }
        };

        for task in promoted {
            debug!(id = %task.id, task = %task.label, "Promoting queued task");
            self.spawn(task.id, task.label, task.future);
        }

        if let Some(barrier) = drained {
            debug!("Pool drained");
            let _ = barrier.resolve.send(());
        }
    }
}

impl fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TaskPool")
            .field("limit", &self.inner.limit)
            .field("running", &state.running.len())
            .field("queued", &state.queued.len())
            .finish()
    }
}

/// Drain barrier returned by [`TaskPool::join`]
///
/// Completes once the pool has no running and no queued tasks.
#[must_use = "a Drain does nothing unless awaited"]
pub struct Drain {
    signal: Option<Shared<oneshot::Receiver<()>>>,
}

impl Drain {
    /// Whether two barriers wait on the same underlying signal
    pub fn shares_signal_with(&self, other: &Drain) -> bool {
        match (&self.signal, &other.signal) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Future for Drain {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.signal.as_mut() {
            None => Poll::Ready(()),
            Some(signal) => signal.poll_unpin(cx).map(|_| ()),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
