//! Task outcome bookkeeping

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::pool::TaskId;

/// Terminal status of a single pool task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task future resolved to `Ok(())`
    Succeeded,
    /// Task future resolved to an error
    Failed(String),
    /// Task future panicked
    Panicked(String),
}

impl TaskStatus {
    /// Whether the task ended without error
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Succeeded)
    }

    /// Error text for failed or panicked tasks
    pub fn error(&self) -> Option<&str> {
        match self {
            TaskStatus::Succeeded => None,
            TaskStatus::Failed(e) | TaskStatus::Panicked(e) => Some(e),
        }
    }
}

/// Outcome of one executed task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Pool-assigned task id
    pub id: TaskId,
    /// Caller-supplied label (e.g. `series/chapter-12`)
    pub label: String,
    /// Terminal status
    #[serde(flatten)]
    pub status: TaskStatus,
    /// Wall-clock time from start to completion
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

/// Snapshot of everything the pool has executed so far
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolReport {
    /// Tasks handed to `submit`
    pub submitted: usize,
    /// Tasks that finished with `Ok(())`
    pub succeeded: usize,
    /// Tasks that returned an error or panicked
    pub failed: usize,
    /// Tasks currently running
    pub running: usize,
    /// Tasks waiting for a slot
    pub queued: usize,
    /// Outcomes in completion order
    pub outcomes: Vec<TaskOutcome>,
}

impl PoolReport {
    pub(crate) fn record(&mut self, outcome: TaskOutcome) {
        if outcome.status.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Tasks that reached a terminal state
    pub fn executed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Outcomes of failed or panicked tasks
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
