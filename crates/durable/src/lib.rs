//! # Execution Engine
//!
//! In-process primitives for running many I/O-bound units of work with a
//! fixed concurrency ceiling.
//!
//! ## Features
//!
//! - **Bounded task pool**: at most `limit` tasks in flight, the rest wait in FIFO order
//! - **Drain barrier**: one shared signal for "everything submitted so far, and anything
//!   submitted while waiting, has finished"
//! - **Failure isolation**: a failing or panicking task is recorded and logged, never
//!   propagated to siblings
//! - **Retry governor**: bounded attempts with linear or exponential backoff
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         TaskPool                             │
//! │  submit() ──► running (≤ limit) ◄── promote ── queued (FIFO) │
//! │                    │                                         │
//! │                    ▼                                         │
//! │             TaskOutcome ──► PoolReport                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ each task typically wraps
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              retry(policy, label, |attempt| ...)             │
//! │  attempt 1 ─✗─ sleep(d1) ─ attempt 2 ─✗─ sleep(d2) ─ ...     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use scrivener_durable::prelude::*;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), PoolError> {
//! let pool = TaskPool::new(3)?;
//! let policy = RetryPolicy::linear(Duration::from_secs(2)).with_max_attempts(3);
//!
//! for chapter in 1..=10u32 {
//!     let policy = policy.clone();
//!     pool.submit(format!("chapter-{chapter}"), async move {
//!         let text = retry(&policy, "fetch", |_attempt| async move {
//!             Ok::<_, std::io::Error>(format!("chapter {chapter}"))
//!         })
//!         .await?;
//!         tracing::info!(%text, "done");
//!         Ok(())
//!     });
//! }
//!
//! pool.join().await;
//! let report = pool.report();
//! println!("{} succeeded, {} failed", report.succeeded, report.failed);
//! # Ok(())
//! # }
//! ```

pub mod reliability;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::reliability::{retry, retry_if, Backoff, RetryError, RetryPolicy};
    pub use crate::worker::{
        Drain, PoolError, PoolReport, TaskId, TaskOutcome, TaskPool, TaskResult, TaskStatus,
    };
}

// Re-export key types at crate root
pub use reliability::{retry, retry_if, Backoff, RetryError, RetryPolicy};
pub use worker::{
    Drain, PoolError, PoolReport, TaskId, TaskOutcome, TaskPool, TaskResult, TaskStatus,
};
