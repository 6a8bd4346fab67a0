//! Bounded task pool
//!
//! This module provides:
//! - [`TaskPool`] - Concurrency-limited executor with FIFO queueing
//! - [`Drain`] - Shared drain barrier returned by [`TaskPool::join`]
//! - [`PoolReport`] - Per-task outcomes collected for the end-of-run summary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         TaskPool                             │
//! │  ┌─────────────┐   promote (FIFO)   ┌─────────────────────┐  │
//! │  │   queued    │ ─────────────────► │  running (≤ limit)  │  │
//! │  │  [T4][T5]   │                    │   [T1] [T2] [T3]    │  │
//! │  └─────────────┘                    └──────────┬──────────┘  │
//! │                                                │ complete    │
//! │                                                ▼             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  outcomes (Succeeded / Failed / Panicked)  + Drain  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod pool;
mod report;

pub use pool::{Drain, PoolError, TaskId, TaskPool, TaskResult};
pub use report::{PoolReport, TaskOutcome, TaskStatus};
