//! Reliability patterns
//!
//! This module provides:
//! - [`RetryPolicy`] - Bounded attempts with linear or exponential backoff
//! - [`retry`] / [`retry_if`] - The retry governor that drives an operation under a policy

mod retry;

pub use retry::{retry, retry_if, Backoff, RetryError, RetryPolicy};
