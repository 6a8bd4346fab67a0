// Error types for translation runs

use std::time::Duration;

use scrivener_durable::{PoolError, RetryError};
use thiserror::Error;

/// Result type alias for translation operations
pub type Result<T> = std::result::Result<T, TranslateError>;

/// Errors that can occur while translating a work unit
#[derive(Debug, Error)]
pub enum TranslateError {
    /// Bad configuration detected at startup; fatal for the run
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Connection, transport or stream-level failure; retried
    ///
    /// Also covers a transport that aborts after the stream has started. That
    /// case is handled exactly like `Timeout`: partial text is discarded and
    /// the attempt is retried. The variant keeps the two causes apart in logs.
    #[error("Network error: {0}")]
    TransientNetworkFailure(String),

    /// The invocation exceeded its wall-clock ceiling; retried
    #[error("Translation timed out after {0:?}")]
    Timeout(Duration),

    /// Backend answered with a non-success status
    #[error("Backend error ({status}): {body}")]
    Backend { status: u16, body: String },

    /// Local filesystem error (source read, artifact write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every attempt failed; terminal for the work unit
    #[error("Retries exhausted after {attempts} attempts")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: Box<TranslateError>,
    },
}

impl TranslateError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        TranslateError::InvalidConfiguration(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        TranslateError::TransientNetworkFailure(msg.into())
    }

    /// Create a backend error from an HTTP status and body
    pub fn backend(status: u16, body: impl Into<String>) -> Self {
        TranslateError::Backend {
            status,
            body: body.into(),
        }
    }

    /// Whether another attempt could plausibly succeed
    ///
    /// Client errors other than 408 and 429 (bad key, unknown model, request
    /// too large) fail the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            TranslateError::TransientNetworkFailure(_) | TranslateError::Timeout(_) => true,
            TranslateError::Backend { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            TranslateError::Io(_) => true,
            TranslateError::InvalidConfiguration(_) | TranslateError::ExhaustedRetries { .. } => {
                false
            }
        }
    }
}

impl From<PoolError> for TranslateError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::InvalidConfiguration(msg) => TranslateError::InvalidConfiguration(msg),
        }
    }
}

impl From<RetryError<TranslateError>> for TranslateError {
    fn from(err: RetryError<TranslateError>) -> Self {
        match err {
            RetryError::ExhaustedRetries { attempts, source } => TranslateError::ExhaustedRetries {
                attempts,
                source: Box::new(source),
            },
            RetryError::Permanent { source, .. } => source,
        }
    }
}
