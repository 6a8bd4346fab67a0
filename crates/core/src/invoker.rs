// Streaming translation invoker
//
// Runs one driver call: consumes its fragment stream under a wall-clock
// ceiling, accumulates text in memory and mirrors each delta to a recovery
// sink. No retries here; the retry governor wraps this.
//
// Decision: The sink lives in its own task fed by an unbounded channel. The
// stream loop only ever does a non-blocking send, so a slow or hung disk can
// delay neither accumulation nor the timeout.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::driver::{Fragment, TranslationDriver, TranslationRequest};
use crate::error::{Result, TranslateError};
use crate::recovery::RecoverySink;

/// How long an attempt waits for the recovery writer to drain and close
pub const RECOVERY_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one successful invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    /// Accumulated text, trimmed
    pub text: String,
    /// Deltas appended
    pub fragments: usize,
    /// Fragments skipped as unparsable
    pub malformed: usize,
}

impl Translation {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Consumes one driver stream under a timeout
#[derive(Debug, Clone, Copy)]
pub struct StreamingInvoker {
    timeout: Duration,
}

impl StreamingInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Translate one request
    ///
    /// On timeout the accumulated text is dropped and `Timeout` is returned.
    /// A transport that aborts mid-stream fails the same way with
    /// `TransientNetworkFailure`. In both cases whatever reached the sink
    /// stays there.
    ///
    /// The sink is written from a separate task. Its first failure is logged
    /// and ends mirroring for this attempt. Once the stream is done the call
    /// waits at most [`RECOVERY_CLOSE_TIMEOUT`] for the sink to close.
    pub async fn invoke(
        &self,
        driver: &dyn TranslationDriver,
        request: &TranslationRequest,
        sink: Box<dyn RecoverySink>,
    ) -> Result<Translation> {
        let recovery = sink.location().map(Path::to_path_buf);
        let (mirror, writer) = spawn_recovery_writer(request.unit.clone(), sink);

        let consumed = tokio::time::timeout(self.timeout, consume(driver, request, &mirror)).await;

        drop(mirror);
        close_recovery_writer(&request.unit, recovery.as_deref(), writer).await;

        let translation = match consumed {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    unit = %request.unit,
                    driver = driver.name(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    recovery = ?recovery,
                    "Translation timed out"
                );
                return Err(TranslateError::Timeout(self.timeout));
            }
        };

        if translation.is_empty() {
            warn!(unit = %request.unit, driver = driver.name(), "Backend returned empty translation");
        } else {
            debug!(
                unit = %request.unit,
                chars = translation.text.chars().count(),
                fragments = translation.fragments,
                malformed = translation.malformed,
                "Stream complete"
            );
        }
        Ok(translation)
    }
}

async fn consume(
    driver: &dyn TranslationDriver,
    request: &TranslationRequest,
    mirror: &mpsc::UnboundedSender<String>,
) -> Result<Translation> {
    let mut stream = driver.stream(request).await?;

    let mut text = String::new();
    let mut fragments = 0;
    let mut malformed = 0;

    while let Some(item) = stream.next().await {
        match item? {
            Fragment::Delta(delta) => {
                // Closed once the writer has given up on the sink
                let _ = mirror.send(delta.clone());
                text.push_str(&delta);
                fragments += 1;
            }
            Fragment::Malformed { raw, reason } => {
                warn!(unit = %request.unit, %reason, raw = %truncate(&raw, 200), "Skipping malformed fragment");
                malformed += 1;
            }
            Fragment::End => break,
        }
    }

    Ok(Translation {
        text: text.trim().to_string(),
        fragments,
        malformed,
    })
}

/// Move the sink into a task that appends every delta sent to it
///
/// The task drains the channel until every sender is dropped, then finishes
/// the sink. A failed write is logged once and ends the task early.
fn spawn_recovery_writer(
    unit: String,
    mut sink: Box<dyn RecoverySink>,
) -> (mpsc::UnboundedSender<String>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let handle = tokio::spawn(async move {
        while let Some(delta) = rx.recv().await {
            if let Err(e) = sink.write(&delta).await {
                warn!(
                    unit = %unit,
                    recovery = ?sink.location(),
                    error = %e,
                    "Recovery write failed; no longer mirroring this attempt"
                );
                break;
            }
        }
        drop(rx);

        if let Err(e) = sink.finish().await {
            warn!(unit = %unit, recovery = ?sink.location(), error = %e, "Failed to close recovery file");
        }
    });

    (tx, handle)
}

async fn close_recovery_writer(unit: &str, recovery: Option<&Path>, writer: JoinHandle<()>) {
    match tokio::time::timeout(RECOVERY_CLOSE_TIMEOUT, writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(unit = %unit, recovery = ?recovery, error = %e, "Recovery writer stopped abnormally");
        }
        Err(_) => {
            // Left running; the file may still receive the rest of the text
            warn!(
                unit = %unit,
                recovery = ?recovery,
                wait_secs = RECOVERY_CLOSE_TIMEOUT.as_secs(),
                "Recovery file not closed in time; continuing without it"
            );
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
