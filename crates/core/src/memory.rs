// In-memory translation driver
//
// Replays scripted responses instead of calling a backend. Used by tests and
// by the `echo` provider for offline smoke runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use crate::driver::{Fragment, FragmentStream, TranslationDriver, TranslationRequest};
use crate::error::{Result, TranslateError};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Yield these fragments, then close the stream
    Stream(Vec<Fragment>),
    /// Fail before any fragment with a network error
    Network(String),
    /// Fail before any fragment with an HTTP status
    Backend { status: u16, body: String },
    /// Yield these deltas, then a transport error
    Interrupted(Vec<String>),
    /// Yield these deltas, then never finish
    Stall(Vec<String>),
}

impl ScriptedResponse {
    /// Deltas followed by an end marker
    pub fn deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fragments: Vec<Fragment> = deltas
            .into_iter()
            .map(|d| Fragment::Delta(d.into()))
            .collect();
        fragments.push(Fragment::End);
        ScriptedResponse::Stream(fragments)
    }

    fn into_stream(self) -> Result<FragmentStream> {
        match self {
            ScriptedResponse::Stream(fragments) => {
                Ok(Box::pin(stream::iter(fragments.into_iter().map(Ok))))
            }
            ScriptedResponse::Network(msg) => Err(TranslateError::network(msg)),
            ScriptedResponse::Backend { status, body } => Err(TranslateError::backend(status, body)),
            ScriptedResponse::Interrupted(deltas) => {
                let head = stream::iter(deltas.into_iter().map(|d| Ok(Fragment::Delta(d))));
                let tail = stream::once(async { Err(TranslateError::network("connection reset mid-stream")) });
                Ok(Box::pin(head.chain(tail)))
            }
            ScriptedResponse::Stall(deltas) => {
                let head = stream::iter(deltas.into_iter().map(|d| Ok(Fragment::Delta(d))));
                Ok(Box::pin(head.chain(stream::pending())))
            }
        }
    }
}

/// What to do once the script runs out
#[derive(Debug, Clone)]
enum Fallback {
    /// Stream the user prompt back line by line
    Echo,
    /// Replay the same response forever
    Repeat(ScriptedResponse),
}

/// Driver that replays a script
#[derive(Debug)]
pub struct ScriptedDriver {
    name: String,
    script: Mutex<VecDeque<ScriptedResponse>>,
    fallback: Fallback,
    latency: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<TranslationRequest>>,
}

impl ScriptedDriver {
    /// Replay `script` in order, then echo
    pub fn new(script: Vec<ScriptedResponse>) -> Self {
        Self {
            name: "scripted".to_string(),
            script: Mutex::new(script.into()),
            fallback: Fallback::Echo,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Echo every request's user prompt
    pub fn echo() -> Self {
        Self::new(Vec::new()).with_name("echo")
    }

    /// Answer every call with the same response
    pub fn always(response: ScriptedResponse) -> Self {
        Self {
            fallback: Fallback::Repeat(response),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Delay before each stream is returned
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of `stream` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests seen so far, in call order
    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().clone()
    }

    fn next_response(&self, request: &TranslationRequest) -> ScriptedResponse {
        if let Some(response) = self.script.lock().pop_front() {
            return response;
        }
        match &self.fallback {
            Fallback::Repeat(response) => response.clone(),
            Fallback::Echo => ScriptedResponse::deltas(request.user_prompt.split_inclusive('\n')),
        }
    }
}

#[async_trait]
impl TranslationDriver for ScriptedDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: &TranslationRequest) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let response = self.next_response(request);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        response.into_stream()
    }
}
