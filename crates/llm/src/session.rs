use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RevealPacing;
use crate::decoder::{decoder_for, error_message, DecodeEvent};
use crate::message::ChatRequest;
use crate::transport::{ByteStream, Transport, TransportError};

const ERROR_BODY_LIMIT: usize = 64 * 1024;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle = 0,
    Requesting = 1,
    Streaming = 2,
    Completed = 3,
    Failed = 4,
    Cancelled = 5,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Requesting,
            2 => SessionState::Streaming,
            3 => SessionState::Completed,
            4 => SessionState::Failed,
            _ => SessionState::Cancelled,
        }
    }
}

/// State shared between the session task and its cancel handles. Every
/// transition is a compare-and-swap, so at most one terminal state is ever
/// entered.
#[derive(Debug)]
pub(crate) struct SessionShared {
    state: AtomicU8,
}

impl SessionShared {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Idle as u8),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn advance(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn cancel(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if SessionState::from_u8(current).is_terminal() {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                SessionState::Cancelled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn fail(&self) -> bool {
        self.advance(SessionState::Streaming, SessionState::Failed)
            || self.advance(SessionState::Requesting, SessionState::Failed)
    }
}

type ProgressFn = Box<dyn FnMut(&str) + Send>;
type ErrorFn = Box<dyn FnOnce(String) + Send>;
type CompleteFn = Box<dyn FnOnce() + Send>;

/// Subscriber for one session. `on_progress` always receives the full text
/// accumulated so far; `on_error` and `on_complete` are mutually exclusive.
pub struct StreamCallbacks {
    on_progress: ProgressFn,
    on_error: Option<ErrorFn>,
    on_complete: Option<CompleteFn>,
}

impl StreamCallbacks {
    pub fn new<P, E, C>(on_progress: P, on_error: E, on_complete: C) -> Self
    where
        P: FnMut(&str) + Send + 'static,
        E: FnOnce(String) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        Self {
            on_progress: Box::new(on_progress),
            on_error: Some(Box::new(on_error)),
            on_complete: Some(Box::new(on_complete)),
        }
    }
}

/// Cloneable cancel capability, safe to call from callbacks or signal handlers.
#[derive(Debug, Clone)]
pub struct Canceller {
    shared: Arc<SessionShared>,
    abort: AbortHandle,
}

impl Canceller {
    /// Idempotent. Suppresses every later callback and aborts the in-flight request.
    pub fn cancel(&self) {
        if self.shared.cancel() {
            debug!("chat session cancelled");
        }
        self.abort.abort();
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }
}

pub struct StreamHandle {
    canceller: Canceller,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub(crate) fn new(shared: Arc<SessionShared>, task: JoinHandle<()>) -> Self {
        let canceller = Canceller {
            shared,
            abort: task.abort_handle(),
        };
        Self { canceller, task }
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    pub fn state(&self) -> SessionState {
        self.canceller.state()
    }

    /// Waits for the session task to stop and returns its final state.
    pub async fn join(self) -> SessionState {
        if let Err(err) = self.task.await {
            if err.is_panic() {
                warn!("chat session task panicked");
            }
        }
        self.canceller.state()
    }
}

pub(crate) struct SessionDriver {
    shared: Arc<SessionShared>,
    callbacks: StreamCallbacks,
    reveal: RevealPacing,
    text: String,
}

impl SessionDriver {
    pub(crate) fn new(
        shared: Arc<SessionShared>,
        callbacks: StreamCallbacks,
        reveal: RevealPacing,
    ) -> Self {
        Self {
            shared,
            callbacks,
            reveal,
            text: String::new(),
        }
    }

    pub(crate) async fn run(mut self, transport: Arc<dyn Transport>, request: ChatRequest) {
        if !self
            .shared
            .advance(SessionState::Idle, SessionState::Requesting)
        {
            return;
        }
        debug!(
            messages = request.messages.len(),
            stream = request.stream,
            "opening chat session"
        );
        let response = match transport.send(request).await {
            Ok(response) => response,
            Err(err) => return self.fail(err),
        };
        if !response.is_success() {
            let status = response.status;
            let body = read_error_body(response.body).await;
            return self.fail(status_error(status, &body));
        }
        if !self
            .shared
            .advance(SessionState::Requesting, SessionState::Streaming)
        {
            return;
        }
        debug!(
            status = response.status,
            content_type = response.content_type.as_deref().unwrap_or(""),
            "chat session streaming"
        );
        let mut decoder = decoder_for(response.content_type.as_deref());
        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            if self.shared.state() != SessionState::Streaming {
                return;
            }
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => return self.fail(err),
            };
            let events = decoder.feed(&chunk);
            if !self.apply(events).await {
                return;
            }
        }
        let events = decoder.finish();
        if self.apply(events).await {
            self.complete();
        }
    }

    /// Returns `false` once the session has reached a terminal state.
    async fn apply(&mut self, events: Vec<DecodeEvent>) -> bool {
        for event in events {
            match event {
                DecodeEvent::Delta(delta) => {
                    self.text.push_str(&delta);
                    if !self.progress() {
                        return false;
                    }
                }
                DecodeEvent::Body(content) => {
                    if self.reveal(&content).await {
                        self.complete();
                    }
                    return false;
                }
                DecodeEvent::Done => {
                    self.complete();
                    return false;
                }
                DecodeEvent::Failed(message) => {
                    self.fail(TransportError::Envelope(message));
                    return false;
                }
            }
        }
        true
    }

    /// Replays a whole reply as a sequence of growing prefixes.
    async fn reveal(&mut self, content: &str) -> bool {
        let step = self.reveal.step_chars.max(1);
        let total = content.chars().count();
        let mut pending = 0usize;
        for (idx, ch) in content.chars().enumerate() {
            self.text.push(ch);
            pending += 1;
            let last = idx + 1 == total;
            if pending < step && !last {
                continue;
            }
            pending = 0;
            if !self.progress() {
                return false;
            }
            if !last {
                pause(self.reveal.pause).await;
            }
        }
        self.shared.state() == SessionState::Streaming
    }

    fn progress(&mut self) -> bool {
        if self.shared.state() != SessionState::Streaming {
            return false;
        }
        (self.callbacks.on_progress)(&self.text);
        true
    }

    fn complete(&mut self) {
        if self
            .shared
            .advance(SessionState::Streaming, SessionState::Completed)
        {
            debug!(chars = self.text.chars().count(), "chat session completed");
            if let Some(on_complete) = self.callbacks.on_complete.take() {
                on_complete();
            }
        }
    }

    fn fail(&mut self, err: TransportError) {
        if self.shared.fail() {
            warn!(error = %err, "chat session failed");
            if let Some(on_error) = self.callbacks.on_error.take() {
                on_error(err.to_string());
            }
        }
    }
}

async fn pause(duration: Duration) {
    if duration.is_zero() {
        tokio::task::yield_now().await;
    } else {
        sleep(duration).await;
    }
}

async fn read_error_body(mut body: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(Ok(chunk)) = body.next().await {
        out.extend_from_slice(&chunk);
        if out.len() >= ERROR_BODY_LIMIT {
            break;
        }
    }
    out
}

fn status_error(status: u16, body: &[u8]) -> TransportError {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(error_message))
        .unwrap_or_else(|| format!("request failed with status {status}"));
    TransportError::Status { status, message }
}
