//! Scripted [`Transport`] for exercising sessions without a network.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use parking_lot::Mutex;

use crate::decoder::EVENT_STREAM;
use crate::message::ChatRequest;
use crate::transport::{Result, Transport, TransportError, TransportResponse};

#[derive(Debug, Clone)]
enum Step {
    Chunk(Bytes),
    Fail(String),
    Wait(Duration),
    Hang,
}

#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    status: u16,
    content_type: Option<String>,
    head_delay: Duration,
    steps: Vec<Step>,
}

impl ScriptedResponse {
    pub fn new(status: u16, content_type: Option<&str>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            head_delay: Duration::ZERO,
            steps: Vec::new(),
        }
    }

    pub fn event_stream<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        chunks
            .into_iter()
            .fold(Self::new(200, Some(EVENT_STREAM)), |response, chunk| {
                let text: String = chunk.into();
                response.chunk(text)
            })
    }

    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::new(status, Some("application/json")).chunk(body.to_string())
    }

    pub fn chunk(mut self, data: impl Into<Bytes>) -> Self {
        self.steps.push(Step::Chunk(data.into()));
        self
    }

    pub fn wait(mut self, delay: Duration) -> Self {
        self.steps.push(Step::Wait(delay));
        self
    }

    /// Ends the body with a read error.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push(Step::Fail(message.into()));
        self
    }

    /// The body never yields past this point.
    pub fn hang(mut self) -> Self {
        self.steps.push(Step::Hang);
        self
    }

    pub fn delay_head(mut self, delay: Duration) -> Self {
        self.head_delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Response(ScriptedResponse),
    Refuse(String),
}

/// Replies to each `send` with the next scripted reply, recording requests.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: ScriptedResponse) -> Self {
        self.replies.lock().push_back(Reply::Response(response));
        self
    }

    /// The next `send` fails before any response head arrives.
    pub fn refuse(self, message: impl Into<String>) -> Self {
        self.replies.lock().push_back(Reply::Refuse(message.into()));
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: ChatRequest) -> BoxFuture<'static, Result<TransportResponse>> {
        self.requests.lock().push(request);
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Reply::Refuse("no scripted reply left".to_string()));
        async move {
            let scripted = match reply {
                Reply::Response(scripted) => scripted,
                Reply::Refuse(message) => return Err(TransportError::Network(message)),
            };
            if !scripted.head_delay.is_zero() {
                tokio::time::sleep(scripted.head_delay).await;
            }
            let steps: VecDeque<Step> = scripted.steps.into();
            let body = stream::unfold(steps, |mut steps| async move {
                loop {
                    match steps.pop_front()? {
                        Step::Chunk(bytes) => return Some((Ok(bytes), steps)),
                        Step::Fail(message) => {
                            steps.clear();
                            return Some((Err(TransportError::Network(message)), steps));
                        }
                        Step::Wait(delay) => tokio::time::sleep(delay).await,
                        Step::Hang => futures::future::pending::<()>().await,
                    }
                }
            })
            .boxed();
            Ok(TransportResponse {
                status: scripted.status,
                content_type: scripted.content_type,
                body,
            })
        }
        .boxed()
    }
}
