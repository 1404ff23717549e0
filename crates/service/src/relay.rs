use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use readingtype_core::Codec;
use readingtype_llm::{
    data_payload, error_message, ChatMessage, LineSplitter, Role, DONE_SENTINEL, EVENT_STREAM,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::UpstreamConfig;
use crate::error::AppError;
use crate::routes::AppState;

/// A-phase instantaneous voltage, used to illustrate decoding in demo mode.
pub const DEMO_EXAMPLE: &str = "0.0.0.3.0.1.13.0.0.0.0.0.1.0.29.0";

const EMPTY_REQUEST: &str = "请提供消息内容";
const DEMO_NOTICE: &str = "💡 注意：这是演示模式，请配置DeepSeek API密钥以获得完整的AI功能。";
const WELCOME: &str = "👋 欢迎使用ReadingType编码助手！

我可以帮助您：

🚀 **生成编码**
- 基于描述智能生成ReadingType编码
- 示例：\"生成A相电压量测的编码\"

🔧 **编码解析**
- 解析ReadingTypeID为可读描述
- 字段含义解释

🛑 **终止功能**
- 生成过程中可随时终止

请告诉我您需要什么帮助！
";

#[derive(Debug, Default, Deserialize)]
pub struct ChatPayload {
    pub messages: Option<Vec<ChatMessage>>,
    pub message: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatReply {
    content: String,
}

/// Normalizes a request into a history whose first message is `prompt`.
pub fn build_history(payload: ChatPayload, prompt: &str) -> Result<Vec<ChatMessage>, AppError> {
    let mut history = match (payload.messages, payload.message) {
        (Some(messages), _) if !messages.is_empty() => messages,
        (_, Some(message)) if !message.trim().is_empty() => vec![ChatMessage::user(message)],
        _ => return Err(AppError::bad_request(EMPTY_REQUEST)),
    };
    match history.first_mut() {
        Some(first) if first.role == Role::System => first.content = prompt.to_string(),
        _ => history.insert(0, ChatMessage::system(prompt)),
    }
    Ok(history)
}

pub fn demo_reply(codec: &Codec<'_>, user_text: &str) -> String {
    let mut reply = if user_text.contains("生成") || user_text.contains("编码") {
        let mut text = format!(
            "🤖 ReadingType编码示例\n\n针对您的描述“{}”，以下是A相瞬时电压量测的编码：\n\n💡 示例编码：{DEMO_EXAMPLE}\n\n📖 字段解释：\n",
            user_text.trim()
        );
        for line in codec.decode(DEMO_EXAMPLE).describe() {
            text.push_str(&line);
            text.push('\n');
        }
        text
    } else {
        WELCOME.to_string()
    };
    reply.push('\n');
    reply.push_str(DEMO_NOTICE);
    reply
}

#[derive(Clone)]
pub struct Upstream {
    http: reqwest::Client,
    config: UpstreamConfig,
    api_key: String,
}

#[derive(Serialize)]
struct UpstreamRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

impl Upstream {
    pub fn new(config: UpstreamConfig, api_key: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, AppError> {
        let body = UpstreamRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream,
        };
        let response = self
            .http
            .post(&self.config.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::upstream(format!("network error: {err}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        let message = payload
            .get("error")
            .and_then(error_message)
            .unwrap_or_else(|| format!("upstream responded with status {}", status.as_u16()));
        Err(AppError::upstream(message))
    }
}

pub async fn handle_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    let stream = payload.stream;
    let history = build_history(payload, &state.prompt)?;
    let Some(upstream) = &state.upstream else {
        info!(messages = history.len(), "answering in demo mode");
        let user_text = history.last().map(|m| m.content.as_str()).unwrap_or("");
        let content = demo_reply(&state.codec, user_text);
        return Ok(Json(ChatReply { content }).into_response());
    };
    info!(messages = history.len(), stream, "relaying chat upstream");
    let response = upstream.send(&history, stream).await?;
    if stream {
        return Ok(event_stream(response.bytes_stream().boxed()));
    }
    let body: Value = response
        .json()
        .await
        .map_err(|err| AppError::upstream(format!("invalid upstream response: {err}")))?;
    let content = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::upstream("upstream response has no message content"))?;
    Ok(Json(ChatReply {
        content: content.to_string(),
    })
    .into_response())
}

/// Re-frames upstream `data:` lines as event-stream records and appends a
/// single terminating `[DONE]`.
fn event_stream(body: BoxStream<'static, reqwest::Result<Bytes>>) -> Response {
    let frames = stream::unfold(Some((body, Reframer::default())), |state| async move {
        let (mut body, mut reframer) = state?;
        loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    let frames = reframer.push(&chunk);
                    if !frames.is_empty() {
                        return Some((Ok(Bytes::from(frames)), Some((body, reframer))));
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, "upstream stream broke off");
                    return Some((Err(io::Error::other(err)), None));
                }
                None => return Some((Ok(Bytes::from(reframer.finish())), None)),
            }
        }
    });
    (
        [(CONTENT_TYPE, EVENT_STREAM), (CACHE_CONTROL, "no-cache")],
        Body::from_stream(frames),
    )
        .into_response()
}

#[derive(Debug, Default)]
struct Reframer {
    lines: LineSplitter,
    frames: usize,
}

impl Reframer {
    fn push(&mut self, chunk: &[u8]) -> String {
        let lines = self.lines.push(chunk);
        lines.iter().filter_map(|line| self.frame(line)).collect()
    }

    fn finish(&mut self) -> String {
        let mut out = String::new();
        if let Some(line) = self.lines.flush() {
            out.extend(self.frame(&line));
        }
        debug!(frames = self.frames, "upstream stream finished");
        out.push_str("data: ");
        out.push_str(DONE_SENTINEL);
        out.push_str("\n\n");
        out
    }

    fn frame(&mut self, line: &str) -> Option<String> {
        let payload = data_payload(line)?;
        if payload.is_empty() || payload == DONE_SENTINEL {
            return None;
        }
        self.frames += 1;
        Some(format!("data: {payload}\n\n"))
    }
}
