use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use readingtype_core::{Codec, Dictionary, FieldDefinition, MatchKind, SearchIndex, SparseFields};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::prompt::system_prompt;
use crate::relay::{self, Upstream};

pub struct AppState {
    pub codec: Codec<'static>,
    pub index: SearchIndex<'static>,
    pub prompt: String,
    /// `None` runs the relay in demo mode.
    pub upstream: Option<Upstream>,
}

impl AppState {
    pub fn new(dictionary: &'static Dictionary, upstream: Option<Upstream>) -> Self {
        Self {
            codec: Codec::new(dictionary),
            index: SearchIndex::new(dictionary),
            prompt: system_prompt(dictionary),
            upstream,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(relay::handle_chat))
        .route("/api/readingtype/encode", post(handle_encode))
        .route("/api/readingtype/decode", post(handle_decode))
        .route("/api/readingtype/search", get(handle_search))
        .route("/api/readingtype/dictionary", get(handle_dictionary))
        .with_state(state)
}

/// Codes may be sent as strings or bare numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeInput {
    Text(String),
    Number(u64),
}

impl CodeInput {
    fn into_code(self) -> String {
        match self {
            CodeInput::Text(text) => text,
            CodeInput::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EncodeRequest {
    #[serde(default)]
    fields: BTreeMap<String, CodeInput>,
}

#[derive(Debug, Serialize)]
struct EncodeResponse {
    code: String,
}

async fn handle_encode(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EncodeRequest>, JsonRejection>,
) -> Result<Json<EncodeResponse>, AppError> {
    let Json(request) = payload?;
    let mut sparse = SparseFields::new();
    for (key, code) in request.fields {
        let position = state
            .codec
            .resolve_key(&key)
            .ok_or_else(|| AppError::bad_request(format!("unknown field: {key}")))?;
        sparse.insert(position, code.into_code());
    }
    let code = state.codec.encode(&sparse);
    debug!(%code, "encoded reading type");
    Ok(Json(EncodeResponse { code }))
}

#[derive(Debug, Deserialize)]
struct DecodeRequest {
    code: String,
}

#[derive(Debug, Serialize)]
struct DecodeResponse {
    code: String,
    valid: bool,
    token_count: usize,
    fields: Vec<DecodedField>,
    issues: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DecodedField {
    position: u8,
    name: &'static str,
    display_name: &'static str,
    token: String,
    english: Option<&'static str>,
    native: Option<&'static str>,
}

async fn handle_decode(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DecodeRequest>, JsonRejection>,
) -> Result<Json<DecodeResponse>, AppError> {
    let Json(request) = payload?;
    let report = state.codec.decode(&request.code);
    let valid = report.is_valid();
    let fields = report
        .fields
        .into_iter()
        .map(|parsed| DecodedField {
            position: parsed.field.position,
            name: &parsed.field.name,
            display_name: &parsed.field.display_name,
            token: parsed.token,
            english: parsed.value.map(|entry| entry.english.as_str()),
            native: parsed.value.map(|entry| entry.native.as_str()),
        })
        .collect();
    Ok(Json(DecodeResponse {
        code: request.code,
        valid,
        token_count: report.token_count,
        fields,
        issues: report.issues.iter().map(ToString::to_string).collect(),
    }))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    query: String,
    hits: Vec<HitView>,
}

#[derive(Debug, Serialize)]
struct HitView {
    position: u8,
    field: &'static str,
    display_name: &'static str,
    code: &'static str,
    english: &'static str,
    native: &'static str,
    matched_on: MatchKind,
}

async fn handle_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let hits = state
        .index
        .search(&params.q)
        .into_iter()
        .map(|hit| HitView {
            position: hit.field.position,
            field: &hit.field.name,
            display_name: &hit.field.display_name,
            code: &hit.value.code,
            english: &hit.value.english,
            native: &hit.value.native,
            matched_on: hit.matched_on,
        })
        .collect();
    Json(SearchResponse {
        query: params.q,
        hits,
    })
}

async fn handle_dictionary(
    State(state): State<Arc<AppState>>,
) -> Json<&'static [FieldDefinition]> {
    Json(state.codec.dictionary().fields())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use futures::{stream, StreamExt};
    use parking_lot::Mutex;
    use readingtype_llm::{
        ChatMessage, ChatRequest, ChatStreamClient, HttpTransport, RevealPacing, SessionState,
        StreamCallbacks,
    };
    use serde_json::{json, Value};

    use super::*;
    use crate::config::UpstreamConfig;
    use crate::relay::DEMO_EXAMPLE;

    fn dictionary() -> &'static Dictionary {
        Box::leak(Box::new(Dictionary::standard()))
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn spawn_relay(upstream: Option<Upstream>) -> String {
        serve(router(Arc::new(AppState::new(dictionary(), upstream)))).await
    }

    struct Outcome {
        progress: Vec<String>,
        error: Option<String>,
        state: SessionState,
    }

    async fn converse(endpoint: String, stream: bool, text: &str) -> Outcome {
        let progress = Arc::new(Mutex::new(Vec::new()));
        let error = Arc::new(Mutex::new(None));
        let callbacks = {
            let progress = Arc::clone(&progress);
            let error = Arc::clone(&error);
            StreamCallbacks::new(
                move |text| progress.lock().push(text.to_string()),
                move |message| *error.lock() = Some(message),
                || {},
            )
        };
        let client = ChatStreamClient::new(HttpTransport::new(endpoint).unwrap())
            .with_reveal(RevealPacing::immediate());
        let request = ChatRequest::new(vec![ChatMessage::user(text)]).streaming(stream);
        let state = client.open(request, callbacks).join().await;
        let progress = progress.lock().clone();
        let error = error.lock().clone();
        Outcome {
            progress,
            error,
            state,
        }
    }

    #[tokio::test]
    async fn encode_accepts_names_positions_and_numbers() {
        let base = spawn_relay(None).await;
        let http = reqwest::Client::new();
        let body: Value = http
            .post(format!("{base}/api/readingtype/encode"))
            .json(&json!({"fields": {"measurementKind": "13", "uom": 29, "13": "1"}}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["code"], "0.0.0.0.0.0.13.0.0.0.0.0.1.0.29.0");

        let response = http
            .post(format!("{base}/api/readingtype/encode"))
            .json(&json!({"fields": {"voltage": "13"}}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "unknown field: voltage");
    }

    #[tokio::test]
    async fn decode_reports_labels_and_issues() {
        let base = spawn_relay(None).await;
        let http = reqwest::Client::new();
        let body: Value = http
            .post(format!("{base}/api/readingtype/decode"))
            .json(&json!({ "code": DEMO_EXAMPLE }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["valid"], true);
        assert_eq!(body["fields"].as_array().unwrap().len(), 16);
        assert_eq!(body["fields"][6]["english"], "voltage");
        assert_eq!(body["fields"][12]["native"], "A相");

        let body: Value = http
            .post(format!("{base}/api/readingtype/decode"))
            .json(&json!({ "code": "1.999" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["valid"], false);
        assert_eq!(body["token_count"], 2);
        assert_eq!(body["issues"].as_array().unwrap().len(), 2);
        assert_eq!(body["fields"][1]["english"], Value::Null);
    }

    #[tokio::test]
    async fn search_and_dictionary_endpoints() {
        let base = spawn_relay(None).await;
        let http = reqwest::Client::new();
        let body: Value = http
            .get(format!("{base}/api/readingtype/search?q=VOLT"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let hits = body["hits"].as_array().unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["position"], 7);
        assert_eq!(hits[0]["matched_on"], "english");

        let body: Value = http
            .get(format!("{base}/api/readingtype/search"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body["hits"].as_array().unwrap().is_empty());

        let body: Value = http
            .get(format!("{base}/api/readingtype/dictionary"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body.as_array().unwrap().len(), 16);
        assert_eq!(body[0]["englishName"], "macroPeriod");
    }

    #[tokio::test]
    async fn chat_rejects_empty_and_invalid_requests() {
        let base = spawn_relay(None).await;
        let http = reqwest::Client::new();
        let response = http
            .post(format!("{base}/api/chat"))
            .json(&json!({ "messages": [] }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "请提供消息内容");

        let response = http
            .post(format!("{base}/api/chat"))
            .header(header::CONTENT_TYPE, "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn demo_mode_answers_through_the_client() {
        let base = spawn_relay(None).await;
        let outcome = converse(format!("{base}/api/chat"), true, "生成A相电压的编码").await;
        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(outcome.error, None);
        assert!(outcome.progress.len() > 1);
        let text = outcome.progress.last().unwrap();
        assert!(text.contains(DEMO_EXAMPLE));
        assert!(text.contains("演示模式"));
    }

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    async fn fake_upstream(headers: HeaderMap, Json(body): Json<Value>) -> Response {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            == Some("Bearer sk-test");
        if !authorized {
            let error = json!({"error": {"message": "invalid api key"}});
            return (StatusCode::UNAUTHORIZED, Json(error)).into_response();
        }
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["max_tokens"], 3000);
        if body["stream"] == true {
            let records = [delta("你好"), delta("，世界"), "data: [DONE]\n\n".to_string()]
                .concat()
                .into_bytes();
            let chunks: Vec<Vec<u8>> = records.chunks(11).map(<[u8]>::to_vec).collect();
            let body = stream::iter(chunks).then(|chunk| async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                Ok::<_, std::convert::Infallible>(chunk)
            });
            return ([(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(body))
                .into_response();
        }
        Json(json!({"choices": [{"message": {"role": "assistant", "content": "整段回复"}}]}))
            .into_response()
    }

    async fn empty_choices() -> Json<Value> {
        Json(json!({ "choices": [] }))
    }

    async fn spawn_upstream_relay(api_key: &str) -> String {
        spawn_relay_to(api_key, "/v1/chat/completions").await
    }

    async fn spawn_relay_to(api_key: &str, path: &str) -> String {
        let upstream_base = serve(
            Router::new()
                .route("/v1/chat/completions", post(fake_upstream))
                .route("/v1/empty", post(empty_choices)),
        )
        .await;
        let config = UpstreamConfig {
            url: format!("{upstream_base}{path}"),
            ..UpstreamConfig::default()
        };
        let upstream = Upstream::new(config, api_key.to_string()).unwrap();
        spawn_relay(Some(upstream)).await
    }

    #[tokio::test]
    async fn upstream_stream_is_relayed_as_events() {
        let base = spawn_upstream_relay("sk-test").await;
        let outcome = converse(format!("{base}/api/chat"), true, "hi").await;
        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(
            outcome.progress,
            vec!["你好".to_string(), "你好，世界".to_string()]
        );
    }

    #[tokio::test]
    async fn upstream_whole_reply_is_relayed_as_content() {
        let base = spawn_upstream_relay("sk-test").await;
        let outcome = converse(format!("{base}/api/chat"), false, "hi").await;
        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(outcome.progress.last().map(String::as_str), Some("整段回复"));
    }

    #[tokio::test]
    async fn upstream_failures_surface_as_errors() {
        let base = spawn_upstream_relay("sk-wrong").await;
        let outcome = converse(format!("{base}/api/chat"), true, "hi").await;
        assert_eq!(outcome.state, SessionState::Failed);
        assert!(outcome.progress.is_empty());
        assert_eq!(outcome.error.as_deref(), Some("invalid api key"));
    }

    #[tokio::test]
    async fn upstream_reply_without_content_is_an_error() {
        let base = spawn_relay_to("sk-test", "/v1/empty").await;
        let response = reqwest::Client::new()
            .post(format!("{base}/api/chat"))
            .json(&json!({ "message": "hi", "stream": false }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "upstream response has no message content");

        let outcome = converse(format!("{base}/api/chat"), false, "hi").await;
        assert_eq!(outcome.state, SessionState::Failed);
        assert!(outcome.progress.is_empty());
        assert_eq!(
            outcome.error.as_deref(),
            Some("upstream response has no message content")
        );
    }
}
