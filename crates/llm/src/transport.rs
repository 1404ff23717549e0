use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use thiserror::Error;

use crate::message::ChatRequest;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("{0}")]
    Envelope(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        Self::Network(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Response head plus a lazily read body.
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues the single outbound request of a session. Dropping the returned
/// future or body stream must release the underlying connection.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: ChatRequest) -> BoxFuture<'static, Result<TransportResponse>>;
}

#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(http, endpoint))
    }

    pub fn with_client(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ChatRequest) -> BoxFuture<'static, Result<TransportResponse>> {
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        async move {
            let response = http.post(&endpoint).json(&request).send().await?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let body = response.bytes_stream().map_err(TransportError::from).boxed();
            Ok(TransportResponse {
                status,
                content_type,
                body,
            })
        }
        .boxed()
    }
}
