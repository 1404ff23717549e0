use std::sync::Arc;

use crate::config::{ClientConfig, RevealPacing};
use crate::message::ChatRequest;
use crate::session::{SessionDriver, SessionShared, StreamCallbacks, StreamHandle};
use crate::transport::{HttpTransport, Result, Transport};

/// Opens cancellable chat sessions over a [`Transport`]. Sessions are
/// independent; each owns its own decoder and buffers.
#[derive(Clone)]
pub struct ChatStreamClient {
    transport: Arc<dyn Transport>,
    reveal: RevealPacing,
}

impl ChatStreamClient {
    pub fn new(transport: impl Transport) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    pub fn from_shared(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            reveal: RevealPacing::default(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.endpoint.clone())?;
        Ok(Self::new(transport).with_reveal(config.reveal))
    }

    pub fn with_reveal(mut self, reveal: RevealPacing) -> Self {
        self.reveal = reveal;
        self
    }

    /// Starts a session on the current Tokio runtime and returns its handle
    /// immediately. No callback fires before this returns.
    pub fn open(&self, request: ChatRequest, callbacks: StreamCallbacks) -> StreamHandle {
        let shared = Arc::new(SessionShared::new());
        let driver = SessionDriver::new(Arc::clone(&shared), callbacks, self.reveal);
        let task = tokio::spawn(driver.run(Arc::clone(&self.transport), request));
        StreamHandle::new(shared, task)
    }
}
