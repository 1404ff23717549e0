mod client;
mod config;
mod decoder;
mod message;
mod session;
pub mod testing;
mod transport;

pub use client::ChatStreamClient;
pub use config::{ChatFileConfig, ClientConfig, RevealPacing, DEFAULT_ENDPOINT};
pub use decoder::{
    data_payload, decoder_for, error_message, DecodeEvent, EventStreamDecoder, LineSplitter,
    ResponseDecoder, WholeBodyDecoder, DONE_SENTINEL, EVENT_STREAM,
};
pub use message::{ChatMessage, ChatRequest, Conversation, Role};
pub use session::{Canceller, SessionState, StreamCallbacks, StreamHandle};
pub use transport::{
    ByteStream, HttpTransport, Result, Transport, TransportError, TransportResponse,
};
