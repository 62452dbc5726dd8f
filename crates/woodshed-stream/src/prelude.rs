//! Common imports for typical client usage.
pub use crate::{
    AbortHandle, ChatRequest, ChatTransport, ClientConfig, ClientError, ContentPart, Conversation,
    Creativity, Document, FnCallbacks, NoopCallbacks, StreamCallbacks, StreamFailure, StreamHandle,
    StreamSession, StreamState,
};
