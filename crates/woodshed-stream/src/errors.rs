use crate::document::StreamState;

/// Errors raised while turning a raw frame into a typed event.
///
/// These never leave the read loop: the frame is dropped and the stream
/// continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The `data:` line was not valid JSON.
    #[error("malformed frame payload: {0}")]
    MalformedJson(String),
    /// The frame carried an event name but no `data:` line.
    #[error("frame has no data line")]
    MissingData,
    /// A known event arrived without the fields its payload requires.
    #[error("invalid payload for event `{event}`: {message}")]
    InvalidPayload { event: String, message: String },
}

impl FrameError {
    pub(crate) fn invalid_payload(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            event: event.into(),
            message: message.into(),
        }
    }
}

/// Terminal stream failure reported through `StreamCallbacks::on_error` and
/// kept on the document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum StreamFailure {
    /// The stream could not be established or broke while reading.
    #[error("transport failure: {message}")]
    Transport { message: String },
    /// The backend sent an explicit `error` frame.
    #[error("{message}")]
    Upstream { message: String },
}

impl StreamFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Returns the human-readable message for this failure.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message } | Self::Upstream { message } => message,
        }
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid user input (for example an empty message).
    #[error("validation error: {0}")]
    Validation(String),
    /// Operation is not allowed in the session's current lifecycle state.
    #[error("invalid session state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        expected: StreamState,
        actual: StreamState,
    },
    /// Transport error raised while opening or reading the stream.
    #[error("transport error: {0}")]
    Transport(String),
    /// Terminal failure returned from a started stream.
    #[error(transparent)]
    Stream(StreamFailure),
    /// Internal invariant violation (for example a read loop that vanished).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<StreamFailure> for ClientError {
    fn from(value: StreamFailure) -> Self {
        ClientError::Stream(value)
    }
}

/// Maps a transport-side error onto the terminal failure surfaced to callers.
pub(crate) fn stream_failure_from_client_error(err: &ClientError) -> StreamFailure {
    match err {
        ClientError::Stream(failure) => failure.clone(),
        ClientError::Transport(message) => StreamFailure::transport(message.clone()),
        other => StreamFailure::transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_failure_displays_backend_message_verbatim() {
        let failure = StreamFailure::upstream("model not loaded");
        assert_eq!(failure.to_string(), "model not loaded");
        assert_eq!(failure.message(), "model not loaded");
    }

    #[test]
    fn transport_client_error_maps_to_transport_failure() {
        let failure = stream_failure_from_client_error(&ClientError::transport("reset by peer"));
        assert_eq!(failure, StreamFailure::transport("reset by peer"));
    }

    #[test]
    fn invalid_state_reports_both_states() {
        let err = ClientError::InvalidState {
            expected: StreamState::Idle,
            actual: StreamState::Streaming,
        };
        let text = err.to_string();
        assert!(text.contains("Idle") && text.contains("Streaming"), "{text}");
    }
}
