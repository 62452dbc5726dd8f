use std::pin::Pin;

use futures::StreamExt as _;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::ClientError;

/// Incremental body of an open chat stream.
pub type ChunkStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, ClientError>> + Send + 'static>>;

/// How creative the backend should be with its answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Creativity {
    #[serde(rename = "More Precise")]
    Precise,
    #[default]
    #[serde(rename = "Balanced")]
    Balanced,
    #[serde(rename = "More Creative")]
    Creative,
}

/// Body of `POST /api/chat`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub creativity: Creativity,
    /// Conversation identity sent as `X-Session-ID`.
    #[serde(skip)]
    pub conversation_id: uuid::Uuid,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            creativity: Creativity::default(),
            conversation_id: uuid::Uuid::new_v4(),
        }
    }

    pub fn creativity(mut self, creativity: Creativity) -> Self {
        self.creativity = creativity;
        self
    }

    pub fn conversation_id(mut self, id: uuid::Uuid) -> Self {
        self.conversation_id = id;
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.message.trim().is_empty() {
            return Err(ClientError::Validation("message must not be empty".into()));
        }
        Ok(())
    }
}

/// Source of the raw event stream.
///
/// Implementations open the stream and hand back its body. Stopping is
/// cooperative: the session simply drops the returned stream.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<ChunkStream, ClientError>;
}

/// Transport that POSTs to the backend's chat endpoint over HTTP.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ChunkStream, ClientError> {
        let url = self.config.chat_url();
        debug!(conversation_id = %request.conversation_id, url = %url, "opening chat stream");

        let mut http_req = self
            .client
            .post(&url)
            .header("X-Session-ID", request.conversation_id.to_string())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request);
        if let Some(timeout) = self.config.request_timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("chat request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::transport(format!(
                "chat request failed with status {}",
                status.as_u16()
            )));
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| ClientError::transport(format!("chat stream read failed: {e}")))
        });
        Ok(Box::pin(stream))
    }
}
