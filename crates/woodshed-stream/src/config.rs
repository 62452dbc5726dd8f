use std::time::Duration;

use crate::errors::ClientError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(16);

/// Configuration for the chat client and its stream sessions.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the backend (without the `/api` suffix).
    pub base_url: String,
    /// Optional timeout for the whole chat request.
    ///
    /// `None` leaves timeout policy to the server; the read loop itself never
    /// times out.
    pub request_timeout: Option<Duration>,
    /// Interval between a token arriving and its coalesced flush.
    pub flush_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl ClientConfig {
    /// Creates a config pointing at the given backend.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a config from the environment.
    ///
    /// - `WOODSHED_API_URL`: backend base URL (default `http://localhost:8000`).
    /// - `WOODSHED_REQUEST_TIMEOUT_SECS`: optional request timeout.
    /// - `WOODSHED_FLUSH_INTERVAL_MS`: token flush interval (default 16).
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = match std::env::var("WOODSHED_API_URL") {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        };
        if let Some(secs) = parse_env_u64("WOODSHED_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(ms) = parse_env_u64("WOODSHED_FLUSH_INTERVAL_MS")? {
            config.flush_interval = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the backend base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets a timeout for the chat request.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Overrides the token flush interval.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        if reqwest::Url::parse(&self.base_url).is_err() {
            return Err(ClientError::Config(format!(
                "base_url is not a valid URL: {}",
                self.base_url
            )));
        }
        if self.flush_interval.is_zero() {
            return Err(ClientError::Config(
                "flush_interval must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Streaming chat endpoint.
    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    /// Download URL for a generated file.
    pub fn file_url(&self, filename: &str) -> Result<reqwest::Url, ClientError> {
        self.api_url(&["files", "download", filename])
    }

    /// URL serving a generated MIDI file for inline playback.
    pub fn midi_url(&self, filename: &str) -> Result<reqwest::Url, ClientError> {
        self.api_url(&["files", "midi", filename])
    }

    fn api_url(&self, segments: &[&str]) -> Result<reqwest::Url, ClientError> {
        let mut url = reqwest::Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| ClientError::Config(format!("invalid base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Config("base_url cannot be a base".into()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }
}

fn parse_env_u64(key: &str) -> Result<Option<u64>, ClientError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ClientError::Config(format!("invalid {key}: {e}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_backend_at_sixty_hertz() {
        let config = ClientConfig::default();
        assert_eq!(config.chat_url(), "http://localhost:8000/api/chat");
        assert_eq!(config.flush_interval, Duration::from_millis(16));
        assert!(config.request_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn chat_url_tolerates_trailing_slash() {
        let config = ClientConfig::new("http://studio.local:9000/");
        assert_eq!(config.chat_url(), "http://studio.local:9000/api/chat");
    }

    #[test]
    fn file_url_encodes_filename_as_one_segment() {
        let config = ClientConfig::new("http://localhost:8000");
        let url = config.file_url("my riff #2.mid").expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/files/download/my%20riff%20%232.mid"
        );
        let midi = config.midi_url("a/b.mid").expect("url");
        assert_eq!(midi.as_str(), "http://localhost:8000/api/files/midi/a%2Fb.mid");
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let err = ClientConfig::default()
            .flush_interval(Duration::ZERO)
            .validate();
        assert!(matches!(err, Err(ClientError::Config(msg)) if msg.contains("flush_interval")));
    }

    #[test]
    fn validate_rejects_unparsable_base_url() {
        let err = ClientConfig::new("not a url").validate();
        assert!(matches!(err, Err(ClientError::Config(msg)) if msg.contains("base_url")));
    }
}
