//! Error taxonomy shared by every relay.

use std::time::Duration;

/// Failure of an upstream relay, classified by where it originated.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A provider credential is missing or unusable.
    #[error("Configuration error: {0}")]
    Config(String),
    /// The connection to the provider could not be established or dropped mid-stream.
    #[error("Upstream transport error: {0}")]
    Transport(String),
    /// The provider sent something we cannot interpret.
    #[error("Upstream protocol error: {0}")]
    Protocol(String),
    /// A non-streaming request returned a non-success status.
    #[error("Upstream HTTP error {status}: {body}")]
    Http { status: u16, body: String },
    /// No message arrived from the provider within the idle window.
    #[error("Upstream stalled: no data received within {0:?}")]
    Timeout(Duration),
}

impl From<async_openai::error::OpenAIError> for RelayError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        use async_openai::error::OpenAIError;
        match err {
            OpenAIError::InvalidArgument(msg) => Self::Config(msg),
            OpenAIError::JSONDeserialize(e) => Self::Protocol(e.to_string()),
            OpenAIError::StreamError(msg) if is_auth_rejection(&msg) => {
                Self::Config(format!("LLM provider rejected the credentials: {msg}"))
            }
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Streaming failures only carry the provider's status line.
fn is_auth_rejection(msg: &str) -> bool {
    msg.contains("401") || msg.contains("403")
}

impl From<tokio_tungstenite::tungstenite::Error> for RelayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display_carries_status_and_body() {
        let err = RelayError::Http {
            status: 401,
            body: "invalid api key".to_string(),
        };
        assert_eq!(err.to_string(), "Upstream HTTP error 401: invalid api key");
    }

    #[test]
    fn test_timeout_is_distinct_from_transport() {
        let err = RelayError::Timeout(Duration::from_secs(5));
        assert!(matches!(err, RelayError::Timeout(d) if d.as_secs() == 5));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn test_json_error_maps_to_protocol() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(RelayError::from(json_err), RelayError::Protocol(_)));
    }

    #[test]
    fn test_rejected_stream_credentials_map_to_config() {
        use async_openai::error::OpenAIError;

        let rejected = OpenAIError::StreamError("Invalid status code: 401 Unauthorized".into());
        assert!(matches!(RelayError::from(rejected), RelayError::Config(_)));

        let unreachable = OpenAIError::StreamError("error sending request".into());
        assert!(matches!(RelayError::from(unreachable), RelayError::Transport(_)));
    }
}
