//! API Models
//!
//! Request and response bodies of the HTTP surface, annotated for OpenAPI
//! generation with `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_SESSION_ID: &str = "default";

fn default_session_id() -> String {
    DEFAULT_SESSION_ID.to_string()
}

/// Body accepted by every relay endpoint.
#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct RelayRequest {
    #[schema(example = "Vorrei informazioni su un mutuo")]
    pub text: String,
    /// Conversation to continue; only `/chat` uses it.
    #[serde(default = "default_session_id")]
    #[schema(example = "default")]
    pub session_id: String,
}

/// Whole synthesized file, base64 encoded.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct TtsResponse {
    pub b64: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_request_defaults_session_id() {
        let json = r#"{"text": "Ciao"}"#;
        let payload: RelayRequest = serde_json::from_str(json).unwrap();

        assert_eq!(payload.text, "Ciao");
        assert_eq!(payload.session_id, "default");
    }

    #[test]
    fn test_relay_request_keeps_explicit_session_id() {
        let json = r#"{"text": "Ciao", "session_id": "abc-123"}"#;
        let payload: RelayRequest = serde_json::from_str(json).unwrap();

        assert_eq!(payload.session_id, "abc-123");
    }

    #[test]
    fn test_relay_request_missing_text() {
        let json = r#"{"session_id": "abc"}"#;
        let result: Result<RelayRequest, _> = serde_json::from_str(json);

        assert!(result.is_err()); // Should fail because text is required
    }

    #[test]
    fn test_tts_response_serialization() {
        let response = TtsResponse {
            b64: "SUQz".to_string(),
        };
        assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"b64":"SUQz"}"#);
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Upstream HTTP error 401: invalid key".to_string(),
        };

        let expected = r#"{"message":"Upstream HTTP error 401: invalid key"}"#;
        assert_eq!(serde_json::to_string(&error).unwrap(), expected);
    }
}
