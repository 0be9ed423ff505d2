//! Legacy one-shot synthesis over plain HTTP.

use crate::{
    error::RelayError,
    persona::{BATCH_OUTPUT_FORMAT, TTS_MODEL, VOICE_ID, VOICE_SETTINGS, VoiceSettings},
};
use bytes::Bytes;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};
use tracing::{info, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize, Debug)]
struct BatchRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// Client for the non-streaming synthesis endpoint.
///
/// The HTTP call is blocking; [`BatchSpeechClient::synthesize_batch`] runs it
/// on the blocking worker pool so it never stalls the async runtime.
#[derive(Debug)]
pub struct BatchSpeechClient {
    api_key: SecretString,
    api_base: String,
    /// Built on first use, on a blocking worker thread.
    http: OnceLock<reqwest::blocking::Client>,
}

impl BatchSpeechClient {
    /// # Arguments
    ///
    /// * `api_base` - Scheme and host of the HTTP API, e.g. `https://api.elevenlabs.io`.
    pub fn new(api_key: SecretString, api_base: impl Into<String>) -> Self {
        Self {
            api_key,
            api_base: api_base.into(),
            http: OnceLock::new(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{VOICE_ID}",
            self.api_base.trim_end_matches('/')
        )
    }

    /// Synthesizes `text` on a blocking worker thread and returns the whole audio file.
    pub async fn synthesize_batch(self: &Arc<Self>, text: &str) -> Result<Bytes, RelayError> {
        let client = Arc::clone(self);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.synthesize_blocking(&text))
            .await
            .map_err(|e| RelayError::Transport(format!("synthesis worker failed: {e}")))?
    }

    /// Issues the synthesis request on the current thread.
    ///
    /// Must not be called from an async context.
    #[instrument(skip_all, fields(chars = text.len()))]
    pub fn synthesize_blocking(&self, text: &str) -> Result<Bytes, RelayError> {
        let response = self
            .http()?
            .post(self.endpoint())
            .query(&[("output_format", BATCH_OUTPUT_FORMAT)])
            .header("xi-api-key", self.api_key.expose_secret())
            .header(ACCEPT, "audio/mpeg")
            .json(&BatchRequest {
                text,
                model_id: TTS_MODEL,
                voice_settings: VOICE_SETTINGS,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(%status, "Batch synthesis rejected by provider");
            return Err(RelayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes()?;
        info!(bytes = audio.len(), "Batch synthesis complete");
        Ok(audio)
    }

    fn http(&self) -> Result<&reqwest::blocking::Client, RelayError> {
        if let Some(client) = self.http.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(self.http.get_or_init(|| client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path, query_param},
    };

    fn client_for(server: &MockServer) -> Arc<BatchSpeechClient> {
        Arc::new(BatchSpeechClient::new(
            SecretString::from("xi-test-key".to_string()),
            server.uri(),
        ))
    }

    #[tokio::test]
    async fn test_success_returns_body_verbatim() {
        let server = MockServer::start().await;
        let audio = b"ID3\x04\x00fake-mp3-frames".to_vec();
        Mock::given(method("POST"))
            .and(path(format!("/v1/text-to-speech/{VOICE_ID}")))
            .and(query_param("output_format", "mp3_22050_32"))
            .and(header("xi-api-key", "xi-test-key"))
            .and(header("accept", "audio/mpeg"))
            .and(body_partial_json(serde_json::json!({
                "text": "Buongiorno",
                "model_id": "eleven_multilingual_v2",
                "voice_settings": { "use_speaker_boost": true }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(audio.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server).synthesize_batch("Buongiorno").await.unwrap();

        assert_eq!(result.as_ref(), audio.as_slice());
    }

    #[tokio::test]
    async fn test_unauthorized_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_api_key"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .synthesize_batch("Buongiorno")
            .await
            .unwrap_err();

        match err {
            RelayError::Http { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid_api_key");
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_transport_error() {
        let client = Arc::new(BatchSpeechClient::new(
            SecretString::from("xi-test-key".to_string()),
            "http://127.0.0.1:9",
        ));

        let err = client.synthesize_batch("Ciao").await.unwrap_err();

        assert!(matches!(err, RelayError::Transport(_)));
    }

    #[test]
    fn test_endpoint_ignores_trailing_slash() {
        let client = BatchSpeechClient::new(
            SecretString::from("k".to_string()),
            "https://api.elevenlabs.io/",
        );
        assert_eq!(
            client.endpoint(),
            "https://api.elevenlabs.io/v1/text-to-speech/IvLWq57RKibBrqZGpQrC"
        );
    }

    #[tokio::test]
    async fn test_http_client_is_reused_across_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3".to_vec()))
            .expect(2)
            .mount(&server)
            .await;
        let client = client_for(&server);
        assert!(client.http.get().is_none());

        client.synthesize_batch("uno").await.unwrap();
        let first: *const reqwest::blocking::Client = client.http.get().unwrap();
        client.synthesize_batch("due").await.unwrap();

        assert!(std::ptr::eq(first, client.http.get().unwrap()));
    }
}
