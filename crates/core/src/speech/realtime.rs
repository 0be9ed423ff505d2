//! Streaming speech relay over the provider's realtime WebSocket.

use super::AudioStream;
use crate::{
    error::RelayError,
    persona::{CHUNK_LENGTH_SCHEDULE, TTS_MODEL, VOICE_ID, VOICE_SETTINGS, VoiceSettings},
    relay::{self, RelayFrame, Termination},
};
use async_stream::stream;
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::{SinkExt, Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async_with_config,
    tungstenite::{self, protocol::Message as WsMessage, protocol::WebSocketConfig},
};
use tracing::{debug, info, instrument, warn};

// --- Wire types ---

#[derive(Serialize, Debug)]
struct InitMessage<'a> {
    text: &'a str,
    xi_api_key: &'a str,
    voice_settings: VoiceSettings,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
struct GenerationConfig {
    chunk_length_schedule: [u32; 4],
}

#[derive(Serialize, Debug)]
struct TextMessage<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    flush: Option<bool>,
}

/// A message received from the realtime synthesis socket.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisFrame {
    /// Base64-encoded audio chunk.
    pub audio: Option<String>,
    pub is_final: Option<bool>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl RelayFrame for SynthesisFrame {
    type Payload = Bytes;

    fn is_final(&self) -> bool {
        self.is_final == Some(true)
    }

    fn into_payload(self) -> Result<Option<Bytes>, RelayError> {
        if let Some(error) = self.error {
            return Err(RelayError::Protocol(format!(
                "provider reported '{}': {}",
                error,
                self.message.unwrap_or_default()
            )));
        }
        match self.audio {
            Some(b64) if !b64.is_empty() => base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map(|audio| Some(Bytes::from(audio)))
                .map_err(|e| RelayError::Protocol(format!("invalid audio payload: {e}"))),
            _ => Ok(None),
        }
    }
}

// --- Transport seam ---

/// A text-framed bidirectional connection to the synthesis provider.
#[async_trait]
pub trait SpeechSocket: Send {
    async fn send_text(&mut self, text: String) -> Result<(), RelayError>;

    /// Receives the next text message; `None` once the peer has closed.
    async fn recv_text(&mut self) -> Option<Result<String, RelayError>>;

    async fn close(&mut self) -> Result<(), RelayError>;
}

/// Opens [`SpeechSocket`]s.
#[async_trait]
pub trait SpeechConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn SpeechSocket>, RelayError>;
}

/// Connects with `tokio-tungstenite`, without a message size limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

#[async_trait]
impl SpeechConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn SpeechSocket>, RelayError> {
        let config = WebSocketConfig::default().max_message_size(None);
        let (ws_stream, _) = connect_async_with_config(url, Some(config), false).await?;
        Ok(Box::new(TungsteniteSocket { inner: ws_stream }))
    }
}

struct TungsteniteSocket {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl SpeechSocket for TungsteniteSocket {
    async fn send_text(&mut self, text: String) -> Result<(), RelayError> {
        self.inner.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<Result<String, RelayError>> {
        loop {
            match self.inner.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Binary(data)) => {
                    return Some(String::from_utf8(data.to_vec()).map_err(|e| {
                        RelayError::Protocol(format!("non-UTF-8 binary frame: {e}"))
                    }));
                }
                Ok(WsMessage::Close(frame)) => {
                    debug!(?frame, "Synthesis socket closed by provider");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        match self.inner.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// --- Relay ---

/// Synthesizes text over one realtime connection per call.
pub struct StreamingSpeechRelay {
    connector: Arc<dyn SpeechConnector>,
    api_key: SecretString,
    ws_base: String,
    idle_timeout: Option<Duration>,
}

impl StreamingSpeechRelay {
    /// # Arguments
    ///
    /// * `ws_base` - Scheme and host of the realtime endpoint, e.g. `wss://api.elevenlabs.io`.
    /// * `idle_timeout` - Longest wait for any single provider message; `None` waits forever.
    pub fn new(
        connector: Arc<dyn SpeechConnector>,
        api_key: SecretString,
        ws_base: impl Into<String>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            connector,
            api_key,
            ws_base: ws_base.into(),
            idle_timeout,
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{VOICE_ID}/stream-input?model_id={TTS_MODEL}",
            self.ws_base.trim_end_matches('/')
        )
    }

    /// Connects, sends the handshake and returns the decoded audio chunks.
    ///
    /// Connection and handshake failures are returned directly. The stream
    /// ends after the provider's final message. The connection is closed on
    /// every exit: completion, upstream error, idle timeout, or the stream
    /// being dropped early.
    #[instrument(skip_all, fields(chars = text.len()))]
    pub async fn stream_speech(&self, text: &str) -> Result<AudioStream, RelayError> {
        let mut socket = self.connector.connect(&self.endpoint()).await?;
        info!("Connected to realtime synthesis socket");

        if let Err(e) = self.handshake(socket.as_mut(), text).await {
            warn!(error = %e, "Synthesis handshake failed");
            let _ = socket.close().await;
            return Err(e);
        }

        Ok(Box::pin(relay::drain(
            frames(socket, self.idle_timeout),
            Termination::FinalFrame,
            None,
        )))
    }

    /// Prime with a placeholder and settings, submit the text, then signal end of input.
    async fn handshake(&self, socket: &mut dyn SpeechSocket, text: &str) -> Result<(), RelayError> {
        let init = InitMessage {
            text: " ",
            xi_api_key: self.api_key.expose_secret(),
            voice_settings: VOICE_SETTINGS,
            generation_config: GenerationConfig {
                chunk_length_schedule: CHUNK_LENGTH_SCHEDULE,
            },
        };
        socket.send_text(serde_json::to_string(&init)?).await?;

        let submit = TextMessage {
            text,
            flush: Some(true),
        };
        socket.send_text(serde_json::to_string(&submit)?).await?;

        let end = TextMessage {
            text: "",
            flush: None,
        };
        socket.send_text(serde_json::to_string(&end)?).await?;
        Ok(())
    }
}

/// Owns the socket while frames are read; a socket still open when the
/// frame stream is dropped is closed on a background task.
struct OpenSocket(Option<Box<dyn SpeechSocket>>);

impl OpenSocket {
    async fn recv_text(&mut self) -> Option<Result<String, RelayError>> {
        match self.0.as_mut() {
            Some(socket) => socket.recv_text().await,
            None => None,
        }
    }

    async fn close(&mut self) {
        if let Some(mut socket) = self.0.take() {
            if let Err(e) = socket.close().await {
                debug!(error = %e, "Closing synthesis socket failed");
            }
        }
    }
}

impl Drop for OpenSocket {
    fn drop(&mut self) {
        let Some(mut socket) = self.0.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = socket.close().await {
                        debug!(error = %e, "Closing abandoned synthesis socket failed");
                    }
                });
            }
            Err(_) => debug!("No runtime left to close the abandoned synthesis socket"),
        }
    }
}

/// Parses socket messages into frames, closing the socket after the last one.
///
/// `idle_timeout` bounds each receive; on expiry the socket is closed and
/// [`RelayError::Timeout`] is the last item.
fn frames(
    socket: Box<dyn SpeechSocket>,
    idle_timeout: Option<Duration>,
) -> impl Stream<Item = Result<SynthesisFrame, RelayError>> + Send {
    stream! {
        let mut socket = OpenSocket(Some(socket));
        loop {
            let received = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, socket.recv_text()).await {
                    Ok(received) => received,
                    Err(_) => {
                        warn!(?limit, "Synthesis socket idle; closing");
                        socket.close().await;
                        yield Err(RelayError::Timeout(limit));
                        break;
                    }
                },
                None => socket.recv_text().await,
            };
            let Some(received) = received else {
                socket.close().await;
                break;
            };
            let parsed = received.and_then(|text| {
                serde_json::from_str::<SynthesisFrame>(&text).map_err(RelayError::from)
            });
            match parsed {
                Ok(frame) if frame.is_final() || frame.error.is_some() => {
                    socket.close().await;
                    yield Ok(frame);
                    break;
                }
                Ok(frame) => yield Ok(frame),
                Err(e) => {
                    socket.close().await;
                    yield Err(e);
                    break;
                }
            }
        }
    }
}
