//! Speech relays: realtime streaming synthesis and the legacy batch call.

pub mod batch;
pub mod realtime;

use crate::error::RelayError;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

pub use batch::BatchSpeechClient;
pub use realtime::{SpeechConnector, SpeechSocket, StreamingSpeechRelay, TungsteniteConnector};

/// Decoded audio chunks in playback order.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Bytes, RelayError>> + Send>>;
