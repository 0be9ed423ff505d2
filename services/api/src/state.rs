//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the conversation
//! store and the relays every handler drives.

use crate::config::Config;
use async_openai::config::OpenAIConfig;
use kb_core::{
    completion::CompletionRelay,
    conversation::ConversationStore,
    llm_client::OpenAICompatibleClient,
    speech::{BatchSpeechClient, StreamingSpeechRelay, TungsteniteConnector},
};
use secrecy::ExposeSecret;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConversationStore>,
    pub completion: CompletionRelay,
    pub speech: Arc<StreamingSpeechRelay>,
    pub batch: Arc<BatchSpeechClient>,
}

impl AppState {
    /// Wires the production provider clients from configuration.
    pub fn from_config(config: &Config) -> Self {
        let store = Arc::new(ConversationStore::new());

        let openai_config = OpenAIConfig::new()
            .with_api_key(config.openai_api_key.expose_secret())
            .with_api_base(&config.openai_api_base);
        let completion = CompletionRelay::new(
            store.clone(),
            Arc::new(OpenAICompatibleClient::new(openai_config)),
            config.idle_timeout,
        );

        let speech = Arc::new(StreamingSpeechRelay::new(
            Arc::new(TungsteniteConnector),
            config.eleven_api_key.clone(),
            config.eleven_ws_base.clone(),
            config.idle_timeout,
        ));
        let batch = Arc::new(BatchSpeechClient::new(
            config.eleven_api_key.clone(),
            config.eleven_api_base.clone(),
        ));

        Self {
            store,
            completion,
            speech,
            batch,
        }
    }
}
