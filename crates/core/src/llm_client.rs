use crate::{
    conversation::{PromptMessage, Role},
    error::RelayError,
    persona::{LLM_MODEL, MAX_TOK, TEMPERATURE},
};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Represents the events that can be yielded from a streaming text response.
#[derive(Debug, Clone, PartialEq)]
pub enum LLMStreamEvent {
    TextChunk(String),
}

/// A stream of text chunks from the LLM. Ends when the provider finishes the reply.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent, RelayError>> + Send>>;

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Opens a streaming completion for the assembled prompt.
    ///
    /// Implementations may report connection and authentication failures
    /// either here or as the first item of the returned stream.
    async fn stream_reply(&self, messages: Vec<PromptMessage>) -> Result<LLMStream, RelayError>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::with_config(config),
            model: LLM_MODEL.to_string(),
        }
    }

    fn build_request(
        &self,
        messages: Vec<PromptMessage>,
    ) -> Result<CreateChatCompletionRequest, RelayError> {
        let messages = messages
            .into_iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()?;

        #[allow(deprecated)]
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(MAX_TOK)
            .temperature(TEMPERATURE)
            .stream(true)
            .build()?;
        Ok(request)
    }
}

fn to_request_message(msg: PromptMessage) -> Result<ChatCompletionRequestMessage, RelayError> {
    let message = match msg.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(msg.content)
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(msg.content)
            .build()?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(msg.content)
            .build()?
            .into(),
    };
    Ok(message)
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn stream_reply(&self, messages: Vec<PromptMessage>) -> Result<LLMStream, RelayError> {
        let request = self.build_request(messages)?;
        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(|result| async move {
            match result {
                Ok(response) => {
                    if let Some(content) = response
                        .choices
                        .first()
                        .and_then(|choice| choice.delta.content.as_ref())
                    {
                        if !content.is_empty() {
                            return Some(Ok(LLMStreamEvent::TextChunk(content.clone())));
                        }
                    }
                    None
                }
                Err(e) => Some(Err(RelayError::from(e))),
            }
        })))
    }
}
