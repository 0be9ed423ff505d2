//! Completion Relay
//!
//! Streams the LLM's reply to a user message fragment by fragment while
//! recording the exchange in the [`ConversationStore`].

use crate::{
    conversation::{ConversationStore, Role},
    error::RelayError,
    llm_client::{LLMClient, LLMStream, LLMStreamEvent},
    relay::{self, RelayFrame, Termination},
};
use async_stream::try_stream;
use futures::{Stream, StreamExt, future, stream};
use std::{pin::Pin, sync::Arc, time::Duration};
use tracing::{info, instrument, warn};

impl RelayFrame for LLMStreamEvent {
    type Payload = String;

    fn into_payload(self) -> Result<Option<String>, RelayError> {
        match self {
            LLMStreamEvent::TextChunk(text) if text.is_empty() => Ok(None),
            LLMStreamEvent::TextChunk(text) => Ok(Some(text)),
        }
    }
}

/// Reply fragments of a single completion, in provider order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

/// Drives one streaming completion per user message.
#[derive(Clone)]
pub struct CompletionRelay {
    store: Arc<ConversationStore>,
    llm: Arc<dyn LLMClient>,
    idle_timeout: Option<Duration>,
}

impl CompletionRelay {
    pub fn new(
        store: Arc<ConversationStore>,
        llm: Arc<dyn LLMClient>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            llm,
            idle_timeout,
        }
    }

    /// Records the user's message, opens the completion and returns the reply fragments.
    ///
    /// The provider's first event is awaited before returning, so a request it
    /// rejects or cannot receive fails here rather than inside a started reply.
    /// Fragments are yielded in provider order. The full reply is committed as
    /// an assistant turn only once the provider has cleanly finished and the
    /// consumer has drained the stream; an upstream failure or an abandoned
    /// stream commits nothing. The user turn stays recorded in either case.
    #[instrument(skip(self, user_text), fields(chars = user_text.len()))]
    pub async fn stream_completion(
        &self,
        session_id: &str,
        user_text: &str,
    ) -> Result<FragmentStream, RelayError> {
        let prompt = self
            .store
            .append_and_assemble(session_id, Role::User, user_text)
            .await;
        let upstream = self.llm.stream_reply(prompt).await?;
        let upstream = self.first_event(upstream).await.inspect_err(|e| {
            warn!(%session_id, error = %e, "Completion rejected before the first fragment");
        })?;
        info!("Completion stream opened");

        let fragments = relay::drain(upstream, Termination::EndOfStream, self.idle_timeout);
        let store = self.store.clone();
        let session_id = session_id.to_string();

        Ok(Box::pin(try_stream! {
            let mut fragments = Box::pin(fragments);
            let mut reply = String::new();
            while let Some(fragment) = fragments.next().await {
                let fragment = match fragment {
                    Ok(fragment) => fragment,
                    Err(e) => {
                        warn!(%session_id, error = %e, partial_chars = reply.len(), "Completion aborted; reply not committed");
                        Err(e)?
                    }
                };
                reply.push_str(&fragment);
                yield fragment;
            }
            store.append(&session_id, Role::Assistant, &reply).await;
            info!(%session_id, chars = reply.len(), "Assistant turn committed");
        }))
    }

    /// Pulls the first event within the idle window and puts it back in front of the stream.
    async fn first_event(&self, mut upstream: LLMStream) -> Result<LLMStream, RelayError> {
        let first = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, upstream.next())
                .await
                .map_err(|_| RelayError::Timeout(limit))?,
            None => upstream.next().await,
        };
        match first {
            Some(Ok(event)) => {
                Ok(Box::pin(stream::once(future::ready(Ok(event))).chain(upstream)))
            }
            Some(Err(e)) => Err(e),
            None => Ok(upstream),
        }
    }
}
