//! KB Relay Core
//!
//! Conversation memory and the upstream relays behind the KB voice assistant:
//! a streaming LLM completion relay, a realtime speech-synthesis relay and the
//! legacy batch synthesis client.

pub mod completion;
pub mod conversation;
pub mod error;
pub mod llm_client;
pub mod persona;
pub mod relay;
pub mod speech;

pub use error::RelayError;
