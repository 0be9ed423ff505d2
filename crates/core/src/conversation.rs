//! Conversation Memory
//!
//! Keeps a bounded, chronologically ordered history of turns for every session
//! and assembles the prompt sent to the LLM from it. The store is an explicit
//! object shared through the application state; all mutation goes through a
//! single async lock so an append and the snapshot that follows it are atomic.

use crate::persona::{MAX_TURNS, SYSTEM_PROMPT};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tokio::sync::Mutex;
use tracing::debug;

/// Author of a message in an assembled prompt.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One stored message of a conversation. Immutable once appended.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A message of an assembled prompt: the system instruction followed by turns.
pub type PromptMessage = Turn;

/// Process-wide mapping from session identifier to its bounded turn history.
///
/// Sessions are created lazily and live as long as the store. Eviction is
/// FIFO by insertion order within a session; whole sessions are never evicted.
#[derive(Debug)]
pub struct ConversationStore {
    sessions: Mutex<HashMap<String, VecDeque<Turn>>>,
    capacity: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// Creates a store retaining `MAX_TURNS` exchanges per session.
    pub fn new() -> Self {
        Self::with_max_turns(MAX_TURNS)
    }

    /// Creates a store retaining `max_turns` user/assistant exchanges per session.
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            capacity: max_turns * 2,
        }
    }

    /// Maximum number of turns kept for a single session.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a turn and returns the prompt assembled from the updated history.
    pub async fn append_and_assemble(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
    ) -> Vec<PromptMessage> {
        let mut sessions = self.sessions.lock().await;
        let history = Self::push(&mut sessions, self.capacity, session_id, Turn::new(role, text));
        debug!(session_id, retained = history.len(), "Assembling prompt");

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Turn::new(Role::System, SYSTEM_PROMPT));
        messages.extend(history.iter().cloned());
        messages
    }

    /// Appends a turn without assembling a prompt.
    pub async fn append(&self, session_id: &str, role: Role, text: &str) {
        let mut sessions = self.sessions.lock().await;
        Self::push(&mut sessions, self.capacity, session_id, Turn::new(role, text));
    }

    /// Returns a copy of the retained turns for a session, oldest first.
    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of sessions seen since the store was created.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn push<'a>(
        sessions: &'a mut HashMap<String, VecDeque<Turn>>,
        capacity: usize,
        session_id: &str,
        turn: Turn,
    ) -> &'a VecDeque<Turn> {
        let history = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        history.push_back(turn);
        while history.len() > capacity {
            history.pop_front();
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_session_is_created_lazily() {
        let store = ConversationStore::new();
        assert_eq!(store.session_count().await, 0);

        let prompt = store.append_and_assemble("abc", Role::User, "Ciao").await;

        assert_eq!(store.session_count().await, 1);
        assert_eq!(
            prompt,
            vec![
                Turn::new(Role::System, SYSTEM_PROMPT),
                Turn::new(Role::User, "Ciao"),
            ]
        );
    }

    #[tokio::test]
    async fn test_history_never_exceeds_capacity_and_evicts_oldest_first() {
        let store = ConversationStore::new();
        let capacity = store.capacity();
        assert_eq!(capacity, 2 * MAX_TURNS);

        for i in 0..(capacity + 7) {
            store.append("s", Role::User, &format!("msg {i}")).await;
            assert!(store.history("s").await.len() <= capacity);
        }

        let history = store.history("s").await;
        assert_eq!(history.len(), capacity);
        // The first seven were evicted; order of the remainder is preserved.
        assert_eq!(history.first().unwrap().content, "msg 7");
        assert_eq!(
            history.last().unwrap().content,
            format!("msg {}", capacity + 6)
        );
        for pair in history.windows(2) {
            let a: usize = pair[0].content[4..].parse().unwrap();
            let b: usize = pair[1].content[4..].parse().unwrap();
            assert_eq!(a + 1, b);
        }
    }

    #[tokio::test]
    async fn test_eviction_ignores_access_recency() {
        let store = ConversationStore::with_max_turns(1);
        store.append("s", Role::User, "first").await;
        store.append("s", Role::Assistant, "second").await;
        // Reading the history must not refresh "first".
        let _ = store.history("s").await;
        store.append("s", Role::User, "third").await;

        let contents: Vec<_> = store
            .history("s")
            .await
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["second", "third"]);
    }

    #[tokio::test]
    async fn test_system_instruction_is_always_first_and_unique() {
        let store = ConversationStore::with_max_turns(2);
        for i in 0..10 {
            let prompt = store
                .append_and_assemble("s", Role::User, &format!("q{i}"))
                .await;
            assert_eq!(prompt[0], Turn::new(Role::System, SYSTEM_PROMPT));
            assert_eq!(
                prompt.iter().filter(|m| m.role == Role::System).count(),
                1
            );
            assert!(prompt.len() <= 1 + store.capacity());
        }
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = ConversationStore::new();
        store.append("a", Role::User, "da A").await;
        let prompt = store.append_and_assemble("b", Role::User, "da B").await;

        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[1].content, "da B");
        assert_eq!(store.history("a").await.len(), 1);
        assert!(store.history("missing").await.is_empty());
    }

    #[test]
    fn test_role_display_and_serialization() {
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
