
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        };
        f.write_str(name)
    }
}

/// One message in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    #[inline]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only conversation log, shared between requests.
///
/// Grows without bound until [`ConversationState::reset`] is called. The log
/// does not enforce user/assistant alternation; callers that want pairs
/// should use [`ConversationState::record_exchange`].
#[derive(Debug, Default)]
pub struct ConversationState {
    turns: Mutex<Vec<ConversationTurn>>,
}

impl ConversationState {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_turn(&self, role: Role, content: impl Into<String>) {
        self.turns.lock().push(ConversationTurn::new(role, content));
    }

    /// Append a user message and the assistant reply as one step
    #[inline]
    pub fn record_exchange(&self, user: impl Into<String>, assistant: impl Into<String>) {
        let mut turns = self.turns.lock();
        turns.push(ConversationTurn::new(Role::User, user));
        turns.push(ConversationTurn::new(Role::Assistant, assistant));
        debug!("Conversation now holds {} turns", turns.len());
    }

    /// Snapshot of the history in insertion order
    #[inline]
    pub fn get_history(&self) -> Vec<ConversationTurn> {
        self.turns.lock().clone()
    }

    #[inline]
    pub fn reset(&self) {
        self.turns.lock().clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.lock().is_empty()
    }
}
