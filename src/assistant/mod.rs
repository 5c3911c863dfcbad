// Assistant module
// Turn generation with conversation memory and retrieved context


pub mod openai;

pub use openai::OpenAiChat;

use std::sync::{Arc, LazyLock};

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;
use crate::conversation::{ConversationState, ConversationTurn, Role};

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful and professional assistant. \
Use the provided context when available. Keep your answers short, direct, and avoid \
unnecessary elaboration. Be clear and polite. End every response with: 'Do you need more info?'";

pub const CONTEXT_PREAMBLE: &str = "The following context may be useful for the conversation:\n";

/// Closing question every reply must end with
pub const COURTESY_SUFFIX: &str = "Do you need more info?";

/// Any copy of the suffix regardless of case, with the whitespace before it
static COURTESY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\s*{}", fancy_regex::escape(COURTESY_SUFFIX)))
        .expect("courtesy regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

impl From<ConversationTurn> for ChatMessage {
    #[inline]
    fn from(turn: ConversationTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content,
        }
    }
}

/// A generative chat model
pub trait ChatModel: Send + Sync {
    /// Produce the assistant reply for an ordered message list
    fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub struct Assistant {
    model: Arc<dyn ChatModel>,
    conversation: Arc<ConversationState>,
}

impl std::fmt::Debug for Assistant {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("conversation", &self.conversation)
            .finish_non_exhaustive()
    }
}

impl Assistant {
    #[inline]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self::with_conversation(model, Arc::new(ConversationState::new()))
    }

    #[inline]
    pub fn with_conversation(model: Arc<dyn ChatModel>, conversation: Arc<ConversationState>) -> Self {
        Self {
            model,
            conversation,
        }
    }

    #[inline]
    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    /// Generate a reply to `user_message`, grounded on `rag_context`.
    ///
    /// History is only updated when generation succeeds, so a failed call can
    /// simply be retried.
    #[inline]
    pub fn chat_with_memory(&self, user_message: &str, rag_context: &str) -> Result<String> {
        let messages = self.build_messages(user_message, rag_context);
        debug!("Sending {} messages to chat model", messages.len());

        let raw_reply = self.model.generate(&messages)?;
        let reply = ensure_courtesy_suffix(&raw_reply);

        self.conversation.record_exchange(user_message, reply.as_str());
        info!("Generated reply of {} chars", reply.chars().count());

        Ok(reply)
    }

    /// Instruction, optional context, full history, then the new user message
    #[inline]
    pub fn build_messages(&self, user_message: &str, rag_context: &str) -> Vec<ChatMessage> {
        let history = self.conversation.get_history();
        let mut messages = Vec::with_capacity(history.len() + 3);

        messages.push(ChatMessage::system(SYSTEM_INSTRUCTION));
        if !rag_context.is_empty() {
            messages.push(ChatMessage::system(format!("{}{}", CONTEXT_PREAMBLE, rag_context)));
        }
        messages.extend(history.into_iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(user_message));

        messages
    }

    #[inline]
    pub fn reset_conversation(&self) {
        self.conversation.reset();
        info!("Conversation history cleared");
    }
}

/// Make `reply` end with [`COURTESY_SUFFIX`] exactly once.
///
/// The check is case-insensitive. Copies of the suffix elsewhere in the reply
/// are removed before it is appended, and a trailing period before the suffix
/// is replaced so the reply does not read `..`.
#[inline]
pub fn ensure_courtesy_suffix(reply: &str) -> String {
    let trimmed = reply.trim();
    let lowered = trimmed.to_lowercase();
    let suffix = COURTESY_SUFFIX.to_lowercase();

    if lowered.ends_with(&suffix) && lowered.matches(suffix.as_str()).count() == 1 {
        return trimmed.to_string();
    }

    let stripped = COURTESY_PATTERN.replace_all(trimmed, "");
    let body = stripped.trim().trim_end_matches('.').trim_end();
    if body.is_empty() {
        return COURTESY_SUFFIX.to_string();
    }

    if body.ends_with(['?', '!']) {
        format!("{} {}", body, COURTESY_SUFFIX)
    } else {
        format!("{}. {}", body, COURTESY_SUFFIX)
    }
}
