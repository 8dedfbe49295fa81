//! Language model seam
//!
//! Both the conversational turn driver and the scoring engine talk to a
//! remote language model through the [`LanguageModel`] trait; the provided
//! implementation targets any OpenAI-compatible chat-completions endpoint.
//! Transient failures are handled by one shared [`RetryPolicy`].

mod http;
mod retry;

pub use http::OpenAiChatModel;
pub use retry::RetryPolicy;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Role of one chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a chat-completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A remote chat-completion model
///
/// `complete` produces the next turn's text for the given conversation, or
/// errors on transient failure; callers decide the retry policy.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Model name for logging
    fn name(&self) -> &str;
}
