//! Chat transport interface.
//!
//! The transport delivers rendered text to a single chat and produces the
//! stream of inbound messages that drive the command handler.
//!
//! - `telegram`: Telegram Bot API over HTTPS (long polling)
//! - `recording`: in-memory transport for tests

pub mod recording;
pub mod telegram;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::registry::ChatId;

pub use recording::RecordingTransport;
pub use telegram::TelegramTransport;

/// A message to one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,

    /// Attach the main command keyboard.
    pub keyboard: bool,
}

impl OutboundMessage {
    /// Text with the main keyboard attached.
    pub fn with_keyboard(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: true,
        }
    }
}

/// A text message received from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub username: Option<String>,
    pub text: String,
}

/// Delivers messages to chats.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, chat: ChatId, message: &OutboundMessage) -> Result<(), DeliveryError>;
}
