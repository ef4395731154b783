//! In-memory transport that records deliveries.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::{OutboundMessage, Transport};
use crate::error::DeliveryError;
use crate::registry::ChatId;

/// Records every delivered message; can be told to fail for given chats.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(ChatId, OutboundMessage)>>,
    failing: Mutex<HashSet<ChatId>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `chat` fail.
    pub fn fail_for(&self, chat: ChatId) {
        self.failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(chat);
    }

    /// All delivered messages in delivery order.
    pub fn sent(&self) -> Vec<(ChatId, OutboundMessage)> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Texts delivered to `chat`.
    pub fn texts_for(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| *to == chat)
            .map(|(_, message)| message.text)
            .collect()
    }

    pub fn clear(&self) {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, chat: ChatId, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&chat);
        if failing {
            return Err(DeliveryError::Rejected {
                status: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }

        debug!(chat_id = %chat, "[RECORDING] Delivered message");
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((chat, message.clone()));
        Ok(())
    }
}
