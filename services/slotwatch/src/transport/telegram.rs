//! Telegram Bot API transport.
//!
//! Outbound messages go through `sendMessage` with the main reply keyboard.
//! Inbound messages are fetched with `getUpdates` long polling and pushed
//! onto the command queue.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::{InboundMessage, OutboundMessage, Transport};
use crate::commands::MAIN_KEYBOARD;
use crate::error::DeliveryError;
use crate::registry::ChatId;

/// Long-poll timeout passed to `getUpdates`.
const POLL_TIMEOUT_SECS: u64 = 60;

/// Timeout for every other API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_POLL_BACKOFF: Duration = Duration::from_secs(60);

/// Telegram Bot API client.
pub struct TelegramTransport {
    client: reqwest::Client,
    /// `{api}/bot{token}`; never logged.
    base_url: String,
}

impl TelegramTransport {
    pub fn new(api_url: &str, token: &str) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()
            .map_err(|e| DeliveryError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    /// Fetch the bot's own account.
    pub async fn get_me(&self) -> Result<BotUser, DeliveryError> {
        self.call("getMe", &serde_json::json!({}), REQUEST_TIMEOUT)
            .await
    }

    /// Fetch updates after `offset`, waiting up to `timeout_secs` for new ones.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, DeliveryError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message"],
        };
        self.call(
            "getUpdates",
            &request,
            Duration::from_secs(timeout_secs) + REQUEST_TIMEOUT,
        )
        .await
    }

    /// Poll for updates until shutdown, forwarding text messages to `inbound`.
    ///
    /// Poll failures back off exponentially up to a minute and never end the
    /// loop.
    pub async fn run_updates(
        &self,
        inbound: mpsc::Sender<InboundMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Starting update polling");

        let mut offset = 0i64;
        let mut backoff = Duration::from_secs(1);

        loop {
            let result = tokio::select! {
                result = self.get_updates(offset, POLL_TIMEOUT_SECS) => result,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Update polling shutting down");
                        break;
                    }
                    continue;
                }
            };

            match result {
                Ok(updates) => {
                    backoff = Duration::from_secs(1);
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let Some(message) = update.into_inbound() else {
                            continue;
                        };
                        if inbound.send(message).await.is_err() {
                            info!("Inbound queue closed, stopping update polling");
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, backoff_secs = backoff.as_secs(), "Failed to fetch updates");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                    backoff = (backoff * 2).min(MAX_POLL_BACKOFF);
                }
            }
        }
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, DeliveryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| {
                if status.is_success() {
                    DeliveryError::InvalidResponse(e.to_string())
                } else {
                    DeliveryError::Rejected {
                        status: status.as_u16(),
                        description: status.to_string(),
                    }
                }
            })?;

        if !status.is_success() || !envelope.ok {
            return Err(DeliveryError::Rejected {
                status: envelope.error_code.unwrap_or(status.as_u16()),
                description: envelope.description.unwrap_or_else(|| status.to_string()),
            });
        }

        envelope
            .result
            .ok_or_else(|| DeliveryError::InvalidResponse(format!("{method}: missing result")))
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, chat: ChatId, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let request = SendMessageRequest {
            chat_id: chat.0,
            text: &message.text,
            reply_markup: message.keyboard.then(ReplyKeyboard::main),
        };

        let sent: SentMessage = self.call("sendMessage", &request, REQUEST_TIMEOUT).await?;
        debug!(chat_id = %chat, message_id = sent.message_id, "Message sent");
        Ok(())
    }
}

// =============================================================================
// Bot API types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyKeyboard>,
}

#[derive(Debug, Serialize)]
struct ReplyKeyboard {
    keyboard: Vec<Vec<KeyboardButton>>,
    resize_keyboard: bool,
}

impl ReplyKeyboard {
    fn main() -> Self {
        Self {
            keyboard: MAIN_KEYBOARD
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|label| KeyboardButton {
                            text: (*label).to_string(),
                        })
                        .collect()
                })
                .collect(),
            resize_keyboard: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct KeyboardButton {
    text: String,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// The bot's own account, from `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// A single update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

impl Update {
    /// Text messages only; other update kinds are dropped.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let message = self.message?;
        let text = message.text?;
        let username = message.from.map(|from| match from.username {
            Some(name) if !name.is_empty() => name,
            _ => format!("id:{}", from.id),
        });

        Some(InboundMessage {
            chat_id: ChatId(message.chat.id),
            username,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_into_inbound() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "chat": { "id": 42, "type": "private" },
                "from": { "id": 7, "is_bot": false, "first_name": "A" },
                "text": "/check"
            }
        }))
        .unwrap();

        let inbound = update.into_inbound().unwrap();
        assert_eq!(inbound.chat_id, ChatId(42));
        assert_eq!(inbound.username.as_deref(), Some("id:7"));
        assert_eq!(inbound.text, "/check");
    }

    #[test]
    fn test_non_text_update_is_dropped() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 11,
            "message": { "message_id": 2, "chat": { "id": 42 } }
        }))
        .unwrap();
        assert!(update.into_inbound().is_none());

        let update: Update =
            serde_json::from_value(serde_json::json!({ "update_id": 12 })).unwrap();
        assert!(update.into_inbound().is_none());
    }

    #[test]
    fn test_main_keyboard_layout() {
        let json = serde_json::to_value(ReplyKeyboard::main()).unwrap();
        assert_eq!(json["keyboard"].as_array().unwrap().len(), 2);
        assert_eq!(json["keyboard"][0][0]["text"], MAIN_KEYBOARD[0][0]);
        assert_eq!(json["keyboard"][1][1]["text"], MAIN_KEYBOARD[1][1]);
        assert_eq!(json["resize_keyboard"], true);
    }
}
