//! Inbound command handling.
//!
//! Inbound messages are drained from a single queue and handled one at a
//! time. Every message registers its sender before anything else happens.
//!
//! An ad-hoc `check` runs the combined probe on the handler's own task and
//! replies only to the sender. It has no access to the reconciler's state,
//! so it can neither change the stored availability nor trigger a broadcast.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::message::{self, Notice, NoticeKind};
use crate::registry::{ChatId, Registry};
use crate::source::AvailabilitySource;
use crate::transport::{InboundMessage, OutboundMessage, Transport};

pub const BUTTON_CHECK: &str = "🔍 Check Availability";
pub const BUTTON_STATUS: &str = "📊 Status";
pub const BUTTON_ENABLE_DIGEST: &str = "⏰ Enable Status Updates";
pub const BUTTON_DISABLE_DIGEST: &str = "⏳ Disable Status Updates";

/// Reply keyboard layout, row by row.
pub const MAIN_KEYBOARD: [[&str; 2]; 2] = [
    [BUTTON_CHECK, BUTTON_STATUS],
    [BUTTON_ENABLE_DIGEST, BUTTON_DISABLE_DIGEST],
];

/// A command a subscriber can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Check,
    Status,
    EnableDigest,
    DisableDigest,
    Help,
}

impl Command {
    /// Map slash commands and button labels; anything else is `Help`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        if let Some(command) = text.strip_prefix('/') {
            let name = command
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .split('@')
                .next()
                .unwrap_or_default();
            return match name.to_ascii_lowercase().as_str() {
                "check" => Self::Check,
                "status" => Self::Status,
                "autostart" => Self::EnableDigest,
                "autostop" => Self::DisableDigest,
                _ => Self::Help,
            };
        }

        match text {
            BUTTON_CHECK => Self::Check,
            BUTTON_STATUS => Self::Status,
            BUTTON_ENABLE_DIGEST => Self::EnableDigest,
            BUTTON_DISABLE_DIGEST => Self::DisableDigest,
            _ => Self::Help,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Status => "status",
            Self::EnableDigest => "enable_digest",
            Self::DisableDigest => "disable_digest",
            Self::Help => "help",
        }
    }
}

/// Translates inbound commands into registry updates and replies.
pub struct CommandHandler {
    registry: Arc<Registry>,
    source: Arc<dyn AvailabilitySource>,
    transport: Arc<dyn Transport>,
    booking_url: String,
    digest_interval: Duration,
}

impl CommandHandler {
    pub fn new(
        registry: Arc<Registry>,
        source: Arc<dyn AvailabilitySource>,
        transport: Arc<dyn Transport>,
        booking_url: impl Into<String>,
        digest_interval: Duration,
    ) -> Self {
        Self {
            registry,
            source,
            transport,
            booking_url: booking_url.into(),
            digest_interval,
        }
    }

    /// Drain the inbound queue until it closes or shutdown is signalled.
    pub async fn run(
        &self,
        mut inbound: mpsc::Receiver<InboundMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Starting command handler");

        loop {
            tokio::select! {
                message = inbound.recv() => {
                    let Some(message) = message else {
                        info!("Inbound queue closed, command handler exiting");
                        break;
                    };
                    self.handle(&message).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Command handler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Parse and handle one inbound message.
    pub async fn handle(&self, message: &InboundMessage) {
        let command = Command::parse(&message.text);
        info!(
            chat_id = %message.chat_id,
            username = message.username.as_deref().unwrap_or("unknown"),
            text = %message.text,
            command = command.label(),
            "Received message"
        );
        self.on_inbound(message.chat_id, command).await;
    }

    /// Apply `command` on behalf of `chat` and send the replies.
    pub async fn on_inbound(&self, chat: ChatId, command: Command) {
        self.registry.register(chat).await;

        match command {
            Command::Help => {
                self.reply(chat, message::help_text(self.digest_interval))
                    .await;
            }
            Command::EnableDigest => {
                self.registry.set_digest(chat, true).await;
                info!(chat_id = %chat, "Enabled status updates");
                self.reply(chat, message::digest_enabled_text(self.digest_interval))
                    .await;
            }
            Command::DisableDigest => {
                self.registry.set_digest(chat, false).await;
                info!(chat_id = %chat, "Disabled status updates");
                self.reply(chat, message::DIGEST_DISABLED_TEXT).await;
            }
            Command::Status => {
                let wants_digest = self.registry.digest_flag(chat).await;
                self.reply(chat, message::status_text(wants_digest, self.digest_interval))
                    .await;
            }
            Command::Check => {
                self.reply(chat, message::CHECKING_TEXT).await;
                let text = match self.source.check().await {
                    Ok(check) => {
                        info!(chat_id = %chat, available = check.available, "Manual check complete");
                        Notice::from_check(NoticeKind::Manual, &check, &self.booking_url).render()
                    }
                    Err(e) => {
                        warn!(chat_id = %chat, error = %e, "Manual check failed");
                        message::check_failed_text(&e)
                    }
                };
                self.reply(chat, text).await;
            }
        }
    }

    async fn reply(&self, chat: ChatId, text: impl Into<String>) {
        let message = OutboundMessage::with_keyboard(text);
        if let Err(e) = self.transport.send(chat, &message).await {
            warn!(chat_id = %chat, error = %e, "Failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/start", Command::Help)]
    #[case("/help", Command::Help)]
    #[case("/check", Command::Check)]
    #[case("/check@slot_bot", Command::Check)]
    #[case("/STATUS", Command::Status)]
    #[case("/autostart", Command::EnableDigest)]
    #[case("/autostop now", Command::DisableDigest)]
    #[case("/unknown", Command::Help)]
    #[case("/", Command::Help)]
    #[case(BUTTON_CHECK, Command::Check)]
    #[case(BUTTON_STATUS, Command::Status)]
    #[case(BUTTON_ENABLE_DIGEST, Command::EnableDigest)]
    #[case(BUTTON_DISABLE_DIGEST, Command::DisableDigest)]
    #[case("  📊 Status  ", Command::Status)]
    #[case("hello there", Command::Help)]
    #[case("", Command::Help)]
    fn test_parse(#[case] input: &str, #[case] expected: Command) {
        assert_eq!(Command::parse(input), expected);
    }
}
