//! Operator command handling.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::feed::sample_payload;
use crate::relay::{DeliveryOutcome, NotificationRelay};
use crate::subscription::{Ack, Handshake, SubscriptionManager};
use crate::RelayError;

use super::command::{format_help, BotCommand, MonitorAction};

/// The only platform kind that can be monitored.
pub const SUPPORTED_PLATFORM: &str = "youtube";

/// Turns parsed commands into subscription/relay operations and a reply.
pub struct CommandHandler {
    manager: Arc<SubscriptionManager>,
    relay: Arc<NotificationRelay>,
    prefix: String,
}

impl CommandHandler {
    /// Create a new command handler.
    pub fn new(
        manager: Arc<SubscriptionManager>,
        relay: Arc<NotificationRelay>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            relay,
            prefix: prefix.into(),
        }
    }

    /// Command prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Execute `command` and return the reply for the invoker.
    pub async fn handle(&self, command: BotCommand) -> String {
        match command {
            BotCommand::Monitor {
                action,
                platform,
                channel_id,
            } => self.monitor(action, &platform, &channel_id).await,
            BotCommand::Ping => "Pong!".to_string(),
            BotCommand::Status => self.status().await,
            BotCommand::TestWebhook => self.test_webhook().await,
            BotCommand::Help => format_help(&self.prefix),
            BotCommand::Usage(usage) => format!("Usage: `{}{usage}`", self.prefix),
            BotCommand::Unknown(name) => format!(
                "Unknown command `{p}{name}`. Try `{p}help`.",
                p = self.prefix
            ),
        }
    }

    async fn monitor(&self, action: MonitorAction, platform: &str, channel_id: &str) -> String {
        if !platform.eq_ignore_ascii_case(SUPPORTED_PLATFORM) {
            let err = RelayError::UnsupportedPlatform(platform.to_string());
            info!(error = %err, "monitor command rejected");
            return "Only YouTube supported for now!".to_string();
        }

        let add = action == MonitorAction::Add;
        match self.manager.set_subscription(channel_id, add).await {
            Ok(Ack::Added { channel_id, .. }) => format!("Added YouTube channel {channel_id}"),
            Ok(Ack::Removed {
                channel_id,
                handshake: Handshake::Accepted { .. },
            }) => format!("Removed YouTube channel {channel_id}"),
            Ok(Ack::Removed {
                channel_id,
                handshake: Handshake::Failed(reason),
            }) => format!("Removed YouTube channel {channel_id} (unsubscribe failed: {reason})"),
            Err(RelayError::AlreadyMonitored(id)) => format!("Channel {id} already monitored"),
            Err(RelayError::NotMonitored(id)) => format!("Channel {id} not found"),
            Err(RelayError::SubscriptionFailed {
                channel_id,
                attempts,
                last_error,
            }) => format!(
                "Error subscribing to {channel_id} after {attempts} attempt(s): {last_error}. \
                 The channel stays recorded; `{}status` retries it.",
                self.prefix
            ),
            Err(e) if e.is_validation() => e.to_string(),
            Err(e) => {
                warn!(channel_id, add, error = %e, "monitor command failed");
                format!("Error updating {channel_id}: {e}")
            }
        }
    }

    async fn status(&self) -> String {
        let summary = self.manager.status_sweep().await;
        if summary.is_empty() {
            return "No channels monitored.".to_string();
        }

        let mut lines = vec![format!("Monitored YouTube channels ({}):", summary.len())];
        lines.extend(summary.iter().map(|entry| format!("- {entry}")));
        lines.join("\n")
    }

    async fn test_webhook(&self) -> String {
        let video_id = format!("selftest-{}", Utc::now().timestamp());
        let payload = sample_payload(&video_id, "Webhook self-test");

        match self.relay.deliver(payload.as_bytes()).await {
            DeliveryOutcome::Delivered { .. } => {
                "Self-test passed: announcement delivered.".to_string()
            }
            DeliveryOutcome::Duplicate { .. } => {
                "Self-test parsed fine, but a notification was already delivered in this window."
                    .to_string()
            }
            outcome => format!(
                "Self-test failed ({}): {}",
                outcome.status(),
                outcome.message().unwrap_or("no details")
            ),
        }
    }
}
