//! Chat-system integration for hubrelay.
//!
//! This module provides:
//! - The [`ChatSink`] seam used to deliver announcements and replies
//! - A Discord implementation backed by serenity's HTTP client
//! - Operator command parsing and handling
//! - The serenity gateway event handler

mod command;
mod discord;
mod handler;

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::ChannelId;
use serenity::http::Http;

use crate::{RelayError, Result};

pub use command::{
    format_help, get_command_help, parse_command, BotCommand, CommandInfo, MonitorAction,
};
pub use discord::DiscordHandler;
pub use handler::{CommandHandler, SUPPORTED_PLATFORM};

/// Destination for outbound chat messages.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Post `content` to `channel_id`.
    async fn send_message(&self, channel_id: u64, content: &str) -> Result<()>;
}

/// [`ChatSink`] posting through the Discord REST API.
#[derive(Clone)]
pub struct DiscordSink {
    http: Arc<Http>,
}

impl DiscordSink {
    /// Create a sink authenticated with `token`.
    pub fn new(token: &str) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
        }
    }

    /// Create a sink from an existing HTTP client.
    pub fn from_http(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatSink for DiscordSink {
    async fn send_message(&self, channel_id: u64, content: &str) -> Result<()> {
        if channel_id == 0 {
            return Err(RelayError::Delivery("channel id 0 is not valid".to_string()));
        }
        ChannelId::new(channel_id)
            .say(&self.http, content)
            .await
            .map(|_| ())
            .map_err(|e| RelayError::Delivery(format!("channel {channel_id}: {e}")))
    }
}
