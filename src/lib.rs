//! hubrelay - WebSub to Discord relay
//!
//! Subscribes to YouTube channel feeds through a WebSub hub and posts an
//! announcement to a Discord channel whenever a new video is published.
//! Operators manage the monitored channels with bot commands.

pub mod app;
pub mod chat;
pub mod config;
pub mod dedup;
pub mod error;
pub mod feed;
pub mod hub;
pub mod logging;
pub mod relay;
pub mod store;
pub mod subscription;
pub mod web;

pub use app::Application;
pub use chat::{parse_command, BotCommand, ChatSink, CommandHandler, DiscordHandler, DiscordSink};
pub use config::Config;
pub use dedup::{DedupCache, DedupKey};
pub use error::{RelayError, Result};
pub use feed::{parse_notification, FeedNotification, NotificationEvent};
pub use hub::{HubClient, HubMode, RetryPolicy, SubscriptionRequest};
pub use relay::{DeliveryOutcome, NotificationRelay};
pub use store::ChannelStore;
pub use subscription::{Ack, Handshake, SubscriptionManager, SweepEntry};
pub use web::WebServer;
