//! Application module.
//!
//! Wires the store, hub client, dedup cache, relay and command handler
//! into a single [`Application`].

use std::sync::Arc;
use std::time::Duration;

use crate::chat::{ChatSink, CommandHandler};
use crate::config::Config;
use crate::dedup::DedupCache;
use crate::error::Result;
use crate::hub::HubClient;
use crate::relay::NotificationRelay;
use crate::store::ChannelStore;
use crate::subscription::{SubscriptionManager, SubscriptionSettings};
use crate::web::WebServer;

/// Main application holding every long-lived component.
pub struct Application {
    /// Application configuration.
    config: Arc<Config>,
    /// Subscription manager.
    manager: Arc<SubscriptionManager>,
    /// Notification relay.
    relay: Arc<NotificationRelay>,
    /// Operator command handler.
    commands: Arc<CommandHandler>,
}

impl Application {
    /// Build the application, opening the channel store and delivering
    /// announcements through `sink`.
    pub async fn build(config: Config, sink: Arc<dyn ChatSink>) -> Result<Self> {
        let store = Arc::new(ChannelStore::open(&config.storage.path).await?);

        let hub = HubClient::from_config(&config.hub)?;
        let manager = Arc::new(SubscriptionManager::new(
            store,
            hub,
            SubscriptionSettings::from_config(&config.hub),
        ));

        let dedup = Arc::new(DedupCache::new(Duration::from_secs(
            config.relay.dedup_bucket_secs,
        )));
        let relay = Arc::new(NotificationRelay::new(
            sink,
            dedup,
            config.discord.channel_id,
            config.relay.watch_url_template.clone(),
        ));

        let commands = Arc::new(CommandHandler::new(
            manager.clone(),
            relay.clone(),
            config.discord.command_prefix.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            manager,
            relay,
            commands,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Get the subscription manager.
    pub fn manager(&self) -> &Arc<SubscriptionManager> {
        &self.manager
    }

    /// Get the notification relay.
    pub fn relay(&self) -> &Arc<NotificationRelay> {
        &self.relay
    }

    /// Get the command handler.
    pub fn commands(&self) -> &Arc<CommandHandler> {
        &self.commands
    }

    /// Create the webhook server for this application.
    pub fn web_server(&self) -> Result<WebServer> {
        WebServer::new(&self.config.server, self.relay.clone())
    }
}
