//! Configuration module for hubrelay.

use serde::Deserialize;
use std::path::Path;

use crate::{RelayError, Result};

/// Placeholder substituted with the channel id in the topic template.
pub const CHANNEL_ID_PLACEHOLDER: &str = "{channel_id}";

/// Placeholder substituted with the video id in the watch URL template.
pub const VIDEO_ID_PLACEHOLDER: &str = "{video_id}";

/// Webhook server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Bot token.
    #[serde(default)]
    pub token: String,
    /// Destination channel for announcements.
    #[serde(default)]
    pub channel_id: u64,
    /// Prefix that marks a message as a bot command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

fn default_command_prefix() -> String {
    "!".to_string()
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel_id: 0,
            command_prefix: default_command_prefix(),
        }
    }
}

/// Hub (WebSub) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Hub subscription endpoint.
    #[serde(default = "default_hub_url")]
    pub url: String,
    /// Topic URL template; `{channel_id}` is replaced by the monitored id.
    #[serde(default = "default_topic_template")]
    pub topic_template: String,
    /// Public URL of this service's webhook endpoint.
    #[serde(default)]
    pub callback_url: String,
    /// Maximum handshake attempts per operation.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between handshake attempts in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Send `hub.verify=async` with each request.
    #[serde(default)]
    pub verify_async: bool,
    /// Requested lease in seconds (hub default when unset).
    #[serde(default)]
    pub lease_seconds: Option<u64>,
}

fn default_hub_url() -> String {
    "https://pubsubhubbub.appspot.com/subscribe".to_string()
}

fn default_topic_template() -> String {
    "https://www.youtube.com/feeds/videos.xml?channel_id={channel_id}".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: default_hub_url(),
            topic_template: default_topic_template(),
            callback_url: String::new(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay(),
            request_timeout_secs: default_request_timeout(),
            verify_async: false,
            lease_seconds: None,
        }
    }
}

/// Notification relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Watch URL template; `{video_id}` is replaced by the content id.
    #[serde(default = "default_watch_url_template")]
    pub watch_url_template: String,
    /// Width of a dedup time bucket in seconds. At most one announcement is
    /// posted per bucket, whichever video it is for.
    #[serde(default = "default_dedup_bucket")]
    pub dedup_bucket_secs: u64,
}

fn default_watch_url_template() -> String {
    "https://www.youtube.com/watch?v={video_id}".to_string()
}

fn default_dedup_bucket() -> u64 {
    60
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            watch_url_template: default_watch_url_template(),
            dedup_bucket_secs: default_dedup_bucket(),
        }
    }
}

/// Persisted state configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the monitored-channel JSON document.
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "accounts.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file, written alongside stdout.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Webhook server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Discord bot configuration.
    #[serde(default)]
    pub discord: DiscordConfig,
    /// Hub configuration.
    #[serde(default)]
    pub hub: HubConfig,
    /// Relay configuration.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Persisted state configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RelayError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file if it exists, then apply
    /// environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `DISCORD_TOKEN`: bot token
    /// - `CHANNEL_ID`: destination channel id
    /// - `WEBHOOK_URL`: public callback URL
    /// - `HUBRELAY_HUB_URL`: hub endpoint
    /// - `HUBRELAY_PORT`: webhook server port
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(token) = non_empty_var("DISCORD_TOKEN") {
            self.discord.token = token;
        }
        if let Some(channel_id) = non_empty_var("CHANNEL_ID") {
            self.discord.channel_id = channel_id.trim().parse().map_err(|_| {
                RelayError::Config(format!("CHANNEL_ID is not a valid channel id: {channel_id}"))
            })?;
        }
        if let Some(callback_url) = non_empty_var("WEBHOOK_URL") {
            self.hub.callback_url = callback_url;
        }
        if let Some(hub_url) = non_empty_var("HUBRELAY_HUB_URL") {
            self.hub.url = hub_url;
        }
        if let Some(port) = non_empty_var("HUBRELAY_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| RelayError::Config(format!("HUBRELAY_PORT is not a port: {port}")))?;
        }
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the bot token is not set
    /// - the destination channel id is not set
    /// - the callback URL is missing or not an absolute http(s) URL
    /// - retry attempts or the dedup bucket are zero
    pub fn validate(&self) -> Result<()> {
        if self.discord.token.trim().is_empty() {
            return Err(RelayError::Config(
                "discord token is not set. \
                 Set it in config.toml or via DISCORD_TOKEN environment variable."
                    .to_string(),
            ));
        }
        if self.discord.channel_id == 0 {
            return Err(RelayError::Config(
                "discord channel_id is not set. \
                 Set it in config.toml or via CHANNEL_ID environment variable."
                    .to_string(),
            ));
        }
        if self.hub.callback_url.trim().is_empty() {
            return Err(RelayError::Config(
                "hub callback_url is not set. \
                 Set it in config.toml or via WEBHOOK_URL environment variable."
                    .to_string(),
            ));
        }
        let callback = url::Url::parse(&self.hub.callback_url)
            .map_err(|e| RelayError::Config(format!("hub callback_url is invalid: {e}")))?;
        if !matches!(callback.scheme(), "http" | "https") {
            return Err(RelayError::Config(format!(
                "hub callback_url must be http or https: {}",
                self.hub.callback_url
            )));
        }
        if !self.hub.topic_template.contains(CHANNEL_ID_PLACEHOLDER) {
            return Err(RelayError::Config(format!(
                "hub topic_template must contain {CHANNEL_ID_PLACEHOLDER}"
            )));
        }
        if self.hub.max_attempts == 0 {
            return Err(RelayError::Config(
                "hub max_attempts must be at least 1".to_string(),
            ));
        }
        if self.relay.dedup_bucket_secs == 0 {
            return Err(RelayError::Config(
                "relay dedup_bucket_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
