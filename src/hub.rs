//! Outbound WebSub hub client.
//!
//! Subscribe and unsubscribe requests are form-encoded `POST`s to the hub.
//! The hub answers `202 Accepted` when it has queued verification of intent;
//! it later calls the webhook's `GET` endpoint on its own schedule.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::config::{HubConfig, CHANNEL_ID_PLACEHOLDER};
use crate::{RelayError, Result};

/// User agent string for hub requests.
const USER_AGENT: &str = "hubrelay/0.1 (WebSub subscriber)";

/// Maximum number of response body characters kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Subscription mode sent as `hub.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubMode {
    /// Start receiving notifications for a topic.
    Subscribe,
    /// Stop receiving notifications for a topic.
    Unsubscribe,
}

impl HubMode {
    /// Form value for `hub.mode`.
    pub fn as_str(&self) -> &'static str {
        match self {
            HubMode::Subscribe => "subscribe",
            HubMode::Unsubscribe => "unsubscribe",
        }
    }
}

impl fmt::Display for HubMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single subscribe/unsubscribe handshake request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    /// Subscribe or unsubscribe.
    pub mode: HubMode,
    /// Feed URL the subscription targets.
    pub topic: String,
    /// This service's public webhook URL.
    pub callback: String,
    /// Ask the hub to verify asynchronously.
    pub verify_async: bool,
    /// Requested lease in seconds.
    pub lease_seconds: Option<u64>,
}

impl SubscriptionRequest {
    /// Create a new request.
    pub fn new(mode: HubMode, topic: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            mode,
            topic: topic.into(),
            callback: callback.into(),
            verify_async: false,
            lease_seconds: None,
        }
    }

    /// Request asynchronous verification.
    pub fn with_verify_async(mut self, verify_async: bool) -> Self {
        self.verify_async = verify_async;
        self
    }

    /// Request a specific lease.
    pub fn with_lease_seconds(mut self, lease_seconds: Option<u64>) -> Self {
        self.lease_seconds = lease_seconds;
        self
    }

    /// Form fields in the order they are sent.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("hub.mode", self.mode.as_str().to_string()),
            ("hub.topic", self.topic.clone()),
            ("hub.callback", self.callback.clone()),
        ];
        if self.verify_async {
            fields.push(("hub.verify", "async".to_string()));
        }
        if let Some(lease) = self.lease_seconds {
            fields.push(("hub.lease_seconds", lease.to_string()));
        }
        fields
    }
}

/// Build the topic URL for `channel_id` from a `{channel_id}` template.
pub fn topic_url(template: &str, channel_id: &str) -> String {
    template.replace(CHANNEL_ID_PLACEHOLDER, &urlencoding::encode(channel_id))
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (at least one is always made).
    pub max_attempts: u32,
    /// Delay between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// HTTP client for the hub endpoint.
#[derive(Debug, Clone)]
pub struct HubClient {
    client: Client,
    hub_url: String,
    retry: RetryPolicy,
}

impl HubClient {
    /// Create a new hub client.
    pub fn new(hub_url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Hub(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            hub_url: hub_url.into(),
            retry,
        })
    }

    /// Create a hub client from configuration.
    pub fn from_config(config: &HubConfig) -> Result<Self> {
        Self::new(
            &config.url,
            Duration::from_secs(config.request_timeout_secs),
            RetryPolicy::new(
                config.max_attempts,
                Duration::from_secs(config.retry_delay_secs),
            ),
        )
    }

    /// Hub endpoint URL.
    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    /// Retry policy used by [`HubClient::send_with_retry`].
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send one handshake request.
    ///
    /// Only `202 Accepted` counts as success.
    pub async fn send(&self, request: &SubscriptionRequest) -> Result<()> {
        debug!(
            mode = %request.mode,
            topic = %request.topic,
            hub = %self.hub_url,
            "sending hub request"
        );

        let response = self
            .client
            .post(&self.hub_url)
            .form(&request.form_fields())
            .send()
            .await
            .map_err(|e| RelayError::Hub(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
        if excerpt.is_empty() {
            Err(RelayError::Hub(format!("HTTP {status}")))
        } else {
            Err(RelayError::Hub(format!("HTTP {status}: {excerpt}")))
        }
    }

    /// Send a handshake request, retrying on any failure.
    ///
    /// Returns the number of attempts used. The delay between attempts
    /// yields to the runtime, so other requests keep being served.
    pub async fn send_with_retry(
        &self,
        channel_id: &str,
        request: &SubscriptionRequest,
    ) -> Result<u32> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.send(request).await {
                Ok(()) => {
                    info!(
                        channel_id,
                        mode = %request.mode,
                        attempt,
                        "hub accepted request"
                    );
                    return Ok(attempt);
                }
                Err(e) => {
                    warn!(
                        channel_id,
                        mode = %request.mode,
                        attempt,
                        max_attempts,
                        error = %e,
                        "hub request failed"
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        Err(RelayError::SubscriptionFailed {
            channel_id: channel_id.to_string(),
            attempts: max_attempts,
            last_error,
        })
    }
}
