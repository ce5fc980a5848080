//! Subscription management.
//!
//! Mutates the monitored-channel list and issues hub handshakes. A local
//! mutation is never rolled back because of a hub failure: a channel whose
//! subscribe handshake failed stays monitored, and the next status sweep
//! retries it.
//!
//! Handshakes are serialized against list mutations: a channel removed
//! while a sweep is running is never re-subscribed by that sweep.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::HubConfig;
use crate::hub::{topic_url, HubClient, HubMode, SubscriptionRequest};
use crate::store::ChannelStore;
use crate::Result;

/// Outcome of the hub handshake that followed a local mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// The hub accepted the request after the given number of attempts.
    Accepted {
        /// Attempts used.
        attempts: u32,
    },
    /// Every attempt failed; the local change stands.
    Failed(String),
}

impl Handshake {
    /// Whether the hub accepted the request.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Handshake::Accepted { .. })
    }
}

/// Acknowledgement of a successful list mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// Channel added and subscribed.
    Added {
        /// Channel id.
        channel_id: String,
        /// Subscribe handshake outcome (always accepted).
        handshake: Handshake,
    },
    /// Channel removed; unsubscribing is best-effort.
    Removed {
        /// Channel id.
        channel_id: String,
        /// Unsubscribe handshake outcome.
        handshake: Handshake,
    },
}

/// Per-entry result of a status sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepEntry {
    /// Channel id.
    pub channel_id: String,
    /// Subscribe handshake outcome.
    pub handshake: Handshake,
}

impl fmt::Display for SweepEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handshake {
            Handshake::Accepted { .. } => write!(f, "{}: subscribed", self.channel_id),
            Handshake::Failed(reason) => write!(f, "{}: failed ({reason})", self.channel_id),
        }
    }
}

/// Handshake parameters shared by every request.
#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    /// Topic template containing `{channel_id}`.
    pub topic_template: String,
    /// Public callback URL.
    pub callback_url: String,
    /// Send `hub.verify=async`.
    pub verify_async: bool,
    /// Requested lease.
    pub lease_seconds: Option<u64>,
}

impl SubscriptionSettings {
    /// Build settings from hub configuration.
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            topic_template: config.topic_template.clone(),
            callback_url: config.callback_url.clone(),
            verify_async: config.verify_async,
            lease_seconds: config.lease_seconds,
        }
    }
}

/// Owns the subscribe/unsubscribe workflow.
pub struct SubscriptionManager {
    store: Arc<ChannelStore>,
    hub: HubClient,
    settings: SubscriptionSettings,
    /// Held across a mutation and its handshake, and across each sweep entry.
    handshake_lock: Mutex<()>,
}

impl SubscriptionManager {
    /// Create a new manager.
    pub fn new(store: Arc<ChannelStore>, hub: HubClient, settings: SubscriptionSettings) -> Self {
        Self {
            store,
            hub,
            settings,
            handshake_lock: Mutex::new(()),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<ChannelStore> {
        &self.store
    }

    /// Build the handshake request for `channel_id`.
    pub fn request_for(&self, mode: HubMode, channel_id: &str) -> SubscriptionRequest {
        SubscriptionRequest::new(
            mode,
            topic_url(&self.settings.topic_template, channel_id),
            &self.settings.callback_url,
        )
        .with_verify_async(self.settings.verify_async)
        .with_lease_seconds(self.settings.lease_seconds)
    }

    /// Add (`add = true`) or remove a monitored channel.
    ///
    /// # Errors
    ///
    /// - `AlreadyMonitored` / `NotMonitored` / `Validation` when the list
    ///   mutation is rejected; nothing is persisted or sent.
    /// - `SubscriptionFailed` when every subscribe attempt failed; the channel
    ///   remains persisted.
    /// - `Io` / `Json` when persisting the list failed.
    pub async fn set_subscription(&self, channel_id: &str, add: bool) -> Result<Ack> {
        let channel_id = channel_id.trim();
        let _guard = self.handshake_lock.lock().await;
        if add {
            self.add(channel_id).await
        } else {
            self.remove(channel_id).await
        }
    }

    async fn add(&self, channel_id: &str) -> Result<Ack> {
        self.store.add(channel_id).await?;

        let request = self.request_for(HubMode::Subscribe, channel_id);
        match self.hub.send_with_retry(channel_id, &request).await {
            Ok(attempts) => {
                info!(channel_id, attempts, "subscribed to channel");
                Ok(Ack::Added {
                    channel_id: channel_id.to_string(),
                    handshake: Handshake::Accepted { attempts },
                })
            }
            Err(e) => {
                error!(
                    channel_id,
                    error = %e,
                    "subscribe handshake failed; channel stays monitored"
                );
                Err(e)
            }
        }
    }

    async fn remove(&self, channel_id: &str) -> Result<Ack> {
        self.store.remove(channel_id).await?;

        let request = self.request_for(HubMode::Unsubscribe, channel_id);
        let handshake = match self.hub.send_with_retry(channel_id, &request).await {
            Ok(attempts) => {
                info!(channel_id, attempts, "unsubscribed from channel");
                Handshake::Accepted { attempts }
            }
            Err(e) => {
                warn!(channel_id, error = %e, "unsubscribe handshake failed");
                Handshake::Failed(e.to_string())
            }
        };

        Ok(Ack::Removed {
            channel_id: channel_id.to_string(),
            handshake,
        })
    }

    /// Re-issue a subscribe handshake for every monitored channel.
    ///
    /// Individual failures are recorded in the summary and do not stop the
    /// sweep. The store lock is not held while handshakes run; channels
    /// removed since the sweep started are skipped.
    pub async fn status_sweep(&self) -> Vec<SweepEntry> {
        let channels = self.store.list().await;
        info!(count = channels.len(), "starting subscription sweep");

        let mut summary = Vec::with_capacity(channels.len());
        for channel_id in channels {
            let _guard = self.handshake_lock.lock().await;
            if !self.store.contains(&channel_id).await {
                debug!(channel_id = %channel_id, "channel removed during sweep, skipping");
                continue;
            }

            let request = self.request_for(HubMode::Subscribe, &channel_id);
            let handshake = match self.hub.send_with_retry(&channel_id, &request).await {
                Ok(attempts) => Handshake::Accepted { attempts },
                Err(e) => {
                    warn!(channel_id = %channel_id, error = %e, "sweep resubscribe failed");
                    Handshake::Failed(e.to_string())
                }
            };
            summary.push(SweepEntry {
                channel_id,
                handshake,
            });
        }

        let failed = summary.iter().filter(|e| !e.handshake.is_accepted()).count();
        info!(total = summary.len(), failed, "subscription sweep finished");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::RetryPolicy;
    use crate::RelayError;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn manager(hub_url: &str, attempts: u32) -> (TempDir, SubscriptionManager) {
        manager_with_delay(hub_url, attempts, Duration::from_millis(10)).await
    }

    async fn manager_with_delay(
        hub_url: &str,
        attempts: u32,
        delay: Duration,
    ) -> (TempDir, SubscriptionManager) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            ChannelStore::open(dir.path().join("accounts.json"))
                .await
                .unwrap(),
        );
        let hub = HubClient::new(
            hub_url,
            Duration::from_secs(5),
            RetryPolicy::new(attempts, delay),
        )
        .unwrap();
        let settings = SubscriptionSettings {
            topic_template: "https://feeds.example.com/videos.xml?channel_id={channel_id}"
                .to_string(),
            callback_url: "https://relay.example.com/webhook".to_string(),
            verify_async: false,
            lease_seconds: None,
        };
        (dir, SubscriptionManager::new(store, hub, settings))
    }

    #[tokio::test]
    async fn test_add_subscribes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("hub.mode".into(), "subscribe".into()),
                mockito::Matcher::UrlEncoded(
                    "hub.topic".into(),
                    "https://feeds.example.com/videos.xml?channel_id=UC1".into(),
                ),
            ]))
            .with_status(202)
            .expect(1)
            .create_async()
            .await;

        let (_dir, manager) = manager(&server.url(), 3).await;
        let ack = manager.set_subscription("UC1", true).await.unwrap();

        assert_eq!(
            ack,
            Ack::Added {
                channel_id: "UC1".to_string(),
                handshake: Handshake::Accepted { attempts: 1 },
            }
        );
        assert_eq!(manager.store().list().await, vec!["UC1"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_add_duplicate_sends_nothing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(202)
            .expect(1)
            .create_async()
            .await;

        let (_dir, manager) = manager(&server.url(), 3).await;
        manager.set_subscription("UC1", true).await.unwrap();
        let err = manager.set_subscription("UC1", true).await.unwrap_err();

        assert!(matches!(err, RelayError::AlreadyMonitored(_)));
        assert_eq!(manager.store().list().await, vec!["UC1"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_remove_missing() {
        let server = mockito::Server::new_async().await;
        let (_dir, manager) = manager(&server.url(), 3).await;

        let err = manager.set_subscription("UC1", false).await.unwrap_err();
        assert!(matches!(err, RelayError::NotMonitored(_)));
    }

    #[tokio::test]
    async fn test_subscribe_failure_keeps_channel() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let (_dir, manager) = manager(&server.url(), 3).await;
        let err = manager.set_subscription("UC1", true).await.unwrap_err();

        assert!(matches!(
            err,
            RelayError::SubscriptionFailed { attempts: 3, .. }
        ));
        assert!(!err.is_validation());
        assert_eq!(manager.store().list().await, vec!["UC1"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unsubscribe_failure_still_removes() {
        let mut server = mockito::Server::new_async().await;
        let _subscribe = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::UrlEncoded(
                "hub.mode".into(),
                "subscribe".into(),
            ))
            .with_status(202)
            .create_async()
            .await;
        let _unsubscribe = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::UrlEncoded(
                "hub.mode".into(),
                "unsubscribe".into(),
            ))
            .with_status(500)
            .create_async()
            .await;

        let (_dir, manager) = manager(&server.url(), 2).await;
        manager.set_subscription("UC1", true).await.unwrap();
        let ack = manager.set_subscription("UC1", false).await.unwrap();

        match ack {
            Ack::Removed {
                channel_id,
                handshake: Handshake::Failed(reason),
            } => {
                assert_eq!(channel_id, "UC1");
                assert!(reason.contains("500"));
            }
            other => panic!("unexpected ack: {other:?}"),
        }
        assert!(manager.store().list().await.is_empty());
    }

    #[tokio::test]
    async fn test_status_sweep_reports_each_entry() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::UrlEncoded(
                "hub.topic".into(),
                "https://feeds.example.com/videos.xml?channel_id=UC1".into(),
            ))
            .with_status(202)
            .create_async()
            .await;
        let _bad = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::UrlEncoded(
                "hub.topic".into(),
                "https://feeds.example.com/videos.xml?channel_id=UC2".into(),
            ))
            .with_status(400)
            .create_async()
            .await;

        let (_dir, manager) = manager(&server.url(), 1).await;
        manager.set_subscription("UC1", true).await.unwrap();
        // UC2 is recorded even though its subscribe fails.
        assert!(manager.set_subscription("UC2", true).await.is_err());

        let summary = manager.status_sweep().await;

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].channel_id, "UC1");
        assert!(summary[0].handshake.is_accepted());
        assert_eq!(summary[1].channel_id, "UC2");
        assert!(!summary[1].handshake.is_accepted());
        assert_eq!(summary[0].to_string(), "UC1: subscribed");
        assert!(summary[1].to_string().starts_with("UC2: failed"));
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_list() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(202)
            .create_async()
            .await;

        let (_dir, manager) = manager(&server.url(), 1).await;
        manager.set_subscription("UC1", true).await.unwrap();
        manager.set_subscription("UC2", true).await.unwrap();
        let before = manager.store().list().await;

        manager.set_subscription("UC3", true).await.unwrap();
        manager.set_subscription("UC3", false).await.unwrap();

        assert_eq!(manager.store().list().await, before);
    }

    #[tokio::test]
    async fn test_channel_removed_during_sweep_is_not_resubscribed() {
        let mut server = mockito::Server::new_async().await;
        let slow = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::UrlEncoded(
                "hub.topic".into(),
                "https://feeds.example.com/videos.xml?channel_id=UC0".into(),
            ))
            .with_status(500)
            .expect(2)
            .create_async()
            .await;
        let resubscribe = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("hub.mode".into(), "subscribe".into()),
                mockito::Matcher::UrlEncoded(
                    "hub.topic".into(),
                    "https://feeds.example.com/videos.xml?channel_id=UC1".into(),
                ),
            ]))
            .with_status(202)
            .expect(0)
            .create_async()
            .await;
        let unsubscribe = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("hub.mode".into(), "unsubscribe".into()),
                mockito::Matcher::UrlEncoded(
                    "hub.topic".into(),
                    "https://feeds.example.com/videos.xml?channel_id=UC1".into(),
                ),
            ]))
            .with_status(202)
            .expect(1)
            .create_async()
            .await;

        let (_dir, manager) =
            manager_with_delay(&server.url(), 2, Duration::from_millis(300)).await;
        manager.store().add("UC0").await.unwrap();
        manager.store().add("UC1").await.unwrap();

        // The remove is issued while the sweep waits between UC0 attempts.
        let (summary, removed) = tokio::join!(manager.status_sweep(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            manager.set_subscription("UC1", false).await
        });

        assert!(matches!(
            removed.unwrap(),
            Ack::Removed {
                handshake: Handshake::Accepted { .. },
                ..
            }
        ));
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].channel_id, "UC0");
        assert!(!summary[0].handshake.is_accepted());
        assert_eq!(manager.store().list().await, vec!["UC0"]);
        slow.assert_async().await;
        resubscribe.assert_async().await;
        unsubscribe.assert_async().await;
    }
}
