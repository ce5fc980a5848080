//! Test helpers for integration tests.
//!
//! Provides a recording chat sink and builders for a fully wired
//! application backed by a temporary store and a mock hub.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use hubrelay::config::Config;
use hubrelay::{Application, ChatSink, RelayError, Result};

/// Destination channel used by every test application.
pub const DESTINATION: u64 = 4242;

/// Chat sink that records every message instead of sending it.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(u64, String)>>,
    fail: bool,
}

impl RecordingSink {
    /// Create a sink that accepts every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that rejects every message.
    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Messages recorded so far.
    pub fn messages(&self) -> Vec<(u64, String)> {
        self.messages.lock().unwrap().clone()
    }

    /// Number of messages recorded so far.
    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn send_message(&self, channel_id: u64, content: &str) -> Result<()> {
        if self.fail {
            return Err(RelayError::Delivery("sink unavailable".to_string()));
        }
        self.messages
            .lock()
            .unwrap()
            .push((channel_id, content.to_string()));
        Ok(())
    }
}

/// Create a test configuration pointing at `hub_url` with a store inside
/// `dir`.
pub fn create_test_config(dir: &TempDir, hub_url: &str) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.discord.token = "test-token".to_string();
    config.discord.channel_id = DESTINATION;
    config.hub.url = hub_url.to_string();
    config.hub.callback_url = "https://relay.example.com/webhook".to_string();
    config.hub.retry_delay_secs = 0;
    config.hub.request_timeout_secs = 5;
    // Wide window so two deliveries in one test never straddle a bucket.
    config.relay.dedup_bucket_secs = 86_400;
    config.storage.path = dir.path().join("accounts.json").display().to_string();
    config
}

/// Build a fully wired application with a recording sink.
pub async fn create_test_app(
    dir: &TempDir,
    hub_url: &str,
) -> (Application, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let app = Application::build(create_test_config(dir, hub_url), sink.clone())
        .await
        .expect("Failed to build test application");
    (app, sink)
}
