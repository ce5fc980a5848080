//! HTTP handlers for the webhook server.

pub mod webhook;

pub use webhook::*;

use std::sync::Arc;

use crate::relay::NotificationRelay;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Notification relay serving hub callbacks.
    pub relay: Arc<NotificationRelay>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(relay: Arc<NotificationRelay>) -> Self {
        Self { relay }
    }
}
