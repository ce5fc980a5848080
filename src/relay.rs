//! Notification relay: hub callbacks in, chat announcements out.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chat::ChatSink;
use crate::config::VIDEO_ID_PLACEHOLDER;
use crate::dedup::{DedupCache, DedupKey};
use crate::feed::{parse_notification, FeedNotification, NotificationEvent};

/// Dedup category for content announcements.
pub const NOTIFICATION_CATEGORY: &str = "notification";

/// Discord rejects messages longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 2000;

/// Result of handling one content-delivery callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Announcement posted.
    Delivered {
        /// Content id.
        video_id: String,
    },
    /// Suppressed by the dedup window.
    Duplicate {
        /// Content id.
        video_id: String,
    },
    /// Deletion notice; nothing announced.
    Ignored {
        /// Tombstone reference.
        reference: String,
    },
    /// Payload could not be parsed; nothing announced.
    Rejected(String),
    /// Payload was fine but the chat system refused the message.
    DeliveryFailed(String),
}

impl DeliveryOutcome {
    /// Short status string reported back to the hub.
    pub fn status(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered { .. } => "ok",
            DeliveryOutcome::Duplicate { .. } => "duplicate",
            DeliveryOutcome::Ignored { .. } => "ignored",
            DeliveryOutcome::Rejected(_) | DeliveryOutcome::DeliveryFailed(_) => "error",
        }
    }

    /// Error message, if the outcome is an error.
    pub fn message(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::Rejected(msg) | DeliveryOutcome::DeliveryFailed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Handles hub verification and content delivery.
pub struct NotificationRelay {
    sink: Arc<dyn ChatSink>,
    dedup: Arc<DedupCache>,
    destination: u64,
    watch_url_template: String,
}

impl NotificationRelay {
    /// Create a new relay posting to `destination`.
    pub fn new(
        sink: Arc<dyn ChatSink>,
        dedup: Arc<DedupCache>,
        destination: u64,
        watch_url_template: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            dedup,
            destination,
            watch_url_template: watch_url_template.into(),
        }
    }

    /// Destination chat channel.
    pub fn destination(&self) -> u64 {
        self.destination
    }

    /// Answer a hub verification request by echoing the challenge verbatim.
    pub fn verify(&self, challenge: &str, mode: Option<&str>, topic: Option<&str>) -> String {
        info!(
            mode = mode.unwrap_or("-"),
            topic = topic.unwrap_or("-"),
            "hub verification request"
        );
        challenge.to_string()
    }

    /// Watch URL for `video_id`.
    pub fn watch_url(&self, video_id: &str) -> String {
        self.watch_url_template
            .replace(VIDEO_ID_PLACEHOLDER, &urlencoding::encode(video_id))
    }

    /// Handle a content-delivery body. Never fails; the outcome says what
    /// happened.
    pub async fn deliver(&self, body: &[u8]) -> DeliveryOutcome {
        let event = match parse_notification(body) {
            Ok(FeedNotification::Entry(event)) => event,
            Ok(FeedNotification::Deleted { reference }) => {
                info!(reference = %reference, "entry deleted upstream, nothing to announce");
                return DeliveryOutcome::Ignored { reference };
            }
            Err(e) => {
                warn!(error = %e, body_len = body.len(), "rejected webhook payload");
                return DeliveryOutcome::Rejected(e.to_string());
            }
        };

        let key = DedupKey::new(
            self.destination,
            NOTIFICATION_CATEGORY,
            self.dedup.current_bucket(),
        );
        if !self.dedup.check_and_insert(key.clone()) {
            debug!(video_id = %event.video_id, bucket = key.bucket, "duplicate notification suppressed");
            return DeliveryOutcome::Duplicate {
                video_id: event.video_id,
            };
        }

        let message = format_announcement(&event, &self.watch_url(&event.video_id));
        match self.sink.send_message(self.destination, &message).await {
            Ok(()) => {
                info!(
                    video_id = %event.video_id,
                    channel_id = event.channel_id.as_deref().unwrap_or("-"),
                    destination = self.destination,
                    "announcement delivered"
                );
                DeliveryOutcome::Delivered {
                    video_id: event.video_id,
                }
            }
            Err(e) => {
                warn!(
                    video_id = %event.video_id,
                    destination = self.destination,
                    error = %e,
                    "announcement delivery failed"
                );
                // Let a hub redelivery within the same window try again.
                self.dedup.forget(&key);
                DeliveryOutcome::DeliveryFailed(e.to_string())
            }
        }
    }
}

/// Human-readable announcement for `event`.
pub fn format_announcement(event: &NotificationEvent, watch_url: &str) -> String {
    let header = match &event.author {
        Some(author) => format!("New YouTube video from {author}: "),
        None => "New YouTube video: ".to_string(),
    };

    let budget = MAX_MESSAGE_CHARS
        .saturating_sub(header.chars().count() + 1 + watch_url.chars().count());
    let title = truncate_chars(&event.title, budget);

    format!("{header}{title}\n{watch_url}")
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(max - 1).collect();
    out.push('…');
    out
}
