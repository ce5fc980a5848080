//! Parsing of hub content-delivery payloads.
//!
//! The hub forwards an Atom document containing the updated entry:
//!
//! ```xml
//! <feed xmlns:yt="http://www.youtube.com/xml/schemas/2015"
//!       xmlns="http://www.w3.org/2005/Atom">
//!   <title>YouTube video feed</title>
//!   <entry>
//!     <id>yt:video:VIDEO_ID</id>
//!     <yt:videoId>VIDEO_ID</yt:videoId>
//!     <yt:channelId>CHANNEL_ID</yt:channelId>
//!     <title>Video title</title>
//!     <author><name>Channel title</name></author>
//!   </entry>
//! </feed>
//! ```
//!
//! Not every hub declares the namespaces it uses, so elements are matched on
//! their local name when they carry the expected namespace, no namespace, or
//! the undeclared prefix conventionally used for it (`yt`, `at`, `atom`).

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::{RelayError, Result};

/// Atom namespace.
pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// YouTube schema namespace.
pub const YT_NS: &str = "http://www.youtube.com/xml/schemas/2015";

/// Atom tombstones namespace (deleted entries).
pub const TOMBSTONE_NS: &str = "http://purl.org/atompub/tombstones/1.0";

/// Prefix of Atom `<id>` values carrying a video id.
const VIDEO_ID_PREFIX: &str = "yt:video:";

/// A new or updated piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    /// Content identifier.
    pub video_id: String,
    /// Content title.
    pub title: String,
    /// Upstream channel that published the content.
    pub channel_id: Option<String>,
    /// Display name of the publisher.
    pub author: Option<String>,
}

/// Parsed callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedNotification {
    /// A published or updated entry.
    Entry(NotificationEvent),
    /// The referenced entry was deleted upstream.
    Deleted {
        /// The `ref` attribute of the tombstone.
        reference: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    VideoId,
    ChannelId,
    Title,
    AtomId,
    AuthorName,
}

#[derive(Debug, Default)]
struct EntryBuilder {
    video_id: String,
    channel_id: String,
    title: String,
    atom_id: String,
    author: String,
}

impl EntryBuilder {
    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::VideoId => &mut self.video_id,
            Field::ChannelId => &mut self.channel_id,
            Field::Title => &mut self.title,
            Field::AtomId => &mut self.atom_id,
            Field::AuthorName => &mut self.author,
        };
        target.push_str(text);
    }

    fn build(self) -> Result<NotificationEvent> {
        let mut video_id = self.video_id.trim().to_string();
        if video_id.is_empty() {
            if let Some(id) = self.atom_id.trim().strip_prefix(VIDEO_ID_PREFIX) {
                video_id = id.trim().to_string();
            }
        }
        if video_id.is_empty() {
            return Err(RelayError::Parse("entry has no video id".to_string()));
        }

        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(RelayError::Parse("entry has no title".to_string()));
        }

        Ok(NotificationEvent {
            video_id,
            title,
            channel_id: non_empty(self.channel_id),
            author: non_empty(self.author),
        })
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Prefix hubs conventionally use for `namespace`.
fn conventional_prefix(namespace: &str) -> Option<&'static [u8]> {
    match namespace {
        YT_NS => Some(&b"yt"[..]),
        TOMBSTONE_NS => Some(&b"at"[..]),
        ATOM_NS => Some(&b"atom"[..]),
        _ => None,
    }
}

/// Whether a resolved element namespace is acceptable for `expected`.
///
/// An undeclared prefix only counts when it is the one conventionally bound
/// to `expected`, so `<yt:videoId>` matches without a declaration while
/// `<media:title>` never stands in for an Atom title.
fn ns_matches(ns: &ResolveResult<'_>, expected: &str) -> bool {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => *uri == expected.as_bytes(),
        ResolveResult::Unbound => true,
        ResolveResult::Unknown(prefix) => {
            conventional_prefix(expected).is_some_and(|p| prefix.as_slice() == p)
        }
    }
}

fn tombstone_ref(e: &BytesStart<'_>) -> Result<String> {
    let attr = e
        .try_get_attribute("ref")
        .map_err(|err| RelayError::Parse(err.to_string()))?
        .ok_or_else(|| RelayError::Parse("deleted-entry has no ref".to_string()))?;
    Ok(attr.unescape_value()?.trim().to_string())
}

/// Parse a content-delivery body.
///
/// Only the first `<entry>` is considered.
pub fn parse_notification(body: &[u8]) -> Result<FeedNotification> {
    let xml = std::str::from_utf8(body)
        .map_err(|e| RelayError::Parse(format!("body is not UTF-8: {e}")))?;

    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut saw_root = false;
    let mut entry: Option<EntryBuilder> = None;
    let mut in_author = false;
    let mut current: Option<Field> = None;

    loop {
        let (ns, event) = reader.read_resolved_event()?;
        match event {
            Event::Start(e) => {
                saw_root = true;
                let local = e.local_name();
                let local = local.as_ref();

                if local == b"deleted-entry" && ns_matches(&ns, TOMBSTONE_NS) {
                    return Ok(FeedNotification::Deleted {
                        reference: tombstone_ref(&e)?,
                    });
                }

                if entry.is_none() {
                    if local == b"entry" && ns_matches(&ns, ATOM_NS) {
                        entry = Some(EntryBuilder::default());
                    }
                    continue;
                }

                current = match local {
                    b"videoId" if ns_matches(&ns, YT_NS) => Some(Field::VideoId),
                    b"channelId" if ns_matches(&ns, YT_NS) => Some(Field::ChannelId),
                    b"title" if !in_author && ns_matches(&ns, ATOM_NS) => Some(Field::Title),
                    b"id" if !in_author && ns_matches(&ns, ATOM_NS) => Some(Field::AtomId),
                    b"name" if in_author => Some(Field::AuthorName),
                    b"author" if ns_matches(&ns, ATOM_NS) => {
                        in_author = true;
                        None
                    }
                    _ => None,
                };
            }
            Event::Empty(e) => {
                saw_root = true;
                let local = e.local_name();
                if local.as_ref() == b"deleted-entry" && ns_matches(&ns, TOMBSTONE_NS) {
                    return Ok(FeedNotification::Deleted {
                        reference: tombstone_ref(&e)?,
                    });
                }
            }
            Event::Text(t) => {
                if let (Some(field), Some(builder)) = (current, entry.as_mut()) {
                    builder.push(field, &t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let (Some(field), Some(builder)) = (current, entry.as_mut()) {
                    let text = String::from_utf8_lossy(&c);
                    builder.push(field, &text);
                }
            }
            Event::End(e) => {
                current = None;
                let local = e.local_name();
                match local.as_ref() {
                    b"author" => in_author = false,
                    b"entry" => {
                        if let Some(builder) = entry.take() {
                            return builder.build().map(FeedNotification::Entry);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(RelayError::Parse("body is not an XML document".to_string()));
    }

    match entry {
        // Unterminated entry at EOF: the reader only reaches here when the
        // document was cut short, so treat it as malformed.
        Some(_) => Err(RelayError::Parse("unterminated entry".to_string())),
        None => Err(RelayError::Parse("document has no entry".to_string())),
    }
}

/// Build a minimal notification document for `video_id` and `title`.
///
/// Used by the webhook self-test.
pub fn sample_payload(video_id: &str, title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="{YT_NS}" xmlns="{ATOM_NS}">
  <title>YouTube video feed</title>
  <entry>
    <id>yt:video:{video_id}</id>
    <yt:videoId>{video_id}</yt:videoId>
    <yt:channelId>self-test</yt:channelId>
    <title>{title}</title>
    <author><name>hubrelay</name></author>
  </entry>
</feed>"#,
        video_id = escape(video_id),
        title = escape(title),
    )
}

fn escape(s: &str) -> String {
    quick_xml::escape::escape(s).into_owned()
}
