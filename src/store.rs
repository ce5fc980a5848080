//! Persisted list of monitored upstream channels.
//!
//! The list lives in a flat JSON document of the shape
//! `{"youtube": ["UC...", ...]}`. It is read once when the store is opened
//! and rewritten in full after every mutation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::{RelayError, Result};

/// On-disk document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsDocument {
    #[serde(default)]
    youtube: Vec<String>,
}

/// Ordered, duplicate-free list of monitored channel ids backed by a JSON file.
///
/// Mutations are serialized: the lock is held across read, modify and
/// persist, so a chat command and a concurrent status sweep cannot lose
/// each other's updates.
#[derive(Debug)]
pub struct ChannelStore {
    path: PathBuf,
    channels: Mutex<Vec<String>>,
}

impl ChannelStore {
    /// Open the store at `path`. A missing file yields an empty list.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let channels = match tokio::fs::read_to_string(&path).await {
            Ok(content) => dedup_preserving_order(parse_document(&content)?.youtube),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "store file not found, starting empty");
                Vec::new()
            }
            Err(e) => return Err(RelayError::Io(e)),
        };

        info!(
            path = %path.display(),
            count = channels.len(),
            "loaded monitored channels"
        );

        Ok(Self {
            path,
            channels: Mutex::new(channels),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the monitored channels in insertion order.
    pub async fn list(&self) -> Vec<String> {
        self.channels.lock().await.clone()
    }

    /// Whether `channel_id` is monitored.
    pub async fn contains(&self, channel_id: &str) -> bool {
        self.channels.lock().await.iter().any(|c| c == channel_id)
    }

    /// Append `channel_id` and persist.
    ///
    /// Returns `AlreadyMonitored` without touching the list or the file if
    /// the id is present.
    pub async fn add(&self, channel_id: &str) -> Result<()> {
        let channel_id = normalize_id(channel_id)?;
        let mut channels = self.channels.lock().await;

        if channels.iter().any(|c| c == channel_id) {
            return Err(RelayError::AlreadyMonitored(channel_id.to_string()));
        }

        channels.push(channel_id.to_string());
        if let Err(e) = self.persist(&channels).await {
            channels.pop();
            error!(channel_id, error = %e, "failed to persist added channel");
            return Err(e);
        }

        info!(channel_id, "channel added to monitored list");
        Ok(())
    }

    /// Remove `channel_id` and persist, keeping the order of the others.
    pub async fn remove(&self, channel_id: &str) -> Result<()> {
        let channel_id = normalize_id(channel_id)?;
        let mut channels = self.channels.lock().await;

        let Some(index) = channels.iter().position(|c| c == channel_id) else {
            return Err(RelayError::NotMonitored(channel_id.to_string()));
        };

        let removed = channels.remove(index);
        if let Err(e) = self.persist(&channels).await {
            channels.insert(index, removed);
            error!(channel_id, error = %e, "failed to persist removed channel");
            return Err(e);
        }

        info!(channel_id, "channel removed from monitored list");
        Ok(())
    }

    /// Rewrite the whole document through a temp file and rename.
    async fn persist(&self, channels: &[String]) -> Result<()> {
        let document = AccountsDocument {
            youtube: channels.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), count = channels.len(), "store persisted");
        Ok(())
    }
}

fn parse_document(content: &str) -> Result<AccountsDocument> {
    if content.trim().is_empty() {
        return Ok(AccountsDocument::default());
    }
    Ok(serde_json::from_str(content)?)
}

fn normalize_id(channel_id: &str) -> Result<&str> {
    let trimmed = channel_id.trim();
    if trimmed.is_empty() {
        return Err(RelayError::Validation(
            "channel id must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim().to_string();
        if !id.is_empty() && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, ChannelStore) {
        let dir = TempDir::new().unwrap();
        let store = ChannelStore::open(dir.path().join("accounts.json"))
            .await
            .unwrap();
        (dir, store)
    }

    async fn read_file(store: &ChannelStore) -> serde_json::Value {
        let content = tokio::fs::read_to_string(store.path()).await.unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let (_dir, store) = open_temp().await;
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_open_existing_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, r#"{"youtube": ["UC1", "UC2", "UC1"], "twitch": []}"#).unwrap();

        let store = ChannelStore::open(&path).await.unwrap();
        assert_eq!(store.list().await, vec!["UC1", "UC2"]);
    }

    #[tokio::test]
    async fn test_open_corrupt_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = ChannelStore::open(&path).await;
        assert!(matches!(result, Err(RelayError::Json(_))));
    }

    #[tokio::test]
    async fn test_add_persists() {
        let (_dir, store) = open_temp().await;

        store.add("UC1").await.unwrap();
        store.add("UC2").await.unwrap();

        assert_eq!(store.list().await, vec!["UC1", "UC2"]);
        assert_eq!(
            read_file(&store).await,
            serde_json::json!({"youtube": ["UC1", "UC2"]})
        );
    }

    #[tokio::test]
    async fn test_add_duplicate_rejected() {
        let (_dir, store) = open_temp().await;
        store.add("UC1").await.unwrap();
        let before = tokio::fs::read_to_string(store.path()).await.unwrap();

        let result = store.add("UC1").await;

        assert!(matches!(result, Err(RelayError::AlreadyMonitored(id)) if id == "UC1"));
        assert_eq!(store.list().await, vec!["UC1"]);
        let after = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_add_empty_rejected() {
        let (_dir, store) = open_temp().await;
        assert!(matches!(
            store.add("  ").await,
            Err(RelayError::Validation(_))
        ));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_remove_missing_rejected() {
        let (_dir, store) = open_temp().await;
        store.add("UC1").await.unwrap();

        let result = store.remove("UC9").await;

        assert!(matches!(result, Err(RelayError::NotMonitored(id)) if id == "UC9"));
        assert_eq!(store.list().await, vec!["UC1"]);
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_order() {
        let (_dir, store) = open_temp().await;
        store.add("UC1").await.unwrap();
        store.add("UC2").await.unwrap();
        store.add("UC3").await.unwrap();

        store.add("UCX").await.unwrap();
        store.remove("UCX").await.unwrap();
        store.remove("UC2").await.unwrap();

        assert_eq!(store.list().await, vec!["UC1", "UC3"]);
        assert_eq!(
            read_file(&store).await,
            serde_json::json!({"youtube": ["UC1", "UC3"]})
        );
    }

    #[tokio::test]
    async fn test_reopen_sees_mutations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("accounts.json");
        {
            let store = ChannelStore::open(&path).await.unwrap();
            store.add("UC1").await.unwrap();
            store.add("UC2").await.unwrap();
            store.remove("UC1").await.unwrap();
        }

        let store = ChannelStore::open(&path).await.unwrap();
        assert_eq!(store.list().await, vec!["UC2"]);
        assert!(store.contains("UC2").await);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let (_dir, store) = open_temp().await;
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.add(&format!("UC{i}")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.list().await.len(), 20);
        let doc = read_file(&store).await;
        assert_eq!(doc["youtube"].as_array().unwrap().len(), 20);
    }
}
