//! Durable key/value storage for credentials.
//!
//! This is the local-storage analogue: a flat map of string keys to string
//! values that survives restarts when backed by [`FileStore`]. Only the
//! credential manager reads or writes it.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;

/// Generic application auth token, cleared on any 401 from the catalog
pub const GENERIC_TOKEN_KEY: &str = "access_token";

/// Spotify user access token
pub const USER_ACCESS_TOKEN_KEY: &str = "spotify_access_token";

/// Spotify user refresh token
pub const USER_REFRESH_TOKEN_KEY: &str = "spotify_refresh_token";

/// Spotify user token expiry, epoch milliseconds as a decimal string
pub const USER_TOKEN_EXPIRES_KEY: &str = "spotify_token_expires";

/// Durable string key/value store
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a value, `None` if the key is not set.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store; contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// JSON-file backed store.
///
/// The whole map is loaded lazily on first access and rewritten on every
/// mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: RwLock::new(None),
        }
    }

    /// Store at the default session path (`~/.config/tunescout/.session.json`)
    #[must_use]
    pub fn at_default_path() -> Self {
        Self::new(crate::paths::session_path())
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No credential store at {:?}, starting empty", self.path);
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, content).await?;
        debug!("Saved credential store to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        {
            let guard = self.entries.read().await;
            if let Some(ref entries) = *guard {
                return Ok(entries.get(key).cloned());
            }
        }

        let mut guard = self.entries.write().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.entries.write().await;
        let mut entries = match guard.take() {
            Some(entries) => entries,
            None => self.load().await?,
        };
        entries.insert(key.to_string(), value.to_string());
        let result = self.persist(&entries).await;
        *guard = Some(entries);
        result
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.entries.write().await;
        let mut entries = match guard.take() {
            Some(entries) => entries,
            None => self.load().await?,
        };
        let result = if entries.remove(key).is_some() {
            self.persist(&entries).await
        } else {
            Ok(())
        };
        *guard = Some(entries);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("tunescout-store-{}-{name}", std::process::id()))
            .join("session.json")
    }

    #[tokio::test]
    async fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get(GENERIC_TOKEN_KEY).await.unwrap(), None);

        store.set(GENERIC_TOKEN_KEY, "abc").await.unwrap();
        assert_eq!(
            store.get(GENERIC_TOKEN_KEY).await.unwrap().as_deref(),
            Some("abc")
        );

        store.remove(GENERIC_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(GENERIC_TOKEN_KEY).await.unwrap(), None);

        // Removing a missing key is fine
        store.remove(GENERIC_TOKEN_KEY).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let path = temp_store_path("reopen");
        let _ = tokio::fs::remove_file(&path).await;

        {
            let store = FileStore::new(&path);
            store.set(USER_ACCESS_TOKEN_KEY, "user-token").await.unwrap();
            store.set(USER_TOKEN_EXPIRES_KEY, "1700000000000").await.unwrap();
        }

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get(USER_ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
            Some("user-token")
        );
        assert_eq!(
            reopened.get(USER_TOKEN_EXPIRES_KEY).await.unwrap().as_deref(),
            Some("1700000000000")
        );

        reopened.remove(USER_ACCESS_TOKEN_KEY).await.unwrap();
        let again = FileStore::new(&path);
        assert_eq!(again.get(USER_ACCESS_TOKEN_KEY).await.unwrap(), None);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let path = temp_store_path("missing");
        let _ = tokio::fs::remove_file(&path).await;

        let store = FileStore::new(&path);
        assert_eq!(store.get(USER_REFRESH_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let path = temp_store_path("corrupt");
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.unwrap();
        }
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = FileStore::new(&path);
        assert!(store.get(GENERIC_TOKEN_KEY).await.is_err());

        let _ = tokio::fs::remove_file(&path).await;
    }
}
