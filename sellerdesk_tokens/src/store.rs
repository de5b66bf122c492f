//! Durable credential storage
//!
//! The token core treats persistence as a plain asynchronous key-value
//! surface: get a stored value by key, set it, remove it. An absent key and
//! an empty value are equivalent; callers must treat both as "nothing
//! usable stored".

use std::{collections::HashMap, error};

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Boxed error type returned by credential store implementations
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// Well-known keys used by the token core
pub mod keys {
    /// The bearer token for the API backend
    pub const ACCESS_TOKEN: &str = "access_token";

    /// The seller's preferred language code
    pub const LANGUAGE: &str = "language";
}

/// An asynchronous key-value store for credentials and preferences
///
/// Implementations are expected to survive process restarts where possible;
/// the in-memory implementation exists for tests and ephemeral sessions.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Reads the stored value for `key`, or `None` if absent
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError>;

    /// Stores `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<(), BoxError>;

    /// Removes any value stored under `key`
    async fn remove(&self, key: &str) -> Result<(), BoxError>;
}

/// An in-memory credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    /// Constructs an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BoxError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// A credential store backed by a local JSON file
///
/// The file holds a single string-to-string map. Writes go through a
/// read-modify-write cycle guarded by a lock, so concurrent writers on the
/// same store instance cannot lose each other's entries.
#[cfg(feature = "file")]
#[derive(Debug)]
pub struct FileCredentialStore {
    path: std::path::PathBuf,
    io_lock: Mutex<()>,
}

#[cfg(feature = "file")]
impl FileCredentialStore {
    /// Constructs a store at the given file path
    ///
    /// The file is created on the first write.
    pub fn new(path: std::path::PathBuf) -> Self {
        Self {
            path,
            io_lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> Result<HashMap<String, String>, BoxError> {
        use tokio::io::AsyncReadExt;

        let mut file = match tokio::fs::OpenOptions::new()
            .read(true)
            .open(&self.path)
            .await
        {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HashMap::new());
            }
            Err(error) => return Err(error.into()),
        };

        let mut data = String::new();
        file.read_to_string(&mut data).await?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn write_map(&self, map: &HashMap<String, String>) -> Result<(), BoxError> {
        use tokio::io::AsyncWriteExt;

        let mut file_opts = tokio::fs::OpenOptions::new();
        file_opts.create(true).truncate(true).write(true);

        #[cfg(unix)]
        file_opts.mode(0o600);

        let mut file = file_opts.open(&self.path).await?;
        let data = serde_json::to_string_pretty(map)?;
        file.write_all(data.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(feature = "file")]
#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        let _guard = self.io_lock.lock().await;
        Ok(self.read_map().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        let _guard = self.io_lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_owned(), value.to_owned());
        self.write_map(&map).await
    }

    async fn remove(&self, key: &str) -> Result<(), BoxError> {
        let _guard = self.io_lock.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(key).is_some() {
            self.write_map(&map).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_values() {
        let store = MemoryCredentialStore::new();

        assert_eq!(store.get(keys::ACCESS_TOKEN).await.unwrap(), None);

        store.set(keys::ACCESS_TOKEN, "T1").await.unwrap();
        assert_eq!(
            store.get(keys::ACCESS_TOKEN).await.unwrap().as_deref(),
            Some("T1")
        );

        store.remove(keys::ACCESS_TOKEN).await.unwrap();
        assert_eq!(store.get(keys::ACCESS_TOKEN).await.unwrap(), None);
    }

    #[cfg(feature = "file")]
    mod file {
        use super::*;

        #[tokio::test]
        async fn missing_file_reads_as_absent() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileCredentialStore::new(dir.path().join("credentials.json"));

            assert_eq!(store.get(keys::ACCESS_TOKEN).await.unwrap(), None);
        }

        #[tokio::test]
        async fn values_survive_a_new_store_instance() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("credentials.json");

            let store = FileCredentialStore::new(path.clone());
            store.set(keys::ACCESS_TOKEN, "T1").await.unwrap();
            store.set(keys::LANGUAGE, "tr").await.unwrap();
            drop(store);

            let reopened = FileCredentialStore::new(path);
            assert_eq!(
                reopened.get(keys::ACCESS_TOKEN).await.unwrap().as_deref(),
                Some("T1")
            );
            assert_eq!(
                reopened.get(keys::LANGUAGE).await.unwrap().as_deref(),
                Some("tr")
            );
        }

        #[tokio::test]
        async fn remove_deletes_only_the_named_key() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileCredentialStore::new(dir.path().join("credentials.json"));

            store.set(keys::ACCESS_TOKEN, "T1").await.unwrap();
            store.set(keys::LANGUAGE, "en").await.unwrap();
            store.remove(keys::ACCESS_TOKEN).await.unwrap();

            assert_eq!(store.get(keys::ACCESS_TOKEN).await.unwrap(), None);
            assert_eq!(
                store.get(keys::LANGUAGE).await.unwrap().as_deref(),
                Some("en")
            );
        }
    }
}
