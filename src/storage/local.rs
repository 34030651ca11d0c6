//! Local filesystem storage for the notified set.
//!
//! Used when no spreadsheet is configured. Writes go to a temp file that
//! is renamed over the target, so an interrupted run never leaves a
//! truncated file behind.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::ListingRecord;
use crate::storage::{NotifiedData, NotifiedStore};

/// JSON-file backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(&bytes).await
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.read_bytes().await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl NotifiedStore for LocalStore {
    async fn load(&self) -> Result<Vec<ListingRecord>> {
        match self.read_json::<NotifiedData>().await? {
            Some(data) => Ok(data.records),
            None => {
                log::warn!("No {} found, starting empty", self.path.display());
                Ok(Vec::new())
            }
        }
    }

    async fn replace_all(&self, records: &[ListingRecord]) -> Result<()> {
        let data = NotifiedData::new(records.to_vec());
        self.write_json(&data).await?;
        log::info!("{} records written to {}", data.count, self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str) -> ListingRecord {
        ListingRecord::new(name, format!("https://x/{name}.jpg"), format!("https://x/{name}"))
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().join("notified.json"));

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_all_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().join("state/notified.json"));

        store
            .replace_all(&[record("Film A"), record("Film B")])
            .await
            .unwrap();
        store.replace_all(&[record("Film C")]).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, vec![record("Film C")]);
        assert!(!tmp.path().join("state/notified.tmp").exists());
    }

    #[tokio::test]
    async fn test_envelope_on_disk() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().join("notified.json"));
        store.replace_all(&[record("Film A")]).await.unwrap();

        let data: NotifiedData = store.read_json().await.unwrap().unwrap();
        assert_eq!(data.count, 1);
        assert_eq!(data.records[0].name, "Film A");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notified.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let result = LocalStore::new(path).load().await;
        assert!(matches!(result, Err(AppError::Json(_))));
    }
}
