// # File Ignored Store
//
// File-based implementation of IgnoredPreviewStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: new content goes to `<path>.tmp`, then is renamed over
//   the store file
// - Backup: the previous file is copied to `<path>.backup` before each write
// - Corruption: an unparsable file is replaced by its backup; if the backup
//   is unusable too, the store starts empty (the user is simply asked again)
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "ignored": {
//     "preview_id": "0f7c…",
//     "ignored_at": "2026-01-09T12:00:00Z"
//   }
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::Error;
use crate::traits::{IgnoredPreviewStore, IgnoredRecord};

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based ignored-preview store
///
/// Every change is written through to disk immediately.
///
/// # Example
///
/// ```rust,no_run
/// use preview_core::state::FileIgnoredStore;
/// use preview_core::traits::IgnoredPreviewStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileIgnoredStore::new("/var/lib/previewd/ignored.json").await?;
///     store.ignore("preview-42").await?;
///
///     // Survives a restart
///     let reopened = FileIgnoredStore::new("/var/lib/previewd/ignored.json").await?;
///     assert!(reopened.is_ignored("preview-42").await?);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileIgnoredStore {
    path: PathBuf,
    state: RwLock<StoreState>,
    // Serializes writers so temp-file renames never interleave
    write_lock: Mutex<()>,
}

#[derive(Debug, Default)]
struct StoreState {
    ignored: Option<IgnoredRecord>,
    dirty: bool,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    #[serde(default)]
    ignored: Option<IgnoredRecord>,
}

/// Why a store file could not be loaded
enum LoadError {
    /// The file exists but does not parse
    Corrupted(serde_json::Error),
    /// The file could not be read at all
    Io(Error),
}

impl FileIgnoredStore {
    /// Open or create a store at `path`
    ///
    /// Creates missing parent directories. A corrupted file is recovered from
    /// its backup, or replaced by an empty store.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !fs::try_exists(parent).await.unwrap_or(false) {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let ignored = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: RwLock::new(StoreState {
                ignored,
                dirty: false,
            }),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_with_recovery(path: &Path) -> Result<Option<IgnoredRecord>, Error> {
        let err = match Self::load(path).await {
            Ok(ignored) => {
                tracing::debug!(
                    "Loaded ignored-preview store {} (ignored: {:?})",
                    path.display(),
                    ignored.as_ref().map(|r| r.preview_id.as_str())
                );
                return Ok(ignored);
            }
            Err(LoadError::Io(e)) => return Err(e),
            Err(LoadError::Corrupted(e)) => e,
        };

        tracing::warn!(
            "Ignored-preview store {} is corrupted: {}. Attempting recovery from backup.",
            path.display(),
            err
        );

        let backup = Self::backup_path(path);
        let backup_exists = fs::try_exists(&backup).await.unwrap_or(false);
        match Self::load(&backup).await {
            Ok(ignored) if backup_exists => {
                if let Err(e) = fs::copy(&backup, path).await {
                    tracing::error!("Failed to restore store file from backup: {}", e);
                } else {
                    tracing::info!("Restored ignored-preview store from backup");
                }
                Ok(ignored)
            }
            Ok(_) => {
                tracing::warn!("No backup file found. Starting with an empty store.");
                Ok(None)
            }
            Err(LoadError::Corrupted(e)) => {
                tracing::error!("Backup also corrupted: {}. Starting with an empty store.", e);
                Ok(None)
            }
            Err(LoadError::Io(e)) => {
                tracing::error!("Backup unreadable: {}. Starting with an empty store.", e);
                Ok(None)
            }
        }
    }

    async fn load(path: &Path) -> Result<Option<IgnoredRecord>, LoadError> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Store file does not exist: {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(LoadError::Io(Error::store(format!(
                    "Failed to read store file {}: {}",
                    path.display(),
                    e
                ))));
            }
        };

        let file: StoreFileFormat =
            serde_json::from_str(&content).map_err(LoadError::Corrupted)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.ignored)
    }

    async fn write(&self) -> Result<(), Error> {
        let _writer = self.write_lock.lock().await;

        let json = {
            let state = self.state.read().await;
            serde_json::to_string_pretty(&StoreFileFormat {
                version: STORE_FILE_VERSION.to_string(),
                ignored: state.ignored.clone(),
            })?
        };

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.sync_all().await.map_err(|e| {
                Error::store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if fs::try_exists(&self.path).await.unwrap_or(false) {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        self.state.write().await.dirty = false;
        tracing::trace!("Ignored-preview store written: {}", self.path.display());
        Ok(())
    }

    async fn replace(&self, ignored: Option<IgnoredRecord>) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            state.ignored = ignored;
            state.dirty = true;
        }
        self.write().await
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        temp.into()
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf().into_os_string();
        backup.push(".backup");
        backup.into()
    }
}

#[async_trait]
impl IgnoredPreviewStore for FileIgnoredStore {
    async fn ignored(&self) -> Result<Option<IgnoredRecord>, Error> {
        Ok(self.state.read().await.ignored.clone())
    }

    async fn ignore(&self, preview_id: &str) -> Result<(), Error> {
        self.replace(Some(IgnoredRecord::new(preview_id))).await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.replace(None).await
    }

    async fn flush(&self) -> Result<(), Error> {
        if self.state.read().await.dirty {
            self.write().await
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("ignored.json");

        let store = FileIgnoredStore::new(&path).await.unwrap();
        assert!(store.ignored().await.unwrap().is_none());

        store.ignore("preview-1").await.unwrap();
        assert!(path.exists());

        let reopened = FileIgnoredStore::new(&path).await.unwrap();
        let record = reopened.ignored().await.unwrap().unwrap();
        assert_eq!(record.preview_id, "preview-1");

        reopened.clear().await.unwrap();
        let reopened = FileIgnoredStore::new(&path).await.unwrap();
        assert!(reopened.ignored().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ignored.json");

        let store = FileIgnoredStore::new(&path).await.unwrap();
        store.ignore("first").await.unwrap();
        store.ignore("second").await.unwrap();

        let backup = FileIgnoredStore::backup_path(&path);
        assert!(backup.exists(), "backup exists after the second write");

        fs::write(&path, b"{ not json").await.unwrap();

        let recovered = FileIgnoredStore::new(&path).await.unwrap();
        // The backup holds the state before the last write
        assert_eq!(
            recovered.ignored().await.unwrap().map(|r| r.preview_id),
            Some("first".to_string())
        );
    }

    #[tokio::test]
    async fn test_file_store_corrupted_without_backup_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ignored.json");
        fs::write(&path, b"garbage").await.unwrap();

        let store = FileIgnoredStore::new(&path).await.unwrap();
        assert!(store.ignored().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ignored.json");

        let store = FileIgnoredStore::new(&path).await.unwrap();
        for i in 0..5 {
            store.ignore(&format!("preview-{i}")).await.unwrap();
        }
        store.flush().await.unwrap();

        assert!(!store.temp_path().exists());
        let reopened = FileIgnoredStore::new(&path).await.unwrap();
        assert!(reopened.is_ignored("preview-4").await.unwrap());
    }
}
