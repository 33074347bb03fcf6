// # Memory Ignored Store
//
// In-memory implementation of IgnoredPreviewStore.
//
// ## Crash Behavior
//
// - The dismissed preview is forgotten on restart
// - The first update after a restart prompts again, even for a preview the
//   user already dismissed
//
// ## When to Use
//
// - Tests
// - Hosts that only run for a single session

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::{IgnoredPreviewStore, IgnoredRecord};

/// In-memory ignored-preview store
///
/// Clones share the same underlying slot.
///
/// # Example
///
/// ```rust,no_run
/// use preview_core::state::MemoryIgnoredStore;
/// use preview_core::traits::IgnoredPreviewStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryIgnoredStore::new();
///     store.ignore("preview-42").await?;
///     assert!(store.is_ignored("preview-42").await?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryIgnoredStore {
    inner: Arc<RwLock<Option<IgnoredRecord>>>,
}

impl MemoryIgnoredStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IgnoredPreviewStore for MemoryIgnoredStore {
    async fn ignored(&self) -> Result<Option<IgnoredRecord>, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn ignore(&self, preview_id: &str) -> Result<(), Error> {
        *self.inner.write().await = Some(IgnoredRecord::new(preview_id));
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        *self.inner.write().await = None;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_replaces_previous_id() {
        let store = MemoryIgnoredStore::new();
        assert!(store.ignored().await.unwrap().is_none());

        store.ignore("a").await.unwrap();
        store.ignore("b").await.unwrap();

        let record = store.ignored().await.unwrap().unwrap();
        assert_eq!(record.preview_id, "b");
        assert!(!store.is_ignored("a").await.unwrap());
        assert!(store.is_ignored("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_clear_and_shared_clones() {
        let store = MemoryIgnoredStore::new();
        let clone = store.clone();

        store.ignore("a").await.unwrap();
        assert!(clone.is_ignored("a").await.unwrap());

        clone.clear().await.unwrap();
        assert!(store.ignored().await.unwrap().is_none());
    }
}
