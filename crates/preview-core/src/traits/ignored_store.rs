// # Ignored Preview Store Trait
//
// Defines the interface for remembering which preview the user chose not to
// install, so the default prompt does not ask again for the same preview.
//
// This is host-layer state. The monitor itself never reads it; only
// `crate::prompt::DefaultUpdatePrompt` does.
//
// ## Implementations
//
// - In-memory: `crate::state::MemoryIgnoredStore`
// - JSON file: `crate::state::FileIgnoredStore`

use async_trait::async_trait;

/// The preview the user dismissed
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IgnoredRecord {
    /// Dismissed preview id
    pub preview_id: String,
    /// When the user dismissed it
    pub ignored_at: chrono::DateTime<chrono::Utc>,
}

impl IgnoredRecord {
    /// Create a record stamped with the current time
    pub(crate) fn new(preview_id: impl Into<String>) -> Self {
        Self {
            preview_id: preview_id.into(),
            ignored_at: chrono::Utc::now(),
        }
    }
}

/// Trait for ignored-preview persistence
///
/// Holds at most one preview id: dismissing a newer preview replaces the
/// previous one.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait IgnoredPreviewStore: Send + Sync {
    /// Get the dismissed preview, if any
    async fn ignored(&self) -> Result<Option<IgnoredRecord>, crate::Error>;

    /// Remember `preview_id` as dismissed, replacing any previous one
    async fn ignore(&self, preview_id: &str) -> Result<(), crate::Error>;

    /// Forget the dismissed preview
    async fn clear(&self) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;

    /// Whether `preview_id` is the dismissed preview
    async fn is_ignored(&self, preview_id: &str) -> Result<bool, crate::Error> {
        Ok(self
            .ignored()
            .await?
            .is_some_and(|record| record.preview_id == preview_id))
    }
}
