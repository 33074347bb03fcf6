// # Default Update Prompt
//
// Ready-made host callback: asks the user whether to install an update and
// remembers a dismissed preview so the same one is not offered twice.
//
// ## Flow
//
// 1. Update already on screen → skipped, nothing presented
// 2. Update whose id is the ignored id → skipped, nothing presented
// 3. Otherwise present "Update Available" with the version-aware message
// 4. Dismiss → id stored as ignored
// 5. Install → location opened by the presenter
//
// Steps 2-4 run for one update at a time, so an update that waited behind
// an open prompt sees that prompt's dismissal.
//
// ## Usage
//
// ```rust,ignore
// let prompt = Arc::new(DefaultUpdatePrompt::new(MyPresenter, MemoryIgnoredStore::new()));
// let session = monitor.monitor_with_prompt(prompt);
// ```

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use url::Url;

use crate::model::UpdateAvailable;
use crate::traits::IgnoredPreviewStore;

/// Title shown for every update prompt
pub const UPDATE_TITLE: &str = "Update Available";

/// The user's answer to an update prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResponse {
    /// Install the update now
    Install,
    /// Not now; do not ask again for this preview
    Dismiss,
}

/// What [`DefaultUpdatePrompt::handle`] did with an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// The update was dismissed earlier; nothing was presented
    Skipped,
    /// A prompt for the same preview is already open; nothing was presented
    AlreadyPending,
    /// The user dismissed the update and its id was stored
    Dismissed,
    /// The user accepted and the location was opened
    Installed,
}

/// User-facing side of the prompt
///
/// Implemented by the host UI layer (dialog, terminal, notification).
#[async_trait]
pub trait UpdatePresenter: Send + Sync {
    /// Ask the user and wait for the answer
    async fn present(&self, title: &str, message: &str) -> PromptResponse;

    /// Open the install location of an accepted update
    async fn open(&self, location: &Url) -> Result<(), crate::Error>;
}

/// Body text of the prompt for an update with the given version
pub fn update_message(version: Option<&str>) -> String {
    match version {
        Some(version) => {
            format!("A new version ({version}) is available. Would you like to install it?")
        }
        None => "A new version is available. Would you like to install it?".to_string(),
    }
}

/// Prompt adapter combining a presenter with an ignored-preview store
#[derive(Debug)]
pub struct DefaultUpdatePrompt<P, S> {
    presenter: P,
    store: S,
    /// Ids with a prompt open or waiting for its turn
    pending: StdMutex<HashSet<String>>,
    /// Held from the ignored check until the answer is recorded
    turn: Mutex<()>,
}

/// Claim on a preview id, released when the prompt flow ends
struct PendingClaim<'a> {
    pending: &'a StdMutex<HashSet<String>>,
    id: String,
}

impl<'a> PendingClaim<'a> {
    fn acquire(pending: &'a StdMutex<HashSet<String>>, id: &str) -> Option<Self> {
        let mut ids = pending.lock().unwrap_or_else(|e| e.into_inner());
        ids.insert(id.to_string()).then(|| Self {
            pending,
            id: id.to_string(),
        })
    }
}

impl Drop for PendingClaim<'_> {
    fn drop(&mut self) {
        let mut ids = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        ids.remove(&self.id);
    }
}

impl<P, S> DefaultUpdatePrompt<P, S>
where
    P: UpdatePresenter,
    S: IgnoredPreviewStore,
{
    pub fn new(presenter: P, store: S) -> Self {
        Self {
            presenter,
            store,
            pending: StdMutex::new(HashSet::new()),
            turn: Mutex::new(()),
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Present `update` unless it was dismissed before or is already open
    pub async fn handle(&self, update: &UpdateAvailable) -> Result<PromptOutcome, crate::Error> {
        let Some(_claim) = PendingClaim::acquire(&self.pending, &update.id) else {
            tracing::debug!("Prompt for preview {} already open", update.id);
            return Ok(PromptOutcome::AlreadyPending);
        };
        let _turn = self.turn.lock().await;

        if self.store.is_ignored(&update.id).await? {
            tracing::debug!("Preview {} was dismissed before, not prompting", update.id);
            return Ok(PromptOutcome::Skipped);
        }

        let message = update_message(update.version.as_deref());
        match self.presenter.present(UPDATE_TITLE, &message).await {
            PromptResponse::Dismiss => {
                tracing::info!("Preview {} dismissed", update.id);
                self.store.ignore(&update.id).await?;
                self.store.flush().await?;
                Ok(PromptOutcome::Dismissed)
            }
            PromptResponse::Install => {
                tracing::info!("Installing preview {} from {}", update.id, update.location);
                self.presenter.open(&update.location).await?;
                Ok(PromptOutcome::Installed)
            }
        }
    }
}
