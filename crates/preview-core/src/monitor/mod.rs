//! Preview monitor
//!
//! The PreviewMonitor is responsible for:
//! - Deciding whether the latest remote preview is an update for the running
//!   build (`check_once`)
//! - Running cancellable background sessions that repeat that decision on a
//!   fixed cadence (`monitor` and its variants)
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐   awaited once per session
//! │  StoreBuildGate   │◄──────────────────────────┐
//! └───────────────────┘                           │
//!                                        ┌────────────────┐
//! ┌───────────────────┐   identity       │ PreviewMonitor │── UpdateAvailable ──► host
//! │ IdentityExtractor │─────────────────►│  (session loop)│
//! └───────────────────┘   (memoized)     └────────────────┘
//!                                                 │
//!                                                 ▼
//!                                     ┌───────────────────────┐
//!                                     │ LatestPreviewService  │
//!                                     └───────────────────────┘
//! ```
//!
//! ## Session Loop
//!
//! 1. Await the gate once; gated → stop without querying
//! 2. Cancelled? → stop
//! 3. `check_once()`; deliver an update, log and swallow errors
//! 4. Cancelled? → stop
//! 5. Sleep for the rest of the interval (woken early by `cancel()`), repeat

mod session;

pub use session::{MonitorSession, SessionState};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::model::{BuildIdentity, ProjectHandle, UpdateAvailable};
use crate::prompt::{DefaultUpdatePrompt, UpdatePresenter};
use crate::traits::{IdentityExtractor, IgnoredPreviewStore, LatestPreviewService, StoreBuildGate};
use session::SessionShared;

/// Events emitted by monitoring sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A session started and is about to consult the gate
    Started,

    /// The gate reported a store build; the session ended without querying
    Gated,

    /// A check completed
    CheckSucceeded {
        /// Whether it produced an update
        update: bool,
    },

    /// A check failed; the session keeps going
    CheckFailed { error: String },

    /// A session observed cancellation and ended
    Stopped,
}

/// Update-aware monitor for one project and one running build
///
/// Cheap to clone; clones share the service, gate and event channel.
///
/// # Example
///
/// ```rust,ignore
/// let monitor = PreviewMonitor::new(&config, &LoadedImageExtractor, service, gate)?;
/// let session = monitor.monitor(|update| {
///     println!("preview {} available at {}", update.id, update.location);
/// });
/// // ...
/// session.cancel();
/// ```
#[derive(Clone)]
pub struct PreviewMonitor {
    checker: Arc<Checker>,
    gate: Arc<dyn StoreBuildGate>,
    check_interval: Duration,
    event_tx: Option<mpsc::Sender<MonitorEvent>>,
}

impl std::fmt::Debug for PreviewMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewMonitor")
            .field("project", &self.checker.project)
            .field("identity", &self.checker.identity)
            .field("build_version", &self.checker.build_version)
            .field("check_interval", &self.check_interval)
            .finish_non_exhaustive()
    }
}

/// Read-only state for `check_once`, shared by every session
struct Checker {
    project: ProjectHandle,
    build_version: Option<String>,
    identity: Option<BuildIdentity>,
    service: Arc<dyn LatestPreviewService>,
}

impl PreviewMonitor {
    /// Create a monitor
    ///
    /// Extracts the build identity once; an absent identity is not an error
    /// here, every check reports it instead.
    ///
    /// # Errors
    ///
    /// - `MalformedProjectHandle` for a bad `full_handle`
    /// - `Config` for a zero check interval
    pub fn new(
        config: &MonitorConfig,
        extractor: &dyn IdentityExtractor,
        service: Arc<dyn LatestPreviewService>,
        gate: Arc<dyn StoreBuildGate>,
    ) -> Result<Self> {
        let project = config.project()?;
        let check_interval = config.check_interval();
        if check_interval.is_zero() {
            return Err(Error::config("Check interval must be > 0"));
        }

        let identity = extractor.extract();
        match &identity {
            Some(id) => debug!("Monitoring {} as build {}", project, id),
            None => warn!("No build identity for the running binary; checks will fail"),
        }

        Ok(Self {
            checker: Arc::new(Checker {
                project,
                build_version: config.build_version.clone(),
                identity,
                service,
            }),
            gate,
            check_interval,
            event_tx: None,
        })
    }

    /// Install an event channel shared by every session started afterwards
    ///
    /// Events are dropped with a warning when the channel is full.
    pub fn with_event_channel(mut self, capacity: usize) -> (Self, mpsc::Receiver<MonitorEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.event_tx = Some(tx);
        (self, rx)
    }

    /// Identity of the running build, if one was found
    pub fn identity(&self) -> Option<&BuildIdentity> {
        self.checker.identity.as_ref()
    }

    /// Project being monitored
    pub fn project(&self) -> &ProjectHandle {
        &self.checker.project
    }

    /// Delay between the start of two consecutive checks
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Query once and decide whether an update is available
    ///
    /// # Errors
    ///
    /// - `IdentityUnavailable` without calling the service
    /// - any service error, unchanged
    /// - `InvalidLocationReference` for an update without a usable location
    pub async fn check_once(&self) -> Result<Option<UpdateAvailable>> {
        self.checker.check().await
    }

    /// Start a background session calling `on_update` for every update
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn monitor<F>(&self, on_update: F) -> MonitorSession
    where
        F: Fn(UpdateAvailable) + Send + Sync + 'static,
    {
        self.spawn(UpdateSink::Callback(Box::new(on_update)))
    }

    /// Start a background session delivering updates on a channel
    ///
    /// A full channel delays the next check rather than losing an update,
    /// until the session is cancelled.
    pub fn monitor_channel(&self, capacity: usize) -> (MonitorSession, mpsc::Receiver<UpdateAvailable>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (self.spawn(UpdateSink::Channel(tx)), rx)
    }

    /// Same as [`PreviewMonitor::monitor_channel`], as a `Stream`
    pub fn monitor_stream(&self, capacity: usize) -> (MonitorSession, ReceiverStream<UpdateAvailable>) {
        let (session, rx) = self.monitor_channel(capacity);
        (session, ReceiverStream::new(rx))
    }

    /// Start a background session handing every update to `prompt`
    ///
    /// Each update is handled on its own task so a pending prompt never
    /// delays the next check.
    pub fn monitor_with_prompt<P, S>(&self, prompt: Arc<DefaultUpdatePrompt<P, S>>) -> MonitorSession
    where
        P: UpdatePresenter + 'static,
        S: IgnoredPreviewStore + 'static,
    {
        self.monitor(move |update| {
            let prompt = prompt.clone();
            tokio::spawn(async move {
                if let Err(e) = prompt.handle(&update).await {
                    warn!("Update prompt for preview {} failed: {}", update.id, e);
                }
            });
        })
    }

    fn spawn(&self, sink: UpdateSink) -> MonitorSession {
        let shared = Arc::new(SessionShared::default());
        let task = SessionTask {
            checker: self.checker.clone(),
            gate: self.gate.clone(),
            interval: self.check_interval,
            event_tx: self.event_tx.clone(),
            shared: shared.clone(),
            sink,
        };
        MonitorSession::new(shared, tokio::spawn(task.run()))
    }
}

impl Checker {
    async fn check(&self) -> Result<Option<UpdateAvailable>> {
        let identity = self.identity.as_ref().ok_or(Error::IdentityUnavailable)?;

        let Some(summary) = self
            .service
            .latest_preview(identity, self.build_version.as_deref(), &self.project)
            .await?
        else {
            debug!("No preview published for {}", self.project);
            return Ok(None);
        };

        if summary.includes(identity) {
            debug!("Running build belongs to latest preview {}", summary.id);
            return Ok(None);
        }

        let location = parse_location(summary.location.as_deref())?;
        Ok(Some(UpdateAvailable {
            id: summary.id,
            version: summary.version,
            location,
        }))
    }
}

/// Absolute URL of an update, or `InvalidLocationReference`
fn parse_location(raw: Option<&str>) -> Result<Url> {
    let raw = raw.unwrap_or_default();
    if raw.trim().is_empty() {
        return Err(Error::invalid_location(raw));
    }
    Url::parse(raw).map_err(|_| Error::invalid_location(raw))
}

enum UpdateSink {
    Callback(Box<dyn Fn(UpdateAvailable) + Send + Sync>),
    Channel(mpsc::Sender<UpdateAvailable>),
}

impl UpdateSink {
    /// Hand `update` to the host; a full channel waits unless cancelled
    async fn deliver(&self, update: UpdateAvailable, shared: &SessionShared) {
        match self {
            Self::Callback(on_update) => on_update(update),
            Self::Channel(tx) => {
                tokio::select! {
                    biased;
                    sent = tx.send(update) => {
                        if sent.is_err() {
                            debug!("Update receiver dropped, update discarded");
                        }
                    }
                    _ = shared.cancelled() => {
                        debug!("Session cancelled while the update channel was full");
                    }
                }
            }
        }
    }
}

struct SessionTask {
    checker: Arc<Checker>,
    gate: Arc<dyn StoreBuildGate>,
    interval: Duration,
    event_tx: Option<mpsc::Sender<MonitorEvent>>,
    shared: Arc<SessionShared>,
    sink: UpdateSink,
}

impl SessionTask {
    async fn run(self) {
        self.emit(MonitorEvent::Started);

        if self.gate.is_gated().await {
            info!("Store build detected, not monitoring {}", self.checker.project);
            self.shared.finish(SessionState::Gated);
            self.emit(MonitorEvent::Gated);
            return;
        }

        info!(
            "Monitoring {} for new previews every {:?}",
            self.checker.project, self.interval
        );

        loop {
            if self.shared.cancel_requested() {
                break;
            }

            let started = Instant::now();
            match self.checker.check().await {
                Ok(Some(update)) => {
                    info!("Preview {} is available", update.id);
                    self.emit(MonitorEvent::CheckSucceeded { update: true });
                    self.sink.deliver(update, &self.shared).await;
                }
                Ok(None) => {
                    self.emit(MonitorEvent::CheckSucceeded { update: false });
                }
                Err(e) => {
                    warn!("Preview check failed: {}", e);
                    self.emit(MonitorEvent::CheckFailed {
                        error: e.to_string(),
                    });
                }
            }

            if self.shared.cancel_requested() {
                break;
            }

            let remaining = self.interval.saturating_sub(started.elapsed());
            if !remaining.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(remaining) => {}
                    _ = self.shared.cancelled() => {}
                }
            }
        }

        self.shared.finish(SessionState::Cancelled);
        info!("Stopped monitoring {}", self.checker.project);
        self.emit(MonitorEvent::Stopped);
    }

    fn emit(&self, event: MonitorEvent) {
        let Some(tx) = &self.event_tx else {
            return;
        };
        if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
