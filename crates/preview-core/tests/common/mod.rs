//! Test doubles and common utilities for monitor contract tests
//!
//! The doubles count every call so tests can assert on query activity
//! without a network.

#![allow(dead_code)]

use preview_core::error::{Error, Result};
use preview_core::traits::{LatestPreviewService, StoreBuildGate};
use preview_core::{
    BuildIdentity, MonitorConfig, PreviewMonitor, ProjectHandle, RemoteBuildSummary,
    StaticIdentity,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Responder = dyn Fn(usize) -> Result<Option<RemoteBuildSummary>> + Send + Sync;

/// One observed call to `latest_preview`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQuery {
    pub identity: String,
    pub build_version: Option<String>,
    pub project: String,
}

/// A scripted LatestPreviewService that tracks calls
pub struct MockPreviewService {
    /// Call counter for latest_preview()
    call_count: Arc<AtomicUsize>,
    /// Arguments of every call
    queries: Arc<std::sync::Mutex<Vec<RecordedQuery>>>,
    /// When every call started
    started_at: Arc<std::sync::Mutex<Vec<tokio::time::Instant>>>,
    /// Answer for the n-th call (0-based)
    responder: Arc<Responder>,
    /// Simulated round-trip time
    delay: Duration,
}

impl MockPreviewService {
    /// Service answering every call with `summary`
    pub fn returning(summary: Option<RemoteBuildSummary>) -> Self {
        Self::scripted(move |_| Ok(summary.clone()))
    }

    /// Service failing every call with the error built by `make_error`
    pub fn failing(make_error: fn() -> Error) -> Self {
        Self::scripted(move |_| Err(make_error()))
    }

    /// Service answering the n-th call (0-based) with `responder(n)`
    pub fn scripted(
        responder: impl Fn(usize) -> Result<Option<RemoteBuildSummary>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            call_count: Arc::new(AtomicUsize::new(0)),
            queries: Arc::new(std::sync::Mutex::new(Vec::new())),
            started_at: Arc::new(std::sync::Mutex::new(Vec::new())),
            responder: Arc::new(responder),
            delay: Duration::ZERO,
        }
    }

    /// Delay every answer by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get the number of times latest_preview() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the arguments of every call so far
    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.queries.lock().unwrap().clone()
    }

    /// Time between the starts of consecutive calls
    pub fn start_gaps(&self) -> Vec<Duration> {
        self.started_at
            .lock()
            .unwrap()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    /// Create a new MockPreviewService that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            call_count: Arc::clone(&other.call_count),
            queries: Arc::clone(&other.queries),
            started_at: Arc::clone(&other.started_at),
            responder: Arc::clone(&other.responder),
            delay: other.delay,
        }
    }
}

#[async_trait::async_trait]
impl LatestPreviewService for MockPreviewService {
    async fn latest_preview(
        &self,
        identity: &BuildIdentity,
        build_version: Option<&str>,
        project: &ProjectHandle,
    ) -> Result<Option<RemoteBuildSummary>> {
        self.started_at
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(RecordedQuery {
            identity: identity.to_string(),
            build_version: build_version.map(str::to_string),
            project: project.to_string(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        (self.responder)(n)
    }
}

/// A StoreBuildGate with a fixed answer that counts how often it is asked
pub struct CountingGate {
    gated: bool,
    call_count: Arc<AtomicUsize>,
}

impl CountingGate {
    pub fn new(gated: bool) -> Self {
        Self {
            gated,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            gated: other.gated,
            call_count: Arc::clone(&other.call_count),
        }
    }
}

#[async_trait::async_trait]
impl StoreBuildGate for CountingGate {
    async fn is_gated(&self) -> bool {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.gated
    }
}

/// Summary of a preview as the server would report it
pub fn summary(
    id: &str,
    version: Option<&str>,
    known: &[&str],
    location: Option<&str>,
) -> RemoteBuildSummary {
    RemoteBuildSummary {
        id: id.to_string(),
        version: version.map(str::to_string),
        known_identities: known
            .iter()
            .filter_map(|k| BuildIdentity::new(*k))
            .collect(),
        location: location.map(str::to_string),
    }
}

/// Create a minimal valid config for testing
pub fn minimal_config(check_interval_ms: u64) -> MonitorConfig {
    MonitorConfig::new("myorg/myapp", "test-key")
        .with_check_interval(Duration::from_millis(check_interval_ms))
}

/// Build a monitor for `identity` around a mock service and gate
///
/// Returns the observing halves of the doubles.
pub fn monitor_with(
    identity: Option<&str>,
    service: MockPreviewService,
    gated: bool,
    check_interval_ms: u64,
) -> (PreviewMonitor, MockPreviewService, CountingGate) {
    let observed_service = MockPreviewService::sharing_counters_with(&service);
    let gate = CountingGate::new(gated);
    let observed_gate = CountingGate::sharing_counters_with(&gate);

    let monitor = PreviewMonitor::new(
        &minimal_config(check_interval_ms),
        &StaticIdentity::new(identity),
        Arc::new(service),
        Arc::new(gate),
    )
    .expect("monitor construction succeeds");

    (monitor, observed_service, observed_gate)
}

/// Poll `condition` every 5 ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
