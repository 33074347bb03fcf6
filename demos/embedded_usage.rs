//! Minimal embedding example for preview-core
//!
//! This example demonstrates using preview-core as a library with in-process
//! collaborators. The session lifecycle is fully managed by the application.

use async_trait::async_trait;
use preview_core::traits::LatestPreviewService;
use preview_core::{
    BuildIdentity, MonitorConfig, PreviewMonitor, ProjectHandle, RemoteBuildSummary, Result,
    StaticGate, StaticIdentity,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_stream::StreamExt;

/// Identity this example pretends to run as
const RUNNING_BUILD: &str = "7C1D1B2A-0E4F-4A8B-9C3D-5E6F7A8B9C0D";

/// In-process stand-in for the server: the latest release of one project
struct EmbeddedCatalog {
    latest: Mutex<Option<RemoteBuildSummary>>,
}

impl EmbeddedCatalog {
    fn new() -> Self {
        Self {
            latest: Mutex::new(None),
        }
    }

    /// Simulate a CI upload becoming the latest preview
    fn publish(&self, id: &str, version: &str, binary_ids: &[&str]) {
        let summary = RemoteBuildSummary {
            id: id.to_string(),
            version: Some(version.to_string()),
            known_identities: binary_ids
                .iter()
                .filter_map(|b| BuildIdentity::new(*b))
                .collect(),
            location: Some(format!("https://example.com/myorg/myapp/previews/{id}")),
        };
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(summary);
        }
    }
}

#[async_trait]
impl LatestPreviewService for EmbeddedCatalog {
    async fn latest_preview(
        &self,
        identity: &BuildIdentity,
        _build_version: Option<&str>,
        project: &ProjectHandle,
    ) -> Result<Option<RemoteBuildSummary>> {
        println!("[Catalog] {} asks for the latest preview of {}", identity, project);
        Ok(self.latest.lock().map(|l| l.clone()).unwrap_or_default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Embedded preview-core Example ===\n");

    let catalog = Arc::new(EmbeddedCatalog::new());
    catalog.publish("p1", "1.0.0", &[RUNNING_BUILD]);

    let config = MonitorConfig::new("myorg/myapp", "unused-by-in-process-catalog")
        .with_check_interval(Duration::from_millis(100))
        .with_build_version("1.0.0");

    println!("1. Creating monitor...");
    let monitor = PreviewMonitor::new(
        &config,
        &StaticIdentity::new(Some(RUNNING_BUILD)),
        catalog.clone(),
        Arc::new(StaticGate(false)),
    )?;

    // Spawn event listener (optional)
    let (monitor, mut events) = monitor.with_event_channel(config.event_channel_capacity);
    let event_listener = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("[Event] {:?}", event);
        }
    });

    println!("2. One-off check: {:?}", monitor.check_once().await?);

    println!("3. Starting background session...");
    let (session, mut updates) = monitor.monitor_stream(4);

    tokio::time::sleep(Duration::from_millis(250)).await;
    println!("\n4. CI uploads a newer preview\n");
    catalog.publish("p2", "1.1.0", &["0A1B2C3D-4E5F-6071-8293-A4B5C6D7E8F9"]);

    if let Ok(Some(update)) = tokio::time::timeout(Duration::from_secs(1), updates.next()).await {
        println!(
            "[Update] version {} available at {}",
            update.version.as_deref().unwrap_or("?"),
            update.location
        );
    }

    println!("\n5. Cancelling session...");
    drop(updates);
    session.cancel();
    match session.wait().await {
        Ok(state) => println!("   Session ended: {:?}", state),
        Err(e) => println!("   Session task failed: {}", e),
    }

    drop(monitor);
    let _ = tokio::time::timeout(Duration::from_millis(100), event_listener).await;

    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Session lifecycle is fully controlled by the application");
    println!("- Every collaborator is injected (no HTTP, no platform probing)");
    println!("- A running build never sees its own release as an update");

    Ok(())
}
