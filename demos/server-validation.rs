// # Latest Preview Endpoint Validation Tool
//
// Runs the HTTP service and the update decision once against a real server,
// so a project's configuration can be checked before shipping a build with
// monitoring enabled.
//
// ## Usage
//
// ```bash
// PREVIEW_FULL_HANDLE=myorg/myapp \
// PREVIEW_API_KEY=your_api_key \
// PREVIEW_BINARY_ID=0F1E2D3C-4B5A-6978-8796-A5B4C3D2E1F0 \
// cargo run -p demos --bin server_validation
// ```
//
// ## Environment Variables
//
// Required:
// - `PREVIEW_FULL_HANDLE`: Project as `account-handle/project-handle`
// - `PREVIEW_API_KEY`: Account token
//
// Optional:
// - `PREVIEW_SERVER_URL`: Server base URL (default: https://tuist.dev)
// - `PREVIEW_BINARY_ID`: Identity to check as (default: this binary's own)
// - `PREVIEW_BUILD_VERSION`: Build version sent with the query

use preview_core::traits::LatestPreviewService;
use preview_core::{
    ChainedExtractor, IdentityExtractor, LoadedImageExtractor, MonitorConfig, StaticIdentity,
};
use preview_http::{HttpLatestPreviewService, build_monitor_with};
use std::env;

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        tracing::error!("{} environment variable is required", key);
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("=== Latest Preview Endpoint Validation ===");

    let mut config = MonitorConfig::new(required("PREVIEW_FULL_HANDLE"), required("PREVIEW_API_KEY"));
    if let Ok(url) = env::var("PREVIEW_SERVER_URL") {
        config = config.with_server_url(url);
    }
    if let Ok(version) = env::var("PREVIEW_BUILD_VERSION") {
        config = config.with_build_version(version);
    }

    tracing::info!("Configuration:");
    tracing::info!("  Project: {}", config.full_handle);
    tracing::info!("  Server: {}", config.server.url);
    tracing::info!("  Build version: {:?}", config.build_version);

    tracing::info!("\n--- Step 1: Validating Configuration ---");
    if let Err(e) = config.validate() {
        tracing::error!("✗ Invalid configuration: {}", e);
        std::process::exit(1);
    }
    tracing::info!("✓ Configuration valid (API key not shown)");

    tracing::info!("\n--- Step 2: Resolving Build Identity ---");
    let extractor = ChainedExtractor::new()
        .then(StaticIdentity::new(env::var("PREVIEW_BINARY_ID").ok().as_deref()))
        .then(LoadedImageExtractor);
    let Some(identity) = extractor.extract() else {
        tracing::error!("✗ No build identity. Set PREVIEW_BINARY_ID.");
        std::process::exit(1);
    };
    tracing::info!("✓ Build identity: {}", identity);

    tracing::info!("\n--- Step 3: Querying Latest Preview ---");
    let service = HttpLatestPreviewService::from_config(&config.server)?;
    match service
        .latest_preview(&identity, config.build_version.as_deref(), &config.project()?)
        .await
    {
        Ok(Some(summary)) => {
            tracing::info!("✓ Latest preview: {}", summary.id);
            tracing::info!("  Version: {}", summary.version.as_deref().unwrap_or("(none)"));
            tracing::info!("  Known builds: {}", summary.known_identities.len());
            tracing::info!("  Location: {}", summary.location.as_deref().unwrap_or("(none)"));
        }
        Ok(None) => tracing::info!("✓ No preview uploaded for this project yet"),
        Err(e) => {
            tracing::error!("✗ Query failed: {}", e);
            tracing::error!("Error details: {:?}", e);
            std::process::exit(1);
        }
    }

    tracing::info!("\n--- Step 4: Update Decision ---");
    let monitor = build_monitor_with(&config, &StaticIdentity::new(Some(identity.as_str())))?;
    match monitor.check_once().await {
        Ok(Some(update)) => {
            tracing::info!("✓ Update available: {}", update.id);
            tracing::info!("  Install from: {}", update.location);
        }
        Ok(None) => tracing::info!("✓ This build is up to date"),
        Err(e) => {
            tracing::error!("✗ Check failed: {}", e);
            std::process::exit(1);
        }
    }

    tracing::info!("\n=== Validation Complete ===");
    Ok(())
}
