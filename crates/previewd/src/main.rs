// # previewd - Preview Watch Daemon
//
// Thin host around preview-core: it watches for newer previews of the build
// it runs as (or of the build named by PREVIEW_BINARY_ID) and reports them.
//
// The previewd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Starting one monitoring session
// 4. Printing updates (JSON lines on stdout) or prompting for them
// 5. Cancelling the session on SIGTERM/SIGINT
//
// ## Configuration
//
// ### Project
// - `PREVIEW_FULL_HANDLE`: Project as `account-handle/project-handle` (required)
// - `PREVIEW_API_KEY`: Account token (required)
// - `PREVIEW_SERVER_URL`: Server base URL (default: https://tuist.dev)
//
// ### Monitoring
// - `PREVIEW_CHECK_INTERVAL_SECS`: Seconds between checks (default: 600)
// - `PREVIEW_REQUEST_TIMEOUT_SECS`: HTTP timeout in seconds (default: 30)
// - `PREVIEW_BUILD_VERSION`: Build version sent with each query
// - `PREVIEW_BINARY_ID`: Build identity to use instead of this binary's own
//
// ### Prompt
// - `PREVIEW_PROMPT`: `true` to ask on the terminal instead of printing
// - `PREVIEW_IGNORED_STORE_PATH`: File remembering the dismissed preview
//   (in memory when unset)
//
// ### Logging
// - `PREVIEW_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export PREVIEW_FULL_HANDLE=myorg/myapp
// export PREVIEW_API_KEY=your_api_key
// export PREVIEW_BINARY_ID=0F1E2D3C-4B5A-6978-8796-A5B4C3D2E1F0
// export PREVIEW_CHECK_INTERVAL_SECS=60
//
// previewd
// ```

mod presenter;

use anyhow::{Context, Result};
use preview_core::{
    ChainedExtractor, DefaultUpdatePrompt, FileIgnoredStore, LoadedImageExtractor,
    MemoryIgnoredStore, MonitorConfig, MonitorEvent, StaticIdentity, UpdateAvailable,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use presenter::TerminalPresenter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum PreviewdExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<PreviewdExitCode> for ExitCode {
    fn from(code: PreviewdExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Capacity of the update channel in print mode
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Application configuration
struct Config {
    full_handle: String,
    api_key: String,
    server_url: String,
    check_interval_secs: u64,
    request_timeout_secs: u64,
    build_version: Option<String>,
    binary_id: Option<String>,
    prompt: bool,
    ignored_store_path: Option<String>,
    log_level: String,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("full_handle", &self.full_handle)
            .field("api_key", &"<REDACTED>")
            .field("server_url", &self.server_url)
            .field("check_interval_secs", &self.check_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("build_version", &self.build_version)
            .field("binary_id", &self.binary_id)
            .field("prompt", &self.prompt)
            .field("ignored_store_path", &self.ignored_store_path)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Non-empty value of an environment variable
fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Numeric environment variable with a default
fn env_u64(key: &str, default: u64) -> Result<u64> {
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a whole number of seconds. Got: {raw}")),
        None => Ok(default),
    }
}

fn env_bool(key: &str) -> Result<bool> {
    match env_opt(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no") => Ok(false),
        Some(v) => anyhow::bail!("{key} must be true or false. Got: {v}"),
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            full_handle: env_opt("PREVIEW_FULL_HANDLE").context(
                "PREVIEW_FULL_HANDLE is required. \
                Set it via: export PREVIEW_FULL_HANDLE=account-handle/project-handle",
            )?,
            api_key: env_opt("PREVIEW_API_KEY").context(
                "PREVIEW_API_KEY is required. Set it via: export PREVIEW_API_KEY=your_api_key",
            )?,
            server_url: env_opt("PREVIEW_SERVER_URL")
                .unwrap_or_else(|| preview_core::DEFAULT_SERVER_URL.to_string()),
            check_interval_secs: env_u64("PREVIEW_CHECK_INTERVAL_SECS", 600)?,
            request_timeout_secs: env_u64("PREVIEW_REQUEST_TIMEOUT_SECS", 30)?,
            build_version: env_opt("PREVIEW_BUILD_VERSION"),
            binary_id: env_opt("PREVIEW_BINARY_ID"),
            prompt: env_bool("PREVIEW_PROMPT")?,
            ignored_store_path: env_opt("PREVIEW_IGNORED_STORE_PATH"),
            log_level: env_opt("PREVIEW_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    fn monitor_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig::new(&self.full_handle, &self.api_key)
            .with_server_url(&self.server_url)
            .with_check_interval(Duration::from_secs(self.check_interval_secs));
        config.server.request_timeout_secs = self.request_timeout_secs;
        config.build_version = self.build_version.clone();
        config
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        // Check for obvious placeholder keys (common mistake)
        let key_lower = self.api_key.to_lowercase();
        if key_lower.contains("your_api_key") || key_lower.contains("replace_me") {
            anyhow::bail!(
                "PREVIEW_API_KEY appears to be a placeholder. \
                Use an actual account token."
            );
        }

        if !(1..=86_400).contains(&self.check_interval_secs) {
            anyhow::bail!(
                "PREVIEW_CHECK_INTERVAL_SECS must be between 1 and 86400 seconds. Got: {}",
                self.check_interval_secs
            );
        }

        if !(1..=300).contains(&self.request_timeout_secs) {
            anyhow::bail!(
                "PREVIEW_REQUEST_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.request_timeout_secs
            );
        }

        if self.server_url.starts_with("http://") {
            eprintln!(
                "WARNING: PREVIEW_SERVER_URL uses HTTP (not HTTPS). \
                The API key is sent in clear text."
            );
        }

        if self.ignored_store_path.is_some() && !self.prompt {
            eprintln!("WARNING: PREVIEW_IGNORED_STORE_PATH has no effect without PREVIEW_PROMPT=true");
        }

        self.monitor_config()
            .validate()
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "PREVIEW_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return PreviewdExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return PreviewdExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries updates
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PreviewdExitCode::ConfigError.into();
    }

    info!("Starting previewd daemon");
    debug!("Configuration: {:?}", config);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PreviewdExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            PreviewdExitCode::RuntimeError
        } else {
            PreviewdExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal or a gated session
async fn run_daemon(config: Config) -> Result<()> {
    let monitor_config = config.monitor_config();

    let extractor = ChainedExtractor::new()
        .then(StaticIdentity::new(config.binary_id.as_deref()))
        .then(LoadedImageExtractor);
    let monitor = preview_http::build_monitor_with(&monitor_config, &extractor)?;

    match monitor.identity() {
        Some(identity) => info!("Watching {} as build {}", monitor.project(), identity),
        None => warn!(
            "No build identity found; set PREVIEW_BINARY_ID. Checks will fail until then."
        ),
    }

    let (monitor, mut events) = monitor.with_event_channel(monitor_config.event_channel_capacity);

    let (session, mut updates) = if config.prompt {
        let session = match &config.ignored_store_path {
            Some(path) => {
                let store = FileIgnoredStore::new(path)
                    .await
                    .with_context(|| format!("Failed to open ignored-preview store {path}"))?;
                let prompt = DefaultUpdatePrompt::new(TerminalPresenter::new(), store);
                monitor.monitor_with_prompt(Arc::new(prompt))
            }
            None => {
                let prompt =
                    DefaultUpdatePrompt::new(TerminalPresenter::new(), MemoryIgnoredStore::new());
                monitor.monitor_with_prompt(Arc::new(prompt))
            }
        };
        (session, None)
    } else {
        let (session, updates) = monitor.monitor_channel(UPDATE_CHANNEL_CAPACITY);
        (session, Some(updates))
    };

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                info!("Received shutdown signal: {}", signal?);
                break;
            }
            Some(update) = next_update(&mut updates) => print_update(&update)?,
            event = events.recv() => match event {
                Some(MonitorEvent::Gated) => {
                    info!("Store build detected, nothing to watch");
                    break;
                }
                Some(event) => debug!("Monitor event: {:?}", event),
                None => break,
            },
        }
    }

    info!("Shutting down daemon");
    session.cancel();

    // An in-flight query may take up to the request timeout
    let drain_timeout = Duration::from_secs(config.request_timeout_secs + 5);
    match tokio::time::timeout(drain_timeout, session.wait()).await {
        Ok(Ok(state)) => info!("Monitoring session ended: {:?}", state),
        Ok(Err(e)) => anyhow::bail!("Monitoring session failed: {}", e),
        Err(_) => anyhow::bail!("Shutdown timeout after {:?}", drain_timeout),
    }

    Ok(())
}

async fn next_update(updates: &mut Option<mpsc::Receiver<UpdateAvailable>>) -> Option<UpdateAvailable> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// One JSON object per line on stdout
fn print_update(update: &UpdateAvailable) -> Result<()> {
    let line = serde_json::to_string(update).context("Failed to serialize update")?;
    println!("{line}");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
