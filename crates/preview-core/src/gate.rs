// # Store Build Gates
//
// Implementations of `StoreBuildGate`.
//
// ## Detection
//
// `DistributionChannelGate` treats the instance as store-distributed when:
// - it runs inside a Snap (`SNAP`) or Flatpak (`FLATPAK_ID`) sandbox
// - a non-empty Mac App Store receipt sits in the app bundle
//   (`<bundle>/Contents/_MASReceipt/receipt`)
// - it was compiled for an Apple simulator, where device install links do
//   nothing
//
// Anything that cannot be read resolves to "not gated".

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::traits::StoreBuildGate;

/// Gate with a fixed answer
///
/// For hosts that already know their distribution channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticGate(pub bool);

#[async_trait]
impl StoreBuildGate for StaticGate {
    async fn is_gated(&self) -> bool {
        self.0
    }
}

/// Gate inspecting how the running instance was distributed
#[derive(Debug, Clone)]
pub struct DistributionChannelGate {
    executable: Option<PathBuf>,
    env: fn(&str) -> Option<String>,
}

impl Default for DistributionChannelGate {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionChannelGate {
    /// Gate for the current process
    pub fn new() -> Self {
        Self {
            executable: std::env::current_exe().ok(),
            env: |key| std::env::var(key).ok(),
        }
    }

    /// Gate for an explicit executable path and environment lookup
    pub fn with_sources(executable: Option<PathBuf>, env: fn(&str) -> Option<String>) -> Self {
        Self { executable, env }
    }

    fn sandboxed_package(&self) -> Option<&'static str> {
        let set = |key: &str| (self.env)(key).is_some_and(|v| !v.is_empty());
        if set("SNAP") {
            Some("snap")
        } else if set("FLATPAK_ID") {
            Some("flatpak")
        } else {
            None
        }
    }

    async fn has_store_receipt(&self) -> bool {
        let Some(receipt) = self.executable.as_deref().and_then(receipt_path) else {
            return false;
        };
        match tokio::fs::metadata(&receipt).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(e) => {
                tracing::trace!("No store receipt at {}: {}", receipt.display(), e);
                false
            }
        }
    }
}

/// `<bundle>/Contents/MacOS/<exe>` → `<bundle>/Contents/_MASReceipt/receipt`
fn receipt_path(executable: &Path) -> Option<PathBuf> {
    let macos_dir = executable.parent()?;
    if macos_dir.file_name()? != "MacOS" {
        return None;
    }
    let contents = macos_dir.parent()?;
    Some(contents.join("_MASReceipt").join("receipt"))
}

const fn compiled_for_simulator() -> bool {
    cfg!(all(target_vendor = "apple", target_abi = "sim"))
}

#[async_trait]
impl StoreBuildGate for DistributionChannelGate {
    async fn is_gated(&self) -> bool {
        if compiled_for_simulator() {
            tracing::info!("Simulator build, preview monitoring disabled");
            return true;
        }

        if let Some(channel) = self.sandboxed_package() {
            tracing::info!("Running from a {} package, preview monitoring disabled", channel);
            return true;
        }

        if self.has_store_receipt().await {
            tracing::info!("App Store receipt present, preview monitoring disabled");
            return true;
        }

        false
    }
}
