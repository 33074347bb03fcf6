// # Store Build Gate Trait
//
// Decides whether the running instance was distributed through a channel that
// manages updates itself (an app store, a sandboxed package manager). In such
// an environment self-directed update checks are meaningless, so the monitor
// disables itself entirely.
//
// ## Implementations
//
// - `crate::gate::DistributionChannelGate`: Snap, Flatpak, Mac App Store, simulators
// - `crate::gate::StaticGate`: host-supplied answer

use async_trait::async_trait;

/// Trait for store-build detection
///
/// # Default-Open
///
/// Absence of proof of store distribution is not proof of non-store
/// distribution. Implementations MUST return `false` whenever the answer
/// cannot be established with confidence, including on I/O failure.
///
/// # Call Frequency
///
/// Awaited once per monitoring session activation, never per poll. It may do
/// local I/O, but must not block the executor thread.
#[async_trait]
pub trait StoreBuildGate: Send + Sync {
    /// Returns `true` when update checks should be disabled
    async fn is_gated(&self) -> bool;
}
