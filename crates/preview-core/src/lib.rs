// # preview-core
//
// Core library for in-app preview update monitoring.
//
// ## Architecture Overview
//
// A running build asks a server which preview is the latest for its project
// and learns whether that preview already contains it:
// - **IdentityExtractor**: Reads the build identity of the running binary
// - **StoreBuildGate**: Disables monitoring for store-distributed builds
// - **LatestPreviewService**: Queries the latest preview of a project
// - **PreviewMonitor**: Decides "is this an update" and runs cancellable
//   background sessions on a fixed cadence
// - **IgnoredPreviewStore** / **DefaultUpdatePrompt**: Optional host-layer
//   prompt that does not ask twice for a dismissed preview
//
// ## Design Principles
//
// 1. **Separation of Concerns**: The decision logic never touches HTTP,
//    platform introspection or UI directly
// 2. **Library-First**: Everything the daemon does is available to embedders
// 3. **Cooperative Cancellation**: Sessions stop at well-defined points and
//    never abort an in-flight query

pub mod traits;
pub mod model;
pub mod identity;
pub mod gate;
pub mod monitor;
pub mod config;
pub mod error;
pub mod state;
pub mod prompt;

// Re-export core types for convenience
pub use traits::{IdentityExtractor, StoreBuildGate, LatestPreviewService, IgnoredPreviewStore};
pub use model::{BuildIdentity, ProjectHandle, RemoteBuildSummary, UpdateAvailable};
pub use identity::{current_identity, ChainedExtractor, LoadedImageExtractor, StaticIdentity};
pub use gate::{DistributionChannelGate, StaticGate};
pub use monitor::{MonitorEvent, MonitorSession, PreviewMonitor, SessionState};
pub use config::{MonitorConfig, ServerConfig, DEFAULT_SERVER_URL};
pub use error::{Error, Result};
pub use state::{FileIgnoredStore, MemoryIgnoredStore};
pub use prompt::{DefaultUpdatePrompt, PromptOutcome, PromptResponse, UpdatePresenter};
