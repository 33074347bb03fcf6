// # Latest Preview Service Trait
//
// Defines the interface for asking the server which preview is the latest one
// for a project.
//
// ## Implementations
//
// - HTTP: `preview-http` crate
//
// ## Usage
//
// ```rust,ignore
// use preview_core::{LatestPreviewService, ProjectHandle};
//
// let project = ProjectHandle::parse("myorg/myapp")?;
// match service.latest_preview(&identity, Some("1.4.0"), &project).await? {
//     Some(summary) => println!("latest preview: {}", summary.id),
//     None => println!("no previews uploaded yet"),
// }
// ```

use async_trait::async_trait;

use crate::model::{BuildIdentity, ProjectHandle, RemoteBuildSummary};

/// Trait for latest-preview query implementations
///
/// # Thread Safety
///
/// Implementations are shared by every monitoring session of a monitor and
/// may be called concurrently. The only state they hold (client, credential,
/// base URL) is fixed at construction.
///
/// ## Allowed Capabilities
/// - ✅ One outbound request per call, to the configured server only
/// - ✅ Attach the configured credential to every request
/// - ✅ Parse the response into a [`RemoteBuildSummary`]
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (the monitor retries on its next iteration)
/// - ❌ Decide whether the summary is an update (owned by `PreviewMonitor`)
/// - ❌ Cache results between calls
///
/// # Error Mapping
///
/// | Outcome | Result |
/// |---|---|
/// | Malformed `project` | `Err(Error::MalformedProjectHandle)`, no request sent |
/// | Success, no preview | `Ok(None)` |
/// | Success, preview | `Ok(Some(summary))` |
/// | 401 | `Err(Error::Unauthorized(message))` |
/// | 403 | `Err(Error::Forbidden(message))` |
/// | Other status | `Err(Error::UnknownServerError(status))` |
/// | Network failure | `Err(Error::Transport(cause))` |
#[async_trait]
pub trait LatestPreviewService: Send + Sync {
    /// Fetch the latest preview of `project` as seen from the running build
    ///
    /// # Parameters
    ///
    /// - `identity`: Build identity of the running binary
    /// - `build_version`: Optional build version string of the running binary
    /// - `project`: Project to query
    async fn latest_preview(
        &self,
        identity: &BuildIdentity,
        build_version: Option<&str>,
        project: &ProjectHandle,
    ) -> Result<Option<RemoteBuildSummary>, crate::Error>;
}
