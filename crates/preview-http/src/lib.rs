// # HTTP Latest Preview Service
//
// This crate provides the HTTP implementation of `LatestPreviewService` and
// the default wiring of a `PreviewMonitor` around it.
//
// ## Behavior
//
// - ✅ One GET request per call, to the configured server only
// - ✅ `Authorization: Bearer <api key>` on every request, installed once as
//   a sensitive default header of the client
// - ✅ HTTP timeout from configuration (default 30 seconds)
// - ✅ Documented statuses mapped to typed errors (401, 403)
// - ❌ NO retry logic (the monitor checks again on its next iteration)
// - ❌ NO caching between calls
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - API key NEVER appears in logs or `Debug` output
// - Empty API key is rejected at construction
//
// ## API Reference
//
// - Latest preview: GET `/api/projects/:account/:project/previews/latest?binary_id=...&build_version=...`
// - 200: `{"preview": {"id", "version", "device_url", "builds": [{"binary_id"}]}}`
//   with `preview` null when nothing was uploaded yet
// - 401 / 403: `{"message": "..."}`

use async_trait::async_trait;
use preview_core::traits::LatestPreviewService;
use preview_core::{
    BuildIdentity, DistributionChannelGate, Error, IdentityExtractor, LoadedImageExtractor,
    MonitorConfig, PreviewMonitor, ProjectHandle, RemoteBuildSummary, Result, ServerConfig,
};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

const USER_AGENT: &str = concat!("preview-http/", env!("CARGO_PKG_VERSION"));

/// Latest-preview service speaking the server's REST API
///
/// Stateless apart from the client, base URL and credential fixed at
/// construction; safe to share between sessions.
#[derive(Clone)]
pub struct HttpLatestPreviewService {
    base_url: Url,
    client: reqwest::Client,
}

// Custom Debug implementation; the client's default headers hold the API key
impl std::fmt::Debug for HttpLatestPreviewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLatestPreviewService")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LatestPreviewResponse {
    #[serde(default)]
    preview: Option<PreviewPayload>,
}

#[derive(Debug, Deserialize)]
struct PreviewPayload {
    id: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    device_url: Option<String>,
    #[serde(default)]
    builds: Vec<BuildPayload>,
}

#[derive(Debug, Deserialize)]
struct BuildPayload {
    #[serde(default)]
    binary_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

impl From<PreviewPayload> for RemoteBuildSummary {
    fn from(preview: PreviewPayload) -> Self {
        Self {
            id: preview.id,
            version: preview.version,
            known_identities: preview
                .builds
                .into_iter()
                .filter_map(|build| build.binary_id.and_then(BuildIdentity::new))
                .collect(),
            location: preview.device_url,
        }
    }
}

impl HttpLatestPreviewService {
    /// Create a service for `base_url` authenticating with `api_key`
    ///
    /// # Security
    ///
    /// The API key is marked sensitive on the client and never logged.
    pub fn new(
        base_url: Url,
        api_key: &str,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::config("API key cannot be empty"));
        }
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "Server URL cannot be used as a base: {}",
                base_url
            )));
        }

        let mut authorization = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::config("API key contains characters not allowed in a header"))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    /// Create a service from validated server settings
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        Self::new(config.base_url()?, &config.api_key, config.request_timeout())
    }

    /// `{base}/api/projects/{account}/{project}/previews/latest?...`
    fn latest_url(
        &self,
        identity: &BuildIdentity,
        build_version: Option<&str>,
        project: &ProjectHandle,
    ) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("Server URL cannot be used as a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend([
                "api",
                "projects",
                project.account(),
                project.project(),
                "previews",
                "latest",
            ]);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("binary_id", identity.as_str());
            if let Some(version) = build_version {
                query.append_pair("build_version", version);
            }
        }

        Ok(url)
    }

    /// Message of a documented error response, or the status reason phrase
    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        let fallback = || {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        };
        match response.json::<ErrorPayload>().await {
            Ok(payload) => payload.message,
            Err(e) => {
                tracing::debug!("Unreadable {} error body: {}", status, e);
                fallback()
            }
        }
    }
}

#[async_trait]
impl LatestPreviewService for HttpLatestPreviewService {
    async fn latest_preview(
        &self,
        identity: &BuildIdentity,
        build_version: Option<&str>,
        project: &ProjectHandle,
    ) -> Result<Option<RemoteBuildSummary>> {
        project.ensure_well_formed()?;

        let url = self.latest_url(identity, build_version, project)?;
        tracing::debug!("Fetching latest preview of {} for build {}", project, identity);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Error::transport)?;

        match response.status() {
            StatusCode::OK => {
                let body: LatestPreviewResponse =
                    response.json().await.map_err(Error::transport)?;
                Ok(body.preview.map(RemoteBuildSummary::from))
            }
            StatusCode::UNAUTHORIZED => Err(Error::unauthorized(Self::error_message(response).await)),
            StatusCode::FORBIDDEN => Err(Error::forbidden(Self::error_message(response).await)),
            status => {
                tracing::debug!("Undocumented status {} from latest preview endpoint", status);
                Err(Error::UnknownServerError(status.as_u16()))
            }
        }
    }
}

/// Build a monitor with the default collaborators
///
/// - identity: [`LoadedImageExtractor`]
/// - service: [`HttpLatestPreviewService`] from `config.server`
/// - gate: [`DistributionChannelGate`]
pub fn build_monitor(config: &MonitorConfig) -> Result<PreviewMonitor> {
    build_monitor_with(config, &LoadedImageExtractor)
}

/// Same as [`build_monitor`] with a custom identity strategy
pub fn build_monitor_with(
    config: &MonitorConfig,
    extractor: &dyn IdentityExtractor,
) -> Result<PreviewMonitor> {
    config.validate()?;
    let service = HttpLatestPreviewService::from_config(&config.server)?;
    PreviewMonitor::new(
        config,
        extractor,
        Arc::new(service),
        Arc::new(DistributionChannelGate::new()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn service(base: &str) -> HttpLatestPreviewService {
        HttpLatestPreviewService::new(Url::parse(base).unwrap(), "key", Duration::from_secs(5))
            .unwrap()
    }

    fn identity() -> BuildIdentity {
        BuildIdentity::new("0F1E2D3C").unwrap()
    }

    #[test]
    fn test_latest_url() {
        let project = ProjectHandle::parse("my org/app").unwrap();
        let url = service("https://tuist.dev")
            .latest_url(&identity(), Some("1.0 beta"), &project)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://tuist.dev/api/projects/my%20org/app/previews/latest?binary_id=0F1E2D3C&build_version=1.0+beta"
        );
    }

    #[test]
    fn test_latest_url_keeps_base_path() {
        let project = ProjectHandle::parse("org/app").unwrap();
        let url = service("https://example.com/tuist/")
            .latest_url(&identity(), None, &project)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/tuist/api/projects/org/app/previews/latest?binary_id=0F1E2D3C"
        );
    }

    #[test]
    fn test_payload_conversion() {
        let body: LatestPreviewResponse = serde_json::from_value(serde_json::json!({
            "preview": {
                "id": "p1",
                "version": "1.2.0",
                "device_url": "https://x/preview",
                "builds": [{"binary_id": "A"}, {"binary_id": ""}, {"type": "app_bundle"}],
                "bundle_identifier": "dev.tuist.app"
            }
        }))
        .unwrap();

        let summary = RemoteBuildSummary::from(body.preview.unwrap());
        assert_eq!(summary.id, "p1");
        assert_eq!(summary.version.as_deref(), Some("1.2.0"));
        assert_eq!(summary.known_identities, vec![BuildIdentity::new("A").unwrap()]);
        assert_eq!(summary.location.as_deref(), Some("https://x/preview"));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result =
            HttpLatestPreviewService::new(Url::parse("https://tuist.dev").unwrap(), "", Duration::from_secs(5));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_api_key_not_exposed_in_debug() {
        let service = HttpLatestPreviewService::new(
            Url::parse("https://tuist.dev").unwrap(),
            "secret_key_12345",
            Duration::from_secs(5),
        )
        .unwrap();
        let debug_str = format!("{:?}", service);
        assert!(!debug_str.contains("secret_key_12345"));
        assert!(debug_str.contains("<REDACTED>"));
    }
}
