//! HTTP client for the shorts processing API.

use std::path::Path;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::{
    Body, Client, Response, Url,
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::{
    backend::ShortsBackend,
    config::ClientConfig,
    error::{AutoShortsError, Result},
    media::mime_for_path,
    progress::UploadProgress,
    request::ProcessConfig,
    types::{
        ProcessResponse, RegenerateRequest, RegenerateResponse, RocketRequest, RocketResponse,
        SharePlatform, ShareRequest, ShareResponse, UploadResponse,
    },
};

const UPLOAD_ENDPOINT: &str = "/api/upload";
const PROCESS_ENDPOINT: &str = "/api/process";
const REGENERATE_ENDPOINT: &str = "/api/process/regenerate";
const ROCKET_ENDPOINT: &str = "/api/rocket/generate";

/// Stand-in host for resolving urls that arrive without one.
const RELATIVE_BASE: &str = "http://relative.invalid/";

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    config: ClientConfig,
    /// `config.base_url` with a trailing slash so joins keep any path prefix.
    base: Url,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        let base = parse_url(&format!("{}/", config.base_url))?;

        Ok(Self { http, config, base })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Raw client, for downloads of produced media.
    pub fn http(&self) -> &Client {
        &self.http
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        join_url(&self.base, path.trim_start_matches('/'))
    }

    /// Clip urls may come back relative to the API host, or scheme-relative.
    pub fn absolute_url(&self, url: &str) -> Result<Url> {
        join_url(&self.base, url)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(endpoint)?;
        debug!("POST {}", url);

        let response = self.http.post(url).json(body).send().await?;
        let response = ensure_success(endpoint, response).await?;

        Ok(response.json::<T>().await?)
    }
}

/// Turn a non-2xx response into [`AutoShortsError::Status`], keeping the
/// server's `detail` message when it sends one.
pub(crate) async fn ensure_success(
    endpoint: &'static str,
    response: Response,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(&body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("Unknown error").to_string()
        } else {
            body.trim().to_string()
        }
    });

    warn!("{} returned {}: {}", endpoint, status, detail);
    Err(AutoShortsError::Status {
        endpoint,
        status,
        detail,
    })
}

fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "error", "message"]
        .iter()
        .find_map(|key| value.get(*key))
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

#[async_trait]
impl ShortsBackend for ApiClient {
    async fn upload(&self, path: &Path, progress: &UploadProgress) -> Result<UploadResponse> {
        let file = fs::File::open(path).await?;
        let total = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        let mime = mime_for_path(path).unwrap_or("application/octet-stream");

        info!("Uploading {} ({} bytes)", path.display(), total);

        let tracker = progress.clone();
        let mut sent = 0u64;
        let stream = ReaderStream::new(file).inspect_ok(move |chunk| {
            sent += chunk.len() as u64;
            tracker.record_bytes(sent, total);
        });

        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(file_name)
            .mime_str(mime)?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.build_url(UPLOAD_ENDPOINT)?)
            .multipart(form)
            .send()
            .await?;

        let response = ensure_success(UPLOAD_ENDPOINT, response)
            .await
            .map_err(|e| AutoShortsError::UploadFailed {
                path: path.to_path_buf(),
                reason: e.user_message(),
            })?;

        let uploaded = response.json::<UploadResponse>().await?;
        progress.complete();
        info!("Upload stored as {}", uploaded.file_id);

        Ok(uploaded)
    }

    async fn process(&self, config: &ProcessConfig) -> Result<ProcessResponse> {
        self.post_json(PROCESS_ENDPOINT, config).await
    }

    async fn regenerate(&self, request: &RegenerateRequest) -> Result<RegenerateResponse> {
        self.post_json(REGENERATE_ENDPOINT, request).await
    }

    async fn generate_rocket(&self, request: &RocketRequest) -> Result<RocketResponse> {
        self.post_json(ROCKET_ENDPOINT, request).await
    }

    async fn share(
        &self,
        platform: SharePlatform,
        request: ShareRequest,
    ) -> Result<ShareResponse> {
        self.post_json(platform.endpoint(), &request).await
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| AutoShortsError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Last path segment of an absolute or host-relative url, without query or fragment.
pub(crate) fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse(RELATIVE_BASE)?.join(url))
        .ok()?;

    parsed
        .path_segments()?
        .next_back()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn join_url(base: &Url, url: &str) -> Result<Url> {
    base.join(url).map_err(|e| AutoShortsError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(ClientConfig::default().with_base_url(base)).unwrap()
    }

    #[test]
    fn test_absolute_url() {
        let c = client("http://api.local:8000/");
        assert_eq!(
            c.absolute_url("/static/a_short_1.mp4").unwrap().as_str(),
            "http://api.local:8000/static/a_short_1.mp4"
        );
        assert_eq!(
            c.absolute_url("static/a.mp4").unwrap().as_str(),
            "http://api.local:8000/static/a.mp4"
        );
        assert_eq!(
            c.absolute_url("https://cdn/x.mp4").unwrap().as_str(),
            "https://cdn/x.mp4"
        );
    }

    #[test]
    fn test_scheme_relative_clip_url_keeps_its_host() {
        let c = client("http://api.local:8000");
        assert_eq!(
            c.absolute_url("//cdn.example.com/static/a_short_1.mp4")
                .unwrap()
                .as_str(),
            "http://cdn.example.com/static/a_short_1.mp4"
        );
    }

    #[test]
    fn test_endpoints_keep_base_path_prefix() {
        let c = client("https://example.com/shorts/");
        assert_eq!(
            c.build_url(PROCESS_ENDPOINT).unwrap().as_str(),
            "https://example.com/shorts/api/process"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let err = ApiClient::new(ClientConfig::default().with_base_url("not a url")).unwrap_err();
        assert!(matches!(err, AutoShortsError::InvalidUrl { .. }));
    }

    #[test]
    fn test_last_path_segment() {
        assert_eq!(
            last_path_segment("http://host/static/abc_short_1.mp4?t=1#x").as_deref(),
            Some("abc_short_1.mp4")
        );
        assert_eq!(
            last_path_segment("/static/abc_short_2.mp4").as_deref(),
            Some("abc_short_2.mp4")
        );
        assert_eq!(last_path_segment("http://host/"), None);
        assert_eq!(last_path_segment("http://host"), None);
    }

    #[test]
    fn test_error_detail_extraction() {
        assert_eq!(
            error_detail(r#"{"detail":"Login failed"}"#).as_deref(),
            Some("Login failed")
        );
        assert_eq!(
            error_detail(r#"{"error":"No credentials provided"}"#).as_deref(),
            Some("No credentials provided")
        );
        assert_eq!(error_detail("Internal Server Error"), None);
    }
}
