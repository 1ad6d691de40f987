use std::path::Path;

use async_trait::async_trait;

use crate::{
    error::Result,
    progress::UploadProgress,
    request::ProcessConfig,
    types::{
        ProcessResponse, RegenerateRequest, RegenerateResponse, RocketRequest, RocketResponse,
        SharePlatform, ShareRequest, ShareResponse, UploadResponse,
    },
};

/// The remote processing API as the client sees it.
///
/// [`ApiClient`](crate::client::ApiClient) talks HTTP; tests substitute
/// in-memory doubles.
#[async_trait]
pub trait ShortsBackend: Send + Sync {
    /// `POST /api/upload`, reporting progress while the body is sent.
    async fn upload(&self, path: &Path, progress: &UploadProgress) -> Result<UploadResponse>;

    /// `POST /api/process`
    async fn process(&self, config: &ProcessConfig) -> Result<ProcessResponse>;

    /// `POST /api/process/regenerate`
    async fn regenerate(&self, request: &RegenerateRequest) -> Result<RegenerateResponse>;

    /// `POST /api/rocket/generate`
    async fn generate_rocket(&self, request: &RocketRequest) -> Result<RocketResponse>;

    /// `POST /api/share/{platform}`. Takes the request by value so the
    /// credentials in it are dropped once the call resolves.
    async fn share(&self, platform: SharePlatform, request: ShareRequest)
    -> Result<ShareResponse>;
}
