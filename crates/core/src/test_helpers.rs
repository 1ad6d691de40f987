//! In-memory backend for unit tests.

use std::{path::Path, sync::Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Notify;

use crate::{
    backend::ShortsBackend,
    error::{AutoShortsError, Result},
    progress::UploadProgress,
    request::ProcessConfig,
    types::{
        Clip, ProcessResponse, RegenerateRequest, RegenerateResponse, RocketContent,
        RocketRequest, RocketResponse, SharePlatform, ShareRequest, ShareResponse,
        UploadResponse,
    },
};

pub fn sample_clips(file_id: &str, count: usize) -> Vec<Clip> {
    (1..=count)
        .map(|n| Clip {
            path: format!("processed/{}_short_{}.mp4", file_id, n),
            url: format!("http://localhost:8000/static/{}_short_{}.mp4", file_id, n),
            reason: format!("moment {}", n),
            start: (n as f64) * 60.0,
            end: (n as f64) * 60.0 + 30.0,
            title: Some(format!("Clip {}", n)),
            description: Some("A great moment".to_string()),
            hashtags: Some(vec!["#shorts".to_string()]),
            file_id: None,
        })
        .collect()
}

pub fn sample_rocket() -> RocketContent {
    RocketContent {
        title: "You won't believe this".to_string(),
        description: "The best part".to_string(),
        hashtags: vec!["#viral".to_string()],
        caption_instagram: "IG caption #viral".to_string(),
        caption_youtube: "YT caption".to_string(),
    }
}

/// What the mock saw for a share call, minus the password.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedCall {
    pub platform: SharePlatform,
    pub video_path: String,
    pub caption: String,
    pub username: String,
}

#[derive(Default)]
pub struct MockBackend {
    pub clips: Vec<Clip>,
    pub fail_upload: bool,
    pub fail_process: bool,
    pub fail_regenerate: bool,
    pub rocket: Option<RocketContent>,
    pub share_error: Option<String>,
    /// When set, regenerate waits for a notification before answering.
    pub regenerate_gate: Option<Notify>,
    /// When set, upload reports half the bytes and then waits.
    pub upload_gate: Option<Notify>,
    pub calls: Mutex<Vec<&'static str>>,
    pub processed: Mutex<Vec<ProcessConfig>>,
    pub regenerated: Mutex<Vec<RegenerateRequest>>,
    pub shared: Mutex<Vec<SharedCall>>,
}

impl MockBackend {
    pub fn with_clips(clips: Vec<Clip>) -> Self {
        Self {
            clips,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn processed(&self) -> Vec<ProcessConfig> {
        self.processed.lock().unwrap().clone()
    }

    pub fn regenerated(&self) -> Vec<RegenerateRequest> {
        self.regenerated.lock().unwrap().clone()
    }

    pub fn shared(&self) -> Vec<SharedCall> {
        self.shared.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

fn server_error(endpoint: &'static str, detail: &str) -> AutoShortsError {
    AutoShortsError::Status {
        endpoint,
        status: StatusCode::INTERNAL_SERVER_ERROR,
        detail: detail.to_string(),
    }
}

#[async_trait]
impl ShortsBackend for MockBackend {
    async fn upload(&self, path: &Path, progress: &UploadProgress) -> Result<UploadResponse> {
        self.record("upload");
        progress.record_bytes(50, 100);
        if let Some(gate) = &self.upload_gate {
            gate.notified().await;
        }
        if self.fail_upload {
            return Err(AutoShortsError::UploadFailed {
                path: path.to_path_buf(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(UploadResponse {
            file_id: "f1".to_string(),
            saved_path: "uploads/f1.mp4".to_string(),
        })
    }

    async fn process(&self, config: &ProcessConfig) -> Result<ProcessResponse> {
        self.record("process");
        self.processed.lock().unwrap().push(config.clone());
        if self.fail_process {
            return Err(server_error("/api/process", "transcription failed"));
        }
        Ok(ProcessResponse {
            clips: self.clips.clone(),
        })
    }

    async fn regenerate(&self, request: &RegenerateRequest) -> Result<RegenerateResponse> {
        self.record("regenerate");
        self.regenerated.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.regenerate_gate {
            gate.notified().await;
        }
        if self.fail_regenerate {
            return Err(server_error("/api/process/regenerate", "Regeneration failed"));
        }
        let n = self.regenerated.lock().unwrap().len();
        Ok(RegenerateResponse {
            url: format!(
                "http://localhost:8000/static/{}_regen_{}.mp4",
                request.file_id, n
            ),
            path: format!("processed/{}_regen_{}.mp4", request.file_id, n),
        })
    }

    async fn generate_rocket(&self, _request: &RocketRequest) -> Result<RocketResponse> {
        self.record("rocket");
        Ok(RocketResponse {
            success: self.rocket.is_some(),
            content: self.rocket.clone(),
            error: self
                .rocket
                .is_none()
                .then(|| "model unavailable".to_string()),
        })
    }

    async fn share(
        &self,
        platform: SharePlatform,
        request: ShareRequest,
    ) -> Result<ShareResponse> {
        self.record("share");
        self.shared.lock().unwrap().push(SharedCall {
            platform,
            video_path: request.video_path.clone(),
            caption: request.caption.clone(),
            username: request.credentials.username.clone(),
        });
        if let Some(detail) = &self.share_error {
            return Err(AutoShortsError::Status {
                endpoint: platform.endpoint(),
                status: StatusCode::BAD_REQUEST,
                detail: detail.clone(),
            });
        }
        Ok(ShareResponse {
            success: Some(true),
            ..ShareResponse::default()
        })
    }
}
