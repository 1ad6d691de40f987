use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    client::last_path_segment,
    error::{AutoShortsError, Result},
};

/// Caption look burned into generated shorts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptionStyle {
    #[default]
    Karaoke,
    #[serde(rename = "Deep Diver")]
    DeepDiver,
    Mozi,
    Glitch,
    Classic,
}

impl CaptionStyle {
    pub const ALL: &'static [CaptionStyle] = &[
        CaptionStyle::Karaoke,
        CaptionStyle::DeepDiver,
        CaptionStyle::Mozi,
        CaptionStyle::Glitch,
        CaptionStyle::Classic,
    ];

    /// Name as the processing API expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionStyle::Karaoke => "Karaoke",
            CaptionStyle::DeepDiver => "Deep Diver",
            CaptionStyle::Mozi => "Mozi",
            CaptionStyle::Glitch => "Glitch",
            CaptionStyle::Classic => "Classic",
        }
    }
}

impl fmt::Display for CaptionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptionStyle {
    type Err = AutoShortsError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "karaoke" => Ok(CaptionStyle::Karaoke),
            "deepdiver" => Ok(CaptionStyle::DeepDiver),
            "mozi" => Ok(CaptionStyle::Mozi),
            "glitch" => Ok(CaptionStyle::Glitch),
            "classic" => Ok(CaptionStyle::Classic),
            _ => Err(AutoShortsError::Validation(format!(
                "Unknown caption style: {}",
                s
            ))),
        }
    }
}

/// Target length of each generated short, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ClipDuration {
    Seconds30,
    #[default]
    Seconds60,
    Seconds90,
    Seconds120,
}

impl ClipDuration {
    pub fn seconds(&self) -> u32 {
        match self {
            ClipDuration::Seconds30 => 30,
            ClipDuration::Seconds60 => 60,
            ClipDuration::Seconds90 => 90,
            ClipDuration::Seconds120 => 120,
        }
    }
}

impl TryFrom<u32> for ClipDuration {
    type Error = AutoShortsError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            30 => Ok(ClipDuration::Seconds30),
            60 => Ok(ClipDuration::Seconds60),
            90 => Ok(ClipDuration::Seconds90),
            120 => Ok(ClipDuration::Seconds120),
            other => Err(AutoShortsError::Validation(format!(
                "Clip duration must be 30, 60, 90 or 120 seconds, got {}",
                other
            ))),
        }
    }
}

impl From<ClipDuration> for u32 {
    fn from(duration: ClipDuration) -> Self {
        duration.seconds()
    }
}

/// A generated short as returned by `/api/process`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub path: String,
    pub url: String,
    #[serde(default)]
    pub reason: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtags: Option<Vec<String>>,
    /// Source file id, when the backend reports it explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

impl Clip {
    /// File id of the upload this clip was cut from.
    ///
    /// Prefers the explicit `file_id`; otherwise falls back to the backend's
    /// `{file_id}_short_{n}.mp4` naming of the clip url.
    pub fn source_file_id(&self) -> Result<String> {
        if let Some(id) = self.file_id.as_deref().filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }

        let filename = last_path_segment(&self.url).unwrap_or_default();
        match filename.split_once("_short_") {
            Some((id, _)) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(AutoShortsError::ClipIdentity {
                url: self.url.clone(),
            }),
        }
    }

    /// Default post caption: title, description and hashtags separated by blank lines.
    pub fn share_caption(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}",
            self.title.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default(),
            self.hashtags.as_deref().unwrap_or_default().join(" ")
        )
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub saved_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessResponse {
    #[serde(default)]
    pub clips: Vec<Clip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegenerateRequest {
    pub file_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub caption_style: CaptionStyle,
    pub custom_color: String,
    pub custom_bg_color: String,
    pub custom_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenerateResponse {
    pub url: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocketRequest {
    pub clip_path: String,
    pub clip_title: String,
    pub clip_reason: String,
}

impl RocketRequest {
    pub fn for_clip(clip: &Clip) -> Self {
        Self {
            clip_path: clip.path.clone(),
            clip_title: clip.title.clone().unwrap_or_default(),
            clip_reason: clip.reason.clone(),
        }
    }
}

/// AI-written promotional copy for a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocketContent {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub caption_instagram: String,
    #[serde(default)]
    pub caption_youtube: String,
}

impl RocketContent {
    pub fn caption_for(&self, platform: SharePlatform) -> &str {
        match platform {
            SharePlatform::Instagram => &self.caption_instagram,
            SharePlatform::Youtube => &self.caption_youtube,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocketResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub content: Option<RocketContent>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RocketResponse {
    pub fn into_content(self) -> Result<RocketContent> {
        match self.content {
            Some(content) if self.success => Ok(content),
            _ => Err(AutoShortsError::Rejected(
                self.error
                    .unwrap_or_else(|| "No content was generated".to_string()),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharePlatform {
    Instagram,
    Youtube,
}

impl SharePlatform {
    pub fn endpoint(&self) -> &'static str {
        match self {
            SharePlatform::Instagram => "/api/share/instagram",
            SharePlatform::Youtube => "/api/share/youtube",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SharePlatform::Instagram => "Instagram",
            SharePlatform::Youtube => "YouTube",
        }
    }
}

impl fmt::Display for SharePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Login for a publishing platform. Never printed, never stored.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareRequest {
    pub video_path: String,
    pub caption: String,
    #[serde(flatten)]
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub media_id: Option<serde_json::Value>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ShareResponse {
    /// A 200 reply can still carry `"success": false`.
    pub fn accepted(self) -> Result<Self> {
        match self.success {
            Some(false) => Err(AutoShortsError::Rejected(
                self.error
                    .or(self.detail)
                    .unwrap_or_else(|| "Sharing failed".to_string()),
            )),
            _ => Ok(self),
        }
    }
}

/// Follow-up operations offered on a generated clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClipOperation {
    Regenerate,
    Rocket,
    Share,
}

impl fmt::Display for ClipOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipOperation::Regenerate => f.write_str("Regeneration"),
            ClipOperation::Rocket => f.write_str("Rocket content generation"),
            ClipOperation::Share => f.write_str("Sharing"),
        }
    }
}
