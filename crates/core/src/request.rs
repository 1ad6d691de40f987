//! Turns editable form state into a `/api/process` payload.

use serde::{Deserialize, Serialize};

use crate::{
    error::{AutoShortsError, Result},
    format::parse_timecode,
    types::{CaptionStyle, ClipDuration},
};

pub const DEFAULT_NUM_SHORTS: u8 = 4;
pub const MAX_NUM_SHORTS: u8 = 10;
pub const DEFAULT_TEXT_COLOR: &str = "#FFFFFF";
pub const DEFAULT_BG_COLOR: &str = "#000000";
pub const DEFAULT_FONT_SIZE: u32 = 18;

/// Which video the backend should cut shorts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessSource {
    Uploaded { file_id: String, video_path: String },
    Url { video_url: String },
}

/// Body of `POST /api/process`. Built once per run and never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(flatten)]
    pub source: ProcessSource,
    pub num_shorts: u8,
    pub caption_style: CaptionStyle,
    /// Empty means auto detect.
    pub language: String,
    pub clip_duration: ClipDuration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_end_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark_image_path: Option<String>,
}

/// Processing window in seconds, both ends optional.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeWindow {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// User-editable processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessForm {
    pub num_shorts: u8,
    pub caption_style: CaptionStyle,
    /// `None` (or "auto") lets the backend detect the spoken language.
    pub language: Option<String>,
    pub clip_duration: ClipDuration,
    /// Raw `HH:MM:SS`, `MM:SS` or seconds text, empty when unset.
    pub start_time: String,
    pub end_time: String,
    pub text_color: String,
    /// Empty means no caption background.
    pub bg_color: String,
    pub font_size: u32,
    pub watermark_text: Option<String>,
    pub watermark_image_path: Option<String>,
}

impl Default for ProcessForm {
    fn default() -> Self {
        Self {
            num_shorts: DEFAULT_NUM_SHORTS,
            caption_style: CaptionStyle::default(),
            language: None,
            clip_duration: ClipDuration::default(),
            start_time: String::new(),
            end_time: String::new(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            bg_color: String::new(),
            font_size: DEFAULT_FONT_SIZE,
            watermark_text: None,
            watermark_image_path: None,
        }
    }
}

impl ProcessForm {
    /// Check everything that can be checked without the network.
    pub fn validate(&self) -> Result<TimeWindow> {
        if !(1..=MAX_NUM_SHORTS).contains(&self.num_shorts) {
            return Err(AutoShortsError::Validation(format!(
                "Number of shorts must be between 1 and {}",
                MAX_NUM_SHORTS
            )));
        }

        let window = TimeWindow {
            start: parse_timecode(&self.start_time)?,
            end: parse_timecode(&self.end_time)?,
        };

        if let (Some(start), Some(end)) = (window.start, window.end) {
            if start >= end {
                return Err(AutoShortsError::Validation(
                    "Start time must be less than End time".to_string(),
                ));
            }
        }

        Ok(window)
    }

    /// Build the payload for one processing run.
    ///
    /// Color and size overrides equal to the server defaults are left out.
    pub fn build(&self, source: ProcessSource) -> Result<ProcessConfig> {
        let window = self.validate()?;

        if let ProcessSource::Url { video_url } = &source {
            if video_url.trim().is_empty() {
                return Err(AutoShortsError::Validation(
                    "Please enter a valid URL".to_string(),
                ));
            }
        }

        let language = match self.language.as_deref().map(str::trim) {
            None | Some("") => String::new(),
            Some(lang) if lang.eq_ignore_ascii_case("auto") => String::new(),
            Some(lang) => lang.to_string(),
        };

        let text_color = self.text_color.trim();
        let custom_color = (!text_color.is_empty()
            && !text_color.eq_ignore_ascii_case(DEFAULT_TEXT_COLOR))
        .then(|| text_color.to_string());

        let bg_color = self.bg_color.trim();
        let custom_bg_color = (!bg_color.is_empty()).then(|| bg_color.to_string());

        let custom_size = (self.font_size != DEFAULT_FONT_SIZE).then_some(self.font_size);

        Ok(ProcessConfig {
            source,
            num_shorts: self.num_shorts,
            caption_style: self.caption_style,
            language,
            clip_duration: self.clip_duration,
            processing_start_time: window.start,
            processing_end_time: window.end,
            custom_color,
            custom_bg_color,
            custom_size,
            watermark_text: non_blank(self.watermark_text.as_deref()),
            watermark_image_path: non_blank(self.watermark_image_path.as_deref()),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
