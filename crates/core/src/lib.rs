pub mod backend;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod media;
pub mod progress;
pub mod request;
pub mod results;
pub mod shell;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod test_helpers;

pub use backend::ShortsBackend;
pub use cache::{
    StoredSession, get_root_cache_dir, get_session_path, load_session, save_session,
};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{AutoShortsError, Result};
pub use format::{format_clip_card, format_rocket_content, format_timestamp, parse_timecode};
pub use progress::UploadProgress;
pub use request::{ProcessConfig, ProcessForm, ProcessSource};
pub use results::{ClipCard, RegenerateOptions, ResultsPanel};
pub use types::{
    CaptionStyle, Clip, ClipDuration, ClipOperation, Credentials, RocketContent, SharePlatform,
    ShareResponse,
};
pub use workflow::{FailureKind, VideoInput, Workflow, WorkflowState};
