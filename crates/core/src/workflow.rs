//! Upload → process → results lifecycle of one session.
//!
//! Transitions are plain methods on [`Workflow`] so they can be exercised
//! without a backend; [`Workflow::run`] drives them against one.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    backend::ShortsBackend,
    error::{AutoShortsError, Result},
    progress::UploadProgress,
    request::{ProcessConfig, ProcessForm, ProcessSource},
    types::{Clip, UploadResponse},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoInput {
    File(PathBuf),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSession {
    pub session_id: Uuid,
    pub input: VideoInput,
    pub upload_progress: u8,
    pub file_id: Option<String>,
    pub saved_path: Option<String>,
}

impl UploadSession {
    fn new(input: VideoInput) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            input,
            upload_progress: 0,
            file_id: None,
            saved_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Upload,
    Process,
    NoClips,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    Uploading,
    Processing,
    Results,
    Error {
        kind: FailureKind,
        message: String,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Uploading => "uploading",
            WorkflowState::Processing => "processing",
            WorkflowState::Results => "showing results",
            WorkflowState::Error { .. } => "in error",
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, WorkflowState::Uploading | WorkflowState::Processing)
    }
}

/// What the caller has to do after [`Workflow::begin`].
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    Upload(PathBuf),
    Process(ProcessConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub form: ProcessForm,
    session: Option<UploadSession>,
    state: WorkflowState,
    clips: Vec<Clip>,
}

impl Workflow {
    pub fn new(form: ProcessForm) -> Self {
        Self {
            form,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn session(&self) -> Option<&UploadSession> {
        self.session.as_ref()
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn progress(&self) -> u8 {
        self.session.as_ref().map_or(0, |s| s.upload_progress)
    }

    pub fn select_file(&mut self, path: PathBuf) -> Result<()> {
        self.replace_input(VideoInput::File(path))
    }

    pub fn enter_url(&mut self, url: impl Into<String>) -> Result<()> {
        self.replace_input(VideoInput::Url(url.into()))
    }

    /// Drop the selected file or URL along with any results.
    pub fn clear_input(&mut self) -> Result<()> {
        self.ensure_not_busy()?;
        self.session = None;
        self.clips.clear();
        self.state = WorkflowState::Idle;
        Ok(())
    }

    fn replace_input(&mut self, input: VideoInput) -> Result<()> {
        self.ensure_not_busy()?;
        let session = UploadSession::new(input);
        debug!("New session {}", session.session_id);
        self.session = Some(session);
        self.clips.clear();
        self.state = WorkflowState::Idle;
        Ok(())
    }

    fn ensure_not_busy(&self) -> Result<()> {
        match self.state {
            WorkflowState::Uploading => Err(AutoShortsError::Busy("upload")),
            WorkflowState::Processing => Err(AutoShortsError::Busy("process")),
            _ => Ok(()),
        }
    }

    fn ensure_state(&self, expected: &WorkflowState, action: &'static str) -> Result<()> {
        if &self.state == expected {
            Ok(())
        } else {
            Err(AutoShortsError::InvalidTransition {
                action,
                state: self.state.name(),
            })
        }
    }

    /// Validate the form and leave `Idle`.
    ///
    /// Validation failures leave the state untouched, so no request is made.
    pub fn begin(&mut self) -> Result<NextStep> {
        self.ensure_not_busy()?;

        let Some(session) = self.session.as_ref() else {
            return Err(AutoShortsError::Validation(
                "Select a video file or enter a URL first".to_string(),
            ));
        };

        let step = match &session.input {
            VideoInput::Url(url) => NextStep::Process(self.form.build(ProcessSource::Url {
                video_url: url.trim().to_string(),
            })?),
            VideoInput::File(path) => {
                self.form.validate()?;
                NextStep::Upload(path.clone())
            }
        };

        if let Some(session) = self.session.as_mut() {
            session.upload_progress = 0;
            session.file_id = None;
            session.saved_path = None;
        }
        self.clips.clear();
        self.state = WorkflowState::Uploading;

        if matches!(step, NextStep::Process(_)) {
            debug!("URL source, skipping upload");
            self.state = WorkflowState::Processing;
        }

        Ok(step)
    }

    pub fn set_progress(&mut self, percent: u8) {
        if let Some(session) = self.session.as_mut() {
            session.upload_progress = session.upload_progress.max(percent.min(100));
        }
    }

    /// Record the stored upload and produce the process request for it.
    pub fn upload_succeeded(&mut self, uploaded: UploadResponse) -> Result<ProcessConfig> {
        self.ensure_state(&WorkflowState::Uploading, "finish an upload")?;

        if let Some(session) = self.session.as_mut() {
            session.upload_progress = 100;
            session.file_id = Some(uploaded.file_id.clone());
            session.saved_path = Some(uploaded.saved_path.clone());
        }

        let source = ProcessSource::Uploaded {
            file_id: uploaded.file_id,
            video_path: uploaded.saved_path,
        };
        match self.form.build(source) {
            Ok(config) => {
                self.state = WorkflowState::Processing;
                Ok(config)
            }
            Err(e) => {
                self.fail(FailureKind::Process, &e);
                Err(e)
            }
        }
    }

    pub fn upload_failed(&mut self, error: &AutoShortsError) -> Result<()> {
        self.ensure_state(&WorkflowState::Uploading, "fail an upload")?;
        self.fail(FailureKind::Upload, error);
        Ok(())
    }

    /// An empty clip list counts as a failure.
    pub fn process_succeeded(&mut self, clips: Vec<Clip>) -> Result<&[Clip]> {
        self.ensure_state(&WorkflowState::Processing, "finish processing")?;

        if clips.is_empty() {
            let error = AutoShortsError::NoClips;
            self.fail(FailureKind::NoClips, &error);
            return Err(error);
        }

        info!("Processing produced {} clips", clips.len());
        self.clips = clips;
        self.state = WorkflowState::Results;
        Ok(&self.clips)
    }

    pub fn process_failed(&mut self, error: &AutoShortsError) -> Result<()> {
        self.ensure_state(&WorkflowState::Processing, "fail processing")?;
        self.fail(FailureKind::Process, error);
        Ok(())
    }

    /// Keeps the input so the same video can be retried, but not the progress.
    fn fail(&mut self, kind: FailureKind, error: &AutoShortsError) {
        warn!("Workflow failed during {:?}: {}", kind, error);
        if let Some(session) = self.session.as_mut() {
            session.upload_progress = 0;
        }
        self.state = WorkflowState::Error {
            kind,
            message: error.user_message(),
        };
    }

    /// Run one upload-through-results pass. Every failure lands in
    /// [`WorkflowState::Error`] and needs a fresh call to retry.
    pub async fn run<B>(&mut self, backend: &B, progress: &UploadProgress) -> Result<&[Clip]>
    where
        B: ShortsBackend + ?Sized,
    {
        let config = match self.begin()? {
            NextStep::Process(config) => config,
            NextStep::Upload(path) => {
                progress.reset();
                match self.upload_mirrored(backend, &path, progress).await {
                    Ok(uploaded) => {
                        progress.complete();
                        self.upload_succeeded(uploaded)?
                    }
                    Err(e) => {
                        progress.reset();
                        self.upload_failed(&e)?;
                        return Err(e);
                    }
                }
            }
        };

        let outcome = match backend.process(&config).await {
            Ok(response) => self.process_succeeded(response.clips).map(|_| ()),
            Err(e) => {
                self.process_failed(&e)?;
                Err(e)
            }
        };
        if outcome.is_err() {
            progress.reset();
        }
        outcome.map(|()| self.clips.as_slice())
    }

    /// Upload while copying every progress update into the session.
    async fn upload_mirrored<B>(
        &mut self,
        backend: &B,
        path: &Path,
        progress: &UploadProgress,
    ) -> Result<UploadResponse>
    where
        B: ShortsBackend + ?Sized,
    {
        let mut rx = progress.subscribe();
        let upload = backend.upload(path, progress);
        tokio::pin!(upload);

        loop {
            tokio::select! {
                outcome = &mut upload => return outcome,
                changed = rx.changed() => match changed {
                    Ok(()) => {
                        let percent = *rx.borrow_and_update();
                        self.set_progress(percent);
                    }
                    Err(_) => return upload.await,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Notify;

    use super::*;
    use crate::test_helpers::{MockBackend, sample_clips};

    fn uploaded() -> UploadResponse {
        UploadResponse {
            file_id: "f1".to_string(),
            saved_path: "uploads/f1.mp4".to_string(),
        }
    }

    #[test]
    fn test_begin_without_input_is_validation_error() {
        let mut wf = Workflow::default();
        assert!(wf.begin().unwrap_err().is_validation());
        assert_eq!(wf.state(), &WorkflowState::Idle);
    }

    #[test]
    fn test_file_mode_goes_through_upload() {
        let mut wf = Workflow::default();
        wf.select_file("talk.mp4".into()).unwrap();
        assert_eq!(wf.begin().unwrap(), NextStep::Upload("talk.mp4".into()));
        assert_eq!(wf.state(), &WorkflowState::Uploading);

        let config = wf.upload_succeeded(uploaded()).unwrap();
        assert_eq!(wf.state(), &WorkflowState::Processing);
        assert_eq!(
            config.source,
            ProcessSource::Uploaded {
                file_id: "f1".to_string(),
                video_path: "uploads/f1.mp4".to_string()
            }
        );
        assert_eq!(wf.progress(), 100);

        wf.process_succeeded(sample_clips("f1", 2)).unwrap();
        assert_eq!(wf.state(), &WorkflowState::Results);
        assert_eq!(wf.clips().len(), 2);
    }

    #[test]
    fn test_url_mode_skips_upload() {
        let mut wf = Workflow::default();
        wf.enter_url("https://youtu.be/abc").unwrap();
        match wf.begin().unwrap() {
            NextStep::Process(config) => assert_eq!(
                config.source,
                ProcessSource::Url {
                    video_url: "https://youtu.be/abc".to_string()
                }
            ),
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(wf.state(), &WorkflowState::Processing);
    }

    #[test]
    fn test_empty_url_is_rejected_without_transition() {
        let mut wf = Workflow::default();
        wf.enter_url("").unwrap();
        let err = wf.begin().unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid URL");
        assert_eq!(wf.state(), &WorkflowState::Idle);
    }

    #[test]
    fn test_bad_time_range_blocks_start() {
        let mut wf = Workflow::default();
        wf.form.start_time = "00:01:00".to_string();
        wf.form.end_time = "00:00:30".to_string();
        wf.select_file("talk.mp4".into()).unwrap();
        assert!(wf.begin().unwrap_err().is_validation());
        assert_eq!(wf.state(), &WorkflowState::Idle);
    }

    #[test]
    fn test_cannot_start_twice() {
        let mut wf = Workflow::default();
        wf.select_file("talk.mp4".into()).unwrap();
        wf.begin().unwrap();
        assert!(matches!(wf.begin(), Err(AutoShortsError::Busy("upload"))));
        assert!(matches!(
            wf.select_file("other.mp4".into()),
            Err(AutoShortsError::Busy(_))
        ));
    }

    #[test]
    fn test_upload_failure_keeps_input_and_resets_progress() {
        let mut wf = Workflow::default();
        wf.select_file("talk.mp4".into()).unwrap();
        wf.begin().unwrap();
        wf.set_progress(40);
        wf.upload_failed(&AutoShortsError::Validation("boom".to_string()))
            .unwrap();

        assert!(matches!(
            wf.state(),
            WorkflowState::Error {
                kind: FailureKind::Upload,
                ..
            }
        ));
        assert_eq!(wf.progress(), 0);
        assert_eq!(
            wf.session().unwrap().input,
            VideoInput::File("talk.mp4".into())
        );
        // retry without re-selecting
        assert_eq!(wf.begin().unwrap(), NextStep::Upload("talk.mp4".into()));
    }

    #[test]
    fn test_empty_clip_list_is_an_error() {
        let mut wf = Workflow::default();
        wf.select_file("talk.mp4".into()).unwrap();
        wf.begin().unwrap();
        wf.upload_succeeded(uploaded()).unwrap();
        assert_eq!(wf.progress(), 100);
        assert!(matches!(
            wf.process_succeeded(Vec::new()),
            Err(AutoShortsError::NoClips)
        ));
        assert!(matches!(
            wf.state(),
            WorkflowState::Error {
                kind: FailureKind::NoClips,
                ..
            }
        ));
        assert!(wf.clips().is_empty());
        assert_eq!(wf.progress(), 0);
        assert_eq!(
            wf.session().unwrap().input,
            VideoInput::File("talk.mp4".into())
        );
    }

    #[test]
    fn test_out_of_order_transitions_are_rejected() {
        let mut wf = Workflow::default();
        assert!(matches!(
            wf.upload_succeeded(uploaded()),
            Err(AutoShortsError::InvalidTransition { .. })
        ));
        assert!(matches!(
            wf.process_succeeded(sample_clips("f1", 1)),
            Err(AutoShortsError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_progress_never_decreases_in_session() {
        let mut wf = Workflow::default();
        wf.select_file("talk.mp4".into()).unwrap();
        wf.set_progress(30);
        wf.set_progress(10);
        assert_eq!(wf.progress(), 30);
    }

    #[test]
    fn test_workflow_serializes() {
        let mut wf = Workflow::default();
        wf.select_file("talk.mp4".into()).unwrap();
        wf.begin().unwrap();
        wf.upload_succeeded(uploaded()).unwrap();
        wf.process_succeeded(sample_clips("f1", 1)).unwrap();

        let json = serde_json::to_string(&wf).unwrap();
        let back: Workflow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, wf);
    }

    #[tokio::test]
    async fn test_run_file_mode_end_to_end() {
        let backend = MockBackend::with_clips(sample_clips("f1", 3));
        let progress = UploadProgress::new();
        let mut wf = Workflow::default();
        wf.select_file("talk.mp4".into()).unwrap();

        let clips = wf.run(&backend, &progress).await.unwrap();
        assert_eq!(clips.len(), 3);
        assert_eq!(progress.get(), 100);
        assert_eq!(backend.calls(), vec!["upload", "process"]);

        let sent = backend.processed();
        let value = serde_json::to_value(&sent[0]).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "caption_style",
                "clip_duration",
                "file_id",
                "language",
                "num_shorts",
                "video_path"
            ]
        );
    }

    #[tokio::test]
    async fn test_run_upload_failure_skips_processing() {
        let backend = MockBackend {
            fail_upload: true,
            ..MockBackend::default()
        };
        let progress = UploadProgress::new();
        let mut wf = Workflow::default();
        wf.select_file("talk.mp4".into()).unwrap();

        assert!(wf.run(&backend, &progress).await.is_err());
        assert_eq!(progress.get(), 0);
        assert_eq!(backend.calls(), vec!["upload"]);
        assert!(matches!(
            wf.state(),
            WorkflowState::Error {
                kind: FailureKind::Upload,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_run_validation_makes_no_calls() {
        let backend = MockBackend::default();
        let progress = UploadProgress::new();
        let mut wf = Workflow::default();
        wf.form.start_time = "00:01:00".to_string();
        wf.form.end_time = "00:00:30".to_string();
        wf.select_file("talk.mp4".into()).unwrap();

        assert!(wf.run(&backend, &progress).await.is_err());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_process_failure() {
        let backend = MockBackend {
            fail_process: true,
            ..MockBackend::default()
        };
        let progress = UploadProgress::new();
        let mut wf = Workflow::default();
        wf.select_file("talk.mp4".into()).unwrap();

        assert!(wf.run(&backend, &progress).await.is_err());
        assert_eq!(backend.calls(), vec!["upload", "process"]);
        assert!(matches!(
            wf.state(),
            WorkflowState::Error {
                kind: FailureKind::Process,
                ..
            }
        ));
        assert_eq!(wf.progress(), 0);
        assert_eq!(progress.get(), 0);
    }

    #[tokio::test]
    async fn test_run_empty_clips_resets_progress() {
        let backend = MockBackend::default();
        let progress = UploadProgress::new();
        let mut wf = Workflow::default();
        wf.select_file("talk.mp4".into()).unwrap();

        assert!(matches!(
            wf.run(&backend, &progress).await,
            Err(AutoShortsError::NoClips)
        ));
        assert_eq!(wf.progress(), 0);
        assert_eq!(progress.get(), 0);
        // the same input can be started again
        assert_eq!(wf.begin().unwrap(), NextStep::Upload("talk.mp4".into()));
    }

    #[tokio::test]
    async fn test_run_mirrors_upload_progress_into_session() {
        let backend = MockBackend {
            upload_gate: Some(Notify::new()),
            ..MockBackend::default()
        };
        let progress = UploadProgress::new();
        let mut wf = Workflow::default();
        wf.select_file("talk.mp4".into()).unwrap();

        {
            let run = wf.run(&backend, &progress);
            tokio::pin!(run);
            // upload reports 50% and then blocks on the gate
            let pending =
                tokio::time::timeout(std::time::Duration::from_millis(50), &mut run).await;
            assert!(pending.is_err());
        }

        assert_eq!(progress.get(), 50);
        assert_eq!(wf.progress(), 50);
        assert_eq!(wf.state(), &WorkflowState::Uploading);
    }
}
