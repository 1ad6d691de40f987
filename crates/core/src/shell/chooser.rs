use std::{
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    error::{AutoShortsError, Result},
    media::{VIDEO_EXTENSIONS, is_video_file},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerKind {
    /// System document picker; the grant outlives the session.
    OpenDocument { mime: &'static str },
    /// Plain content picker.
    GetContent { mime: &'static str },
}

/// Which picker to launch, and what to try when it cannot be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerPlan {
    pub primary: PickerKind,
    pub fallback: Option<PickerKind>,
}

impl PickerPlan {
    pub fn for_accept_types<S: AsRef<str>>(accept_types: &[S]) -> Self {
        let wants_video = accept_types.is_empty()
            || accept_types.iter().any(|t| {
                let t = t.as_ref().trim();
                t.is_empty() || t == "*/*" || t.starts_with("video/")
            });

        if wants_video {
            Self {
                primary: PickerKind::OpenDocument { mime: "video/*" },
                fallback: Some(PickerKind::GetContent { mime: "video/*" }),
            }
        } else {
            Self {
                primary: PickerKind::GetContent { mime: "*/*" },
                fallback: None,
            }
        }
    }
}

/// One-shot file selection: every request gets exactly one answer, a path
/// or `None`, and at most one request is outstanding.
#[derive(Debug, Default)]
pub struct FileChooser {
    outstanding: Mutex<Option<oneshot::Sender<Option<PathBuf>>>>,
}

impl FileChooser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new request. An older unanswered request is answered with `None`.
    pub fn request<S: AsRef<str>>(
        &self,
        accept_types: &[S],
    ) -> (PickerPlan, oneshot::Receiver<Option<PathBuf>>) {
        let (tx, rx) = oneshot::channel();
        let previous = self
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tx);

        if let Some(previous) = previous {
            debug!("Cancelling outstanding file chooser request");
            let _ = previous.send(None);
        }

        (PickerPlan::for_accept_types(accept_types), rx)
    }

    /// Answer the outstanding request. Returns `false` when there was none.
    pub fn resolve(&self, selection: Option<PathBuf>) -> bool {
        let pending = self
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match pending {
            Some(tx) => tx.send(selection).is_ok(),
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Accept a picked file only if it is one of the supported video containers.
pub fn validate_selection(path: PathBuf) -> Result<PathBuf> {
    if is_video_file(&path) {
        Ok(path)
    } else {
        Err(AutoShortsError::Validation(format!(
            "{} is not a supported video ({})",
            path.display(),
            VIDEO_EXTENSIONS.join(", ")
        )))
    }
}
