use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::{
    error::Result,
    results::{ClipCard, ResultsPanel},
    workflow::Workflow,
};

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("autoshorts")
}

/// Where the last session is kept between invocations.
pub fn get_session_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("session.json")
}

/// Workflow plus the result cards, including any rocket content generated for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub workflow: Workflow,
    #[serde(default)]
    pub cards: Vec<ClipCard>,
}

impl StoredSession {
    pub async fn capture(workflow: &Workflow, panel: &ResultsPanel) -> Self {
        Self {
            workflow: workflow.clone(),
            cards: panel.cards().await,
        }
    }

    /// Rebuild the panel. Cards missing from an older file fall back to the workflow clips.
    pub fn panel(&self) -> ResultsPanel {
        if self.cards.is_empty() {
            ResultsPanel::new(self.workflow.clips().to_vec())
        } else {
            ResultsPanel::from_cards(self.cards.clone())
        }
    }
}

/// Load the stored session, `None` when nothing has been saved yet.
pub async fn load_session(path: &Path) -> Result<Option<StoredSession>> {
    if !fs::try_exists(path).await? {
        return Ok(None);
    }
    let json_content = fs::read_to_string(path).await?;
    let session: StoredSession = serde_json::from_str(&json_content)?;
    Ok(Some(session))
}

pub async fn save_session(session: &StoredSession, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let pretty_json = serde_json::to_string_pretty(session)?;
    fs::write(path, &pretty_json).await?;
    debug!("Saved session to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        request::ProcessForm,
        test_helpers::{MockBackend, sample_clips, sample_rocket},
        workflow::WorkflowState,
    };

    #[tokio::test]
    async fn test_missing_session_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_session(&get_session_path(dir.path())).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_session_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = get_session_path(&dir.path().join("nested"));

        let backend = MockBackend::with_clips(sample_clips("f1", 2));
        let mut workflow = Workflow::new(ProcessForm::default());
        workflow.enter_url("https://youtu.be/abc").unwrap();
        workflow
            .run(&backend, &crate::progress::UploadProgress::new())
            .await
            .unwrap();

        let panel = ResultsPanel::new(workflow.clips().to_vec());
        let backend = MockBackend {
            rocket: Some(sample_rocket()),
            ..MockBackend::default()
        };
        panel.generate_rocket(&backend, 1).await.unwrap();

        let stored = StoredSession::capture(&workflow, &panel).await;
        save_session(&stored, &path).await.unwrap();

        let loaded = load_session(&path).await.unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert!(matches!(loaded.workflow.state(), WorkflowState::Results));
        assert_eq!(loaded.cards[1].rocket, Some(sample_rocket()));
        assert_eq!(loaded.panel().len().await, 2);
    }

    #[tokio::test]
    async fn test_panel_falls_back_to_workflow_clips() {
        let json = serde_json::json!({ "workflow": Workflow::default() });
        let stored: StoredSession = serde_json::from_value(json).unwrap();
        assert!(stored.panel().is_empty().await);
    }
}
