//! Persists the last-completed coordinator state per session, independent of
//! the cache — a session's resume point never depends solely on the
//! presence of a well-known cache key.

use std::fs;
use std::path::{Path, PathBuf};

use orchestrator_types::{OrchestratorError, Result};

use crate::state::{CoordinatorState, ResumeMarker};

pub struct ResumeStore {
    root: PathBuf,
}

impl ResumeStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| OrchestratorError::Dependency(format!("creating resume dir: {e}")))?;
        Ok(Self { root })
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize(session_id)))
    }

    pub fn load(&self, session_id: &str) -> Result<ResumeMarker> {
        let path = self.path(session_id);
        if !path.exists() {
            return Ok(ResumeMarker::fresh(session_id));
        }
        let data = fs::read_to_string(&path)
            .map_err(|e| OrchestratorError::Dependency(format!("reading resume marker: {e}")))?;
        serde_json::from_str(&data)
            .map_err(|e| OrchestratorError::Dependency(format!("parsing resume marker: {e}")))
    }

    pub fn mark_completed(&self, session_id: &str, state: CoordinatorState) -> Result<()> {
        let marker = ResumeMarker { session_id: session_id.to_string(), last_completed: Some(state) };
        let serialized = serde_json::to_string_pretty(&marker)
            .map_err(|e| OrchestratorError::Dependency(format!("serializing resume marker: {e}")))?;
        write_atomic(&self.path(session_id), &serialized)
    }
}

fn sanitize(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)
        .map_err(|e| OrchestratorError::Dependency(format!("writing {}: {e}", tmp_path.display())))?;
    fs::rename(&tmp_path, path)
        .map_err(|e| OrchestratorError::Dependency(format!("renaming into {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_without_prior_marker_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::open(dir.path()).unwrap();
        let marker = store.load("s1").unwrap();
        assert!(marker.last_completed.is_none());
    }

    #[test]
    fn mark_completed_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = ResumeStore::open(dir.path()).unwrap();
            store.mark_completed("s1", CoordinatorState::ArchitectureDesign).unwrap();
        }
        let store = ResumeStore::open(dir.path()).unwrap();
        let marker = store.load("s1").unwrap();
        assert_eq!(marker.last_completed, Some(CoordinatorState::ArchitectureDesign));
    }

    #[test]
    fn sessions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::open(dir.path()).unwrap();
        store.mark_completed("s1", CoordinatorState::JointBrainstorming).unwrap();
        assert!(store.load("s2").unwrap().last_completed.is_none());
    }
}
