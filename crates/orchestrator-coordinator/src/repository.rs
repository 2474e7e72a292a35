//! The Repository Collaborator interface.
//!
//! Git protocol, on-disk project scaffolding, and GitHub's REST API are
//! explicitly out of scope for this core — this module only
//! carries the contract the Coordinator drives, plus an in-memory stub
//! used by the coordinator's own tests. A real implementation (filesystem
//! emitter + GitHub client) lives outside this crate.

use orchestrator_types::MicroPhase;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Configuration handed to [`RepositoryCollaborator::setup_project`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    pub project_name: String,
    pub description: String,
}

/// Snapshot of repository state returned by `setup_project`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoState {
    pub repo_url: String,
    pub default_branch: String,
}

/// Outcome of committing one micro-phase's generated files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroPhaseCommitOutcome {
    pub branch: String,
    pub commit_id: String,
    pub pull_request: Option<String>,
    pub repo_url: String,
}

/// Outcome of the final integration step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationOutcome {
    pub repo_url: String,
    pub merged_summary: String,
}

/// The out-of-scope collaborator that turns generated artifacts into real
/// repository state: project scaffolding, branches, commits, and pull
/// requests. `execute_micro_phase_workflow` and `finalize_integration` must
/// be idempotent per `(session_id, phase_id)` — calling either twice for the
/// same phase must not create duplicate commits or branches.
pub trait RepositoryCollaborator: Send + Sync {
    fn setup_project(&self, session_id: &str, config: &RepoConfig) -> anyhow::Result<RepoState>;

    fn execute_micro_phase_workflow(
        &self,
        session_id: &str,
        phase: &MicroPhase,
        files: &HashMap<String, String>,
    ) -> anyhow::Result<MicroPhaseCommitOutcome>;

    fn finalize_integration(&self, session_id: &str) -> anyhow::Result<IntegrationOutcome>;
}

/// An in-memory stand-in for the real repository collaborator, used by
/// this crate's own tests. Records every call it receives rather than
/// touching git or the filesystem, and fabricates deterministic-looking
/// identifiers so idempotence can be asserted directly.
#[derive(Default)]
pub struct InMemoryRepository {
    commits: Mutex<HashMap<(String, String), MicroPhaseCommitOutcome>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct `(session, phase)` commits recorded so far.
    pub fn commit_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }
}

impl RepositoryCollaborator for InMemoryRepository {
    fn setup_project(&self, session_id: &str, config: &RepoConfig) -> anyhow::Result<RepoState> {
        Ok(RepoState {
            repo_url: format!("https://example.invalid/{session_id}/{}", config.project_name),
            default_branch: "main".to_string(),
        })
    }

    fn execute_micro_phase_workflow(
        &self,
        session_id: &str,
        phase: &MicroPhase,
        files: &HashMap<String, String>,
    ) -> anyhow::Result<MicroPhaseCommitOutcome> {
        let key = (session_id.to_string(), phase.id.clone());
        let mut commits = self.commits.lock().unwrap();
        if let Some(existing) = commits.get(&key) {
            return Ok(existing.clone());
        }
        let outcome = MicroPhaseCommitOutcome {
            branch: phase.branch_name.clone(),
            commit_id: format!("commit-{}-{}", session_id, phase.id),
            pull_request: Some(format!("pr-{}-{}", session_id, phase.id)),
            repo_url: format!("https://example.invalid/{session_id}"),
        };
        let _ = files.len();
        commits.insert(key, outcome.clone());
        Ok(outcome)
    }

    fn finalize_integration(&self, session_id: &str) -> anyhow::Result<IntegrationOutcome> {
        let count = self.commits.lock().unwrap().len();
        Ok(IntegrationOutcome {
            repo_url: format!("https://example.invalid/{session_id}"),
            merged_summary: format!("merged {count} micro-phase(s)"),
        })
    }
}
