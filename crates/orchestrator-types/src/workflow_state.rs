//! Per-session mutable state, owned exclusively by its session's coordinator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Status of a single phase within a session's workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

/// Per-session workflow state.
///
/// Mutated only by the Coordinator or Engine holding the session lock — this
/// type itself performs no locking; callers are expected to hold it behind
/// an `Arc<Mutex<WorkflowState>>` or to own it on a single logical thread of
/// control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: String,
    pub current_phase: Option<String>,
    pub phase_status: HashMap<String, PhaseStatus>,
    pub inputs: HashMap<String, String>,
    pub artifacts: HashMap<String, String>,
    pub errors: Vec<String>,
}

impl WorkflowState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            current_phase: None,
            phase_status: HashMap::new(),
            inputs: HashMap::new(),
            artifacts: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Seed the state with the session's initial inputs (e.g. `user_request`).
    pub fn with_inputs(mut self, inputs: HashMap<String, String>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Look up `workflow_state.<key>` resolution used by declarative input sources.
    /// Falls back to the empty string when the key is absent.
    pub fn get_state_key(&self, key: &str) -> String {
        self.artifacts
            .get(key)
            .or_else(|| self.inputs.get(key))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_artifact(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.artifacts.insert(key.into(), value.into());
    }

    pub fn status_of(&self, phase_name: &str) -> PhaseStatus {
        self.phase_status
            .get(phase_name)
            .copied()
            .unwrap_or(PhaseStatus::Pending)
    }

    pub fn set_status(&mut self, phase_name: impl Into<String>, status: PhaseStatus) {
        self.phase_status.insert(phase_name.into(), status);
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Whether every phase in `names` has status `Completed` or `Skipped`.
    pub fn all_satisfied(&self, names: &[String]) -> bool {
        names.iter().all(|name| {
            matches!(
                self.status_of(name),
                PhaseStatus::Completed | PhaseStatus::Skipped
            )
        })
    }
}
