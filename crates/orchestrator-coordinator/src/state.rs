//! The Micro-Phase Coordinator's fixed, ordered state machine.
//!
//! Unlike the declarative Workflow Engine, this sequence is not data-driven:
//! every session walks the same eight states in the same order. Each state
//! owns one canonical cache key (its artifact) and, for states after the
//! first, a dependency edge back onto the state(s) it was produced from.

use orchestrator_types::PhaseStatus;
use serde::{Deserialize, Serialize};

/// One state in the coordinator's fixed sequence.
///
/// `ALL` gives the transition table; `next()` walks it. `iterative_development`
/// is the only state with an internal sub-loop (over `MicroPhase`s) rather
/// than a single artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    RepositorySetup,
    JointBrainstorming,
    ArchitectureDesign,
    ArchitectureReview,
    MicroPhasePlanning,
    MicroPhaseValidation,
    IterativeDevelopment,
    FinalIntegration,
}

impl CoordinatorState {
    /// The fixed ordered transition table.
    pub const ALL: [CoordinatorState; 8] = [
        CoordinatorState::RepositorySetup,
        CoordinatorState::JointBrainstorming,
        CoordinatorState::ArchitectureDesign,
        CoordinatorState::ArchitectureReview,
        CoordinatorState::MicroPhasePlanning,
        CoordinatorState::MicroPhaseValidation,
        CoordinatorState::IterativeDevelopment,
        CoordinatorState::FinalIntegration,
    ];

    /// The state that follows this one, or `None` after `FinalIntegration`.
    pub fn next(self) -> Option<CoordinatorState> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Stable lowercase identifier, used for `PhaseDocumentation::phase_name`
    /// and for persisting "last completed state" across a resume.
    pub fn slug(self) -> &'static str {
        match self {
            CoordinatorState::RepositorySetup => "repository_setup",
            CoordinatorState::JointBrainstorming => "joint_brainstorming",
            CoordinatorState::ArchitectureDesign => "architecture_design",
            CoordinatorState::ArchitectureReview => "architecture_review",
            CoordinatorState::MicroPhasePlanning => "micro_phase_planning",
            CoordinatorState::MicroPhaseValidation => "micro_phase_validation",
            CoordinatorState::IterativeDevelopment => "iterative_development",
            CoordinatorState::FinalIntegration => "final_integration",
        }
    }

    /// The well-known cache key this state's artifact is written under.
    /// `IterativeDevelopment` has no single artifact of its own — its
    /// per-micro-phase keys are built by [`orchestrator_cache::keys`].
    pub fn cache_key(self) -> Option<&'static str> {
        match self {
            CoordinatorState::RepositorySetup => Some("repository_setup_state"),
            CoordinatorState::JointBrainstorming => Some("brainstorming_features"),
            CoordinatorState::ArchitectureDesign => Some("system_architecture_plan"),
            CoordinatorState::ArchitectureReview => Some("architecture_review"),
            CoordinatorState::MicroPhasePlanning => Some("project_micro_phases"),
            CoordinatorState::MicroPhaseValidation => Some("micro_phase_validation"),
            CoordinatorState::IterativeDevelopment => None,
            CoordinatorState::FinalIntegration => Some("final_integration_summary"),
        }
    }

    /// The cache keys this state's artifact depends on — every prior
    /// state's own artifact key, so invalidating any upstream state
    /// cascades forward.
    pub fn upstream_keys(self) -> Vec<&'static str> {
        CoordinatorState::ALL
            .iter()
            .take_while(|s| **s != self)
            .filter_map(|s| s.cache_key())
            .collect()
    }
}

/// The last-completed coordinator state, persisted alongside the cache so a
/// resumed run does not rely solely on the presence of a well-known cache
/// key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeMarker {
    pub session_id: String,
    pub last_completed: Option<CoordinatorState>,
}

impl ResumeMarker {
    pub fn fresh(session_id: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), last_completed: None }
    }

    /// The state a resumed session should start from: the one after
    /// `last_completed`, or the very first state if nothing completed yet.
    pub fn resume_from(&self) -> CoordinatorState {
        match self.last_completed {
            Some(state) => state.next().unwrap_or(CoordinatorState::FinalIntegration),
            None => CoordinatorState::ALL[0],
        }
    }
}

/// Map a coordinator state onto the [`PhaseStatus`] vocabulary shared with
/// the declarative engine, so both report through the same `WorkflowState`
/// shape when a caller wants one combined view of a session.
pub fn status_for_outcome(succeeded: bool) -> PhaseStatus {
    if succeeded { PhaseStatus::Completed } else { PhaseStatus::Failed }
}
