//! # orchestrator-coordinator
//!
//! The Micro-Phase Coordinator: drives a fixed eight-state
//! sequence — repository setup, joint brainstorming, architecture design and
//! review, micro-phase planning and validation, iterative development, and
//! final integration — caching each state's artifact and recording
//! documentation along the way.

mod agent_handle;
mod coordinator;
mod repository;
mod resume;
mod state;
mod telemetry;

pub use agent_handle::AgentHandle;
pub use coordinator::{Coordinator, CoordinatorAgents};
pub use repository::{
    InMemoryRepository, IntegrationOutcome, MicroPhaseCommitOutcome, RepoConfig, RepoState,
    RepositoryCollaborator,
};
pub use resume::ResumeStore;
pub use state::{CoordinatorState, ResumeMarker};
pub use telemetry::{FailureObservation, LoggingTelemetry, StateCompletedObservation, TelemetryCollaborator};

#[cfg(test)]
pub use agent_handle::fake::FakeAgent;
