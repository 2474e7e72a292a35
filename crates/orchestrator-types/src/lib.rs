//! # orchestrator-types
//!
//! Shared data model for the agent orchestrator: the `Task`/`Response`
//! contract between the Agent Runtime and its callers, the declarative
//! `PhaseDefinition`/`WorkflowDefinition` DAG format, per-session
//! `WorkflowState`, `MicroPhase` breakdowns, cache entry metadata, and the
//! closed `OrchestratorError` taxonomy.
//!
//! This crate has no I/O and no concurrency primitives of its own — it is
//! the vocabulary every other orchestrator crate shares.

/// Metadata shape for entries in the Cache Store (payload lives elsewhere).
pub mod cache_entry;
/// Append-only phase documentation record.
pub mod documentation;
/// The closed error taxonomy.
pub mod error;
/// Granular per-phase implementation units used by the Coordinator.
pub mod micro_phase;
/// The declarative DAG entry and workflow file format.
pub mod phase_definition;
/// The uniform agent response contract.
pub mod response;
/// The unit of work dispatched to an agent.
pub mod task;
/// Per-session mutable state.
pub mod workflow_state;

pub use cache_entry::{CacheEntryMetadata, CacheEntryOptions, CacheStatus};
pub use documentation::{documentation_slug, PhaseDocumentation};
pub use error::{OrchestratorError, Result};
pub use micro_phase::{check_acyclic, topological_order, MicroPhase};
pub use phase_definition::{
    InputSource, OutputDestination, PhaseDefinition, PhaseInput, PhaseOutput, PhaseRetryConfig,
    ValidationRules, WorkflowDefinition,
};
pub use response::Response;
pub use task::{AgentRole, Task, TaskType};
pub use workflow_state::{PhaseStatus, WorkflowState};
