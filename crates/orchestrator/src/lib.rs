//! # orchestrator
//!
//! Agent Orchestrator Core: the Workflow Engine, Micro-Phase Coordinator,
//! Agent Runtime, and Cache/Dependency Layer, wired together behind one
//! typed [`Settings`] file. CLI entry points, a web dashboard, an on-disk
//! code emitter, and a GitHub client are out of scope for this crate (the
//! [`orchestrator_coordinator::RepositoryCollaborator`] trait is the seam a
//! caller plugs one into).
//!
//! ```ignore
//! use orchestrator::{Orchestrator, Settings};
//!
//! let settings = Settings::load_from_workspace(std::path::Path::new("."))?
//!     .unwrap_or_default();
//! let orchestrator = Orchestrator::bootstrap(settings)?;
//! let coordinator = orchestrator.coordinator()?;
//! coordinator.run_session("session-1", &repo_config, "build me a todo app")?;
//! ```
//!
//! ## Modules
//!
//! - [`Settings`] — `.orchestrator.toml` schema: cache/state roots, rate
//!   limit defaults, per-agent provider config, and the coordinator roster.
//! - [`Orchestrator`] — bootstraps the on-disk cache/docs/resume stores and
//!   builds a [`Coordinator`] or [`Engine`] from them.
//! - `orchestrator_types`, `orchestrator_cache`, `orchestrator_agent`,
//!   `orchestrator_engine`, `orchestrator_coordinator` — the component
//!   crates this one wires together; re-exported here for convenience.

mod facade;
mod settings;

pub use facade::Orchestrator;
pub use settings::{AgentSettings, CacheSettings, CoordinatorRoster, Provider, RateLimitSettings, Settings, StateSettings};

pub use orchestrator_agent::{Agent, AgentVariant};
pub use orchestrator_cache::CacheStore;
pub use orchestrator_coordinator::{AgentHandle, Coordinator, CoordinatorAgents, CoordinatorState};
pub use orchestrator_docs::DocumentationRecorder;
pub use orchestrator_engine::Engine;
pub use orchestrator_types::{
    AgentRole, MicroPhase, OrchestratorError, PhaseDefinition, Response, Task, TaskType, WorkflowDefinition, WorkflowState,
};
