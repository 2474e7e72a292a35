//! # orchestrator-engine
//!
//! The Workflow Engine: loads a declarative TOML DAG and drives
//! it to completion, dispatching each phase to its configured agent and
//! threading outputs forward through `WorkflowState`.

mod condition;
mod engine;
mod parsers;
mod validation;

pub use condition::Condition;
pub use engine::Engine;
