//! A thin seam between the Coordinator and the Agent Runtime.
//!
//! The Coordinator only ever needs `execute_task` and `role` from an agent —
//! it never touches rate limiting, retry, or HTTP directly (that is the
//! Agent Runtime's job). Routing through a trait rather than the concrete
//! `orchestrator_agent::Agent` lets the coordinator's own tests supply a
//! canned [`AgentHandle`] instead of making network calls, the same way the
//! Workflow Engine's tests never drive a real `Agent::execute_task`.

use orchestrator_agent::Agent;
use orchestrator_prompt::EnhancementContext;
use orchestrator_types::{AgentRole, Response, Task};

pub trait AgentHandle: Send + Sync {
    fn execute_task(&self, task: &Task, enhancement: Option<&EnhancementContext<'_>>) -> Response;
    fn role(&self) -> &AgentRole;
}

impl AgentHandle for Agent {
    fn execute_task(&self, task: &Task, enhancement: Option<&EnhancementContext<'_>>) -> Response {
        Agent::execute_task(self, task, enhancement)
    }

    fn role(&self) -> &AgentRole {
        Agent::role(self)
    }
}
