//! The uniform result of `Agent::execute_task`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::{AgentRole, TaskType};

/// Result of dispatching a [`crate::Task`] to an agent.
///
/// Exactly one of `success=true` with non-empty content, or `success=false`
/// with an error message, holds. The two constructors enforce this; there is
/// no public struct literal, so callers cannot construct an invalid instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    content: String,
    task_type: TaskType,
    agent_role: AgentRole,
    metadata: HashMap<String, Value>,
    timestamp: DateTime<Utc>,
    success: bool,
    error_message: Option<String>,
}

impl Response {
    /// Build a successful response. Panics if `content` is empty — a success
    /// response with no content violates the Response invariant and callers
    /// should not need to handle it as a runtime error.
    pub fn success(
        content: impl Into<String>,
        task_type: TaskType,
        agent_role: AgentRole,
        metadata: HashMap<String, Value>,
    ) -> Self {
        let content = content.into();
        assert!(
            !content.is_empty(),
            "Response::success requires non-empty content"
        );
        Self {
            content,
            task_type,
            agent_role,
            metadata,
            timestamp: Utc::now(),
            success: true,
            error_message: None,
        }
    }

    /// Build a failure response. Panics if `error_message` is empty.
    pub fn failure(
        error_message: impl Into<String>,
        task_type: TaskType,
        agent_role: AgentRole,
        metadata: HashMap<String, Value>,
    ) -> Self {
        let error_message = error_message.into();
        assert!(
            !error_message.is_empty(),
            "Response::failure requires a non-empty error_message"
        );
        Self {
            content: String::new(),
            task_type,
            agent_role,
            metadata,
            timestamp: Utc::now(),
            success: false,
            error_message: Some(error_message),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn agent_role(&self) -> &AgentRole {
        &self.agent_role
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}
