//! The unit of work dispatched to an agent.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of task shapes an agent may be asked to perform.
///
/// Carried in full (rather than collapsed) because the validation-rule
/// dispatch in the Workflow Engine and the temperature policy in the Agent
/// Runtime both key off of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    RequirementsRefinement,
    Brainstorming,
    TechnicalPlanning,
    PlanComparison,
    Consultation,
    Justification,
    Voting,
    Implementation,
    Testing,
    MicroPhasePlanning,
    MicroPhaseValidation,
    MicroPhaseImplementation,
    CodeValidation,
    StructureValidation,
    GitOperation,
    BranchManagement,
    PullRequestCreation,
    IntegrationValidation,
    FinalAssembly,
}

impl TaskType {
    /// The task types every baseline agent is expected to support.
    pub const BASELINE_CAPABILITIES: &'static [TaskType] = &[
        TaskType::RequirementsRefinement,
        TaskType::TechnicalPlanning,
        TaskType::PlanComparison,
        TaskType::Justification,
        TaskType::Voting,
        TaskType::Implementation,
        TaskType::Testing,
    ];
}

/// A role an agent plays within the workflow (used for logging and for
/// `Response::agent_role`, not for dispatch — dispatch keys off an agent's
/// configured `agent_key` string in the declarative workflow).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    ProjectManagerConsultant,
    FullstackDeveloper,
    Manager,
    Validator,
    GitAgent,
    IntegrationAgent,
}

/// An immutable unit of work dispatched to an agent.
///
/// `(session_id, phase_id)` uniquely identifies a unit of work within a
/// session. Construct via [`Task::new`]; fields are only reachable through
/// accessors after construction so the struct cannot be mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    task_type: TaskType,
    prompt_text: String,
    context: HashMap<String, Value>,
    requirements: HashMap<String, Value>,
    session_id: String,
    phase_id: Option<String>,
    dependencies: Vec<String>,
}

impl Task {
    /// Build a new task. `context` and `requirements` are opaque key/value
    /// bags threaded through to the agent and its prompt formatter.
    pub fn new(
        task_type: TaskType,
        prompt_text: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            task_type,
            prompt_text: prompt_text.into(),
            context: HashMap::new(),
            requirements: HashMap::new(),
            session_id: session_id.into(),
            phase_id: None,
            dependencies: Vec::new(),
        }
    }

    /// Attach context entries (builder-style; consumes and returns `self`).
    pub fn with_context(mut self, context: HashMap<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Attach requirement entries (builder-style; consumes and returns `self`).
    pub fn with_requirements(mut self, requirements: HashMap<String, Value>) -> Self {
        self.requirements = requirements;
        self
    }

    /// Attach a phase id, making this task address a specific DAG phase.
    pub fn with_phase_id(mut self, phase_id: impl Into<String>) -> Self {
        self.phase_id = Some(phase_id.into());
        self
    }

    /// Attach a list of phase ids this task depends on.
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    pub fn context(&self) -> &HashMap<String, Value> {
        &self.context
    }

    pub fn requirements(&self) -> &HashMap<String, Value> {
        &self.requirements
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn phase_id(&self) -> Option<&str> {
        self.phase_id.as_deref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// The identity of the unit of work within a session: `(session_id, phase_id)`.
    pub fn identity(&self) -> (&str, Option<&str>) {
        (&self.session_id, self.phase_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_all_fields() {
        let mut ctx = HashMap::new();
        ctx.insert("foo".to_string(), Value::String("bar".to_string()));

        let task = Task::new(TaskType::Implementation, "do the thing", "session-1")
            .with_context(ctx.clone())
            .with_phase_id("phase-1")
            .with_dependencies(vec!["phase-0".to_string()]);

        assert_eq!(task.task_type(), TaskType::Implementation);
        assert_eq!(task.prompt_text(), "do the thing");
        assert_eq!(task.context(), &ctx);
        assert_eq!(task.session_id(), "session-1");
        assert_eq!(task.phase_id(), Some("phase-1"));
        assert_eq!(task.dependencies(), &["phase-0".to_string()]);
        assert_eq!(task.identity(), ("session-1", Some("phase-1")));
    }

    #[test]
    fn identity_without_phase_id() {
        let task = Task::new(TaskType::Voting, "vote", "session-2");
        assert_eq!(task.identity(), ("session-2", None));
    }

    #[test]
    fn baseline_capabilities_exclude_micro_phase_task_types() {
        assert!(!TaskType::BASELINE_CAPABILITIES.contains(&TaskType::MicroPhaseImplementation));
        assert!(TaskType::BASELINE_CAPABILITIES.contains(&TaskType::Implementation));
    }

    #[test]
    fn task_round_trips_through_json() {
        let task = Task::new(TaskType::Brainstorming, "ideate", "session-3");
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task_type(), TaskType::Brainstorming);
        assert_eq!(back.prompt_text(), "ideate");
    }
}
