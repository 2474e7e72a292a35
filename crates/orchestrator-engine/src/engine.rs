//! The Workflow Engine: loads a declarative DAG and executes it
//! against a `WorkflowState`, fanning parallel groups out across bounded
//! thread chunks.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use orchestrator_agent::Agent;
use orchestrator_types::{
    InputSource, OrchestratorError, PhaseDefinition, PhaseStatus, Response, Task, TaskType,
    WorkflowDefinition, WorkflowState,
};
use serde_json::Value;

use crate::condition::{self, Condition};
use crate::parsers;
use crate::validation;

/// Suitable for ~4 concurrent HTTP requests per agent.
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// One phase plus everything resolved from its declaration at load time:
/// its `TaskType`, and its parsed `condition` (if any). Resolving these once
/// means a malformed DAG fails before any phase runs.
struct CompiledPhase<'a> {
    def: &'a PhaseDefinition,
    task_type: TaskType,
    condition: Option<Condition>,
}

enum PhaseRunResult {
    Completed { name: String, outputs: Vec<(String, String)> },
    Failed { name: String, required: bool, reason: String },
}

pub struct Engine {
    agents: HashMap<String, Arc<Agent>>,
    max_concurrent: usize,
}

impl Engine {
    pub fn new(agents: HashMap<String, Arc<Agent>>) -> Self {
        Self { agents, max_concurrent: DEFAULT_MAX_CONCURRENT }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Execute `workflow` against `state`, seeded with `user_input` as the
    /// `user_input` input source. Returns the final state on success, or the
    /// error that caused a required phase to abort the run.
    pub fn run(
        &self,
        workflow: &WorkflowDefinition,
        mut state: WorkflowState,
        user_input: &str,
    ) -> Result<WorkflowState, OrchestratorError> {
        workflow.validate_structure()?;
        let compiled = self.compile(workflow)?;

        for phase in &compiled {
            if !phase.def.enabled && state.status_of(&phase.def.name) == PhaseStatus::Pending {
                state.set_status(&phase.def.name, PhaseStatus::Skipped);
            }
        }

        loop {
            let remaining: Vec<&CompiledPhase> = compiled
                .iter()
                .filter(|phase| state.status_of(&phase.def.name) == PhaseStatus::Pending)
                .collect();
            if remaining.is_empty() {
                break;
            }

            let ready: Vec<&CompiledPhase> =
                remaining.iter().copied().filter(|phase| is_ready(phase, &state)).collect();
            if ready.is_empty() {
                let blocked: Vec<String> =
                    remaining.iter().map(|phase| describe_blocked(phase, &state)).collect();
                log::warn!(
                    "workflow '{}' blocked for session {}; unmet dependencies: {}",
                    workflow.name,
                    state.session_id,
                    blocked.join("; ")
                );
                break;
            }

            let (sequential, groups) = partition_ready(ready);

            for phase in sequential {
                log::info!("executing phase '{}'", phase.def.name);
                let result = self.run_phase(phase, &state, user_input);
                self.apply_result(&mut state, result)?;
            }

            for (tag, members) in groups {
                log::info!("executing parallel group '{tag}' ({} phase(s))", members.len());
                let results = self.run_parallel_group(&members, &state, user_input);
                for result in results {
                    self.apply_result(&mut state, result)?;
                }
            }
        }

        Ok(state)
    }

    fn compile<'a>(&self, workflow: &'a WorkflowDefinition) -> Result<Vec<CompiledPhase<'a>>, OrchestratorError> {
        workflow
            .phases
            .iter()
            .map(|def| {
                let task_type = parse_task_type(&def.task_type)?;
                if !self.agents.contains_key(&def.agent) {
                    return Err(OrchestratorError::Configuration(format!(
                        "phase '{}' references unknown agent '{}'",
                        def.name, def.agent
                    )));
                }
                let condition = match &def.condition {
                    Some(expr) => {
                        let parsed = Condition::parse(expr)?;
                        condition::validate_known_predicates(&parsed)?;
                        Some(parsed)
                    }
                    None => None,
                };
                for input in &def.inputs {
                    if let Some(parser) = &input.parser {
                        parsers::apply(parser, "")?;
                    }
                }
                for output in &def.outputs {
                    if let Some(parser) = &output.parser {
                        parsers::apply(parser, "")?;
                    }
                }
                Ok(CompiledPhase { def, task_type, condition })
            })
            .collect()
    }

    fn run_phase(&self, phase: &CompiledPhase, state: &WorkflowState, user_input: &str) -> PhaseRunResult {
        let task = match build_task(phase, state, user_input) {
            Ok(task) => task,
            Err(err) => {
                return PhaseRunResult::Failed {
                    name: phase.def.name.clone(),
                    required: phase.def.required,
                    reason: err.to_string(),
                };
            }
        };

        let agent = Arc::clone(self.agents.get(&phase.def.agent).expect("validated at compile time"));
        let response = dispatch(agent, task, phase.def.timeout);

        if !response.success() {
            return PhaseRunResult::Failed {
                name: phase.def.name.clone(),
                required: phase.def.required,
                reason: response.error_message().unwrap_or("agent task failed").to_string(),
            };
        }

        if !phase.def.validation.is_empty() {
            if let Some(reason) = validation::first_violation(response.content(), &phase.def.validation) {
                return PhaseRunResult::Failed { name: phase.def.name.clone(), required: phase.def.required, reason };
            }
        }

        let mut outputs = Vec::with_capacity(phase.def.outputs.len());
        for output in &phase.def.outputs {
            let raw = response.content().to_string();
            let value = match &output.parser {
                Some(name) => match parsers::apply(name, &raw) {
                    Ok(value) => value,
                    Err(err) => {
                        return PhaseRunResult::Failed {
                            name: phase.def.name.clone(),
                            required: phase.def.required,
                            reason: err.to_string(),
                        };
                    }
                },
                None => raw,
            };
            outputs.push((output.name.clone(), value));
        }

        PhaseRunResult::Completed { name: phase.def.name.clone(), outputs }
    }

    fn run_parallel_group(
        &self,
        members: &[&CompiledPhase],
        state: &WorkflowState,
        user_input: &str,
    ) -> Vec<PhaseRunResult> {
        let mut results = Vec::with_capacity(members.len());
        for chunk in members.chunks(self.max_concurrent) {
            let chunk_results: Vec<PhaseRunResult> = thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|phase| scope.spawn(|| self.run_phase(phase, state, user_input)))
                    .collect();
                handles.into_iter().map(|handle| handle.join().expect("phase thread panicked")).collect()
            });
            results.extend(chunk_results);
        }
        results
    }

    fn apply_result(&self, state: &mut WorkflowState, result: PhaseRunResult) -> Result<(), OrchestratorError> {
        match result {
            PhaseRunResult::Completed { name, outputs } => {
                for (key, value) in outputs {
                    state.set_artifact(key, value);
                }
                state.set_status(&name, PhaseStatus::Completed);
                log::info!("phase '{name}' completed");
                Ok(())
            }
            PhaseRunResult::Failed { name, required, reason } => {
                state.record_error(format!("{name}: {reason}"));
                state.set_status(&name, PhaseStatus::Failed);
                if required {
                    log::error!("required phase '{name}' failed: {reason}");
                    Err(OrchestratorError::Validation { phase: name, reason })
                } else {
                    log::warn!("optional phase '{name}' failed: {reason}");
                    Ok(())
                }
            }
        }
    }
}

fn is_ready(phase: &CompiledPhase, state: &WorkflowState) -> bool {
    state.status_of(&phase.def.name) == PhaseStatus::Pending
        && phase.def.enabled
        && state.all_satisfied(&phase.def.depends_on)
        && phase.condition.as_ref().map(|cond| cond.evaluate(state)).unwrap_or(true)
}

fn describe_blocked(phase: &CompiledPhase, state: &WorkflowState) -> String {
    let unmet: Vec<&str> = phase
        .def
        .depends_on
        .iter()
        .filter(|dep| !matches!(state.status_of(dep), PhaseStatus::Completed | PhaseStatus::Skipped))
        .map(String::as_str)
        .collect();
    format!("{} (unmet: {})", phase.def.name, unmet.join(", "))
}

/// Phases without a `parallel_group` tag execute sequentially, in the order
/// they became ready; phases sharing a tag form one group, executed
/// concurrently. Groups retain first-seen order.
fn partition_ready<'a>(
    ready: Vec<&'a CompiledPhase<'a>>,
) -> (Vec<&'a CompiledPhase<'a>>, Vec<(String, Vec<&'a CompiledPhase<'a>>)>) {
    let mut sequential = Vec::new();
    let mut group_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&CompiledPhase>> = HashMap::new();

    for phase in ready {
        match &phase.def.parallel_group {
            Some(tag) => {
                if !groups.contains_key(tag) {
                    group_order.push(tag.clone());
                }
                groups.entry(tag.clone()).or_default().push(phase);
            }
            None => sequential.push(phase),
        }
    }

    let groups = group_order.into_iter().map(|tag| { let members = groups.remove(&tag).unwrap(); (tag, members) }).collect();
    (sequential, groups)
}

fn build_task(phase: &CompiledPhase, state: &WorkflowState, user_input: &str) -> Result<Task, OrchestratorError> {
    let mut prompt_text: Option<String> = None;
    let mut context = HashMap::new();

    for input in &phase.def.inputs {
        let raw = match &input.source {
            InputSource::UserInput => user_input.to_string(),
            InputSource::WorkflowState => {
                serde_json::to_string(&combined_state_map(state))
                    .map_err(|e| OrchestratorError::Configuration(format!("serializing workflow_state: {e}")))?
            }
            InputSource::WorkflowStateKey { key } => state.get_state_key(key),
            InputSource::Value { value } => value.clone(),
        };

        let resolved = match &input.parser {
            Some(name) => parsers::apply(name, &raw)?,
            None => raw,
        };

        if matches!(input.name.as_str(), "refined_requirements" | "user_request" | "prompt") {
            prompt_text = Some(resolved);
        } else {
            let value = serde_json::from_str(&resolved).unwrap_or(Value::String(resolved));
            context.insert(input.name.clone(), value);
        }
    }

    let prompt_text = prompt_text.unwrap_or_else(|| user_input.to_string());

    Ok(Task::new(phase.task_type, prompt_text, state.session_id.clone())
        .with_context(context)
        .with_phase_id(phase.def.name.clone())
        .with_dependencies(phase.def.depends_on.clone()))
}

fn combined_state_map(state: &WorkflowState) -> HashMap<String, String> {
    let mut map = state.inputs.clone();
    map.extend(state.artifacts.clone());
    map
}

fn parse_task_type(raw: &str) -> Result<TaskType, OrchestratorError> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| OrchestratorError::Configuration(format!("unknown task_type '{raw}'")))
}

/// Dispatch a task to its agent, bounding total wall-clock by `timeout`.
/// The agent call runs on its own thread so a hung HTTP round-trip cannot
/// block the rest of the workflow past its phase deadline.
fn dispatch(agent: Arc<Agent>, task: Task, timeout: Duration) -> Response {
    let (tx, rx) = mpsc::channel();
    let task_type = task.task_type();
    let role = agent.role().clone();

    thread::spawn(move || {
        let response = agent.execute_task(&task, None);
        let _ = tx.send(response);
    });

    match rx.recv_timeout(timeout) {
        Ok(response) => response,
        Err(_) => Response::failure(
            format!("phase exceeded timeout of {}", humantime::format_duration(timeout)),
            task_type,
            role,
            HashMap::new(),
        ),
    }
}
