//! The Micro-Phase Coordinator: drives the fixed eight-state
//! sequence, invoking agents and the out-of-scope collaborators, writing
//! cache entries and documentation records along the way.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use orchestrator_cache::{keys, CacheStore};
use orchestrator_docs::DocumentationRecorder;
use orchestrator_types::{
    check_acyclic, topological_order, CacheEntryOptions, MicroPhase, OrchestratorError,
    PhaseDocumentation, PhaseStatus, Result, Task, TaskType, WorkflowState,
};
use serde_json::{json, Value};

use crate::agent_handle::AgentHandle;
use crate::repository::{InMemoryRepository, RepoConfig, RepositoryCollaborator};
use crate::resume::ResumeStore;
use crate::state::CoordinatorState;
use crate::telemetry::{FailureObservation, LoggingTelemetry, StateCompletedObservation, TelemetryCollaborator};

/// The agents the Coordinator dispatches each state's work to.
///
/// `brainstorm` may hold more than one agent (the "joint" in
/// `joint_brainstorming`: every agent in the list is consulted and every
/// successful response is folded into the artifact). Every other slot is a
/// single agent, matching one fixed role per state.
pub struct CoordinatorAgents {
    pub brainstorm: Vec<Arc<dyn AgentHandle>>,
    pub architect: Arc<dyn AgentHandle>,
    pub reviewer: Arc<dyn AgentHandle>,
    pub planner: Arc<dyn AgentHandle>,
    pub phase_validator: Arc<dyn AgentHandle>,
    pub implementer: Arc<dyn AgentHandle>,
    pub code_validator: Arc<dyn AgentHandle>,
    pub integrator: Arc<dyn AgentHandle>,
}

/// Drives one session through `CoordinatorState::ALL`. Stateless across
/// sessions: all per-session data lives in the `WorkflowState` returned by
/// `run_session`, the cache, and the documentation recorder.
pub struct Coordinator {
    cache: Arc<CacheStore>,
    docs: Arc<DocumentationRecorder>,
    resume: Arc<ResumeStore>,
    repository: Arc<dyn RepositoryCollaborator>,
    telemetry: Arc<dyn TelemetryCollaborator>,
    agents: CoordinatorAgents,
}

impl Coordinator {
    pub fn new(
        cache: Arc<CacheStore>,
        docs: Arc<DocumentationRecorder>,
        resume: Arc<ResumeStore>,
        agents: CoordinatorAgents,
    ) -> Self {
        Self {
            cache,
            docs,
            resume,
            repository: Arc::new(InMemoryRepository::new()),
            telemetry: Arc::new(LoggingTelemetry),
            agents,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn RepositoryCollaborator>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryCollaborator>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Drive `session_id` through every coordinator state. Each state's
    /// handler checks the cache for its canonical artifact before invoking
    /// any agent, so re-running a session with an intact cache performs no
    /// agent calls at all — this holds whether or not a prior
    /// run actually reached that state, which is why the loop always walks
    /// every state rather than jumping to the persisted resume marker.
    pub fn run_session(
        &self,
        session_id: &str,
        repo_config: &RepoConfig,
        user_request: &str,
    ) -> Result<WorkflowState> {
        let marker = self.resume.load(session_id)?;
        if let Some(last) = marker.last_completed {
            log::info!("session {session_id} resuming after state '{}'", last.slug());
        }

        let mut state = WorkflowState::new(session_id);
        state.inputs.insert("user_request".to_string(), user_request.to_string());

        self.run_state(CoordinatorState::RepositorySetup, session_id, &mut state, || {
            let repo_state = self
                .repository
                .setup_project(session_id, repo_config)
                .map_err(|e| OrchestratorError::Dependency(e.to_string()))?;
            serde_json::to_string(&repo_state)
                .map_err(|e| OrchestratorError::Configuration(format!("serializing repo state: {e}")))
        })?;

        self.run_state(CoordinatorState::JointBrainstorming, session_id, &mut state, || {
            self.produce_brainstorming(session_id, user_request)
        })?;

        let features = state.get_state_key("brainstorming_features");
        self.run_state(CoordinatorState::ArchitectureDesign, session_id, &mut state, || {
            self.produce_architecture_design(session_id, user_request, &features)
        })?;

        let plan = state.get_state_key("system_architecture_plan");
        self.run_state(CoordinatorState::ArchitectureReview, session_id, &mut state, || {
            self.produce_architecture_review(session_id, &plan)
        })?;

        let plan = state.get_state_key("system_architecture_plan");
        self.run_state(CoordinatorState::MicroPhasePlanning, session_id, &mut state, || {
            self.produce_micro_phase_planning(session_id, &plan)
        })?;

        let phases = state.get_state_key("project_micro_phases");
        self.run_state(CoordinatorState::MicroPhaseValidation, session_id, &mut state, || {
            self.produce_micro_phase_validation(session_id, &phases)
        })?;

        self.run_iterative_development(session_id, &mut state)?;
        self.resume.mark_completed(session_id, CoordinatorState::IterativeDevelopment)?;

        self.run_state(CoordinatorState::FinalIntegration, session_id, &mut state, || {
            self.produce_final_integration(session_id)
        })?;

        Ok(state)
    }

    /// Shared "check cache, else produce, then cache and document" shape
    /// used by every state except `IterativeDevelopment`.
    fn run_state(
        &self,
        coordinator_state: CoordinatorState,
        session_id: &str,
        state: &mut WorkflowState,
        produce: impl FnOnce() -> Result<String>,
    ) -> Result<()> {
        let key = coordinator_state
            .cache_key()
            .expect("run_state is only called for states with a single canonical cache key");
        let start = Instant::now();

        let (content, cache_hit) = match self.cache.get_validated(key, true)? {
            Some(value) => (unwrap_content(&value), true),
            None => {
                let content = match produce() {
                    Ok(content) => content,
                    Err(err) => {
                        state.set_status(coordinator_state.slug(), PhaseStatus::Failed);
                        state.record_error(format!("{}: {err}", coordinator_state.slug()));
                        self.telemetry.phase_failed(&FailureObservation {
                            phase_name: coordinator_state.slug().to_string(),
                            error_kind: error_kind(&err).to_string(),
                            message: err.to_string(),
                            attempt_count: 1,
                            elapsed: start.elapsed(),
                        });
                        return Err(err);
                    }
                };
                let dependencies = coordinator_state.upstream_keys().into_iter().map(String::from).collect::<Vec<_>>();
                self.cache.set(key, &wrap_content(&content), &dependencies, coordinator_options(session_id))?;
                (content, false)
            }
        };

        state.set_artifact(key, &content);
        state.set_status(coordinator_state.slug(), PhaseStatus::Completed);
        self.docs.record_phase(session_id, &phase_documentation(coordinator_state, &content, cache_hit))?;
        self.resume.mark_completed(session_id, coordinator_state)?;

        self.telemetry.state_completed(&StateCompletedObservation {
            session_id: session_id.to_string(),
            state: coordinator_state.slug().to_string(),
            cache_hit,
            elapsed: start.elapsed(),
        });
        Ok(())
    }

    fn produce_brainstorming(&self, session_id: &str, user_request: &str) -> Result<String> {
        let task = Task::new(TaskType::Brainstorming, user_request, session_id);
        let mut sections = Vec::new();
        for agent in &self.agents.brainstorm {
            let response = agent.execute_task(&task, None);
            if response.success() {
                sections.push(format!("=== {:?} ===\n{}", agent.role(), response.content()));
            } else {
                log::warn!(
                    "brainstorming agent {:?} failed for session {session_id}: {}",
                    agent.role(),
                    response.error_message().unwrap_or("unknown error")
                );
            }
        }
        if sections.is_empty() {
            return Err(OrchestratorError::Validation {
                phase: CoordinatorState::JointBrainstorming.slug().to_string(),
                reason: "no brainstorming agent produced a usable response".to_string(),
            });
        }
        Ok(sections.join("\n\n"))
    }

    fn produce_architecture_design(&self, session_id: &str, user_request: &str, features: &str) -> Result<String> {
        let prompt = format!("User request:\n{user_request}\n\nBrainstormed features:\n{features}");
        let task = Task::new(TaskType::TechnicalPlanning, prompt, session_id);
        let response = self.agents.architect.execute_task(&task, None);
        require_success(&response, CoordinatorState::ArchitectureDesign)?;
        require_validated(response.content(), TaskType::TechnicalPlanning, CoordinatorState::ArchitectureDesign)?;
        self.docs.append_plan_section(session_id, "Architecture", response.content())?;
        Ok(response.content().to_string())
    }

    fn produce_architecture_review(&self, session_id: &str, plan: &str) -> Result<String> {
        let prompt = format!("Review this architecture plan for gaps or risks:\n\n{plan}");
        let task = Task::new(TaskType::Consultation, prompt, session_id);
        let response = self.agents.reviewer.execute_task(&task, None);
        require_success(&response, CoordinatorState::ArchitectureReview)?;
        self.docs.append_plan_section(session_id, "Architecture Review", response.content())?;
        Ok(response.content().to_string())
    }

    fn produce_micro_phase_planning(&self, session_id: &str, plan: &str) -> Result<String> {
        let prompt = format!(
            "Break this architecture plan into micro-phases. Respond with a JSON array matching \
             the MicroPhase schema (id, name, description, phase_type, files_to_generate, \
             dependencies, priority, estimated_duration_minutes, acceptance_criteria, \
             branch_name, implementation_approach):\n\n{plan}"
        );
        let task = Task::new(TaskType::MicroPhasePlanning, prompt, session_id);
        let response = self.agents.planner.execute_task(&task, None);
        require_success(&response, CoordinatorState::MicroPhasePlanning)?;
        let phases = parse_micro_phases(response.content(), CoordinatorState::MicroPhasePlanning)?;
        check_acyclic(&phases).map_err(|e| OrchestratorError::Validation {
            phase: CoordinatorState::MicroPhasePlanning.slug().to_string(),
            reason: e.to_string(),
        })?;
        Ok(response.content().to_string())
    }

    fn produce_micro_phase_validation(&self, session_id: &str, phases_json: &str) -> Result<String> {
        let prompt = format!("Validate this micro-phase breakdown for coverage and ordering:\n\n{phases_json}");
        let task = Task::new(TaskType::MicroPhaseValidation, prompt, session_id);
        let response = self.agents.phase_validator.execute_task(&task, None);
        require_success(&response, CoordinatorState::MicroPhaseValidation)?;
        Ok(response.content().to_string())
    }

    fn produce_final_integration(&self, session_id: &str) -> Result<String> {
        let analytics = self.cache.analytics();
        let recorded = self.docs.phase_docs(session_id)?.len();
        let prompt = format!(
            "Summarize the completed build. {recorded} phase(s) recorded; cache hit rate {:.2}.",
            analytics.hit_rate
        );
        let task = Task::new(TaskType::FinalAssembly, prompt, session_id);
        let response = self.agents.integrator.execute_task(&task, None);
        require_success(&response, CoordinatorState::FinalIntegration)?;

        let integration = self
            .repository
            .finalize_integration(session_id)
            .map_err(|e| OrchestratorError::Dependency(e.to_string()))?;
        Ok(format!(
            "{}\n\nRepository: {}\n{}",
            response.content(),
            integration.repo_url,
            integration.merged_summary
        ))
    }

    /// The `iterative_development` sub-loop: one implement +
    /// validate + commit cycle per micro-phase, in dependency order.
    fn run_iterative_development(&self, session_id: &str, state: &mut WorkflowState) -> Result<()> {
        let start = Instant::now();
        let phases_json = state.get_state_key("project_micro_phases");
        let phases = parse_micro_phases(&phases_json, CoordinatorState::IterativeDevelopment)?;
        // Re-validated here (not just at planning time) because this content
        // may have come from the cache rather than a fresh planner response.
        check_acyclic(&phases).map_err(|e| OrchestratorError::Validation {
            phase: CoordinatorState::IterativeDevelopment.slug().to_string(),
            reason: e.to_string(),
        })?;
        let by_id: HashMap<&str, &MicroPhase> = phases.iter().map(|p| (p.id.as_str(), p)).collect();
        let order = topological_order(&phases);

        let plan_dependencies = vec!["system_architecture_plan".to_string(), "project_micro_phases".to_string()];

        for id in &order {
            // `check_acyclic` above already rejects any dependency that does
            // not resolve to a phase in `phases`, and `topological_order`
            // skips dangling ids defensively; this is still a plain lookup
            // rather than an `expect` so a future change to either can never
            // turn a malformed micro-phase breakdown into a panic here.
            let Some(phase) = by_id.get(id.as_str()) else {
                state.set_status(CoordinatorState::IterativeDevelopment.slug(), PhaseStatus::Failed);
                let reason = format!("topological order referenced unknown micro-phase '{id}'");
                state.record_error(format!("micro-phase '{id}': {reason}"));
                return Err(OrchestratorError::Validation {
                    phase: CoordinatorState::IterativeDevelopment.slug().to_string(),
                    reason,
                });
            };
            let result = self.run_one_micro_phase(session_id, phase, &plan_dependencies);
            if let Err(err) = result {
                state.set_status(CoordinatorState::IterativeDevelopment.slug(), PhaseStatus::Failed);
                state.record_error(format!("micro-phase '{}': {err}", phase.id));
                self.telemetry.phase_failed(&FailureObservation {
                    phase_name: phase.id.clone(),
                    error_kind: error_kind(&err).to_string(),
                    message: err.to_string(),
                    attempt_count: 1,
                    elapsed: start.elapsed(),
                });
                return Err(err);
            }
        }

        state.set_status(CoordinatorState::IterativeDevelopment.slug(), PhaseStatus::Completed);
        self.telemetry.state_completed(&StateCompletedObservation {
            session_id: session_id.to_string(),
            state: CoordinatorState::IterativeDevelopment.slug().to_string(),
            cache_hit: false,
            elapsed: start.elapsed(),
        });
        Ok(())
    }

    fn run_one_micro_phase(&self, session_id: &str, phase: &MicroPhase, plan_dependencies: &[String]) -> Result<()> {
        let generated_key = keys::generated_code(&phase.id);
        let validation_key = keys::validation_report(&phase.id);

        let cached_code = self.cache.get_validated(&generated_key, true)?;
        let cached_validation = self.cache.get_validated(&validation_key, true)?;

        let code_content = match (cached_code, cached_validation) {
            (Some(code), Some(_)) => unwrap_content(&code),
            _ => {
                let guide = self.docs.implementation_guide(session_id, &phase.id)?.unwrap_or_default();
                let prompt = format!(
                    "Micro-phase '{}': {}\nApproach: {}\nFiles to generate: {:?}\nAcceptance criteria: {:?}\n\nImplementation guide:\n{guide}",
                    phase.name, phase.description, phase.implementation_approach, phase.files_to_generate, phase.acceptance_criteria,
                );
                let task = Task::new(TaskType::MicroPhaseImplementation, prompt, session_id)
                    .with_phase_id(phase.id.clone())
                    .with_dependencies(phase.dependencies.clone());
                let response = self.agents.implementer.execute_task(&task, None);
                require_success(&response, CoordinatorState::IterativeDevelopment)?;
                let code = response.content().to_string();
                self.cache.set(&generated_key, &wrap_content(&code), plan_dependencies, implementer_options(session_id))?;

                let validation_prompt = format!(
                    "Validate this implementation against acceptance criteria {:?}:\n\n{code}",
                    phase.acceptance_criteria
                );
                let vtask = Task::new(TaskType::MicroPhaseValidation, validation_prompt, session_id)
                    .with_phase_id(phase.id.clone());
                let vresponse = self.agents.code_validator.execute_task(&vtask, None);
                require_success(&vresponse, CoordinatorState::IterativeDevelopment)?;
                self.cache.set(
                    &validation_key,
                    &wrap_content(vresponse.content()),
                    &[generated_key.clone()],
                    implementer_options(session_id),
                )?;
                code
            }
        };

        let filename = phase.files_to_generate.first().cloned().unwrap_or_else(|| format!("{}.txt", phase.id));
        let mut files = HashMap::new();
        files.insert(filename, code_content);
        self.repository
            .execute_micro_phase_workflow(session_id, phase, &files)
            .map_err(|e| OrchestratorError::Dependency(e.to_string()))?;

        self.docs.record_phase(
            session_id,
            &PhaseDocumentation {
                phase_name: phase.id.clone(),
                phase_type: phase.phase_type.clone(),
                timestamp: Utc::now(),
                summary: format!("implemented and validated micro-phase '{}'", phase.name),
                objectives: vec![phase.description.clone()],
                deliverables: phase.files_to_generate.clone(),
                dependencies: phase.dependencies.clone(),
                generated_files: phase.files_to_generate.clone(),
                status: "completed".to_string(),
                duration_ms: 0,
                agent: format!("{:?}", self.agents.implementer.role()),
                plan_file_reference: None,
            },
        )?;
        Ok(())
    }
}

fn coordinator_options(session_id: &str) -> CacheEntryOptions {
    CacheEntryOptions {
        agent_type: "coordinator".to_string(),
        session_id: session_id.to_string(),
        validation_status: "valid".to_string(),
        file_count: 1,
        tags: vec!["coordinator".to_string()],
    }
}

fn implementer_options(session_id: &str) -> CacheEntryOptions {
    CacheEntryOptions {
        agent_type: "implementer".to_string(),
        session_id: session_id.to_string(),
        validation_status: "valid".to_string(),
        file_count: 1,
        tags: vec!["micro-phase".to_string()],
    }
}

fn wrap_content(content: &str) -> Value {
    json!({ "content": content })
}

/// Payload envelope readback: either a bare `{"content": ...}`
/// wrapper, or — for entries written outside this crate — any other JSON
/// value, re-serialized as text.
fn unwrap_content(value: &Value) -> String {
    match value.get("content").and_then(Value::as_str) {
        Some(text) => text.to_string(),
        None => value.to_string(),
    }
}

fn require_success(response: &orchestrator_types::Response, state: CoordinatorState) -> Result<()> {
    if response.success() {
        Ok(())
    } else {
        Err(OrchestratorError::Validation {
            phase: state.slug().to_string(),
            reason: response.error_message().unwrap_or("agent task failed").to_string(),
        })
    }
}

fn require_validated(content: &str, task_type: TaskType, state: CoordinatorState) -> Result<()> {
    if orchestrator_agent::validate_response(content, task_type) {
        Ok(())
    } else {
        Err(OrchestratorError::Validation {
            phase: state.slug().to_string(),
            reason: "response failed task-type shape validation".to_string(),
        })
    }
}

fn parse_micro_phases(content: &str, state: CoordinatorState) -> Result<Vec<MicroPhase>> {
    serde_json::from_str(content).map_err(|e| OrchestratorError::Validation {
        phase: state.slug().to_string(),
        reason: format!("malformed micro-phase breakdown: {e}"),
    })
}

fn phase_documentation(state: CoordinatorState, content: &str, cache_hit: bool) -> PhaseDocumentation {
    PhaseDocumentation {
        phase_name: state.slug().to_string(),
        phase_type: state.slug().to_string(),
        timestamp: Utc::now(),
        summary: if cache_hit {
            format!("reused cached artifact for '{}'", state.slug())
        } else {
            format!("produced artifact for '{}' ({} bytes)", state.slug(), content.len())
        },
        objectives: vec![],
        deliverables: vec![],
        dependencies: state.upstream_keys().into_iter().map(String::from).collect(),
        generated_files: vec![],
        status: "completed".to_string(),
        duration_ms: 0,
        agent: "coordinator".to_string(),
        plan_file_reference: Some("architecture_plan.md".to_string()),
    }
}

fn error_kind(err: &OrchestratorError) -> &'static str {
    match err {
        OrchestratorError::Transport(_) => "transport",
        OrchestratorError::Protocol(_) => "protocol",
        OrchestratorError::Validation { .. } => "validation",
        OrchestratorError::Dependency(_) => "dependency",
        OrchestratorError::Timeout { .. } => "timeout",
        OrchestratorError::Configuration(_) => "configuration",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_handle::fake::FakeAgent;
    use orchestrator_types::AgentRole;

    fn ok_response(content: &str, task_type: TaskType) -> orchestrator_types::Response {
        orchestrator_types::Response::success(content, task_type, AgentRole::Manager, HashMap::new())
    }

    fn fail_response(task_type: TaskType) -> orchestrator_types::Response {
        orchestrator_types::Response::failure("mock failure", task_type, AgentRole::Manager, HashMap::new())
    }

    fn micro_phases_json() -> String {
        serde_json::to_string(&vec![MicroPhase {
            id: "phase-1".to_string(),
            name: "Auth".to_string(),
            description: "Implement auth".to_string(),
            phase_type: "backend".to_string(),
            files_to_generate: vec!["src/auth.rs".to_string()],
            dependencies: vec![],
            priority: 1,
            estimated_duration_minutes: 30,
            acceptance_criteria: vec!["logs in a user".to_string()],
            branch_name: "feature/auth".to_string(),
            implementation_approach: "JWT".to_string(),
        }])
        .unwrap()
    }

    fn harness() -> (Coordinator, tempfile::TempDir, Arc<FakeAgent>, Arc<FakeAgent>) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheStore::open(dir.path().join("cache")).unwrap());
        let docs = Arc::new(DocumentationRecorder::open(dir.path().join("docs")));
        let resume = Arc::new(ResumeStore::open(dir.path().join("resume")).unwrap());

        let brainstorm = Arc::new(FakeAgent::new(
            AgentRole::ProjectManagerConsultant,
            vec![ok_response("lots of ideas", TaskType::Brainstorming)],
        ));
        let architect = Arc::new(FakeAgent::new(
            AgentRole::FullstackDeveloper,
            vec![ok_response(&"a".repeat(200), TaskType::TechnicalPlanning)],
        ));
        let reviewer = Arc::new(FakeAgent::new(AgentRole::Manager, vec![ok_response("looks solid", TaskType::Consultation)]));
        let planner = Arc::new(FakeAgent::new(
            AgentRole::Manager,
            vec![ok_response(&micro_phases_json(), TaskType::MicroPhasePlanning)],
        ));
        let phase_validator =
            Arc::new(FakeAgent::new(AgentRole::Validator, vec![ok_response("breakdown is sound", TaskType::MicroPhaseValidation)]));
        let implementer = Arc::new(FakeAgent::new(
            AgentRole::FullstackDeveloper,
            vec![ok_response("fn login() {}", TaskType::MicroPhaseImplementation)],
        ));
        let code_validator =
            Arc::new(FakeAgent::new(AgentRole::Validator, vec![ok_response("meets criteria", TaskType::MicroPhaseValidation)]));
        let integrator =
            Arc::new(FakeAgent::new(AgentRole::IntegrationAgent, vec![ok_response("all good", TaskType::FinalAssembly)]));

        let agents = CoordinatorAgents {
            brainstorm: vec![brainstorm.clone()],
            architect,
            reviewer,
            planner,
            phase_validator,
            implementer: implementer.clone(),
            code_validator,
            integrator,
        };

        let coordinator = Coordinator::new(cache, docs, resume, agents);
        (coordinator, dir, brainstorm, implementer)
    }

    #[test]
    fn full_session_completes_all_states() {
        let (coordinator, _dir, _brainstorm, _implementer) = harness();
        let repo_config = RepoConfig { project_name: "demo".to_string(), description: String::new() };
        let state = coordinator.run_session("s1", &repo_config, "build me a todo app").unwrap();

        for coordinator_state in CoordinatorState::ALL {
            assert_eq!(state.status_of(coordinator_state.slug()), PhaseStatus::Completed);
        }
        assert!(state.get_state_key("final_integration_summary").contains("all good"));
    }

    #[test]
    fn rerun_with_intact_cache_performs_zero_agent_calls() {
        let (coordinator, _dir, brainstorm, implementer) = harness();
        let repo_config = RepoConfig { project_name: "demo".to_string(), description: String::new() };
        coordinator.run_session("s1", &repo_config, "build me a todo app").unwrap();

        assert_eq!(brainstorm.call_count(), 1);
        assert_eq!(implementer.call_count(), 1);

        let second = coordinator.run_session("s1", &repo_config, "build me a todo app").unwrap();

        assert_eq!(brainstorm.call_count(), 1, "brainstorming must not be re-invoked on a cache hit");
        assert_eq!(implementer.call_count(), 1, "implementer must not be re-invoked on a cache hit");
        assert!(second.get_state_key("final_integration_summary").contains("all good"));
    }

    #[test]
    fn required_phase_failure_aborts_without_caching() {
        let (coordinator, _dir, _brainstorm, _implementer) = harness();
        // Swap the architect for one that always fails.
        let failing_architect = Arc::new(FakeAgent::new(
            AgentRole::FullstackDeveloper,
            vec![fail_response(TaskType::TechnicalPlanning)],
        ));

        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheStore::open(dir.path().join("cache")).unwrap());
        let docs = Arc::new(DocumentationRecorder::open(dir.path().join("docs")));
        let resume = Arc::new(ResumeStore::open(dir.path().join("resume")).unwrap());
        let brainstorm = Arc::new(FakeAgent::new(
            AgentRole::ProjectManagerConsultant,
            vec![ok_response("ideas", TaskType::Brainstorming)],
        ));
        let agents = CoordinatorAgents {
            brainstorm: vec![brainstorm],
            architect: failing_architect,
            reviewer: Arc::new(FakeAgent::new(AgentRole::Manager, vec![ok_response("x", TaskType::Consultation)])),
            planner: Arc::new(FakeAgent::new(AgentRole::Manager, vec![ok_response("[]", TaskType::MicroPhasePlanning)])),
            phase_validator: Arc::new(FakeAgent::new(AgentRole::Validator, vec![ok_response("x", TaskType::MicroPhaseValidation)])),
            implementer: Arc::new(FakeAgent::new(AgentRole::FullstackDeveloper, vec![ok_response("x", TaskType::MicroPhaseImplementation)])),
            code_validator: Arc::new(FakeAgent::new(AgentRole::Validator, vec![ok_response("x", TaskType::MicroPhaseValidation)])),
            integrator: Arc::new(FakeAgent::new(AgentRole::IntegrationAgent, vec![ok_response("x", TaskType::FinalAssembly)])),
        };
        let coordinator = Coordinator::new(cache.clone(), docs, resume, agents);

        let repo_config = RepoConfig { project_name: "demo".to_string(), description: String::new() };
        let result = coordinator.run_session("s1", &repo_config, "build me a todo app");
        assert!(result.is_err());
        assert!(cache.get("system_architecture_plan").unwrap().is_none());
    }

    #[test]
    fn unwrap_content_falls_back_to_raw_json_for_foreign_payloads() {
        assert_eq!(unwrap_content(&json!({"content": "hi"})), "hi");
        assert_eq!(unwrap_content(&json!({"other": 1})), "{\"other\":1}");
    }

    #[test]
    fn dangling_micro_phase_dependency_fails_the_session_instead_of_panicking() {
        let (coordinator, _dir, _brainstorm, _implementer) = harness();

        let phases = vec![MicroPhase {
            id: "phase-1".to_string(),
            name: "Auth".to_string(),
            description: "Implement auth".to_string(),
            phase_type: "backend".to_string(),
            files_to_generate: vec!["src/auth.rs".to_string()],
            dependencies: vec!["phase-ghost".to_string()],
            priority: 1,
            estimated_duration_minutes: 30,
            acceptance_criteria: vec!["logs in a user".to_string()],
            branch_name: "feature/auth".to_string(),
            implementation_approach: "JWT".to_string(),
        }];
        coordinator
            .cache
            .set(
                "project_micro_phases",
                &wrap_content(&serde_json::to_string(&phases).unwrap()),
                &["system_architecture_plan".to_string()],
                coordinator_options("s1"),
            )
            .unwrap();

        let repo_config = RepoConfig { project_name: "demo".to_string(), description: String::new() };
        let result = coordinator.run_session("s1", &repo_config, "build me a todo app");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("phase-ghost"));
    }
}
