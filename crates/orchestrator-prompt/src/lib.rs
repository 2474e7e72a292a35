//! # orchestrator-prompt
//!
//! The Prompt Enhancer: a pure function that assembles a final
//! prompt from a base prompt plus prior-phase artifacts and the architecture
//! plan file. It performs no network I/O and never mutates the records it is
//! handed — reading the Documentation Recorder (if any) is the caller's job,
//! not this crate's; `enhance` only composes strings it is given.

use std::collections::HashMap;

use orchestrator_types::{PhaseDocumentation, TaskType};

/// Named context artifacts threaded into a prompt, plus the prior-phase
/// records and plan file an enhancer composes from. Every field here is
/// already-materialized data — no handle back to a store or recorder.
#[derive(Debug, Clone, Default)]
pub struct EnhancementContext<'a> {
    pub session_id: &'a str,
    pub artifacts: &'a HashMap<String, String>,
    pub prior_phase_docs: &'a [PhaseDocumentation],
    pub plan_file: Option<&'a str>,
}

impl<'a> EnhancementContext<'a> {
    pub fn new(session_id: &'a str, artifacts: &'a HashMap<String, String>) -> Self {
        Self { session_id, artifacts, prior_phase_docs: &[], plan_file: None }
    }

    pub fn with_prior_phase_docs(mut self, docs: &'a [PhaseDocumentation]) -> Self {
        self.prior_phase_docs = docs;
        self
    }

    pub fn with_plan_file(mut self, plan_file: &'a str) -> Self {
        self.plan_file = Some(plan_file);
        self
    }
}

/// Task-type-keyed instruction fragments, appended after the base prompt to
/// steer the agent toward the shape the Engine's validation rules expect.
/// Every [`TaskType`] variant has an entry so the match below is
/// exhaustive and can never silently skip a task type.
fn task_type_instruction(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::RequirementsRefinement => {
            "Restate the requirements precisely; call out any ambiguity explicitly."
        }
        TaskType::Brainstorming => {
            "Produce a broad set of distinct feature ideas, not a single narrow solution."
        }
        TaskType::TechnicalPlanning => {
            "Describe the technical architecture in concrete, implementable detail."
        }
        TaskType::PlanComparison => {
            "Compare the candidate plans directly and name every point of disagreement."
        }
        TaskType::Consultation => "Give a direct recommendation, not a list of options.",
        TaskType::Justification => "State the reasoning for the recommendation explicitly.",
        TaskType::Voting => {
            "End the response with a line of the exact form `vote: <option number>`."
        }
        TaskType::Implementation => {
            "Generate complete, compilable code for every file named in the plan. \
             Separate each file with a `===== <filename> =====` delimiter line."
        }
        TaskType::Testing => "Generate tests that exercise the acceptance criteria directly.",
        TaskType::MicroPhasePlanning => {
            "Break the work into small, independently implementable phases with explicit \
             dependencies and acceptance criteria."
        }
        TaskType::MicroPhaseValidation => {
            "Check the implementation against its acceptance criteria one by one."
        }
        TaskType::MicroPhaseImplementation => {
            "Implement only the files this phase owns; respect its declared dependencies."
        }
        TaskType::CodeValidation => "Flag any code that would fail to compile or run.",
        TaskType::StructureValidation => {
            "Check that the project structure matches what the architecture plan names."
        }
        TaskType::GitOperation => "Describe the exact git operation to perform.",
        TaskType::BranchManagement => "Name the branch and its relationship to the base branch.",
        TaskType::PullRequestCreation => "Write a pull request title and description.",
        TaskType::IntegrationValidation => {
            "Check that the integrated components interoperate as the plan describes."
        }
        TaskType::FinalAssembly => "Summarize what was built and any follow-up work remaining.",
    }
}

/// Assemble the final prompt dispatched to an agent: the base prompt, a
/// task-type instruction, the architecture plan file (if supplied), a digest
/// of prior-phase documentation, and any named context artifacts — in that
/// order. Sections with nothing to contribute are omitted entirely rather
/// than emitted empty.
pub fn enhance(base_prompt: &str, task_type: TaskType, ctx: &EnhancementContext) -> String {
    let mut sections = vec![base_prompt.trim_end().to_string()];

    sections.push(format!("Guidance: {}", task_type_instruction(task_type)));

    if let Some(plan) = ctx.plan_file {
        if !plan.is_empty() {
            sections.push(format!("=== Architecture Plan ===\n{plan}"));
        }
    }

    if !ctx.prior_phase_docs.is_empty() {
        let digest = ctx
            .prior_phase_docs
            .iter()
            .map(|doc| format!("- {} ({}): {}", doc.phase_name, doc.status, doc.summary))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("=== Prior Phases ===\n{digest}"));
    }

    if !ctx.artifacts.is_empty() {
        let mut keys: Vec<&String> = ctx.artifacts.keys().collect();
        keys.sort();
        let context = keys
            .into_iter()
            .map(|k| format!("{}:\n{}", k, ctx.artifacts[k]))
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(format!("=== Context ===\n{context}"));
    }

    log::debug!(
        "enhanced prompt for session {} task {:?}: {} section(s)",
        ctx.session_id,
        task_type,
        sections.len()
    );

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn enhance_with_empty_context_still_adds_guidance() {
        let artifacts = HashMap::new();
        let ctx = EnhancementContext::new("s1", &artifacts);
        let out = enhance("do the thing", TaskType::Implementation, &ctx);
        assert!(out.starts_with("do the thing"));
        assert!(out.contains("Guidance:"));
        assert!(!out.contains("=== Context ==="));
    }

    #[test]
    fn enhance_appends_sorted_artifacts() {
        let mut artifacts = HashMap::new();
        artifacts.insert("b".to_string(), "second".to_string());
        artifacts.insert("a".to_string(), "first".to_string());
        let ctx = EnhancementContext::new("s1", &artifacts);
        let out = enhance("base", TaskType::Voting, &ctx);
        let a_pos = out.find("a:\nfirst").unwrap();
        let b_pos = out.find("b:\nsecond").unwrap();
        assert!(a_pos < b_pos);
    }

    #[test]
    fn enhance_includes_plan_file_when_present() {
        let artifacts = HashMap::new();
        let ctx = EnhancementContext::new("s1", &artifacts).with_plan_file("plan contents");
        let out = enhance("base", TaskType::Implementation, &ctx);
        assert!(out.contains("=== Architecture Plan ===\nplan contents"));
    }

    #[test]
    fn enhance_digests_prior_phase_docs() {
        let docs = vec![PhaseDocumentation {
            phase_name: "architecture_design".to_string(),
            phase_type: "architecture".to_string(),
            timestamp: Utc::now(),
            summary: "settled on a REST API".to_string(),
            objectives: vec![],
            deliverables: vec![],
            dependencies: vec![],
            generated_files: vec![],
            status: "completed".to_string(),
            duration_ms: 10,
            agent: "claude".to_string(),
            plan_file_reference: None,
        }];
        let artifacts = HashMap::new();
        let ctx = EnhancementContext::new("s1", &artifacts).with_prior_phase_docs(&docs);
        let out = enhance("base", TaskType::Implementation, &ctx);
        assert!(out.contains("architecture_design (completed): settled on a REST API"));
    }

    #[test]
    fn voting_instruction_mentions_vote_token() {
        let artifacts = HashMap::new();
        let ctx = EnhancementContext::new("s1", &artifacts);
        let out = enhance("base", TaskType::Voting, &ctx);
        assert!(out.to_lowercase().contains("vote:"));
    }
}
