//! # orchestrator-docs
//!
//! The Documentation Recorder:
//! an append-only per-session phase log, plus the append-only architecture
//! plan file the Prompt Enhancer reads from for later-phase context.
//!
//! Records are never mutated after being written — `record_phase` only
//! appends a line to a JSONL file, matching the event-log pattern used
//! elsewhere in this workspace for audit trails.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use orchestrator_types::{OrchestratorError, PhaseDocumentation, Result};

const PHASE_LOG_FILE: &str = "phase_documentation.jsonl";
const PLAN_FILE: &str = "architecture_plan.md";

/// Append-only documentation store, rooted at one directory per session.
pub struct DocumentationRecorder {
    root: PathBuf,
}

impl DocumentationRecorder {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(sanitize(session_id))
    }

    /// Append one phase record. Never overwrites or edits a prior record.
    pub fn record_phase(&self, session_id: &str, doc: &PhaseDocumentation) -> Result<()> {
        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir)
            .map_err(|e| OrchestratorError::Dependency(format!("creating docs dir: {e}")))?;

        let path = dir.join(PHASE_LOG_FILE);
        let line = serde_json::to_string(doc)
            .map_err(|e| OrchestratorError::Dependency(format!("serializing phase doc: {e}")))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| OrchestratorError::Dependency(format!("opening phase log {}: {e}", path.display())))?;
        writeln!(file, "{line}")
            .map_err(|e| OrchestratorError::Dependency(format!("writing phase log: {e}")))?;

        log::info!(
            "recorded phase documentation for session={session_id} phase={}",
            doc.phase_name
        );
        Ok(())
    }

    /// All phase records for a session, in the order they were written.
    /// Returns an empty vec if the session has no recorded phases yet.
    pub fn phase_docs(&self, session_id: &str) -> Result<Vec<PhaseDocumentation>> {
        let path = self.session_dir(session_id).join(PHASE_LOG_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| OrchestratorError::Dependency(format!("reading phase log: {e}")))?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| OrchestratorError::Dependency(format!("parsing phase log line: {e}")))
            })
            .collect()
    }

    /// Append a named section to the session's architecture plan file. The
    /// plan file itself is never rewritten, only grown.
    pub fn append_plan_section(&self, session_id: &str, heading: &str, content: &str) -> Result<()> {
        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir)
            .map_err(|e| OrchestratorError::Dependency(format!("creating docs dir: {e}")))?;

        let path = dir.join(PLAN_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| OrchestratorError::Dependency(format!("opening plan file {}: {e}", path.display())))?;
        writeln!(file, "## {heading}\n\n{}\n", content.trim_end())
            .map_err(|e| OrchestratorError::Dependency(format!("writing plan file: {e}")))?;
        Ok(())
    }

    /// The full accumulated plan file, or `None` if no section has been
    /// written yet for this session.
    pub fn architecture_plan(&self, session_id: &str) -> Result<Option<String>> {
        let path = self.session_dir(session_id).join(PLAN_FILE);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| OrchestratorError::Dependency(format!("reading plan file: {e}")))
    }

    /// A coarse implementation guide for one micro-phase: the subset of the
    /// plan file's sections whose heading mentions `phase_id`, joined in
    /// file order. Returns `None` if the plan file is absent or no section
    /// names the phase.
    pub fn implementation_guide(&self, session_id: &str, phase_id: &str) -> Result<Option<String>> {
        let Some(plan) = self.architecture_plan(session_id)? else {
            return Ok(None);
        };
        let mut matched = String::new();
        let mut in_match = false;
        for line in plan.lines() {
            if let Some(heading) = line.strip_prefix("## ") {
                in_match = heading.contains(phase_id);
                if in_match && !matched.is_empty() {
                    matched.push('\n');
                }
            }
            if in_match {
                matched.push_str(line);
                matched.push('\n');
            }
        }
        if matched.is_empty() {
            Ok(None)
        } else {
            Ok(Some(matched))
        }
    }
}

fn sanitize(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
