//! An append-only per-session record written by the Documentation Recorder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One append-only record of a completed (or failed) phase.
///
/// Never mutated after write — the Documentation Recorder only appends new
/// records, it never edits or removes existing ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDocumentation {
    pub phase_name: String,
    pub phase_type: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub objectives: Vec<String>,
    pub deliverables: Vec<String>,
    pub dependencies: Vec<String>,
    pub generated_files: Vec<String>,
    pub status: String,
    pub duration_ms: u64,
    pub agent: String,
    #[serde(default)]
    pub plan_file_reference: Option<String>,
}

/// Sanitize a phase name into the cache-key-safe slug used for
/// `phase_documentation_<slug>`.
pub fn documentation_slug(phase_name: &str) -> String {
    phase_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_replaces_spaces() {
        assert_eq!(documentation_slug("Joint Brainstorming"), "joint_brainstorming");
    }

    #[test]
    fn slug_replaces_non_alphanumeric() {
        assert_eq!(documentation_slug("phase-42: setup!"), "phase_42__setup_");
    }
}
