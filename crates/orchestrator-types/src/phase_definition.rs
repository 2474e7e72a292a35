//! The declarative DAG entry loaded from a workflow file.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Where a declared input's value is sourced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum InputSource {
    /// The session's initial request text.
    UserInput,
    /// The entire current `workflow_state` mapping.
    WorkflowState,
    /// The value at `<key>` in `workflow_state` (empty string if absent).
    WorkflowStateKey { key: String },
    /// A literal value, used verbatim.
    Value { value: String },
}

/// One declared input for a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseInput {
    pub name: String,
    #[serde(flatten)]
    pub source: InputSource,
    /// Name of a registered parser applied to the sourced value before insertion.
    #[serde(default)]
    pub parser: Option<String>,
}

/// Where a declared output is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputDestination {
    /// `workflow_state[output.name]` — the default.
    WorkflowState,
}

impl Default for OutputDestination {
    fn default() -> Self {
        OutputDestination::WorkflowState
    }
}

/// One declared output for a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseOutput {
    pub name: String,
    #[serde(default)]
    pub destination: OutputDestination,
    /// Name of a registered parser applied to the response content before writing.
    #[serde(default)]
    pub parser: Option<String>,
}

/// Declarative, optional, combinable validation rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default)]
    pub min_content_length: Option<usize>,
    #[serde(default)]
    pub required_elements: Vec<String>,
    #[serde(default)]
    pub required_sections: Vec<String>,
    #[serde(default)]
    pub required_files: Vec<String>,
    #[serde(default)]
    pub required_features: Vec<String>,
    #[serde(default)]
    pub required_components: Vec<String>,
    #[serde(default)]
    pub required_endpoints: Vec<String>,
    #[serde(default)]
    pub required_operations: Vec<String>,
    #[serde(default)]
    pub code_quality_check: bool,
    #[serde(default)]
    pub integration_test: bool,
}

impl ValidationRules {
    pub fn is_empty(&self) -> bool {
        self.min_content_length.is_none()
            && self.required_elements.is_empty()
            && self.required_sections.is_empty()
            && self.required_files.is_empty()
            && self.required_features.is_empty()
            && self.required_components.is_empty()
            && self.required_endpoints.is_empty()
            && self.required_operations.is_empty()
            && !self.code_quality_check
            && !self.integration_test
    }
}

/// Retry configuration override for a single phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseRetryConfig {
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// One node in the declarative workflow DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub agent: String,
    pub task_type: String,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub parallel_group: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default = "default_timeout", with = "humantime_duration")]
    pub timeout: Duration,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<PhaseInput>,
    #[serde(default)]
    pub outputs: Vec<PhaseOutput>,
    #[serde(default)]
    pub validation: ValidationRules,
    #[serde(default)]
    pub retry: PhaseRetryConfig,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

/// The full declarative workflow file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub settings: HashMap<String, toml::Value>,
    #[serde(default)]
    pub agents: HashMap<String, toml::Value>,
    pub phases: Vec<PhaseDefinition>,
    #[serde(default)]
    pub conditions: HashMap<String, toml::Value>,
    #[serde(default)]
    pub error_handling: HashMap<String, toml::Value>,
    #[serde(default)]
    pub output: HashMap<String, toml::Value>,
    #[serde(default)]
    pub monitoring: HashMap<String, toml::Value>,
}

impl WorkflowDefinition {
    /// Structural validation performed once at load time, independent of the
    /// closed-grammar condition/parser name checks the engine performs.
    ///
    /// Checks:
    /// - every `depends_on` entry resolves to another phase in this DAG;
    /// - phase names are unique;
    /// - phases sharing a `parallel_group` tag have no mutual dependency.
    pub fn validate_structure(&self) -> Result<(), OrchestratorError> {
        let names: std::collections::HashSet<&str> =
            self.phases.iter().map(|p| p.name.as_str()).collect();
        if names.len() != self.phases.len() {
            return Err(OrchestratorError::Configuration(
                "duplicate phase name in workflow definition".to_string(),
            ));
        }

        for phase in &self.phases {
            for dep in &phase.depends_on {
                if !names.contains(dep.as_str()) {
                    return Err(OrchestratorError::Configuration(format!(
                        "phase '{}' depends_on unknown phase '{}'",
                        phase.name, dep
                    )));
                }
            }
        }

        let mut by_group: HashMap<&str, Vec<&PhaseDefinition>> = HashMap::new();
        for phase in &self.phases {
            if let Some(group) = &phase.parallel_group {
                by_group.entry(group.as_str()).or_default().push(phase);
            }
        }
        for (group, members) in &by_group {
            for a in members {
                for b in members {
                    if a.name == b.name {
                        continue;
                    }
                    if a.depends_on.contains(&b.name) || b.depends_on.contains(&a.name) {
                        return Err(OrchestratorError::Configuration(format!(
                            "parallel group '{group}' contains mutually dependent phases '{}' and '{}'",
                            a.name, b.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(name: &str, depends_on: &[&str]) -> PhaseDefinition {
        PhaseDefinition {
            name: name.to_string(),
            description: String::new(),
            agent: "agent-a".to_string(),
            task_type: "implementation".to_string(),
            parallel: false,
            parallel_group: None,
            required: true,
            enabled: true,
            condition: None,
            timeout: Duration::from_secs(30),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            inputs: vec![],
            outputs: vec![],
            validation: ValidationRules::default(),
            retry: PhaseRetryConfig::default(),
        }
    }

    #[test]
    fn unknown_depends_on_is_configuration_error() {
        let def = WorkflowDefinition {
            name: "wf".into(),
            version: "1".into(),
            description: String::new(),
            settings: HashMap::new(),
            agents: HashMap::new(),
            phases: vec![phase("a", &["ghost"])],
            conditions: HashMap::new(),
            error_handling: HashMap::new(),
            output: HashMap::new(),
            monitoring: HashMap::new(),
        };
        assert!(def.validate_structure().is_err());
    }

    #[test]
    fn mutually_dependent_parallel_group_is_rejected() {
        let mut a = phase("a", &[]);
        a.parallel_group = Some("g".to_string());
        let mut b = phase("b", &["a"]);
        b.parallel_group = Some("g".to_string());

        let def = WorkflowDefinition {
            name: "wf".into(),
            version: "1".into(),
            description: String::new(),
            settings: HashMap::new(),
            agents: HashMap::new(),
            phases: vec![a, b],
            conditions: HashMap::new(),
            error_handling: HashMap::new(),
            output: HashMap::new(),
            monitoring: HashMap::new(),
        };
        assert!(def.validate_structure().is_err());
    }

    #[test]
    fn valid_structure_passes() {
        let def = WorkflowDefinition {
            name: "wf".into(),
            version: "1".into(),
            description: String::new(),
            settings: HashMap::new(),
            agents: HashMap::new(),
            phases: vec![phase("a", &[]), phase("b", &["a"])],
            conditions: HashMap::new(),
            error_handling: HashMap::new(),
            output: HashMap::new(),
            monitoring: HashMap::new(),
        };
        assert!(def.validate_structure().is_ok());
    }

    #[test]
    fn duplicate_phase_names_rejected() {
        let def = WorkflowDefinition {
            name: "wf".into(),
            version: "1".into(),
            description: String::new(),
            settings: HashMap::new(),
            agents: HashMap::new(),
            phases: vec![phase("a", &[]), phase("a", &[])],
            conditions: HashMap::new(),
            error_handling: HashMap::new(),
            output: HashMap::new(),
            monitoring: HashMap::new(),
        };
        assert!(def.validate_structure().is_err());
    }

    #[test]
    fn validation_rules_is_empty_when_default() {
        assert!(ValidationRules::default().is_empty());
    }
}
