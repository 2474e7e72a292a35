//! TOML-based settings for an orchestrator deployment (`.orchestrator.toml`).
//!
//! One top-level struct with nested, `#[serde(default)]`-annotated
//! sections, loaded either from an explicit path or by searching a
//! workspace root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use orchestrator_retry::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Cache Store placement and default entry lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_root")]
    pub root: PathBuf,
    #[serde(default = "default_expiry_hours")]
    pub default_expiry_hours: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { root: default_cache_root(), default_expiry_hours: default_expiry_hours() }
    }
}

fn default_cache_root() -> PathBuf {
    PathBuf::from(".orchestrator/cache")
}

fn default_expiry_hours() -> i64 {
    24
}

/// Documentation Recorder and resume-marker placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSettings {
    #[serde(default = "default_docs_root")]
    pub docs_root: PathBuf,
    #[serde(default = "default_resume_root")]
    pub resume_root: PathBuf,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self { docs_root: default_docs_root(), resume_root: default_resume_root() }
    }
}

fn default_docs_root() -> PathBuf {
    PathBuf::from(".orchestrator/docs")
}

fn default_resume_root() -> PathBuf {
    PathBuf::from(".orchestrator/resume")
}

/// Dual-window rate-limit defaults applied to every agent that does not
/// override them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            requests_per_hour: default_requests_per_hour(),
        }
    }
}

fn default_requests_per_minute() -> u32 {
    50
}

fn default_requests_per_hour() -> u32 {
    1000
}

/// The LLM provider an [`AgentSettings`] entry dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
}

/// One configured agent: provider endpoint, model, and the environment
/// variable its API key is read from at bootstrap time. Keys are never
/// stored in the settings file itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub provider: Provider,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    pub api_key_env: String,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    #[serde(default)]
    pub rate_limit: Option<RateLimitSettings>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Which configured agent (by name in [`Settings::agents`]) fills each
/// Micro-Phase Coordinator slot. `brainstorm` is a list because
/// joint brainstorming fans a prompt out across every listed agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorRoster {
    #[serde(default)]
    pub brainstorm: Vec<String>,
    pub architect: String,
    pub reviewer: String,
    pub planner: String,
    pub phase_validator: String,
    pub implementer: String,
    pub code_validator: String,
    pub integrator: String,
}

/// Top-level settings file, loaded from `.orchestrator.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub state: StateSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub agents: HashMap<String, AgentSettings>,
    #[serde(default)]
    pub coordinator: CoordinatorRoster,
    /// Path to a declarative workflow file, for callers driving
    /// the Workflow Engine instead of (or alongside) the Coordinator.
    #[serde(default)]
    pub workflow_file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from `workspace_root/.orchestrator.toml`. Returns
    /// `Ok(None)` if no config file exists there.
    pub fn load_from_workspace(workspace_root: &Path) -> Result<Option<Self>> {
        let config_path = workspace_root.join(".orchestrator.toml");
        if !config_path.exists() {
            return Ok(None);
        }
        Self::load_from_file(&config_path).map(Some)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("parsing settings file: {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Structural checks beyond what serde's `#[serde(default)]` already
    /// guarantees: every coordinator slot must name a configured agent.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.requests_per_minute == 0 {
            bail!("rate_limit.requests_per_minute must be greater than 0");
        }
        if self.rate_limit.requests_per_hour == 0 {
            bail!("rate_limit.requests_per_hour must be greater than 0");
        }
        if self.cache.default_expiry_hours <= 0 {
            bail!("cache.default_expiry_hours must be greater than 0");
        }

        let roster = &self.coordinator;
        if roster.brainstorm.is_empty() {
            bail!("coordinator.brainstorm must name at least one agent");
        }
        let slots = roster
            .brainstorm
            .iter()
            .map(String::as_str)
            .chain([
                roster.architect.as_str(),
                roster.reviewer.as_str(),
                roster.planner.as_str(),
                roster.phase_validator.as_str(),
                roster.implementer.as_str(),
                roster.code_validator.as_str(),
                roster.integrator.as_str(),
            ]);
        for name in slots {
            if !self.agents.contains_key(name) {
                bail!("coordinator roster names unconfigured agent '{name}'");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
        [agents.architect]
        provider = "anthropic"
        model = "claude-3"
        api_key_env = "ANTHROPIC_API_KEY"

        [agents.planner]
        provider = "openai"
        model = "gpt-4"
        api_key_env = "OPENAI_API_KEY"

        [coordinator]
        brainstorm = ["architect", "planner"]
        architect = "architect"
        reviewer = "architect"
        planner = "planner"
        phase_validator = "planner"
        implementer = "planner"
        code_validator = "architect"
        integrator = "architect"
        "#
    }

    #[test]
    fn parses_minimal_settings_with_defaults() {
        let settings: Settings = toml::from_str(sample_toml()).unwrap();
        assert_eq!(settings.cache.default_expiry_hours, 24);
        assert_eq!(settings.rate_limit.requests_per_minute, 50);
        assert_eq!(settings.agents.len(), 2);
        settings.validate().unwrap();
    }

    #[test]
    fn validate_rejects_unconfigured_roster_slot() {
        let mut settings: Settings = toml::from_str(sample_toml()).unwrap();
        settings.coordinator.integrator = "missing-agent".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_brainstorm_roster() {
        let mut settings: Settings = toml::from_str(sample_toml()).unwrap();
        settings.coordinator.brainstorm.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn load_from_workspace_returns_none_without_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load_from_workspace(dir.path()).unwrap().is_none());
    }

    #[test]
    fn load_from_file_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".orchestrator.toml");
        std::fs::write(&path, sample_toml()).unwrap();
        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.agents.len(), 2);
    }
}
