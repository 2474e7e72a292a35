//! The bootstrap facade: turns a loaded [`Settings`] into a wired-up
//! [`Coordinator`] and [`Engine`], building an embeddable value rather than
//! driving a CLI, since CLI entry points are out of scope here.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use orchestrator_agent::{Agent, AgentVariant};
use orchestrator_cache::CacheStore;
use orchestrator_coordinator::{Coordinator, CoordinatorAgents, ResumeStore};
use orchestrator_docs::DocumentationRecorder;
use orchestrator_engine::Engine;
use orchestrator_types::{AgentRole, WorkflowDefinition};

use crate::settings::{AgentSettings, Provider, Settings};

fn build_agent(name: &str, settings: &AgentSettings, defaults: &Settings, role: AgentRole) -> Result<Agent> {
    let api_key = std::env::var(&settings.api_key_env)
        .with_context(|| format!("agent '{name}': environment variable '{}' is not set", settings.api_key_env))?;

    let base_url = settings.base_url.clone().unwrap_or_else(|| default_base_url(settings.provider).to_string());
    let variant = match settings.provider {
        Provider::OpenAi => AgentVariant::OpenAi { base_url, model: settings.model.clone(), api_key },
        Provider::Anthropic => AgentVariant::Anthropic { base_url, model: settings.model.clone(), api_key },
        Provider::Google => AgentVariant::Google { base_url, model: settings.model.clone(), api_key },
    };

    let rate_limit = settings.rate_limit.unwrap_or(defaults.rate_limit);
    let mut agent =
        Agent::with_retry_policy(variant, role, rate_limit.requests_per_minute, rate_limit.requests_per_hour, settings.retry_policy);
    if let Some(max_tokens) = settings.max_tokens {
        agent = agent.with_max_tokens(max_tokens);
    }
    Ok(agent)
}

fn default_base_url(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "https://api.openai.com/v1/chat/completions",
        Provider::Anthropic => "https://api.anthropic.com/v1/messages",
        Provider::Google => "https://generativelanguage.googleapis.com/v1beta/models",
    }
}

fn resolve<'a>(settings: &'a Settings, name: &str) -> Result<&'a AgentSettings> {
    settings.agents.get(name).with_context(|| format!("agent '{name}' is not configured"))
}

/// Bootstraps the on-disk state (cache, documentation, resume marker
/// directories) described by a [`Settings`] value, and builds the
/// Coordinator/Engine on top of it.
pub struct Orchestrator {
    pub cache: Arc<CacheStore>,
    pub docs: Arc<DocumentationRecorder>,
    pub resume: Arc<ResumeStore>,
    settings: Settings,
}

impl Orchestrator {
    pub fn bootstrap(settings: Settings) -> Result<Self> {
        let cache = Arc::new(CacheStore::open_with_expiry(settings.cache.root.clone(), settings.cache.default_expiry_hours)?);
        let docs = Arc::new(DocumentationRecorder::open(settings.state.docs_root.clone()));
        let resume = Arc::new(ResumeStore::open(settings.state.resume_root.clone())?);
        Ok(Self { cache, docs, resume, settings })
    }

    /// Build every agent named anywhere in the coordinator roster, and the
    /// [`Coordinator`] that drives them through the fixed eight-state
    /// sequence.
    pub fn coordinator(&self) -> Result<Coordinator> {
        let roster = &self.settings.coordinator;

        let brainstorm = roster
            .brainstorm
            .iter()
            .map(|name| {
                let agent_settings = resolve(&self.settings, name)?;
                build_agent(name, agent_settings, &self.settings, AgentRole::ProjectManagerConsultant)
                    .map(|agent| Arc::new(agent) as Arc<dyn orchestrator_coordinator::AgentHandle>)
            })
            .collect::<Result<Vec<_>>>()?;

        let slot = |name: &str, role: AgentRole| -> Result<Arc<dyn orchestrator_coordinator::AgentHandle>> {
            let agent_settings = resolve(&self.settings, name)?;
            Ok(Arc::new(build_agent(name, agent_settings, &self.settings, role)?))
        };

        let agents = CoordinatorAgents {
            brainstorm,
            architect: slot(&roster.architect, AgentRole::FullstackDeveloper)?,
            reviewer: slot(&roster.reviewer, AgentRole::Manager)?,
            planner: slot(&roster.planner, AgentRole::Manager)?,
            phase_validator: slot(&roster.phase_validator, AgentRole::Validator)?,
            implementer: slot(&roster.implementer, AgentRole::FullstackDeveloper)?,
            code_validator: slot(&roster.code_validator, AgentRole::Validator)?,
            integrator: slot(&roster.integrator, AgentRole::IntegrationAgent)?,
        };

        Ok(Coordinator::new(self.cache.clone(), self.docs.clone(), self.resume.clone(), agents))
    }

    /// Build the Workflow Engine over every agent in [`Settings::agents`],
    /// keyed by the same names a workflow file's `phase.agent` references.
    pub fn engine(&self) -> Result<Engine> {
        let agents = self
            .settings
            .agents
            .iter()
            .map(|(name, agent_settings)| {
                let agent = build_agent(name, agent_settings, &self.settings, AgentRole::Manager)?;
                Ok((name.clone(), Arc::new(agent)))
            })
            .collect::<Result<HashMap<String, Arc<Agent>>>>()?;
        Ok(Engine::new(agents))
    }

    /// Load and structurally validate the declarative workflow file named
    /// by [`Settings::workflow_file`].
    pub fn load_workflow(&self) -> Result<WorkflowDefinition> {
        let path = self.settings.workflow_file.as_deref().context("no workflow_file configured")?;
        load_workflow_from(path)
    }
}

fn load_workflow_from(path: &Path) -> Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading workflow file: {}", path.display()))?;
    let definition: WorkflowDefinition =
        toml::from_str(&content).with_context(|| format!("parsing workflow file: {}", path.display()))?;
    definition.validate_structure()?;
    Ok(definition)
}
