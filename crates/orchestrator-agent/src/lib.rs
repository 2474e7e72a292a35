//! # orchestrator-agent
//!
//! The Agent Runtime: a uniform capability layer around
//! heterogeneous LLM HTTP APIs. An [`Agent`] is a tagged variant over the
//! provider-specific request/response shape; callers only ever see
//! [`Agent::execute_task`] returning a [`Response`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use orchestrator_prompt::EnhancementContext;
use orchestrator_ratelimit::RateLimiter;
use orchestrator_retry::{RetryExecutor, RetryPolicy};
use orchestrator_types::{AgentRole, OrchestratorError, Response, Task, TaskType};
use serde_json::{Value, json};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_MAX_TOKENS: u32 = 4096;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Provider-specific endpoint shape and credentials.
///
/// Each variant carries everything needed to build one HTTP request: the
/// base URL, model name, and the credential the provider expects. No
/// variant references another's fields.
#[derive(Debug, Clone)]
pub enum AgentVariant {
    OpenAi { base_url: String, model: String, api_key: String },
    Anthropic { base_url: String, model: String, api_key: String },
    Google { base_url: String, model: String, api_key: String },
}

impl AgentVariant {
    fn model(&self) -> &str {
        match self {
            AgentVariant::OpenAi { model, .. }
            | AgentVariant::Anthropic { model, .. }
            | AgentVariant::Google { model, .. } => model,
        }
    }
}

/// A running agent instance: one [`AgentVariant`] plus the shared HTTP
/// client, rate limiter, and retry policy every task dispatched to it goes
/// through. The client and rate limiter are safe for concurrent callers, so
/// one `Agent` may serve multiple in-flight tasks.
pub struct Agent {
    variant: AgentVariant,
    role: AgentRole,
    capabilities: Vec<TaskType>,
    client: reqwest::blocking::Client,
    rate_limiter: RateLimiter,
    retry: RetryExecutor,
    max_tokens: u32,
}

impl Agent {
    /// Build an agent with the default retry policy, baseline capabilities,
    /// and a 120s per-request timeout.
    pub fn new(
        variant: AgentVariant,
        role: AgentRole,
        requests_per_minute: u32,
        requests_per_hour: u32,
    ) -> Self {
        Self::with_retry_policy(
            variant,
            role,
            requests_per_minute,
            requests_per_hour,
            RetryPolicy::Default,
        )
    }

    pub fn with_retry_policy(
        variant: AgentVariant,
        role: AgentRole,
        requests_per_minute: u32,
        requests_per_hour: u32,
        retry_policy: RetryPolicy,
    ) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            variant,
            role,
            capabilities: TaskType::BASELINE_CAPABILITIES.to_vec(),
            client,
            rate_limiter: RateLimiter::new(requests_per_minute, requests_per_hour),
            retry: RetryExecutor::from_policy(retry_policy),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Override the task types this agent advertises as supported.
    pub fn with_capabilities(mut self, capabilities: Vec<TaskType>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Rebuild the underlying client with a non-default per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        self
    }

    pub fn role(&self) -> &AgentRole {
        &self.role
    }

    /// `Capabilities()` — the set of task types this agent accepts.
    pub fn capabilities(&self) -> &[TaskType] {
        &self.capabilities
    }

    pub fn supports(&self, task_type: TaskType) -> bool {
        self.capabilities.contains(&task_type)
    }

    /// Numeric temperature policy: implementation and technical
    /// planning stay near-deterministic; brainstorming and planning allow
    /// more variation; everything else uses the default.
    pub fn temperature_for(&self, task_type: TaskType) -> f32 {
        match task_type {
            TaskType::Implementation
            | TaskType::MicroPhaseImplementation
            | TaskType::TechnicalPlanning => 0.1,
            TaskType::Brainstorming | TaskType::MicroPhasePlanning => 0.3,
            _ => 0.2,
        }
    }

    /// System prompt selected per task type. Kept short and directive; the
    /// Prompt Enhancer (not this function) is responsible for layering in
    /// session context and prior-phase artifacts.
    pub fn system_prompt_for(&self, task_type: TaskType) -> String {
        let role = match task_type {
            TaskType::RequirementsRefinement | TaskType::Brainstorming => {
                "a product-focused software consultant"
            }
            TaskType::TechnicalPlanning | TaskType::PlanComparison => "a software architect",
            TaskType::Consultation | TaskType::Justification | TaskType::Voting => {
                "a technical decision maker"
            }
            TaskType::Implementation | TaskType::MicroPhaseImplementation => {
                "a senior software engineer writing production code"
            }
            TaskType::Testing => "a software engineer writing tests",
            TaskType::MicroPhasePlanning => "a project planner breaking work into phases",
            TaskType::MicroPhaseValidation | TaskType::CodeValidation | TaskType::StructureValidation => {
                "a meticulous code reviewer"
            }
            TaskType::GitOperation | TaskType::BranchManagement | TaskType::PullRequestCreation => {
                "a git operations assistant"
            }
            TaskType::IntegrationValidation => "an integration test engineer",
            TaskType::FinalAssembly => "a release manager summarizing completed work",
        };
        format!("You are {role}. Respond directly and concretely; do not hedge.")
    }

    /// `ExecuteTask`: acquire a rate-limit token, format and
    /// optionally enhance the prompt, dispatch through the retry policy, and
    /// return a `Response` reflecting success or final failure. Never
    /// panics and never returns an `Err` — every outcome is encoded in the
    /// returned `Response`.
    pub fn execute_task(&self, task: &Task, enhancement: Option<&EnhancementContext<'_>>) -> Response {
        let start = Instant::now();
        self.rate_limiter.acquire();

        let system_prompt = self.system_prompt_for(task.task_type());
        let base_prompt = task.prompt_text();
        let (prompt, enhanced) = match enhancement {
            Some(ctx) => (orchestrator_prompt::enhance(base_prompt, task.task_type(), ctx), true),
            None => (base_prompt.to_string(), false),
        };
        let temperature = self.temperature_for(task.task_type());

        let outcome = self.retry.run_if(
            OrchestratorError::is_retryable,
            |_attempt| self.dispatch(&system_prompt, &prompt, temperature),
        );

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let mut metadata = HashMap::new();
        metadata.insert("elapsed_ms".to_string(), json!(elapsed_ms));
        metadata.insert("model".to_string(), json!(self.variant.model()));
        metadata.insert("prompt_length".to_string(), json!(prompt.len()));
        metadata.insert("enhanced".to_string(), json!(enhanced));

        match outcome {
            Ok(content) => Response::success(content, task.task_type(), self.role.clone(), metadata),
            Err(err) => {
                log::warn!(
                    "agent task failed for session={} phase={:?}: {err}",
                    task.session_id(),
                    task.phase_id()
                );
                Response::failure(err.to_string(), task.task_type(), self.role.clone(), metadata)
            }
        }
    }

    fn dispatch(&self, system_prompt: &str, prompt: &str, temperature: f32) -> Result<String, OrchestratorError> {
        let body = build_request_body(&self.variant, system_prompt, prompt, self.max_tokens, temperature);
        let url = request_url(&self.variant);

        let mut request = self.client.post(&url).json(&body);
        for (name, value) in auth_headers(&self.variant) {
            request = request.header(name, value);
        }

        let response = request.send().map_err(|e| OrchestratorError::Transport(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let code = status.as_u16();
            let body_text = response.text().unwrap_or_default();
            return if is_retryable_status(code) {
                Err(OrchestratorError::Transport(format!("http {code}: {body_text}")))
            } else {
                Err(OrchestratorError::Protocol(format!("http {code}: {body_text}")))
            };
        }

        let body: Value = response
            .json()
            .map_err(|e| OrchestratorError::Protocol(format!("malformed response body: {e}")))?;
        extract_content(&self.variant, &body)
    }

    /// `Cleanup()` — a no-op: the pooled `reqwest` client and rate limiter
    /// are reclaimed when the agent itself is dropped. Kept as an explicit
    /// method so callers following the `Capabilities/ExecuteTask/Cleanup`
    /// contract have something to call at session end.
    pub fn cleanup(&self) {
        log::debug!("agent cleanup: {:?}", self.role);
    }
}

/// `ValidateResponse`: a lightweight, task-type-specific shape
/// check. Called by the Engine after a response comes back, never by the
/// agent itself.
pub fn validate_response(text: &str, task_type: TaskType) -> bool {
    match task_type {
        TaskType::Voting => text.to_lowercase().contains("vote:"),
        TaskType::TechnicalPlanning | TaskType::MicroPhasePlanning => text.len() >= 200,
        _ => !text.trim().is_empty(),
    }
}

fn request_url(variant: &AgentVariant) -> String {
    match variant {
        AgentVariant::OpenAi { base_url, .. } => format!("{}/chat/completions", base_url.trim_end_matches('/')),
        AgentVariant::Anthropic { base_url, .. } => format!("{}/v1/messages", base_url.trim_end_matches('/')),
        AgentVariant::Google { base_url, model, api_key } => format!(
            "{}/models/{}:generateContent?key={}",
            base_url.trim_end_matches('/'),
            model,
            api_key
        ),
    }
}

fn auth_headers(variant: &AgentVariant) -> Vec<(&'static str, String)> {
    match variant {
        AgentVariant::OpenAi { api_key, .. } => vec![("Authorization", format!("Bearer {api_key}"))],
        AgentVariant::Anthropic { api_key, .. } => vec![
            ("x-api-key", api_key.clone()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ],
        AgentVariant::Google { .. } => Vec::new(),
    }
}

fn build_request_body(
    variant: &AgentVariant,
    system_prompt: &str,
    prompt: &str,
    max_tokens: u32,
    temperature: f32,
) -> Value {
    match variant {
        AgentVariant::OpenAi { model, .. } => json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": prompt},
            ],
            "max_tokens": max_tokens,
            "temperature": temperature,
        }),
        AgentVariant::Anthropic { model, .. } => json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "system": system_prompt,
            "messages": [
                {"role": "user", "content": prompt},
            ],
        }),
        AgentVariant::Google { .. } => json!({
            "contents": [
                {"parts": [{"text": format!("System: {system_prompt}\n\nUser: {prompt}")}]},
            ],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            },
        }),
    }
}

fn extract_content(variant: &AgentVariant, body: &Value) -> Result<String, OrchestratorError> {
    let text = match variant {
        AgentVariant::OpenAi { .. } => body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str),
        AgentVariant::Anthropic { .. } => body.pointer("/content/0/text").and_then(Value::as_str),
        AgentVariant::Google { .. } => body
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str),
    };

    match text {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(OrchestratorError::Protocol(format!(
            "response body missing expected content field: {body}"
        ))),
    }
}

/// HTTP transport errors, connection errors, and 408/429/5xx are retryable;
/// every other 4xx is final.
fn is_retryable_status(code: u16) -> bool {
    code == 408 || code == 429 || (500..600).contains(&code)
}
