//! The closed error taxonomy shared by every component of the orchestrator.

use thiserror::Error;

/// Error kinds produced by the orchestrator core.
///
/// This is a closed set: every component (rate limiter, retry policy, agent
/// runtime, cache store, workflow engine, coordinator) reports failures
/// through one of these variants rather than inventing ad-hoc error types.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Network, timeout, 5xx, 408, or 429 — retryable by the Retry Policy.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-retryable 4xx (other than 408/429), or a malformed response body.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Phase output did not satisfy its declared validation rules.
    #[error("validation failed for phase '{phase}': {reason}")]
    Validation {
        /// Name of the phase whose output failed validation.
        phase: String,
        /// Human-readable description of what was missing.
        reason: String,
    },

    /// Cache or engine detected a missing or invalid dependency artifact.
    #[error("dependency error: {0}")]
    Dependency(String),

    /// Per-phase deadline exceeded.
    #[error("phase '{phase}' timed out after {elapsed_ms}ms")]
    Timeout {
        /// Name of the phase that exceeded its deadline.
        phase: String,
        /// Wall-clock time elapsed before the deadline was hit.
        elapsed_ms: u64,
    },

    /// Malformed DAG, unknown agent key, missing system prompt — detected at load time.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl OrchestratorError {
    /// Whether this error class is retryable by the Retry Policy.
    ///
    /// Only [`OrchestratorError::Transport`] is retryable; every other kind
    /// is either a terminal application-level failure or already final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrchestratorError::Transport(_))
    }
}

/// Convenience alias used throughout the orchestrator crates.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
