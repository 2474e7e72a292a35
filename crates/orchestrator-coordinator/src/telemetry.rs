//! The Telemetry Collaborator interface.
//!
//! Read-only from the core's perspective: the Coordinator and Engine emit
//! structured observations, but nothing here feeds back into scheduling
//! decisions. A real sink (metrics exporter, log shipper) is out of scope;
//! this module only carries the event shape and a `log`-backed default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The single observation emitted for each terminal phase failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureObservation {
    pub phase_name: String,
    pub error_kind: String,
    pub message: String,
    pub attempt_count: u32,
    pub elapsed: Duration,
}

/// A state transition observation, emitted on successful entry into a new
/// coordinator state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateCompletedObservation {
    pub session_id: String,
    pub state: String,
    pub cache_hit: bool,
    pub elapsed: Duration,
}

pub trait TelemetryCollaborator: Send + Sync {
    fn state_completed(&self, _event: &StateCompletedObservation) {}
    fn phase_failed(&self, _event: &FailureObservation) {}
}

/// The default sink: every event is forwarded to the `log` facade and
/// nowhere else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTelemetry;

impl TelemetryCollaborator for LoggingTelemetry {
    fn state_completed(&self, event: &StateCompletedObservation) {
        log::info!(
            "session {} completed state '{}' in {:?} (cache_hit={})",
            event.session_id,
            event.state,
            event.elapsed,
            event.cache_hit
        );
    }

    fn phase_failed(&self, event: &FailureObservation) {
        log::error!(
            "phase '{}' failed ({}): {} after {} attempt(s), {:?} elapsed",
            event.phase_name,
            event.error_kind,
            event.message,
            event.attempt_count,
            event.elapsed
        );
    }
}
