//! Metadata for an entry in the Cache Store. The payload itself is owned and
//! persisted by `orchestrator-cache`; this module only describes its shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status assigned to a cache entry by a validity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Valid,
    Invalid,
    Expired,
    Corrupted,
    MissingDependencies,
}

/// Metadata persisted alongside a cache entry's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryMetadata {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub agent_type: String,
    pub prompt_hash: String,
    pub dependencies: Vec<String>,
    pub session_id: String,
    pub validation_status: String,
    pub expiry_time: Option<DateTime<Utc>>,
    pub size: u64,
    pub access_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

impl CacheEntryMetadata {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiry_time, Some(expiry) if now >= expiry)
    }
}

/// Fields a caller supplies to `Set`; everything else (timestamps, size,
/// prompt hash, access counters) is derived by the store.
#[derive(Debug, Clone, Default)]
pub struct CacheEntryOptions {
    pub agent_type: String,
    pub session_id: String,
    pub validation_status: String,
    pub file_count: u64,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expired_when_expiry_in_the_past() {
        let now = Utc::now();
        let meta = CacheEntryMetadata {
            key: "k".into(),
            created_at: now,
            updated_at: now,
            agent_type: "a".into(),
            prompt_hash: "h".into(),
            dependencies: vec![],
            session_id: "s".into(),
            validation_status: "passed".into(),
            expiry_time: Some(now - Duration::hours(1)),
            size: 0,
            access_count: 0,
            last_accessed: None,
            tags: vec![],
        };
        assert!(meta.is_expired(now));
    }

    #[test]
    fn not_expired_with_no_expiry_time() {
        let now = Utc::now();
        let meta = CacheEntryMetadata {
            key: "k".into(),
            created_at: now,
            updated_at: now,
            agent_type: "a".into(),
            prompt_hash: "h".into(),
            dependencies: vec![],
            session_id: "s".into(),
            validation_status: "passed".into(),
            expiry_time: None,
            size: 0,
            access_count: 0,
            last_accessed: None,
            tags: vec![],
        };
        assert!(!meta.is_expired(now));
    }
}
