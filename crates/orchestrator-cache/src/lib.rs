//! # orchestrator-cache
//!
//! Content-addressed, dependency-tracked artifact cache for the Micro-Phase
//! Coordinator. Every phase result (brainstorming notes, the architecture
//! plan, generated code per micro-phase, validation reports...) is written
//! once under a well-known key and can be invalidated, along with everything
//! that was derived from it, when an upstream input changes.
//!
//! Payloads are stored as individual JSON files under `root`, one per key;
//! a single `cache_index.json` tracks metadata, the dependency graph, and
//! running hit/miss/cost statistics. Both are written with a tmp-then-rename
//! so a crash mid-write never leaves a half-written file in place.
//!
//! ```no_run
//! use orchestrator_cache::{CacheStore, CacheEntryOptions};
//! use serde_json::json;
//!
//! let store = CacheStore::open("/tmp/orchestrator-cache").unwrap();
//! store.set("brainstorming_features", &json!({"ideas": []}), &[], CacheEntryOptions::default()).unwrap();
//! let cached = store.get("brainstorming_features").unwrap();
//! assert!(cached.is_some());
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration as ChronoDuration, Utc};
use orchestrator_types::{CacheEntryMetadata, CacheEntryOptions, OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const INDEX_FILE: &str = "cache_index.json";

/// Assumed tokens per API call avoided by a cache hit, and the per-1K-token
/// price used to turn that into a dollar estimate. Both constants mirror the
/// cost model the orchestrator's analytics are judged against; they are
/// deliberately rough (no real token accounting happens here).
const ASSUMED_TOKENS_PER_CALL: f64 = 2000.0;
const USD_PER_1K_TOKENS: f64 = 0.002;

/// Resolve the on-disk path for a cache key, following the well-known
/// payload locations: `brainstorming/features.json`, `architecture/plan.json`,
/// `metadata/micro_phases.json`, `phases/phase_{id}/generated_code.json`,
/// `phases/phase_{id}/validation_report.json`, `integration/summary.json`.
/// Anything outside this closed set falls back to `files/{sanitized-key}.json`.
fn payload_path(root: &Path, key: &str) -> PathBuf {
    if key == "brainstorming_features" {
        return root.join("brainstorming").join("features.json");
    }
    if key == "system_architecture_plan" {
        return root.join("architecture").join("plan.json");
    }
    if key == "project_micro_phases" {
        return root.join("metadata").join("micro_phases.json");
    }
    if key == "final_integration_summary" {
        return root.join("integration").join("summary.json");
    }
    if let Some(id) = key.strip_prefix("phase-").and_then(|rest| rest.strip_suffix("-generated_code")) {
        return root.join("phases").join(format!("phase_{id}")).join("generated_code.json");
    }
    if let Some(id) = key.strip_prefix("phase-").and_then(|rest| rest.strip_suffix("-validation_report")) {
        return root.join("phases").join(format!("phase_{id}")).join("validation_report.json");
    }
    if key.starts_with("phase_documentation_") {
        return root.join("phases").join(format!("{key}.json"));
    }
    root.join("files").join(format!("{}.json", sanitize_key(key)))
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn hash_payload(value: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    hex::encode(digest)
}

/// Running counters behind `get_analytics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub api_calls_saved: u64,
}

/// A point-in-time view of cache effectiveness, derived from [`CacheStats`]
/// and the current index. `cost_savings_usd` assumes each saved API call
/// would have cost [`ASSUMED_TOKENS_PER_CALL`] tokens at [`USD_PER_1K_TOKENS`]
/// per thousand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheAnalytics {
    pub total_entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub invalidations: u64,
    pub api_calls_saved: u64,
    pub estimated_tokens_saved: u64,
    pub cost_savings_usd: f64,
    pub total_size_bytes: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    #[serde(default)]
    entries: HashMap<String, CacheEntryMetadata>,
    /// key -> the keys that were created with it listed as a dependency.
    #[serde(default)]
    dependents: HashMap<String, Vec<String>>,
    #[serde(default)]
    stats: CacheStats,
}

/// Default expiry applied to entries written without an explicit override.
pub const DEFAULT_EXPIRY_HOURS: i64 = 72;

/// The cache's on-disk home. Safe to share across threads: every mutable
/// operation takes the index lock for its whole duration.
pub struct CacheStore {
    root: PathBuf,
    index: Mutex<CacheIndex>,
    default_expiry_hours: i64,
}

impl CacheStore {
    /// Open (or create) a cache rooted at `root`, loading any existing index,
    /// using [`DEFAULT_EXPIRY_HOURS`] as the default expiry.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_expiry(root, DEFAULT_EXPIRY_HOURS)
    }

    /// [`Self::open`] with an explicit default expiry (in hours; `0` disables
    /// expiry for entries written without a per-`set` override).
    pub fn open_with_expiry(root: impl Into<PathBuf>, default_expiry_hours: i64) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| OrchestratorError::Dependency(format!("creating cache root: {e}")))?;

        let index_path = root.join(INDEX_FILE);
        let index = if index_path.exists() {
            let data = fs::read_to_string(&index_path)
                .map_err(|e| OrchestratorError::Dependency(format!("reading cache index: {e}")))?;
            serde_json::from_str(&data)
                .map_err(|e| OrchestratorError::Dependency(format!("parsing cache index: {e}")))?
        } else {
            CacheIndex::default()
        };

        Ok(Self { root, index: Mutex::new(index), default_expiry_hours })
    }

    /// Fetch a cached value by key, without dependency validation. Equivalent
    /// to `get_validated(key, false)`.
    pub fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.get_validated(key, false)
    }

    /// Fetch a cached value by key. Returns `None` on a miss, including when
    /// an entry exists but is no longer valid (it is invalidated in-place
    /// first).
    ///
    /// An entry is valid iff its payload is readable, it is not expired, and
    /// — when `validate_dependencies` is set — every key in its `dependencies`
    /// list is itself readable and unexpired. This check is one level deep
    /// only: a dependency's own dependencies are not walked, to avoid
    /// unbounded traversal.
    pub fn get_validated(
        &self,
        key: &str,
        validate_dependencies: bool,
    ) -> Result<Option<serde_json::Value>> {
        let mut index = self.index.lock().unwrap();

        let Some(meta) = index.entries.get(key).cloned() else {
            index.stats.misses += 1;
            self.persist(&index)?;
            return Ok(None);
        };

        let now = Utc::now();
        let mut valid = meta.validation_status == "valid" && !meta.is_expired(now);
        if valid && validate_dependencies {
            valid = meta
                .dependencies
                .iter()
                .all(|dep| direct_dependency_valid(&index, dep, now));
        }
        if !valid {
            invalidate_one(&mut index, key);
            index.stats.misses += 1;
            self.persist(&index)?;
            return Ok(None);
        }

        let path = payload_path(&self.root, key);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(_) => {
                invalidate_one(&mut index, key);
                index.stats.misses += 1;
                self.persist(&index)?;
                return Ok(None);
            }
        };
        let value: serde_json::Value = match serde_json::from_str(&data) {
            Ok(value) => value,
            Err(_) => {
                invalidate_one(&mut index, key);
                index.stats.misses += 1;
                self.persist(&index)?;
                return Ok(None);
            }
        };

        if let Some(entry) = index.entries.get_mut(key) {
            entry.access_count += 1;
            entry.last_accessed = Some(now);
        }
        index.stats.hits += 1;
        index.stats.api_calls_saved += 1;
        self.persist(&index)?;

        Ok(Some(value))
    }

    /// Store `value` under `key`, recording `dependencies` so a later
    /// `invalidate(dependency, cascade = true)` reaches this entry too.
    /// `expiry_hours`, if given, overrides the store's default expiry.
    pub fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
        dependencies: &[String],
        options: CacheEntryOptions,
    ) -> Result<()> {
        self.set_with_expiry(key, value, dependencies, options, None)
    }

    /// [`Self::set`], with an explicit per-entry expiry override. `None` uses
    /// the store's configured default ([`Self::default_expiry_hours`]).
    pub fn set_with_expiry(
        &self,
        key: &str,
        value: &serde_json::Value,
        dependencies: &[String],
        options: CacheEntryOptions,
        expiry_hours: Option<i64>,
    ) -> Result<()> {
        if dependencies.iter().any(|dep| dep == key) {
            return Err(OrchestratorError::Configuration(format!(
                "cache entry '{key}' cannot declare itself as a dependency"
            )));
        }

        let path = payload_path(&self.root, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| OrchestratorError::Dependency(format!("creating cache dir: {e}")))?;
        }
        let serialized = serde_json::to_string_pretty(value)
            .map_err(|e| OrchestratorError::Dependency(format!("serializing cache payload: {e}")))?;
        write_atomic(&path, &serialized)?;

        let mut index = self.index.lock().unwrap();
        let now = Utc::now();
        let created_at = index.entries.get(key).map(|e| e.created_at).unwrap_or(now);
        let hours = expiry_hours.unwrap_or(self.default_expiry_hours);
        let meta = CacheEntryMetadata {
            key: key.to_string(),
            created_at,
            updated_at: now,
            agent_type: options.agent_type,
            prompt_hash: hash_payload(value),
            dependencies: dependencies.to_vec(),
            session_id: options.session_id,
            validation_status: if options.validation_status.is_empty() {
                "valid".to_string()
            } else {
                options.validation_status
            },
            expiry_time: if hours > 0 {
                Some(now + ChronoDuration::hours(hours))
            } else {
                None
            },
            size: serialized.len() as u64,
            access_count: 0,
            last_accessed: None,
            tags: options.tags,
        };
        for dep in dependencies {
            index.dependents.entry(dep.clone()).or_default().push(key.to_string());
        }
        index.entries.insert(key.to_string(), meta);
        self.persist(&index)?;
        Ok(())
    }

    /// Mark `key` (and, if `cascade`, everything transitively derived from
    /// it) as `Invalid`. Returns every key that was invalidated, in the
    /// order each was reached (dependents before the key itself).
    pub fn invalidate(&self, key: &str, cascade: bool) -> Result<Vec<String>> {
        let mut index = self.index.lock().unwrap();
        let mut invalidated = Vec::new();

        if cascade {
            let mut stack = vec![key.to_string()];
            let mut seen = std::collections::HashSet::new();
            let mut ordered = Vec::new();
            while let Some(k) = stack.pop() {
                if !seen.insert(k.clone()) {
                    continue;
                }
                if let Some(deps) = index.dependents.get(&k) {
                    for dep in deps.clone() {
                        stack.push(dep);
                    }
                }
                ordered.push(k);
            }
            // Dependents were pushed after their ancestor, so reverse to
            // invalidate leaves before the root they trace back to.
            ordered.reverse();
            for k in ordered {
                if k != key && invalidate_one(&mut index, &k) {
                    invalidated.push(k);
                }
            }
        }

        if invalidate_one(&mut index, key) {
            invalidated.push(key.to_string());
        }

        index.stats.invalidations += invalidated.len() as u64;
        self.persist(&index)?;
        Ok(invalidated)
    }

    /// A point-in-time snapshot of cache effectiveness.
    pub fn analytics(&self) -> CacheAnalytics {
        let index = self.index.lock().unwrap();
        let total = index.stats.hits + index.stats.misses;
        let hit_rate = if total == 0 { 0.0 } else { index.stats.hits as f64 / total as f64 };
        let estimated_tokens_saved =
            (index.stats.api_calls_saved as f64 * ASSUMED_TOKENS_PER_CALL) as u64;
        let cost_savings_usd = (estimated_tokens_saved as f64 / 1000.0) * USD_PER_1K_TOKENS;
        let total_size_bytes = index.entries.values().map(|e| e.size).sum();

        CacheAnalytics {
            total_entries: index.entries.len() as u64,
            hits: index.stats.hits,
            misses: index.stats.misses,
            hit_rate,
            invalidations: index.stats.invalidations,
            api_calls_saved: index.stats.api_calls_saved,
            estimated_tokens_saved,
            cost_savings_usd,
            total_size_bytes,
        }
    }

    /// Metadata for `key`, if present, regardless of validity.
    pub fn metadata(&self, key: &str) -> Option<CacheEntryMetadata> {
        self.index.lock().unwrap().entries.get(key).cloned()
    }

    /// Sweep every entry, removing those that are expired or corrupted
    /// (payload file missing or unparseable), and rewrite the index.
    pub fn cleanup(&self) -> Result<CleanupReport> {
        let mut index = self.index.lock().unwrap();
        let now = Utc::now();

        let mut expired_count = 0u64;
        let mut corrupted_count = 0u64;
        let mut bytes_freed = 0u64;
        let mut to_remove = Vec::new();

        for (key, meta) in index.entries.iter() {
            if meta.is_expired(now) {
                expired_count += 1;
                bytes_freed += meta.size;
                to_remove.push(key.clone());
                continue;
            }
            let path = payload_path(&self.root, key);
            let readable = fs::read_to_string(&path)
                .ok()
                .and_then(|data| serde_json::from_str::<serde_json::Value>(&data).ok())
                .is_some();
            if !readable {
                corrupted_count += 1;
                bytes_freed += meta.size;
                to_remove.push(key.clone());
            }
        }

        for key in &to_remove {
            index.entries.remove(key);
            let path = payload_path(&self.root, key);
            let _ = fs::remove_file(&path);
        }
        index.dependents.retain(|_, dependents| {
            dependents.retain(|d| !to_remove.contains(d));
            !dependents.is_empty()
        });

        let kept_count = index.entries.len() as u64;
        self.persist(&index)?;

        Ok(CleanupReport { expired_count, corrupted_count, bytes_freed, kept_count })
    }

    fn persist(&self, index: &CacheIndex) -> Result<()> {
        let serialized = serde_json::to_string_pretty(index)
            .map_err(|e| OrchestratorError::Dependency(format!("serializing cache index: {e}")))?;
        write_atomic(&self.root.join(INDEX_FILE), &serialized)
    }
}

/// Result of a [`CacheStore::cleanup`] sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub expired_count: u64,
    pub corrupted_count: u64,
    pub bytes_freed: u64,
    pub kept_count: u64,
}

/// One-level dependency validity check used by [`CacheStore::get_validated`]:
/// `dep` counts as valid if it is present, its `validation_status` is
/// `"valid"`, and it is not expired. Its own dependencies are not consulted.
fn direct_dependency_valid(index: &CacheIndex, dep: &str, now: chrono::DateTime<Utc>) -> bool {
    match index.entries.get(dep) {
        Some(meta) => meta.validation_status == "valid" && !meta.is_expired(now),
        None => false,
    }
}

/// Well-known key builders for per-micro-phase artifacts, matching the
/// layout `payload_path` dispatches on.
pub mod keys {
    pub fn generated_code(phase_id: &str) -> String {
        format!("phase-{phase_id}-generated_code")
    }

    pub fn validation_report(phase_id: &str) -> String {
        format!("phase-{phase_id}-validation_report")
    }

    pub fn phase_documentation(slug: &str) -> String {
        format!("phase_documentation_{slug}")
    }
}

fn invalidate_one(index: &mut CacheIndex, key: &str) -> bool {
    match index.entries.get_mut(key) {
        Some(entry) if entry.validation_status != "invalid" => {
            entry.validation_status = "invalid".to_string();
            true
        }
        _ => false,
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)
        .map_err(|e| OrchestratorError::Dependency(format!("writing {}: {e}", tmp_path.display())))?;
    fs::rename(&tmp_path, path)
        .map_err(|e| OrchestratorError::Dependency(format!("renaming into {}: {e}", path.display())))?;
    Ok(())
}
