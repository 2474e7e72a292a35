//! The closed named-parser registry: `disagreement_parser`,
//! `vote_parser`, `extract_voting_options`, `extract_api_structure`. Each
//! parser takes the raw sourced string and returns a new string — usually a
//! JSON-encoded structure — since `WorkflowState`'s maps are `String`-valued.

use orchestrator_types::OrchestratorError;
use serde_json::{Value, json};

/// Apply a registered parser by name. Unknown names are a configuration
/// error rather than a pass-through, so a typo in a workflow file surfaces
/// immediately instead of silently losing the transform.
pub fn apply(name: &str, raw: &str) -> Result<String, OrchestratorError> {
    match name {
        "disagreement_parser" => Ok(disagreement_parser(raw)),
        "vote_parser" => Ok(vote_parser(raw)),
        "extract_voting_options" => Ok(extract_voting_options(raw)),
        "extract_api_structure" => Ok(extract_api_structure(raw)),
        other => Err(OrchestratorError::Configuration(format!("unknown parser '{other}'"))),
    }
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line.strip_prefix('-').or_else(|| line.strip_prefix('*')).unwrap_or(line);
    match line.find(". ") {
        Some(idx) if line[..idx].chars().all(|c| c.is_ascii_digit()) && idx > 0 => &line[idx + 2..],
        _ => line,
    }
    .trim()
}

/// Extract a list of disagreement objects from free-form comparison text.
/// Each non-empty bulleted or numbered line becomes `{"description": ...}`.
fn disagreement_parser(text: &str) -> String {
    let items: Vec<Value> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| line.starts_with('-') || line.starts_with('*') || starts_with_digit_dot(line))
        .map(|line| json!({ "description": strip_list_marker(line) }))
        .collect();
    serde_json::to_string(&Value::Array(items)).unwrap_or_else(|_| "[]".to_string())
}

fn starts_with_digit_dot(line: &str) -> bool {
    matches!(line.find(". "), Some(idx) if idx > 0 && line[..idx].chars().all(|c| c.is_ascii_digit()))
}

/// Extract `{choice: int, reasoning: string}` from a voting response.
/// Defaults `choice` to 1 when no `vote:` token is present.
fn vote_parser(text: &str) -> String {
    let lower = text.to_lowercase();
    let choice = lower
        .find("vote:")
        .and_then(|idx| {
            lower[idx + "vote:".len()..]
                .split_whitespace()
                .next()
                .and_then(|token| token.trim_matches(|c: char| !c.is_ascii_digit()).parse::<i64>().ok())
        })
        .unwrap_or(1);

    let reasoning = match lower.find("vote:") {
        Some(idx) => text[..idx].trim().to_string(),
        None => text.trim().to_string(),
    };

    serde_json::to_string(&json!({ "choice": choice, "reasoning": reasoning })).unwrap_or_default()
}

/// Map a disagreement list (as produced by `disagreement_parser`) to a flat
/// list of option strings.
fn extract_voting_options(raw: &str) -> String {
    let options: Vec<String> = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| item.get("description").and_then(Value::as_str).map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    serde_json::to_string(&options).unwrap_or_else(|_| "[]".to_string())
}

const HTTP_VERBS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

/// Produce a coarse structured summary of backend text: every line naming
/// an HTTP verb followed by a path-like token is collected as an endpoint.
fn extract_api_structure(text: &str) -> String {
    let endpoints: Vec<Value> = text
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            HTTP_VERBS.iter().find_map(|verb| {
                trimmed.strip_prefix(verb).map(str::trim).filter(|rest| !rest.is_empty()).map(|path| {
                    let path = path.split_whitespace().next().unwrap_or(path);
                    json!({ "method": verb, "path": path })
                })
            })
        })
        .collect();
    serde_json::to_string(&json!({ "endpoints": endpoints })).unwrap_or_default()
}
