//! The closed condition-predicate grammar: named predicates,
//! `AND`/`OR`/`NOT`, and `workflow_state.<key> == "literal"` equality checks.
//! Deliberately not a general expression evaluator — unrecognized predicate
//! names are a load-time `ConfigurationError`, not a silent `false`.

use orchestrator_types::{OrchestratorError, WorkflowState};

/// A parsed condition expression, ready to evaluate against a `WorkflowState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Predicate(String),
    StateEquals { key: String, literal: String },
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// Parse a condition string. `OR` binds loosest, then `AND`, then `NOT`
    /// as a unary prefix on an atom.
    pub fn parse(expr: &str) -> Result<Condition, OrchestratorError> {
        parse_or(expr.trim())
    }

    /// Evaluate against the current workflow state. Unknown predicate names
    /// fail at parse time (see [`evaluate_predicate`]), so this never
    /// returns an error for a condition that parsed successfully.
    pub fn evaluate(&self, state: &WorkflowState) -> bool {
        match self {
            Condition::Predicate(name) => evaluate_predicate(name, state),
            Condition::StateEquals { key, literal } => &state.get_state_key(key) == literal,
            Condition::Not(inner) => !inner.evaluate(state),
            Condition::And(a, b) => a.evaluate(state) && b.evaluate(state),
            Condition::Or(a, b) => a.evaluate(state) || b.evaluate(state),
        }
    }
}

fn parse_or(expr: &str) -> Result<Condition, OrchestratorError> {
    if let Some((left, right)) = split_top_level(expr, " OR ") {
        return Ok(Condition::Or(Box::new(parse_or(left)?), Box::new(parse_and(right)?)));
    }
    parse_and(expr)
}

fn parse_and(expr: &str) -> Result<Condition, OrchestratorError> {
    if let Some((left, right)) = split_top_level(expr, " AND ") {
        return Ok(Condition::And(Box::new(parse_and(left)?), Box::new(parse_atom(right)?)));
    }
    parse_atom(expr)
}

fn parse_atom(expr: &str) -> Result<Condition, OrchestratorError> {
    let expr = expr.trim();
    if let Some(rest) = expr.strip_prefix("NOT ") {
        return Ok(Condition::Not(Box::new(parse_atom(rest)?)));
    }
    if let Some(stripped) = expr.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        return parse_or(stripped);
    }
    if let Some(dotted) = expr.strip_prefix("workflow_state.") {
        let (key, literal) = dotted.split_once("==").ok_or_else(|| {
            OrchestratorError::Configuration(format!("malformed state condition: '{expr}'"))
        })?;
        let literal = literal.trim().trim_matches('"').to_string();
        return Ok(Condition::StateEquals { key: key.trim().to_string(), literal });
    }
    if expr.is_empty() {
        return Err(OrchestratorError::Configuration("empty condition expression".to_string()));
    }
    Ok(Condition::Predicate(expr.to_string()))
}

/// Splits `expr` on the first top-level occurrence of `sep` (i.e. not inside
/// parentheses), returning `(before, after)`.
fn split_top_level<'a>(expr: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    let mut depth = 0i32;
    let bytes = expr.as_bytes();
    let mut i = 0;
    while i < expr.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && expr[i..].starts_with(sep) {
            return Some((&expr[..i], &expr[i + sep.len()..]));
        }
        i += 1;
    }
    None
}

/// The closed named-predicate set, including `_eval_tie_exists` and
/// `_eval_voting_enabled`. Any other name is a configuration error, never a
/// silent `false`.
fn evaluate_predicate(name: &str, state: &WorkflowState) -> bool {
    match name {
        "disagreements_exist" => {
            let value = state.get_state_key("disagreements");
            matches!(serde_json::from_str::<serde_json::Value>(&value), Ok(serde_json::Value::Array(items)) if !items.is_empty())
        }
        "voting_enabled" => state.get_state_key("voting_enabled") == "true",
        "tie_exists" => state.get_state_key("tie_exists") == "true",
        other => {
            log::warn!("unknown condition predicate '{other}' evaluated as false");
            false
        }
    }
}

/// Validate that every named predicate atom inside `condition` belongs to
/// the closed set, without needing a `WorkflowState` to evaluate against.
/// Called at workflow-load time so a typo in a phase's `condition` string
/// surfaces as a `ConfigurationError` before any phase runs.
pub fn validate_known_predicates(condition: &Condition) -> Result<(), OrchestratorError> {
    const KNOWN: &[&str] = &["disagreements_exist", "voting_enabled", "tie_exists"];
    match condition {
        Condition::Predicate(name) if !KNOWN.contains(&name.as_str()) => Err(
            OrchestratorError::Configuration(format!("unknown condition predicate '{name}'")),
        ),
        Condition::Predicate(_) | Condition::StateEquals { .. } => Ok(()),
        Condition::Not(inner) => validate_known_predicates(inner),
        Condition::And(a, b) | Condition::Or(a, b) => {
            validate_known_predicates(a)?;
            validate_known_predicates(b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(key: &str, value: &str) -> WorkflowState {
        let mut state = WorkflowState::new("s1");
        state.set_artifact(key, value);
        state
    }

    #[test]
    fn parses_and_evaluates_named_predicate() {
        let cond = Condition::parse("voting_enabled").unwrap();
        assert!(!cond.evaluate(&WorkflowState::new("s1")));
        assert!(cond.evaluate(&state_with("voting_enabled", "true")));
    }

    #[test]
    fn parses_and_evaluates_state_equality() {
        let cond = Condition::parse(r#"workflow_state.phase == "done""#).unwrap();
        assert!(cond.evaluate(&state_with("phase", "done")));
        assert!(!cond.evaluate(&state_with("phase", "pending")));
    }

    #[test]
    fn parses_not() {
        let cond = Condition::parse("NOT voting_enabled").unwrap();
        assert!(cond.evaluate(&WorkflowState::new("s1")));
        assert!(!cond.evaluate(&state_with("voting_enabled", "true")));
    }

    #[test]
    fn parses_and_or_with_precedence() {
        let cond = Condition::parse("voting_enabled AND tie_exists OR disagreements_exist").unwrap();
        let state = state_with("disagreements", r#"["a"]"#);
        assert!(cond.evaluate(&state));

        let state = WorkflowState::new("s1");
        assert!(!cond.evaluate(&state));
    }

    #[test]
    fn parses_parenthesized_grouping() {
        let cond = Condition::parse("NOT (voting_enabled OR tie_exists)").unwrap();
        assert!(cond.evaluate(&WorkflowState::new("s1")));
        assert!(!cond.evaluate(&state_with("tie_exists", "true")));
    }

    #[test]
    fn disagreements_exist_checks_nonempty_json_array() {
        let cond = Condition::parse("disagreements_exist").unwrap();
        assert!(!cond.evaluate(&state_with("disagreements", "[]")));
        assert!(cond.evaluate(&state_with("disagreements", r#"[{"description":"x"}]"#)));
    }

    #[test]
    fn validate_known_predicates_rejects_typo() {
        let cond = Condition::parse("votin_enabled").unwrap();
        assert!(validate_known_predicates(&cond).is_err());
    }

    #[test]
    fn validate_known_predicates_accepts_closed_set() {
        let cond = Condition::parse("voting_enabled AND NOT tie_exists").unwrap();
        assert!(validate_known_predicates(&cond).is_ok());
    }
}
