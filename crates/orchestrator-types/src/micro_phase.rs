//! A granular unit of per-phase implementation work inside the coordinator's
//! `iterative_development` state.

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// A smaller unit used inside the coordinator's iterative-development state.
/// Each has acceptance criteria and a target branch name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroPhase {
    pub id: String,
    pub name: String,
    pub description: String,
    pub phase_type: String,
    pub files_to_generate: Vec<String>,
    pub dependencies: Vec<String>,
    pub priority: u32,
    pub estimated_duration_minutes: u32,
    pub acceptance_criteria: Vec<String>,
    pub branch_name: String,
    #[serde(default)]
    pub implementation_approach: String,
}

/// Verify that every `dependencies` entry resolves to another phase in the
/// set and that `dependencies` is acyclic across the given set of
/// micro-phases.
///
/// Returns a [`OrchestratorError::Configuration`] naming the first dangling
/// dependency or cycle participant found, which the caller surfaces at load
/// time rather than at execution time.
pub fn check_acyclic(phases: &[MicroPhase]) -> Result<(), OrchestratorError> {
    use std::collections::HashMap;

    let by_id: HashMap<&str, &MicroPhase> =
        phases.iter().map(|p| (p.id.as_str(), p)).collect();

    for phase in phases {
        for dep in &phase.dependencies {
            if !by_id.contains_key(dep.as_str()) {
                return Err(OrchestratorError::Configuration(format!(
                    "micro-phase '{}' depends on unknown phase '{dep}'",
                    phase.id
                )));
            }
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a MicroPhase>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<(), OrchestratorError> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(OrchestratorError::Configuration(format!(
                    "dependency cycle detected at micro-phase '{id}'"
                )));
            }
            None => {}
        }

        marks.insert(id, Mark::Visiting);
        if let Some(phase) = by_id.get(id) {
            for dep in &phase.dependencies {
                visit(dep, by_id, marks)?;
            }
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    for phase in phases {
        visit(&phase.id, &by_id, &mut marks)?;
    }
    Ok(())
}

/// Topologically order micro-phases so each phase follows all of its
/// dependencies. Assumes the set is already known to be acyclic and that
/// every dependency resolves to a phase in `phases` (see [`check_acyclic`]);
/// a dependency id with no matching phase is skipped rather than emitted, so
/// the result never names an id absent from `phases`.
pub fn topological_order(phases: &[MicroPhase]) -> Vec<String> {
    use std::collections::{HashMap, HashSet};

    let by_id: HashMap<&str, &MicroPhase> =
        phases.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut order: Vec<String> = Vec::with_capacity(phases.len());

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a MicroPhase>,
        visited: &mut HashSet<&'a str>,
        order: &mut Vec<String>,
    ) {
        if visited.contains(id) {
            return;
        }
        visited.insert(id);
        let Some(phase) = by_id.get(id) else {
            // Dangling dependency with no matching phase: checked and
            // rejected by `check_acyclic` before this runs, but skipped
            // here too rather than emitted, so callers indexing `order`
            // against `by_id` never hit a missing key.
            return;
        };
        for dep in &phase.dependencies {
            visit(dep, by_id, visited, order);
        }
        order.push(id.to_string());
    }

    for phase in phases {
        visit(&phase.id, &by_id, &mut visited, &mut order);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(id: &str, deps: &[&str]) -> MicroPhase {
        MicroPhase {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            phase_type: "backend".to_string(),
            files_to_generate: vec![],
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            priority: 1,
            estimated_duration_minutes: 10,
            acceptance_criteria: vec![],
            branch_name: format!("feature/{id}"),
            implementation_approach: String::new(),
        }
    }

    #[test]
    fn acyclic_graph_passes() {
        let phases = vec![phase("a", &[]), phase("b", &["a"]), phase("c", &["a", "b"])];
        assert!(check_acyclic(&phases).is_ok());
    }

    #[test]
    fn self_cycle_is_detected() {
        let phases = vec![phase("a", &["a"])];
        assert!(check_acyclic(&phases).is_err());
    }

    #[test]
    fn indirect_cycle_is_detected() {
        let phases = vec![phase("a", &["b"]), phase("b", &["a"])];
        assert!(check_acyclic(&phases).is_err());
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let phases = vec![phase("a", &["ghost"])];
        let err = check_acyclic(&phases).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn topological_order_skips_dangling_dependency_ids() {
        let phases = vec![phase("a", &["ghost"]), phase("b", &["a"])];
        let order = topological_order(&phases);
        assert!(!order.contains(&"ghost".to_string()));
        assert_eq!(order, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let phases = vec![phase("c", &["a", "b"]), phase("a", &[]), phase("b", &["a"])];
        let order = topological_order(&phases);
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }
}
