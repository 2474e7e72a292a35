//! Validation rules engine: checks a phase's response content
//! against its declared `ValidationRules`, in a fixed rule order so the
//! first failing rule's message is reproducible.

use orchestrator_types::ValidationRules;

const CODE_MARKERS: [&str; 5] = ["class ", "fn ", "def ", "import ", "\"\"\""];
const INTEGRATION_MARKERS: [&str; 6] = ["container", "config", "env", "database", "api", "cors"];

/// Check `content` against `rules`, returning the first violated rule's
/// human-readable reason, or `None` if every declared rule is satisfied.
/// `required_elements` is checked before `required_sections`, each
/// independently, in declaration order.
pub fn first_violation(content: &str, rules: &ValidationRules) -> Option<String> {
    if let Some(min) = rules.min_content_length {
        if content.len() < min {
            return Some(format!("content length {} is below min_content_length {min}", content.len()));
        }
    }

    for element in &rules.required_elements {
        if !contains_element_variation(content, element) {
            return Some(format!("missing required element '{element}'"));
        }
    }

    for section in &rules.required_sections {
        if !content.to_lowercase().contains(&section.to_lowercase()) {
            return Some(format!("missing required section '{section}'"));
        }
    }

    for file in &rules.required_files {
        let delimiter_form = format!("===== {file} =====");
        if !content.contains(file.as_str()) && !content.contains(&delimiter_form) {
            return Some(format!("missing required file '{file}'"));
        }
    }

    for feature in &rules.required_features {
        if !content.to_lowercase().contains(&feature.to_lowercase()) {
            return Some(format!("missing required feature '{feature}'"));
        }
    }

    for component in &rules.required_components {
        if !content.to_lowercase().contains(&component.to_lowercase()) {
            return Some(format!("missing required component '{component}'"));
        }
    }

    for endpoint in &rules.required_endpoints {
        if !content.to_lowercase().contains(&endpoint.to_lowercase()) {
            return Some(format!("missing required endpoint '{endpoint}'"));
        }
    }

    for operation in &rules.required_operations {
        if !content.to_lowercase().contains(&operation.to_lowercase()) {
            return Some(format!("missing required operation '{operation}'"));
        }
    }

    if rules.code_quality_check {
        let lower = content.to_lowercase();
        let hits = CODE_MARKERS.iter().filter(|marker| lower.contains(&marker.to_lowercase())).count();
        if hits < 2 {
            return Some("code_quality_check: fewer than 2 code-shape markers present".to_string());
        }
    }

    if rules.integration_test {
        let lower = content.to_lowercase();
        let hits = INTEGRATION_MARKERS.iter().filter(|marker| lower.contains(*marker)).count();
        if hits < 3 {
            return Some("integration_test: fewer than 3 integration markers present".to_string());
        }
    }

    None
}

/// `required_elements` accepts the original token, its upper-case form, a
/// title-case-with-spaces form, and a markdown-heading-prefixed form.
fn contains_element_variation(content: &str, token: &str) -> bool {
    let spaced = token.replace(['_', '-'], " ");
    let title_case = spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    let variations = [
        token.to_string(),
        token.to_uppercase(),
        spaced.clone(),
        title_case.clone(),
        format!("# {token}"),
        format!("## {token}"),
        format!("## {title_case}"),
    ];
    variations.iter().any(|variant| content.contains(variant.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ValidationRules {
        ValidationRules::default()
    }

    #[test]
    fn no_violation_when_rules_empty() {
        assert!(first_violation("anything", &rules()).is_none());
    }

    #[test]
    fn min_content_length_violation() {
        let mut r = rules();
        r.min_content_length = Some(10);
        assert!(first_violation("short", &r).is_some());
        assert!(first_violation("long enough content", &r).is_none());
    }

    #[test]
    fn required_elements_accepts_heading_and_title_case_variants() {
        let mut r = rules();
        r.required_elements = vec!["core_features".to_string()];
        assert!(first_violation("## Core Features\n...", &r).is_none());
        assert!(first_violation("CORE_FEATURES: foo", &r).is_none());
        assert!(first_violation("unrelated text", &r).is_some());
    }

    #[test]
    fn required_elements_checked_before_required_sections() {
        let mut r = rules();
        r.required_elements = vec!["missing_element".to_string()];
        r.required_sections = vec!["ALSO_MISSING".to_string()];
        let violation = first_violation("nothing here", &r).unwrap();
        assert!(violation.contains("missing_element"));
    }

    #[test]
    fn required_files_accepts_delimiter_form() {
        let mut r = rules();
        r.required_files = vec!["main.rs".to_string()];
        assert!(first_violation("===== main.rs =====\nfn main() {}", &r).is_none());
        assert!(first_violation("no file mentioned", &r).is_some());
    }

    #[test]
    fn code_quality_check_requires_two_markers() {
        let mut r = rules();
        r.code_quality_check = true;
        assert!(first_violation("just a sentence", &r).is_some());
        assert!(first_violation("fn main() {}\nimport std;", &r).is_none());
    }

    #[test]
    fn integration_test_requires_three_markers() {
        let mut r = rules();
        r.integration_test = true;
        assert!(first_violation("container and config only", &r).is_some());
        assert!(first_violation("container, config, and env vars set up; database ready", &r).is_none());
    }
}
