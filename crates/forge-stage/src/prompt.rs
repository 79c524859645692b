//! Pure prompt rendering helpers
//!
//! Everything here is deterministic in its inputs; no clocks, no randomness.

use crate::error::AttemptFailure;
use crate::feedback::Feedback;
use forge_artifact::{Artifact, Requirement};
use std::fmt::Write;

/// Issues listed in a feedback section
pub const MAX_FEEDBACK_ISSUES: usize = 10;

/// Per-file character budget when showing upstream code to a downstream stage
pub const MAX_FILE_CHARS: usize = 4_000;

/// Total character budget for upstream code context
pub const MAX_CONTEXT_CHARS: usize = 16_000;

#[must_use]
pub fn render_requirement(requirement: &Requirement) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Project: {}", requirement.name);
    if !requirement.description.is_empty() {
        let _ = writeln!(out, "Description: {}", requirement.description);
    }
    if !requirement.functional_items.is_empty() {
        out.push_str("Functional requirements:\n");
        for item in &requirement.functional_items {
            let _ = write!(out, "- {} [{:?}]", item.title, item.priority);
            if !item.description.is_empty() {
                let _ = write!(out, ": {}", item.description);
            }
            out.push('\n');
            for criterion in &item.acceptance_criteria {
                let _ = writeln!(out, "  * accept when: {criterion}");
            }
        }
    }
    if !requirement.non_functional_items.is_empty() {
        out.push_str("Non-functional requirements:\n");
        for item in &requirement.non_functional_items {
            let _ = writeln!(out, "- {}: {}", item.title, item.description);
        }
    }
    render_list(&mut out, "Constraints", &requirement.constraints);
    render_list(&mut out, "Key components", &requirement.key_components);
    if let Some(arch) = &requirement.suggested_architecture {
        let _ = writeln!(out, "Suggested architecture: {arch}");
    }
    out
}

fn render_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{heading}:");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

/// Review feedback section, most severe issues first
#[must_use]
pub fn render_feedback(feedback: &Feedback) -> String {
    let verdict = &feedback.verdict;
    let mut out = String::from("REVIEW FEEDBACK ON YOUR PREVIOUS ATTEMPT\n");
    let _ = writeln!(
        out,
        "Score: {:.0}/100 (acceptance threshold {:.0}). The previous attempt was rejected.",
        verdict.score(),
        feedback.threshold
    );

    if verdict.issue_count() > 0 {
        out.push_str("Issues to fix:\n");
        for issue in verdict.iter_issues().take(MAX_FEEDBACK_ISSUES) {
            let _ = write!(out, "- ({}) {issue}", issue.severity);
            if let Some(suggestion) = &issue.suggestion {
                let _ = write!(out, " -> {suggestion}");
            }
            out.push('\n');
        }
        let hidden = verdict.issue_count().saturating_sub(MAX_FEEDBACK_ISSUES);
        if hidden > 0 {
            let _ = writeln!(out, "- ... and {hidden} more issue(s) of lower severity");
        }
    }

    if !verdict.recommendations().is_empty() {
        out.push_str("Recommendations:\n");
        for rec in verdict.recommendations() {
            let _ = writeln!(out, "- {rec}");
        }
    }

    if !feedback.previous_paths.is_empty() {
        let _ = writeln!(out, "Files in the previous attempt: {}", feedback.previous_paths.join(", "));
    }
    out.push_str("Produce a complete replacement that resolves every issue above.\n");
    out
}

#[must_use]
pub fn render_failure_note(failure: &AttemptFailure) -> String {
    format!("NOTE: {}\n", failure.reformulation_note())
}

/// Upstream files with per-file and total truncation
#[must_use]
pub fn render_artifact_context(artifact: &Artifact) -> String {
    let mut out = String::new();
    let mut budget = MAX_CONTEXT_CHARS;
    for (path, text) in artifact.text_files() {
        if budget == 0 {
            let _ = writeln!(out, "--- {path} (omitted)");
            continue;
        }
        let limit = MAX_FILE_CHARS.min(budget);
        let shown = truncate_chars(text, limit);
        budget = budget.saturating_sub(shown.chars().count());
        let _ = writeln!(out, "--- {path}");
        out.push_str(shown);
        if shown.len() < text.len() {
            out.push_str("\n[truncated]");
        }
        out.push('\n');
    }
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_artifact::{FunctionalItem, Issue, IssueKind, ReviewVerdict, Severity, StageKind};
    use std::collections::BTreeMap;

    #[test]
    fn feedback_embeds_issues_and_recommendations() {
        let verdict = ReviewVerdict::new(55.0, 70.0)
            .with_issue(
                Issue::new(Severity::High, IssueKind::Coverage, "missing input validation")
                    .with_suggestion("reject non-numeric input"),
            )
            .with_recommendation("Improve security measures and input validation");
        let text = render_feedback(&Feedback::new(verdict, 70.0));

        assert!(text.contains("Score: 55/100"));
        assert!(text.contains("missing input validation -> reject non-numeric input"));
        assert!(text.contains("Improve security measures"));
    }

    #[test]
    fn feedback_caps_issue_list() {
        let verdict = ReviewVerdict::new(10.0, 70.0).with_issues(
            (0..15).map(|i| Issue::new(Severity::Low, IssueKind::Placeholder, format!("todo {i}"))),
        );
        let text = render_feedback(&Feedback::new(verdict, 70.0));
        assert!(text.contains("todo 9"));
        assert!(!text.contains("todo 10"));
        assert!(text.contains("and 5 more"));
    }

    #[test]
    fn requirement_rendering_lists_criteria() {
        let requirement = Requirement::new("Calculator App", "arithmetic").with_functional_item(
            FunctionalItem::new("Division").with_criterion("division by zero is reported"),
        );
        let text = render_requirement(&requirement);
        assert!(text.starts_with("Project: Calculator App\n"));
        assert!(text.contains("accept when: division by zero is reported"));
    }

    #[test]
    fn context_respects_total_budget() {
        let big = "x".repeat(MAX_FILE_CHARS * 2);
        let files: Vec<_> = (0..6).map(|i| (format!("f{i}.py"), big.clone())).collect();
        let artifact = Artifact::new(StageKind::Code, files, BTreeMap::new()).unwrap();
        let text = render_artifact_context(&artifact);
        assert!(text.contains("--- f5.py (omitted)"));
        assert!(text.matches("[truncated]").count() == 4);
    }
}
