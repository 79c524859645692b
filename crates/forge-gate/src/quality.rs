//! Maintainability review: unfinished code detection
//!
//! Looks for the things generated code most often leaves behind: TODO-style
//! comments, explicit "not implemented" markers and functions whose body is a
//! bare `pass` or `return`.

use crate::context::ReviewContext;
use crate::error::EvaluationError;
use crate::evaluator::{Evaluator, SubScore};
use forge_artifact::{Issue, IssueKind, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Locations listed per issue kind in improvement instructions
pub const MAX_LOCATIONS_PER_KIND: usize = 5;

pub const NO_INSTRUCTIONS: &str = "No specific improvement instructions - code appears complete";

static PLACEHOLDER_COMMENT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)(#|//|/\*|^\s*\*)\s*(todo|fixme|xxx|hack|implement|placeholder)\b").ok()
});

static MISSING_IMPLEMENTATION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(raise\s+NotImplementedError|throw\s+new\s+\w*Error\(\s*["']not\s+implemented|NotImplementedException|\btodo!\s*\(|\bunimplemented!\s*\()"#,
    )
    .ok()
});

static EMPTY_JS_FUNCTION: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\bfunction\s+\w+\s*\([^)]*\)\s*\{\s*\}").ok());

fn matches(pattern: &Lazy<Option<Regex>>, line: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(line))
}

fn indent(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Python functions whose whole body is `pass`, `...` or a bare return
fn stub_functions(path: &str, text: &str, issues: &mut Vec<Issue>) {
    let lines: Vec<&str> = text.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        let is_def = (trimmed.starts_with("def ") || trimmed.starts_with("async def "))
            && trimmed.trim_end().ends_with(':');
        if !is_def {
            continue;
        }
        let def_indent = indent(line);

        let mut body = lines[idx + 1..]
            .iter()
            .enumerate()
            .map(|(offset, l)| (idx + 2 + offset, *l))
            .filter(|(_, l)| {
                let t = l.trim();
                !t.is_empty() && !t.starts_with('#') && !is_docstring_line(t)
            });

        let Some((line_no, first)) = body.next() else {
            continue;
        };
        if indent(first) <= def_indent {
            continue;
        }
        let only_statement = body.next().map_or(true, |(_, next)| indent(next) <= def_indent);
        if !only_statement {
            continue;
        }

        let statement = first.trim();
        let name = trimmed
            .trim_start_matches("async ")
            .trim_start_matches("def ")
            .split('(')
            .next()
            .unwrap_or_default();
        if statement == "pass" || statement == "..." {
            issues.push(
                Issue::new(
                    Severity::High,
                    IssueKind::MissingImplementation,
                    format!("function `{name}` has no implementation"),
                )
                .at(path, Some(line_no))
                .with_suggestion("implement the function body"),
            );
        } else if statement == "return" || statement == "return None" {
            issues.push(
                Issue::new(
                    Severity::Medium,
                    IssueKind::EmptyImplementation,
                    format!("function `{name}` only returns None"),
                )
                .at(path, Some(line_no))
                .with_suggestion("return the computed result"),
            );
        }
    }
}

fn is_docstring_line(trimmed: &str) -> bool {
    let quoted = |q: &str| trimmed.starts_with(q) && trimmed.len() >= 6 && trimmed.ends_with(q);
    quoted("\"\"\"") || quoted("'''")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaintainabilityEvaluator;

impl MaintainabilityEvaluator {
    /// All unfinished-code issues in one file
    #[must_use]
    pub fn analyze_file(path: &str, text: &str) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line_no = Some(idx + 1);
            if matches(&MISSING_IMPLEMENTATION, line) {
                issues.push(
                    Issue::new(
                        Severity::High,
                        IssueKind::MissingImplementation,
                        "explicit not-implemented marker",
                    )
                    .at(path, line_no)
                    .with_suggestion("replace the marker with working code"),
                );
            } else if matches(&PLACEHOLDER_COMMENT, line) {
                issues.push(
                    Issue::new(Severity::Medium, IssueKind::Placeholder, "unfinished-work comment")
                        .at(path, line_no)
                        .with_suggestion("complete the work and remove the comment"),
                );
            } else if matches(&EMPTY_JS_FUNCTION, line) {
                issues.push(
                    Issue::new(Severity::Medium, IssueKind::EmptyImplementation, "empty function body")
                        .at(path, line_no)
                        .with_suggestion("implement the function body"),
                );
            }
        }
        if path.ends_with(".py") {
            stub_functions(path, text, &mut issues);
        }
        issues
    }
}

impl Evaluator for MaintainabilityEvaluator {
    fn name(&self) -> &'static str {
        "maintainability"
    }

    fn evaluate(&self, ctx: &ReviewContext<'_>) -> Result<SubScore, EvaluationError> {
        let issues = ctx
            .code_files()
            .flat_map(|(path, text)| Self::analyze_file(path, text))
            .collect();
        Ok(SubScore::from_issues(issues))
    }
}

/// Group unfinished-code issues by kind into actionable instructions
#[must_use]
pub fn improvement_instructions(issues: &[Issue]) -> String {
    let mut by_kind: BTreeMap<IssueKind, Vec<&Issue>> = BTreeMap::new();
    for issue in issues.iter().filter(|i| {
        matches!(
            i.kind,
            IssueKind::Placeholder | IssueKind::MissingImplementation | IssueKind::EmptyImplementation
        )
    }) {
        by_kind.entry(issue.kind).or_default().push(issue);
    }
    if by_kind.is_empty() {
        return NO_INSTRUCTIONS.to_string();
    }

    let mut out = String::new();
    for (kind, group) in by_kind {
        let locations: Vec<String> = group
            .iter()
            .take(MAX_LOCATIONS_PER_KIND)
            .map(|i| match (&i.file, i.line) {
                (Some(file), Some(line)) => format!("{file}:{line}"),
                (Some(file), None) => file.clone(),
                _ => i.description.clone(),
            })
            .collect();
        let _ = write!(out, "Resolve {} {} issue(s): {}", group.len(), kind.label(), locations.join(", "));
        if group.len() > MAX_LOCATIONS_PER_KIND {
            let _ = write!(out, " (+{} more)", group.len() - MAX_LOCATIONS_PER_KIND);
        }
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out
}
