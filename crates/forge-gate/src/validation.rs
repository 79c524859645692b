//! Structural validation and requirement coverage

use crate::context::{extension, ReviewContext};
use crate::error::EvaluationError;
use crate::evaluator::{Evaluator, SubScore};
use forge_artifact::{Issue, IssueKind, Severity, StageKind};
use serde::de::IgnoredAny;

/// File stems accepted as a program entry point
pub const ENTRY_STEMS: &[&str] = &[
    "main", "app", "index", "server", "lib", "__main__", "program", "cli", "manage",
];

const STOPWORDS: &[&str] = &[
    "with", "from", "that", "this", "into", "user", "users", "able", "should", "must", "have",
    "allow", "allows", "support", "feature", "system", "basic", "simple", "the", "and", "for",
];

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match extension(name) {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    }
}

/// Lower-case content words of a requirement title
#[must_use]
pub fn keywords(title: &str) -> Vec<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationEvaluator;

impl Evaluator for ValidationEvaluator {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn evaluate(&self, ctx: &ReviewContext<'_>) -> Result<SubScore, EvaluationError> {
        let mut issues = Vec::new();
        let files = ctx.artifact.files();

        let empty: Vec<&str> = files
            .iter()
            .filter(|(_, content)| content.iter().all(u8::is_ascii_whitespace))
            .map(|(path, _)| path.as_str())
            .collect();
        if empty.len() == files.len() {
            issues.push(
                Issue::new(Severity::Critical, IssueKind::Structure, "every generated file is empty")
                    .with_suggestion("generate the file contents"),
            );
        } else {
            for path in empty {
                issues.push(
                    Issue::new(Severity::Medium, IssueKind::Structure, "empty file")
                        .at(path, None)
                        .with_suggestion("fill in or remove the file"),
                );
            }
        }

        for (path, text) in ctx.texts() {
            if extension(path).is_some_and(|e| e.eq_ignore_ascii_case("json"))
                && !text.trim().is_empty()
                && serde_json::from_str::<IgnoredAny>(text).is_err()
            {
                issues.push(
                    Issue::new(Severity::High, IssueKind::Structure, "JSON file does not parse")
                        .at(path, None)
                        .with_suggestion("emit valid JSON"),
                );
            }
        }

        if ctx.artifact.stage() == StageKind::Code {
            let has_entry = files
                .keys()
                .any(|path| ENTRY_STEMS.contains(&file_stem(path).to_ascii_lowercase().as_str()));
            if !has_entry {
                issues.push(
                    Issue::new(Severity::Medium, IssueKind::Structure, "no program entry point")
                        .with_suggestion("add a main/app/index entry file"),
                );
            }
        }

        let corpus: String = ctx
            .texts()
            .flat_map(|(path, text)| [path, "\n", text, "\n"])
            .collect::<String>()
            .to_lowercase();
        for item in &ctx.requirement.functional_items {
            let words = keywords(&item.title);
            if words.is_empty() {
                continue;
            }
            if !words.iter().any(|w| corpus.contains(w.as_str())) {
                issues.push(
                    Issue::new(
                        Severity::Medium,
                        IssueKind::Coverage,
                        format!("functional requirement `{}` has no trace in the artifact", item.title),
                    )
                    .with_suggestion(format!("implement `{}`", item.title)),
                );
            }
        }

        Ok(SubScore::from_issues(issues))
    }
}
