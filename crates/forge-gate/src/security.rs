//! Pattern-based security review of source files

use crate::context::ReviewContext;
use crate::error::EvaluationError;
use crate::evaluator::{Evaluator, SubScore};
use forge_artifact::{Issue, IssueKind, Severity};
use once_cell::sync::Lazy;
use regex::Regex;

struct Rule {
    pattern: Regex,
    /// Line is exempt when it contains this text
    unless: Option<&'static str>,
    severity: Severity,
    description: &'static str,
    suggestion: &'static str,
}

fn rule(
    pattern: &str,
    severity: Severity,
    description: &'static str,
    suggestion: &'static str,
) -> Option<Rule> {
    match Regex::new(pattern) {
        Ok(pattern) => Some(Rule {
            pattern,
            unless: None,
            severity,
            description,
            suggestion,
        }),
        Err(error) => {
            tracing::error!(%error, pattern, "invalid security rule pattern");
            None
        }
    }
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    [
        rule(
            r"shell\s*=\s*True",
            Severity::Critical,
            "subprocess invoked through the shell",
            "pass an argument list and keep shell=False",
        ),
        rule(
            r#"(?i)\b(password|passwd|secret|api_?key|access_?token|auth_?token)\b\s*[:=]\s*["'][^"'\s]{4,}["']"#,
            Severity::High,
            "hard-coded credential",
            "load secrets from the environment or a secret store",
        ),
        rule(
            r"\beval\s*\(",
            Severity::High,
            "dynamic code evaluation",
            "parse input explicitly instead of evaluating it",
        ),
        rule(
            r"\bexec\s*\(",
            Severity::High,
            "dynamic code execution",
            "remove exec and call the code directly",
        ),
        rule(
            r"\bos\.system\s*\(",
            Severity::High,
            "shell command execution",
            "use subprocess with an argument list",
        ),
        rule(
            r#"(?i)["'][^"'\n]*\b(select\s.+\sfrom|insert\s+into|update\s+\w+\s+set|delete\s+from)\b[^"'\n]*["']\s*(\+|%)"#,
            Severity::High,
            "SQL built by string concatenation",
            "use parameterised queries",
        ),
        rule(
            r#"(?i)\bf["'][^"'\n]*\b(select\s.+\sfrom|insert\s+into|update\s+\w+\s+set|delete\s+from)\b[^"'\n]*\{"#,
            Severity::High,
            "SQL built by string interpolation",
            "use parameterised queries",
        ),
        rule(
            r"\bpickle\.loads?\s*\(",
            Severity::Medium,
            "unsafe deserialisation",
            "use a data-only format such as JSON",
        ),
        rule(
            r"\byaml\.load\s*\(",
            Severity::Medium,
            "yaml.load without a safe loader",
            "use yaml.safe_load",
        )
        .map(|r| Rule {
            unless: Some("SafeLoader"),
            ..r
        }),
        rule(
            r"(?i)\bverify\s*=\s*False\b",
            Severity::Medium,
            "TLS certificate verification disabled",
            "keep certificate verification enabled",
        ),
        rule(
            r"(?i)\bdebug\s*=\s*True\b",
            Severity::Medium,
            "debug mode enabled",
            "drive debug mode from configuration and default it off",
        ),
        rule(
            r"(?i)\b(hashlib\.)?(md5|sha1)\s*\(",
            Severity::Low,
            "weak hash function",
            "use sha256 or a password hashing function such as bcrypt",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
});

#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityEvaluator;

impl Evaluator for SecurityEvaluator {
    fn name(&self) -> &'static str {
        "security"
    }

    fn evaluate(&self, ctx: &ReviewContext<'_>) -> Result<SubScore, EvaluationError> {
        let mut issues = Vec::new();
        for (path, text) in ctx.code_files() {
            for (idx, line) in text.lines().enumerate() {
                for rule in RULES.iter() {
                    if rule.unless.is_some_and(|exempt| line.contains(exempt)) {
                        continue;
                    }
                    if rule.pattern.is_match(line) {
                        issues.push(
                            Issue::new(rule.severity, IssueKind::Security, rule.description)
                                .at(path, Some(idx + 1))
                                .with_suggestion(rule.suggestion),
                        );
                    }
                }
            }
        }
        Ok(SubScore::from_issues(issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_artifact::{Artifact, Requirement, StageKind};
    use std::collections::BTreeMap;

    fn scan(path: &str, source: &str) -> SubScore {
        let artifact = Artifact::new(StageKind::Code, [(path, source)], BTreeMap::new()).unwrap();
        let requirement = Requirement::new("Calc", "");
        let ctx = ReviewContext::new(&artifact, &requirement).unwrap();
        SecurityEvaluator.evaluate(&ctx).unwrap()
    }

    fn descriptions(score: &SubScore) -> Vec<&str> {
        score.issues.iter().map(|i| i.description.as_str()).collect()
    }

    #[test]
    fn all_rules_compile() {
        assert_eq!(RULES.len(), 12);
    }

    #[test]
    fn clean_code_scores_full_marks() {
        let score = scan("calc.py", "def add(a, b):\n    return a + b\n");
        assert_eq!(score.score, 100.0);
        assert!(score.issues.is_empty());
    }

    #[test]
    fn detects_eval_and_reports_line() {
        let score = scan("calc.py", "x = input()\nprint(eval(x))\n");
        assert_eq!(descriptions(&score), vec!["dynamic code evaluation"]);
        assert_eq!(score.issues[0].line, Some(2));
        assert_eq!(score.score, 80.0);
    }

    #[test]
    fn detects_credentials_and_shell() {
        let score = scan(
            "app.py",
            "API_KEY = \"sk-live-12345\"\nsubprocess.run(cmd, shell=True)\n",
        );
        assert!(descriptions(&score).contains(&"hard-coded credential"));
        assert!(descriptions(&score).contains(&"subprocess invoked through the shell"));
        assert_eq!(score.score, 50.0);
    }

    #[test]
    fn detects_sql_concatenation() {
        let score = scan("db.py", "cur.execute(\"SELECT * FROM users WHERE id = \" + uid)\n");
        assert_eq!(descriptions(&score), vec!["SQL built by string concatenation"]);
        let score = scan("db.py", "cur.execute(f\"DELETE FROM users WHERE id = {uid}\")\n");
        assert_eq!(descriptions(&score), vec!["SQL built by string interpolation"]);
    }

    #[test]
    fn safe_loader_is_exempt() {
        let score = scan("cfg.py", "data = yaml.load(f, Loader=yaml.SafeLoader)\n");
        assert!(score.issues.is_empty());
        let score = scan("cfg.py", "data = yaml.load(f)\n");
        assert_eq!(descriptions(&score), vec!["yaml.load without a safe loader"]);
    }

    #[test]
    fn non_code_files_are_ignored() {
        let score = scan("README.md", "Never call eval( on user input\n");
        assert!(score.issues.is_empty());
    }

    #[test]
    fn executemany_is_not_exec() {
        let score = scan("db.py", "cur.executemany(q, rows)\n");
        assert!(score.issues.is_empty());
    }
}
