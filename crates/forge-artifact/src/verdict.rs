//! Quality-gate verdicts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Issue severity, most severe first so `BTreeMap` iteration is worst-first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Points deducted from a sub-score per issue
    #[must_use]
    pub const fn penalty(self) -> f64 {
        match self {
            Self::Critical => 30.0,
            Self::High => 20.0,
            Self::Medium => 10.0,
            Self::Low => 5.0,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an issue is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Missing files, empty files, unparsable config
    Structure,
    /// A functional requirement with no trace in the artifact
    Coverage,
    Security,
    /// TODO / FIXME / placeholder markers
    Placeholder,
    MissingImplementation,
    EmptyImplementation,
    /// The stage produced no artifact for this iteration
    StageFailure,
    /// A sub-score evaluator could not run
    Evaluation,
}

impl IssueKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Coverage => "requirement coverage",
            Self::Security => "security",
            Self::Placeholder => "placeholder",
            Self::MissingImplementation => "missing implementation",
            Self::EmptyImplementation => "empty implementation",
            Self::StageFailure => "stage failure",
            Self::Evaluation => "evaluation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Issue {
    #[must_use]
    pub fn new(severity: Severity, kind: IssueKind, description: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            file: None,
            line: None,
            description: description.into(),
            suggestion: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn at(mut self, file: impl Into<String>, line: Option<usize>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.description)?;
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, " ({file}:{line})"),
            (Some(file), None) => write!(f, " ({file})"),
            _ => Ok(()),
        }
    }
}

/// Scored accept/reject judgment on one artifact
///
/// Produced fresh by every gate invocation. The score is clamped to
/// `[0, 100]` on construction and `passes` is fixed at that point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    score: f64,
    passes: bool,
    issues_by_severity: BTreeMap<Severity, Vec<Issue>>,
    recommendations: Vec<String>,
}

impl ReviewVerdict {
    /// `passes` is `score >= threshold`
    #[must_use]
    pub fn new(score: f64, threshold: f64) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) };
        Self {
            score,
            passes: score >= threshold,
            issues_by_severity: BTreeMap::new(),
            recommendations: Vec::new(),
        }
    }

    /// Zero score, never passes
    #[must_use]
    pub fn rejected() -> Self {
        Self {
            score: 0.0,
            passes: false,
            issues_by_severity: BTreeMap::new(),
            recommendations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues_by_severity
            .entry(issue.severity)
            .or_default()
            .push(issue);
        self
    }

    #[must_use]
    pub fn with_issues(self, issues: impl IntoIterator<Item = Issue>) -> Self {
        issues.into_iter().fold(self, Self::with_issue)
    }

    #[must_use]
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        let recommendation = recommendation.into();
        if !self.recommendations.contains(&recommendation) {
            self.recommendations.push(recommendation);
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[inline]
    #[must_use]
    pub fn passes(&self) -> bool {
        self.passes
    }

    #[inline]
    #[must_use]
    pub fn issues_by_severity(&self) -> &BTreeMap<Severity, Vec<Issue>> {
        &self.issues_by_severity
    }

    #[must_use]
    pub fn issues(&self, severity: Severity) -> &[Issue] {
        self.issues_by_severity
            .get(&severity)
            .map_or(&[], Vec::as_slice)
    }

    /// All issues, most severe first
    pub fn iter_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues_by_severity.values().flatten()
    }

    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.issues_by_severity.values().map(Vec::len).sum()
    }

    #[inline]
    #[must_use]
    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }
}
