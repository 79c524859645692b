//! Aggregated project result and its read-only projections

use crate::error::FanOutFailure;
use crate::session::{GateOutcome, IterationState, ProjectSession};
use chrono::{DateTime, Utc};
use forge_artifact::{Artifact, Category, ContentHash, ProjectId, Requirement, Severity, StageKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

/// File name of the rendered review in the docs projection
pub const REVIEW_REPORT_FILE: &str = "review_report.md";

/// Files per category, ordered by relative path
pub type Projection = BTreeMap<Category, BTreeMap<String, Vec<u8>>>;

#[derive(Debug, Clone)]
pub struct ProjectResult {
    pub project_id: ProjectId,
    pub requirement: Arc<Requirement>,
    pub outcome: GateOutcome,
    pub gated: IterationState,
    pub fan_out: BTreeMap<StageKind, Result<Arc<Artifact>, FanOutFailure>>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Serializable overview written next to the generated files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project_id: String,
    pub requirement_name: String,
    pub outcome: GateOutcome,
    pub iterations_used: usize,
    pub final_score: Option<f64>,
    pub code_hash: Option<ContentHash>,
    pub files_per_category: BTreeMap<Category, usize>,
    pub fan_out_failures: BTreeMap<StageKind, String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ProjectResult {
    pub(crate) fn from_session(
        session: ProjectSession,
        outcome: GateOutcome,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let fan_out = session
            .fan_out_slots()
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        Self {
            project_id: session.project_id,
            requirement: session.requirement,
            outcome,
            gated: session.gated,
            fan_out,
            started_at: session.started_at,
            completed_at,
        }
    }

    /// True when the code stage never cleared the threshold
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.outcome == GateOutcome::Exhausted
    }

    /// Artifact of record for the gated code stage
    #[must_use]
    pub fn code_artifact(&self) -> Option<&Arc<Artifact>> {
        self.gated.latest_artifact()
    }

    #[must_use]
    pub fn artifact(&self, stage: StageKind) -> Option<&Arc<Artifact>> {
        if stage == self.gated.stage() {
            return self.code_artifact();
        }
        self.fan_out.get(&stage).and_then(|result| result.as_ref().ok())
    }

    pub fn fan_out_failures(&self) -> impl Iterator<Item = (StageKind, &FanOutFailure)> {
        self.fan_out
            .iter()
            .filter_map(|(kind, result)| result.as_ref().err().map(|failure| (*kind, failure)))
    }

    /// Every produced file grouped by output category
    ///
    /// The rendered review report is added under docs.
    #[must_use]
    pub fn projection(&self) -> Projection {
        let mut out = Projection::new();
        let produced = self
            .code_artifact()
            .into_iter()
            .chain(self.fan_out.values().filter_map(|r| r.as_ref().ok()));
        for artifact in produced {
            let Some(category) = artifact.stage().category() else {
                continue;
            };
            let files = out.entry(category).or_default();
            for (path, content) in artifact.files() {
                files.insert(path.clone(), content.clone());
            }
        }
        out.entry(Category::Docs)
            .or_default()
            .insert(REVIEW_REPORT_FILE.to_string(), self.review_report().into_bytes());
        out
    }

    #[must_use]
    pub fn summary(&self) -> ProjectSummary {
        let files_per_category = self
            .projection()
            .iter()
            .map(|(category, files)| (*category, files.len()))
            .collect();
        ProjectSummary {
            project_id: self.project_id.to_string(),
            requirement_name: self.requirement.name.clone(),
            outcome: self.outcome,
            iterations_used: self.gated.history().len(),
            final_score: self.gated.final_verdict().map(|v| v.score()),
            code_hash: self.code_artifact().map(|a| a.hash()),
            files_per_category,
            fan_out_failures: self
                .fan_out_failures()
                .map(|(kind, failure)| (kind, failure.to_string()))
                .collect(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    /// Markdown review of the final gated verdict
    #[must_use]
    pub fn review_report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Review Report: {}\n", self.requirement.name);
        let _ = writeln!(out, "- Project: `{}`", self.project_id);
        let outcome = match self.outcome {
            GateOutcome::Accepted => "accepted",
            GateOutcome::Exhausted => "exhausted (accepted below threshold)",
        };
        let _ = writeln!(out, "- Outcome: {outcome}");
        let _ = writeln!(out, "- Iterations: {}", self.gated.history().len());

        let Some(verdict) = self.gated.final_verdict() else {
            out.push_str("\nNo review was recorded.\n");
            return out;
        };
        let _ = writeln!(
            out,
            "- Final score: {:.1}/100 ({})",
            verdict.score(),
            if verdict.passes() { "passed" } else { "failed" }
        );

        out.push_str("\n## Issues\n");
        if verdict.issue_count() == 0 {
            out.push_str("\nNo issues found.\n");
        }
        for severity in Severity::ALL {
            let issues = verdict.issues(severity);
            if issues.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n### {severity} ({})\n", issues.len());
            for issue in issues {
                let _ = write!(out, "- {issue}");
                if let Some(suggestion) = &issue.suggestion {
                    let _ = write!(out, " -> {suggestion}");
                }
                out.push('\n');
            }
        }

        if !verdict.recommendations().is_empty() {
            out.push_str("\n## Recommendations\n\n");
            for rec in verdict.recommendations() {
                let _ = writeln!(out, "- {rec}");
            }
        }

        out.push_str("\n## Iterations\n\n| # | Score | Verdict | Issues |\n|---|-------|---------|--------|\n");
        for record in self.gated.history() {
            let _ = writeln!(
                out,
                "| {} | {:.1} | {} | {} |",
                record.iteration + 1,
                record.verdict.score(),
                if record.verdict.passes() { "passed" } else { "rejected" },
                record.verdict.issue_count()
            );
        }

        if !self.fan_out.is_empty() {
            out.push_str("\n## Fan-out stages\n\n");
            for (kind, result) in &self.fan_out {
                match result {
                    Ok(artifact) => {
                        let _ = writeln!(out, "- {kind}: {} file(s)", artifact.file_count());
                    }
                    Err(failure) => {
                        let _ = writeln!(out, "- {kind}: failed ({failure})");
                    }
                }
            }
        }
        out
    }
}
