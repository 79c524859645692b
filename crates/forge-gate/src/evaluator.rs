//! Sub-score evaluator seam

use crate::context::ReviewContext;
use crate::error::EvaluationError;
use forge_artifact::Issue;

/// One independent 0-100 sub-score with the issues that reduced it
#[derive(Debug, Clone, PartialEq)]
pub struct SubScore {
    pub score: f64,
    pub issues: Vec<Issue>,
}

impl SubScore {
    /// 100 minus the severity penalty of every issue, floored at zero
    #[must_use]
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let penalty: f64 = issues.iter().map(|i| i.severity.penalty()).sum();
        Self {
            score: (100.0 - penalty).max(0.0),
            issues,
        }
    }
}

pub trait Evaluator: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    /// Returns [`EvaluationError`] when the artifact cannot be judged.
    fn evaluate(&self, ctx: &ReviewContext<'_>) -> Result<SubScore, EvaluationError>;
}
