//! Evaluator failures

/// A sub-score evaluator could not judge the artifact at all
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("artifact has no files")]
    NoFiles,

    #[error("artifact has no readable text files")]
    NoReadableText,

    #[error("{evaluator} evaluator failed: {reason}")]
    Failed {
        evaluator: &'static str,
        reason: String,
    },
}
