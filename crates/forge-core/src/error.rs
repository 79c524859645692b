//! Error types for the pipeline controller
//!
//! A gated stage that never clears the quality bar is not an error: it ends
//! as [`GateOutcome::Exhausted`](crate::GateOutcome::Exhausted). The types
//! here cover what stops a project from starting, configuration problems and
//! isolated fan-out failures.

use crate::state::GateState;
use forge_artifact::StageKind;
use forge_model::GenerationError;
use forge_stage::StageFailure;

/// Conditions that prevent a project from producing a result
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("request is empty")]
    EmptyRequest,

    /// Requirement structuring exhausted its local budget
    #[error("requirement structuring failed: {0}")]
    Requirements(#[from] StageFailure),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The generation backend could not be constructed
    #[error("generation backend unavailable: {0}")]
    Backend(#[from] GenerationError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl PipelineError {
    /// True when retrying the same request might succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Requirements(StageFailure::ExtractionExhausted { .. }))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("illegal gate transition {from:?} -> {to:?}")]
    IllegalTransition { from: GateState, to: GateState },
}

/// Why a fan-out stage has no artifact
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FanOutFailure {
    #[error(transparent)]
    Stage(#[from] StageFailure),

    /// The task ended without reporting (panicked or was cancelled)
    #[error("{stage} task aborted: {reason}")]
    Aborted { stage: StageKind, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_stage::AttemptFailure;

    #[test]
    fn only_exhausted_requirements_are_retryable() {
        let exhausted = PipelineError::Requirements(StageFailure::ExtractionExhausted {
            stage: StageKind::Requirements,
            attempts: 3,
            last: AttemptFailure::Generation(GenerationError::Unavailable("503".into())),
        });
        assert!(exhausted.is_retryable());
        assert!(!PipelineError::EmptyRequest.is_retryable());
    }

    #[test]
    fn fan_out_failure_messages() {
        let aborted = FanOutFailure::Aborted {
            stage: StageKind::Docs,
            reason: "panicked".into(),
        };
        assert_eq!(aborted.to_string(), "docs task aborted: panicked");
    }
}
