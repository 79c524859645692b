//! Generation failure kinds

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The call did not complete within its deadline and was cancelled
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// Transient: transport failure, rate limiting, overloaded service
    #[error("generation service unavailable: {0}")]
    Unavailable(String),

    /// Terminal for this prompt: content policy refusal or a request the
    /// service will never accept
    #[error("generation rejected: {0}")]
    Rejected(String),

    /// A backend could not be constructed
    #[error("generation backend misconfigured: {0}")]
    Configuration(String),
}

impl GenerationError {
    /// Whether the port may retry the same prompt
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Whether only a different prompt can succeed
    #[inline]
    #[must_use]
    pub fn requires_reformulation(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
