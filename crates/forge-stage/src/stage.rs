//! The per-stage contract

use crate::error::{AttemptFailure, StageFailure};
use crate::feedback::Feedback;
use forge_artifact::StageKind;
use forge_extract::{Extractor, Record};

/// What distinguishes one stage from another
///
/// The runner owns the generic loop (prompt, generate, extract, retry). An
/// implementation only says how to phrase the request and which structured
/// record counts as an answer.
pub trait StageSpec: Send + Sync {
    /// Upstream data the stage reads
    type Input: ?Sized + Sync;
    /// What a successful run yields
    type Output: Send;

    fn kind(&self) -> StageKind;

    /// Extractor carrying this stage's template-sentinel rule
    fn extractor(&self) -> &Extractor;

    /// Reject input that lacks a required upstream product
    ///
    /// # Errors
    /// Returns [`StageFailure::UpstreamMissing`].
    fn check_input(&self, _input: &Self::Input) -> Result<(), StageFailure> {
        Ok(())
    }

    /// Deterministic prompt for one attempt
    ///
    /// `feedback` is embedded verbatim when present; `prior_failure` notes
    /// why the previous local attempt produced nothing.
    fn build_prompt(
        &self,
        input: &Self::Input,
        feedback: Option<&Feedback>,
        prior_failure: Option<&AttemptFailure>,
    ) -> String;

    /// Validity predicate and decoder in one: `Some` means valid
    fn decode(&self, record: &Record) -> Option<Self::Output>;
}
