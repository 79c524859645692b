//! Stage failure taxonomy

use forge_artifact::StageKind;
use forge_extract::ExtractionFailure;
use forge_model::GenerationError;

/// Why one attempt inside a stage produced nothing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionFailure),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl AttemptFailure {
    /// Instruction appended to the next prompt so the retry is not a blind repeat
    #[must_use]
    pub fn reformulation_note(&self) -> &'static str {
        match self {
            Self::Extraction(ExtractionFailure::NoCandidateFound) => {
                "Your previous reply contained no JSON object. Reply with exactly one JSON object and nothing else."
            }
            Self::Extraction(ExtractionFailure::MalformedOnly { .. }) => {
                "Your previous reply contained JSON that could not be parsed. Use double-quoted keys and strings, escape newlines inside strings, and do not use trailing commas."
            }
            Self::Extraction(ExtractionFailure::NoValidCandidate { .. }) => {
                "Your previous reply did not match the required format. Fill in every required field with real values; do not repeat the template."
            }
            Self::Generation(GenerationError::Rejected(_)) => {
                "Your previous reply was refused. Restate the task neutrally and produce only the requested technical content."
            }
            Self::Generation(GenerationError::Timeout(_)) => {
                "Your previous reply took too long. Keep the response concise and limit file contents to what is necessary."
            }
            Self::Generation(_) => "The previous request failed. Produce the requested JSON object.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageFailure {
    /// The local attempt budget ran out; `last` is the final attempt's cause
    #[error("{stage} stage exhausted {attempts} attempt(s): {last}")]
    ExtractionExhausted {
        stage: StageKind,
        attempts: u32,
        last: AttemptFailure,
    },

    #[error("{stage} stage is missing upstream input: {missing}")]
    UpstreamMissing {
        stage: StageKind,
        missing: &'static str,
    },
}

impl StageFailure {
    #[must_use]
    pub fn stage(&self) -> StageKind {
        match self {
            Self::ExtractionExhausted { stage, .. } | Self::UpstreamMissing { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_failure_has_a_distinct_note() {
        let notes = [
            AttemptFailure::from(ExtractionFailure::NoCandidateFound).reformulation_note(),
            AttemptFailure::from(ExtractionFailure::MalformedOnly { spans: 1 }).reformulation_note(),
            AttemptFailure::from(ExtractionFailure::NoValidCandidate { parsed: 1, sentinels: 0 })
                .reformulation_note(),
            AttemptFailure::from(GenerationError::Rejected("policy".into())).reformulation_note(),
            AttemptFailure::from(GenerationError::Timeout(std::time::Duration::from_secs(1)))
                .reformulation_note(),
        ];
        for (i, a) in notes.iter().enumerate() {
            for b in &notes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn failure_reports_its_stage() {
        let failure = StageFailure::UpstreamMissing {
            stage: StageKind::Docs,
            missing: "code artifact",
        };
        assert_eq!(failure.stage(), StageKind::Docs);
        assert_eq!(failure.to_string(), "docs stage is missing upstream input: code artifact");
    }
}
