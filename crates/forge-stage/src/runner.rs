//! Generic stage loop with bounded local retry

use crate::error::{AttemptFailure, StageFailure};
use crate::feedback::Feedback;
use crate::stage::StageSpec;
use forge_model::{GenerationPort, InvokeOptions};

/// Runs any [`StageSpec`] against a generation port
#[derive(Debug, Clone)]
pub struct StageRunner {
    port: GenerationPort,
    options: InvokeOptions,
    local_retries: u32,
}

impl StageRunner {
    #[must_use]
    pub fn new(port: GenerationPort) -> Self {
        Self {
            port,
            options: InvokeOptions::default(),
            local_retries: 2,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: InvokeOptions) -> Self {
        self.options = options;
        self
    }

    /// Reformulated attempts after the first
    #[inline]
    #[must_use]
    pub fn with_local_retries(mut self, local_retries: u32) -> Self {
        self.local_retries = local_retries;
        self
    }

    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.local_retries.saturating_add(1)
    }

    /// Produce the stage output, retrying locally on extraction or generation failure
    ///
    /// # Errors
    /// - [`StageFailure::UpstreamMissing`] before any generation call
    /// - [`StageFailure::ExtractionExhausted`] after every local attempt failed
    pub async fn run<S: StageSpec>(
        &self,
        spec: &S,
        input: &S::Input,
        feedback: Option<&Feedback>,
    ) -> Result<S::Output, StageFailure> {
        spec.check_input(input)?;

        let stage = spec.kind();
        let max_attempts = self.max_attempts();
        let mut last_failure: Option<AttemptFailure> = None;

        for attempt in 1..=max_attempts {
            let prompt = spec.build_prompt(input, feedback, last_failure.as_ref());
            tracing::debug!(%stage, attempt, with_feedback = feedback.is_some(), "running stage attempt");

            let failure = match self.port.invoke(&prompt, self.options).await {
                Ok(raw) => match spec
                    .extractor()
                    .extract_decoded(raw.as_str(), |record| spec.decode(record))
                {
                    Ok((record, output)) => {
                        tracing::debug!(%stage, attempt, span = ?record.source_span, "stage produced output");
                        return Ok(output);
                    }
                    Err(failure) => AttemptFailure::Extraction(failure),
                },
                Err(error) => AttemptFailure::Generation(error),
            };

            tracing::warn!(%stage, attempt, max_attempts, error = %failure, "stage attempt failed");
            last_failure = Some(failure);
        }

        // max_attempts >= 1, so at least one failure was recorded
        let last = last_failure.unwrap_or(AttemptFailure::Extraction(
            forge_extract::ExtractionFailure::NoCandidateFound,
        ));
        Err(StageFailure::ExtractionExhausted {
            stage,
            attempts: max_attempts,
            last,
        })
    }
}
