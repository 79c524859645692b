//! Requirement structuring: free-form request to [`Requirement`]

use crate::error::AttemptFailure;
use crate::feedback::Feedback;
use crate::prompt::{render_failure_note, render_feedback};
use crate::stage::StageSpec;
use forge_artifact::{Requirement, StageKind, PLACEHOLDER_NAMES};
use forge_extract::{Extractor, Record};

const TEMPLATE: &str = r#"{
  "project_name": "<short descriptive name>",
  "description": "<one paragraph>",
  "functional_requirements": [
    {"id": "FR-1", "title": "<feature>", "description": "<what it does>", "priority": "high|medium|low", "acceptance_criteria": ["<testable statement>"]}
  ],
  "non_functional_requirements": [
    {"id": "NFR-1", "title": "<quality>", "description": "<target>", "category": "performance|security|usability|reliability"}
  ],
  "technical_constraints": ["<constraint>"],
  "assumptions": ["<assumption>"],
  "dependencies": ["<external dependency>"],
  "key_components": ["<component>"],
  "suggested_architecture": "<architecture>",
  "estimated_complexity": "low|medium|high"
}"#;

#[derive(Debug, Clone)]
pub struct RequirementStage {
    extractor: Extractor,
}

impl Default for RequirementStage {
    fn default() -> Self {
        Self::new()
    }
}

impl RequirementStage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractor: Extractor::new()
                .with_sentinel_field("project_name")
                .with_sentinel_field("name")
                .with_placeholders(PLACEHOLDER_NAMES.iter().copied())
                .with_placeholder("<short descriptive name>"),
        }
    }
}

impl StageSpec for RequirementStage {
    type Input = str;
    type Output = Requirement;

    fn kind(&self) -> StageKind {
        StageKind::Requirements
    }

    fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    fn build_prompt(
        &self,
        request: &str,
        feedback: Option<&Feedback>,
        prior_failure: Option<&AttemptFailure>,
    ) -> String {
        let mut prompt = format!(
            "You are a senior requirements analyst. Analyse the following request and \
             produce a structured requirement record.\n\nREQUEST:\n{}\n\n\
             Respond with a single JSON object of this shape:\n{TEMPLATE}\n",
            request.trim()
        );
        if let Some(feedback) = feedback {
            prompt.push('\n');
            prompt.push_str(&render_feedback(feedback));
        }
        if let Some(failure) = prior_failure {
            prompt.push('\n');
            prompt.push_str(&render_failure_note(failure));
        }
        prompt
    }

    fn decode(&self, record: &Record) -> Option<Requirement> {
        match Requirement::from_record(record.clone()) {
            Ok(requirement) => Some(requirement),
            Err(error) => {
                tracing::debug!(%error, "requirement candidate rejected");
                None
            }
        }
    }
}
