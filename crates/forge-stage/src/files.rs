//! File-bearing stages: code, tests, docs, deployment, ui

use crate::error::{AttemptFailure, StageFailure};
use crate::feedback::Feedback;
use crate::prompt::{render_artifact_context, render_failure_note, render_feedback, render_requirement};
use crate::stage::StageSpec;
use forge_artifact::{normalize_path, Artifact, Requirement, StageKind, PLACEHOLDER_NAMES};
use forge_extract::{Extractor, Record};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Field every file-bearing record must carry
pub const ID_FIELD: &str = "name";

const TEMPLATE: &str = r#"{
  "name": "<project name>",
  "files": [
    {"path": "<relative/path.ext>", "content": "<full file content>"}
  ]
}"#;

/// Read-only inputs shared by a file stage run
#[derive(Debug, Clone)]
pub struct FileStageInput {
    pub requirement: Arc<Requirement>,
    /// Accepted code artifact; required by every stage except code
    pub upstream: Option<Arc<Artifact>>,
}

impl FileStageInput {
    #[must_use]
    pub fn new(requirement: Arc<Requirement>) -> Self {
        Self {
            requirement,
            upstream: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_upstream(mut self, upstream: Arc<Artifact>) -> Self {
        self.upstream = Some(upstream);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FileStage {
    kind: StageKind,
    extractor: Extractor,
}

impl FileStage {
    /// `None` for stages that do not produce files
    #[must_use]
    pub fn for_kind(kind: StageKind) -> Option<Self> {
        kind.category().map(|_| Self::build(kind))
    }

    #[must_use]
    pub fn code() -> Self {
        Self::build(StageKind::Code)
    }

    fn build(kind: StageKind) -> Self {
        Self {
            kind,
            extractor: Extractor::new()
                .with_sentinel_field(ID_FIELD)
                .with_placeholders(PLACEHOLDER_NAMES.iter().copied())
                .with_placeholder("<project name>"),
        }
    }

    fn role_and_task(&self) -> (&'static str, &'static str) {
        match self.kind {
            StageKind::Code => (
                "senior software engineer",
                "Write a complete, runnable implementation. Include an entry point, input \
                 validation and error handling. Do not leave TODOs, placeholders or stub functions.",
            ),
            StageKind::Tests => (
                "test engineer",
                "Write automated tests for the implementation below: unit tests for each \
                 function, integration tests for the main flows and edge cases.",
            ),
            StageKind::Docs => (
                "technical writer",
                "Write project documentation for the implementation below: a README with \
                 setup and usage, an API reference, and architecture notes.",
            ),
            StageKind::Deployment => (
                "devops engineer",
                "Write deployment configuration for the implementation below: container \
                 build file, compose or orchestration manifests, CI workflow and environment samples.",
            ),
            StageKind::Ui | StageKind::Requirements => (
                "frontend engineer",
                "Write a user interface for the implementation below that exposes every \
                 functional requirement.",
            ),
        }
    }
}

impl StageSpec for FileStage {
    type Input = FileStageInput;
    type Output = Artifact;

    fn kind(&self) -> StageKind {
        self.kind
    }

    fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    fn check_input(&self, input: &FileStageInput) -> Result<(), StageFailure> {
        if self.kind != StageKind::Code && input.upstream.is_none() {
            return Err(StageFailure::UpstreamMissing {
                stage: self.kind,
                missing: "accepted code artifact",
            });
        }
        Ok(())
    }

    fn build_prompt(
        &self,
        input: &FileStageInput,
        feedback: Option<&Feedback>,
        prior_failure: Option<&AttemptFailure>,
    ) -> String {
        let (role, task) = self.role_and_task();
        let mut prompt = format!(
            "You are a {role}. {task}\n\nREQUIREMENTS:\n{}",
            render_requirement(&input.requirement)
        );
        if let Some(upstream) = input.upstream.as_deref().filter(|_| self.kind != StageKind::Code) {
            prompt.push_str("\nIMPLEMENTATION:\n");
            prompt.push_str(&render_artifact_context(upstream));
        }
        if let Some(feedback) = feedback {
            prompt.push('\n');
            prompt.push_str(&render_feedback(feedback));
        }
        prompt.push_str("\nRespond with a single JSON object of this shape:\n");
        prompt.push_str(TEMPLATE);
        prompt.push('\n');
        if let Some(failure) = prior_failure {
            prompt.push('\n');
            prompt.push_str(&render_failure_note(failure));
        }
        prompt
    }

    fn decode(&self, record: &Record) -> Option<Artifact> {
        match decode_artifact(self.kind, record) {
            Ok(artifact) => Some(artifact),
            Err(reason) => {
                tracing::debug!(stage = %self.kind, reason, "file candidate rejected");
                None
            }
        }
    }
}

/// Decode `{ "name": .., "files": .. }` into an artifact
///
/// `files` may be an array of `{path|filename, content}` objects or an object
/// mapping path to content. Other top-level fields become metadata.
///
/// # Errors
/// Returns a short reason when the record is not a usable answer.
pub fn decode_artifact(kind: StageKind, record: &Record) -> Result<Artifact, &'static str> {
    let has_id = record
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if !has_id {
        return Err("missing identifying field");
    }

    let files = match record.get("files") {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(file_entry)
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::Object(map)) => map
            .iter()
            .map(|(path, content)| match content {
                Value::String(text) => Ok((path.clone(), text.clone())),
                _ => Err("file content is not a string"),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err("missing files"),
    };
    if files.is_empty() {
        return Err("no files");
    }
    for (path, _) in &files {
        normalize_path(path).map_err(|_| "invalid file path")?;
    }

    let metadata: BTreeMap<String, Value> = record
        .iter()
        .filter(|(key, _)| key.as_str() != "files")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Artifact::new(
        kind,
        files.into_iter().map(|(path, content)| (path, content.into_bytes())),
        metadata,
    )
    .map_err(|_| "duplicate file path")
}

fn file_entry(entry: &Value) -> Result<(String, String), &'static str> {
    let obj = entry.as_object().ok_or("file entry is not an object")?;
    let path = obj
        .get("path")
        .or_else(|| obj.get("filename"))
        .and_then(Value::as_str)
        .ok_or("file entry has no path")?;
    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .ok_or("file entry has no content")?;
    Ok((path.to_string(), content.to_string()))
}
