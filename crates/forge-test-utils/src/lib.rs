//! Testing utilities for the Forge workspace
//!
//! Scripted collaborators and JSON fixtures shared by the crates' tests.

#![allow(missing_docs)]

use forge_artifact::{
    Artifact, FunctionalItem, Issue, IssueKind, Requirement, ReviewVerdict, Severity, StageKind,
};
use forge_gate::QualityGate;
use forge_model::{GenerationBackend, GenerationError, GenerationRequest, GenerationResponse};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Prompt fragment unique to each file stage's prompt
#[must_use]
pub fn stage_marker(kind: StageKind) -> &'static str {
    match kind {
        StageKind::Requirements => "requirements analyst",
        StageKind::Code => "senior software engineer",
        StageKind::Tests => "test engineer",
        StageKind::Docs => "technical writer",
        StageKind::Deployment => "devops engineer",
        StageKind::Ui => "frontend engineer",
    }
}

#[derive(Debug, Clone)]
struct Step {
    response: Result<String, GenerationError>,
    delay: Duration,
}

#[derive(Debug, Default)]
struct Route {
    needle: Option<String>,
    steps: VecDeque<Step>,
    /// Last step is repeated once the queue drains
    sticky: Option<Step>,
}

/// Generation backend that replays canned responses
///
/// Responses are routed by a substring of the prompt so concurrent stages
/// each see their own script. A prompt that matches no route uses the
/// default queue. A drained queue answers `Unavailable` unless the route was
/// made sticky with [`ScriptedBackend::repeat_last`].
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    routes: Mutex<Vec<Route>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, needle: Option<&str>, step: Step) -> Self {
        {
            let mut routes = self.routes.lock();
            let needle = needle.map(str::to_string);
            match routes.iter_mut().find(|r| r.needle == needle) {
                Some(route) => route.steps.push_back(step),
                None => routes.push(Route {
                    needle,
                    steps: VecDeque::from([step]),
                    sticky: None,
                }),
            }
        }
        self
    }

    #[must_use]
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(None, Step { response: Ok(text.into()), delay: Duration::ZERO })
    }

    #[must_use]
    pub fn fail(self, error: GenerationError) -> Self {
        self.push(None, Step { response: Err(error), delay: Duration::ZERO })
    }

    #[must_use]
    pub fn reply_when(self, needle: &str, text: impl Into<String>) -> Self {
        self.push(Some(needle), Step { response: Ok(text.into()), delay: Duration::ZERO })
    }

    #[must_use]
    pub fn reply_after(self, needle: &str, delay: Duration, text: impl Into<String>) -> Self {
        self.push(Some(needle), Step { response: Ok(text.into()), delay })
    }

    #[must_use]
    pub fn fail_when(self, needle: &str, error: GenerationError) -> Self {
        self.push(Some(needle), Step { response: Err(error), delay: Duration::ZERO })
    }

    /// Keep answering every route with its final step once drained
    #[must_use]
    pub fn repeat_last(self) -> Self {
        for route in self.routes.lock().iter_mut() {
            route.sticky = route.steps.back().cloned();
        }
        self
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Prompts that contained `needle`
    #[must_use]
    pub fn prompts_with(&self, needle: &str) -> Vec<String> {
        self.prompts
            .lock()
            .iter()
            .filter(|p| p.contains(needle))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self, prompt: &str) -> Step {
        let mut routes = self.routes.lock();
        let index = routes
            .iter()
            .position(|r| r.needle.as_deref().is_some_and(|n| prompt.contains(n)))
            .or_else(|| routes.iter().position(|r| r.needle.is_none()));
        let Some(route) = index.map(|i| &mut routes[i]) else {
            return Step {
                response: Err(GenerationError::Unavailable("no script for prompt".into())),
                delay: Duration::ZERO,
            };
        };
        route.steps.pop_front().or_else(|| route.sticky.clone()).unwrap_or(Step {
            response: Err(GenerationError::Unavailable("script exhausted".into())),
            delay: Duration::ZERO,
        })
    }
}

#[async_trait::async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step(&request.prompt);
        self.prompts.lock().push(request.prompt);
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.response.map(|text| GenerationResponse { text })
    }
}

/// Backend that panics on prompts containing `needle` and delegates the rest
#[derive(Debug)]
pub struct PanickingBackend<B> {
    inner: B,
    needle: String,
}

impl<B> PanickingBackend<B> {
    #[must_use]
    pub fn new(inner: B, needle: impl Into<String>) -> Self {
        Self { inner, needle: needle.into() }
    }
}

#[async_trait::async_trait]
impl<B: GenerationBackend> GenerationBackend for PanickingBackend<B> {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        if request.prompt.contains(&self.needle) {
            panic!("backend crashed on prompt containing {:?}", self.needle);
        }
        self.inner.generate(request).await
    }
}

/// Gate that returns a fixed score sequence, repeating the last score
#[derive(Debug)]
pub struct ScriptedGate {
    scores: Vec<f64>,
    threshold: f64,
    issue: Option<String>,
    reviews: AtomicUsize,
}

impl ScriptedGate {
    #[must_use]
    pub fn new(scores: impl Into<Vec<f64>>) -> Self {
        Self {
            scores: scores.into(),
            threshold: 70.0,
            issue: None,
            reviews: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn always_failing() -> Self {
        Self::new([0.0])
    }

    #[inline]
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Attach this issue to every failing verdict
    #[inline]
    #[must_use]
    pub fn with_failing_issue(mut self, description: impl Into<String>) -> Self {
        self.issue = Some(description.into());
        self
    }

    #[must_use]
    pub fn reviews(&self) -> usize {
        self.reviews.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl QualityGate for ScriptedGate {
    fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn review(&self, _artifact: &Artifact, _requirement: &Requirement) -> ReviewVerdict {
        let n = self.reviews.fetch_add(1, Ordering::SeqCst);
        let score = self
            .scores
            .get(n)
            .or_else(|| self.scores.last())
            .copied()
            .unwrap_or(0.0);
        let verdict = ReviewVerdict::new(score, self.threshold);
        match &self.issue {
            Some(description) if !verdict.passes() => verdict.with_issue(
                Issue::new(Severity::High, IssueKind::Coverage, description.clone()),
            ),
            _ => verdict,
        }
    }
}

/// Requirement-stage answer as a model would emit it
#[must_use]
pub fn requirement_json(name: &str) -> String {
    json!({
        "project_name": name,
        "description": format!("{name} generated for tests"),
        "functional_requirements": [{
            "id": "FR-1",
            "title": "Basic arithmetic",
            "description": "add, subtract, multiply and divide",
            "priority": "high",
            "acceptance_criteria": ["2 + 2 = 4"]
        }],
        "technical_constraints": ["python 3"]
    })
    .to_string()
}

/// File-stage answer in the array form
#[must_use]
pub fn files_json(name: &str, files: &[(&str, &str)]) -> String {
    let entries: Vec<_> = files
        .iter()
        .map(|(path, content)| json!({ "path": path, "content": content }))
        .collect();
    json!({ "name": name, "files": entries }).to_string()
}

/// Model chatter around a JSON answer
#[must_use]
pub fn chatty(json: &str) -> String {
    format!("Sure, here is the result you asked for.\n```json\n{json}\n```\nLet me know if you need changes.")
}

#[must_use]
pub fn calculator_requirement() -> Requirement {
    Requirement::new("Calculator App", "command line calculator")
        .with_functional_item(FunctionalItem::new("Basic arithmetic").with_criterion("2 + 2 = 4"))
}

#[must_use]
pub fn artifact(kind: StageKind, files: &[(&str, &str)]) -> Artifact {
    Artifact::new(kind, files.iter().copied(), BTreeMap::new())
        .unwrap_or_else(|e| panic!("fixture artifact is invalid: {e}"))
}
