//! The pipeline controller
//!
//! One call to [`PipelineController::run`] owns one [`ProjectSession`]:
//! requirement structuring, the gated generate/review loop for code, then
//! the fan-out stages running concurrently against the resolved code
//! artifact. The controller holds no cross-project state, so any number of
//! runs may proceed in parallel on a shared controller.

use crate::config::ForgeConfig;
use crate::error::{FanOutFailure, PipelineError};
use crate::event::{EventSink, PipelineEvent};
use crate::result::ProjectResult;
use crate::session::{Attempt, GateOutcome, IterationState, ProjectSession};
use crate::state::GateState;
use chrono::Utc;
use forge_artifact::{
    Artifact, ContentHash, Issue, IssueKind, ProjectId, Requirement, ReviewVerdict, Severity,
    StageKind,
};
use forge_gate::{HeuristicGate, QualityGate};
use forge_model::{GenerationBackend, GenerationPort, OpenAiCompatibleBackend};
use forge_stage::{Feedback, FileStage, FileStageInput, RequirementStage, StageFailure, StageRunner};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tracing::Instrument;

pub struct PipelineController {
    config: Arc<ForgeConfig>,
    runner: StageRunner,
    gate: Arc<dyn QualityGate>,
    events: EventSink,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("config", &self.config)
            .field("runner", &self.runner)
            .field("gate_threshold", &self.gate.threshold())
            .finish()
    }
}

impl PipelineController {
    /// Build a controller around any backend and gate
    ///
    /// # Errors
    /// [`PipelineError::Config`] when `config` fails validation.
    pub fn new(
        config: ForgeConfig,
        backend: Arc<dyn GenerationBackend>,
        gate: Arc<dyn QualityGate>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let port = GenerationPort::new(backend)
            .with_params(config.generation)
            .with_retry_policy(config.retry.clone());
        let runner = StageRunner::new(port)
            .with_options(config.stage.invoke_options())
            .with_local_retries(config.stage.local_retries);
        Ok(Self {
            config: Arc::new(config),
            runner,
            gate,
            events: EventSink::default(),
        })
    }

    /// HTTP backend plus the heuristic gate, both taken from `config`
    ///
    /// # Errors
    /// Invalid configuration, or a backend that cannot be constructed.
    pub fn from_config(config: ForgeConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let backend = OpenAiCompatibleBackend::new(config.backend.clone())?;
        let gate = HeuristicGate::new()
            .with_threshold(config.acceptance_threshold)
            .with_weights(config.weights);
        Self::new(config, Arc::new(backend), Arc::new(gate))
    }

    #[inline]
    #[must_use]
    pub fn with_events(mut self, sender: UnboundedSender<PipelineEvent>) -> Self {
        self.events = EventSink::new(sender);
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Run one project end to end
    ///
    /// The gated code stage always resolves to `Accepted` or `Exhausted`;
    /// fan-out failures are reported per stage in the result.
    ///
    /// # Errors
    /// - [`PipelineError::EmptyRequest`] for a blank request
    /// - [`PipelineError::Requirements`] when no requirement could be structured
    pub async fn run(&self, request: &str) -> Result<ProjectResult, PipelineError> {
        let project_id = ProjectId::new();
        let span = tracing::info_span!("project", %project_id);
        self.run_project(project_id, request).instrument(span).await
    }

    async fn run_project(&self, project_id: ProjectId, request: &str) -> Result<ProjectResult, PipelineError> {
        let request = request.trim();
        if request.is_empty() {
            return Err(PipelineError::EmptyRequest);
        }
        let started_at = Utc::now();
        tracing::info!(request_len = request.len(), "project started");

        self.events.emit(PipelineEvent::StageStarted {
            stage: StageKind::Requirements,
            iteration: 0,
        });
        let requirement = match self.runner.run(&RequirementStage::new(), request, None).await {
            Ok(requirement) => Arc::new(requirement),
            Err(failure) => {
                tracing::error!(error = %failure, "requirement structuring failed");
                return Err(failure.into());
            }
        };
        tracing::info!(
            name = %requirement.name,
            functional_items = requirement.functional_items.len(),
            "requirement structured"
        );

        let mut session = ProjectSession::new(project_id, started_at, Arc::clone(&requirement));
        let outcome = self.run_gated(&mut session.gated, &requirement).await?;
        self.events.emit(PipelineEvent::GateResolved {
            outcome,
            iterations: u32::try_from(session.gated.history().len()).unwrap_or(u32::MAX),
        });

        let upstream = session.gated.latest_artifact().cloned();
        self.fan_out(&session, &requirement, upstream).await;

        let result = ProjectResult::from_session(session, outcome, Utc::now());
        tracing::info!(
            outcome = %result.outcome,
            iterations = result.gated.history().len(),
            fan_out_failures = result.fan_out_failures().count(),
            "project completed"
        );
        self.events.emit(PipelineEvent::ProjectCompleted { project_id });
        Ok(result)
    }

    /// Generate/review until accepted or out of iterations
    async fn run_gated(
        &self,
        state: &mut IterationState,
        requirement: &Arc<Requirement>,
    ) -> Result<GateOutcome, PipelineError> {
        let stage = FileStage::code();
        let input = FileStageInput::new(Arc::clone(requirement));
        let threshold = self.gate.threshold();
        let max_iterations = self.config.max_iterations;
        let mut feedback: Option<Feedback> = None;
        let mut previous_hash: Option<ContentHash> = None;

        loop {
            let iteration = state.iteration_index();
            state.begin_generation()?;
            self.events.emit(PipelineEvent::StageStarted {
                stage: state.stage(),
                iteration,
            });

            let produced = self.runner.run(&stage, &input, feedback.as_ref()).await;
            state.begin_review()?;
            let (attempt, verdict) = match produced {
                Ok(artifact) => {
                    let artifact = Arc::new(artifact);
                    let hash = artifact.hash();
                    if previous_hash == Some(hash) {
                        tracing::warn!(iteration, hash = %hash.short(), "regeneration produced an identical artifact");
                    }
                    previous_hash = Some(hash);
                    let verdict = self.gate.review(&artifact, requirement).await;
                    (Attempt::Produced(artifact), verdict)
                }
                Err(failure) => {
                    tracing::warn!(iteration, error = %failure, "gated stage produced no artifact");
                    let verdict = failure_verdict(&failure);
                    (Attempt::Failed(failure), verdict)
                }
            };

            tracing::info!(
                iteration,
                score = verdict.score(),
                passes = verdict.passes(),
                issues = verdict.issue_count(),
                "iteration reviewed"
            );
            self.events.emit(PipelineEvent::IterationReviewed {
                iteration,
                score: verdict.score(),
                passes: verdict.passes(),
            });

            match state.record(attempt, verdict, max_iterations)? {
                GateState::Accepted => return Ok(GateOutcome::Accepted),
                GateState::Exhausted => {
                    tracing::warn!(max_iterations, "iteration budget exhausted, accepting last artifact");
                    return Ok(GateOutcome::Exhausted);
                }
                _ => {
                    feedback = state.history().last().map(|record| {
                        Feedback::new(record.verdict.clone(), threshold)
                            .with_previous(record.artifact().map(|artifact| &**artifact))
                    });
                }
            }
        }
    }

    /// Run every fan-out stage concurrently; each task fills only its own slot
    async fn fan_out(
        &self,
        session: &ProjectSession,
        requirement: &Arc<Requirement>,
        upstream: Option<Arc<Artifact>>,
    ) {
        let mut input = FileStageInput::new(Arc::clone(requirement));
        if let Some(upstream) = upstream {
            input = input.with_upstream(upstream);
        }

        let mut tasks = JoinSet::new();
        for kind in StageKind::FAN_OUT {
            let Some(stage) = FileStage::for_kind(kind) else {
                continue;
            };
            let runner = self.runner.clone();
            let input = input.clone();
            let slots = session.fan_out_slots();
            let events = self.events.clone();
            self.events.emit(PipelineEvent::StageStarted { stage: kind, iteration: 0 });

            let task = async move {
                let result = runner.run(&stage, &input, None).await;
                match &result {
                    Ok(artifact) => tracing::info!(files = artifact.file_count(), "fan-out stage completed"),
                    Err(error) => tracing::warn!(%error, "fan-out stage failed"),
                }
                events.emit(PipelineEvent::FanOutCompleted {
                    stage: kind,
                    ok: result.is_ok(),
                });
                slots.insert(kind, result.map(Arc::new).map_err(FanOutFailure::from));
            };
            tasks.spawn(task.instrument(tracing::info_span!("fan_out", stage = %kind)));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined {
                tracing::error!(%error, "fan-out task aborted");
            }
        }

        let slots = session.fan_out_slots();
        for kind in StageKind::FAN_OUT {
            if !slots.contains_key(&kind) {
                self.events.emit(PipelineEvent::FanOutCompleted { stage: kind, ok: false });
                slots.insert(
                    kind,
                    Err(FanOutFailure::Aborted {
                        stage: kind,
                        reason: "task ended without a result".into(),
                    }),
                );
            }
        }
    }
}

/// Failing verdict standing in for a stage that produced nothing
fn failure_verdict(failure: &StageFailure) -> ReviewVerdict {
    ReviewVerdict::rejected()
        .with_issue(
            Issue::new(Severity::Critical, IssueKind::StageFailure, failure.to_string())
                .with_suggestion("respond with a single JSON object containing a name and a non-empty files list"),
        )
        .with_recommendation("Return the complete implementation in the requested JSON format")
}
