//! Per-project state owned by the controller
//!
//! [`IterationState`] is the append-only audit trail of one gated stage.
//! [`ProjectSession`] aggregates it with the requirement and the fan-out
//! result slots for the lifetime of one request.

use crate::error::{FanOutFailure, StateError};
use crate::state::{validate_transition, GateState};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use forge_artifact::{Artifact, ProjectId, Requirement, ReviewVerdict, StageKind};
use forge_stage::StageFailure;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::sync::Arc;

/// Terminal result of a gated stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    Accepted,
    /// Degraded accept: the iteration budget ran out below the threshold
    Exhausted,
}

impl GateOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one generation step produced
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Produced(Arc<Artifact>),
    /// Counted as a failing verdict for loop accounting
    Failed(StageFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    /// Zero-based iteration index at the time of review
    pub iteration: u32,
    pub attempt: Attempt,
    pub verdict: ReviewVerdict,
}

impl IterationRecord {
    #[must_use]
    pub fn artifact(&self) -> Option<&Arc<Artifact>> {
        match &self.attempt {
            Attempt::Produced(artifact) => Some(artifact),
            Attempt::Failed(_) => None,
        }
    }
}

/// Audit trail of one gated stage
///
/// After every review `history.len() == iteration_index + 1`; entries are
/// only ever appended.
#[derive(Debug, Clone)]
pub struct IterationState {
    project_id: ProjectId,
    stage: StageKind,
    state: GateState,
    iteration_index: u32,
    history: Vec<IterationRecord>,
}

impl IterationState {
    #[must_use]
    pub fn new(project_id: ProjectId, stage: StageKind) -> Self {
        Self {
            project_id,
            stage,
            state: GateState::Pending,
            iteration_index: 0,
            history: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> StageKind {
        self.stage
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> GateState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn iteration_index(&self) -> u32 {
        self.iteration_index
    }

    #[inline]
    #[must_use]
    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    fn transition(&mut self, to: GateState) -> Result<(), StateError> {
        validate_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }

    /// # Errors
    /// Fails unless the stage is `Pending` or `Regenerating`.
    pub fn begin_generation(&mut self) -> Result<(), StateError> {
        self.transition(GateState::Generating)
    }

    /// # Errors
    /// Fails unless the stage is `Generating`.
    pub fn begin_review(&mut self) -> Result<(), StateError> {
        self.transition(GateState::Reviewing)
    }

    /// Append the reviewed attempt and move to the next state
    ///
    /// # Errors
    /// Fails unless the stage is `Reviewing`; history is untouched on error.
    pub fn record(
        &mut self,
        attempt: Attempt,
        verdict: ReviewVerdict,
        max_iterations: u32,
    ) -> Result<GateState, StateError> {
        let next = if verdict.passes() {
            GateState::Accepted
        } else if self.iteration_index + 1 < max_iterations.max(1) {
            GateState::Regenerating
        } else {
            GateState::Exhausted
        };
        validate_transition(self.state, next)?;

        self.history.push(IterationRecord {
            iteration: self.iteration_index,
            attempt,
            verdict,
        });
        self.state = next;
        if next == GateState::Regenerating {
            self.iteration_index += 1;
        }
        Ok(next)
    }

    #[must_use]
    pub fn outcome(&self) -> Option<GateOutcome> {
        match self.state {
            GateState::Accepted => Some(GateOutcome::Accepted),
            GateState::Exhausted => Some(GateOutcome::Exhausted),
            _ => None,
        }
    }

    /// Most recently produced artifact, skipping failed attempts
    #[must_use]
    pub fn latest_artifact(&self) -> Option<&Arc<Artifact>> {
        self.history.iter().rev().find_map(IterationRecord::artifact)
    }

    #[must_use]
    pub fn final_verdict(&self) -> Option<&ReviewVerdict> {
        self.history.last().map(|record| &record.verdict)
    }

    /// Markdown report with one section per attempt
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Iteration report: {} stage\n", self.stage);
        let _ = writeln!(out, "Project: `{}`", self.project_id);
        match self.outcome() {
            Some(outcome) => {
                let _ = writeln!(out, "Outcome: {outcome} after {} iteration(s)", self.history.len());
            }
            None => {
                let _ = writeln!(out, "Outcome: in progress ({:?})", self.state);
            }
        }

        for record in &self.history {
            let _ = writeln!(out, "\n## Iteration {}\n", record.iteration + 1);
            match &record.attempt {
                Attempt::Produced(artifact) => {
                    let _ = writeln!(
                        out,
                        "- Artifact: `{}` ({} file(s))",
                        artifact.hash().short(),
                        artifact.file_count()
                    );
                }
                Attempt::Failed(failure) => {
                    let _ = writeln!(out, "- Stage failure: {failure}");
                }
            }
            let verdict = &record.verdict;
            let _ = writeln!(out, "- Score: {:.1}/100", verdict.score());
            let _ = writeln!(out, "- Verdict: {}", if verdict.passes() { "passed" } else { "rejected" });
            let _ = writeln!(out, "- Issues: {}", verdict.issue_count());
        }
        out
    }
}

/// Result slots written concurrently by fan-out tasks
pub type FanOutSlots = Arc<DashMap<StageKind, Result<Arc<Artifact>, FanOutFailure>>>;

/// Everything one request produces; never shared between projects
#[derive(Debug)]
pub struct ProjectSession {
    pub project_id: ProjectId,
    pub started_at: DateTime<Utc>,
    pub requirement: Arc<Requirement>,
    pub gated: IterationState,
    fan_out: FanOutSlots,
}

impl ProjectSession {
    #[must_use]
    pub fn new(project_id: ProjectId, started_at: DateTime<Utc>, requirement: Arc<Requirement>) -> Self {
        Self {
            project_id,
            started_at,
            requirement,
            gated: IterationState::new(project_id, StageKind::Code),
            fan_out: Arc::new(DashMap::new()),
        }
    }

    /// Shared handle for tasks that each fill their own slot
    #[must_use]
    pub fn fan_out_slots(&self) -> FanOutSlots {
        Arc::clone(&self.fan_out)
    }

    #[must_use]
    pub fn fan_out_result(&self, stage: StageKind) -> Option<Result<Arc<Artifact>, FanOutFailure>> {
        self.fan_out.get(&stage).map(|entry| entry.value().clone())
    }
}
