//! Progress events emitted while a project runs

use crate::session::GateOutcome;
use forge_artifact::{ProjectId, StageKind};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageStarted {
        stage: StageKind,
        iteration: u32,
    },
    IterationReviewed {
        iteration: u32,
        score: f64,
        passes: bool,
    },
    GateResolved {
        outcome: GateOutcome,
        iterations: u32,
    },
    FanOutCompleted {
        stage: StageKind,
        ok: bool,
    },
    ProjectCompleted {
        project_id: ProjectId,
    },
}

/// Optional observer; a dropped receiver is ignored
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink(Option<UnboundedSender<PipelineEvent>>);

impl EventSink {
    pub(crate) fn new(sender: UnboundedSender<PipelineEvent>) -> Self {
        Self(Some(sender))
    }

    pub(crate) fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.0 {
            if sender.send(event).is_err() {
                tracing::trace!("event receiver dropped");
            }
        }
    }
}
