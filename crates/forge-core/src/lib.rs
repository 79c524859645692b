//! Forge Core - quality-gated pipeline controller
//!
//! Turns a natural-language request into a generated project:
//! - Structures the request into a [`Requirement`](forge_artifact::Requirement)
//! - Runs the code stage through a generate, review, regenerate loop bounded
//!   by `max_iterations`
//! - Fans out tests, docs, deployment and ui stages concurrently once the
//!   code stage resolves
//! - Aggregates everything into a [`ProjectResult`] with a per-category
//!   projection, a JSON summary and a Markdown review report
//!
//! # Example
//!
//! ```rust,ignore
//! use forge_core::{ForgeConfig, PipelineController};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ForgeConfig::default().apply_env()?;
//! let controller = PipelineController::from_config(config)?;
//!
//! let result = controller.run("build a calculator").await?;
//! println!("{} after {} iteration(s)", result.outcome, result.gated.history().len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod result;
pub mod session;
pub mod state;

pub use config::{ForgeConfig, StageConfig};
pub use controller::PipelineController;
pub use error::{ConfigError, FanOutFailure, PipelineError, StateError};
pub use event::PipelineEvent;
pub use result::{ProjectResult, ProjectSummary, Projection, REVIEW_REPORT_FILE};
pub use session::{Attempt, FanOutSlots, GateOutcome, IterationRecord, IterationState, ProjectSession};
pub use state::{allowed_transitions, validate_transition, GateState};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running a pipeline
    pub use crate::{
        ForgeConfig, GateOutcome, PipelineController, PipelineError, PipelineEvent, ProjectResult,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
