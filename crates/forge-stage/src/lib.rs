//! Forge Stages
//!
//! A stage formats a prompt from upstream data, calls the generation port,
//! extracts a structured record and decodes it into its output. Extraction
//! and generation failures are retried locally with a reformulated prompt
//! before the stage gives up with a [`StageFailure`].
//!
//! # Example
//!
//! ```rust,ignore
//! use forge_stage::{FileStage, FileStageInput, RequirementStage, StageRunner};
//!
//! let runner = StageRunner::new(port).with_local_retries(2);
//! let requirement = runner.run(&RequirementStage::new(), "build a calculator", None).await?;
//! let input = FileStageInput::new(Arc::new(requirement));
//! let code = runner.run(&FileStage::code(), &input, None).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod feedback;
mod files;
pub mod prompt;
mod requirements;
mod runner;
mod stage;

pub use error::{AttemptFailure, StageFailure};
pub use feedback::Feedback;
pub use files::{decode_artifact, FileStage, FileStageInput, ID_FIELD};
pub use requirements::RequirementStage;
pub use runner::StageRunner;
pub use stage::StageSpec;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
