//! Forge Quality Gate
//!
//! Scores a generated artifact against its requirement. Three independent
//! evaluators (structural validation, security, maintainability) each yield
//! a 0-100 sub-score; a fixed weighted mean gives the verdict score and
//! `passes` is `score >= threshold`.
//!
//! # Example
//!
//! ```rust,ignore
//! use forge_gate::{HeuristicGate, QualityGate};
//!
//! let gate = HeuristicGate::new().with_threshold(70.0);
//! let verdict = gate.review(&artifact, &requirement).await;
//! if !verdict.passes() {
//!     for issue in verdict.iter_issues() {
//!         println!("{issue}");
//!     }
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod context;
mod error;
mod evaluator;
mod gate;
mod quality;
mod security;
mod validation;

pub use context::{is_code_file, ReviewContext, CODE_EXTENSIONS};
pub use error::EvaluationError;
pub use evaluator::{Evaluator, SubScore};
pub use gate::{
    score_recommendations, GateReport, GateWeights, HeuristicGate, QualityGate, SubScores,
    DEFAULT_THRESHOLD, RECOMMENDATION_FLOOR,
};
pub use quality::{improvement_instructions, MaintainabilityEvaluator, NO_INSTRUCTIONS};
pub use security::SecurityEvaluator;
pub use validation::{keywords, ValidationEvaluator};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
