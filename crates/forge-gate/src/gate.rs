//! Quality gate contract and the heuristic implementation

use crate::context::ReviewContext;
use crate::error::EvaluationError;
use crate::evaluator::{Evaluator, SubScore};
use crate::quality::{improvement_instructions, MaintainabilityEvaluator, NO_INSTRUCTIONS};
use crate::security::SecurityEvaluator;
use crate::validation::ValidationEvaluator;
use forge_artifact::{Artifact, Issue, IssueKind, Requirement, ReviewVerdict, Severity};
use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD: f64 = 70.0;

/// Sub-scores below this add a fixed recommendation
pub const RECOMMENDATION_FLOOR: f64 = 80.0;

/// Reviews an artifact against the requirement it was built for
///
/// Implementations must always return a verdict; an artifact that cannot be
/// judged gets a zero, failing verdict.
#[async_trait::async_trait]
pub trait QualityGate: Send + Sync {
    /// Score at or above which a verdict passes
    fn threshold(&self) -> f64;

    async fn review(&self, artifact: &Artifact, requirement: &Requirement) -> ReviewVerdict;
}

/// Fixed aggregation weights; normalised so they need not sum to one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateWeights {
    pub validation: f64,
    pub security: f64,
    pub quality: f64,
}

impl Default for GateWeights {
    fn default() -> Self {
        Self {
            validation: 0.40,
            security: 0.35,
            quality: 0.25,
        }
    }
}

impl GateWeights {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let parts = [self.validation, self.security, self.quality];
        parts.iter().all(|w| w.is_finite() && *w >= 0.0) && parts.iter().sum::<f64>() > 0.0
    }

    /// Weighted mean of the three sub-scores
    #[must_use]
    pub fn combine(&self, validation: f64, security: f64, quality: f64) -> f64 {
        let weights = if self.is_valid() { *self } else { Self::default() };
        let total = weights.validation + weights.security + weights.quality;
        (weights.validation * validation + weights.security * security + weights.quality * quality)
            / total
    }
}

/// The three sub-scores behind one verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub validation: f64,
    pub security: f64,
    pub quality: f64,
}

/// Verdict plus its sub-scores (absent when evaluation failed)
#[derive(Debug, Clone, PartialEq)]
pub struct GateReport {
    pub verdict: ReviewVerdict,
    pub sub_scores: Option<SubScores>,
}

/// Deterministic gate over validation, security and maintainability evaluators
#[derive(Debug, Clone)]
pub struct HeuristicGate {
    threshold: f64,
    weights: GateWeights,
}

impl Default for HeuristicGate {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicGate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            weights: GateWeights::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_weights(mut self, weights: GateWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Run all evaluators; any evaluator failure yields a zero verdict
    #[must_use]
    pub fn evaluate(&self, artifact: &Artifact, requirement: &Requirement) -> GateReport {
        match self.sub_scores(artifact, requirement) {
            Ok((validation, security, quality)) => {
                let scores = SubScores {
                    validation: validation.score,
                    security: security.score,
                    quality: quality.score,
                };
                let score = self
                    .weights
                    .combine(scores.validation, scores.security, scores.quality);
                let instructions = improvement_instructions(&quality.issues);

                let mut verdict = ReviewVerdict::new(score, self.threshold)
                    .with_issues(validation.issues)
                    .with_issues(security.issues)
                    .with_issues(quality.issues);
                for recommendation in score_recommendations(&scores) {
                    verdict = verdict.with_recommendation(recommendation);
                }
                if instructions != NO_INSTRUCTIONS {
                    for line in instructions.lines() {
                        verdict = verdict.with_recommendation(line);
                    }
                }

                tracing::debug!(
                    stage = %artifact.stage(),
                    validation = scores.validation,
                    security = scores.security,
                    quality = scores.quality,
                    score = verdict.score(),
                    passes = verdict.passes(),
                    "artifact reviewed"
                );
                GateReport {
                    verdict,
                    sub_scores: Some(scores),
                }
            }
            Err(error) => {
                tracing::warn!(stage = %artifact.stage(), %error, "artifact could not be evaluated");
                GateReport {
                    verdict: ReviewVerdict::rejected()
                        .with_issue(
                            Issue::new(Severity::Critical, IssueKind::Evaluation, error.to_string())
                                .with_suggestion("produce readable, non-empty source files"),
                        )
                        .with_recommendation("Regenerate the artifact with complete source files"),
                    sub_scores: None,
                }
            }
        }
    }

    fn sub_scores(
        &self,
        artifact: &Artifact,
        requirement: &Requirement,
    ) -> Result<(SubScore, SubScore, SubScore), EvaluationError> {
        let ctx = ReviewContext::new(artifact, requirement)?;
        Ok((
            run(&ValidationEvaluator, &ctx)?,
            run(&SecurityEvaluator, &ctx)?,
            run(&MaintainabilityEvaluator, &ctx)?,
        ))
    }
}

fn run(evaluator: &dyn Evaluator, ctx: &ReviewContext<'_>) -> Result<SubScore, EvaluationError> {
    let sub = evaluator.evaluate(ctx)?;
    if sub.score.is_finite() {
        Ok(sub)
    } else {
        Err(EvaluationError::Failed {
            evaluator: evaluator.name(),
            reason: "non-finite score".into(),
        })
    }
}

/// Fixed advice for each sub-score under [`RECOMMENDATION_FLOOR`]
#[must_use]
pub fn score_recommendations(scores: &SubScores) -> Vec<&'static str> {
    let mut out = Vec::new();
    if scores.security < RECOMMENDATION_FLOOR {
        out.push("Improve security measures and input validation");
    }
    if scores.quality < RECOMMENDATION_FLOOR {
        out.push("Improve code structure and follow best practices");
    }
    if scores.validation < RECOMMENDATION_FLOOR {
        out.push("Complete missing functionality and entry points");
    }
    out
}

#[async_trait::async_trait]
impl QualityGate for HeuristicGate {
    fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn review(&self, artifact: &Artifact, requirement: &Requirement) -> ReviewVerdict {
        self.evaluate(artifact, requirement).verdict
    }
}
