//! Review feedback carried into a regeneration

use forge_artifact::{Artifact, ReviewVerdict};

/// Prior verdict plus the file list of the artifact it judged
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub verdict: ReviewVerdict,
    pub threshold: f64,
    pub previous_paths: Vec<String>,
}

impl Feedback {
    #[must_use]
    pub fn new(verdict: ReviewVerdict, threshold: f64) -> Self {
        Self {
            verdict,
            threshold,
            previous_paths: Vec::new(),
        }
    }

    /// Attach the judged artifact's paths (content is not repeated)
    #[must_use]
    pub fn with_previous(mut self, artifact: Option<&Artifact>) -> Self {
        self.previous_paths = artifact
            .map(|a| a.paths().map(str::to_string).collect())
            .unwrap_or_default();
        self
    }
}
