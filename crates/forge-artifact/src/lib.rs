//! Forge Artifact Model
//!
//! The data every pipeline component exchanges.
//!
//! # Core Concepts
//!
//! - [`Requirement`]: structured requirement produced by the first stage
//! - [`Artifact`]: immutable, content-hashed set of generated files
//! - [`ReviewVerdict`]: a quality gate's scored judgment with issues by [`Severity`]
//! - [`StageKind`] / [`Category`]: which stage produced what, and where it lands
//!
//! # Example
//!
//! ```rust,ignore
//! use forge_artifact::{Artifact, StageKind};
//!
//! let artifact = Artifact::new(StageKind::Code, [("main.py", "print('hi')")], Default::default())?;
//! println!("{} files, hash {}", artifact.file_count(), artifact.hash().short());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod hash;
mod kind;
mod requirement;
mod verdict;

pub use artifact::{normalize_path, Artifact, ArtifactError};
pub use hash::{ContentHash, HashError};
pub use kind::{Category, ProjectId, StageKind, UnknownStage};
pub use requirement::{
    is_placeholder_name, FunctionalItem, NonFunctionalItem, Priority, Requirement,
    RequirementError, PLACEHOLDER_NAMES,
};
pub use verdict::{Issue, IssueKind, ReviewVerdict, Severity};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    #[test]
    fn every_file_stage_maps_to_a_distinct_category() {
        let mut seen = std::collections::BTreeSet::new();
        for kind in std::iter::once(StageKind::Code).chain(StageKind::FAN_OUT) {
            assert!(seen.insert(kind.category().unwrap()));
        }
        assert_eq!(seen.len(), Category::ALL.len());
    }

    proptest! {
        #[test]
        fn verdict_passes_matches_threshold(score in -50.0f64..150.0, threshold in 0.0f64..100.0) {
            let verdict = ReviewVerdict::new(score, threshold);
            prop_assert!((0.0..=100.0).contains(&verdict.score()));
            prop_assert_eq!(verdict.passes(), verdict.score() >= threshold);
        }

        #[test]
        fn normalized_paths_never_escape(raw in "[a-z./\\\\]{0,24}") {
            if let Ok(path) = normalize_path(&raw) {
                prop_assert!(!path.starts_with('/'));
                prop_assert!(!path.split('/').any(|s| s == ".." || s.is_empty()));
            }
        }

        #[test]
        fn artifact_hash_is_stable(files in proptest::collection::btree_map("[a-z]{1,8}\\.py", "[ -~]{0,32}", 1..6)) {
            let a = Artifact::new(StageKind::Code, files.clone(), BTreeMap::new()).unwrap();
            let b = Artifact::new(StageKind::Code, files.into_iter().rev(), BTreeMap::new()).unwrap();
            prop_assert_eq!(a.hash(), b.hash());
        }
    }
}
