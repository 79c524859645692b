//! File-bearing stage output
//!
//! An [`Artifact`] is immutable after construction. Regeneration produces a
//! new artifact; the previous one is kept only in the controller's history.

use crate::hash::ContentHash;
use crate::kind::StageKind;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    stage: StageKind,
    files: BTreeMap<String, Vec<u8>>,
    metadata: BTreeMap<String, Value>,
    hash: ContentHash,
}

impl Artifact {
    /// Build an artifact, normalising every path
    ///
    /// # Errors
    /// Returns [`ArtifactError::InvalidPath`] if a path is empty, escapes the
    /// artifact root, or collides with another entry after normalisation.
    pub fn new<P, C>(
        stage: StageKind,
        files: impl IntoIterator<Item = (P, C)>,
        metadata: BTreeMap<String, Value>,
    ) -> Result<Self, ArtifactError>
    where
        P: AsRef<str>,
        C: Into<Vec<u8>>,
    {
        let mut map = BTreeMap::new();
        for (path, content) in files {
            let normalized = normalize_path(path.as_ref())?;
            if map.insert(normalized.clone(), content.into()).is_some() {
                return Err(ArtifactError::InvalidPath {
                    path: normalized,
                    reason: "duplicate entry",
                });
            }
        }
        let hash = ContentHash::of_entries(map.iter().map(|(p, c)| (p.as_str(), c.as_slice())));
        Ok(Self {
            stage,
            files: map,
            metadata,
            hash,
        })
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> StageKind {
        self.stage
    }

    #[inline]
    #[must_use]
    pub fn files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }

    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    #[inline]
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths in sorted order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// UTF-8 view of one file, `None` if absent or not text
    #[must_use]
    pub fn text(&self, path: &str) -> Option<&str> {
        self.files
            .get(path)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// All files that decode as UTF-8, in path order
    pub fn text_files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().filter_map(|(path, bytes)| {
            std::str::from_utf8(bytes)
                .ok()
                .map(|text| (path.as_str(), text))
        })
    }
}

/// Normalise a model-supplied relative path
///
/// Backslashes become `/`, leading `./` and `/` are stripped and empty
/// segments collapse. `..` segments are rejected.
///
/// # Errors
/// Returns [`ArtifactError::InvalidPath`] for an empty or escaping path.
pub fn normalize_path(raw: &str) -> Result<String, ArtifactError> {
    let unified = raw.trim().replace('\\', "/");
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(ArtifactError::InvalidPath {
                    path: raw.to_string(),
                    reason: "parent directory segment",
                })
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(ArtifactError::InvalidPath {
            path: raw.to_string(),
            reason: "empty path",
        });
    }
    Ok(segments.join("/"))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    #[error("invalid artifact path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
}
