//! Shared view of the artifact under review

use crate::error::EvaluationError;
use forge_artifact::{Artifact, Requirement};

/// Extensions analysed as source code
pub const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "java", "cpp", "c", "cs", "php", "rb", "go", "rs",
];

#[must_use]
pub fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty()).then_some(ext)
}

#[must_use]
pub fn is_code_file(path: &str) -> bool {
    extension(path).is_some_and(|ext| {
        CODE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

/// Artifact plus its decoded text, built once per review
#[derive(Debug)]
pub struct ReviewContext<'a> {
    pub artifact: &'a Artifact,
    pub requirement: &'a Requirement,
    texts: Vec<(&'a str, &'a str)>,
}

impl<'a> ReviewContext<'a> {
    /// # Errors
    /// Returns [`EvaluationError`] when there is nothing readable to review.
    pub fn new(artifact: &'a Artifact, requirement: &'a Requirement) -> Result<Self, EvaluationError> {
        if artifact.is_empty() {
            return Err(EvaluationError::NoFiles);
        }
        let texts: Vec<_> = artifact.text_files().collect();
        if texts.is_empty() {
            return Err(EvaluationError::NoReadableText);
        }
        Ok(Self {
            artifact,
            requirement,
            texts,
        })
    }

    /// Every UTF-8 file
    pub fn texts(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.texts.iter().copied()
    }

    /// UTF-8 files with a source-code extension
    pub fn code_files(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.texts().filter(|(path, _)| is_code_file(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_ignores_dotfiles_and_dirs() {
        assert_eq!(extension("src/main.rs"), Some("rs"));
        assert_eq!(extension(".env"), None);
        assert_eq!(extension("v1.2/Makefile"), None);
        assert_eq!(extension("main"), None);
    }

    #[test]
    fn code_file_detection_is_case_insensitive() {
        assert!(is_code_file("App.PY"));
        assert!(is_code_file("web/index.tsx"));
        assert!(!is_code_file("README.md"));
        assert!(!is_code_file("config.json"));
    }
}
