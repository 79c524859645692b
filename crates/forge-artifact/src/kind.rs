//! Identifiers and stage/category enumerations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Unique project identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub Ulid);

impl ProjectId {
    const PREFIX: &'static str = "project_";

    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

impl FromStr for ProjectId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(Self::PREFIX).unwrap_or(s);
        Ulid::from_string(raw).map(Self)
    }
}

/// The kind of work a stage performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Natural-language request to structured requirement
    Requirements,
    /// Source code (the gated stage)
    Code,
    Tests,
    Docs,
    Deployment,
    Ui,
}

impl StageKind {
    /// Stages that run concurrently once the code stage resolves
    pub const FAN_OUT: [StageKind; 4] = [
        StageKind::Tests,
        StageKind::Docs,
        StageKind::Deployment,
        StageKind::Ui,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::Code => "code",
            Self::Tests => "tests",
            Self::Docs => "docs",
            Self::Deployment => "deployment",
            Self::Ui => "ui",
        }
    }

    /// Output category of file-bearing stages; `None` for requirement structuring
    #[must_use]
    pub const fn category(self) -> Option<Category> {
        match self {
            Self::Requirements => None,
            Self::Code => Some(Category::Src),
            Self::Tests => Some(Category::Tests),
            Self::Docs => Some(Category::Docs),
            Self::Deployment => Some(Category::Deployment),
            Self::Ui => Some(Category::Ui),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requirements" => Ok(Self::Requirements),
            "code" | "src" => Ok(Self::Code),
            "tests" => Ok(Self::Tests),
            "docs" | "documentation" => Ok(Self::Docs),
            "deployment" | "deploy" => Ok(Self::Deployment),
            "ui" => Ok(Self::Ui),
            _ => Err(UnknownStage(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage: {0}")]
pub struct UnknownStage(pub String);

/// Top-level directory of the read-only output projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Src,
    Tests,
    Docs,
    Deployment,
    Ui,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Src,
        Category::Tests,
        Category::Docs,
        Category::Deployment,
        Category::Ui,
    ];

    #[must_use]
    pub const fn dir(self) -> &'static str {
        match self {
            Self::Src => "src",
            Self::Tests => "tests",
            Self::Docs => "docs",
            Self::Deployment => "deployment",
            Self::Ui => "ui",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir())
    }
}
