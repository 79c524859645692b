//! Structured requirement record
//!
//! The requirement-structuring stage turns a free-form request into a
//! [`Requirement`]. Models emit the record with varying field names, so the
//! deserializer accepts the common aliases (`project_name`,
//! `functional_requirements`, `technical_constraints`, ...) and tolerates
//! missing optional sections.

use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Names models emit when echoing a schema template instead of answering
pub const PLACEHOLDER_NAMES: &[&str] = &[
    "generated project",
    "project name",
    "[project_name]",
    "<project_name>",
    "your project name",
];

/// Alternate keys models use, paired with the field they fill
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("name", "project_name"),
    ("functional_items", "functional_requirements"),
    ("non_functional_items", "non_functional_requirements"),
    ("constraints", "technical_constraints"),
];

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Fold alias keys into their canonical field; a non-blank canonical value wins
fn normalize_aliases(record: &mut Map<String, Value>) {
    for (field, alias) in FIELD_ALIASES {
        let Some(alt) = record.remove(*alias) else {
            continue;
        };
        match record.get(*field) {
            Some(current) if !is_blank(current) => {}
            _ => {
                record.insert((*field).to_string(), alt);
            }
        }
    }
}

/// True when `name` is blank or one of the known template placeholders
#[must_use]
pub fn is_placeholder_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty()
        || PLACEHOLDER_NAMES
            .iter()
            .any(|p| trimmed.eq_ignore_ascii_case(p))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Lenient parse: case-insensitive, unknown values fall back to `Medium`
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" | "must" => Self::High,
            "low" | "could" | "nice-to-have" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map(Self::parse_lenient).unwrap_or_default())
    }
}

/// One functional requirement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionalItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    /// Ordered, de-duplicated
    pub acceptance_criteria: IndexSet<String>,
}

impl FunctionalItem {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_criterion(mut self, criterion: impl Into<String>) -> Self {
        self.acceptance_criteria.insert(criterion.into());
        self
    }
}

/// One non-functional requirement (performance, security, usability, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonFunctionalItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Structured requirement, immutable once accepted by the controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirement {
    #[serde(alias = "project_name")]
    pub name: String,
    pub description: String,
    #[serde(alias = "functional_requirements")]
    pub functional_items: Vec<FunctionalItem>,
    #[serde(alias = "non_functional_requirements")]
    pub non_functional_items: Vec<NonFunctionalItem>,
    #[serde(alias = "technical_constraints")]
    pub constraints: Vec<String>,
    pub assumptions: Vec<String>,
    pub dependencies: Vec<String>,
    pub key_components: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_complexity: Option<String>,
}

impl Requirement {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_functional_item(mut self, item: FunctionalItem) -> Self {
        self.functional_items.push(item);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    /// Decode from an extracted record and enforce the record invariants
    ///
    /// # Errors
    /// Returns [`RequirementError`] if the map does not decode or the name is
    /// blank or a placeholder.
    pub fn from_record(mut record: Map<String, Value>) -> Result<Self, RequirementError> {
        normalize_aliases(&mut record);
        let requirement: Self = serde_json::from_value(Value::Object(record))?;
        requirement.validate()?;
        Ok(requirement)
    }

    /// # Errors
    /// Returns [`RequirementError::PlaceholderName`] for a blank or template name.
    pub fn validate(&self) -> Result<(), RequirementError> {
        if is_placeholder_name(&self.name) {
            return Err(RequirementError::PlaceholderName(self.name.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequirementError {
    #[error("requirement name is blank or a placeholder: {0:?}")]
    PlaceholderName(String),

    #[error("malformed requirement record: {0}")]
    Decode(#[from] serde_json::Error),
}
