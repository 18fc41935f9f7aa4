//! Discovery summary
//!
//! The partially-filled knowledge record the conversation is trying to
//! complete. Every field is optional so "missing" and "present" are distinct.
//! An empty list or a blank string counts as missing everywhere, and
//! [`DiscoverySummary::normalized`] strips such values before merging.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::utils::{json_string, json_string_list, slugify};

/// Fixed summary fields addressable by requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryField {
    Name,
    Description,
    Objectives,
    TargetUsers,
    Features,
    Constraints,
    StackSuggestion,
}

impl SummaryField {
    /// Wire key (camelCase, as persisted)
    pub fn key(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Objectives => "objectives",
            Self::TargetUsers => "targetUsers",
            Self::Features => "features",
            Self::Constraints => "constraints",
            Self::StackSuggestion => "stackSuggestion",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Self::Objectives | Self::TargetUsers | Self::Features | Self::Constraints
        )
    }
}

/// Free-form scalar stored in `extras`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl ExtraValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON scalar; arrays are joined, objects and nulls are rejected
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()))
                    .map(String::from)
                    .collect();
                (!parts.is_empty()).then(|| Self::Text(parts.join(", ")))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ExtraValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Structured knowledge about the project being discovered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoverySummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objectives: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_users: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_suggestion: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, ExtraValue>,
}

impl DiscoverySummary {
    /// Summary seeded with the user's initial idea
    pub fn seeded(seed: Option<&str>) -> Self {
        Self {
            description: seed.map(str::trim).filter(|s| !s.is_empty()).map(String::from),
            ..Default::default()
        }
    }

    pub fn scalar(&self, field: SummaryField) -> Option<&str> {
        match field {
            SummaryField::Name => self.name.as_deref(),
            SummaryField::Description => self.description.as_deref(),
            SummaryField::StackSuggestion => self.stack_suggestion.as_deref(),
            _ => None,
        }
    }

    pub fn list(&self, field: SummaryField) -> Option<&[String]> {
        match field {
            SummaryField::Objectives => self.objectives.as_deref(),
            SummaryField::TargetUsers => self.target_users.as_deref(),
            SummaryField::Features => self.features.as_deref(),
            SummaryField::Constraints => self.constraints.as_deref(),
            _ => None,
        }
    }

    /// Whether a field holds a usable value (non-blank / non-empty)
    pub fn has(&self, field: SummaryField) -> bool {
        if field.is_list() {
            self.list(field).is_some_and(|l| !l.is_empty())
        } else {
            self.scalar(field).is_some_and(|s| !s.trim().is_empty())
        }
    }

    pub fn has_extra(&self, key: &str) -> bool {
        self.extras.get(key).is_some_and(|v| !v.is_blank())
    }

    pub fn set_scalar(&mut self, field: SummaryField, value: String) {
        match field {
            SummaryField::Name => self.name = Some(value),
            SummaryField::Description => self.description = Some(value),
            SummaryField::StackSuggestion => self.stack_suggestion = Some(value),
            _ => {}
        }
    }

    pub fn set_list(&mut self, field: SummaryField, values: Vec<String>) {
        match field {
            SummaryField::Objectives => self.objectives = Some(values),
            SummaryField::TargetUsers => self.target_users = Some(values),
            SummaryField::Features => self.features = Some(values),
            SummaryField::Constraints => self.constraints = Some(values),
            _ => {}
        }
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: ExtraValue) {
        self.extras.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.normalized() == Self::default()
    }

    /// Copy with blank strings, blank list items, empty lists and blank extras removed
    pub fn normalized(&self) -> Self {
        fn text(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        }
        fn items(value: &Option<Vec<String>>) -> Option<Vec<String>> {
            let cleaned: Vec<String> = value
                .iter()
                .flatten()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            (!cleaned.is_empty()).then_some(cleaned)
        }

        Self {
            name: text(&self.name),
            description: text(&self.description),
            objectives: items(&self.objectives),
            target_users: items(&self.target_users),
            features: items(&self.features),
            constraints: items(&self.constraints),
            stack_suggestion: text(&self.stack_suggestion),
            extras: self
                .extras
                .iter()
                .filter(|(k, v)| !k.trim().is_empty() && !v.is_blank())
                .map(|(k, v)| match v {
                    ExtraValue::Text(s) => (k.clone(), ExtraValue::Text(s.trim().to_string())),
                    other => (k.clone(), other.clone()),
                })
                .collect(),
        }
    }

    /// Lenient conversion from a backend's JSON object.
    ///
    /// Accepts strings where lists are expected (split on commas) and arrays where
    /// strings are expected (joined). Unknown keys are ignored, nested objects in
    /// `extras` are dropped. The result is normalized.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let scalar = |key: &str| -> Option<String> {
            match object.get(key)? {
                Value::Array(_) => json_string_list(value, key).map(|items| items.join(", ")),
                _ => json_string(value, key),
            }
        };

        let extras = object
            .get("extras")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| ExtraValue::from_json(v).map(|ev| (k.clone(), ev)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: scalar("name"),
            description: scalar("description"),
            objectives: json_string_list(value, "objectives"),
            target_users: json_string_list(value, "targetUsers"),
            features: json_string_list(value, "features"),
            constraints: json_string_list(value, "constraints"),
            stack_suggestion: scalar("stackSuggestion"),
            extras,
        }
        .normalized()
    }
}

/// Finalized hand-off record for document generation.
///
/// Required fields are concrete: the description falls back to the seed idea and
/// then to a placeholder, lists default to empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBrief {
    pub name: String,
    pub description: String,
    pub objectives: Vec<String>,
    pub target_users: Vec<String>,
    pub features: Vec<String>,
    pub constraints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_suggestion: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, ExtraValue>,
}

/// Description used when neither the conversation nor the seed supplied one
pub const PLACEHOLDER_DESCRIPTION: &str = "A new software project";

impl ProjectBrief {
    pub fn from_summary(summary: &DiscoverySummary, seed: Option<&str>) -> Self {
        let summary = summary.normalized();
        let seed = seed.map(str::trim).filter(|s| !s.is_empty());

        let description = summary
            .description
            .clone()
            .or_else(|| seed.map(String::from))
            .unwrap_or_else(|| PLACEHOLDER_DESCRIPTION.to_string());

        let name = summary
            .name
            .clone()
            .or_else(|| seed.map(|s| slugify(s, 4)).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "new-project".to_string());

        Self {
            name,
            description,
            objectives: summary.objectives.unwrap_or_default(),
            target_users: summary.target_users.unwrap_or_default(),
            features: summary.features.unwrap_or_default(),
            constraints: summary.constraints.unwrap_or_default(),
            stack_suggestion: summary.stack_suggestion,
            extras: summary.extras,
        }
    }
}
