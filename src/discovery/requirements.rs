//! Document requirements
//!
//! Static descriptors of what the generated documents need to know, plus the
//! completeness checks the conversation loop uses to decide when to stop.

use crate::constants::weights;
use crate::types::{DiscoverySummary, SummaryField};

/// Shape of the value a requirement collects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Scalar,
    List,
}

/// Where a requirement's value lives in the summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementScope {
    Summary(SummaryField),
    /// Key inside `summary.extras`
    Extras(&'static str),
}

/// A possible piece of information to collect, independent of whether it is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentRequirement {
    pub label: &'static str,
    pub value_type: ValueType,
    /// Question asked when no backend can phrase one
    pub fallback_prompt: &'static str,
    pub required: bool,
    pub scope: RequirementScope,
}

impl DocumentRequirement {
    const fn summary(
        field: SummaryField,
        label: &'static str,
        value_type: ValueType,
        required: bool,
        fallback_prompt: &'static str,
    ) -> Self {
        Self {
            label,
            value_type,
            fallback_prompt,
            required,
            scope: RequirementScope::Summary(field),
        }
    }

    pub(crate) const fn extras(
        key: &'static str,
        label: &'static str,
        required: bool,
        fallback_prompt: &'static str,
    ) -> Self {
        Self {
            label,
            value_type: ValueType::Scalar,
            fallback_prompt,
            required,
            scope: RequirementScope::Extras(key),
        }
    }

    /// Field key or extras key, as persisted
    pub fn key(&self) -> &'static str {
        match self.scope {
            RequirementScope::Summary(field) => field.key(),
            RequirementScope::Extras(key) => key,
        }
    }

    /// Missing means absent, blank, or an empty list
    pub fn is_missing(&self, summary: &DiscoverySummary) -> bool {
        match self.scope {
            RequirementScope::Summary(field) => !summary.has(field),
            RequirementScope::Extras(key) => !summary.has_extra(key),
        }
    }

    /// Gap weight when this requirement feeds the specs document
    pub fn specs_weight(&self) -> u8 {
        if self.required {
            weights::REQUIRED
        } else {
            weights::OPTIONAL
        }
    }
}

/// Requirements every project has
pub const BASE_REQUIREMENTS: [DocumentRequirement; 6] = [
    DocumentRequirement::summary(
        SummaryField::Description,
        "Project description",
        ValueType::Scalar,
        true,
        "In a sentence or two, what are you building?",
    ),
    DocumentRequirement::summary(
        SummaryField::Objectives,
        "Objectives",
        ValueType::List,
        true,
        "What are the main goals this project should achieve?",
    ),
    DocumentRequirement::summary(
        SummaryField::TargetUsers,
        "Target users",
        ValueType::List,
        true,
        "Who are the primary users of this project?",
    ),
    DocumentRequirement::summary(
        SummaryField::Features,
        "Core features",
        ValueType::List,
        true,
        "Which core features does the first version need? (comma separated)",
    ),
    DocumentRequirement::summary(
        SummaryField::Constraints,
        "Constraints",
        ValueType::List,
        false,
        "Are there constraints we should know about, such as budget, compliance or existing systems?",
    ),
    DocumentRequirement::extras(
        "timeline",
        "Timeline",
        false,
        "What timeline are you working towards for a first release?",
    ),
];

/// Requirement appended when the suggested stack mentions one of the triggers
#[derive(Debug, Clone, Copy)]
pub struct ConditionalRequirement {
    pub triggers: &'static [&'static str],
    pub requirement: DocumentRequirement,
}

pub const CONDITIONAL_REQUIREMENTS: [ConditionalRequirement; 2] = [
    ConditionalRequirement {
        triggers: &["react-native", "expo"],
        requirement: DocumentRequirement::extras(
            "platforms",
            "Mobile platforms",
            false,
            "Which mobile platforms must the app support: iOS, Android, or both?",
        ),
    },
    ConditionalRequirement {
        triggers: &["nextjs", "next.js"],
        requirement: DocumentRequirement::extras(
            "authStrategy",
            "Authentication strategy",
            false,
            "How should users sign in: email and password, OAuth providers, or magic links?",
        ),
    },
];

/// Base requirements plus any conditional ones triggered by `stackSuggestion`
pub fn requirements_for(summary: &DiscoverySummary) -> Vec<DocumentRequirement> {
    let stack = summary
        .stack_suggestion
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    let mut requirements = BASE_REQUIREMENTS.to_vec();
    if !stack.trim().is_empty() {
        requirements.extend(
            CONDITIONAL_REQUIREMENTS
                .iter()
                .filter(|c| c.triggers.iter().any(|t| stack.contains(t)))
                .map(|c| c.requirement),
        );
    }
    requirements
}

/// Required requirements that are still missing, in table order
pub fn missing_required(summary: &DiscoverySummary) -> Vec<DocumentRequirement> {
    requirements_for(summary)
        .into_iter()
        .filter(|r| r.required && r.is_missing(summary))
        .collect()
}

/// Fast path: description, objectives, target users and features are known.
///
/// Stack and architecture details are deliberately not part of this check.
pub fn is_enough_for_docs(summary: &DiscoverySummary) -> bool {
    [
        SummaryField::Description,
        SummaryField::Objectives,
        SummaryField::TargetUsers,
        SummaryField::Features,
    ]
    .into_iter()
    .all(|field| summary.has(field))
}

/// Nothing required is missing, or the fast path holds
pub fn is_complete(summary: &DiscoverySummary) -> bool {
    missing_required(summary).is_empty() || is_enough_for_docs(summary)
}
