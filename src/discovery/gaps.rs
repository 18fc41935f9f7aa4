//! Gap analysis
//!
//! Ranks the information still missing from a summary. Pure and deterministic:
//! the only input besides the summary is the text of the latest user turn,
//! which boosts topically relevant architecture gaps.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use super::requirements::{DocumentRequirement, RequirementScope, ValueType, requirements_for};
use crate::constants::weights;
use crate::types::turn::last_user_message;
use crate::types::{DiscoverySummary, SummaryField, Turn};

/// Output document a gap feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetDocument {
    Specs,
    Architecture,
    Features,
    Stack,
}

impl fmt::Display for TargetDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Specs => "specs",
            Self::Architecture => "architecture",
            Self::Features => "features",
            Self::Stack => "stack",
        };
        f.write_str(name)
    }
}

/// A missing requirement with its target document and priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentGap {
    pub requirement: DocumentRequirement,
    pub target: TargetDocument,
    pub weight: u8,
}

impl DocumentGap {
    pub fn key(&self) -> &'static str {
        self.requirement.key()
    }

    pub fn label(&self) -> &'static str {
        self.requirement.label
    }

    pub fn fallback_prompt(&self) -> &'static str {
        self.requirement.fallback_prompt
    }
}

impl fmt::Display for DocumentGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({}, weight {})", self.target, self.label(), self.key(), self.weight)
    }
}

// =============================================================================
// Static gap tables
// =============================================================================

struct ArchitectureTopic {
    requirement: DocumentRequirement,
    keywords: &'static [&'static str],
    boosted: u8,
}

const ARCHITECTURE_TOPICS: [ArchitectureTopic; 6] = [
    ArchitectureTopic {
        requirement: DocumentRequirement::extras(
            "platforms",
            "Target platforms",
            false,
            "Which platforms should this run on: web, iOS, Android, desktop?",
        ),
        keywords: &["mobile", "ios", "android"],
        boosted: 9,
    },
    ArchitectureTopic {
        requirement: DocumentRequirement::extras(
            "deployment",
            "Deployment",
            false,
            "Where do you expect to deploy or host it?",
        ),
        keywords: &["deploy", "hosting", "cloud"],
        boosted: 8,
    },
    ArchitectureTopic {
        requirement: DocumentRequirement::extras(
            "dataStorage",
            "Data storage",
            false,
            "What data needs to be stored, and does it need to work offline?",
        ),
        keywords: &["database", "storage", "offline"],
        boosted: 8,
    },
    ArchitectureTopic {
        requirement: DocumentRequirement::extras(
            "authStrategy",
            "Authentication",
            false,
            "Do users need accounts? If so, how should they sign in?",
        ),
        keywords: &["auth", "login", "sign in"],
        boosted: 8,
    },
    ArchitectureTopic {
        requirement: DocumentRequirement::extras(
            "testingApproach",
            "Testing approach",
            false,
            "How do you want to approach testing: unit, end-to-end, manual?",
        ),
        keywords: &["testing"],
        boosted: 8,
    },
    ArchitectureTopic {
        requirement: DocumentRequirement::extras(
            "ciCd",
            "CI/CD",
            false,
            "Do you need a CI/CD pipeline, and on which service?",
        ),
        keywords: &["ci", "cicd", "pipeline"],
        boosted: 8,
    },
];

const FEATURE_PRIORITIES: DocumentRequirement = DocumentRequirement::extras(
    "featurePriorities",
    "Feature priorities",
    false,
    "Which of those features matter most for the first release?",
);

const STACK_SELECTION: DocumentRequirement = DocumentRequirement {
    label: "Technology stack",
    value_type: ValueType::Scalar,
    fallback_prompt: "Do you have a preferred technology stack, or should we suggest one?",
    required: false,
    scope: RequirementScope::Summary(SummaryField::StackSuggestion),
};

const MINIMAL_CLARIFICATION: DocumentRequirement = DocumentRequirement::extras(
    "minimalMeans",
    "Scope of \"minimal\"",
    false,
    "You mentioned keeping it minimal. What is the smallest version you would be happy to ship?",
);

// =============================================================================
// Gap computation
// =============================================================================

/// Ranked gaps for `summary`, highest weight first, ties in insertion order
pub fn compute_gaps(summary: &DiscoverySummary, history: &[Turn]) -> Vec<DocumentGap> {
    let last_user = last_user_message(history).unwrap_or_default().to_lowercase();
    let mut gaps = Vec::new();

    for requirement in requirements_for(summary) {
        if requirement.is_missing(summary) {
            gaps.push(DocumentGap {
                requirement,
                target: TargetDocument::Specs,
                weight: requirement.specs_weight(),
            });
        }
    }

    for topic in &ARCHITECTURE_TOPICS {
        if topic.requirement.is_missing(summary) {
            let mentioned = topic.keywords.iter().any(|k| last_user.contains(k));
            gaps.push(DocumentGap {
                requirement: topic.requirement,
                target: TargetDocument::Architecture,
                weight: if mentioned {
                    topic.boosted
                } else {
                    weights::ARCHITECTURE_BASE
                },
            });
        }
    }

    if summary.has(SummaryField::Features) && FEATURE_PRIORITIES.is_missing(summary) {
        gaps.push(DocumentGap {
            requirement: FEATURE_PRIORITIES,
            target: TargetDocument::Features,
            weight: weights::FEATURE_PRIORITIES,
        });
    }

    if STACK_SELECTION.is_missing(summary) {
        gaps.push(DocumentGap {
            requirement: STACK_SELECTION,
            target: TargetDocument::Stack,
            weight: weights::STACK_SELECTION,
        });
    }

    if last_user.contains("minimal") && MINIMAL_CLARIFICATION.is_missing(summary) {
        gaps.push(DocumentGap {
            requirement: MINIMAL_CLARIFICATION,
            target: TargetDocument::Specs,
            weight: weights::MINIMAL_CLARIFICATION,
        });
    }

    let mut seen = HashSet::new();
    gaps.retain(|gap| seen.insert((gap.target, gap.key())));

    // Vec::sort_by is stable
    gaps.sort_by(|a, b| b.weight.cmp(&a.weight));
    gaps
}
