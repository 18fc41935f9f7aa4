//! Heuristic answer extraction
//!
//! Deterministic keyword rules used when the backend produced nothing. Rules
//! only propose additions: list fields receive the union of what is known and
//! the comma-split answer, extras defaults are only written where missing.

use super::gaps::DocumentGap;
use super::requirements::{RequirementScope, ValueType};
use crate::types::utils::split_list;
use crate::types::{DiscoverySummary, ExtraValue, SummaryField};

const LIST_RULES: [(&[&str], SummaryField); 4] = [
    (&["feature"], SummaryField::Features),
    (&["objective"], SummaryField::Objectives),
    (&["user", "audience", "target"], SummaryField::TargetUsers),
    (&["constraint"], SummaryField::Constraints),
];

const PLATFORM_RULES: [(&str, &[&str]); 4] = [
    ("ios", &["iOS"]),
    ("android", &["Android"]),
    ("react native", &["iOS", "Android"]),
    ("next.js", &["Web"]),
];

const DEFAULT_RULES: [(&str, &str, &str); 3] = [
    (
        "minimal",
        "minimalMeans",
        "Smallest useful release: the core flow only, secondary features deferred",
    ),
    (
        "testing",
        "testingApproach",
        "Unit tests for core logic plus end-to-end smoke tests of the main flows",
    ),
    (
        "ci/cd",
        "ciCd",
        "Automated pipeline running the test suite on every push and deploying from main",
    ),
];

/// Propose an update fragment from the latest answer.
///
/// `focus` is the gap the question was about; when no rule touched its field and
/// the field is still missing, the whole answer is attributed to it.
pub fn heuristic_extract(
    answer: &str,
    summary: &DiscoverySummary,
    focus: Option<&DocumentGap>,
) -> DiscoverySummary {
    let answer = answer.trim();
    let mut fragment = DiscoverySummary::default();
    if answer.is_empty() {
        return fragment;
    }
    let lower = answer.to_lowercase();

    for (keywords, field) in LIST_RULES {
        if keywords.iter().any(|k| lower.contains(k)) {
            fragment.set_list(field, union(summary.list(field), split_list(answer)));
        }
    }

    let platforms: Vec<String> = PLATFORM_RULES
        .iter()
        .filter(|(keyword, _)| lower.contains(keyword))
        .flat_map(|(_, names)| names.iter().map(|n| n.to_string()))
        .collect();
    if !platforms.is_empty() {
        let existing = summary
            .extras
            .get("platforms")
            .map(|v| split_list(&v.to_string()))
            .unwrap_or_default();
        let merged = union(Some(existing.as_slice()), platforms);
        fragment.set_extra("platforms", ExtraValue::text(merged.join(", ")));
    }

    for (keyword, key, default) in DEFAULT_RULES {
        if lower.contains(keyword) && !summary.has_extra(key) {
            fragment.set_extra(key, ExtraValue::text(default));
        }
    }

    if let Some(gap) = focus {
        attribute_to_focus(&mut fragment, summary, gap, answer);
    }

    fragment.normalized()
}

fn attribute_to_focus(
    fragment: &mut DiscoverySummary,
    summary: &DiscoverySummary,
    gap: &DocumentGap,
    answer: &str,
) {
    let requirement = gap.requirement;
    if !requirement.is_missing(summary) || !requirement.is_missing(fragment) {
        return;
    }
    match requirement.scope {
        RequirementScope::Summary(field) => match requirement.value_type {
            ValueType::List => fragment.set_list(field, split_list(answer)),
            ValueType::Scalar => fragment.set_scalar(field, answer.to_string()),
        },
        RequirementScope::Extras(key) => fragment.set_extra(key, ExtraValue::text(answer)),
    }
}

/// Existing items followed by new ones, case-insensitively deduplicated
fn union(existing: Option<&[String]>, new: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = existing.map(<[String]>::to_vec).unwrap_or_default();
    for item in new {
        if !out.iter().any(|known| known.eq_ignore_ascii_case(&item)) {
            out.push(item);
        }
    }
    out
}
