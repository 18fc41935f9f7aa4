//! Summary merging
//!
//! Folds an update fragment into the running summary. Blank strings and empty
//! lists in the update are ignored, so a merge can only add or replace values.

use crate::types::DiscoverySummary;

/// Merge `update` over `current`; `extras` merges key by key
pub fn merge(current: &DiscoverySummary, update: &DiscoverySummary) -> DiscoverySummary {
    let update = update.normalized();
    let mut merged = current.clone();

    fn take<T>(slot: &mut Option<T>, value: Option<T>) {
        if let Some(value) = value {
            *slot = Some(value);
        }
    }

    take(&mut merged.name, update.name);
    take(&mut merged.description, update.description);
    take(&mut merged.objectives, update.objectives);
    take(&mut merged.target_users, update.target_users);
    take(&mut merged.features, update.features);
    take(&mut merged.constraints, update.constraints);
    take(&mut merged.stack_suggestion, update.stack_suggestion);
    merged.extras.extend(update.extras);

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtraValue, SummaryField};
    use proptest::prelude::*;

    #[test]
    fn test_update_overwrites_present_values() {
        let current = DiscoverySummary {
            description: Some("old".into()),
            features: Some(vec!["a".into()]),
            ..Default::default()
        };
        let update = DiscoverySummary {
            description: Some("new".into()),
            features: Some(vec!["b".into(), "c".into()]),
            ..Default::default()
        };
        let merged = merge(&current, &update);
        assert_eq!(merged.description.as_deref(), Some("new"));
        assert_eq!(merged.features, Some(vec!["b".into(), "c".into()]));
    }

    #[test]
    fn test_blank_and_empty_updates_ignored() {
        let current = DiscoverySummary {
            description: Some("keep me".into()),
            objectives: Some(vec!["ship".into()]),
            ..Default::default()
        };
        let update = DiscoverySummary {
            description: Some("   ".into()),
            objectives: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(merge(&current, &update), current);
    }

    #[test]
    fn test_extras_merge_per_key() {
        let mut current = DiscoverySummary::default();
        current.set_extra("platforms", ExtraValue::text("iOS"));
        current.set_extra("deployment", ExtraValue::text("Vercel"));

        let mut update = DiscoverySummary::default();
        update.set_extra("platforms", ExtraValue::text("iOS, Android"));
        update.set_extra("ciCd", ExtraValue::text("GitHub Actions"));
        update.set_extra("deployment", ExtraValue::text(""));

        let merged = merge(&current, &update);
        assert_eq!(merged.extras.len(), 3);
        assert_eq!(merged.extras["platforms"], ExtraValue::text("iOS, Android"));
        assert_eq!(merged.extras["deployment"], ExtraValue::text("Vercel"));
        assert_eq!(merged.extras["ciCd"], ExtraValue::text("GitHub Actions"));
    }

    #[test]
    fn test_absent_fields_are_kept() {
        let current = DiscoverySummary {
            stack_suggestion: Some("Rails".into()),
            ..Default::default()
        };
        let merged = merge(&current, &DiscoverySummary::default());
        assert_eq!(merged, current);
    }

    fn text() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(String::new())),
            Just(Some("  ".to_string())),
            "[a-z]{1,8}".prop_map(Some),
        ]
    }

    fn list() -> impl Strategy<Value = Option<Vec<String>>> {
        prop_oneof![
            Just(None),
            Just(Some(vec![])),
            Just(Some(vec![" ".to_string()])),
            proptest::collection::vec("[a-z]{1,6}", 1..4).prop_map(Some),
        ]
    }

    fn summary() -> impl Strategy<Value = DiscoverySummary> {
        (text(), text(), list(), list(), text(), proptest::collection::btree_map("[a-c]", text(), 0..3))
            .prop_map(|(name, description, objectives, features, stack, extras)| {
                let mut summary = DiscoverySummary {
                    name,
                    description,
                    objectives,
                    features,
                    stack_suggestion: stack,
                    ..Default::default()
                };
                for (key, value) in extras {
                    summary.set_extra(key, ExtraValue::Text(value.unwrap_or_default()));
                }
                summary
            })
    }

    const FIELDS: [SummaryField; 5] = [
        SummaryField::Name,
        SummaryField::Description,
        SummaryField::Objectives,
        SummaryField::Features,
        SummaryField::StackSuggestion,
    ];

    proptest! {
        #[test]
        fn prop_merge_never_loses_present_values(current in summary(), update in summary()) {
            let merged = merge(&current, &update);
            for field in FIELDS {
                if current.has(field) {
                    prop_assert!(merged.has(field), "{:?} lost", field);
                }
            }
            for key in current.extras.keys() {
                if current.has_extra(key) {
                    prop_assert!(merged.has_extra(key), "extras.{} lost", key);
                }
            }
        }

        #[test]
        fn prop_merge_with_empty_update_is_identity(current in summary()) {
            prop_assert_eq!(merge(&current, &DiscoverySummary::default()), current);
        }
    }
}
