//! Property-based tests for tool identity and tag filtering.
//!
//! These tests verify the behavioral contracts of the spec model:
//! - Identity: two tools are the same iff runtime and module path match
//! - Filtering: an empty tag list keeps everything, otherwise exactly the
//!   tools sharing a tag survive, in their original order
//! - Add/upsert: a tool list never holds two tools with the same identity

use proptest::prelude::*;
use toolset_core::spec::{Tool, Tools};

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn runtime_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("go".to_string()),
        Just("go@1.23.4".to_string()),
        Just("gh".to_string()),
    ]
}

fn path_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,6}\\.(com|io)/[a-z]{1,6}/[a-z]{1,6}".prop_map(String::from)
}

fn version_strategy() -> impl Strategy<Value = String> {
    (0u32..5, 0u32..20, 0u32..20).prop_map(|(ma, mi, pa)| format!("v{ma}.{mi}.{pa}"))
}

fn tag_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("lint".to_string()),
        Just("fmt".to_string()),
        Just("ci".to_string()),
        Just("release".to_string()),
    ]
}

fn tool_strategy() -> impl Strategy<Value = Tool> {
    (
        runtime_strategy(),
        path_strategy(),
        version_strategy(),
        prop::collection::vec(tag_strategy(), 0..3),
    )
        .prop_map(|(runtime, path, version, tags)| {
            Tool::new(runtime, format!("{path}@{version}")).with_tags(tags)
        })
}

fn tools_strategy() -> impl Strategy<Value = Tools> {
    prop::collection::vec(tool_strategy(), 0..12).prop_map(|tools| {
        let mut list = Tools::new();
        for tool in tools {
            list.add(tool);
        }
        list
    })
}

// =============================================================================
// Identity
// =============================================================================

proptest! {
    #[test]
    fn identity_ignores_version_and_tags(
        tool in tool_strategy(),
        version in version_strategy(),
        tags in prop::collection::vec(tag_strategy(), 0..3),
    ) {
        let other = Tool::new(tool.runtime.clone(), format!("{}@{version}", tool.module_path()))
            .with_tags(tags);
        prop_assert!(tool.is_same(&other));
        prop_assert!(other.is_same(&tool));
        prop_assert_eq!(tool.id(), other.id());
    }

    #[test]
    fn identity_follows_runtime_and_path(a in tool_strategy(), b in tool_strategy()) {
        let expected = a.runtime == b.runtime && a.module_path() == b.module_path();
        prop_assert_eq!(a.is_same(&b), expected);
    }
}

// =============================================================================
// Filtering
// =============================================================================

proptest! {
    #[test]
    fn empty_filter_keeps_everything(tools in tools_strategy()) {
        prop_assert_eq!(tools.filter(&[]), tools);
    }

    #[test]
    fn filter_keeps_exactly_tools_sharing_a_tag(
        tools in tools_strategy(),
        selectors in prop::collection::vec(tag_strategy(), 1..3),
    ) {
        let filtered = tools.filter(&selectors);
        let expected: Vec<&Tool> = tools
            .iter()
            .filter(|t| t.tags.iter().any(|tag| selectors.contains(tag)))
            .collect();
        prop_assert_eq!(filtered.iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn filter_is_idempotent(
        tools in tools_strategy(),
        selectors in prop::collection::vec(tag_strategy(), 0..3),
    ) {
        let once = tools.filter(&selectors);
        prop_assert_eq!(once.filter(&selectors), once);
    }
}

// =============================================================================
// Uniqueness
// =============================================================================

proptest! {
    #[test]
    fn add_and_upsert_keep_identities_unique(
        tools in tools_strategy(),
        extra in prop::collection::vec(tool_strategy(), 0..6),
    ) {
        let mut list = tools;
        for (i, tool) in extra.into_iter().enumerate() {
            if i % 2 == 0 {
                list.add(tool);
            } else {
                list.upsert(tool);
            }
        }
        let all: Vec<&Tool> = list.iter().collect();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                prop_assert!(!a.is_same(b));
            }
        }
    }

    #[test]
    fn upsert_replaces_in_place(tools in tools_strategy(), version in version_strategy()) {
        prop_assume!(!tools.is_empty());
        let target = tools.as_slice()[0].clone();
        let replacement = Tool::new(
            target.runtime.clone(),
            format!("{}@{version}", target.module_path()),
        );

        let mut list = tools.clone();
        list.upsert(replacement.clone());
        prop_assert_eq!(list.len(), tools.len());
        prop_assert_eq!(&list.as_slice()[0], &replacement);
    }
}
