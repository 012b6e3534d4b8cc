//! Property-based tests for the quantified invariants in spec §8:
//! - a `KeySet` stays sorted in canonical order and name-unique under any
//!   mutation sequence;
//! - a round-trip through `CanonicalName::parse`/`render` is stable.

use keytrie_core::{CanonicalName, Key, KeySet};
use proptest::prelude::*;

/// Generates syntactically valid level strings: ASCII alphanumerics only,
/// so every generated name is free of escape-grammar edge cases (those are
/// covered directly in `name.rs`'s unit tests).
fn level_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn namespace_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof!["spec", "proc", "dir", "user", "system"]
}

fn name_strategy() -> impl Strategy<Value = String> {
    (namespace_strategy(), prop::collection::vec(level_strategy(), 0..4)).prop_map(
        |(namespace, levels)| {
            let mut name = namespace.to_string();
            for level in levels {
                name.push('/');
                name.push_str(&level);
            }
            name
        },
    )
}

proptest! {
    #[test]
    fn keyset_stays_sorted_and_unique_under_random_appends(names in prop::collection::vec(name_strategy(), 0..40)) {
        let mut ks = KeySet::new(0);
        for name in &names {
            let key = Key::new(name).unwrap();
            ks.append(key).unwrap();
        }

        let rendered: Vec<String> = ks.iter().map(|k| k.name().render()).collect();

        let mut sorted = rendered.clone();
        sorted.sort();
        prop_assert_eq!(&rendered, &sorted, "keyset must stay in canonical sorted order");

        let mut dedup = rendered.clone();
        dedup.dedup();
        prop_assert_eq!(rendered.len(), dedup.len(), "keyset must contain no name-equal duplicates");
    }

    #[test]
    fn keyset_len_never_exceeds_unique_name_count(names in prop::collection::vec(name_strategy(), 0..40)) {
        let mut ks = KeySet::new(0);
        for name in &names {
            let key = Key::new(name).unwrap();
            ks.append(key).unwrap();
        }

        let unique: std::collections::HashSet<_> = names
            .iter()
            .map(|n| CanonicalName::parse(n).unwrap())
            .collect();
        prop_assert_eq!(ks.len(), unique.len());
    }

    #[test]
    fn canonical_name_round_trips(name in name_strategy()) {
        let parsed = CanonicalName::parse(&name).unwrap();
        let rendered = parsed.render();
        let reparsed = CanonicalName::parse(&rendered).unwrap();
        prop_assert_eq!(parsed, reparsed);
        prop_assert_eq!(rendered.clone(), CanonicalName::parse(&rendered).unwrap().render());
    }

    #[test]
    fn use_count_matches_membership_across_keysets(
        name in name_strategy(),
        keyset_count in 1usize..5,
    ) {
        let key = Key::new(&name).unwrap();
        let mut keysets: Vec<KeySet> = Vec::new();
        for _ in 0..keyset_count {
            let mut ks = KeySet::new(0);
            ks.append(key.clone()).unwrap();
            keysets.push(ks);
        }
        prop_assert_eq!(key.use_count(), keyset_count);

        let mut removed = 0usize;
        while let Some(mut ks) = keysets.pop() {
            ks.pop();
            removed += 1;
            prop_assert_eq!(key.use_count(), keyset_count - removed);
        }
        prop_assert_eq!(key.use_count(), 0);
    }
}
