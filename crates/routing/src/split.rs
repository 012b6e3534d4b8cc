//! Partitioning a keyset by destination backend for a write operation.

use keytrie_core::{CanonicalName, Key, KeySet};

use crate::trie::Trie;

/// One backend's share of a split write.
pub struct SplitPart<H> {
    /// The mountpoint name the keys in this partition resolved to, or
    /// `None` for the default backend.
    pub mountpoint: Option<CanonicalName>,
    pub handle: H,
    pub keys: KeySet,
    /// Whether any key in this partition is at or below the caller's
    /// `parent` (spec §4.7) — used to skip no-op writes against backends
    /// the operation did not actually touch.
    pub below_parent: bool,
    /// OR of the `sync_needed` bit across this partition's keys.
    pub needs_sync: bool,
}

/// The result of partitioning a keyset by backend (spec §4.7).
pub struct Split<H> {
    parts: Vec<SplitPart<H>>,
}

impl<H: Clone> Split<H> {
    pub fn parts(&self) -> &[SplitPart<H>] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<SplitPart<H>> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn part_index(&mut self, mountpoint: &Option<CanonicalName>) -> Option<usize> {
        self.parts
            .iter()
            .position(|p| &p.mountpoint == mountpoint)
    }
}

/// Partition `keyset` by the backend each key resolves to via `trie`.
///
/// Keys whose name does not resolve to any backend (no mount and no
/// default) are silently dropped from the split — the caller's `trie`
/// always has a default handle once a database is open, so this only
/// arises against a trie under construction.
pub fn split<H: Clone>(trie: &Trie<H>, keyset: KeySet, parent: &Key) -> Split<H> {
    let parent_name = parent.name();
    let mut result = Split { parts: Vec::new() };

    for key in keyset.iter() {
        let name = key.name();
        let Some((mountpoint, handle)) = trie.lookup_with_name(&name) else {
            continue;
        };

        let idx = match result.part_index(&mountpoint) {
            Some(idx) => idx,
            None => {
                result.parts.push(SplitPart {
                    mountpoint: mountpoint.clone(),
                    handle,
                    keys: KeySet::new(0),
                    below_parent: false,
                    needs_sync: false,
                });
                result.parts.len() - 1
            }
        };

        let part = &mut result.parts[idx];
        if name.is_at_or_below(&parent_name) {
            part.below_parent = true;
        }
        if key.flags().sync_needed {
            part.needs_sync = true;
        }
        let _ = part.keys.append(key.clone());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use keytrie_core::Key;

    fn mkkey(name: &str) -> Key {
        Key::new(name).unwrap()
    }

    #[test]
    fn partitions_by_resolved_backend() {
        let mut trie: Trie<&str> = Trie::new();
        trie.insert("user/tests/backend/simple", "simple").unwrap();
        trie.insert("user/tests/backend/two", "two").unwrap();

        let mut ks = KeySet::new(0);
        ks.append(mkkey("user/tests/backend/simple/a")).unwrap();
        ks.append(mkkey("user/tests/backend/two/b")).unwrap();

        let parent = mkkey("user/tests/backend/simple");
        let result = split(&trie, ks, &parent);

        assert_eq!(result.len(), 2);
        for part in result.parts() {
            match part.handle {
                "simple" => assert_eq!(part.keys.len(), 1),
                "two" => assert_eq!(part.keys.len(), 1),
                other => panic!("unexpected handle {other}"),
            }
        }
    }

    #[test]
    fn below_parent_is_set_only_for_matching_partition() {
        let mut trie: Trie<&str> = Trie::new();
        trie.insert("user/tests/backend/simple", "simple").unwrap();
        trie.set_default("default");

        let mut ks = KeySet::new(0);
        ks.append(mkkey("user/tests/backend/simple/a")).unwrap();
        ks.append(mkkey("system/elsewhere")).unwrap();

        let parent = mkkey("user/tests/backend/simple");
        let result = split(&trie, ks, &parent);

        for part in result.parts() {
            if part.mountpoint.as_ref().map(|m| m.render()) == Some("user/tests/backend/simple".to_string()) {
                assert!(part.below_parent);
            } else {
                assert!(!part.below_parent);
            }
        }
    }

    #[test]
    fn needs_sync_ors_across_partition() {
        let mut trie: Trie<&str> = Trie::new();
        trie.insert("user/a", "a").unwrap();

        let k1 = mkkey("user/a/x");
        let k2 = mkkey("user/a/y");
        k2.set_value("v").unwrap();

        let mut ks = KeySet::new(0);
        ks.append(k1).unwrap();
        ks.append(k2).unwrap();

        let parent = mkkey("user/a");
        let result = split(&trie, ks, &parent);

        assert_eq!(result.len(), 1);
        assert!(result.parts()[0].needs_sync);
    }
}
