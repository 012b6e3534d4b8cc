//! Longest-prefix mountpoint resolution.
//!
//! Generic over a `Clone`-able handle type so this crate has no dependency
//! on `keytrie-engine` — the mount loader instantiates `Trie<Rc<Backend>>`,
//! tests instantiate `Trie<&str>` or similar.
//!
//! Implemented as a name→handle map plus a linear scan for the
//! longest-prefix walk, the hash-map alternative to a byte-indexed radix
//! trie that the source's design notes explicitly sanction (spec §9: "an
//! implementation may alternatively use a hash map from mountpoint name to
//! backend plus a sorted list for prefix walks, provided §8's resolution
//! invariants hold"). Mount counts are small (tens, not millions) so the
//! O(mounts) lookup is not a concern in practice.

use std::collections::HashMap;

use keytrie_core::{CanonicalName, NameError};

/// Errors raised inserting a mountpoint into a `Trie`.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum TrieError {
    /// The mountpoint name does not satisfy the name grammar.
    #[error("invalid mountpoint name: {0}")]
    InvalidName(#[from] NameError),
}

/// A longest-prefix resolver from key names to backend handles.
///
/// The empty name addresses the root slot, which holds the default
/// handle (spec §4.3: "the root (empty-string) slot serves as the default
/// backend").
pub struct Trie<H> {
    mounts: HashMap<CanonicalName, H>,
    default: Option<H>,
}

impl<H: Clone> Trie<H> {
    pub fn new() -> Trie<H> {
        Trie {
            mounts: HashMap::new(),
            default: None,
        }
    }

    /// Bind `handle` to `name` (or to the root slot if `name` is empty).
    ///
    /// Re-inserting at an existing name or at the root replaces the prior
    /// handle.
    pub fn insert(&mut self, name: &str, handle: H) -> Result<(), TrieError> {
        if name.is_empty() {
            self.default = Some(handle);
            return Ok(());
        }
        let name = CanonicalName::parse(name)?;
        self.mounts.insert(name, handle);
        Ok(())
    }

    /// Insert at an already-canonicalised name (used by the mount loader,
    /// which canonicalises the mountpoint key's name once up front).
    pub fn insert_canonical(&mut self, name: CanonicalName, handle: H) {
        self.mounts.insert(name, handle);
    }

    pub fn set_default(&mut self, handle: H) {
        self.default = Some(handle);
    }

    /// Resolve `name` to the handle whose mountpoint is the longest prefix
    /// of `name`, falling back to the default handle (spec §4.3 edge-case
    /// policy: exact match, deepest ancestor, or default).
    pub fn lookup(&self, name: &CanonicalName) -> Option<H> {
        if let Some(h) = self.mounts.get(name) {
            return Some(h.clone());
        }
        self.mounts
            .iter()
            .filter(|(mount, _)| name.is_at_or_below(mount))
            .max_by_key(|(mount, _)| mount.levels().len())
            .map(|(_, h)| h.clone())
            .or_else(|| self.default.clone())
    }

    /// Resolve a raw name string, canonicalising first. An empty string
    /// queries the root slot directly.
    pub fn lookup_str(&self, name: &str) -> Result<Option<H>, NameError> {
        if name.is_empty() {
            return Ok(self.default.clone());
        }
        let name = CanonicalName::parse(name)?;
        Ok(self.lookup(&name))
    }

    /// Resolve `name` together with the mountpoint name that matched, so a
    /// caller (namely `Split`) can group keys by backend identity without
    /// requiring `H: Eq`. `None` mountpoint means the default handle
    /// answered the query.
    pub fn lookup_with_name(&self, name: &CanonicalName) -> Option<(Option<CanonicalName>, H)> {
        if let Some(h) = self.mounts.get(name) {
            return Some((Some(name.clone()), h.clone()));
        }
        if let Some((mount, h)) = self
            .mounts
            .iter()
            .filter(|(mount, _)| name.is_at_or_below(mount))
            .max_by_key(|(mount, _)| mount.levels().len())
        {
            return Some((Some(mount.clone()), h.clone()));
        }
        self.default.clone().map(|h| (None, h))
    }

    pub fn default_handle(&self) -> Option<H> {
        self.default.clone()
    }

    /// Drop all mounts and the default handle.
    pub fn close(&mut self) {
        self.mounts.clear();
        self.default = None;
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.len()
    }

    /// Remove and return every handle (mounted and default), leaving the
    /// trie empty. Used by callers (namely `keytrie-api::Database::close`)
    /// that need to take ownership of each backend to run its own close
    /// sequence rather than merely dropping the trie's references.
    pub fn take_all(&mut self) -> (Vec<H>, Option<H>) {
        let mounts = std::mem::take(&mut self.mounts)
            .into_values()
            .collect();
        let default = self.default.take();
        (mounts, default)
    }
}

impl<H: Clone> Default for Trie<H> {
    fn default() -> Trie<H> {
        Trie::new()
    }
}
