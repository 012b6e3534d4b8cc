//! `KeySet`: an ordered, name-unique collection of keys with a cursor.

use thiserror::Error;

use crate::key::Key;
use crate::name::CanonicalName;

/// The minimum backing-array capacity a fresh `KeySet` allocates (spec
/// §4.2), regardless of the capacity hint passed to `new`.
const MIN_CAPACITY: usize = 16;

/// Control flags mirroring `KeyFlags` at keyset granularity (spec §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySetFlags {
    pub sync_needed: bool,
    pub read_only: bool,
}

/// Errors raised by `KeySet` operations.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum KeySetError {
    /// A key without a valid name (e.g. a transient key) was appended.
    #[error("cannot insert an unnamed key into a keyset")]
    InvalidArgument,
}

/// An ordered, name-unique collection of keys.
///
/// Invariants (spec §3, §8): the backing array stays sorted in canonical
/// name order, names are unique, and the cursor (if valid) always refers
/// to a member of the current sequence.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: Vec<Key>,
    flags: KeySetFlags,
    cursor: Option<usize>,
}

impl KeySet {
    /// Create an empty keyset with at least `capacity` backing slots
    /// (minimum 16, per spec §4.2).
    pub fn new(capacity: usize) -> KeySet {
        KeySet {
            keys: Vec::with_capacity(capacity.max(MIN_CAPACITY)),
            flags: KeySetFlags::default(),
            cursor: None,
        }
    }

    /// Build a keyset from an iterator of keys, applying the same
    /// last-wins-on-collision semantics as repeated `append`.
    pub fn from_keys(keys: impl IntoIterator<Item = Key>) -> KeySet {
        let mut ks = KeySet::new(MIN_CAPACITY);
        for k in keys {
            // An iterator of already-named keys cannot fail InvalidArgument
            // unless given a transient key; propagating that as a panic
            // here would be surprising, so silently skip unnamed keys.
            let _ = ks.append(k);
        }
        ks
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.keys.capacity()
    }

    pub fn flags(&self) -> KeySetFlags {
        self.flags
    }

    pub fn clear_sync_needed(&mut self) {
        self.flags.sync_needed = false;
    }

    fn position(&self, name: &CanonicalName) -> Result<usize, usize> {
        self.keys.binary_search_by(|k| k.name().cmp(name))
    }

    /// Insert `key` in canonical order, replacing any existing member with
    /// the same name. Returns the new size.
    ///
    /// A key whose name equals an existing member's by *identity* (the
    /// exact same underlying key, e.g. re-appending a value just fetched
    /// from this same keyset) is a silent no-op, per spec §4.2's failure
    /// modes.
    pub fn append(&mut self, key: Key) -> Result<usize, KeySetError> {
        if !key.is_named() {
            return Err(KeySetError::InvalidArgument);
        }
        let name = key.name();
        match self.position(&name) {
            Ok(idx) => {
                if self.keys[idx].is_same_key(&key) {
                    return Ok(self.keys.len());
                }
                self.keys[idx].decr_use();
                key.incr_use();
                self.keys[idx] = key;
            }
            Err(idx) => {
                key.incr_use();
                self.keys.insert(idx, key);
            }
        }
        self.flags.sync_needed = true;
        self.cursor = None;
        Ok(self.keys.len())
    }

    /// Remove and return the last key in canonical order.
    pub fn pop(&mut self) -> Option<Key> {
        let key = self.keys.pop()?;
        key.decr_use();
        self.flags.sync_needed = true;
        self.cursor = None;
        Some(key)
    }

    /// Look up a key by canonical name.
    pub fn lookup(&self, name: &str) -> Option<Key> {
        let name = CanonicalName::parse(name).ok()?;
        let idx = self.position(&name).ok()?;
        Some(self.keys[idx].clone())
    }

    /// Remove and return all keys at or below `parent`'s name, as a fresh
    /// `KeySet`.
    pub fn cut(&mut self, parent: &Key) -> KeySet {
        let parent_name = parent.name();
        let mut cut = KeySet::new(MIN_CAPACITY);
        let mut remaining = Vec::with_capacity(self.keys.len());

        for key in self.keys.drain(..) {
            if key.name().is_at_or_below(&parent_name) {
                key.decr_use();
                let _ = cut.append(key);
            } else {
                remaining.push(key);
            }
        }
        self.keys = remaining;
        self.flags.sync_needed = true;
        self.cursor = None;
        cut
    }

    /// Merge `other`'s members into `self`, last-wins on name collision.
    pub fn append_keyset(&mut self, other: &KeySet) {
        for key in &other.keys {
            let _ = self.append(key.clone());
        }
    }

    /// Reset the cursor to before the first element.
    pub fn rewind(&mut self) {
        self.cursor = None;
    }

    /// Advance the cursor and return the newly current key, or `None` at
    /// the end of the sequence.
    pub fn next(&mut self) -> Option<Key> {
        let next_idx = match self.cursor {
            None => 0,
            Some(i) => i + 1,
        };
        if next_idx >= self.keys.len() {
            self.cursor = Some(self.keys.len());
            return None;
        }
        self.cursor = Some(next_idx);
        Some(self.keys[next_idx].clone())
    }

    /// The key the cursor currently refers to, if any.
    pub fn current(&self) -> Option<Key> {
        let idx = self.cursor?;
        self.keys.get(idx).cloned()
    }

    /// Iterate all members in canonical order (does not affect the
    /// cursor).
    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }
}
