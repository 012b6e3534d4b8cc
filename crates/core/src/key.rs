//! `Key`: a named value with metadata and a use-count across keysets.
//!
//! A `Key` is a cheap, clonable handle (`Rc<RefCell<KeyInner>>`) so the
//! same logical key can be held by multiple `KeySet`s at once, as the
//! source's pointer-shared `Key*` does — cloning a `Key` shares identity,
//! it does not deep-copy the key's state. `KeySet::append`/removal
//! maintain an explicit `uses` counter on the shared inner state,
//! independent of `Rc`'s own strong count (a caller may hold a `Key`
//! clone that is not a member of any keyset).

use std::cell::RefCell;
use std::rc::Rc;

use crate::keyset::KeySet;
use crate::name::{CanonicalName, NameError};
use crate::value::{Value, ValueError};

/// Control flags observable to the persistence layer (spec §3).
///
/// `meta_sync_needed` and `read_only` are specified so implementations
/// preserve the bit positions but are not acted on by the core itself —
/// see SPEC_FULL.md's Open Question on these flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyFlags {
    pub sync_needed: bool,
    pub meta_sync_needed: bool,
    pub read_only: bool,
}

/// Errors raised mutating a `Key`.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum KeyError {
    /// The name does not satisfy the name grammar.
    #[error("invalid key name: {0}")]
    InvalidName(#[from] NameError),

    /// A rename was attempted while the key's use-count is nonzero, or
    /// while its read-only flag is set.
    #[error("key cannot be renamed: in use by {uses} keyset(s), or read-only")]
    ReadOnlyOrShared { uses: usize },

    /// The value assignment was rejected (e.g. embedded NUL in text mode).
    #[error("invalid value: {0}")]
    InvalidValue(#[from] ValueError),
}

struct KeyInner {
    /// `None` only for a transient, nameless key (see `Key::transient`).
    name: Option<CanonicalName>,
    value: Option<Value>,
    metadata: KeySet,
    flags: KeyFlags,
    uses: usize,
}

/// A named value with metadata and a use-count.
///
/// Invariant: every key has a syntactically valid name (checked at
/// construction and on every `set_name`). The name is immutable while the
/// key's use-count is nonzero (spec §3).
#[derive(Clone)]
pub struct Key(Rc<RefCell<KeyInner>>);

impl Key {
    /// Create a new key with the given name and no value.
    pub fn new(name: &str) -> Result<Key, KeyError> {
        let name = CanonicalName::parse(name)?;
        Ok(Key(Rc::new(RefCell::new(KeyInner {
            name: Some(name),
            value: None,
            metadata: KeySet::new(0),
            flags: KeyFlags::default(),
            uses: 0,
        }))))
    }

    /// Create a transient, nameless key.
    ///
    /// Valid only as a temporary container: inserting it into a `KeySet`
    /// fails with `InvalidArgument` (spec §4.1), since `KeySet` storage
    /// requires a syntactically valid name to sort and look up by.
    pub fn transient() -> Key {
        Key(Rc::new(RefCell::new(KeyInner {
            name: None,
            value: None,
            metadata: KeySet::new(0),
            flags: KeyFlags::default(),
            uses: 0,
        })))
    }

    /// Whether `self` and `other` are the same underlying key (pointer
    /// identity), as opposed to merely comparing equal by name.
    pub fn is_same_key(&self, other: &Key) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this key has a name at all (false only for a transient key).
    pub fn is_named(&self) -> bool {
        self.0.borrow().name.is_some()
    }

    /// The key's canonical name.
    ///
    /// # Panics
    ///
    /// Panics if called on a transient key (`Key::transient()`); callers
    /// that may hold a transient key should check `is_named()` first, or
    /// rely on `KeySet::append` rejecting it with `InvalidArgument` before
    /// `name()` would ever be called on it.
    pub fn name(&self) -> CanonicalName {
        self.0
            .borrow()
            .name
            .clone()
            .expect("transient key has no name")
    }

    pub fn base_name(&self) -> Option<String> {
        self.0
            .borrow()
            .name
            .as_ref()
            .and_then(|n| n.base_name().map(str::to_string))
    }

    pub fn parent_name(&self) -> Option<CanonicalName> {
        self.0.borrow().name.as_ref().and_then(|n| n.parent())
    }

    /// Re-canonicalise and set this key's name.
    ///
    /// Fails with `ReadOnlyOrShared` if the key's use-count is nonzero or
    /// its read-only flag is set; fails with `InvalidName` on a grammar
    /// violation. Sets `sync_needed` on success.
    pub fn set_name(&self, name: &str) -> Result<(), KeyError> {
        let canonical = CanonicalName::parse(name)?;
        let mut inner = self.0.borrow_mut();
        if inner.uses > 0 || inner.flags.read_only {
            return Err(KeyError::ReadOnlyOrShared { uses: inner.uses });
        }
        inner.name = Some(canonical);
        inner.flags.sync_needed = true;
        Ok(())
    }

    pub fn value(&self) -> Option<Value> {
        self.0.borrow().value.clone()
    }

    /// Stored value size, or 0 if the key has no value.
    pub fn size(&self) -> usize {
        self.0.borrow().value.as_ref().map(Value::size).unwrap_or(0)
    }

    /// Set a text value, rejecting embedded NUL bytes. Sets `sync_needed`.
    pub fn set_value(&self, text: impl Into<String>) -> Result<(), KeyError> {
        let value = Value::text(text)?;
        let mut inner = self.0.borrow_mut();
        inner.value = Some(value);
        inner.flags.sync_needed = true;
        Ok(())
    }

    /// Set a binary value. Sets `sync_needed`.
    pub fn set_binary(&self, bytes: impl Into<Vec<u8>>) {
        let mut inner = self.0.borrow_mut();
        inner.value = Some(Value::binary(bytes));
        inner.flags.sync_needed = true;
    }

    /// Access the key's metadata keyset (itself a keyset of annotation
    /// keys, spec §3).
    pub fn with_metadata<R>(&self, f: impl FnOnce(&KeySet) -> R) -> R {
        f(&self.0.borrow().metadata)
    }

    pub fn with_metadata_mut<R>(&self, f: impl FnOnce(&mut KeySet) -> R) -> R {
        f(&mut self.0.borrow_mut().metadata)
    }

    pub fn flags(&self) -> KeyFlags {
        self.0.borrow().flags
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.0.borrow_mut().flags.read_only = read_only;
    }

    pub fn clear_sync_needed(&self) {
        self.0.borrow_mut().flags.sync_needed = false;
    }

    /// Current use-count: the number of keysets holding this key.
    pub fn use_count(&self) -> usize {
        self.0.borrow().uses
    }

    pub(crate) fn incr_use(&self) {
        self.0.borrow_mut().uses += 1;
    }

    pub(crate) fn decr_use(&self) {
        let mut inner = self.0.borrow_mut();
        debug_assert!(inner.uses > 0, "use-count underflow");
        inner.uses = inner.uses.saturating_sub(1);
    }
}
