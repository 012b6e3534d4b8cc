//! `Backend`: a mountpoint plus its read/write/error plugin chains.

use std::cell::RefCell;
use std::rc::Rc;

use keytrie_core::{CanonicalName, Key, KeySet};

use crate::error::EngineError;
use crate::plugin::Plugin;

/// A shared, interior-mutable handle to a plugin instance. `Rc` is used
/// rather than a hand-rolled counter because the sharing this type needs
/// — multiple chain slots referencing one instance, closed when the last
/// reference drops — is exactly what `Rc`'s strong count already tracks;
/// see `Backend::use_count` below.
pub type PluginHandle = Rc<RefCell<Box<dyn Plugin>>>;

/// The mountpoint a backend serves: a name (the root of the subtree it
/// owns) and a label (the mount's identifying value).
///
/// This is deliberately not a `keytrie_core::Key`: the default backend's
/// mountpoint name is the empty string, which `Key`'s name grammar
/// rejects (a `Key`'s name must name an actual namespace). The mountpoint
/// is bookkeeping the engine owns, never a member of a stored `KeySet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mountpoint {
    pub name: Option<CanonicalName>,
    pub label: String,
}

impl Mountpoint {
    pub fn render_name(&self) -> String {
        self.name.as_ref().map(|n| n.render()).unwrap_or_default()
    }
}

/// A composition of plugins serving reads and writes for a subtree
/// (spec §4.5). Chains are indexed directly by back-reference position;
/// index 0 is reserved and always empty (positions in the mount
/// description grammar start at 1).
pub struct Backend {
    pub mountpoint: Mountpoint,
    read: Vec<Option<PluginHandle>>,
    write: Vec<Option<PluginHandle>>,
    error: Vec<Option<PluginHandle>>,
}

impl Backend {
    pub(crate) fn new(mountpoint: Mountpoint, chain_capacity: usize) -> Backend {
        Backend {
            mountpoint,
            read: vec![None; chain_capacity],
            write: vec![None; chain_capacity],
            error: vec![None; chain_capacity],
        }
    }

    pub(crate) fn set_read(&mut self, position: usize, handle: PluginHandle) {
        self.ensure_capacity(position);
        self.read[position] = Some(handle);
    }

    pub(crate) fn set_write(&mut self, position: usize, handle: PluginHandle) {
        self.ensure_capacity(position);
        self.write[position] = Some(handle);
    }

    pub(crate) fn set_error(&mut self, position: usize, handle: PluginHandle) {
        self.ensure_capacity(position);
        self.error[position] = Some(handle);
    }

    fn ensure_capacity(&mut self, position: usize) {
        let needed = position + 1;
        if self.read.len() < needed {
            self.read.resize(needed, None);
            self.write.resize(needed, None);
            self.error.resize(needed, None);
        }
    }

    pub fn read_plugin(&self, position: usize) -> Option<&PluginHandle> {
        self.read.get(position).and_then(|p| p.as_ref())
    }

    pub fn write_plugin(&self, position: usize) -> Option<&PluginHandle> {
        self.write.get(position).and_then(|p| p.as_ref())
    }

    pub fn error_plugin(&self, position: usize) -> Option<&PluginHandle> {
        self.error.get(position).and_then(|p| p.as_ref())
    }

    /// Current use-count (number of chain slots, across all backends,
    /// referencing a plugin), read directly off `Rc`'s strong count.
    pub fn use_count(handle: &PluginHandle) -> usize {
        Rc::strong_count(handle)
    }

    /// Invoke the read chain in ascending position, short-circuiting on
    /// the first failure and then running the error chain.
    pub fn get(&self, returned: &mut KeySet, parent: &Key) -> Result<i64, EngineError> {
        let mut total = 0i64;
        for slot in self.read.iter() {
            let Some(handle) = slot else { continue };
            match handle.borrow_mut().get(returned, parent) {
                Ok(n) => total += n,
                Err(e) => {
                    Self::annotate_failure(parent, &e);
                    self.run_error_chain(parent);
                    return Err(e);
                }
            }
        }
        Ok(total)
    }

    /// Invoke the write chain in ascending position, short-circuiting on
    /// the first failure and then running the error chain.
    pub fn set(&self, returned: &KeySet, parent: &Key) -> Result<i64, EngineError> {
        let mut total = 0i64;
        for slot in self.write.iter() {
            let Some(handle) = slot else { continue };
            match handle.borrow_mut().set(returned, parent) {
                Ok(n) => total += n,
                Err(e) => {
                    Self::annotate_failure(parent, &e);
                    self.run_error_chain(parent);
                    return Err(e);
                }
            }
        }
        Ok(total)
    }

    /// Record the failing chain's error on `parent`'s metadata keyset
    /// (spec §7: "the callee may append diagnostic metadata... on it").
    /// This design returns `Result<T, EngineError>` rather than threading a
    /// caller-owned error key (see SPEC_FULL.md §7), so `parent` — the key
    /// every plugin in the chain was already invoked with — is where that
    /// diagnostic naturally lives instead.
    fn annotate_failure(parent: &Key, error: &EngineError) {
        let Ok(note) = Key::new("system/elektra/error/reason") else {
            return;
        };
        if note.set_value(error.to_string()).is_err() {
            return;
        }
        parent.with_metadata_mut(|meta| {
            let _ = meta.append(note);
        });
    }

    fn run_error_chain(&self, parent: &Key) {
        let mut sink = KeySet::new(0);
        for slot in self.error.iter() {
            let Some(handle) = slot else { continue };
            // The error chain's own failures are not further escalated —
            // there is no chain left to report them to (spec §7).
            let _ = handle.borrow_mut().get(&mut sink, parent);
        }
    }

    /// Close every distinct plugin this backend references exactly once,
    /// deduplicating across the read/write/error chains by pointer
    /// identity (spec §5: "the plugin's close verb is invoked exactly
    /// when the count reaches zero"). A backend is the sole long-lived
    /// owner of its chain slots' `Rc`s once mount construction finishes,
    /// so deduplicating within this one backend is sufficient — there is
    /// no other holder left to keep the plugin alive past this call.
    pub fn close(self) -> Result<(), EngineError> {
        let all: Vec<PluginHandle> = self
            .read
            .into_iter()
            .chain(self.write.into_iter())
            .chain(self.error.into_iter())
            .flatten()
            .collect();

        let mut closed: Vec<PluginHandle> = Vec::new();
        let mut first_err = None;

        for handle in all {
            if closed.iter().any(|h| Rc::ptr_eq(h, &handle)) {
                continue;
            }
            if let Err(e) = handle.borrow_mut().close() {
                first_err.get_or_insert(e);
            }
            closed.push(handle);
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
