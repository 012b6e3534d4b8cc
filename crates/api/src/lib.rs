//! The `Database` handle: the single public surface external callers (and,
//! eventually, the out-of-scope `kdb` CLI) use to read, write, and mount
//! configuration.
//!
//! Wraps the pieces built by the other three crates into the external
//! interface from spec §6: `open`, `close`, `get`, `set`, `mount`.

use std::rc::Rc;

use keytrie_core::{Key, KeySet, Limits};
use keytrie_engine::{self as engine, Backend, EngineError, PluginRegistry};
use keytrie_routing::{split, Trie};

pub use keytrie_core::{CanonicalName, KdbError, Namespace, Value};
pub use keytrie_engine::{DefaultPlugin, Plugin, PluginMeta};

/// Result alias for `Database` operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// The top-level handle over a mounted keyspace.
///
/// Single-threaded cooperative per handle (spec §5): no operation on a
/// `Database` may be interleaved with another on the *same* handle. Two
/// `Database`s opened on disjoint mount configurations may be used from
/// different threads without sharing mutable state; `Database` itself
/// carries no internal locking because the core assumes one caller drives
/// one handle at a time.
pub struct Database {
    trie: Trie<Rc<Backend>>,
    registry: PluginRegistry,
    limits: Limits,
}

impl Database {
    /// Open a handle with no mounts beyond the default backend (spec
    /// §4.6's `open_default`, reachable via the trie's empty-string slot).
    pub fn open(registry: PluginRegistry) -> Database {
        Database::open_with_limits(registry, Limits::default())
    }

    /// As [`Database::open`], with explicit size/shape limits rather than
    /// [`Limits::default`].
    pub fn open_with_limits(registry: PluginRegistry, limits: Limits) -> Database {
        let mut trie = Trie::new();
        trie.set_default(Rc::new(engine::open_default()));
        tracing::info!("opened database: no mounts, default backend only");
        Database {
            trie,
            registry,
            limits,
        }
    }

    /// Run the mount loader (spec §4.6) over one backend's description and
    /// insert the resulting backend into the trie under its mountpoint
    /// name — or replace the default backend, if the description's
    /// `mountpoint` value is the empty string.
    ///
    /// `description` must contain every key at or below
    /// `system/elektra/mountpoints/<label>` for exactly one `<label>`
    /// (spec §4.5's mount-description schema); the label itself is read
    /// back out of the keys rather than passed separately, since the
    /// description keyset already names it.
    pub fn mount(&mut self, description: KeySet) -> Result<()> {
        let label = engine::mountpoint_label(&description)?;
        let backend = engine::open_backend(&label, &description, &self.registry, &self.limits)?;
        tracing::debug!(
            label = %label,
            mountpoint = %backend.mountpoint.render_name(),
            "mounted backend"
        );
        match backend.mountpoint.name.clone() {
            Some(name) => self.trie.insert_canonical(name, Rc::new(backend)),
            None => self.trie.set_default(Rc::new(backend)),
        }
        Ok(())
    }

    /// Resolve `parent` to its covering backend via the trie and invoke
    /// its read chain (spec §2 "data flow on a read").
    pub fn get(&self, parent: &Key) -> Result<KeySet> {
        let backend = self
            .trie
            .lookup(&parent.name())
            .expect("a database always has at least the default backend");
        let mut returned = KeySet::new(0);
        backend.get(&mut returned, parent)?;
        Ok(returned)
    }

    /// Partition `keyset` by destination backend (spec §4.7's `Split`) and
    /// invoke each partition's write chain. Writes are *not* transactional
    /// across mountpoints (spec §7): every partition is attempted even if
    /// an earlier one failed, and the first error encountered (if any) is
    /// returned after all partitions have been tried.
    ///
    /// Partitions with no key at or below `parent` are skipped as no-ops
    /// (spec §4.7's `below_parent` flag). Keys in a partition that writes
    /// successfully have their `sync_needed` flag cleared (spec §3: "
    /// cleared by the backend after a successful write").
    ///
    /// Every key is checked against this handle's `Limits` before any
    /// partition is written: a name or value over size rejects the whole
    /// write up front, since a `Key` itself carries no `Limits` of its own
    /// (the same key may be written through another `Database` with
    /// different limits).
    pub fn set(&self, keyset: KeySet, parent: &Key) -> Result<usize> {
        for k in keyset.iter() {
            self.limits.check_name_bytes(&k.name().render())?;
            self.limits.check_value_bytes(k.size())?;
        }

        let parts = split(&self.trie, keyset, parent).into_parts();
        let mut total = 0usize;
        let mut first_err = None;

        for part in parts {
            if !part.below_parent {
                continue;
            }
            match part.handle.set(&part.keys, parent) {
                Ok(n) => {
                    total += n.max(0) as usize;
                    for key in part.keys.iter() {
                        key.clear_sync_needed();
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        mountpoint = ?part.mountpoint.as_ref().map(|m| m.render()),
                        "write partition failed; other partitions are not rolled back"
                    );
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }

    /// Close every mounted backend (and the default backend), deduplicating
    /// shared plugin instances by the same rule `Backend::close` applies
    /// within one backend (spec §5: close exactly when the last reference
    /// releases).
    ///
    /// A backend whose `Rc` still has external holders (e.g. a clone taken
    /// via a future `Database::backend_for` accessor) is left un-closed and
    /// logged rather than forced, since forcing it would invoke `close` on
    /// a plugin another holder may still be using.
    pub fn close(mut self) -> Result<()> {
        let (mounts, default) = self.trie.take_all();
        let mut first_err = None;

        for handle in mounts.into_iter().chain(default) {
            match Rc::try_unwrap(handle) {
                Ok(backend) => {
                    if let Err(e) = backend.close() {
                        first_err.get_or_insert(e);
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        "backend still referenced elsewhere at close time; leaving it open"
                    );
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keytrie_core::KeySet;

    fn simple_description() -> KeySet {
        let mut ks = KeySet::new(0);
        let root = "system/elektra/mountpoints/simple";
        for (name, value) in [
            (format!("{root}/mountpoint"), Some("user/tests/backend/simple")),
            (format!("{root}/config/anything"), Some("backend")),
            (format!("{root}/config/more/config/below"), None),
            (format!("{root}/getplugins/#1default"), Some("default")),
            (
                format!("{root}/getplugins/#1default/config/anything"),
                Some("plugin"),
            ),
            (format!("{root}/setplugins/#1default"), Some("default")),
        ] {
            let key = Key::new(&name).unwrap();
            if let Some(v) = value {
                key.set_value(v).unwrap();
            }
            ks.append(key).unwrap();
        }
        ks
    }

    #[test]
    fn open_has_only_default_backend() {
        let db = Database::open(PluginRegistry::with_default());
        let root = Key::new("user/anything").unwrap();
        let returned = db.get(&root).unwrap();
        assert_eq!(returned.len(), 0);
    }

    #[test]
    fn mount_then_roundtrip_write_and_read() {
        let mut db = Database::open(PluginRegistry::with_default());
        db.mount(simple_description()).unwrap();

        let parent = Key::new("user/tests/backend/simple").unwrap();
        let mut to_write = KeySet::new(0);
        let k = Key::new("user/tests/backend/simple/a").unwrap();
        k.set_value("1").unwrap();
        to_write.append(k).unwrap();

        let written = db.set(to_write, &parent).unwrap();
        assert_eq!(written, 1);

        let read_back = db.get(&parent).unwrap();
        assert_eq!(
            read_back
                .lookup("user/tests/backend/simple/a")
                .unwrap()
                .value()
                .unwrap()
                .as_text(),
            Some("1")
        );
    }

    #[test]
    fn set_clears_sync_needed_on_success() {
        let mut db = Database::open(PluginRegistry::with_default());
        db.mount(simple_description()).unwrap();

        let parent = Key::new("user/tests/backend/simple").unwrap();
        let k = Key::new("user/tests/backend/simple/a").unwrap();
        k.set_value("1").unwrap();
        assert!(k.flags().sync_needed);

        let mut to_write = KeySet::new(0);
        to_write.append(k.clone()).unwrap();
        db.set(to_write, &parent).unwrap();

        assert!(!k.flags().sync_needed);
    }

    #[test]
    fn close_succeeds_with_no_external_references() {
        let mut db = Database::open(PluginRegistry::with_default());
        db.mount(simple_description()).unwrap();
        db.close().unwrap();
    }

    #[test]
    fn set_rejects_value_over_configured_limit() {
        let mut db = Database::open_with_limits(
            PluginRegistry::with_default(),
            keytrie_core::Limits::with_small_limits(),
        );
        db.mount(simple_description()).unwrap();

        let parent = Key::new("user/tests/backend/simple").unwrap();
        let k = Key::new("user/tests/backend/simple/a").unwrap();
        k.set_value("x".repeat(300)).unwrap();
        let mut to_write = KeySet::new(0);
        to_write.append(k).unwrap();

        assert!(db.set(to_write, &parent).is_err());
    }

    #[test]
    fn unmounted_write_is_a_no_op_under_default() {
        let db = Database::open(PluginRegistry::with_default());
        let parent = Key::new("user/untouched").unwrap();
        let mut ks = KeySet::new(0);
        ks.append(Key::new("user/untouched/a").unwrap()).unwrap();
        let written = db.set(ks, &parent).unwrap();
        assert_eq!(written, 0);
    }
}
