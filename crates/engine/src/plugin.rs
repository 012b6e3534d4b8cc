//! The `Plugin` trait and its bundled reference implementation.

use keytrie_core::{Key, KeySet};

use crate::error::EngineError;

/// Static metadata a plugin reports about itself (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMeta {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub licence: String,
    /// Advisory capability tags the loader may consult, opaque otherwise.
    pub provides: Vec<String>,
    pub needs: Vec<String>,
}

impl PluginMeta {
    pub fn new(name: impl Into<String>) -> PluginMeta {
        PluginMeta {
            name: name.into(),
            version: String::new(),
            description: String::new(),
            author: String::new(),
            licence: String::new(),
            provides: Vec::new(),
            needs: Vec::new(),
        }
    }
}

/// An opaque unit with open/close/read/write verbs and private
/// configuration (spec §4.4, §6).
///
/// Trait-object composition, the pattern the source repo uses for
/// `Storage`/`SnapshotView` (`core/src/traits.rs`) and
/// `PrimitiveStorageExt` (`storage/src/primitive_ext.rs`): a fixed small
/// set of verbs invoked through `Box`/`Rc<RefCell<dyn Plugin>>`, with the
/// concrete plugin kind resolved at mount time by name via
/// [`crate::registry::PluginRegistry`].
pub trait Plugin {
    fn meta(&self) -> &PluginMeta;

    /// The plugin's merged configuration, as computed by the loader
    /// (`system/…` backend-wide, `user/…` plugin-specific overrides).
    fn config(&self) -> &KeySet;

    /// Receive the merged configuration and perform any setup. Called
    /// exactly once, before the plugin is placed in any chain.
    fn open(&mut self, config: KeySet) -> Result<(), EngineError>;

    /// Release any resources. Called exactly once, when the plugin's
    /// use-count (shared chain slots) drops to zero.
    fn close(&mut self) -> Result<(), EngineError>;

    /// Populate or augment `returned` with keys at or below `parent`.
    /// Returns the number of keys produced.
    fn get(&mut self, returned: &mut KeySet, parent: &Key) -> Result<i64, EngineError>;

    /// Persist the keys in `returned` under `parent`. Returns the number
    /// written.
    fn set(&mut self, returned: &KeySet, parent: &Key) -> Result<i64, EngineError>;
}

/// An in-memory pass-through store: `set` replaces its view of the keys
/// at or below the write's parent, `get` returns whatever was last set
/// there. Bundled so the end-to-end scenarios in spec §8 are runnable
/// without an external plugin crate, mirroring the original C test
/// suite's reliance on a bundled `default` plugin
/// (`original_source/tests/test_backend.c`).
pub struct DefaultPlugin {
    meta: PluginMeta,
    config: KeySet,
    store: KeySet,
}

impl DefaultPlugin {
    pub fn new() -> DefaultPlugin {
        DefaultPlugin {
            meta: PluginMeta {
                description: "in-memory pass-through store".to_string(),
                ..PluginMeta::new("default")
            },
            config: KeySet::new(0),
            store: KeySet::new(0),
        }
    }
}

impl Default for DefaultPlugin {
    fn default() -> DefaultPlugin {
        DefaultPlugin::new()
    }
}

impl Plugin for DefaultPlugin {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }

    fn config(&self) -> &KeySet {
        &self.config
    }

    fn open(&mut self, config: KeySet) -> Result<(), EngineError> {
        self.config = config;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn get(&mut self, returned: &mut KeySet, parent: &Key) -> Result<i64, EngineError> {
        let parent_name = parent.name();
        let mut count = 0i64;
        for key in self.store.iter() {
            if key.name().is_at_or_below(&parent_name) {
                let _ = returned.append(key.clone());
                count += 1;
            }
        }
        Ok(count)
    }

    fn set(&mut self, returned: &KeySet, parent: &Key) -> Result<i64, EngineError> {
        let parent_name = parent.name();
        let parent_handle = Key::new(&parent_name.render())
            .expect("a rendered CanonicalName always reparses");
        drop(self.store.cut(&parent_handle));
        let mut count = 0i64;
        for key in returned.iter() {
            if key.name().is_at_or_below(&parent_name) {
                let _ = self.store.append(key.clone());
                count += 1;
            }
        }
        Ok(count)
    }
}
