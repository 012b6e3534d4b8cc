//! Maps a plugin name to a constructor, so the mount loader can open a
//! fresh instance of any registered kind by name alone.
//!
//! Analogous to the source repo's `storage::PrimitiveRegistry`, which
//! maps a primitive type ID to its implementation
//! (`storage/src/registry.rs`); here the lookup key is the plugin's
//! name string and the registry holds constructors rather than shared
//! instances, since each anonymous reference needs its own plugin.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::plugin::{DefaultPlugin, Plugin};

/// A name → constructor map for plugin kinds.
pub struct PluginRegistry {
    constructors: HashMap<String, Box<dyn Fn() -> Box<dyn Plugin>>>,
}

impl PluginRegistry {
    pub fn new() -> PluginRegistry {
        PluginRegistry {
            constructors: HashMap::new(),
        }
    }

    /// A registry pre-populated with the bundled `default` plugin.
    pub fn with_default() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry.register("default", || Box::new(DefaultPlugin::new()));
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        ctor: impl Fn() -> Box<dyn Plugin> + 'static,
    ) {
        self.constructors.insert(name.into(), Box::new(ctor));
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Construct a fresh instance of the plugin kind named `name`.
    pub fn construct(&self, name: &str) -> Result<Box<dyn Plugin>, EngineError> {
        let ctor = self
            .constructors
            .get(name)
            .ok_or_else(|| EngineError::UnknownPluginKind(name.to_string()))?;
        Ok(ctor())
    }
}

impl Default for PluginRegistry {
    fn default() -> PluginRegistry {
        PluginRegistry::with_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_default_plugin() {
        let registry = PluginRegistry::with_default();
        assert!(registry.is_known("default"));
        assert!(registry.construct("default").is_ok());
    }

    #[test]
    fn unknown_plugin_name_errors() {
        let registry = PluginRegistry::new();
        assert!(matches!(
            registry.construct("nope"),
            Err(EngineError::UnknownPluginKind(_))
        ));
    }
}
