//! The mount loader: turns a keyset of mount descriptions into a
//! populated trie of backends (spec §4.6).
//!
//! Kept purely transformational, per design note §9: it takes a keyset
//! slice and produces a `Backend`; it never reads configuration from
//! files or the environment.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use keytrie_core::{CanonicalName, Key, KeySet, Limits, Value};
use keytrie_routing::Trie;

use crate::backend::{Backend, Mountpoint, PluginHandle};
use crate::error::EngineError;
use crate::refparse::{self, PluginRef};
use crate::registry::PluginRegistry;

const MOUNTPOINTS_ROOT: &str = "system/elektra/mountpoints";
const CHAINS: [(&str, ChainKind); 3] = [
    ("getplugins", ChainKind::Read),
    ("setplugins", ChainKind::Write),
    ("errorplugins", ChainKind::Error),
];

#[derive(Clone, Copy)]
enum ChainKind {
    Read,
    Write,
    Error,
}

/// All keys in `slice` strictly below `root`, as (relative levels, value)
/// pairs. The root key itself (an empty relative path) is excluded.
fn collect_subtree(slice: &KeySet, root: &CanonicalName) -> Vec<(Vec<String>, Option<Value>)> {
    let mut out = Vec::new();
    for key in slice.iter() {
        let name = key.name();
        if !name.is_at_or_below(root) {
            continue;
        }
        let relative = &name.levels()[root.levels().len()..];
        if relative.is_empty() {
            continue;
        }
        out.push((relative.to_vec(), key.value()));
    }
    out
}

/// Immediate children of `root` in `slice` (relative depth exactly one).
fn immediate_children(slice: &KeySet, root: &CanonicalName) -> Vec<Key> {
    slice
        .iter()
        .filter(|key| {
            let name = key.name();
            name.is_at_or_below(root) && name.levels().len() == root.levels().len() + 1
        })
        .cloned()
        .collect()
}

fn leaf_name(base: &str, levels: &[String]) -> CanonicalName {
    let mut name = CanonicalName::parse(base).expect("'system'/'user' always parse");
    for level in levels {
        name = name.with_level(level);
    }
    name
}

fn build_merged_config(
    backend_entries: &[(Vec<String>, Option<Value>)],
    token_entries: &[(Vec<String>, Option<Value>)],
) -> Result<KeySet, EngineError> {
    let mut ks = KeySet::new(0);
    for (levels, value) in backend_entries {
        append_leaf(&mut ks, "system", levels, value)?;
    }
    for (levels, value) in token_entries {
        append_leaf(&mut ks, "user", levels, value)?;
    }
    Ok(ks)
}

fn append_leaf(
    ks: &mut KeySet,
    base: &str,
    levels: &[String],
    value: &Option<Value>,
) -> Result<(), EngineError> {
    let name = leaf_name(base, levels);
    let key = Key::new(&name.render()).map_err(keytrie_core::KdbError::from)?;
    if let Some(v) = value {
        match v {
            Value::Text(t) => {
                key.set_value(t.clone()).map_err(keytrie_core::KdbError::from)?;
            }
            Value::Binary(b) => key.set_binary(b.clone()),
        }
    }
    ks.append(key).map_err(keytrie_core::KdbError::from)?;
    Ok(())
}

/// Construct one backend from its mount description slice.
///
/// `slice` must contain every key at or below
/// `system/elektra/mountpoints/<label>`.
pub fn open_backend(
    label: &str,
    slice: &KeySet,
    registry: &PluginRegistry,
    limits: &Limits,
) -> Result<Backend, EngineError> {
    let mountpoints_root = CanonicalName::parse(MOUNTPOINTS_ROOT).expect("constant parses");
    let label_root = mountpoints_root.with_level(label);

    let mountpoint_key_name = label_root.with_level("mountpoint").render();
    let mountpoint_value = slice
        .lookup(&mountpoint_key_name)
        .and_then(|k| k.value())
        .and_then(|v| v.as_text().map(str::to_string))
        .ok_or_else(|| EngineError::BackendMisconfigured {
            label: label.to_string(),
            reason: "missing required 'mountpoint' child".to_string(),
        })?;

    let mountpoint_name = CanonicalName::parse(&mountpoint_value).map_err(|e| {
        EngineError::BackendMisconfigured {
            label: label.to_string(),
            reason: format!("mountpoint name '{mountpoint_value}' invalid: {e}"),
        }
    })?;

    let backend_config = collect_subtree(slice, &label_root.with_level("config"));

    let mut backend = Backend::new(
        Mountpoint {
            name: Some(mountpoint_name),
            label: label.to_string(),
        },
        limits.max_plugins_per_chain + 1,
    );

    let mut named: HashMap<String, (String, PluginHandle)> = HashMap::new();
    let mut by_position: HashMap<u32, PluginHandle> = HashMap::new();

    for (chain_key, kind) in CHAINS {
        let chain_root = label_root.with_level(chain_key);
        let mut tokens = immediate_children(slice, &chain_root);
        tokens.sort_by(|a, b| a.name().cmp(&b.name()));

        for token_key in tokens {
            let token = token_key
                .base_name()
                .expect("immediate child always has a base name")
                .to_string();
            let parsed = refparse::parse(&token)?;
            let position = parsed.position();
            limits.check_chain_position(position)?;

            let handle = match &parsed {
                PluginRef::Anonymous { plugin, .. } => {
                    open_one(plugin, registry, &backend_config, &[])?
                }
                PluginRef::Named {
                    reference, plugin, ..
                } => {
                    if let Some((bound_plugin, existing)) = named.get(reference) {
                        if bound_plugin != plugin {
                            return Err(EngineError::BackendMisconfigured {
                                label: label.to_string(),
                                reason: format!(
                                    "conflicting back-reference '{reference}': bound to \
                                     plugin '{bound_plugin}' but token '{token}' names \
                                     '{plugin}'"
                                ),
                            });
                        }
                        existing.clone()
                    } else {
                        let token_root = chain_root.with_level(&token).with_level("config");
                        let token_config = collect_subtree(slice, &token_root);
                        let h = open_one(plugin, registry, &backend_config, &token_config)?;
                        named.insert(reference.clone(), (plugin.clone(), h.clone()));
                        h
                    }
                }
                PluginRef::LabelOnly { .. } => {
                    by_position.get(&position).cloned().ok_or_else(|| {
                        EngineError::BackendMisconfigured {
                            label: label.to_string(),
                            reason: format!(
                                "label-only reference at position {position} has no \
                                 previously populated chain slot to reuse"
                            ),
                        }
                    })?
                }
            };

            by_position.entry(position).or_insert_with(|| handle.clone());

            match kind {
                ChainKind::Read => backend.set_read(position as usize, handle),
                ChainKind::Write => backend.set_write(position as usize, handle),
                ChainKind::Error => backend.set_error(position as usize, handle),
            }
        }
    }

    Ok(backend)
}

fn open_one(
    plugin_name: &str,
    registry: &PluginRegistry,
    backend_config: &[(Vec<String>, Option<Value>)],
    token_config: &[(Vec<String>, Option<Value>)],
) -> Result<PluginHandle, EngineError> {
    let mut plugin = registry.construct(plugin_name)?;
    let merged = build_merged_config(backend_config, token_config)?;
    plugin
        .open(merged)
        .map_err(|e| EngineError::PluginOpenFailed {
            plugin: plugin_name.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Rc::new(RefCell::new(*plugin)))
}

/// The single top-level label present under `system/elektra/mountpoints/`
/// in `slice`, for callers (namely `keytrie-api::Database::mount`) that
/// build one backend at a time rather than loading a whole configuration
/// via [`load_mounts`].
pub fn mountpoint_label(slice: &KeySet) -> Result<String, EngineError> {
    let mountpoints_root = CanonicalName::parse(MOUNTPOINTS_ROOT).expect("constant parses");
    slice
        .iter()
        .find_map(|key| {
            let name = key.name();
            if name.is_at_or_below(&mountpoints_root) && name.levels().len() > mountpoints_root.levels().len() {
                Some(name.levels()[mountpoints_root.levels().len()].clone())
            } else {
                None
            }
        })
        .ok_or_else(|| EngineError::BackendMisconfigured {
            label: String::new(),
            reason: format!(
                "mount description contains no key under '{MOUNTPOINTS_ROOT}'"
            ),
        })
}

/// A backend with no plugins, mounted at the empty-string root slot
/// (spec §4.5 `open_default`).
pub fn open_default() -> Backend {
    Backend::new(
        Mountpoint {
            name: None,
            label: "default".to_string(),
        },
        0,
    )
}

/// Enumerate the top-level labels under `system/elektra/mountpoints/` in
/// `config`, construct a backend per label, and insert each into a fresh
/// trie under its mountpoint name. Errors building one backend are
/// collected rather than aborting the rest (spec §4.6).
pub fn load_mounts(
    config: &KeySet,
    registry: &PluginRegistry,
    limits: &Limits,
) -> (Trie<Rc<Backend>>, Vec<(String, EngineError)>) {
    let mountpoints_root = CanonicalName::parse(MOUNTPOINTS_ROOT).expect("constant parses");
    let mut labels: Vec<String> = Vec::new();
    for key in config.iter() {
        let name = key.name();
        if name.is_at_or_below(&mountpoints_root) && name.levels().len() > mountpoints_root.levels().len() {
            let label = name.levels()[mountpoints_root.levels().len()].clone();
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
    }

    let mut trie = Trie::new();
    trie.set_default(Rc::new(open_default()));
    let mut errors = Vec::new();

    for label in labels {
        let label_root = mountpoints_root.with_level(&label);
        let mut slice = KeySet::new(0);
        for key in config.iter() {
            if key.name().is_at_or_below(&label_root) {
                let _ = slice.append(key.clone());
            }
        }

        match open_backend(&label, &slice, registry, limits) {
            Ok(backend) => {
                let name = backend.mountpoint.name.clone();
                let handle = Rc::new(backend);
                match name {
                    Some(n) => trie.insert_canonical(n, handle),
                    None => trie.set_default(handle),
                }
            }
            Err(e) => errors.push((label, e)),
        }
    }

    (trie, errors)
}
