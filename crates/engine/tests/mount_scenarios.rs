//! Cross-module end-to-end scenarios from spec §8: building backends from
//! mount descriptions and resolving them through a trie.
//!
//! The mount descriptions below mirror `set_simple`/`set_pluginconf`/
//! `set_two`/`set_backref` in `original_source/tests/test_backend.c`,
//! expressed as `KeySet` builders instead of the original's `ksNew(...)`
//! call chains.

use std::rc::Rc;

use keytrie_core::{Key, KeySet, Limits};
use keytrie_engine::{load_mounts, open_backend, open_default, Backend, PluginRegistry};
use keytrie_routing::Trie;

fn key(name: &str, value: Option<&str>) -> Key {
    let k = Key::new(name).unwrap();
    if let Some(v) = value {
        k.set_value(v).unwrap();
    }
    k
}

/// A backend description at `system/elektra/mountpoints/<label>` with one
/// `default` plugin at position 1 in each of its three chains, and the
/// plugin-config/backend-config subtrees the scenarios assert on.
fn backend_description(label: &str, mountpoint: &str) -> KeySet {
    let root = format!("system/elektra/mountpoints/{label}");
    let mut ks = KeySet::new(0);
    for k in [
        key(&format!("{root}/config/anything"), Some("backend")),
        key(&format!("{root}/config/more"), None),
        key(&format!("{root}/config/more/config"), None),
        key(&format!("{root}/config/more/config/below"), None),
        key(&format!("{root}/config/path"), None),
        key(&format!("{root}/getplugins/#1default"), Some("default")),
        key(
            &format!("{root}/getplugins/#1default/config/anything"),
            Some("plugin"),
        ),
        key(&format!("{root}/getplugins/#1default/config/more"), None),
        key(
            &format!("{root}/getplugins/#1default/config/more/config"),
            None,
        ),
        key(
            &format!("{root}/getplugins/#1default/config/more/config/below"),
            None,
        ),
        key(&format!("{root}/getplugins/#1default/config/path"), None),
        key(&format!("{root}/mountpoint"), Some(mountpoint)),
        key(&format!("{root}/setplugins/#1default"), Some("default")),
        key(&format!("{root}/errorplugins/#1default"), Some("default")),
    ] {
        ks.append(k).unwrap();
    }
    ks
}

fn expected_merged_config_names() -> Vec<&'static str> {
    vec![
        "system/anything",
        "system/more",
        "system/more/config",
        "system/more/config/below",
        "system/path",
        "user/anything",
        "user/more",
        "user/more/config",
        "user/more/config/below",
        "user/path",
    ]
}

/// Scenario 1: simple backend.
#[test]
fn simple_backend() {
    let registry = PluginRegistry::with_default();
    let limits = Limits::default();
    let slice = backend_description("simple", "user/tests/backend/simple");

    let backend = open_backend("simple", &slice, &registry, &limits).unwrap();

    assert!(backend.read_plugin(0).is_none());
    assert!(backend.read_plugin(1).is_some());
    assert!(backend.read_plugin(2).is_none());

    assert_eq!(
        backend.mountpoint.name.as_ref().unwrap().render(),
        "user/tests/backend/simple"
    );
    assert_eq!(backend.mountpoint.label, "simple");

    let plugin = backend.read_plugin(1).unwrap();
    let mut names: Vec<String> = plugin
        .borrow()
        .config()
        .iter()
        .map(|k| k.name().render())
        .collect();
    names.sort();
    let mut expected: Vec<String> = expected_merged_config_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    expected.sort();
    assert_eq!(names, expected);

    assert_eq!(
        plugin
            .borrow()
            .config()
            .lookup("system/anything")
            .unwrap()
            .value()
            .unwrap()
            .as_text(),
        Some("backend")
    );
    assert_eq!(
        plugin
            .borrow()
            .config()
            .lookup("user/anything")
            .unwrap()
            .value()
            .unwrap()
            .as_text(),
        Some("plugin")
    );
}

/// Scenario 2: two backends via trie.
#[test]
fn two_backends_via_trie() {
    let registry = PluginRegistry::with_default();
    let limits = Limits::default();

    let mut config = KeySet::new(0);
    config.append_keyset(&backend_description("simple", "user/tests/backend/simple"));
    config.append_keyset(&backend_description("two", "user/tests/backend/two"));

    let (trie, errors): (Trie<Rc<Backend>>, _) = load_mounts(&config, &registry, &limits);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let deep = keytrie_core::CanonicalName::parse(
        "user/tests/backend/simple/somewhere/deep/below",
    )
    .unwrap();
    let resolved = trie.lookup(&deep).unwrap();
    assert_eq!(resolved.mountpoint.label, "simple");

    let exact = keytrie_core::CanonicalName::parse("user/tests/backend/two").unwrap();
    let resolved = trie.lookup(&exact).unwrap();
    assert_eq!(resolved.mountpoint.label, "two");
}

/// Scenario 3: back-reference — one read plugin entry
/// `#1#default#default#` and one write plugin entry `#1#default`
/// (label-only reuse) resolve to the same plugin instance with use-count 2.
#[test]
fn back_reference_shares_one_plugin_instance() {
    let registry = PluginRegistry::with_default();
    let limits = Limits::default();

    let root = "system/elektra/mountpoints/backref";
    let mut slice = KeySet::new(0);
    for k in [
        key(&format!("{root}/config/anything"), Some("backend")),
        key(
            &format!("{root}/getplugins/#1#default#default#"),
            Some("default"),
        ),
        key(
            &format!("{root}/getplugins/#1#default#default#/config/anything"),
            Some("plugin"),
        ),
        key(&format!("{root}/mountpoint"), Some("user/tests/backend/backref")),
        key(
            &format!("{root}/setplugins/#1#default"),
            Some("reference to other default"),
        ),
    ] {
        slice.append(k).unwrap();
    }

    let backend = open_backend("backref", &slice, &registry, &limits).unwrap();

    let read = backend.read_plugin(1).unwrap();
    let write = backend.write_plugin(1).unwrap();
    assert!(Rc::ptr_eq(read, write), "read and write slot 1 must share one plugin instance");
    assert_eq!(Backend::use_count(read), 2);
}

/// A named back-reference used with two different plugin names is a
/// misconfiguration, not a silent reuse of whichever plugin opened first
/// (spec §4.5/§7's "conflicting back-references" case).
#[test]
fn conflicting_named_back_reference_is_rejected() {
    let registry = PluginRegistry::with_default();
    let limits = Limits::default();

    let root = "system/elektra/mountpoints/conflict";
    let mut slice = KeySet::new(0);
    for k in [
        key(&format!("{root}/mountpoint"), Some("user/tests/backend/conflict")),
        key(
            &format!("{root}/getplugins/#1#shared#default#"),
            Some("default"),
        ),
        key(
            &format!("{root}/setplugins/#2#shared#other#"),
            Some("other"),
        ),
    ] {
        slice.append(k).unwrap();
    }

    let err = open_backend("conflict", &slice, &registry, &limits).unwrap_err();
    match err {
        keytrie_engine::EngineError::BackendMisconfigured { label, reason } => {
            assert_eq!(label, "conflict");
            assert!(reason.contains("conflicting back-reference"), "{reason}");
        }
        other => panic!("expected BackendMisconfigured, got {other:?}"),
    }
}

/// Scenario 4: default backend.
#[test]
fn default_backend_has_empty_mountpoint_name() {
    let backend = open_default();
    assert!(backend.mountpoint.name.is_none());
    assert_eq!(backend.mountpoint.label, "default");
}

/// A back-reference position beyond `max_plugins_per_chain` is rejected
/// rather than silently growing the chain past its configured capacity.
#[test]
fn chain_position_beyond_limit_is_rejected() {
    let registry = PluginRegistry::with_default();
    let limits = Limits::with_small_limits(); // max_plugins_per_chain == 4

    let root = "system/elektra/mountpoints/toolong";
    let mut slice = KeySet::new(0);
    for k in [
        key(&format!("{root}/mountpoint"), Some("user/tests/backend/toolong")),
        key(&format!("{root}/getplugins/#5default"), Some("default")),
    ] {
        slice.append(k).unwrap();
    }

    let err = open_backend("toolong", &slice, &registry, &limits).unwrap_err();
    assert!(matches!(err, keytrie_engine::EngineError::Keyspace(_)));
}

/// A mount description missing its `mountpoint` child is reported as a
/// per-label error, not a fatal failure for the whole load (spec §4.6:
/// "errors during construction of one backend do not prevent construction
/// of others").
#[test]
fn misconfigured_backend_is_collected_not_fatal() {
    let registry = PluginRegistry::with_default();
    let limits = Limits::default();

    let mut config = KeySet::new(0);
    // "broken" has no mountpoint child.
    config
        .append(key(
            "system/elektra/mountpoints/broken/getplugins/#1default",
            Some("default"),
        ))
        .unwrap();
    config.append_keyset(&backend_description("simple", "user/tests/backend/simple"));

    let (trie, errors) = load_mounts(&config, &registry, &limits);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "broken");

    let exact = keytrie_core::CanonicalName::parse("user/tests/backend/simple").unwrap();
    assert!(trie.lookup(&exact).is_some());
}
