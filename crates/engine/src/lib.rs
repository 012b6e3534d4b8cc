//! Plugin composition, backend construction, and the mount loader.
//!
//! - [`plugin`]: the `Plugin` trait and the bundled `DefaultPlugin`.
//! - [`registry`]: name → constructor map the loader uses to instantiate
//!   plugins by kind.
//! - [`refparse`]: the back-reference token grammar
//!   (`#<N><plugin>` / `#<N>#<ref>#<plugin>#<cfg>#` / `#<N>#<ref>`).
//! - [`backend`]: `Backend`, a mountpoint plus its read/write/error chains.
//! - [`loader`]: turns a mount-description keyset into a populated trie of
//!   backends.
//! - [`error`]: `EngineError`, covering everything `keytrie-core::KdbError`
//!   does not (plugin open/execution failures, misconfigured backends).

pub mod backend;
pub mod error;
pub mod loader;
pub mod plugin;
pub mod refparse;
pub mod registry;

pub use backend::{Backend, Mountpoint, PluginHandle};
pub use error::{EngineError, Result};
pub use loader::{load_mounts, mountpoint_label, open_backend, open_default};
pub use plugin::{DefaultPlugin, Plugin, PluginMeta};
pub use refparse::{parse as parse_ref, PluginRef, RefParseError};
pub use registry::PluginRegistry;
