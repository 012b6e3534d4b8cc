//! Engine-level errors: everything `keytrie-core::KdbError` does not cover
//! because it is specific to plugin composition and mount construction.

use keytrie_core::KdbError;
use thiserror::Error;

/// Errors raised composing backends, opening plugins, and running chains.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// A lower-level keyspace error (invalid name, read-only violation…).
    #[error(transparent)]
    Keyspace(#[from] KdbError),

    /// Allocation failure. Modeled for parity with the error taxonomy;
    /// Rust's allocator aborts the process rather than returning this in
    /// practice, so no code path here constructs it today.
    #[error("out of memory")]
    OutOfMemory,

    /// `Plugin::open` returned an error; the backend containing it is
    /// abandoned.
    #[error("plugin '{plugin}' failed to open: {reason}")]
    PluginOpenFailed { plugin: String, reason: String },

    /// The mount description is missing a required child, or its
    /// back-references are inconsistent (unresolvable reference name,
    /// a reused ordinal with nothing populated yet, etc).
    #[error("backend '{label}' misconfigured: {reason}")]
    BackendMisconfigured { label: String, reason: String },

    /// A plugin's `get`/`set` verb returned failure.
    #[error("plugin '{plugin}' execution failed: {reason}")]
    PluginExecutionFailed { plugin: String, reason: String },

    /// The back-reference token grammar was violated.
    #[error(transparent)]
    RefParse(#[from] crate::refparse::RefParseError),

    /// No constructor is registered for the named plugin kind.
    #[error("no plugin registered under the name '{0}'")]
    UnknownPluginKind(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
