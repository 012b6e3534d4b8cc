//! Keyspace data model for keytrie.
//!
//! This crate defines the foundational types shared by the whole
//! workspace:
//! - [`name`]: the hierarchical key name grammar (parsing, canonicalisation,
//!   escaping).
//! - [`key`]: `Key`, a named value with metadata and a use-count.
//! - [`keyset`]: `KeySet`, an ordered, name-unique collection of keys.
//! - [`value`]: `Value`, the text/binary value representation.
//! - [`limits`]: configurable size limits.
//! - [`error`]: the unified `KdbError` type.
//!
//! This crate has no knowledge of plugins, backends, or mounting — those
//! live in `keytrie-routing` and `keytrie-engine`.

pub mod error;
pub mod key;
pub mod keyset;
pub mod limits;
pub mod name;
pub mod value;

pub use error::{KdbError, Result};
pub use key::{Key, KeyError, KeyFlags};
pub use keyset::{KeySet, KeySetError, KeySetFlags};
pub use limits::Limits;
pub use name::{CanonicalName, NameError, Namespace};
pub use value::{Value, ValueError};
