//! Unified error type for keyspace operations.
//!
//! One variant per taxonomy entry from spec §7. Each variant carries the
//! structured context the spec calls for, mirroring the teacher's
//! `StrataError`/`KeyError`/`LimitError` shape (`core/src/error.rs`,
//! `core/src/key.rs`, `core/src/limits.rs`). See SPEC_FULL.md §7 for the
//! rationale behind returning `Result<T, KdbError>` directly rather than
//! threading a caller-owned error key through every call, as the original
//! C API does.

use thiserror::Error;

use crate::key::KeyError;
use crate::keyset::KeySetError;
use crate::name::NameError;

/// The unified error type for keyspace operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KdbError {
    /// A string is not a valid key name.
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// A required input was null, out of range, or structurally malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Mutation attempted on a key whose use-count is nonzero or whose
    /// read-only flag is set.
    #[error("read-only or shared: {0}")]
    ReadOnlyOrShared(String),

    /// Requested key or mountpoint does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<KeyError> for KdbError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::InvalidName(n) => KdbError::InvalidName(n),
            KeyError::ReadOnlyOrShared { uses } => {
                KdbError::ReadOnlyOrShared(format!("use-count is {uses}"))
            }
            KeyError::InvalidValue(v) => KdbError::InvalidArgument(v.to_string()),
        }
    }
}

impl From<KeySetError> for KdbError {
    fn from(e: KeySetError) -> Self {
        match e {
            KeySetError::InvalidArgument => {
                KdbError::InvalidArgument("unnamed key cannot be inserted".to_string())
            }
        }
    }
}

impl KdbError {
    /// Stable wire-facing reason code, the hook an eventual `kdb` CLI or
    /// RPC layer would consume (this core has no wire protocol of its own).
    pub fn reason_code(&self) -> &'static str {
        match self {
            KdbError::InvalidName(_) => "invalid_name",
            KdbError::InvalidArgument(_) => "invalid_argument",
            KdbError::ReadOnlyOrShared(_) => "read_only_or_shared",
            KdbError::NotFound(_) => "not_found",
        }
    }
}

/// Result alias for keyspace operations.
pub type Result<T> = std::result::Result<T, KdbError>;
