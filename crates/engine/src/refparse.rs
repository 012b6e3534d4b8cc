//! Parser for the back-reference token grammar used in mount descriptions
//! (spec §4.5): `#<N><plugin>` (anonymous), `#<N>#<ref>#<plugin>#<cfg>#`
//! (named), and `#<N>#<ref>` (label-only reuse of an already-open plugin
//! at the same chain ordinal).
//!
//! A small hand parser rather than scattering `find('#')` logic through
//! the loader (design note §9).

use thiserror::Error;

/// A parsed back-reference token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginRef {
    /// `#<N><plugin>`: open a fresh instance of `plugin` for this slot.
    Anonymous { position: u32, plugin: String },
    /// `#<N>#<ref>#<plugin>#<cfg>#`: the first occurrence of `reference`
    /// opens `plugin`; later occurrences elsewhere reuse it.
    Named {
        position: u32,
        reference: String,
        plugin: String,
        cfg: String,
    },
    /// `#<N>#<ref>`: reuse the plugin instance already bound to the same
    /// ordinal position in a chain populated earlier in this backend.
    LabelOnly { position: u32, reference: String },
}

impl PluginRef {
    pub fn position(&self) -> u32 {
        match self {
            PluginRef::Anonymous { position, .. } => *position,
            PluginRef::Named { position, .. } => *position,
            PluginRef::LabelOnly { position, .. } => *position,
        }
    }
}

/// Errors raised parsing a back-reference token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefParseError {
    #[error("back-reference token '{0}' does not start with '#'")]
    MissingHash(String),

    #[error("back-reference token '{0}' has no position digits after '#'")]
    MissingPosition(String),

    #[error("back-reference token '{0}' has nothing after its position")]
    EmptyTail(String),
}

/// Parse a chain-slot key's base name (e.g. `#1default`,
/// `#1#default#default#`, `#1#default`) into a [`PluginRef`].
pub fn parse(token: &str) -> Result<PluginRef, RefParseError> {
    let rest = token
        .strip_prefix('#')
        .ok_or_else(|| RefParseError::MissingHash(token.to_string()))?;

    let digit_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digit_end == 0 {
        return Err(RefParseError::MissingPosition(token.to_string()));
    }
    let position: u32 = rest[..digit_end]
        .parse()
        .map_err(|_| RefParseError::MissingPosition(token.to_string()))?;
    let tail = &rest[digit_end..];

    if tail.is_empty() {
        return Err(RefParseError::EmptyTail(token.to_string()));
    }

    if !tail.starts_with('#') {
        return Ok(PluginRef::Anonymous {
            position,
            plugin: tail.to_string(),
        });
    }

    let body = &tail[1..];
    if let Some(inner) = body.strip_suffix('#') {
        let mut fields = inner.splitn(3, '#');
        let reference = fields.next().unwrap_or("").to_string();
        let plugin = fields.next().unwrap_or("").to_string();
        let cfg = fields.next().unwrap_or("").to_string();
        Ok(PluginRef::Named {
            position,
            reference,
            plugin,
            cfg,
        })
    } else {
        Ok(PluginRef::LabelOnly {
            position,
            reference: body.to_string(),
        })
    }
}
