//! Hierarchical key name grammar: parsing, canonicalisation, escaping.
//!
//! A key name begins with a namespace keyword (`user`, `system`, `spec`,
//! `proc`, `dir`, `cascading`), followed by zero or more `/`-separated
//! levels. A literal `/` inside a level is written `\/`; a literal `\` is
//! written `\\`. Empty levels (`//`) collapse to a single separator.
//!
//! This module owns all level-splitting and escaping logic; no other
//! module in the crate re-implements it (see design note in SPEC_FULL.md).

use std::fmt;
use thiserror::Error;

/// The namespace a key name begins with.
///
/// `Cascading` is reserved for transient lookup keys (see spec §3) and is
/// never the namespace of a key actually stored in a `KeySet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Spec,
    Proc,
    Dir,
    User,
    System,
    Cascading,
}

impl Namespace {
    /// Ordering rank used when comparing names within a keyset.
    ///
    /// Per spec §3: `spec < proc < dir < user < system`. `Cascading` is not
    /// part of that total order (it never appears in a stored name); it is
    /// ranked last so the ordering remains total for defensive comparisons.
    fn rank(self) -> u8 {
        match self {
            Namespace::Spec => 0,
            Namespace::Proc => 1,
            Namespace::Dir => 2,
            Namespace::User => 3,
            Namespace::System => 4,
            Namespace::Cascading => 5,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Namespace::Spec => "spec",
            Namespace::Proc => "proc",
            Namespace::Dir => "dir",
            Namespace::User => "user",
            Namespace::System => "system",
            Namespace::Cascading => "cascading",
        }
    }

    fn from_str(s: &str) -> Option<Namespace> {
        match s {
            "spec" => Some(Namespace::Spec),
            "proc" => Some(Namespace::Proc),
            "dir" => Some(Namespace::Dir),
            "user" => Some(Namespace::User),
            "system" => Some(Namespace::System),
            "cascading" => Some(Namespace::Cascading),
            _ => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from parsing or validating a key name.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NameError {
    /// The name is empty where a non-empty name was required.
    #[error("key name cannot be empty")]
    Empty,

    /// The first level is not a recognised namespace keyword.
    #[error("unknown namespace '{0}'")]
    UnknownNamespace(String),

    /// The name ends with an unescaped `\`, which has no following
    /// character to escape.
    #[error("dangling escape character at end of name")]
    DanglingEscape,
}

/// A canonicalised key name: a namespace plus an ordered sequence of
/// unescaped levels.
///
/// Two `CanonicalName`s compare equal iff their namespace and level
/// sequences are equal (spec §3). `Ord` follows `Namespace::rank` then
/// lexicographic comparison of levels, giving the ordering a `KeySet`
/// maintains its backing array in.
#[derive(Debug, Clone, Eq)]
pub struct CanonicalName {
    namespace: Namespace,
    levels: Vec<String>,
}

impl CanonicalName {
    /// Parse and canonicalise a key name string.
    ///
    /// Collapses empty levels (`//` -> single separator) and unescapes
    /// `\/` and `\\` within each level.
    pub fn parse(name: &str) -> Result<CanonicalName, NameError> {
        if name.is_empty() {
            return Err(NameError::Empty);
        }

        let raw_levels = split_unescaped(name)?;
        let mut iter = raw_levels.into_iter().filter(|l| !l.is_empty());

        let first = iter.next().ok_or(NameError::Empty)?;
        let namespace =
            Namespace::from_str(&first).ok_or_else(|| NameError::UnknownNamespace(first))?;

        let levels: Vec<String> = iter.collect();

        Ok(CanonicalName { namespace, levels })
    }

    /// Parse the empty-string name, used to address the trie's root slot.
    pub fn root() -> CanonicalName {
        // The root slot has no namespace of its own; `System` is used as an
        // arbitrary placeholder that is never compared against (root is
        // addressed positionally by `Trie`, not through `CanonicalName`
        // equality).
        CanonicalName {
            namespace: Namespace::System,
            levels: Vec::new(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// The base name: the last level, or `None` if the name has no levels
    /// below its namespace.
    pub fn base_name(&self) -> Option<&str> {
        self.levels.last().map(|s| s.as_str())
    }

    /// The parent name: all levels but the last.
    ///
    /// Returns `None` if this name has no levels (the namespace root
    /// itself has no parent).
    pub fn parent(&self) -> Option<CanonicalName> {
        if self.levels.is_empty() {
            return None;
        }
        Some(CanonicalName {
            namespace: self.namespace,
            levels: self.levels[..self.levels.len() - 1].to_vec(),
        })
    }

    /// Whether `self` is equal to `other` or a descendant of it
    /// (i.e. `other` is a prefix of `self`'s level sequence, in the same
    /// namespace).
    pub fn is_at_or_below(&self, other: &CanonicalName) -> bool {
        self.namespace == other.namespace
            && self.levels.len() >= other.levels.len()
            && self.levels[..other.levels.len()] == other.levels[..]
    }

    /// Append a level, returning a new name one level deeper.
    pub fn with_level(&self, level: &str) -> CanonicalName {
        let mut levels = self.levels.clone();
        levels.push(level.to_string());
        CanonicalName {
            namespace: self.namespace,
            levels,
        }
    }

    /// Render back to the canonical string form.
    ///
    /// For a name that was already in canonical form, `render(parse(s)?)
    /// == s` (spec §8 round-trip property). Names containing collapsible
    /// empty levels normalise to their canonical rendering rather than
    /// reproducing the original bytes.
    pub fn render(&self) -> String {
        let mut out = String::from(self.namespace.as_str());
        for level in &self.levels {
            out.push('/');
            out.push_str(&escape_level(level));
        }
        out
    }
}

impl PartialEq for CanonicalName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.levels == other.levels
    }
}

impl std::hash::Hash for CanonicalName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.levels.hash(state);
    }
}

impl Ord for CanonicalName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.namespace
            .rank()
            .cmp(&other.namespace.rank())
            .then_with(|| self.levels.cmp(&other.levels))
    }
}

impl PartialOrd for CanonicalName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Split a raw name string into levels, unescaping `\/` and `\\` within
/// each level, without yet filtering empty levels (the caller decides
/// whether to collapse them).
fn split_unescaped(name: &str) -> Result<Vec<String>, NameError> {
    let mut levels = Vec::new();
    let mut current = String::new();
    let mut chars = name.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ ('/' | '\\')) => current.push(next),
                Some(other) => {
                    // Not a recognised escape sequence; keep both
                    // characters literally.
                    current.push('\\');
                    current.push(other);
                }
                None => return Err(NameError::DanglingEscape),
            },
            '/' => {
                levels.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }
    levels.push(current);

    Ok(levels)
}

/// Escape `/` and `\` within a single level for canonical rendering.
fn escape_level(level: &str) -> String {
    let mut out = String::with_capacity(level.len());
    for c in level.chars() {
        if c == '/' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
