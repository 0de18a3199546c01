//! Dotted key paths.
//!
//! A [`Path`] is an immutable, ordered sequence of keys addressing a value
//! inside a tree of mappings and sequences. Keys are plain strings; a key
//! that parses as a non-negative integer addresses a sequence element.
//!
//! # Example
//!
//! ```
//! use linkdoc_path::Path;
//! use serde_json::json;
//!
//! let path = Path::parse("users.0.name");
//! assert_eq!(path.keys(), &["users", "0", "name"]);
//! assert_eq!(path.to_string(), "users.0.name");
//!
//! let doc = json!({"users": [{"name": "ada"}]});
//! assert_eq!(path.lookup(&doc).as_deref(), Some(&json!("ada")));
//! ```

use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::str::FromStr;

mod lookup;

pub use lookup::parse_index;

/// Separator between keys in a path literal.
pub const SEPARATOR: char = '.';

/// An ordered sequence of keys.
///
/// Paths are value objects: every operation that "changes" a path returns a
/// new one. Empty segments are dropped on construction, so `"a..b."` and
/// `"a.b"` are the same path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    keys: Vec<String>,
}

impl Path {
    /// The empty path, addressing the root itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted literal.
    ///
    /// ```
    /// use linkdoc_path::Path;
    ///
    /// assert_eq!(Path::parse("a..b.").keys(), &["a", "b"]);
    /// assert!(Path::parse("").is_empty());
    /// ```
    pub fn parse(literal: &str) -> Self {
        let mut path = Self::root();
        path.extend_literal(literal);
        path
    }

    /// Concatenate any mix of literals, key lists and paths, in order.
    ///
    /// ```
    /// use linkdoc_path::Path;
    ///
    /// let base = Path::parse("a.b");
    /// let joined = Path::concat([base, Path::from(vec!["c.d", "e"])]);
    /// assert_eq!(joined.to_string(), "a.b.c.d.e");
    /// ```
    pub fn concat<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Path>,
    {
        let mut keys = Vec::new();
        for part in parts {
            keys.extend(part.into().keys);
        }
        Self { keys }
    }

    fn extend_literal(&mut self, literal: &str) {
        self.keys.extend(
            literal
                .split(SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
        );
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.keys.iter()
    }

    /// Return the keys in `range` as a new path. Bounds past the end are
    /// clamped, an inverted range yields the empty path.
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Path {
        let len = self.keys.len();
        let begin = match range.start_bound() {
            Bound::Included(&b) => b,
            Bound::Excluded(&b) => b.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .min(len);
        if begin >= end {
            return Path::root();
        }
        Path {
            keys: self.keys[begin..end].to_vec(),
        }
    }

    /// Last key, `None` for the root path.
    pub fn leaf(&self) -> Option<&str> {
        self.keys.last().map(String::as_str)
    }

    /// All keys but the last. The parent of the root is the root.
    pub fn parent(&self) -> Path {
        self.slice(..self.keys.len().saturating_sub(1))
    }

    /// Append `key` (split on the separator like any other literal).
    pub fn child(&self, key: impl Into<Path>) -> Path {
        let mut keys = self.keys.clone();
        keys.extend(key.into().keys);
        Path { keys }
    }

    /// Structural equality after coercing `other` through the same
    /// constructor rules.
    pub fn equals(&self, other: impl Into<Path>) -> bool {
        *self == other.into()
    }

    /// True iff `other` is a prefix of this path (a path is a sub-path of
    /// itself and of the root).
    ///
    /// ```
    /// use linkdoc_path::Path;
    ///
    /// let deep = Path::parse("a.b.c");
    /// assert!(deep.is_sub_path_of(&Path::parse("a.b")));
    /// assert!(deep.is_sub_path_of(&deep));
    /// assert!(!Path::parse("a").is_sub_path_of(&deep));
    /// ```
    pub fn is_sub_path_of(&self, other: &Path) -> bool {
        other.keys.len() <= self.keys.len() && self.keys[..other.keys.len()] == other.keys[..]
    }

    /// Strip `prefix` from the front of this path, if it is one.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        if self.is_sub_path_of(prefix) {
            Some(self.slice(prefix.len()..))
        } else {
            None
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(key)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Path::parse(s))
    }
}

// ── Conversions ───────────────────────────────────────────────────────────

impl From<&str> for Path {
    fn from(literal: &str) -> Self {
        Path::parse(literal)
    }
}

impl From<String> for Path {
    fn from(literal: String) -> Self {
        Path::parse(&literal)
    }
}

impl From<&String> for Path {
    fn from(literal: &String) -> Self {
        Path::parse(literal)
    }
}

impl From<usize> for Path {
    fn from(index: usize) -> Self {
        Path {
            keys: vec![index.to_string()],
        }
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

impl<S: AsRef<str>> From<Vec<S>> for Path {
    fn from(segments: Vec<S>) -> Self {
        let mut path = Path::root();
        for segment in &segments {
            path.extend_literal(segment.as_ref());
        }
        path
    }
}

impl<S: AsRef<str>> From<&[S]> for Path {
    fn from(segments: &[S]) -> Self {
        let mut path = Path::root();
        for segment in segments {
            path.extend_literal(segment.as_ref());
        }
        path
    }
}

impl<S: AsRef<str>, const N: usize> From<[S; N]> for Path {
    fn from(segments: [S; N]) -> Self {
        Path::from(&segments[..])
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

impl IntoIterator for Path {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.into_iter()
    }
}
