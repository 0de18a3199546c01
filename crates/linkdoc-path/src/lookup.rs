//! Walking a plain `serde_json::Value` tree along a [`Path`].

use std::borrow::Cow;

use serde_json::Value;

use crate::Path;

/// Parse `key` as a sequence index.
///
/// Only canonical non-negative integers qualify: no sign, no leading zeros.
///
/// ```
/// use linkdoc_path::parse_index;
///
/// assert_eq!(parse_index("0"), Some(0));
/// assert_eq!(parse_index("17"), Some(17));
/// assert_eq!(parse_index("-1"), None);
/// assert_eq!(parse_index("01"), None);
/// assert_eq!(parse_index("x"), None);
/// ```
pub fn parse_index(key: &str) -> Option<usize> {
    let bytes = key.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    key.parse().ok()
}

impl Path {
    /// Look up the value at this path below `root`.
    ///
    /// This is a query: a missing key, an out-of-range or malformed index,
    /// or a step into a scalar all answer `None`. Indexing into a string
    /// yields the character at that position as a new string value.
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<Cow<'a, Value>> {
        let mut current = root;
        let mut keys = self.iter().peekable();
        while let Some(key) = keys.next() {
            match current {
                Value::Object(map) => current = map.get(key)?,
                Value::Array(items) => current = items.get(parse_index(key)?)?,
                Value::String(s) => {
                    let ch = s.chars().nth(parse_index(key)?)?;
                    // A character has no children.
                    if keys.peek().is_some() {
                        return None;
                    }
                    return Some(Cow::Owned(Value::String(ch.to_string())));
                }
                _ => return None,
            }
        }
        Some(Cow::Borrowed(current))
    }
}
