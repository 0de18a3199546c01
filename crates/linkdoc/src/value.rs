//! Value shapes.
//!
//! | type         | role                                                        |
//! |--------------|-------------------------------------------------------------|
//! | [`Value`]    | what a container slot holds: a primitive or a node handle   |
//! | [`Input`]    | what a caller assigns; plain maps and lists are auto-wrapped |
//! | [`Snapshot`] | a fully unwrapped plain copy, safe to serialize              |

use std::fmt;

use indexmap::IndexMap;
use linkdoc_path::{parse_index, Path};
use serde_json::Number;

use crate::change::ContainerKind;
use crate::error::ObservableError;

// ── Keys and handles ──────────────────────────────────────────────────────

/// Position of a value inside its container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Dict slot.
    Name(String),
    /// List slot.
    Index(usize),
}

impl Key {
    /// The key as a list index; names qualify when they are canonical
    /// non-negative integers.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(name) => parse_index(name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&Key> for Path {
    fn from(key: &Key) -> Self {
        Path::parse(&key.to_string())
    }
}

/// Stable handle of a container node inside a [`crate::Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Value ─────────────────────────────────────────────────────────────────

/// Contents of a single container slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Node(NodeId),
}

impl Value {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// ── Input ─────────────────────────────────────────────────────────────────

/// A value on its way into a container.
///
/// `Map` and `List` are wrapped into fresh dict and list nodes when
/// assigned; `Node` links an existing container (it is shared, not copied);
/// `Link` resolves to the cached document for that URL.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Map(IndexMap<String, Input>),
    List(Vec<Input>),
    Node(NodeId),
    Link(String),
}

impl Input {
    /// A number input; NaN and infinities are rejected.
    pub fn number(value: f64) -> Result<Input, ObservableError> {
        Number::from_f64(value)
            .map(Input::Number)
            .ok_or_else(|| ObservableError::Type(format!("{value} is not a finite number")))
    }

    pub fn map() -> Input {
        Input::Map(IndexMap::new())
    }

    pub fn list() -> Input {
        Input::List(Vec::new())
    }

    /// Container kind a plain map or list would be wrapped into.
    pub fn plain_kind(&self) -> Option<ContainerKind> {
        match self {
            Input::Map(_) => Some(ContainerKind::Dict),
            Input::List(_) => Some(ContainerKind::List),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Input {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Input::Null,
            serde_json::Value::Bool(b) => Input::Bool(b),
            serde_json::Value::Number(n) => Input::Number(n),
            serde_json::Value::String(s) => Input::String(s),
            serde_json::Value::Array(items) => Input::List(items.into_iter().map(Input::from).collect()),
            serde_json::Value::Object(map) => {
                Input::Map(map.into_iter().map(|(k, v)| (k, Input::from(v))).collect())
            }
        }
    }
}

impl From<Snapshot> for Input {
    fn from(snapshot: Snapshot) -> Self {
        match snapshot {
            Snapshot::Null => Input::Null,
            Snapshot::Bool(b) => Input::Bool(b),
            Snapshot::Number(n) => Input::Number(n),
            Snapshot::String(s) => Input::String(s),
            Snapshot::Map(map) => Input::Map(map.into_iter().map(|(k, v)| (k, Input::from(v))).collect()),
            Snapshot::List(items) => Input::List(items.into_iter().map(Input::from).collect()),
            Snapshot::Link(url) => Input::Link(url),
        }
    }
}

impl From<&Snapshot> for Input {
    fn from(snapshot: &Snapshot) -> Self {
        Input::from(snapshot.clone())
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Input::Null,
            Value::Bool(b) => Input::Bool(b),
            Value::Number(n) => Input::Number(n),
            Value::String(s) => Input::String(s),
            Value::Node(id) => Input::Node(id),
        }
    }
}

impl From<NodeId> for Input {
    fn from(id: NodeId) -> Self {
        Input::Node(id)
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input::String(s.to_string())
    }
}

impl From<String> for Input {
    fn from(s: String) -> Self {
        Input::String(s)
    }
}

impl From<bool> for Input {
    fn from(b: bool) -> Self {
        Input::Bool(b)
    }
}

impl From<i64> for Input {
    fn from(n: i64) -> Self {
        Input::Number(n.into())
    }
}

impl From<i32> for Input {
    fn from(n: i32) -> Self {
        Input::Number(n.into())
    }
}

impl From<u64> for Input {
    fn from(n: u64) -> Self {
        Input::Number(n.into())
    }
}

impl<T: Into<Input>> From<Option<T>> for Input {
    fn from(value: Option<T>) -> Self {
        value.map_or(Input::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Input>> FromIterator<(K, V)> for Input {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Input::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────

/// Plain, non-observable deep copy of a value.
///
/// Linked documents are not inlined: they appear as [`Snapshot::Link`]
/// carrying the document URL. Map equality ignores key order.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Map(IndexMap<String, Snapshot>),
    List(Vec<Snapshot>),
    Link(String),
}

impl Snapshot {
    pub fn kind(&self) -> Option<ContainerKind> {
        match self {
            Snapshot::Map(_) => Some(ContainerKind::Dict),
            Snapshot::List(_) => Some(ContainerKind::List),
            _ => None,
        }
    }

    /// Look up the value at `path`, answering `None` for any missing or
    /// invalid step. Indexing a string yields that character.
    pub fn lookup(&self, path: &Path) -> Option<Snapshot> {
        let mut current = self;
        let mut keys = path.iter().peekable();
        while let Some(key) = keys.next() {
            current = match current {
                Snapshot::Map(map) => map.get(key.as_str())?,
                Snapshot::List(items) => items.get(parse_index(key)?)?,
                Snapshot::String(s) => {
                    let ch = s.chars().nth(parse_index(key)?)?;
                    if keys.peek().is_some() {
                        return None;
                    }
                    return Some(Snapshot::String(ch.to_string()));
                }
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// Convert into a `serde_json::Value`; links become their URL string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Snapshot::Null => serde_json::Value::Null,
            Snapshot::Bool(b) => serde_json::Value::Bool(*b),
            Snapshot::Number(n) => serde_json::Value::Number(n.clone()),
            Snapshot::String(s) | Snapshot::Link(s) => serde_json::Value::String(s.clone()),
            Snapshot::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Snapshot::List(items) => serde_json::Value::Array(items.iter().map(Snapshot::to_json).collect()),
        }
    }
}

impl From<serde_json::Value> for Snapshot {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Snapshot::Null,
            serde_json::Value::Bool(b) => Snapshot::Bool(b),
            serde_json::Value::Number(n) => Snapshot::Number(n),
            serde_json::Value::String(s) => Snapshot::String(s),
            serde_json::Value::Array(items) => Snapshot::List(items.into_iter().map(Snapshot::from).collect()),
            serde_json::Value::Object(map) => {
                Snapshot::Map(map.into_iter().map(|(k, v)| (k, Snapshot::from(v))).collect())
            }
        }
    }
}
