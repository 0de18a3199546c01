//! OML: YAML with three application tags.
//!
//! | tag     | node     | decodes to                     |
//! |---------|----------|--------------------------------|
//! | `!link` | scalar   | [`Input::Link`] (document URL)  |
//! | `!dict` | mapping  | [`Input::Map`]                  |
//! | `!list` | sequence | [`Input::List`]                 |
//!
//! Untagged mappings and sequences decode to the same plain inputs, so the
//! container tags only make the intent explicit. Encoding writes links as
//! `!link <url>` and containers as plain YAML.

use serde_json::Number;
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value as Yaml};
use thiserror::Error;

use crate::change::Change;
use crate::error::DocumentError;
use crate::graph::Graph;
use crate::value::{Input, NodeId, Snapshot};

pub const LINK_TAG: &str = "!link";
pub const DICT_TAG: &str = "!dict";
pub const LIST_TAG: &str = "!list";

#[derive(Debug, Error)]
pub enum OmlError {
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown tag {0}")]
    UnknownTag(String),
    #[error("tag {tag} expects a {expected}")]
    TagShape { tag: String, expected: &'static str },
    #[error("mapping keys must be scalars, found {0}")]
    InvalidKey(String),
    #[error("number {0} is not representable")]
    InvalidNumber(String),
}

/// Decode OML text into an input tree ready to be assigned.
pub fn decode(text: &str) -> Result<Input, OmlError> {
    let yaml: Yaml = serde_yaml::from_str(text)?;
    from_yaml(yaml)
}

/// Encode a snapshot as OML text.
pub fn encode(snapshot: &Snapshot) -> Result<String, OmlError> {
    Ok(serde_yaml::to_string(&to_yaml(snapshot))?)
}

fn tag_name(tag: &Tag) -> String {
    let name = tag.to_string();
    format!("!{}", name.trim_start_matches('!'))
}

fn from_yaml(yaml: Yaml) -> Result<Input, OmlError> {
    Ok(match yaml {
        Yaml::Null => Input::Null,
        Yaml::Bool(b) => Input::Bool(b),
        Yaml::Number(n) => Input::Number(number_from_yaml(&n)?),
        Yaml::String(s) => Input::String(s),
        Yaml::Sequence(items) => Input::List(items.into_iter().map(from_yaml).collect::<Result<_, _>>()?),
        Yaml::Mapping(map) => from_mapping(map)?,
        Yaml::Tagged(tagged) => from_tagged(*tagged)?,
    })
}

fn from_tagged(tagged: TaggedValue) -> Result<Input, OmlError> {
    let tag = tag_name(&tagged.tag);
    let name = tag.clone();
    match (name.as_str(), tagged.value) {
        (LINK_TAG, Yaml::String(url)) => Ok(Input::Link(url)),
        (LINK_TAG, _) => Err(OmlError::TagShape { tag, expected: "url string" }),
        (DICT_TAG, Yaml::Mapping(map)) => from_mapping(map),
        (DICT_TAG, _) => Err(OmlError::TagShape { tag, expected: "mapping" }),
        (LIST_TAG, Yaml::Sequence(items)) => {
            Ok(Input::List(items.into_iter().map(from_yaml).collect::<Result<_, _>>()?))
        }
        (LIST_TAG, _) => Err(OmlError::TagShape { tag, expected: "sequence" }),
        _ => Err(OmlError::UnknownTag(tag)),
    }
}

fn from_mapping(map: Mapping) -> Result<Input, OmlError> {
    let mut entries = indexmap::IndexMap::with_capacity(map.len());
    for (key, value) in map {
        let key = match key {
            Yaml::String(s) => s,
            Yaml::Number(n) => n.to_string(),
            Yaml::Bool(b) => b.to_string(),
            other => return Err(OmlError::InvalidKey(format!("{other:?}"))),
        };
        entries.insert(key, from_yaml(value)?);
    }
    Ok(Input::Map(entries))
}

fn number_from_yaml(n: &serde_yaml::Number) -> Result<Number, OmlError> {
    if let Some(i) = n.as_i64() {
        return Ok(Number::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Number::from(u));
    }
    n.as_f64()
        .and_then(Number::from_f64)
        .ok_or_else(|| OmlError::InvalidNumber(n.to_string()))
}

fn number_to_yaml(n: &Number) -> serde_yaml::Number {
    if let Some(i) = n.as_i64() {
        serde_yaml::Number::from(i)
    } else if let Some(u) = n.as_u64() {
        serde_yaml::Number::from(u)
    } else {
        serde_yaml::Number::from(n.as_f64().unwrap_or_default())
    }
}

fn to_yaml(snapshot: &Snapshot) -> Yaml {
    match snapshot {
        Snapshot::Null => Yaml::Null,
        Snapshot::Bool(b) => Yaml::Bool(*b),
        Snapshot::Number(n) => Yaml::Number(number_to_yaml(n)),
        Snapshot::String(s) => Yaml::String(s.clone()),
        Snapshot::List(items) => Yaml::Sequence(items.iter().map(to_yaml).collect()),
        Snapshot::Map(map) => Yaml::Mapping(
            map.iter()
                .map(|(k, v)| (Yaml::String(k.clone()), to_yaml(v)))
                .collect(),
        ),
        Snapshot::Link(url) => Yaml::Tagged(Box::new(TaggedValue {
            tag: Tag::new(LINK_TAG),
            value: Yaml::String(url.clone()),
        })),
    }
}

impl Graph {
    /// Snapshot `id` and encode it as OML.
    pub fn encode(&self, id: NodeId) -> Result<String, DocumentError> {
        Ok(encode(&self.snapshot(id)?)?)
    }

    /// Decode `text` and assign it into `id` with diff semantics.
    pub fn decode_into(&mut self, id: NodeId, text: &str) -> Result<Vec<Change>, DocumentError> {
        let input = decode(text)?;
        Ok(self.assign(id, input)?)
    }
}
