//! Diff (`assign`) and patch (`apply`) algorithms.

use indexmap::IndexMap;

use crate::change::{Change, ChangeOp, ContainerKind, Diff};
use crate::error::ObservableError;
use crate::value::{Input, Key, NodeId, Snapshot, Value};

use super::{Body, Graph};

fn describe(input: &Input) -> &'static str {
    match input {
        Input::Null => "null",
        Input::Bool(_) => "a boolean",
        Input::Number(_) => "a number",
        Input::String(_) => "a string",
        Input::Map(_) => "a map",
        Input::List(_) => "a list",
        Input::Node(_) => "a node",
        Input::Link(_) => "a link",
    }
}

impl Graph {
    /// Update `id` in place so its contents match `input`, a plain map or
    /// list or another container of the same kind. Returns the changes
    /// actually made, in order; no-ops are omitted.
    ///
    /// The whole input is validated before the first write, so a cyclic
    /// entry, an unknown handle or a bad link URL leaves `id` untouched.
    pub fn assign(&mut self, id: NodeId, input: impl Into<Input>) -> Result<Vec<Change>, ObservableError> {
        let Some(input) = self.assign_input(id, input.into())? else {
            return Ok(Vec::new());
        };
        let input = self.prepare_assign(id, input)?;
        self.assign_prepared(id, input)
    }

    /// Resolve a container argument to its entries and check the shape
    /// against `id`. `None` means assigning `id` to itself.
    fn assign_input(&self, id: NodeId, input: Input) -> Result<Option<Input>, ObservableError> {
        let kind = self.node(id)?.body.kind();
        let input = match input {
            Input::Node(other) if other == id => return Ok(None),
            Input::Node(other) => {
                self.expect_kind(other, kind)?;
                self.entries_as_input(other)?
            }
            other => other,
        };
        if input.plain_kind() != Some(kind) {
            return Err(ObservableError::Type(format!(
                "cannot assign {} to a {kind}",
                describe(&input)
            )));
        }
        Ok(Some(input))
    }

    /// Validate `input` the way `assign_prepared` will walk it: entries that
    /// recurse into an existing child are checked against that child, the
    /// rest against `id`.
    fn prepare_assign(&self, id: NodeId, input: Input) -> Result<Input, ObservableError> {
        Ok(match input {
            Input::Map(map) => Input::Map(
                map.into_iter()
                    .map(|(key, item)| {
                        let item = self.prepare_slot(id, &Key::Name(key.clone()), item)?;
                        Ok((key, item))
                    })
                    .collect::<Result<_, ObservableError>>()?,
            ),
            Input::List(items) => Input::List(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| self.prepare_slot(id, &Key::Index(index), item))
                    .collect::<Result<_, _>>()?,
            ),
            other => self.prepare(Some(id), other)?,
        })
    }

    fn prepare_slot(&self, parent: NodeId, key: &Key, input: Input) -> Result<Input, ObservableError> {
        if let Some(child) = self.recursion_target(parent, key, &input)? {
            let input = match input {
                Input::Node(other) => self.entries_as_input(other)?,
                plain => plain,
            };
            return self.prepare_assign(child, input);
        }
        self.prepare(Some(parent), input)
    }

    /// The existing child at `key` that `input` is assigned into rather than
    /// replacing: a contained node of the same kind.
    fn recursion_target(&self, parent: NodeId, key: &Key, input: &Input) -> Result<Option<NodeId>, ObservableError> {
        let current = self.slot(parent, key)?;
        let Some(child) = current.as_ref().and_then(|v| self.owned_child(v)) else {
            return Ok(None);
        };
        let child_kind = self.kind(child);
        let same_kind = match input {
            Input::Map(_) | Input::List(_) => input.plain_kind() == child_kind,
            Input::Node(other) => {
                *other != child
                    && self.owned_child(&Value::Node(*other)).is_some()
                    && self.kind(*other) == child_kind
            }
            _ => false,
        };
        Ok(same_kind.then_some(child))
    }

    fn assign_prepared(&mut self, id: NodeId, input: Input) -> Result<Vec<Change>, ObservableError> {
        match input {
            Input::Map(map) => self.assign_dict(id, map),
            Input::List(items) => self.assign_list(id, items),
            other => Err(ObservableError::Type(format!("cannot assign {}", describe(&other)))),
        }
    }

    fn assign_dict(&mut self, id: NodeId, map: IndexMap<String, Input>) -> Result<Vec<Change>, ObservableError> {
        let stale: Vec<String> = match &self.node(id)?.body {
            Body::Dict(entries) => entries.keys().filter(|k| !map.contains_key(*k)).cloned().collect(),
            Body::List(_) => Vec::new(),
        };
        let mut changes = Vec::new();
        for key in stale {
            changes.extend(self.dict_delete(id, &key)?);
        }
        for (key, item) in map {
            changes.extend(self.assign_slot(id, Key::Name(key), item)?);
        }
        Ok(changes)
    }

    fn assign_list(&mut self, id: NodeId, mut items: Vec<Input>) -> Result<Vec<Change>, ObservableError> {
        let len = self.len(id).unwrap_or(0);
        let mut changes = Vec::new();
        for index in (items.len()..len).rev() {
            changes.extend(self.list_remove(id, index)?);
        }
        let extra = if items.len() > len { items.split_off(len) } else { Vec::new() };
        for (offset, item) in extra.into_iter().enumerate() {
            changes.extend(self.list_insert(id, len + offset, item)?);
        }
        for (index, item) in items.into_iter().enumerate() {
            changes.extend(self.assign_slot(id, Key::Index(index), item)?);
        }
        Ok(changes)
    }

    /// Recurse when the current child and `input` are containers of the same
    /// kind, otherwise set the slot.
    fn assign_slot(&mut self, parent: NodeId, key: Key, input: Input) -> Result<Vec<Change>, ObservableError> {
        if let Some(child) = self.recursion_target(parent, &key, &input)? {
            let input = match input {
                Input::Node(other) => self.entries_as_input(other)?,
                plain => plain,
            };
            let nested = self.assign_prepared(child, input)?;
            return Ok(nested.into_iter().map(|c| Change::nested(key.clone(), c)).collect());
        }
        Ok(self.set_slot(parent, &key, input)?.into_iter().collect())
    }

    fn set_slot(&mut self, parent: NodeId, key: &Key, input: Input) -> Result<Option<Change>, ObservableError> {
        match key {
            Key::Name(name) => self.dict_set(parent, name, input),
            Key::Index(index) => self.list_set(parent, *index, input),
        }
    }

    /// Replay `change` against `id`. The recorded `del` must match the
    /// current value, otherwise the change no longer applies and a
    /// [`ObservableError::Value`] is returned without mutating anything.
    pub fn apply(&mut self, id: NodeId, change: &Change) -> Result<Option<Change>, ObservableError> {
        match &change.op {
            ChangeOp::Nested(inner) => {
                let child = self
                    .slot(id, &change.key)?
                    .and_then(|v| self.owned_child(&v))
                    .ok_or_else(|| ObservableError::Value(format!("no container at {}", change.key)))?;
                Ok(self
                    .apply(child, inner)?
                    .map(|applied| Change::nested(change.key.clone(), applied)))
            }
            ChangeOp::Diff(diff) => match self.node(id)?.body.kind() {
                ContainerKind::Dict => self.apply_dict(id, &change.key, diff),
                ContainerKind::List => self.apply_list(id, &change.key, diff),
            },
        }
    }

    fn current_snapshot(&self, id: NodeId, key: &Key) -> Result<Option<Snapshot>, ObservableError> {
        Ok(self.slot(id, key)?.map(|v| self.snapshot_value(&v)))
    }

    fn apply_dict(&mut self, id: NodeId, key: &Key, diff: &Diff) -> Result<Option<Change>, ObservableError> {
        if diff.kind != ContainerKind::Dict {
            return Err(ObservableError::Value(format!("{} change applied to a dict", diff.kind)));
        }
        if self.current_snapshot(id, key)? != diff.del {
            return Err(ObservableError::Value(format!("stale change at {key}")));
        }
        let name = key.to_string();
        match &diff.ins {
            None => self.dict_delete(id, &name),
            Some(ins) => self.dict_set(id, &name, Input::from(ins)),
        }
    }

    fn apply_list(&mut self, id: NodeId, key: &Key, diff: &Diff) -> Result<Option<Change>, ObservableError> {
        if diff.kind != ContainerKind::List {
            return Err(ObservableError::Value(format!("{} change applied to a list", diff.kind)));
        }
        let index = key
            .as_index()
            .ok_or_else(|| ObservableError::Value(format!("{key} is not a list index")))?;
        if diff.del.is_some() && self.current_snapshot(id, key)? != diff.del {
            return Err(ObservableError::Value(format!("stale change at {key}")));
        }
        match (&diff.del, &diff.ins) {
            (None, Some(ins)) => self.list_insert(id, index, Input::from(ins)),
            (Some(_), None) => self.list_remove(id, index),
            (Some(_), Some(ins)) => self.list_set(id, index, Input::from(ins)),
            (None, None) => Err(ObservableError::Value(format!("empty change at {key}"))),
        }
    }
}
