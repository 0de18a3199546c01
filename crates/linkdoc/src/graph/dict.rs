use crate::change::{Change, ContainerKind};
use crate::error::ObservableError;
use crate::value::{Input, Key, NodeId, Snapshot, Value};

use super::list::ListHandle;
use super::{Body, Graph};

impl Graph {
    fn dict_entries(&self, id: NodeId) -> Result<&indexmap::IndexMap<String, Value>, ObservableError> {
        match &self.node(id)?.body {
            Body::Dict(map) => Ok(map),
            Body::List(_) => Err(ObservableError::Type(format!("{id} is not a dict"))),
        }
    }

    fn dict_entries_mut(&mut self, id: NodeId) -> Result<&mut indexmap::IndexMap<String, Value>, ObservableError> {
        match &mut self.node_mut(id)?.body {
            Body::Dict(map) => Ok(map),
            Body::List(_) => Err(ObservableError::Type(format!("{id} is not a dict"))),
        }
    }

    pub(crate) fn dict_set(&mut self, id: NodeId, key: &str, input: Input) -> Result<Option<Change>, ObservableError> {
        let current = self.dict_entries(id)?.get(key).cloned();
        let input = self.prepare(Some(id), input)?;
        if let Some(current) = &current {
            if self.is_identical(current, &input) {
                return Ok(None);
            }
        }
        let change = Change::leaf(
            Key::Name(key.to_string()),
            ContainerKind::Dict,
            current.as_ref().map(|v| self.snapshot_value(v)),
            Some(self.snapshot_input(&input)),
        );
        self.dispatch_before(id, &change)?;

        let value = self.materialize(input)?;
        let slot = Key::Name(key.to_string());
        if let Some(old) = &current {
            self.remove_parent(old, id, &slot);
        }
        self.add_parent(&value, id, slot);
        self.dict_entries_mut(id)?.insert(key.to_string(), value);

        self.dispatch_after(id, &change);
        Ok(Some(change))
    }

    pub(crate) fn dict_delete(&mut self, id: NodeId, key: &str) -> Result<Option<Change>, ObservableError> {
        let Some(current) = self.dict_entries(id)?.get(key).cloned() else {
            return Ok(None);
        };
        let change = Change::leaf(
            Key::Name(key.to_string()),
            ContainerKind::Dict,
            Some(self.snapshot_value(&current)),
            None,
        );
        self.dispatch_before(id, &change)?;

        self.remove_parent(&current, id, &Key::Name(key.to_string()));
        self.dict_entries_mut(id)?.shift_remove(key);

        self.dispatch_after(id, &change);
        Ok(Some(change))
    }
}

/// Editing handle for a dict node.
///
/// Obtained from [`Graph::dict`]; borrows the graph mutably for its
/// lifetime. Read accessors return owned copies of the slot values.
pub struct DictHandle<'a> {
    graph: &'a mut Graph,
    id: NodeId,
}

impl<'a> DictHandle<'a> {
    pub(crate) fn new(graph: &'a mut Graph, id: NodeId) -> Self {
        Self { graph, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    fn entries_ref(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.graph.dict_entries(self.id).into_iter().flat_map(|map| map.iter())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.graph.get(self.id, key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries_ref().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries_ref().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries_ref().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries_ref().map(|(_, v)| v.clone()).collect()
    }

    /// `(key, value)` pairs in insertion order, copied at call time.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.entries_ref().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Store `value` at `key`. Returns `None` when the slot already holds
    /// the identical value (same primitive, same node).
    pub fn set(&mut self, key: &str, value: impl Into<Input>) -> Result<Option<Change>, ObservableError> {
        self.graph.dict_set(self.id, key, value.into())
    }

    pub fn delete(&mut self, key: &str) -> Result<Option<Change>, ObservableError> {
        self.graph.dict_delete(self.id, key)
    }

    /// Update this dict in place to match `other`, returning the changes
    /// actually made. Nested containers of the same kind are updated
    /// recursively, keeping their identity and subscriptions.
    pub fn assign(&mut self, other: impl Into<Input>) -> Result<Vec<Change>, ObservableError> {
        self.graph.assign(self.id, other.into())
    }

    /// Replay a change produced against an equal dict.
    pub fn apply(&mut self, change: &Change) -> Result<Option<Change>, ObservableError> {
        self.graph.apply(self.id, change)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.graph.snapshot(self.id).unwrap_or(Snapshot::Null)
    }

    /// Handle for the dict stored at `key`.
    pub fn dict(&mut self, key: &str) -> Result<DictHandle<'_>, ObservableError> {
        let child = self.child(key)?;
        self.graph.dict(child)
    }

    /// Handle for the list stored at `key`.
    pub fn list(&mut self, key: &str) -> Result<ListHandle<'_>, ObservableError> {
        let child = self.child(key)?;
        self.graph.list(child)
    }

    fn child(&self, key: &str) -> Result<NodeId, ObservableError> {
        self.get(key)
            .and_then(|v| v.as_node())
            .ok_or_else(|| ObservableError::Type(format!("no container at {key:?}")))
    }
}
