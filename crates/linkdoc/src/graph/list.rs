use crate::change::{Change, ContainerKind};
use crate::error::ObservableError;
use crate::value::{Input, Key, NodeId, Snapshot, Value};

use super::dict::DictHandle;
use super::{Body, Graph};

/// Reject `index` unless it is below `len + overflow`. `overflow` is 1 only
/// for insertion at the one-past-the-end position.
fn validate_index(index: usize, len: usize, overflow: usize) -> Result<(), ObservableError> {
    if index < len + overflow {
        Ok(())
    } else {
        Err(ObservableError::Range { index, len })
    }
}

impl Graph {
    fn list_items(&self, id: NodeId) -> Result<&Vec<Value>, ObservableError> {
        match &self.node(id)?.body {
            Body::List(items) => Ok(items),
            Body::Dict(_) => Err(ObservableError::Type(format!("{id} is not a list"))),
        }
    }

    fn list_items_mut(&mut self, id: NodeId) -> Result<&mut Vec<Value>, ObservableError> {
        match &mut self.node_mut(id)?.body {
            Body::List(items) => Ok(items),
            Body::Dict(_) => Err(ObservableError::Type(format!("{id} is not a list"))),
        }
    }

    pub(crate) fn list_set(&mut self, id: NodeId, index: usize, input: Input) -> Result<Option<Change>, ObservableError> {
        let items = self.list_items(id)?;
        validate_index(index, items.len(), 0)?;
        let current = items[index].clone();
        let input = self.prepare(Some(id), input)?;
        if self.is_identical(&current, &input) {
            return Ok(None);
        }
        let change = Change::leaf(
            Key::Index(index),
            ContainerKind::List,
            Some(self.snapshot_value(&current)),
            Some(self.snapshot_input(&input)),
        );
        self.dispatch_before(id, &change)?;

        let value = self.materialize(input)?;
        self.remove_parent(&current, id, &Key::Index(index));
        self.add_parent(&value, id, Key::Index(index));
        self.list_items_mut(id)?[index] = value;

        self.dispatch_after(id, &change);
        Ok(Some(change))
    }

    pub(crate) fn list_insert(&mut self, id: NodeId, index: usize, input: Input) -> Result<Option<Change>, ObservableError> {
        let len = self.list_items(id)?.len();
        validate_index(index, len, 1)?;
        let input = self.prepare(Some(id), input)?;
        let change = Change::leaf(
            Key::Index(index),
            ContainerKind::List,
            None,
            Some(self.snapshot_input(&input)),
        );
        self.dispatch_before(id, &change)?;

        let value = self.materialize(input)?;
        // Shift from the tail so a node listed twice never collides with
        // its own next back-reference.
        let shifted: Vec<Value> = self.list_items(id)?[index..].to_vec();
        for (offset, item) in shifted.iter().enumerate().rev() {
            let from = index + offset;
            self.rekey_parent(item, id, &Key::Index(from), Key::Index(from + 1));
        }
        self.add_parent(&value, id, Key::Index(index));
        self.list_items_mut(id)?.insert(index, value);

        self.dispatch_after(id, &change);
        Ok(Some(change))
    }

    pub(crate) fn list_remove(&mut self, id: NodeId, index: usize) -> Result<Option<Change>, ObservableError> {
        let items = self.list_items(id)?;
        validate_index(index, items.len(), 0)?;
        let current = items[index].clone();
        let change = Change::leaf(
            Key::Index(index),
            ContainerKind::List,
            Some(self.snapshot_value(&current)),
            None,
        );
        self.dispatch_before(id, &change)?;

        self.remove_parent(&current, id, &Key::Index(index));
        let shifted: Vec<Value> = self.list_items(id)?[index + 1..].to_vec();
        for (offset, item) in shifted.iter().enumerate() {
            let from = index + 1 + offset;
            self.rekey_parent(item, id, &Key::Index(from), Key::Index(from - 1));
        }
        self.list_items_mut(id)?.remove(index);

        self.dispatch_after(id, &change);
        Ok(Some(change))
    }
}

/// Editing handle for a list node.
pub struct ListHandle<'a> {
    graph: &'a mut Graph,
    id: NodeId,
}

impl<'a> ListHandle<'a> {
    pub(crate) fn new(graph: &'a mut Graph, id: NodeId) -> Self {
        Self { graph, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.graph.list_items(self.id).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.graph.get(self.id, index)
    }

    /// Items in order, copied at call time.
    pub fn values(&self) -> Vec<Value> {
        self.graph.list_items(self.id).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, index: usize, value: impl Into<Input>) -> Result<Option<Change>, ObservableError> {
        self.graph.list_set(self.id, index, value.into())
    }

    /// Insert before `index`; `index == len` appends.
    pub fn insert(&mut self, index: usize, value: impl Into<Input>) -> Result<Option<Change>, ObservableError> {
        self.graph.list_insert(self.id, index, value.into())
    }

    pub fn append(&mut self, value: impl Into<Input>) -> Result<Option<Change>, ObservableError> {
        let len = self.len();
        self.insert(len, value)
    }

    pub fn remove(&mut self, index: usize) -> Result<Option<Change>, ObservableError> {
        self.graph.list_remove(self.id, index)
    }

    /// Alias of [`ListHandle::remove`].
    pub fn delete(&mut self, index: usize) -> Result<Option<Change>, ObservableError> {
        self.remove(index)
    }

    /// Truncate or extend to the length of `other`, then update each
    /// position, recursing into containers of the same kind.
    pub fn assign(&mut self, other: impl Into<Input>) -> Result<Vec<Change>, ObservableError> {
        self.graph.assign(self.id, other.into())
    }

    pub fn apply(&mut self, change: &Change) -> Result<Option<Change>, ObservableError> {
        self.graph.apply(self.id, change)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.graph.snapshot(self.id).unwrap_or(Snapshot::Null)
    }

    pub fn dict(&mut self, index: usize) -> Result<DictHandle<'_>, ObservableError> {
        let child = self.child(index)?;
        self.graph.dict(child)
    }

    pub fn list(&mut self, index: usize) -> Result<ListHandle<'_>, ObservableError> {
        let child = self.child(index)?;
        self.graph.list(child)
    }

    fn child(&self, index: usize) -> Result<NodeId, ObservableError> {
        self.get(index)
            .and_then(|v| v.as_node())
            .ok_or_else(|| ObservableError::Type(format!("no container at index {index}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_at(g: &Graph, list: NodeId, index: usize) -> NodeId {
        g.get(list, index).and_then(|v| v.as_node()).unwrap()
    }

    #[test]
    fn test_validate_index() {
        assert!(validate_index(0, 1, 0).is_ok());
        assert_eq!(validate_index(1, 1, 0), Err(ObservableError::Range { index: 1, len: 1 }));
        assert!(validate_index(1, 1, 1).is_ok());
        assert!(validate_index(2, 1, 1).is_err());
    }

    #[test]
    fn test_insert_renumbers_back_references() {
        let mut g = Graph::new();
        let list = g.create(json!([{"n": 0}, {"n": 1}])).unwrap();
        let first = node_at(&g, list, 0);
        let second = node_at(&g, list, 1);
        g.list(list).unwrap().insert(0, "head").unwrap();
        assert_eq!(g.parents(first), vec![(list, Key::Index(1))]);
        assert_eq!(g.parents(second), vec![(list, Key::Index(2))]);
    }

    #[test]
    fn test_remove_renumbers_back_references() {
        let mut g = Graph::new();
        let list = g.create(json!([{"n": 0}, {"n": 1}, {"n": 2}])).unwrap();
        let removed = node_at(&g, list, 0);
        let last = node_at(&g, list, 2);
        let change = g.list(list).unwrap().remove(0).unwrap().unwrap();
        assert_eq!(change.del(), Some(&Snapshot::from(json!({"n": 0}))));
        assert!(g.parents(removed).is_empty());
        assert_eq!(g.parents(last), vec![(list, Key::Index(1))]);
    }

    #[test]
    fn test_same_node_twice_in_list() {
        let mut g = Graph::new();
        let list = g.create_list();
        let shared = g.create(json!({"v": 1})).unwrap();
        {
            let mut l = g.list(list).unwrap();
            l.append(shared).unwrap();
            l.append(shared).unwrap();
            l.insert(0, 0).unwrap();
        }
        assert_eq!(g.parents(shared), vec![(list, Key::Index(1)), (list, Key::Index(2))]);
        g.list(list).unwrap().remove(1).unwrap();
        assert_eq!(g.parents(shared), vec![(list, Key::Index(1))]);
    }

    #[test]
    fn test_out_of_range() {
        let mut g = Graph::new();
        let list = g.create(json!([1])).unwrap();
        let mut l = g.list(list).unwrap();
        assert_eq!(l.set(1, 2), Err(ObservableError::Range { index: 1, len: 1 }));
        assert_eq!(l.remove(3), Err(ObservableError::Range { index: 3, len: 1 }));
        assert_eq!(l.insert(2, 0), Err(ObservableError::Range { index: 2, len: 1 }));
        assert!(l.insert(1, 0).is_ok());
        assert_eq!(l.snapshot(), Snapshot::from(json!([1, 0])));
    }

    #[test]
    fn test_set_and_append() {
        let mut g = Graph::new();
        let list = g.create(json!(["a"])).unwrap();
        let mut l = g.list(list).unwrap();
        assert_eq!(l.set(0, "a").unwrap(), None);
        let change = l.set(0, "b").unwrap().unwrap();
        assert_eq!(change.key, Key::Index(0));
        assert_eq!(change.kind(), ContainerKind::List);
        l.append(json!([1])).unwrap();
        assert_eq!(l.len(), 2);
        assert_eq!(l.snapshot(), Snapshot::from(json!(["b", [1]])));
    }
}
