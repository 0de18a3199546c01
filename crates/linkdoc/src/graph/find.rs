use linkdoc_path::Path;

use crate::value::{NodeId, Value};

use super::{Body, Graph};

/// Lazy depth-first walk over every value below a node, in storage order.
///
/// Linked documents are yielded but not entered, so a walk always
/// terminates even when documents link each other.
pub struct Descendants<'a> {
    graph: &'a Graph,
    stack: Vec<(Path, Value)>,
}

impl<'a> Descendants<'a> {
    fn new(graph: &'a Graph, root: NodeId) -> Self {
        let mut walk = Self {
            graph,
            stack: Vec::new(),
        };
        walk.push_children(root, &Path::root());
        walk
    }

    fn push_children(&mut self, id: NodeId, base: &Path) {
        let Some(node) = self.graph.nodes.get(&id) else {
            return;
        };
        match &node.body {
            Body::Dict(map) => {
                for (key, value) in map.iter().rev() {
                    self.stack.push((base.child(key), value.clone()));
                }
            }
            Body::List(items) => {
                for (index, value) in items.iter().enumerate().rev() {
                    self.stack.push((base.child(index), value.clone()));
                }
            }
        }
    }
}

impl Iterator for Descendants<'_> {
    type Item = (Path, Value);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, value) = self.stack.pop()?;
        if let Some(child) = self.graph.owned_child(&value) {
            self.push_children(child, &path);
        }
        Some((path, value))
    }
}

impl Graph {
    /// Every `(path, value)` below `root`, depth first.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants::new(self, root)
    }

    /// Values below `root` matching `predicate`, depth first.
    pub fn find<'a, P>(&'a self, root: NodeId, mut predicate: P) -> impl Iterator<Item = Value> + 'a
    where
        P: FnMut(&Value) -> bool + 'a,
    {
        self.descendants(root)
            .map(|(_, value)| value)
            .filter(move |value| predicate(value))
    }

    /// Documents linked anywhere below `root`, without duplicates.
    pub fn linked_documents(&self, root: NodeId) -> Vec<NodeId> {
        let mut found: Vec<NodeId> = Vec::new();
        for value in self.find(root, |v| v.as_node().is_some_and(|id| self.is_document(id))) {
            if let Some(id) = value.as_node() {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        found
    }
}
