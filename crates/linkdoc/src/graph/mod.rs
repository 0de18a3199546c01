//! The observable container graph.
//!
//! # Overview
//!
//! A [`Graph`] is an arena of dict and list nodes addressed by [`NodeId`].
//! Each node records the `(parent, key)` pairs it is reachable from, so a
//! node linked under several containers reports every mutation to all of
//! them. Cycles are rejected when a value is assigned, by walking upward
//! from the target container.
//!
//! Mutations go through [`DictHandle`] and [`ListHandle`] and run to
//! completion synchronously:
//!
//! 1. the incoming value is validated (shape, handles, cycles),
//! 2. a before-change event is dispatched up every ancestor chain; any
//!    before-listener may veto the mutation,
//! 3. storage and back-references are updated,
//! 4. an after-change event is dispatched the same way.
//!
//! Documents are dict nodes bound to a URL (see [`crate::document`]). When a
//! document is placed inside a container it acts as a link: it gets no
//! back-reference, so it never takes part in cycle checks and its own
//! changes are only seen by its own listeners.

mod assign;
mod dict;
mod find;
mod list;

pub use dict::DictHandle;
pub use find::Descendants;
pub use list::ListHandle;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use linkdoc_path::{parse_index, Path};

use crate::change::{Change, ContainerKind};
use crate::document::DocumentMeta;
use crate::error::ObservableError;
use crate::value::{Input, Key, NodeId, Snapshot, Value};

pub type BeforeListener = Box<dyn FnMut(&Change) -> Result<(), ObservableError> + Send + Sync>;
pub type AfterListener = Box<dyn FnMut(&Change) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    After,
}

/// Handle returned by the `on_*` registration methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    node: NodeId,
    phase: Phase,
    id: u64,
}

impl Subscription {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

pub(crate) enum Body {
    Dict(IndexMap<String, Value>),
    List(Vec<Value>),
}

impl Body {
    fn kind(&self) -> ContainerKind {
        match self {
            Body::Dict(_) => ContainerKind::Dict,
            Body::List(_) => ContainerKind::List,
        }
    }

    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Body::Dict(map) => Box::new(map.values()),
            Body::List(items) => Box::new(items.iter()),
        }
    }
}

pub(crate) struct Node {
    pub(crate) body: Body,
    parents: Vec<(NodeId, Key)>,
    before: BTreeMap<u64, BeforeListener>,
    after: BTreeMap<u64, AfterListener>,
    pub(crate) document: Option<DocumentMeta>,
}

impl Node {
    pub(crate) fn new(body: Body) -> Self {
        Self {
            body,
            parents: Vec::new(),
            before: BTreeMap::new(),
            after: BTreeMap::new(),
            document: None,
        }
    }
}

#[derive(Default)]
pub struct Graph {
    nodes: HashMap<NodeId, Node>,
    next_node_id: u64,
    next_listener_id: u64,
    pub(crate) documents: HashMap<String, NodeId>,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("documents", &self.documents)
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Construction ──────────────────────────────────────────────────────

    pub fn create_dict(&mut self) -> NodeId {
        self.insert_node(Node::new(Body::Dict(IndexMap::new())))
    }

    pub fn create_list(&mut self) -> NodeId {
        self.insert_node(Node::new(Body::List(Vec::new())))
    }

    /// Wrap a plain map or list (and everything nested in it) into new
    /// container nodes.
    pub fn create(&mut self, input: impl Into<Input>) -> Result<NodeId, ObservableError> {
        let input = input.into();
        if input.plain_kind().is_none() {
            return Err(ObservableError::Type(
                "only maps and lists can be wrapped into containers".into(),
            ));
        }
        let input = self.prepare(None, input)?;
        match self.materialize(input)? {
            Value::Node(id) => Ok(id),
            _ => Err(ObservableError::Type("expected a container".into())),
        }
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> NodeId {
        self.next_node_id += 1;
        let id = NodeId(self.next_node_id);
        self.nodes.insert(id, node);
        id
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<ContainerKind> {
        self.nodes.get(&id).map(|node| node.body.kind())
    }

    /// Number of entries of a dict or items of a list.
    pub fn len(&self, id: NodeId) -> Option<usize> {
        self.nodes.get(&id).map(|node| match &node.body {
            Body::Dict(map) => map.len(),
            Body::List(items) => items.len(),
        })
    }

    /// Value stored at `key` directly inside `id`.
    pub fn get(&self, id: NodeId, key: impl Into<Key>) -> Option<Value> {
        self.slot(id, &key.into()).ok().flatten()
    }

    /// `(parent, key)` pairs this node is currently reachable from.
    pub fn parents(&self, id: NodeId) -> Vec<(NodeId, Key)> {
        self.nodes.get(&id).map(|node| node.parents.clone()).unwrap_or_default()
    }

    /// Walk `path` from `root`, descending into nested containers and linked
    /// documents alike. Answers `None` for any missing or invalid step.
    pub fn lookup(&self, root: NodeId, path: impl Into<Path>) -> Option<Value> {
        let path = path.into();
        let mut current = Value::Node(root);
        let mut keys = path.iter().peekable();
        while let Some(key) = keys.next() {
            current = match &current {
                Value::Node(id) => match &self.nodes.get(id)?.body {
                    Body::Dict(map) => map.get(key.as_str())?.clone(),
                    Body::List(items) => items.get(parse_index(key)?)?.clone(),
                },
                Value::String(s) => {
                    let ch = s.chars().nth(parse_index(key)?)?;
                    if keys.peek().is_some() {
                        return None;
                    }
                    return Some(Value::String(ch.to_string()));
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Deep, fully unwrapped copy of the node's contents.
    pub fn snapshot(&self, id: NodeId) -> Result<Snapshot, ObservableError> {
        let node = self.node(id)?;
        Ok(self.snapshot_body(&node.body))
    }

    fn snapshot_body(&self, body: &Body) -> Snapshot {
        match body {
            Body::Dict(map) => Snapshot::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.snapshot_value(v)))
                    .collect(),
            ),
            Body::List(items) => Snapshot::List(items.iter().map(|v| self.snapshot_value(v)).collect()),
        }
    }

    pub(crate) fn snapshot_value(&self, value: &Value) -> Snapshot {
        match value {
            Value::Null => Snapshot::Null,
            Value::Bool(b) => Snapshot::Bool(*b),
            Value::Number(n) => Snapshot::Number(n.clone()),
            Value::String(s) => Snapshot::String(s.clone()),
            Value::Node(id) => match self.nodes.get(id) {
                Some(Node {
                    document: Some(meta), ..
                }) => Snapshot::Link(meta.url().to_string()),
                Some(node) => self.snapshot_body(&node.body),
                None => Snapshot::Null,
            },
        }
    }

    // ── Handles ───────────────────────────────────────────────────────────

    /// Editing handle for a dict node (documents included).
    pub fn dict(&mut self, id: NodeId) -> Result<DictHandle<'_>, ObservableError> {
        self.expect_kind(id, ContainerKind::Dict)?;
        Ok(DictHandle::new(self, id))
    }

    /// Editing handle for a list node.
    pub fn list(&mut self, id: NodeId) -> Result<ListHandle<'_>, ObservableError> {
        self.expect_kind(id, ContainerKind::List)?;
        Ok(ListHandle::new(self, id))
    }

    // ── Subscriptions ─────────────────────────────────────────────────────

    /// Register a listener that runs before every mutation at or below
    /// `node`. Returning an error vetoes the mutation.
    pub fn on_before_change<F>(&mut self, node: NodeId, listener: F) -> Result<Subscription, ObservableError>
    where
        F: FnMut(&Change) -> Result<(), ObservableError> + Send + Sync + 'static,
    {
        let id = self.next_listener();
        self.node_mut(node)?.before.insert(id, Box::new(listener));
        Ok(Subscription {
            node,
            phase: Phase::Before,
            id,
        })
    }

    /// Register a listener that runs after every mutation at or below `node`.
    pub fn on_change<F>(&mut self, node: NodeId, listener: F) -> Result<Subscription, ObservableError>
    where
        F: FnMut(&Change) + Send + Sync + 'static,
    {
        let id = self.next_listener();
        self.node_mut(node)?.after.insert(id, Box::new(listener));
        Ok(Subscription {
            node,
            phase: Phase::After,
            id,
        })
    }

    /// Like [`Graph::on_change`], but only for changes relevant to `path`
    /// below `node`, narrowed with [`Change::get_sub_change`].
    pub fn on_change_at<F>(
        &mut self,
        node: NodeId,
        path: impl Into<Path>,
        mut listener: F,
    ) -> Result<Subscription, ObservableError>
    where
        F: FnMut(&Change) + Send + Sync + 'static,
    {
        let path = path.into();
        self.on_change(node, move |change| {
            if let Some(sub) = change.get_sub_change(&path) {
                listener(&sub);
            }
        })
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let Some(node) = self.nodes.get_mut(&subscription.node) else {
            return false;
        };
        match subscription.phase {
            Phase::Before => node.before.remove(&subscription.id).is_some(),
            Phase::After => node.after.remove(&subscription.id).is_some(),
        }
    }

    fn next_listener(&mut self) -> u64 {
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        self.next_listener_id
    }

    // ── Dispatch ──────────────────────────────────────────────────────────

    /// Run before-listeners on `node`, then re-key the change for each parent
    /// and recurse. The first veto stops the walk.
    pub(crate) fn dispatch_before(&mut self, node: NodeId, change: &Change) -> Result<(), ObservableError> {
        let parents = {
            let Some(n) = self.nodes.get_mut(&node) else {
                return Ok(());
            };
            for listener in n.before.values_mut() {
                listener(change)?;
            }
            n.parents.clone()
        };
        for (parent, key) in parents {
            self.dispatch_before(parent, &Change::nested(key, change.clone()))?;
        }
        Ok(())
    }

    pub(crate) fn dispatch_after(&mut self, node: NodeId, change: &Change) {
        let parents = {
            let Some(n) = self.nodes.get_mut(&node) else {
                return;
            };
            for listener in n.after.values_mut() {
                listener(change);
            }
            n.parents.clone()
        };
        for (parent, key) in parents {
            self.dispatch_after(parent, &Change::nested(key, change.clone()));
        }
    }

    // ── Back-references ───────────────────────────────────────────────────

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node, ObservableError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| ObservableError::Type(format!("unknown node {id}")))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ObservableError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| ObservableError::Type(format!("unknown node {id}")))
    }

    pub(crate) fn expect_kind(&self, id: NodeId, kind: ContainerKind) -> Result<(), ObservableError> {
        let actual = self.node(id)?.body.kind();
        if actual != kind {
            return Err(ObservableError::Type(format!("{id} is a {actual}, not a {kind}")));
        }
        Ok(())
    }

    /// The node behind `value` when it is a contained (non-document) node.
    pub(crate) fn owned_child(&self, value: &Value) -> Option<NodeId> {
        let id = value.as_node()?;
        match self.nodes.get(&id) {
            Some(node) if node.document.is_none() => Some(id),
            _ => None,
        }
    }

    pub(crate) fn add_parent(&mut self, child: &Value, parent: NodeId, key: Key) {
        let Some(id) = self.owned_child(child) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            let edge = (parent, key);
            if !node.parents.contains(&edge) {
                node.parents.push(edge);
            }
        }
    }

    pub(crate) fn remove_parent(&mut self, child: &Value, parent: NodeId, key: &Key) {
        let Some(id) = self.owned_child(child) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parents.retain(|(p, k)| !(*p == parent && k == key));
        }
    }

    /// Move the back-reference `(parent, from)` of `child` to `(parent, to)`.
    pub(crate) fn rekey_parent(&mut self, child: &Value, parent: NodeId, from: &Key, to: Key) {
        let Some(id) = self.owned_child(child) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            match node.parents.iter_mut().find(|(p, k)| *p == parent && k == from) {
                Some(edge) => edge.1 = to,
                None => node.parents.push((parent, to)),
            }
        }
    }

    /// True if `candidate` is `node` itself or any transitive parent of it.
    pub(crate) fn has_ancestor(&self, node: NodeId, candidate: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current == candidate {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(n) = self.nodes.get(&current) {
                stack.extend(n.parents.iter().map(|(p, _)| *p));
            }
        }
        false
    }

    // ── Validation and wrapping ───────────────────────────────────────────

    /// Validate `input` for assignment under `parent`: handles must exist,
    /// no linked node may be `parent` or one of its ancestors, link URLs are
    /// normalized.
    pub(crate) fn prepare(&self, parent: Option<NodeId>, input: Input) -> Result<Input, ObservableError> {
        Ok(match input {
            Input::Node(id) => {
                let node = self.node(id)?;
                if node.document.is_none() {
                    if let Some(parent) = parent {
                        if self.has_ancestor(parent, id) {
                            return Err(ObservableError::CyclicReference);
                        }
                    }
                }
                Input::Node(id)
            }
            Input::Link(url) => Input::Link(crate::document::normalize_url(&url)?.to_string()),
            Input::Map(map) => Input::Map(
                map.into_iter()
                    .map(|(k, v)| Ok((k, self.prepare(parent, v)?)))
                    .collect::<Result<_, ObservableError>>()?,
            ),
            Input::List(items) => Input::List(
                items
                    .into_iter()
                    .map(|v| self.prepare(parent, v))
                    .collect::<Result<_, _>>()?,
            ),
            primitive => primitive,
        })
    }

    /// Snapshot of a prepared input, as it will look once stored.
    pub(crate) fn snapshot_input(&self, input: &Input) -> Snapshot {
        match input {
            Input::Null => Snapshot::Null,
            Input::Bool(b) => Snapshot::Bool(*b),
            Input::Number(n) => Snapshot::Number(n.clone()),
            Input::String(s) => Snapshot::String(s.clone()),
            Input::Map(map) => Snapshot::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.snapshot_input(v)))
                    .collect(),
            ),
            Input::List(items) => Snapshot::List(items.iter().map(|v| self.snapshot_input(v)).collect()),
            Input::Node(id) => self.snapshot_value(&Value::Node(*id)),
            Input::Link(url) => Snapshot::Link(url.clone()),
        }
    }

    /// Build storage values for a prepared input, creating container nodes
    /// for plain maps and lists and resolving links to documents.
    pub(crate) fn materialize(&mut self, input: Input) -> Result<Value, ObservableError> {
        Ok(match input {
            Input::Null => Value::Null,
            Input::Bool(b) => Value::Bool(b),
            Input::Number(n) => Value::Number(n),
            Input::String(s) => Value::String(s),
            Input::Node(id) => Value::Node(id),
            Input::Link(url) => Value::Node(self.document(&url)?),
            Input::Map(map) => {
                let id = self.create_dict();
                let mut entries = IndexMap::with_capacity(map.len());
                for (key, item) in map {
                    let value = self.materialize(item)?;
                    self.add_parent(&value, id, Key::Name(key.clone()));
                    entries.insert(key, value);
                }
                self.node_mut(id)?.body = Body::Dict(entries);
                Value::Node(id)
            }
            Input::List(items) => {
                let id = self.create_list();
                let mut values = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let value = self.materialize(item)?;
                    self.add_parent(&value, id, Key::Index(index));
                    values.push(value);
                }
                self.node_mut(id)?.body = Body::List(values);
                Value::Node(id)
            }
        })
    }

    /// True if storing `input` where `current` sits would change nothing:
    /// equal primitives, the same node, or a link to the same document.
    pub(crate) fn is_identical(&self, current: &Value, input: &Input) -> bool {
        match (current, input) {
            (Value::Null, Input::Null) => true,
            (Value::Bool(a), Input::Bool(b)) => a == b,
            (Value::Number(a), Input::Number(b)) => a == b,
            (Value::String(a), Input::String(b)) => a == b,
            (Value::Node(a), Input::Node(b)) => a == b,
            (Value::Node(a), Input::Link(url)) => self.documents.get(url) == Some(a),
            _ => false,
        }
    }

    /// Value at `key` inside `id`; dict keys are names, list keys indices.
    pub(crate) fn slot(&self, id: NodeId, key: &Key) -> Result<Option<Value>, ObservableError> {
        Ok(match &self.node(id)?.body {
            Body::Dict(map) => map.get(key.to_string().as_str()).cloned(),
            Body::List(items) => key.as_index().and_then(|i| items.get(i)).cloned(),
        })
    }

    /// Plain-input view of a node's entries, used when assigning from
    /// another container.
    pub(crate) fn entries_as_input(&self, id: NodeId) -> Result<Input, ObservableError> {
        Ok(match &self.node(id)?.body {
            Body::Dict(map) => Input::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Input::from(v.clone())))
                    .collect(),
            ),
            Body::List(items) => Input::List(items.iter().cloned().map(Input::from).collect()),
        })
    }

    // ── Garbage collection ────────────────────────────────────────────────

    /// Drop every node not reachable from `roots` or from a registered
    /// document, and scrub back-references to dropped parents. Returns the
    /// number of nodes removed.
    pub fn collect_garbage(&mut self, roots: &[NodeId]) -> usize {
        let mut marked: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = roots.iter().copied().chain(self.documents.values().copied()).collect();
        while let Some(id) = stack.pop() {
            if !marked.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.body.values().filter_map(Value::as_node));
            }
        }
        let before = self.nodes.len();
        self.nodes.retain(|id, _| marked.contains(id));
        for node in self.nodes.values_mut() {
            node.parents.retain(|(p, _)| marked.contains(p));
        }
        before - self.nodes.len()
    }
}
