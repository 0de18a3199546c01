//! Location-tagged diffs.
//!
//! A [`Change`] names the key it happened at and either carries the leaf
//! [`Diff`] (what was removed, what was inserted) or wraps the change that
//! happened one level deeper. Every dispatch hop wraps the change in one more
//! level, so a listener on any ancestor sees the full path from itself down
//! to the mutated slot.

use std::fmt;

use linkdoc_path::{parse_index, Path};

use crate::value::{Key, Snapshot};

/// Container flavour a leaf diff applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Dict,
    List,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Dict => "dict",
            ContainerKind::List => "list",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf diff. `del: None` means insert-only, `ins: None` delete-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    pub kind: ContainerKind,
    pub del: Option<Snapshot>,
    pub ins: Option<Snapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOp {
    Diff(Diff),
    Nested(Box<Change>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub key: Key,
    pub op: ChangeOp,
}

impl Change {
    pub fn leaf(key: Key, kind: ContainerKind, del: Option<Snapshot>, ins: Option<Snapshot>) -> Self {
        Self {
            key,
            op: ChangeOp::Diff(Diff { kind, del, ins }),
        }
    }

    pub fn nested(key: Key, inner: Change) -> Self {
        Self {
            key,
            op: ChangeOp::Nested(Box::new(inner)),
        }
    }

    /// Keys from this level down to the leaf, one per level.
    pub fn keys(&self) -> Vec<&Key> {
        let mut keys = vec![&self.key];
        let mut current = self;
        while let ChangeOp::Nested(inner) = &current.op {
            keys.push(&inner.key);
            current = inner;
        }
        keys
    }

    pub fn path(&self) -> Path {
        Path::concat(self.keys().into_iter().map(Path::from))
    }

    /// The innermost leaf diff.
    pub fn diff(&self) -> &Diff {
        let mut current = self;
        loop {
            match &current.op {
                ChangeOp::Diff(diff) => return diff,
                ChangeOp::Nested(inner) => current = inner,
            }
        }
    }

    pub fn kind(&self) -> ContainerKind {
        self.diff().kind
    }

    pub fn del(&self) -> Option<&Snapshot> {
        self.diff().del.as_ref()
    }

    pub fn ins(&self) -> Option<&Snapshot> {
        self.diff().ins.as_ref()
    }

    /// The part of this change observable at `path`.
    ///
    /// - `path` equals this change's path: the change itself.
    /// - `path` is a prefix of it: the nested change below `path`.
    /// - this change's path is a prefix of `path`: a leaf diff synthesized by
    ///   looking `path` up inside `del` and `ins`; `None` if both sides agree.
    /// - otherwise the paths are unrelated and the answer is `None`.
    pub fn get_sub_change(&self, path: &Path) -> Option<Change> {
        let own = self.path();
        if own == *path {
            return Some(self.clone());
        }
        if own.is_sub_path_of(path) {
            // A key may span several segments ("x.y") or none (""), so the
            // prefix is consumed per segment, not per level.
            let mut remaining = path.len();
            let mut current = self;
            while remaining > 0 {
                let segments = Path::from(&current.key);
                if segments.len() > remaining {
                    let rest = segments.slice(remaining..).to_string();
                    return Some(Change {
                        key: Key::Name(rest),
                        op: current.op.clone(),
                    });
                }
                remaining -= segments.len();
                let ChangeOp::Nested(inner) = &current.op else {
                    return None;
                };
                current = inner;
            }
            return Some(current.clone());
        }
        if path.is_sub_path_of(&own) {
            let rest = path.slice(own.len()..);
            let diff = self.diff();
            let del = diff.del.as_ref().and_then(|d| d.lookup(&rest));
            let ins = diff.ins.as_ref().and_then(|i| i.lookup(&rest));
            if del == ins {
                return None;
            }
            let parent = rest.parent();
            let holder = diff
                .del
                .as_ref()
                .and_then(|d| d.lookup(&parent))
                .or_else(|| diff.ins.as_ref().and_then(|i| i.lookup(&parent)));
            let kind = match holder {
                Some(Snapshot::Map(_)) => ContainerKind::Dict,
                _ => ContainerKind::List,
            };
            let leaf = rest.leaf()?;
            let key = match (kind, parse_index(leaf)) {
                (ContainerKind::List, Some(index)) => Key::Index(index),
                _ => Key::Name(leaf.to_string()),
            };
            return Some(Change::leaf(key, kind, del, ins));
        }
        None
    }
}
