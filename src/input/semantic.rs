//! Accessibility snapshot
//!
//! The client describes its widgets once per frame. Native accessibility
//! bridges query the snapshot and ask which nodes changed since the
//! previous one.

use std::collections::HashMap;
use std::mem;

use crate::platform::Actions;
use crate::unit::{PointF, Rect};

/// Stable node identifier; the root of a tree is its first node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SemanticId(pub u64);

/// Widget role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Unknown,
    Button,
    CheckBox,
    Editor,
    RadioButton,
    Switch,
}

/// Accessibility-relevant description of a node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SemanticDesc {
    pub label: String,
    pub description: String,
    pub role: Role,
    pub bounds: Rect,
    pub selected: Option<bool>,
    pub disabled: bool,
    /// Actions the node responds to (e.g. click)
    pub actions: Actions,
}

/// A node of the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SemanticNode {
    pub id: SemanticId,
    pub parent: Option<SemanticId>,
    pub children: Vec<SemanticId>,
    pub desc: SemanticDesc,
}

/// Current and previous snapshot
#[derive(Debug, Default)]
pub struct SemanticTree {
    current: Vec<SemanticNode>,
    previous: Vec<SemanticNode>,
    ids: HashMap<SemanticId, usize>,
}

impl SemanticTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new snapshot (pre-order, root first); the current one
    /// becomes the previous generation
    pub fn update(&mut self, nodes: Vec<SemanticNode>) {
        self.previous = mem::replace(&mut self.current, nodes);
        self.ids.clear();
        for (i, node) in self.current.iter().enumerate() {
            self.ids.insert(node.id, i);
        }
    }

    /// Root of the current snapshot
    pub fn root(&self) -> Option<SemanticId> {
        self.current.first().map(|n| n.id)
    }

    pub fn lookup(&self, id: SemanticId) -> Option<&SemanticNode> {
        self.ids.get(&id).map(|&i| &self.current[i])
    }

    /// Nodes that changed between the previous and the current snapshot
    ///
    /// A node changed if its description, its number of children or the
    /// identity of any child changed. Deleted nodes are not reported; their
    /// disappearance shows up on an ancestor. Children come before parents.
    pub fn diffs(&self) -> Vec<SemanticId> {
        let mut diffs = Vec::new();
        let previous: HashMap<SemanticId, &SemanticNode> =
            self.previous.iter().map(|n| (n.id, n)).collect();
        if let Some(root) = self.previous.first() {
            self.collect_diffs(&previous, root, &mut diffs);
        }
        diffs
    }

    fn collect_diffs(
        &self,
        previous: &HashMap<SemanticId, &SemanticNode>,
        old: &SemanticNode,
        diffs: &mut Vec<SemanticId>,
    ) {
        let Some(new) = self.lookup(old.id) else {
            return;
        };
        let changed = new.desc != old.desc || new.children != old.children;
        for child in &old.children {
            if let Some(child) = previous.get(child) {
                self.collect_diffs(previous, child, diffs);
            }
        }
        if changed {
            diffs.push(old.id);
        }
    }

    /// Deepest node whose bounds contain `pos`
    pub fn hit(&self, pos: PointF) -> Option<SemanticId> {
        self.current
            .iter()
            .rev()
            .find(|n| n.desc.bounds.contains(pos))
            .map(|n| n.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, parent: Option<u64>, children: &[u64], label: &str) -> SemanticNode {
        SemanticNode {
            id: SemanticId(id),
            parent: parent.map(SemanticId),
            children: children.iter().copied().map(SemanticId).collect(),
            desc: SemanticDesc {
                label: label.to_string(),
                bounds: Rect::new(0, 0, 100, 100),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_lookup_and_root() {
        let mut tree = SemanticTree::new();
        tree.update(vec![node(1, None, &[2], "root"), node(2, Some(1), &[], "ok")]);
        assert_eq!(tree.root(), Some(SemanticId(1)));
        assert_eq!(tree.lookup(SemanticId(2)).unwrap().desc.label, "ok");
        assert!(tree.lookup(SemanticId(9)).is_none());
    }

    #[test]
    fn test_unchanged_tree_has_no_diffs() {
        let mut tree = SemanticTree::new();
        let nodes = vec![node(1, None, &[2], "root"), node(2, Some(1), &[], "a")];
        tree.update(nodes.clone());
        tree.update(nodes);
        assert!(tree.diffs().is_empty());
    }

    #[test]
    fn test_changed_label_reported() {
        let mut tree = SemanticTree::new();
        tree.update(vec![node(1, None, &[2], "root"), node(2, Some(1), &[], "a")]);
        tree.update(vec![node(1, None, &[2], "root"), node(2, Some(1), &[], "b")]);
        assert_eq!(tree.diffs(), vec![SemanticId(2)]);
    }

    #[test]
    fn test_removed_child_reported_on_parent() {
        let mut tree = SemanticTree::new();
        tree.update(vec![
            node(1, None, &[2, 3], "root"),
            node(2, Some(1), &[], "a"),
            node(3, Some(1), &[], "b"),
        ]);
        tree.update(vec![node(1, None, &[2], "root"), node(2, Some(1), &[], "a")]);
        assert_eq!(tree.diffs(), vec![SemanticId(1)]);
    }

    #[test]
    fn test_hit_returns_deepest() {
        let mut tree = SemanticTree::new();
        let mut child = node(2, Some(1), &[], "button");
        child.desc.bounds = Rect::new(10, 10, 20, 20);
        tree.update(vec![node(1, None, &[2], "root"), child]);
        assert_eq!(tree.hit(PointF::new(15.0, 15.0)), Some(SemanticId(2)));
        assert_eq!(tree.hit(PointF::new(50.0, 50.0)), Some(SemanticId(1)));
        assert_eq!(tree.hit(PointF::new(500.0, 0.0)), None);
    }
}
