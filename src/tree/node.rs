use std::sync::Arc;

use crate::path::{Segment, StackPath};

/// Node in the prefix tree.
///
/// Each node represents one path segment. Children are kept in insertion
/// order and scanned linearly: fan-out per level is small in middleware trees
/// and a scan beats hashing at that size.
///
/// Children sit behind `Arc` so that clones of a tree share every node until
/// one side writes to it.
#[derive(Clone)]
pub(super) struct TreeNode<T> {
    /// The segment this node represents (empty for the root node)
    segment: Segment,
    /// Value stored at the exact path ending in this node
    value: Option<T>,
    /// Child nodes for longer paths
    children: Vec<Arc<TreeNode<T>>>,
}

impl<T> TreeNode<T> {
    pub(super) fn new(segment: Segment) -> Self {
        Self {
            segment,
            value: None,
            children: Vec::new(),
        }
    }

    fn child(&self, segment: &str) -> Option<&TreeNode<T>> {
        self.children
            .iter()
            .find(|child| child.segment.as_ref() == segment)
            .map(|child| &**child)
    }

    /// Exact-match lookup: the node for `segments`, if every segment exists.
    pub(super) fn find(&self, segments: &[Segment]) -> Option<&TreeNode<T>> {
        let mut node = self;
        for segment in segments {
            node = node.child(segment)?;
        }
        Some(node)
    }

    pub(super) fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Depth-first collection of every occupied path below (and including)
    /// this node. `prefix` is the path leading to this node.
    pub(super) fn collect_paths(&self, prefix: &StackPath, out: &mut Vec<StackPath>) {
        if self.value.is_some() {
            out.push(prefix.clone());
        }
        for child in &self.children {
            child.collect_paths(&prefix.join(child.segment.clone()), out);
        }
    }

    #[cfg(test)]
    pub(super) fn children(&self) -> &[Arc<TreeNode<T>>] {
        &self.children
    }
}

impl<T: Clone> TreeNode<T> {
    /// Find the child for `segment`, creating it when missing.
    fn child_or_insert(&mut self, segment: &Segment) -> &mut Arc<TreeNode<T>> {
        let idx = match self
            .children
            .iter()
            .position(|child| child.segment == *segment)
        {
            Some(idx) => idx,
            None => {
                self.children.push(Arc::new(TreeNode::new(segment.clone())));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    pub(super) fn value_slot(&mut self) -> &mut Option<T> {
        &mut self.value
    }
}

/// Walk to the node for `segments`, creating missing nodes. Nodes on the way
/// that are shared with another tree are copied first; everything off the
/// path stays shared.
pub(super) fn find_or_insert<'a, T: Clone>(
    mut node: &'a mut Arc<TreeNode<T>>,
    segments: &[Segment],
) -> &'a mut TreeNode<T> {
    for segment in segments {
        node = Arc::make_mut(node).child_or_insert(segment);
    }
    Arc::make_mut(node)
}
