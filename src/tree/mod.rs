//! # Prefix Tree Module
//!
//! A small exact-match prefix tree mapping [`StackPath`]s to values. It is the
//! storage behind the middleware [`crate::registry::Registry`].
//!
//! ## Contract
//!
//! - `get(path)` returns the value stored at exactly `path`; ancestors and
//!   descendants are never consulted
//! - `put(path, value)` stores (or replaces) the value at `path`, creating
//!   intermediate nodes without values
//! - Both are O(k) in the path length k
//!
//! Segments are matched for equality only; there are no parameter or
//! wildcard segments.
//!
//! ## Example
//!
//! ```rust
//! use hstacks::tree::PrefixTree;
//! use hstacks::StackPath;
//!
//! let mut tree = PrefixTree::new();
//! tree.put(&StackPath::from(["a", "b"]), 1);
//!
//! assert_eq!(tree.get(&StackPath::from(["a", "b"])), Some(&1));
//! // Intermediate nodes carry no value
//! assert_eq!(tree.get(&StackPath::from(["a"])), None);
//! ```

mod node;

use std::sync::Arc;

use crate::path::{Segment, StackPath};
use node::TreeNode;

/// Exact-match path → value store.
///
/// Nodes are reference counted: `clone` is O(1) and the two trees share
/// structure. A later `put` copies only the nodes on the written path (and
/// the value stored at its end), which is what makes registry snapshots cheap.
pub struct PrefixTree<T> {
    root: Arc<TreeNode<T>>,
    len: usize,
}

impl<T> Clone for PrefixTree<T> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            len: self.len,
        }
    }
}

impl<T> Default for PrefixTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PrefixTree<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Arc::new(TreeNode::new(Segment::from(""))),
            len: 0,
        }
    }

    /// Value stored at exactly `path`.
    #[must_use]
    pub fn get(&self, path: &StackPath) -> Option<&T> {
        self.root.find(path.segments()).and_then(TreeNode::value)
    }

    /// Number of paths holding a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every path holding a value, depth-first with children in insertion
    /// order (a parent is listed before its descendants).
    #[must_use]
    pub fn paths(&self) -> Vec<StackPath> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect_paths(&StackPath::root(), &mut out);
        out
    }
}

impl<T: Clone> PrefixTree<T> {
    /// Store `value` at `path`, returning the value it replaced.
    pub fn put(&mut self, path: &StackPath, value: T) -> Option<T> {
        let previous = node::find_or_insert(&mut self.root, path.segments())
            .value_slot()
            .replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Mutable access to the value at `path`, inserting `init()` first when
    /// the path holds no value.
    pub fn get_or_insert_with<F>(&mut self, path: &StackPath, init: F) -> &mut T
    where
        F: FnOnce() -> T,
    {
        let slot = node::find_or_insert(&mut self.root, path.segments()).value_slot();
        if slot.is_none() {
            self.len += 1;
        }
        slot.get_or_insert_with(init)
    }
}
