//! Middleware registry: the path → [`StackEntry`] store.
//!
//! A [`Registry`] value is immutable once published by [`crate::HStacks`].
//! Clones share their tree nodes and mounting copies only the nodes on the
//! mounted path, so dispatches in flight keep reading the version they
//! started with while the next version is built.

use std::sync::Arc;

use tracing::debug;

use crate::middleware::{ErrorMiddleware, Middleware};
use crate::path::StackPath;
use crate::tree::PrefixTree;

/// Shared handle to a mounted middleware.
pub type MiddlewareRef<P, C> = Arc<dyn Middleware<P, C>>;

/// Shared handle to a mounted error middleware.
pub type ErrorMiddlewareRef<P, C> = Arc<dyn ErrorMiddleware<P, C>>;

/// Everything mounted at one exact path.
///
/// An entry exists at a path iff at least one mount (regular or error)
/// targeted that path. Entries are created on first mount and never removed.
pub struct StackEntry<P, C = ()> {
    stack: Vec<MiddlewareRef<P, C>>,
    error_middleware: Option<ErrorMiddlewareRef<P, C>>,
}

// Manual impls: a derive would require `P: Clone, C: Clone`.
impl<P, C> Clone for StackEntry<P, C> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
            error_middleware: self.error_middleware.clone(),
        }
    }
}

impl<P, C> Default for StackEntry<P, C> {
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            error_middleware: None,
        }
    }
}

impl<P, C> StackEntry<P, C> {
    /// Middleware in mount order.
    #[must_use]
    pub fn stack(&self) -> &[MiddlewareRef<P, C>] {
        &self.stack
    }

    #[must_use]
    pub fn error_middleware(&self) -> Option<&ErrorMiddlewareRef<P, C>> {
        self.error_middleware.as_ref()
    }
}

impl<P, C> std::fmt::Debug for StackEntry<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackEntry")
            .field("stack_len", &self.stack.len())
            .field("has_error_middleware", &self.error_middleware.is_some())
            .finish()
    }
}

/// Path → [`StackEntry`] store.
pub struct Registry<P, C = ()> {
    tree: PrefixTree<StackEntry<P, C>>,
}

impl<P, C> Clone for Registry<P, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<P, C> Default for Registry<P, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, C> Registry<P, C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: PrefixTree::new(),
        }
    }

    fn entry_mut(&mut self, path: &StackPath) -> &mut StackEntry<P, C> {
        self.tree.get_or_insert_with(path, || {
            debug!(path = %path, "Creating stack entry");
            StackEntry::default()
        })
    }

    /// Append `middleware` to the stack at `path`.
    pub fn mount(&mut self, path: &StackPath, middleware: MiddlewareRef<P, C>) {
        let entry = self.entry_mut(path);
        entry.stack.push(middleware);
        debug!(path = %path, stack_len = entry.stack.len(), "Mounted middleware");
    }

    /// Set (or replace) the error middleware at `path`. Last write wins.
    pub fn mount_error(&mut self, path: &StackPath, middleware: ErrorMiddlewareRef<P, C>) {
        let entry = self.entry_mut(path);
        let replaced = entry.error_middleware.replace(middleware).is_some();
        debug!(path = %path, replaced, "Mounted error middleware");
    }

    /// The entry at exactly `path`. Ancestors and descendants are not searched.
    #[must_use]
    pub fn lookup(&self, path: &StackPath) -> Option<&StackEntry<P, C>> {
        self.tree.get(path)
    }

    /// A copy of the stack at `path`; empty when nothing is mounted there.
    /// Changing the returned vector has no effect on the registry.
    #[must_use]
    pub fn stack(&self, path: &StackPath) -> Vec<MiddlewareRef<P, C>> {
        self.lookup(path)
            .map(|entry| entry.stack.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn error_middleware(&self, path: &StackPath) -> Option<ErrorMiddlewareRef<P, C>> {
        self.lookup(path)
            .and_then(|entry| entry.error_middleware.clone())
    }

    /// Paths that carry an entry, parents before children.
    #[must_use]
    pub fn paths(&self) -> Vec<StackPath> {
        self.tree.paths()
    }

    /// Number of paths that carry an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
