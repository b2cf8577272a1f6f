use std::sync::Arc;

use tracing::{debug, warn};

use super::walk::{Signal, Walk};
use crate::error::DispatchError;
use crate::ids::DispatchId;
use crate::path::StackPath;

/// Continuation handed to a [`crate::Middleware`].
///
/// Consuming it with [`Next::proceed`] advances to the next middleware (or
/// the next level); [`Next::fail`] aborts the forward walk and starts error
/// recovery. Both take `self`, so a continuation cannot be used twice.
///
/// A `Next` is `Send` when the payload and context are `Send + Sync`, so it
/// can be moved into a thread or coroutine and consumed when asynchronous
/// work completes. Dropping it unused abandons the dispatch; this is logged
/// as a warning.
#[must_use = "the dispatch stalls unless `proceed` or `fail` is called"]
pub struct Next<P, C = ()> {
    walk: Arc<Walk<P, C>>,
    depth: usize,
    armed: bool,
}

impl<P, C> Next<P, C> {
    pub(crate) fn new(walk: Arc<Walk<P, C>>, depth: usize) -> Self {
        Self {
            walk,
            depth,
            armed: true,
        }
    }

    /// Hand control to the next middleware.
    pub fn proceed(mut self) {
        self.armed = false;
        self.walk.signal(Signal::Proceed);
    }

    /// Abort this stack with `error`. Error middleware is tried from the
    /// current level towards the root.
    pub fn fail<E>(mut self, error: E)
    where
        E: Into<anyhow::Error>,
    {
        self.armed = false;
        self.walk.signal(Signal::Fail(error.into()));
    }

    /// The dispatch payload (same value the middleware was called with).
    #[must_use]
    pub fn payload(&self) -> &P {
        self.walk.payload()
    }

    /// The context configured on the [`crate::HStacks`] instance, if any.
    #[must_use]
    pub fn context(&self) -> Option<&C> {
        self.walk.context()
    }

    #[must_use]
    pub fn dispatch_id(&self) -> DispatchId {
        self.walk.id()
    }

    /// The full path being dispatched.
    #[must_use]
    pub fn dispatch_path(&self) -> &StackPath {
        self.walk.path()
    }

    /// The level whose stack is running (a prefix of [`Next::dispatch_path`]).
    #[must_use]
    pub fn level(&self) -> StackPath {
        self.walk.path().prefix(self.depth)
    }

    /// Length of [`Next::level`].
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl<P, C> Drop for Next<P, C> {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                dispatch_id = %self.walk.id(),
                level = %self.walk.path().prefix(self.depth),
                "Continuation dropped without being called - dispatch abandoned"
            );
            self.walk.signal(Signal::Abandoned);
        }
    }
}

impl<P, C> std::fmt::Debug for Next<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("dispatch_id", &self.walk.id())
            .field("depth", &self.depth)
            .finish()
    }
}

/// Continuation handed to a [`crate::ErrorMiddleware`].
///
/// - [`Recover::delegate`]: pass the error on to the error middleware of a
///   shorter path. Delegating from the root error middleware ends recovery.
/// - [`Recover::handled`]: the error is dealt with; recovery stops.
///
/// Dropping a `Recover` unused counts as [`Recover::handled`].
#[must_use = "call `delegate` to pass the error upwards or `handled` to stop"]
pub struct Recover<P, C = ()> {
    walk: Arc<Walk<P, C>>,
    error: Arc<DispatchError>,
    depth: usize,
    armed: bool,
}

impl<P, C> Recover<P, C> {
    pub(crate) fn new(walk: Arc<Walk<P, C>>, error: Arc<DispatchError>, depth: usize) -> Self {
        Self {
            walk,
            error,
            depth,
            armed: true,
        }
    }

    /// Let the error middleware of the parent path (or the next one up that
    /// exists) see the error.
    pub fn delegate(mut self) {
        self.armed = false;
        self.walk.signal(Signal::Delegate);
    }

    /// Stop recovery here.
    pub fn handled(mut self) {
        self.armed = false;
        self.walk.signal(Signal::Handled);
    }

    /// The error being recovered from.
    #[must_use]
    pub fn error(&self) -> &DispatchError {
        &self.error
    }

    #[must_use]
    pub fn payload(&self) -> &P {
        self.walk.payload()
    }

    #[must_use]
    pub fn context(&self) -> Option<&C> {
        self.walk.context()
    }

    #[must_use]
    pub fn dispatch_id(&self) -> DispatchId {
        self.walk.id()
    }

    /// The level whose error middleware is running.
    #[must_use]
    pub fn level(&self) -> StackPath {
        self.walk.path().prefix(self.depth)
    }
}

impl<P, C> Drop for Recover<P, C> {
    fn drop(&mut self) {
        if self.armed {
            debug!(
                dispatch_id = %self.walk.id(),
                level = %self.walk.path().prefix(self.depth),
                "Recover dropped without delegating - error handled"
            );
            self.walk.signal(Signal::Handled);
        }
    }
}

impl<P, C> std::fmt::Debug for Recover<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recover")
            .field("dispatch_id", &self.walk.id())
            .field("depth", &self.depth)
            .field("error", &self.error.to_string())
            .finish()
    }
}
