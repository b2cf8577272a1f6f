use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use may::coroutine;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::walk::{Escalation, UnrecoverableHook, Walk};
use crate::error::DispatchError;
use crate::ids::DispatchId;
use crate::middleware::{ErrorMiddleware, Middleware};
use crate::path::StackPath;
use crate::registry::{ErrorMiddlewareRef, MiddlewareRef, Registry};
use crate::runtime_config::RuntimeConfig;

/// Hierarchical middleware stacks.
///
/// Middleware mounted at a path runs for every dispatch whose path has it as
/// a prefix: dispatching `["a", "b", "c"]` runs the stacks at `[]`, `["a"]`,
/// `["a", "b"]` and `["a", "b", "c"]`, in that order.
///
/// `P` is the payload handed to every middleware of a dispatch; `C` is an
/// optional context shared by all dispatches (see [`HStacks::with_context`]).
///
/// # Concurrency
///
/// Mounts are applied in place to a writer-side registry. The first read
/// after a mount (a dispatch, [`HStacks::stack`], [`HStacks::registry`], ...)
/// publishes it as a new immutable version. A dispatch reads the version that
/// was current when it started and never observes later mounts, so mounting
/// while dispatches are in flight is safe, though usually all mounting
/// happens at startup.
///
/// Publishing is O(1): versions share their tree nodes, and a mount copies
/// only the nodes on its path that a published version still uses.
pub struct HStacks<P, C = ()> {
    writer: Mutex<Registry<P, C>>,
    published: ArcSwap<Registry<P, C>>,
    dirty: AtomicBool,
    context: Option<Arc<C>>,
    config: RuntimeConfig,
    escalation: Escalation,
}

impl<P, C> Default for HStacks<P, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, C> HStacks<P, C> {
    /// Create an empty instance with the default [`RuntimeConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create an empty instance configured from `HSTACKS_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_config(RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        HStacks {
            writer: Mutex::new(Registry::new()),
            published: ArcSwap::from_pointee(Registry::new()),
            dirty: AtomicBool::new(false),
            context: None,
            config,
            escalation: Escalation::Policy(config.unrecoverable),
        }
    }

    /// Back this instance with an existing registry, e.g. one built up front
    /// or a version taken from another instance with [`HStacks::registry`].
    /// Registries share structure, so later mounts on either side stay
    /// invisible to the other.
    #[must_use]
    pub fn with_registry(self, registry: Registry<P, C>) -> Self {
        debug!(paths = registry.len(), "Using provided registry");
        *self.writer.lock() = registry.clone();
        self.published.store(Arc::new(registry));
        self.dirty.store(false, Ordering::Release);
        self
    }

    /// Share `context` with every middleware invocation (available through
    /// [`crate::Next::context`] and [`crate::Recover::context`]).
    #[must_use]
    pub fn with_context(mut self, context: C) -> Self {
        self.context = Some(Arc::new(context));
        self
    }

    /// Route unrecoverable errors to `hook` instead of the configured
    /// [`crate::UnrecoverablePolicy`]. The hook runs on the thread that
    /// exhausted the recovery walk.
    #[must_use]
    pub fn on_unrecoverable<F>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<DispatchError>) + Send + Sync + 'static,
    {
        let hook: UnrecoverableHook = Arc::new(hook);
        self.escalation = Escalation::Hook(hook);
        self
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Append `middleware` to the stack at `path`.
    pub fn mount<M>(&self, path: impl Into<StackPath>, middleware: M) -> &Self
    where
        M: Middleware<P, C> + 'static,
    {
        self.mount_shared(path, Arc::new(middleware))
    }

    /// Append an already shared middleware to the stack at `path`. The same
    /// instance may be mounted at several paths.
    pub fn mount_shared(&self, path: impl Into<StackPath>, middleware: MiddlewareRef<P, C>) -> &Self {
        let path = path.into();
        let mut writer = self.writer.lock();
        writer.mount(&path, middleware);
        self.dirty.store(true, Ordering::Release);
        self
    }

    /// Set the error middleware at `path`, replacing any previous one.
    pub fn mount_error<M>(&self, path: impl Into<StackPath>, middleware: M) -> &Self
    where
        M: ErrorMiddleware<P, C> + 'static,
    {
        let path = path.into();
        let middleware: ErrorMiddlewareRef<P, C> = Arc::new(middleware);
        let mut writer = self.writer.lock();
        writer.mount_error(&path, middleware);
        self.dirty.store(true, Ordering::Release);
        self
    }

    /// Copy of the stack mounted at exactly `path` (empty if none).
    #[must_use]
    pub fn stack(&self, path: impl Into<StackPath>) -> Vec<MiddlewareRef<P, C>> {
        self.registry().stack(&path.into())
    }

    /// Error middleware mounted at exactly `path`.
    #[must_use]
    pub fn error_middleware(&self, path: impl Into<StackPath>) -> Option<ErrorMiddlewareRef<P, C>> {
        self.registry().error_middleware(&path.into())
    }

    /// Every path with something mounted, parents before children.
    #[must_use]
    pub fn mounted_paths(&self) -> Vec<StackPath> {
        self.registry().paths()
    }

    /// The current registry version, including every completed mount.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry<P, C>> {
        if self.dirty.load(Ordering::Acquire) {
            let writer = self.writer.lock();
            // checked again under the lock: another reader may have published
            if self.dirty.swap(false, Ordering::AcqRel) {
                self.published.store(Arc::new(writer.clone()));
                debug!(paths = writer.len(), "Published registry version");
            }
        }
        self.published.load_full()
    }

    fn prepare(&self, path: StackPath, payload: P) -> Arc<Walk<P, C>> {
        Walk::new(
            path,
            payload,
            self.context.clone(),
            self.registry(),
            self.escalation.clone(),
        )
    }

    /// Dispatch `payload` along `path`.
    ///
    /// Runs the stack of every prefix of `path`, root first, each in mount
    /// order. Returns once no middleware is driving the dispatch on this
    /// thread: with synchronous middleware that is after the whole dispatch,
    /// with asynchronous middleware the dispatch continues on whichever thread
    /// calls the pending continuation.
    ///
    /// # Panics
    ///
    /// Under the default [`crate::UnrecoverablePolicy::Panic`], panics when a
    /// middleware error reaches the root without being consumed by an error
    /// middleware and recovery ran on this thread.
    pub fn dispatch(&self, path: impl Into<StackPath>, payload: P) -> DispatchId {
        let walk = self.prepare(path.into(), payload);
        let id = walk.id();
        debug!(dispatch_id = %id, path = %walk.path(), "Dispatching");
        walk.start();
        id
    }

    /// Dispatch on a new `may` coroutine with the configured stack size.
    ///
    /// # Safety
    ///
    /// Spawning through `may::coroutine::Builder::spawn()` is unsafe in the
    /// `may` runtime. The caller must ensure the runtime is configured before
    /// calling this and that middleware does not block the coroutine's worker
    /// thread on non-`may` primitives for long.
    ///
    /// # Errors
    ///
    /// Returns the spawn error when the coroutine could not be created.
    /// An unrecoverable error panics inside the coroutine and surfaces as an
    /// `Err` from [`may::coroutine::JoinHandle::join`].
    pub unsafe fn spawn_dispatch(
        &self,
        path: impl Into<StackPath>,
        payload: P,
    ) -> std::io::Result<(DispatchId, coroutine::JoinHandle<()>)>
    where
        P: Send + Sync + 'static,
        C: Send + Sync + 'static,
    {
        let walk = self.prepare(path.into(), payload);
        let id = walk.id();
        let stack_size = self.config.stack_size;

        // SAFETY: see the function's safety contract; the closure owns an
        // `Arc` to the dispatch state and borrows nothing.
        let spawned = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || {
                    debug!(dispatch_id = %walk.id(), path = %walk.path(), "Dispatch coroutine start");
                    walk.start();
                })
        };

        match spawned {
            Ok(handle) => {
                info!(dispatch_id = %id, stack_size, "Dispatch coroutine spawned");
                Ok((id, handle))
            }
            Err(e) => {
                error!(
                    dispatch_id = %id,
                    error = %e,
                    stack_size,
                    "Failed to spawn dispatch coroutine"
                );
                Err(e)
            }
        }
    }
}
