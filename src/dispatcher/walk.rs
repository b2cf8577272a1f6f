//! Per-dispatch state machine.
//!
//! A [`Walk`] owns everything one dispatch needs: the dispatched path, the
//! payload, the registry snapshot taken when the dispatch started and the
//! current [`State`]. Continuations ([`Next`], [`Recover`]) hold an `Arc` to
//! it and feed it [`Signal`]s.
//!
//! Execution is a trampoline: whichever thread delivers a signal while no one
//! else is driving becomes the driver and loops until no signal is pending.
//! A middleware that calls its continuation synchronously only records the
//! signal; the driver picks it up once the middleware returns. The call stack
//! therefore stays flat no matter how deep the path or how long the stacks.
//!
//! A panic out of a middleware (or out of escalation) releases the driver
//! role before it propagates, so a continuation held elsewhere can still
//! resume the dispatch later.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, debug_span, error, warn};

use super::continuation::{Next, Recover};
use crate::error::{DispatchError, UnrecoverablePolicy};
use crate::ids::DispatchId;
use crate::path::StackPath;
use crate::registry::{ErrorMiddlewareRef, MiddlewareRef, Registry};

/// Callback that receives errors no error middleware consumed.
pub type UnrecoverableHook = Arc<dyn Fn(Arc<DispatchError>) + Send + Sync>;

/// How an unrecoverable error leaves the engine.
#[derive(Clone)]
pub(crate) enum Escalation {
    Policy(UnrecoverablePolicy),
    Hook(UnrecoverableHook),
}

/// Messages delivered by continuations.
pub(crate) enum Signal {
    /// `Next::proceed`
    Proceed,
    /// `Next::fail`
    Fail(anyhow::Error),
    /// `Recover::delegate`
    Delegate,
    /// `Recover::handled`, or a `Recover` dropped unused
    Handled,
    /// A `Next` dropped unused
    Abandoned,
}

pub(crate) enum State<P, C> {
    /// Nothing has run yet.
    Start,
    /// Running the stack mounted at `path.prefix(depth)`. `next_index` is the
    /// stack index of the middleware to run on the next `Proceed`.
    AtLevel {
        depth: usize,
        stack: Vec<MiddlewareRef<P, C>>,
        next_index: usize,
    },
    /// Recovering from `error`; the error middleware mounted at
    /// `path.prefix(candidate)` currently holds the `Recover` continuation.
    Failed {
        error: Arc<DispatchError>,
        candidate: usize,
    },
    /// Terminal: levels exhausted, error handled, or dispatch abandoned.
    Done,
}

/// Work the driver performs outside the state lock.
enum Action<P, C> {
    Invoke {
        middleware: MiddlewareRef<P, C>,
        depth: usize,
        index: usize,
    },
    Recover {
        middleware: ErrorMiddlewareRef<P, C>,
        error: Arc<DispatchError>,
        depth: usize,
    },
    Escalate(Arc<DispatchError>),
    Idle,
}

struct Machine<P, C> {
    state: State<P, C>,
    pending: Option<Signal>,
    driving: bool,
}

pub(crate) struct Walk<P, C> {
    id: DispatchId,
    path: StackPath,
    payload: P,
    context: Option<Arc<C>>,
    registry: Arc<Registry<P, C>>,
    escalation: Escalation,
    machine: Mutex<Machine<P, C>>,
}

impl<P, C> Walk<P, C> {
    pub(crate) fn new(
        path: StackPath,
        payload: P,
        context: Option<Arc<C>>,
        registry: Arc<Registry<P, C>>,
        escalation: Escalation,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: DispatchId::new(),
            path,
            payload,
            context,
            registry,
            escalation,
            machine: Mutex::new(Machine {
                state: State::Start,
                pending: None,
                driving: false,
            }),
        })
    }

    pub(crate) fn id(&self) -> DispatchId {
        self.id
    }

    pub(crate) fn path(&self) -> &StackPath {
        &self.path
    }

    pub(crate) fn payload(&self) -> &P {
        &self.payload
    }

    pub(crate) fn context(&self) -> Option<&C> {
        self.context.as_deref()
    }

    /// Kick off the forward walk at depth 0.
    pub(crate) fn start(self: &Arc<Self>) {
        self.signal(Signal::Proceed);
    }

    /// Deliver a continuation signal, driving the machine if nobody else is.
    pub(crate) fn signal(self: &Arc<Self>, signal: Signal) {
        {
            let mut machine = self.machine.lock();
            debug_assert!(machine.pending.is_none(), "two continuations alive at once");
            machine.pending = Some(signal);
            if machine.driving {
                return;
            }
            machine.driving = true;
        }
        self.drive();
    }

    fn drive(self: &Arc<Self>) {
        let _span = debug_span!("dispatch", dispatch_id = %self.id, path = %self.path).entered();
        loop {
            let action = {
                let mut machine = self.machine.lock();
                let Some(signal) = machine.pending.take() else {
                    machine.driving = false;
                    return;
                };
                self.transition(&mut machine.state, signal)
            };
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.perform(action))) {
                self.release_after_panic();
                panic::resume_unwind(payload);
            }
        }
    }

    /// Give up the driver role after a panic. A signal delivered while the
    /// panicking step ran (typically `Abandoned` from the unwound `Next`, or a
    /// continuation called from another thread) is driven first so it is not
    /// lost.
    fn release_after_panic(self: &Arc<Self>) {
        let pending = {
            let mut machine = self.machine.lock();
            machine.driving = false;
            machine.pending.take()
        };
        error!(
            dispatch_id = %self.id,
            resuming = pending.is_some(),
            "Dispatch step panicked, driver released"
        );
        if let Some(signal) = pending {
            self.signal(signal);
        }
    }

    fn transition(&self, state: &mut State<P, C>, signal: Signal) -> Action<P, C> {
        match (std::mem::replace(state, State::Done), signal) {
            (State::Start, Signal::Proceed) => self.enter_level(state, 0),
            (
                State::AtLevel {
                    depth,
                    stack,
                    next_index,
                },
                Signal::Proceed,
            ) => {
                if next_index < stack.len() {
                    let middleware = Arc::clone(&stack[next_index]);
                    *state = State::AtLevel {
                        depth,
                        stack,
                        next_index: next_index + 1,
                    };
                    Action::Invoke {
                        middleware,
                        depth,
                        index: next_index,
                    }
                } else {
                    debug!(depth, "Reached the end of this stack");
                    self.enter_level(state, depth + 1)
                }
            }
            (
                State::AtLevel {
                    depth, next_index, ..
                },
                Signal::Fail(source),
            ) => {
                // next_index was advanced past the middleware that just ran
                let index = next_index.saturating_sub(1);
                let error = Arc::new(DispatchError::new(
                    self.id,
                    self.path.prefix(depth),
                    index,
                    source,
                ));
                debug!(depth, stack_index = index, error = %error, "Middleware failed");
                self.seek_error_middleware(state, error, depth)
            }
            (State::Failed { error, candidate }, Signal::Delegate) => {
                if candidate == 0 {
                    debug!("Root error middleware delegated, recovery complete");
                    Action::Idle
                } else {
                    self.seek_error_middleware(state, error, candidate - 1)
                }
            }
            (State::Failed { candidate, .. }, Signal::Handled) => {
                debug!(depth = candidate, "Error handled");
                Action::Idle
            }
            (_, Signal::Abandoned) => Action::Idle,
            (previous, _) => {
                // Continuations are single-use, so only a foreign signal can land here.
                warn!("Ignoring continuation signal that does not match the dispatch state");
                *state = previous;
                Action::Idle
            }
        }
    }

    /// Find the first level from `depth` downwards (towards the leaf) with a
    /// non-empty stack and run its first middleware. Past the end of the path
    /// the dispatch is done.
    fn enter_level(&self, state: &mut State<P, C>, depth: usize) -> Action<P, C> {
        for depth in depth..=self.path.len() {
            let level = self.path.prefix(depth);
            match self.registry.lookup(&level) {
                Some(entry) if !entry.stack().is_empty() => {
                    debug!(depth, level = %level, stack_len = entry.stack().len(), "Entering stack");
                    let stack = entry.stack().to_vec();
                    let middleware = Arc::clone(&stack[0]);
                    *state = State::AtLevel {
                        depth,
                        stack,
                        next_index: 1,
                    };
                    return Action::Invoke {
                        middleware,
                        depth,
                        index: 0,
                    };
                }
                _ => debug!(depth, level = %level, "No stack at level"),
            }
        }
        debug!("Reached the end of the path");
        *state = State::Done;
        Action::Idle
    }

    /// Walk from `path.prefix(from)` towards the root looking for an error
    /// middleware. Escalates when the root is passed without finding one.
    fn seek_error_middleware(
        &self,
        state: &mut State<P, C>,
        error: Arc<DispatchError>,
        from: usize,
    ) -> Action<P, C> {
        let mut candidate = Some(self.path.prefix(from));
        while let Some(level) = candidate {
            if let Some(middleware) = self.registry.error_middleware(&level) {
                let depth = level.len();
                debug!(depth, level = %level, "Found error middleware");
                *state = State::Failed {
                    error: Arc::clone(&error),
                    candidate: depth,
                };
                return Action::Recover {
                    middleware,
                    error,
                    depth,
                };
            }
            debug!(level = %level, "No error middleware, moving upwards");
            candidate = level.parent();
        }
        *state = State::Done;
        Action::Escalate(error)
    }

    fn perform(self: &Arc<Self>, action: Action<P, C>) {
        match action {
            Action::Invoke {
                middleware,
                depth,
                index,
            } => {
                debug!(depth, stack_index = index, "Running middleware");
                middleware.handle(&self.payload, Next::new(Arc::clone(self), depth));
            }
            Action::Recover {
                middleware,
                error,
                depth,
            } => {
                debug!(depth, "Running error middleware");
                let recover = Recover::new(Arc::clone(self), Arc::clone(&error), depth);
                middleware.handle(&error, recover);
            }
            Action::Escalate(error) => self.escalate(error),
            Action::Idle => {}
        }
    }

    // An unhandled dispatch error must never vanish; panicking is the default.
    #[allow(clippy::panic)]
    fn escalate(&self, error: Arc<DispatchError>) {
        error!(
            source_path = %error.source_path(),
            stack_index = error.stack_index(),
            error = %error.source_error(),
            "No error middleware handled the error - UNRECOVERABLE"
        );
        match &self.escalation {
            Escalation::Hook(hook) => hook(error),
            Escalation::Policy(UnrecoverablePolicy::Abort) => std::process::abort(),
            Escalation::Policy(UnrecoverablePolicy::Panic) => {
                panic!("unrecoverable dispatch error: {error}")
            }
        }
    }
}
