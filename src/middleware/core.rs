use crate::dispatcher::{Next, Recover};
use crate::error::DispatchError;

/// A link in a stack: runs with the dispatch payload and hands control back
/// through `next`.
///
/// `next` must be consumed exactly once, either with [`Next::proceed`] or
/// [`Next::fail`]. It may be moved to another thread or coroutine and consumed
/// later; the dispatch waits until then. Dropping it without consuming it
/// stalls the dispatch for good.
///
/// Closures `Fn(&P, Next<P, C>)` implement this trait, so most middleware is
/// mounted as a closure:
///
/// ```rust
/// use hstacks::{HStacks, Next};
///
/// let stacks: HStacks<String> = HStacks::new();
/// stacks.mount(["greet"], |name: &String, next: Next<String>| {
///     assert!(!name.is_empty());
///     next.proceed();
/// });
/// stacks.dispatch(["greet"], "world".to_string());
/// ```
pub trait Middleware<P, C = ()>: Send + Sync {
    fn handle(&self, payload: &P, next: Next<P, C>);
}

impl<P, C, F> Middleware<P, C> for F
where
    F: Fn(&P, Next<P, C>) + Send + Sync,
{
    fn handle(&self, payload: &P, next: Next<P, C>) {
        self(payload, next)
    }
}

/// Error handler mounted at a path; at most one per path.
///
/// Receives the [`DispatchError`] and a [`Recover`] continuation.
/// [`Recover::delegate`] passes the error to the next shorter path;
/// [`Recover::handled`] (or dropping `recover`) ends recovery here.
pub trait ErrorMiddleware<P, C = ()>: Send + Sync {
    fn handle(&self, error: &DispatchError, recover: Recover<P, C>);
}

impl<P, C, F> ErrorMiddleware<P, C> for F
where
    F: Fn(&DispatchError, Recover<P, C>) + Send + Sync,
{
    fn handle(&self, error: &DispatchError, recover: Recover<P, C>) {
        self(error, recover)
    }
}
