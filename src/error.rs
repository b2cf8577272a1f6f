use std::fmt;

use crate::ids::DispatchId;
use crate::path::StackPath;

/// Failure record produced when a middleware hands an error to its
/// continuation.
///
/// Built exactly once, at the point of failure, and passed unchanged to every
/// error middleware tried by the recovery walk. It carries enough context for
/// an error middleware to log or remediate without re-deriving where the
/// failure happened.
#[derive(Debug)]
pub struct DispatchError {
    dispatch_id: DispatchId,
    source_path: StackPath,
    stack_index: usize,
    error: anyhow::Error,
}

impl DispatchError {
    pub(crate) fn new(
        dispatch_id: DispatchId,
        source_path: StackPath,
        stack_index: usize,
        error: anyhow::Error,
    ) -> Self {
        Self {
            dispatch_id,
            source_path,
            stack_index,
            error,
        }
    }

    /// Id of the dispatch that failed.
    #[must_use]
    pub fn dispatch_id(&self) -> DispatchId {
        self.dispatch_id
    }

    /// Path of the stack whose middleware failed. This is the prefix of the
    /// dispatched path that was executing, not the full dispatched path.
    #[must_use]
    pub fn source_path(&self) -> &StackPath {
        &self.source_path
    }

    /// Index of the failing middleware within its stack.
    #[must_use]
    pub fn stack_index(&self) -> usize {
        self.stack_index
    }

    /// The error the middleware reported.
    #[must_use]
    pub fn source_error(&self) -> &anyhow::Error {
        &self.error
    }

    /// Downcast the reported error to a concrete type.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<E>()
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hstacks middleware error at {} (stack index {}): {}",
            self.source_path, self.stack_index, self.error
        )
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.error)
    }
}

/// What the engine does with an error that no error middleware consumed.
///
/// Both policies are loud: the failure is logged at `error` level first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnrecoverablePolicy {
    /// Panic on the thread that exhausted the recovery walk. For synchronous
    /// middleware that is the thread that called `dispatch`.
    #[default]
    Panic,
    /// Abort the process.
    Abort,
}

impl UnrecoverablePolicy {
    /// Parse a policy name; unknown values fall back to [`UnrecoverablePolicy::Panic`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "abort" => UnrecoverablePolicy::Abort,
            _ => UnrecoverablePolicy::Panic,
        }
    }
}
