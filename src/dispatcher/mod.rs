//! # Dispatcher Module
//!
//! The dispatch engine: [`HStacks`] owns the middleware registry and drives
//! each dispatch through the tree.
//!
//! ## Forward walk
//!
//! Dispatching a path of length n visits depths `0..=n`. At each depth the
//! stack mounted at that prefix (if any) runs middleware by middleware; each
//! middleware gets the payload and a [`Next`] continuation. Calling
//! [`Next::proceed`] runs the next middleware, or moves to the next depth when
//! the stack is exhausted. After depth n the dispatch is done; nothing is
//! reported back to the caller.
//!
//! ```text
//! dispatch(["a","b","c"])
//!   []        → stack at root
//!   ["a"]     → stack at a
//!   ["a","b"] → (nothing mounted, skipped)
//!   ["a","b","c"] → stack at a/b/c
//! ```
//!
//! ## Recovery walk
//!
//! [`Next::fail`] stops the forward walk and wraps the error in a
//! [`crate::DispatchError`] recording the failing level and stack index.
//! Error middleware is then tried from the failing level towards the root:
//!
//! - [`Recover::delegate`] continues with the next shorter path that has an
//!   error middleware (at the root it ends recovery)
//! - [`Recover::handled`], or dropping the `Recover`, ends recovery
//! - if no error middleware exists between the failing level and the root the
//!   error is unrecoverable: it is logged and, by default, the engine panics
//!
//! ## Asynchronous middleware
//!
//! Continuations can be moved to another thread or `may` coroutine and
//! consumed later. The dispatch resumes on that thread. Internally every
//! dispatch is an explicit state machine driven in a loop, so synchronous
//! continuations do not grow the call stack.
//!
//! ## Example
//!
//! ```rust
//! use hstacks::{DispatchError, HStacks, Next, Recover};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let hits = Arc::new(AtomicUsize::new(0));
//! let stacks: HStacks<u32> = HStacks::new();
//!
//! let counter = Arc::clone(&hits);
//! stacks
//!     .mount(["api"], move |_: &u32, next: Next<u32>| {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!         next.proceed();
//!     })
//!     .mount(["api", "users"], |id: &u32, next: Next<u32>| {
//!         if *id == 0 {
//!             next.fail(anyhow::anyhow!("invalid id"));
//!         } else {
//!             next.proceed();
//!         }
//!     })
//!     .mount_error(["api"], |err: &DispatchError, recover: Recover<u32>| {
//!         assert_eq!(err.stack_index(), 0);
//!         recover.handled();
//!     });
//!
//! stacks.dispatch(["api", "users"], 42);
//! stacks.dispatch(["api", "users"], 0);
//! assert_eq!(hits.load(Ordering::SeqCst), 2);
//! ```

mod continuation;
mod core;
mod walk;

pub use self::core::HStacks;
pub use continuation::{Next, Recover};
pub use walk::UnrecoverableHook;
