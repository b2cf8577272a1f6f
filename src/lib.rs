//! # hstacks
//!
//! **hstacks** runs middleware stacks mounted on a tree of paths. Middleware
//! mounted at a short path (`["a"]`) applies to every dispatch below it
//! (`["a", "b", "c"]`), the way router middleware applies to every route, but
//! at every level of the tree.
//!
//! ## Overview
//!
//! - Mount middleware at paths with [`HStacks::mount`]; each path holds an
//!   ordered stack
//! - Mount one error middleware per path with [`HStacks::mount_error`]
//! - [`HStacks::dispatch`] runs the stacks of every prefix of a path, root
//!   first, each in mount order, with explicit continuation control
//!   ([`Next`])
//! - A failure walks back from the failing level towards the root looking for
//!   error middleware ([`Recover`]); an error nobody consumes is loud
//!
//! ## Architecture
//!
//! - **[`path`]** - [`StackPath`], the segment sequence addressing a level
//! - **[`tree`]** - exact-match prefix tree storage
//! - **[`registry`]** - path → [`registry::StackEntry`] store
//! - **[`middleware`]** - [`Middleware`] and [`ErrorMiddleware`] traits
//! - **[`dispatcher`]** - [`HStacks`], the forward and recovery walks
//! - **[`runtime_config`]** - environment based configuration
//! - **[`logging`]** - `tracing` subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use hstacks::{HStacks, Next};
//! use std::sync::{Arc, Mutex};
//!
//! type Log = Arc<Mutex<Vec<&'static str>>>;
//!
//! fn record(name: &'static str) -> impl Fn(&Log, Next<Log>) + Send + Sync + 'static {
//!     move |log: &Log, next: Next<Log>| {
//!         log.lock().unwrap().push(name);
//!         next.proceed();
//!     }
//! }
//!
//! let stacks: HStacks<Log> = HStacks::new();
//! stacks
//!     .mount(["a"], record("a"))
//!     .mount(["a", "b"], record("a/b"))
//!     .mount(["a", "c"], record("a/c"))
//!     .mount(["a", "b", "c"], record("a/b/c"));
//!
//! let log = Log::default();
//! stacks.dispatch(["a", "b", "c"], Arc::clone(&log));
//! // ["a", "c"] is not a prefix of the dispatched path
//! assert_eq!(*log.lock().unwrap(), ["a", "a/b", "a/b/c"]);
//! ```
//!
//! ## Unrecoverable errors
//!
//! If a middleware fails and no error middleware exists between the failing
//! level and the root, the error is logged and the engine panics (or aborts,
//! or calls a hook installed with [`HStacks::on_unrecoverable`]). Mount an
//! error middleware at the root path to make every error recoverable.

pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod path;
pub mod registry;
pub mod runtime_config;
pub mod tree;

pub use dispatcher::{HStacks, Next, Recover};
pub use error::{DispatchError, UnrecoverablePolicy};
pub use ids::DispatchId;
pub use middleware::{ErrorMiddleware, Middleware};
pub use path::StackPath;
pub use runtime_config::RuntimeConfig;
