//! # Middleware Module
//!
//! Traits implemented by everything that can be mounted in an
//! [`crate::HStacks`] tree.
//!
//! - [`Middleware`]: a regular stack entry, invoked with the payload and a
//!   [`crate::Next`] continuation
//! - [`ErrorMiddleware`]: the per-path error handler, invoked with the
//!   [`crate::DispatchError`] and a [`crate::Recover`] continuation
//!
//! Both are implemented for plain closures with the matching signature.
//! Stateful middleware (counters, caches) implements the trait on a struct.

mod core;

pub use self::core::{ErrorMiddleware, Middleware};
