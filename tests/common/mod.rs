#![allow(dead_code)]

pub mod history {
    use hstacks::{DispatchError, Next, Recover};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Ordered record of which middleware ran, shared between the test and
    /// the middleware it mounts.
    #[derive(Clone, Default)]
    pub struct History(Arc<Mutex<Vec<String>>>);

    impl History {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, entry: impl Into<String>) {
            self.0.lock().push(entry.into());
        }

        pub fn entries(&self) -> Vec<String> {
            self.0.lock().clone()
        }

        pub fn len(&self) -> usize {
            self.0.lock().len()
        }
    }

    // Helpers are written for the `u32` payload used across the test suites.

    /// Middleware that records `name` and proceeds.
    pub fn record(history: &History, name: &str) -> impl Fn(&u32, Next<u32>) + Send + Sync + 'static {
        let history = history.clone();
        let name = name.to_string();
        move |_: &u32, next: Next<u32>| {
            history.push(name.clone());
            next.proceed();
        }
    }

    /// Middleware that records `name` and fails with `message`.
    pub fn fail_with(
        history: &History,
        name: &str,
        message: &'static str,
    ) -> impl Fn(&u32, Next<u32>) + Send + Sync + 'static {
        let history = history.clone();
        let name = name.to_string();
        move |_: &u32, next: Next<u32>| {
            history.push(name.clone());
            next.fail(anyhow::anyhow!(message));
        }
    }

    /// Error middleware that records `name` and delegates upwards.
    pub fn delegate(
        history: &History,
        name: &str,
    ) -> impl Fn(&DispatchError, Recover<u32>) + Send + Sync + 'static {
        let history = history.clone();
        let name = name.to_string();
        move |_: &DispatchError, recover: Recover<u32>| {
            history.push(name.clone());
            recover.delegate();
        }
    }

    /// Error middleware that records `name` and marks the error handled.
    pub fn handle(
        history: &History,
        name: &str,
    ) -> impl Fn(&DispatchError, Recover<u32>) + Send + Sync + 'static {
        let history = history.clone();
        let name = name.to_string();
        move |_: &DispatchError, recover: Recover<u32>| {
            history.push(name.clone());
            recover.handled();
        }
    }
}

pub mod tracing_util {
    use tracing_subscriber::EnvFilter;

    /// Install a test subscriber once per test binary. `RUST_LOG` controls
    /// verbosity; output is captured by the test harness.
    pub fn init() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

pub mod panics {
    use std::any::Any;

    /// Text of a panic payload produced by `panic!` with a formatted message.
    pub fn message(payload: &(dyn Any + Send)) -> String {
        if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else {
            String::from("<non-string panic payload>")
        }
    }
}
