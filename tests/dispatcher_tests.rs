//! Forward walk: which stacks run for a dispatch, and in what order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hstacks::{DispatchId, HStacks, Next, StackPath};

mod common;
use common::history::{record, History};
use common::tracing_util;

#[test]
fn test_runs_every_prefix_root_first() {
    tracing_util::init();
    let history = History::new();
    let stacks: HStacks<u32> = HStacks::new();
    stacks
        .mount(["a", "b", "c"], record(&history, "a/b/c"))
        .mount(["a"], record(&history, "a"))
        .mount(StackPath::root(), record(&history, "root"))
        .mount(["a", "b"], record(&history, "a/b"));

    stacks.dispatch(["a", "b", "c"], 1);

    assert_eq!(history.entries(), ["root", "a", "a/b", "a/b/c"]);
}

#[test]
fn test_stack_runs_in_mount_order() {
    let history = History::new();
    let stacks: HStacks<u32> = HStacks::new();
    for name in ["first", "second", "third"] {
        stacks.mount(["x"], record(&history, name));
    }

    stacks.dispatch(["x"], 0);

    assert_eq!(history.entries(), ["first", "second", "third"]);
}

#[test]
fn test_siblings_and_descendants_are_not_run() {
    let history = History::new();
    let stacks: HStacks<u32> = HStacks::new();
    stacks
        .mount(["a"], record(&history, "a"))
        .mount(["a", "b"], record(&history, "a/b"))
        .mount(["a", "c"], record(&history, "a/c"))
        .mount(["a", "b", "c", "d"], record(&history, "a/b/c/d"))
        .mount(["b"], record(&history, "b"));

    stacks.dispatch(["a", "b", "c"], 0);

    assert_eq!(history.entries(), ["a", "a/b"]);
}

#[test]
fn test_missing_and_error_only_levels_are_skipped() {
    let history = History::new();
    let stacks: HStacks<u32> = HStacks::new();
    stacks
        .mount(["a"], record(&history, "a"))
        .mount_error(["a", "b"], common::history::handle(&history, "unused"))
        .mount(["a", "b", "c", "d"], record(&history, "a/b/c/d"));

    stacks.dispatch(["a", "b", "c", "d"], 0);

    assert_eq!(history.entries(), ["a", "a/b/c/d"]);
}

#[test]
fn test_dispatch_with_nothing_mounted_is_a_no_op() {
    let stacks: HStacks<u32> = HStacks::new();
    stacks.dispatch(["nothing", "here"], 0);
    stacks.dispatch(StackPath::root(), 0);
    assert!(stacks.mounted_paths().is_empty());
}

#[test]
fn test_root_dispatch_runs_only_root_stack() {
    let history = History::new();
    let stacks: HStacks<u32> = HStacks::new();
    stacks
        .mount(StackPath::root(), record(&history, "root"))
        .mount(["a"], record(&history, "a"));

    stacks.dispatch(StackPath::root(), 0);

    assert_eq!(history.entries(), ["root"]);
}

#[test]
fn test_middleware_sees_payload() {
    let seen = History::new();
    let stacks: HStacks<String> = HStacks::new();
    let log = seen.clone();
    stacks.mount(["greet"], move |name: &String, next: Next<String>| {
        log.push(format!("hello {name}"));
        assert_eq!(next.payload(), name);
        next.proceed();
    });

    stacks.dispatch(["greet"], "world".to_string());

    assert_eq!(seen.entries(), ["hello world"]);
}

#[test]
fn test_payload_mutation_is_visible_downstream() {
    type Counter = Arc<AtomicUsize>;
    let stacks: HStacks<Counter> = HStacks::new();
    stacks
        .mount(["a"], |count: &Counter, next: Next<Counter>| {
            count.fetch_add(1, Ordering::SeqCst);
            next.proceed();
        })
        .mount(["a", "b"], |count: &Counter, next: Next<Counter>| {
            assert_eq!(count.load(Ordering::SeqCst), 1);
            count.fetch_add(10, Ordering::SeqCst);
            next.proceed();
        });

    let count = Counter::default();
    stacks.dispatch(["a", "b"], Arc::clone(&count));

    assert_eq!(count.load(Ordering::SeqCst), 11);
}

#[test]
fn test_not_calling_next_stops_the_dispatch() {
    tracing_util::init();
    let history = History::new();
    let stacks: HStacks<u32> = HStacks::new();
    let log = history.clone();
    stacks
        .mount(["a"], move |_: &u32, next: Next<u32>| {
            log.push("gate");
            drop(next);
        })
        .mount(["a"], record(&history, "after gate"))
        .mount(["a", "b"], record(&history, "a/b"));

    stacks.dispatch(["a", "b"], 0);

    assert_eq!(history.entries(), ["gate"]);
}

#[test]
fn test_next_reports_level_and_dispatch() {
    let history = History::new();
    let stacks: HStacks<u32> = HStacks::new();
    for path in [StackPath::root(), StackPath::from(["a"]), StackPath::from(["a", "b"])] {
        let log = history.clone();
        stacks.mount(&path, move |_: &u32, next: Next<u32>| {
            log.push(format!(
                "{} depth={} of {}",
                next.level(),
                next.depth(),
                next.dispatch_path()
            ));
            next.proceed();
        });
    }

    stacks.dispatch(["a", "b"], 0);

    assert_eq!(
        history.entries(),
        ["/ depth=0 of /a/b", "/a depth=1 of /a/b", "/a/b depth=2 of /a/b"]
    );
}

#[test]
fn test_dispatch_id_is_shared_by_all_middleware() {
    let ids = Arc::new(parking_lot::Mutex::new(Vec::<DispatchId>::new()));
    let stacks: HStacks<u32> = HStacks::new();
    for path in [["a"].as_slice(), ["a", "b"].as_slice()] {
        let ids = Arc::clone(&ids);
        stacks.mount(path, move |_: &u32, next: Next<u32>| {
            ids.lock().push(next.dispatch_id());
            next.proceed();
        });
    }

    let first = stacks.dispatch(["a", "b"], 0);
    let second = stacks.dispatch(["a", "b"], 0);

    let ids = ids.lock();
    assert_eq!(*ids, [first, first, second, second]);
    assert_ne!(first, second);
}

#[test]
fn test_context_is_shared_with_middleware() {
    struct AppContext {
        name: &'static str,
    }

    let history = History::new();
    let log = history.clone();
    let stacks: HStacks<u32, AppContext> =
        HStacks::new().with_context(AppContext { name: "billing" });
    stacks.mount(["a"], move |_: &u32, next: Next<u32, AppContext>| {
        let name = next.context().map(|ctx| ctx.name).unwrap_or("none");
        log.push(name);
        next.proceed();
    });

    stacks.dispatch(["a"], 0);

    assert_eq!(history.entries(), ["billing"]);
}

#[test]
fn test_context_is_absent_by_default() {
    let stacks: HStacks<u32> = HStacks::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    stacks.mount(["a"], move |_: &u32, next: Next<u32>| {
        assert!(next.context().is_none());
        counter.fetch_add(1, Ordering::SeqCst);
        next.proceed();
    });

    stacks.dispatch(["a"], 0);

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_same_instance_mounted_at_several_paths() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let shared: hstacks::registry::MiddlewareRef<u32, ()> =
        Arc::new(move |_: &u32, next: Next<u32>| {
            counter.fetch_add(1, Ordering::SeqCst);
            next.proceed();
        });

    let stacks: HStacks<u32> = HStacks::new();
    stacks
        .mount_shared(["a"], Arc::clone(&shared))
        .mount_shared(["a", "b"], Arc::clone(&shared))
        .mount_shared(["a", "b"], Arc::clone(&shared));

    stacks.dispatch(["a", "b"], 0);

    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[test]
fn test_long_stack_does_not_grow_the_call_stack() {
    const MIDDLEWARE: usize = 5_000;

    let hits = Arc::new(AtomicUsize::new(0));
    let stacks: HStacks<u32> = HStacks::new();
    for depth in 0..4 {
        let path: StackPath = (0..depth).map(|i| format!("s{i}")).collect();
        for _ in 0..MIDDLEWARE / 4 {
            let counter = Arc::clone(&hits);
            stacks.mount(&path, move |_: &u32, next: Next<u32>| {
                counter.fetch_add(1, Ordering::SeqCst);
                next.proceed();
            });
        }
    }
    let stacks = Arc::new(stacks);

    // A recursive continuation chain of this length would overflow a small
    // thread stack.
    let worker = Arc::clone(&stacks);
    std::thread::Builder::new()
        .stack_size(256 * 1024)
        .spawn(move || {
            worker.dispatch(["s0", "s1", "s2"], 0);
        })
        .expect("spawn dispatch thread")
        .join()
        .expect("dispatch thread finished");

    assert_eq!(hits.load(Ordering::SeqCst), MIDDLEWARE);
}

#[test]
fn test_struct_middleware() {
    struct Tag {
        history: History,
        tag: &'static str,
    }

    impl hstacks::Middleware<u32> for Tag {
        fn handle(&self, payload: &u32, next: Next<u32>) {
            self.history.push(format!("{}:{payload}", self.tag));
            next.proceed();
        }
    }

    let history = History::new();
    let stacks: HStacks<u32> = HStacks::new();
    stacks
        .mount(["a"], Tag { history: history.clone(), tag: "outer" })
        .mount(["a", "b"], Tag { history: history.clone(), tag: "inner" });

    stacks.dispatch(["a", "b"], 5);

    assert_eq!(history.entries(), ["outer:5", "inner:5"]);
}
