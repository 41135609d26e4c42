//! Test utilities shared by the integration tests
//!
//! Provides a history whose entries stay observable after the router takes
//! ownership, loaders that settle only when the test says so, and a few
//! router fixtures.

#![allow(dead_code)]

use data_navigator::history::{HistoryListener, Unlisten};
use data_navigator::*;
use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

/// Route log output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// History
// ============================================================================

/// A [`MemoryHistory`] the test keeps a handle to.
#[derive(Clone, Default)]
pub struct SharedHistory(pub Rc<RefCell<MemoryHistory>>);

impl SharedHistory {
    pub fn new(entries: &[&str]) -> Self {
        Self(Rc::new(RefCell::new(MemoryHistory::new(entries.iter().copied(), None))))
    }

    pub fn pathnames(&self) -> Vec<String> {
        self.0
            .borrow()
            .entries()
            .iter()
            .map(|l| l.pathname.clone())
            .collect()
    }

    pub fn index(&self) -> usize {
        self.0.borrow().index()
    }

    pub fn document_navigations(&self) -> Vec<(String, bool)> {
        self.0.borrow().document_navigations().to_vec()
    }
}

impl History for SharedHistory {
    fn action(&self) -> HistoryAction {
        self.0.borrow().action()
    }

    fn location(&self) -> Location {
        self.0.borrow().location()
    }

    fn push(&mut self, location: &Location) {
        self.0.borrow_mut().push(location);
    }

    fn replace(&mut self, location: &Location) {
        self.0.borrow_mut().replace(location);
    }

    fn go(&mut self, delta: isize) {
        self.0.borrow_mut().go(delta);
    }

    fn listen(&mut self, listener: HistoryListener) -> Unlisten {
        self.0.borrow_mut().listen(listener)
    }

    fn navigate_document(&mut self, url: &str, replace: bool) {
        self.0.borrow_mut().navigate_document(url, replace);
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Loader or action whose calls stay pending until released.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Rc<RefCell<GateInner>>,
}

#[derive(Default)]
struct GateInner {
    calls: Vec<String>,
    waiting: Vec<(String, oneshot::Sender<HandlerResult>)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler closure to hand to [`Route::loader`] or [`Route::action`].
    pub fn handler(&self) -> impl Fn(HandlerArgs) -> LocalBoxFuture<'static, HandlerResult> + 'static {
        let inner = self.inner.clone();
        move |args: HandlerArgs| {
            let (tx, rx) = oneshot::channel();
            let href = match args.request.url.query() {
                Some(query) => format!("{}?{}", args.request.url.path(), query),
                None => args.request.url.path().to_string(),
            };
            let mut inner = inner.borrow_mut();
            inner.calls.push(href.clone());
            inner.waiting.push((href, tx));
            async move { rx.await.unwrap_or_else(|_| Err(RouteError::msg("gate dropped"))) }.boxed_local()
        }
    }

    /// URLs this gate was called with, in order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.borrow().calls.clone()
    }

    pub fn pending(&self) -> usize {
        self.inner.borrow().waiting.len()
    }

    /// Settle the oldest pending call for `href`.
    pub fn release(&self, href: &str, result: HandlerResult) {
        let mut inner = self.inner.borrow_mut();
        let index = inner
            .waiting
            .iter()
            .position(|(h, _)| h == href)
            .unwrap_or_else(|| panic!("no pending call for '{}'", href));
        let (_, tx) = inner.waiting.remove(index);
        let _ = tx.send(result);
    }

    pub fn release_data(&self, href: &str, value: Value) {
        self.release(href, Ok(HandlerValue::Data(value)));
    }
}

/// Loader that records its calls and returns `value` immediately.
#[derive(Clone, Default)]
pub struct Counter {
    calls: Rc<RefCell<Vec<String>>>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(&self, value: Value) -> impl Fn(HandlerArgs) -> LocalBoxFuture<'static, HandlerResult> + 'static {
        let calls = self.calls.clone();
        move |args: HandlerArgs| {
            calls.borrow_mut().push(args.request.url.path().to_string());
            let value = value.clone();
            async move { Ok(HandlerValue::Data(value)) }.boxed_local()
        }
    }

    pub fn count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

// ============================================================================
// Router fixtures
// ============================================================================

/// A router plus the executor and history the test drives it with.
pub struct Harness {
    pub router: Router,
    pub history: SharedHistory,
    pub pool: LocalPool,
}

impl Harness {
    pub fn new(routes: Vec<Route>, entries: &[&str]) -> Self {
        Self::with_init(routes, entries, |init| init)
    }

    pub fn with_init(
        routes: Vec<Route>,
        entries: &[&str],
        configure: impl FnOnce(RouterInit) -> RouterInit,
    ) -> Self {
        init_logging();
        let pool = LocalPool::new();
        let history = SharedHistory::new(entries);
        let init = RouterInit::new(routes, history.clone()).spawner(pool.spawner());
        let router = Router::new(configure(init)).expect("valid routes");
        Self {
            router,
            history,
            pool,
        }
    }

    /// Spawn `fut` on the pool without waiting for it.
    pub fn spawn(&self, fut: impl Future<Output = Result<(), RouterError>> + 'static) {
        use futures::task::LocalSpawnExt;
        self.pool
            .spawner()
            .spawn_local(async move {
                fut.await.expect("router operation failed");
            })
            .expect("spawn");
    }

    /// Run everything that can make progress.
    pub fn settle(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Spawn `fut` and settle.
    pub fn run(&mut self, fut: impl Future<Output = Result<(), RouterError>> + 'static) {
        self.spawn(fut);
        self.settle();
    }

    pub fn initialize(&mut self) {
        let router = self.router.clone();
        self.run(async move { router.initialize().await });
    }

    pub fn navigate(&mut self, to: &str) {
        self.navigate_with(to, NavigateOptions::default());
    }

    pub fn navigate_with(&mut self, to: &str, opts: NavigateOptions) {
        let router = self.router.clone();
        let to = to.to_string();
        self.run(async move { router.navigate(to, opts).await });
    }

    pub fn state(&self) -> Rc<RouterState> {
        self.router.state()
    }
}

/// Collects every published snapshot.
pub fn record_states(router: &Router) -> Rc<RefCell<Vec<(RouterState, StateMetadata)>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    // Dropping the handle keeps the subscription alive.
    let _subscription = router.subscribe(move |state, meta| {
        sink.borrow_mut().push((state.clone(), meta.clone()));
    });
    seen
}
