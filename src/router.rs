//! The navigation controller.
//!
//! A [`Router`] owns the route tree, the history collaborator and the one
//! [`RouterState`] snapshot. Every public operation funnels through it:
//! navigations, fetchers, blockers, revalidation and route patching.
//!
//! The router is single threaded. Its futures are `!Send` and must be polled
//! on a local executor (a `LocalPool`, a current-thread runtime with a
//! `LocalSet`, or simply `block_on`). Several router futures may be in flight
//! at once; they interleave at handler await points and never commit stale
//! results.
//!
//! # Example
//!
//! ```
//! use data_navigator::{HandlerValue, MemoryHistory, NavigateOptions, Route, Router, RouterInit};
//! use serde_json::json;
//!
//! let routes = vec![Route::new("/").id("root").children(vec![
//!     Route::new("users/:id").id("user").loader(|args| async move {
//!         Ok(HandlerValue::Data(json!({ "id": args.params.get("id") })))
//!     }),
//! ])];
//!
//! let router = Router::new(RouterInit::new(routes, MemoryHistory::default())).unwrap();
//! pollster::block_on(async {
//!     router.initialize().await.unwrap();
//!     router.navigate("/users/7", NavigateOptions::default()).await.unwrap();
//! });
//!
//! let state = router.state();
//! assert_eq!(state.location.pathname, "/users/7");
//! assert_eq!(state.loader_value("user"), Some(&json!({ "id": "7" })));
//! ```

use crate::abort::AbortController;
use crate::blocker::BlockerRegistry;
use crate::deferred::DeferredData;
use crate::discovery::PatchRoutesOnNavigation;
use crate::error::{InternalError, RouterError};
use crate::fetcher::FetcherRegistry;
use crate::history::{History, HistoryAction, HistoryListener, HistoryUpdate, Unlisten};
use crate::matching::{match_branches, RouteMatch};
use crate::navigation::{short_circuit_matches, StartOptions};
use crate::path::Path;
use crate::route::{Route, RouteTree};
use crate::state::{
    Fetcher, HydrationData, LoaderData, Navigation, RevalidationState, RouterState, StateMetadata,
};
use crate::submission::SubmitOptions;
use crate::{debug_log, error_log, info_log, warn_log};
use futures::task::{LocalSpawn, LocalSpawnExt};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

#[cfg(feature = "cache")]
use crate::cache::MatchCache;

// ============================================================================
// Configuration
// ============================================================================

/// Everything needed to construct a [`Router`].
///
/// ```
/// use data_navigator::{MemoryHistory, Route, RouterInit};
///
/// let init = RouterInit::new(vec![Route::new("/")], MemoryHistory::new(["/app"], None))
///     .basename("/app")
///     .persist_fetchers(true);
/// # let _ = init;
/// ```
pub struct RouterInit {
    routes: Vec<Route>,
    history: Box<dyn History>,
    basename: String,
    hydration_data: Option<HydrationData>,
    persist_fetchers: bool,
    spawner: Option<Rc<dyn LocalSpawn>>,
    patch_routes_on_navigation: Option<PatchRoutesOnNavigation>,
    match_cache_capacity: Option<usize>,
}

impl RouterInit {
    pub fn new(routes: Vec<Route>, history: impl History + 'static) -> Self {
        Self {
            routes,
            history: Box::new(history),
            basename: "/".to_string(),
            hydration_data: None,
            persist_fetchers: false,
            spawner: None,
            patch_routes_on_navigation: None,
            match_cache_capacity: None,
        }
    }

    /// Mount point of the app; locations outside it never match.
    pub fn basename(mut self, basename: impl Into<String>) -> Self {
        let basename = basename.into();
        self.basename = if basename.is_empty() {
            "/".to_string()
        } else {
            basename
        };
        self
    }

    /// Data loaded before the router existed. When present, the initial
    /// load only runs loaders that have no data yet.
    pub fn hydration_data(mut self, data: HydrationData) -> Self {
        self.hydration_data = Some(data);
        self
    }

    /// Keep idle fetchers until [`Router::delete_fetcher`] even when no
    /// caller holds them.
    pub fn persist_fetchers(mut self, persist: bool) -> Self {
        self.persist_fetchers = persist;
        self
    }

    /// Spawner for background work: history POP events and deferred
    /// settlement. Without one the host must call
    /// [`Router::flush_history_updates`] and drive deferred data itself.
    pub fn spawner(mut self, spawner: impl LocalSpawn + 'static) -> Self {
        self.spawner = Some(Rc::new(spawner));
        self
    }

    /// Callback asked to add routes when a path does not match fully.
    pub fn patch_routes_on_navigation(mut self, callback: PatchRoutesOnNavigation) -> Self {
        self.patch_routes_on_navigation = Some(callback);
        self
    }

    /// Capacity of the match cache; `0` disables it.
    pub fn match_cache_capacity(mut self, capacity: usize) -> Self {
        self.match_cache_capacity = Some(capacity);
        self
    }
}

impl fmt::Debug for RouterInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterInit")
            .field("routes", &self.routes)
            .field("basename", &self.basename)
            .field("persist_fetchers", &self.persist_fetchers)
            .field("spawner", &self.spawner.is_some())
            .finish()
    }
}

// ============================================================================
// Navigation requests
// ============================================================================

/// Where to navigate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum To {
    /// An absolute or relative path, with optional search and hash.
    Path(String),
    /// Traverse history by this many entries.
    Delta(isize),
}

impl From<&str> for To {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for To {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<&String> for To {
    fn from(path: &String) -> Self {
        Self::Path(path.clone())
    }
}

/// Options for [`Router::navigate`].
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    /// `Some(true)` replaces, `Some(false)` pushes; `None` pushes except for
    /// mutations submitted to the current location.
    pub replace: Option<bool>,
    /// Caller state stored on the new history entry.
    pub state: Option<Value>,
    pub submission: Option<SubmitOptions>,
    pub prevent_scroll_reset: bool,
    /// Resolve relative paths from this route instead of the deepest match.
    pub from_route_id: Option<String>,
    /// `..` removes URL segments instead of matched routes.
    pub path_relative: bool,
    /// Ask subscribers to flush the first update synchronously.
    pub flush_sync: bool,
}

impl NavigateOptions {
    pub fn replace(mut self) -> Self {
        self.replace = Some(true);
        self
    }

    pub fn submit(mut self, submission: SubmitOptions) -> Self {
        self.submission = Some(submission);
        self
    }

    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    pub fn from_route(mut self, route_id: impl Into<String>) -> Self {
        self.from_route_id = Some(route_id.into());
        self
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Callback receiving every published snapshot.
pub type Subscriber = Rc<dyn Fn(&RouterState, &StateMetadata)>;

/// Handle returned by [`Router::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    inner: Weak<RouterInner>,
}

impl Subscription {
    /// Stop receiving updates.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.subscribers.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

// ============================================================================
// Internals
// ============================================================================

/// Mutable bookkeeping that is not part of the published state.
pub(crate) struct Core {
    pub routes: RouteTree,
    #[cfg(feature = "cache")]
    pub match_cache: Option<MatchCache>,
    pub basename: String,
    pub pending_navigation_controller: Option<AbortController>,
    /// History action of the navigation in flight.
    pub pending_action: HistoryAction,
    pub pending_prevent_scroll_reset: bool,
    /// A revalidation of the current location; history is left alone.
    pub is_uninterrupted_revalidation: bool,
    /// A mutation completed; loaders default to revalidating.
    pub is_revalidation_required: bool,
    /// Explicit revalidation; every loader reruns.
    pub force_revalidation: bool,
    /// Routes whose deferred data was cancelled before it settled.
    pub cancelled_deferred_routes: Vec<String>,
    pub active_deferreds: HashMap<String, DeferredData>,
    pub incrementing_load_id: u64,
    pub pending_navigation_load_id: Option<u64>,
    /// Redirects followed since the last navigation the app started.
    pub redirect_depth: usize,
    pub fetchers: FetcherRegistry,
    pub blockers: BlockerRegistry,
    /// Skip the next POP (it undoes a blocked POP).
    pub ignore_next_history_update: bool,
    pub persist_fetchers: bool,
    pub disposed: bool,
}

pub(crate) struct RouterInner {
    pub state: RefCell<Rc<RouterState>>,
    pub core: RefCell<Core>,
    pub history: RefCell<Box<dyn History>>,
    pub subscribers: RefCell<Vec<(u64, Subscriber)>>,
    pub next_subscriber: Cell<u64>,
    pub pending_pops: RefCell<VecDeque<HistoryUpdate>>,
    pub spawner: Option<Rc<dyn LocalSpawn>>,
    pub patch_routes_on_navigation: Option<PatchRoutesOnNavigation>,
    pub unlisten: RefCell<Option<Unlisten>>,
}

// ============================================================================
// Router
// ============================================================================

/// The navigation controller. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Router {
    pub(crate) inner: Rc<RouterInner>,
}

impl Router {
    /// Build a router from its configuration.
    ///
    /// The initial state reflects the history's current location. Call
    /// [`initialize`](Self::initialize) to start listening and to run the
    /// initial data load.
    pub fn new(init: RouterInit) -> Result<Self, RouterError> {
        let routes = RouteTree::new(init.routes)?;
        let location = init.history.location();
        let history_action = init.history.action();

        let mut initial_matches =
            match_branches(routes.branches(), &location.pathname, &init.basename, false);
        let mut initial_errors = HashMap::new();
        if initial_matches.is_none() && init.patch_routes_on_navigation.is_none() {
            let (matches, route_id) = short_circuit_matches(routes.roots());
            initial_errors.insert(
                route_id,
                InternalError::NotFound {
                    pathname: location.pathname.clone(),
                }
                .into(),
            );
            initial_matches = Some(matches);
        }
        // A dynamic match may only exist because better routes were not
        // discovered yet.
        if init.hydration_data.is_none() && init.patch_routes_on_navigation.is_some() {
            let dynamic = initial_matches
                .as_ref()
                .and_then(|m| m.first())
                .is_some_and(|m| !m.params.is_empty());
            if dynamic {
                initial_matches = None;
            }
        }

        let initialized = match &initial_matches {
            None => false,
            Some(matches) if matches.iter().any(|m| m.route.is_lazy_pending()) => false,
            Some(matches) if !matches.iter().any(|m| m.route.has_loader()) => true,
            Some(matches) => init.hydration_data.as_ref().is_some_and(|data| {
                matches.iter().all(|m| {
                    !m.route.has_loader()
                        || data.loader_data.contains_key(m.route_id())
                        || data.errors.contains_key(m.route_id())
                })
            }),
        };

        let (loader_data, action_data, errors) = match init.hydration_data {
            Some(data) => (
                data.loader_data
                    .into_iter()
                    .map(|(id, value)| (id, Some(LoaderData::Value(value))))
                    .collect(),
                data.action_data,
                data.errors,
            ),
            None => (HashMap::new(), HashMap::new(), initial_errors),
        };

        let state = RouterState {
            history_action,
            location,
            matches: initial_matches.unwrap_or_default(),
            initialized,
            navigation: Navigation::Idle,
            revalidation: RevalidationState::Idle,
            loader_data,
            action_data,
            errors,
            fetchers: HashMap::new(),
            blockers: HashMap::new(),
            prevent_scroll_reset: false,
        };

        #[cfg(feature = "cache")]
        let match_cache = match init.match_cache_capacity {
            Some(0) => None,
            Some(capacity) => Some(MatchCache::with_capacity(capacity)),
            None => Some(MatchCache::new()),
        };

        debug_log!(
            "Router created at '{}' (initialized: {})",
            state.location.href(),
            state.initialized
        );

        Ok(Self {
            inner: Rc::new(RouterInner {
                state: RefCell::new(Rc::new(state)),
                core: RefCell::new(Core {
                    routes,
                    #[cfg(feature = "cache")]
                    match_cache,
                    basename: init.basename,
                    pending_navigation_controller: None,
                    pending_action: HistoryAction::Pop,
                    pending_prevent_scroll_reset: false,
                    is_uninterrupted_revalidation: false,
                    is_revalidation_required: false,
                    force_revalidation: false,
                    cancelled_deferred_routes: Vec::new(),
                    active_deferreds: HashMap::new(),
                    incrementing_load_id: 0,
                    pending_navigation_load_id: None,
                    redirect_depth: 0,
                    fetchers: FetcherRegistry::default(),
                    blockers: BlockerRegistry::default(),
                    ignore_next_history_update: false,
                    persist_fetchers: init.persist_fetchers,
                    disposed: false,
                }),
                history: RefCell::new(init.history),
                subscribers: RefCell::new(Vec::new()),
                next_subscriber: Cell::new(0),
                pending_pops: RefCell::new(VecDeque::new()),
                spawner: init.spawner,
                patch_routes_on_navigation: init.patch_routes_on_navigation,
                unlisten: RefCell::new(None),
            }),
        })
    }

    /// Start listening to history and run the initial load if needed.
    pub async fn initialize(&self) -> Result<(), RouterError> {
        self.ensure_active()?;
        let weak = Rc::downgrade(&self.inner);
        let listener: HistoryListener = Rc::new(move |update: &HistoryUpdate| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.pending_pops.borrow_mut().push_back(update.clone());
            if let Some(spawner) = inner.spawner.clone() {
                let router = Router { inner };
                let task = router.clone();
                router.spawn_on(&spawner, async move {
                    if let Err(err) = task.flush_history_updates().await {
                        error_log!("History navigation failed: {}", err);
                    }
                });
            }
        });
        let unlisten = self.inner.history.borrow_mut().listen(listener);
        if let Some(previous) = self.inner.unlisten.borrow_mut().replace(unlisten) {
            previous.unlisten();
        }

        let state = self.state();
        if state.initialized {
            return Ok(());
        }
        info_log!("Initial load of '{}'", state.location.href());
        self.start_navigation(
            HistoryAction::Pop,
            state.location.clone(),
            StartOptions {
                initial_hydration: true,
                ..StartOptions::default()
            },
        )
        .await
    }

    /// Stop listening, abort everything in flight and drop subscribers.
    pub fn dispose(&self) {
        let unlisten = self.inner.unlisten.borrow_mut().take();
        if let Some(unlisten) = unlisten {
            unlisten.unlisten();
        }
        self.inner.subscribers.borrow_mut().clear();
        self.inner.pending_pops.borrow_mut().clear();

        let (navigation, fetchers, deferreds) = {
            let mut core = self.inner.core.borrow_mut();
            core.disposed = true;
            core.blockers = BlockerRegistry::default();
            let fetchers: Vec<AbortController> =
                core.fetchers.controllers.drain().map(|(_, c)| c).collect();
            core.fetchers = FetcherRegistry::default();
            let deferreds: Vec<DeferredData> =
                core.active_deferreds.drain().map(|(_, d)| d).collect();
            (core.pending_navigation_controller.take(), fetchers, deferreds)
        };
        if let Some(controller) = navigation {
            controller.abort();
        }
        for controller in fetchers {
            controller.abort();
        }
        for deferred in deferreds {
            deferred.cancel();
        }
        self.update_state(false, |state| {
            state.fetchers.clear();
            state.blockers.clear();
        });
        info_log!("Router disposed");
    }

    /// The current snapshot.
    pub fn state(&self) -> Rc<RouterState> {
        self.inner.state.borrow().clone()
    }

    /// Call `f` with every published snapshot.
    pub fn subscribe(&self, f: impl Fn(&RouterState, &StateMetadata) + 'static) -> Subscription {
        let id = self.inner.next_subscriber.get();
        self.inner.next_subscriber.set(id + 1);
        self.inner.subscribers.borrow_mut().push((id, Rc::new(f)));
        Subscription {
            id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Navigate to a path, or traverse history.
    ///
    /// Resolves once the navigation committed, was blocked, or was
    /// superseded by a newer one. Handler failures never surface here; they
    /// land in [`RouterState::errors`].
    pub async fn navigate(&self, to: impl Into<To>, opts: NavigateOptions) -> Result<(), RouterError> {
        self.ensure_active()?;
        match to.into() {
            To::Delta(delta) => {
                self.inner.history.borrow_mut().go(delta);
                self.flush_history_updates().await
            }
            To::Path(path) => self.navigate_to(path, opts).await,
        }
    }

    /// Revalidate every loader of the current (or in-flight) location.
    pub async fn revalidate(&self) -> Result<(), RouterError> {
        self.ensure_active()?;
        self.interrupt_active_loads();
        self.inner.core.borrow_mut().force_revalidation = true;
        self.update_state(false, |state| {
            state.revalidation = RevalidationState::Loading;
        });
        let state = self.state();
        debug_log!("Revalidating '{}'", state.location.href());
        match &state.navigation {
            // The action's loader phase revalidates anyway.
            Navigation::Submitting { .. } => Ok(()),
            Navigation::Idle => {
                self.start_navigation(
                    state.history_action,
                    state.location.clone(),
                    StartOptions {
                        start_uninterrupted_revalidation: true,
                        ..StartOptions::default()
                    },
                )
                .await
            }
            Navigation::Loading { location, .. } => {
                let action = self.inner.core.borrow().pending_action;
                self.start_navigation(
                    action,
                    location.clone(),
                    StartOptions {
                        override_navigation: Some(state.navigation.clone()),
                        ..StartOptions::default()
                    },
                )
                .await
            }
        }
    }

    /// Process POP events the history reported.
    ///
    /// Runs automatically when a spawner is configured.
    pub async fn flush_history_updates(&self) -> Result<(), RouterError> {
        loop {
            let update = self.inner.pending_pops.borrow_mut().pop_front();
            let Some(update) = update else {
                return Ok(());
            };
            self.handle_pop(update).await?;
        }
    }

    /// Add routes under `parent_id` (top level when `None`) and republish
    /// the state.
    pub fn patch_routes(&self, parent_id: Option<&str>, routes: Vec<Route>) -> Result<usize, RouterError> {
        let added = self.patch_tree(parent_id, routes)?;
        self.update_state(false, |_| {});
        Ok(added)
    }

    /// Href for a path, as the history renders it.
    pub fn create_href(&self, to: &Path) -> String {
        self.inner.history.borrow().create_href(to)
    }

    /// Path as the history would store it.
    pub fn encode_location(&self, to: &Path) -> Path {
        self.inner.history.borrow().encode_location(to)
    }

    /// The configured basename.
    pub fn basename(&self) -> String {
        self.inner.core.borrow().basename.clone()
    }

    /// Match counters, when the match cache is enabled.
    #[cfg(feature = "cache")]
    pub fn match_cache_stats(&self) -> Option<crate::cache::CacheStats> {
        self.inner
            .core
            .borrow()
            .match_cache
            .as_ref()
            .map(|cache| cache.stats().clone())
    }

    // ------------------------------------------------------------------------
    // Crate internals
    // ------------------------------------------------------------------------

    pub(crate) fn ensure_active(&self) -> Result<(), RouterError> {
        if self.inner.core.borrow().disposed {
            Err(RouterError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Publish a new snapshot built from the current one.
    pub(crate) fn update_state(&self, flush_sync: bool, f: impl FnOnce(&mut RouterState)) {
        self.update_state_with(flush_sync, Vec::new(), f);
    }

    /// [`update_state`](Self::update_state), reporting `deleted` fetcher keys
    /// on top of the ones garbage-collected by this commit.
    pub(crate) fn update_state_with(
        &self,
        flush_sync: bool,
        mut deleted: Vec<String>,
        f: impl FnOnce(&mut RouterState),
    ) {
        let snapshot = {
            let mut core = self.inner.core.borrow_mut();
            let mut current = self.inner.state.borrow_mut();
            let mut next = RouterState::clone(&current);
            f(&mut next);

            let mut settled: Vec<String> = core
                .fetchers
                .deleted
                .iter()
                .filter(|key| next.fetchers.get(*key).map_or(true, Fetcher::is_idle))
                .cloned()
                .collect();
            settled.sort();
            for key in settled {
                next.fetchers.remove(&key);
                core.fetchers.forget(&key, None);
                deleted.push(key);
            }

            let snapshot = Rc::new(next);
            *current = snapshot.clone();
            snapshot
        };

        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        let metadata = StateMetadata {
            deleted_fetchers: deleted,
            flush_sync,
        };
        for subscriber in subscribers {
            subscriber(&snapshot, &metadata);
        }
    }

    /// Match a pathname against the full route tree.
    pub(crate) fn match_location(&self, pathname: &str) -> Option<Vec<RouteMatch>> {
        let mut guard = self.inner.core.borrow_mut();
        let core = &mut *guard;
        #[cfg(feature = "cache")]
        if let Some(cache) = core.match_cache.as_mut() {
            if let Some(hit) = cache.get(pathname) {
                return hit;
            }
        }
        let matches = match_branches(core.routes.branches(), pathname, &core.basename, false);
        #[cfg(feature = "cache")]
        if let Some(cache) = core.match_cache.as_mut() {
            cache.insert(pathname.to_string(), matches.clone());
        }
        matches
    }

    /// Partial match used while routes are being discovered.
    pub(crate) fn match_partial(&self, pathname: &str) -> Option<Vec<RouteMatch>> {
        let core = self.inner.core.borrow();
        match_branches(core.routes.branches(), pathname, &core.basename, true)
    }

    pub(crate) fn patch_tree(&self, parent_id: Option<&str>, routes: Vec<Route>) -> Result<usize, RouterError> {
        let mut core = self.inner.core.borrow_mut();
        let added = core.routes.patch(parent_id, routes)?;
        #[cfg(feature = "cache")]
        if added > 0 {
            if let Some(cache) = core.match_cache.as_mut() {
                cache.clear();
            }
        }
        Ok(added)
    }

    /// Run a future on the configured spawner, if any.
    pub(crate) fn spawn_on(&self, spawner: &Rc<dyn LocalSpawn>, fut: impl Future<Output = ()> + 'static) {
        if let Err(err) = spawner.spawn_local(fut) {
            warn_log!("Failed to spawn router task: {}", err);
        }
    }

    pub(crate) fn spawn(&self, fut: impl Future<Output = ()> + 'static) -> bool {
        match &self.inner.spawner {
            Some(spawner) => {
                self.spawn_on(spawner, fut);
                true
            }
            None => false,
        }
    }

    async fn handle_pop(&self, update: HistoryUpdate) -> Result<(), RouterError> {
        if self.ensure_active().is_err() {
            return Ok(());
        }
        {
            let mut core = self.inner.core.borrow_mut();
            if core.ignore_next_history_update {
                core.ignore_next_history_update = false;
                return Ok(());
            }
        }
        let state = self.state();
        if update.delta.is_none() && self.has_blockers() {
            warn_log!(
                "A blocker is registered but the POP to '{}' has no known delta; it cannot be blocked",
                update.location.href()
            );
        }
        if let Some(delta) = update.delta {
            if let Some(key) =
                self.should_block_navigation(&state.location, &update.location, update.action)
            {
                // Put the entry back; proceeding replays the delta.
                self.inner.core.borrow_mut().ignore_next_history_update = true;
                self.inner.history.borrow_mut().go(-delta);
                return self.block(
                    &key,
                    update.location,
                    crate::blocker::BlockedNavigation::Pop { delta },
                );
            }
        }
        self.start_navigation(update.action, update.location, StartOptions::default())
            .await
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Router")
            .field("location", &state.location.href())
            .field("navigation", &state.navigation)
            .field("initialized", &state.initialized)
            .finish()
    }
}
