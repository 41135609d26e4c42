//! Route definitions and the validated route tree.
//!
//! Applications describe routes with the [`Route`] builder. At router
//! construction the tree is converted into [`DataRoute`]s: every route gets
//! an id (its position in the tree, `"0"`, `"0-1"`, … when none was given),
//! the tree is validated, and a manifest indexes routes by id.
//!
//! # Example
//!
//! ```
//! use data_navigator::{HandlerValue, Route, RouteTree};
//! use serde_json::json;
//!
//! let tree = RouteTree::new(vec![Route::new("/")
//!     .id("root")
//!     .loader(|_| async { Ok(HandlerValue::Data(json!("root"))) })
//!     .children(vec![
//!         Route::index().id("home"),
//!         Route::new("users/:id").loader(|args| async move {
//!             Ok(HandlerValue::Data(json!(args.params.get("id"))))
//!         }),
//!     ])])
//! .unwrap();
//!
//! assert!(tree.get("root").is_some());
//! assert!(tree.get("0-1").is_some());
//! ```
//!
//! # Lazy routes
//!
//! A route may carry a `lazy` function that resolves the rest of its
//! definition on first use. It runs at most once per route; concurrent
//! navigations share the same in-flight call. Resolved properties only fill
//! what the static definition left empty.

use crate::error::{RouteError, RouterError};
use crate::handler::{handler_fn, Handler, HandlerArgs, HandlerResult, ShouldRevalidateArgs, ShouldRevalidateFn};
use crate::matching::{flatten_routes, rank_route_branches, RouteBranch};
use crate::path::join_paths;
use crate::{debug_log, trace_log, warn_log};
use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use serde_json::Value;
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

// ============================================================================
// Lazy route modules
// ============================================================================

/// Properties a lazy route module resolves to.
#[derive(Default, Clone)]
pub struct LazyRoute {
    pub loader: Option<Rc<dyn Handler>>,
    pub action: Option<Rc<dyn Handler>>,
    pub should_revalidate: Option<ShouldRevalidateFn>,
    pub has_error_boundary: Option<bool>,
}

impl LazyRoute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loader<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HandlerArgs) -> Fut + 'static,
        Fut: Future<Output = HandlerResult> + 'static,
    {
        self.loader = Some(Rc::new(handler_fn(f)));
        self
    }

    pub fn action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HandlerArgs) -> Fut + 'static,
        Fut: Future<Output = HandlerResult> + 'static,
    {
        self.action = Some(Rc::new(handler_fn(f)));
        self
    }

    pub fn should_revalidate(mut self, f: impl Fn(&ShouldRevalidateArgs) -> bool + 'static) -> Self {
        self.should_revalidate = Some(Rc::new(f));
        self
    }

    pub fn error_boundary(mut self, has_error_boundary: bool) -> Self {
        self.has_error_boundary = Some(has_error_boundary);
        self
    }
}

/// Function resolving a lazy route module.
pub type LazyFn = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<LazyRoute, RouteError>>>;

type LazyLoad = Shared<LocalBoxFuture<'static, Result<Rc<LazyRoute>, RouteError>>>;

struct LazyState {
    load: LazyFn,
    resolved: OnceCell<Rc<LazyRoute>>,
    in_flight: RefCell<Option<LazyLoad>>,
}

// ============================================================================
// Route builder
// ============================================================================

/// A route definition, as written by the application.
#[derive(Default)]
pub struct Route {
    id: Option<String>,
    path: Option<String>,
    index: bool,
    case_sensitive: bool,
    loader: Option<Rc<dyn Handler>>,
    action: Option<Rc<dyn Handler>>,
    should_revalidate: Option<ShouldRevalidateFn>,
    has_error_boundary: bool,
    lazy: Option<LazyFn>,
    handle: Option<Value>,
    children: Vec<Route>,
}

impl Route {
    /// A route matching `path` (relative to its parent unless absolute).
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// An index route: matches its parent's path exactly.
    pub fn index() -> Self {
        Self {
            index: true,
            ..Self::default()
        }
    }

    /// A pathless layout route.
    pub fn layout() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    /// Set the loader from an async closure.
    pub fn loader<F, Fut>(self, f: F) -> Self
    where
        F: Fn(HandlerArgs) -> Fut + 'static,
        Fut: Future<Output = HandlerResult> + 'static,
    {
        self.loader_handler(handler_fn(f))
    }

    /// Set the loader from a [`Handler`] implementation.
    pub fn loader_handler(mut self, handler: impl Handler) -> Self {
        self.loader = Some(Rc::new(handler));
        self
    }

    /// Set the action from an async closure.
    pub fn action<F, Fut>(self, f: F) -> Self
    where
        F: Fn(HandlerArgs) -> Fut + 'static,
        Fut: Future<Output = HandlerResult> + 'static,
    {
        self.action_handler(handler_fn(f))
    }

    /// Set the action from a [`Handler`] implementation.
    pub fn action_handler(mut self, handler: impl Handler) -> Self {
        self.action = Some(Rc::new(handler));
        self
    }

    pub fn should_revalidate(mut self, f: impl Fn(&ShouldRevalidateArgs) -> bool + 'static) -> Self {
        self.should_revalidate = Some(Rc::new(f));
        self
    }

    /// Mark this route as an error boundary.
    pub fn error_boundary(mut self) -> Self {
        self.has_error_boundary = true;
        self
    }

    /// Resolve the rest of the definition on first use.
    pub fn lazy<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<LazyRoute, RouteError>> + 'static,
    {
        self.lazy = Some(Rc::new(move || f().boxed_local()));
        self
    }

    /// Arbitrary application data attached to the route.
    pub fn handle(mut self, handle: Value) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn child(mut self, route: Route) -> Self {
        self.children.push(route);
        self
    }

    pub fn children(mut self, routes: Vec<Route>) -> Self {
        self.children.extend(routes);
        self
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("index", &self.index)
            .field("children", &self.children)
            .finish()
    }
}

// ============================================================================
// DataRoute
// ============================================================================

/// A route after conversion: stable id, validated position, shared handle.
pub struct DataRoute {
    pub id: String,
    pub path: Option<String>,
    pub index: bool,
    pub case_sensitive: bool,
    pub handle: Option<Value>,
    /// Absolute pattern of this route (parent paths joined).
    pub full_path: String,
    loader: Option<Rc<dyn Handler>>,
    action: Option<Rc<dyn Handler>>,
    should_revalidate: Option<ShouldRevalidateFn>,
    has_error_boundary: bool,
    lazy: Option<LazyState>,
    children: RefCell<Vec<Rc<DataRoute>>>,
}

impl DataRoute {
    fn lazy_resolved(&self) -> Option<&Rc<LazyRoute>> {
        self.lazy.as_ref().and_then(|lazy| lazy.resolved.get())
    }

    /// Effective loader (static, or resolved from the lazy module).
    pub fn loader(&self) -> Option<Rc<dyn Handler>> {
        self.loader
            .clone()
            .or_else(|| self.lazy_resolved().and_then(|l| l.loader.clone()))
    }

    /// Effective action.
    pub fn action(&self) -> Option<Rc<dyn Handler>> {
        self.action
            .clone()
            .or_else(|| self.lazy_resolved().and_then(|l| l.action.clone()))
    }

    /// Effective revalidation predicate.
    pub fn should_revalidate(&self) -> Option<ShouldRevalidateFn> {
        self.should_revalidate
            .clone()
            .or_else(|| self.lazy_resolved().and_then(|l| l.should_revalidate.clone()))
    }

    pub fn has_error_boundary(&self) -> bool {
        self.has_error_boundary
            || self
                .lazy_resolved()
                .and_then(|l| l.has_error_boundary)
                .unwrap_or(false)
    }

    pub fn has_loader(&self) -> bool {
        self.loader().is_some()
    }

    /// The route was declared with a lazy module.
    pub fn has_lazy(&self) -> bool {
        self.lazy.is_some()
    }

    /// The route has a lazy module that has not resolved yet.
    pub fn is_lazy_pending(&self) -> bool {
        self.lazy
            .as_ref()
            .is_some_and(|lazy| lazy.resolved.get().is_none())
    }

    /// Snapshot of the child routes.
    pub fn children(&self) -> Vec<Rc<DataRoute>> {
        self.children.borrow().clone()
    }

    pub fn has_children(&self) -> bool {
        !self.children.borrow().is_empty()
    }

    /// Resolve the lazy module, once.
    ///
    /// Concurrent callers share the same call. A failed load is not cached,
    /// so the next navigation retries it.
    pub async fn load_lazy(&self) -> Result<(), RouteError> {
        let Some(lazy) = &self.lazy else {
            return Ok(());
        };
        if lazy.resolved.get().is_some() {
            return Ok(());
        }
        let load = {
            let mut in_flight = lazy.in_flight.borrow_mut();
            match in_flight.as_ref() {
                Some(load) => load.clone(),
                None => {
                    trace_log!("Loading lazy route '{}'", self.id);
                    let fut = (lazy.load)();
                    let load: LazyLoad = async move { fut.await.map(Rc::new) }
                        .boxed_local()
                        .shared();
                    *in_flight = Some(load.clone());
                    load
                }
            }
        };
        let result = load.await;
        lazy.in_flight.borrow_mut().take();
        let module = result?;
        if self.loader.is_some() && module.loader.is_some() {
            warn_log!(
                "Route \"{}\" has a static loader; the lazy loader is ignored",
                self.id
            );
        }
        if self.action.is_some() && module.action.is_some() {
            warn_log!(
                "Route \"{}\" has a static action; the lazy action is ignored",
                self.id
            );
        }
        let _ = lazy.resolved.set(module);
        Ok(())
    }
}

impl DataRoute {
    /// Id of the placeholder route errors are attached to when no route of
    /// the tree can own them.
    pub const SHIM_ERROR_ROUTE_ID: &'static str = "__shim-error-route__";

    pub(crate) fn shim() -> Self {
        Self {
            id: Self::SHIM_ERROR_ROUTE_ID.to_string(),
            path: None,
            index: false,
            case_sensitive: false,
            handle: None,
            full_path: "/".to_string(),
            loader: None,
            action: None,
            should_revalidate: None,
            has_error_boundary: false,
            lazy: None,
            children: RefCell::new(Vec::new()),
        }
    }
}

impl fmt::Debug for DataRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataRoute")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("index", &self.index)
            .field("has_loader", &self.has_loader())
            .field("has_error_boundary", &self.has_error_boundary())
            .finish()
    }
}

impl PartialEq for DataRoute {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// ============================================================================
// RouteTree
// ============================================================================

/// Validated route tree plus its id manifest and ranked branches.
pub struct RouteTree {
    roots: Vec<Rc<DataRoute>>,
    manifest: HashMap<String, Rc<DataRoute>>,
    branches: Vec<RouteBranch>,
}

impl RouteTree {
    /// Convert and validate a route tree.
    pub fn new(routes: Vec<Route>) -> Result<Self, RouterError> {
        if routes.is_empty() {
            return Err(RouterError::EmptyRoutes);
        }
        let mut manifest = HashMap::new();
        let roots = convert_routes(routes, &[], "", &mut manifest)?;
        let mut tree = Self {
            roots,
            manifest,
            branches: Vec::new(),
        };
        tree.rebuild_branches();
        debug_log!("Route tree built with {} routes", tree.manifest.len());
        Ok(tree)
    }

    pub fn roots(&self) -> &[Rc<DataRoute>] {
        &self.roots
    }

    pub fn get(&self, id: &str) -> Option<&Rc<DataRoute>> {
        self.manifest.get(id)
    }

    /// Ranked branches, best first.
    pub fn branches(&self) -> &[RouteBranch] {
        &self.branches
    }

    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    /// Add routes under `parent_id` (or at the top level).
    ///
    /// Routes identical to an existing sibling are skipped. Returns the number
    /// of routes added.
    pub fn patch(&mut self, parent_id: Option<&str>, routes: Vec<Route>) -> Result<usize, RouterError> {
        let (siblings, parent_full_path) = match parent_id {
            Some(id) => {
                let parent = self
                    .manifest
                    .get(id)
                    .ok_or_else(|| RouterError::UnknownRoute { id: id.to_string() })?;
                (parent.children(), parent.full_path.clone())
            }
            None => (self.roots.clone(), String::new()),
        };

        let fresh: Vec<Route> = routes
            .into_iter()
            .filter(|route| !siblings.iter().any(|existing| is_same_route(route, existing)))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let prefix = vec![
            parent_id.unwrap_or("_").to_string(),
            "patch".to_string(),
            siblings.len().to_string(),
        ];
        let mut manifest = self.manifest.clone();
        let converted = convert_routes(fresh, &prefix, &parent_full_path, &mut manifest)?;
        let added = converted.len();
        match parent_id.and_then(|id| self.manifest.get(id)) {
            Some(parent) => parent.children.borrow_mut().extend(converted),
            None => self.roots.extend(converted),
        }
        self.manifest = manifest;
        self.rebuild_branches();
        debug_log!(
            "Patched {} routes under '{}'",
            added,
            parent_id.unwrap_or("<root>")
        );
        Ok(added)
    }

    fn rebuild_branches(&mut self) {
        let mut branches = flatten_routes(&self.roots);
        rank_route_branches(&mut branches);
        self.branches = branches;
    }
}

impl fmt::Debug for RouteTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTree")
            .field("roots", &self.roots)
            .field("branches", &self.branches.len())
            .finish()
    }
}

fn convert_routes(
    routes: Vec<Route>,
    parent_tree_path: &[String],
    parent_full_path: &str,
    manifest: &mut HashMap<String, Rc<DataRoute>>,
) -> Result<Vec<Rc<DataRoute>>, RouterError> {
    let mut converted = Vec::with_capacity(routes.len());
    for (i, route) in routes.into_iter().enumerate() {
        let mut tree_path = parent_tree_path.to_vec();
        tree_path.push(i.to_string());
        let id = route.id.clone().unwrap_or_else(|| tree_path.join("-"));

        if route.index && !route.children.is_empty() {
            return Err(RouterError::IndexRouteWithChildren { id });
        }
        if manifest.contains_key(&id) {
            return Err(RouterError::DuplicateRouteId { id });
        }

        let full_path = match route.path.as_deref() {
            Some(path) if path.starts_with('/') => {
                if !path.starts_with(parent_full_path) {
                    return Err(RouterError::InvalidAbsolutePath {
                        path: path.to_string(),
                        parent: parent_full_path.to_string(),
                    });
                }
                path.to_string()
            }
            Some(path) => join_paths(&[parent_full_path, path]),
            None => parent_full_path.to_string(),
        };

        let children = convert_routes(route.children, &tree_path, &full_path, manifest)?;
        let data_route = Rc::new(DataRoute {
            id: id.clone(),
            path: route.path,
            index: route.index,
            case_sensitive: route.case_sensitive,
            handle: route.handle,
            full_path,
            loader: route.loader,
            action: route.action,
            should_revalidate: route.should_revalidate,
            has_error_boundary: route.has_error_boundary,
            lazy: route.lazy.map(|load| LazyState {
                load,
                resolved: OnceCell::new(),
                in_flight: RefCell::new(None),
            }),
            children: RefCell::new(children),
        });
        manifest.insert(id, data_route.clone());
        converted.push(data_route);
    }
    Ok(converted)
}

fn is_same_route(new: &Route, existing: &DataRoute) -> bool {
    if let Some(id) = &new.id {
        if *id == existing.id {
            return true;
        }
    }
    if new.index != existing.index
        || new.path != existing.path
        || new.case_sensitive != existing.case_sensitive
    {
        return false;
    }
    let existing_children = existing.children();
    if new.children.is_empty() && existing_children.is_empty() {
        return true;
    }
    new.children.iter().all(|child| {
        existing_children
            .iter()
            .any(|existing_child| is_same_route(child, existing_child))
    })
}

// ============================================================================
// Tests
// ============================================================================
