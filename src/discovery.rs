//! Lazy route discovery.
//!
//! Apps with large route trees can start with a partial tree and add routes
//! as the user reaches them. When a path does not match fully (or only
//! through a dynamic segment that better routes might still shadow), the
//! router hands the partial matches to the `patch_routes_on_navigation`
//! callback, which calls [`PatchRoutes::patch`] to add children. Matching is
//! retried until it succeeds, the callback stops adding routes, or
//! [`MAX_DISCOVERY_ATTEMPTS`] is reached.

use crate::abort::AbortSignal;
use crate::error::{RouteError, RouterError};
use crate::matching::RouteMatch;
use crate::route::Route;
use crate::router::{Router, RouterInner};
use crate::{debug_log, trace_log, warn_log};
use futures::future::LocalBoxFuture;
use std::fmt;
use std::rc::{Rc, Weak};

/// Upper bound on callback rounds for one navigation or fetch.
pub const MAX_DISCOVERY_ATTEMPTS: usize = 10;

/// Callback that may add routes for a path.
pub type PatchRoutesOnNavigation =
    Rc<dyn Fn(DiscoveryArgs) -> LocalBoxFuture<'static, Result<(), RouteError>>>;

/// Input to the discovery callback.
#[derive(Debug)]
pub struct DiscoveryArgs {
    /// Pathname being resolved.
    pub path: String,
    /// What matched so far, outermost first.
    pub matches: Vec<RouteMatch>,
    /// Aborted when the navigation or fetch is superseded.
    pub signal: AbortSignal,
    /// Set when a fetcher triggered discovery.
    pub fetcher_key: Option<String>,
    pub patch: PatchRoutes,
}

/// Handle used by the discovery callback to add routes.
#[derive(Clone)]
pub struct PatchRoutes {
    inner: Weak<RouterInner>,
    signal: AbortSignal,
}

impl PatchRoutes {
    /// Add `routes` under `parent_id` (top level when `None`).
    ///
    /// Ignored once the navigation that asked for them was aborted.
    pub fn patch(&self, parent_id: Option<&str>, routes: Vec<Route>) -> Result<usize, RouterError> {
        if self.signal.is_aborted() {
            trace_log!("Ignoring route patch for an aborted navigation");
            return Ok(0);
        }
        let inner = self.inner.upgrade().ok_or(RouterError::Disposed)?;
        Router { inner }.patch_tree(parent_id, routes)
    }
}

impl fmt::Debug for PatchRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchRoutes")
            .field("aborted", &self.signal.is_aborted())
            .finish()
    }
}

/// Whether discovery should run for a path.
#[derive(Debug, Clone)]
pub(crate) struct FogOfWar {
    pub active: bool,
    /// Partial matches to use in place of the full result.
    pub matches: Option<Vec<RouteMatch>>,
}

/// Outcome of [`Router::discover_routes`].
#[derive(Debug)]
pub(crate) enum Discovery {
    Aborted,
    Error {
        error: RouteError,
        partial_matches: Vec<RouteMatch>,
    },
    /// Final full matches; `None` when the path stays unmatched.
    Matched(Option<Vec<RouteMatch>>),
}

fn same_route_ids(a: &[RouteMatch], b: &[RouteMatch]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.route.id == y.route.id)
}

impl Router {
    pub(crate) fn check_fog_of_war(&self, matches: Option<&[RouteMatch]>, pathname: &str) -> FogOfWar {
        if self.inner.patch_routes_on_navigation.is_none() {
            return FogOfWar {
                active: false,
                matches: None,
            };
        }
        match matches {
            None => FogOfWar {
                active: true,
                matches: Some(self.match_partial(pathname).unwrap_or_default()),
            },
            Some(matches) if matches.first().is_some_and(|m| !m.params.is_empty()) => FogOfWar {
                active: true,
                matches: self.match_partial(pathname),
            },
            Some(_) => FogOfWar {
                active: false,
                matches: None,
            },
        }
    }

    /// Ask the discovery callback for routes until `pathname` matches.
    pub(crate) async fn discover_routes(
        &self,
        matches: Vec<RouteMatch>,
        pathname: &str,
        signal: &AbortSignal,
        fetcher_key: Option<&str>,
    ) -> Discovery {
        let Some(callback) = self.inner.patch_routes_on_navigation.clone() else {
            return Discovery::Matched(Some(matches));
        };
        let mut partial_matches = matches;
        for attempt in 1..=MAX_DISCOVERY_ATTEMPTS {
            debug_log!("Discovering routes for '{}' (attempt {})", pathname, attempt);
            let args = DiscoveryArgs {
                path: pathname.to_string(),
                matches: partial_matches.clone(),
                signal: signal.clone(),
                fetcher_key: fetcher_key.map(str::to_string),
                patch: PatchRoutes {
                    inner: Rc::downgrade(&self.inner),
                    signal: signal.clone(),
                },
            };
            if let Err(error) = callback(args).await {
                return Discovery::Error {
                    error,
                    partial_matches,
                };
            }
            if signal.is_aborted() {
                return Discovery::Aborted;
            }
            if let Some(full) = self.match_location(pathname) {
                return Discovery::Matched(Some(full));
            }
            match self.match_partial(pathname) {
                Some(next) if !same_route_ids(&partial_matches, &next) => partial_matches = next,
                _ => return Discovery::Matched(None),
            }
        }
        warn_log!(
            "Route discovery for '{}' did not settle after {} attempts",
            pathname,
            MAX_DISCOVERY_ATTEMPTS
        );
        Discovery::Matched(None)
    }
}
