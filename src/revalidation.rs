//! Deciding which loaders run for a navigation.
//!
//! Loaders of routes that stay matched keep their data unless something
//! suggests it is stale: a mutation finished, the search string changed, the
//! route instance changed, or the route says so through its
//! `should_revalidate` predicate.

use crate::abort::AbortController;
use crate::error::RouterError;
use crate::handler::{DataResult, ShouldRevalidateArgs};
use crate::history::Location;
use crate::matching::RouteMatch;
use crate::navigation::{get_target_match, PendingActionResult};
use crate::params::RouteParams;
use crate::path::Path;
use crate::router::Router;
use crate::state::{LoaderData, RouterState};
use crate::submission::Submission;
use crate::trace_log;
use std::collections::HashMap;

/// A fetcher whose data is reloaded alongside a navigation.
#[derive(Debug, Clone)]
pub(crate) struct RevalidatingFetcher {
    pub key: String,
    pub route_id: String,
    pub path: String,
    /// `None` when the fetcher's path no longer matches any route.
    pub matches: Option<Vec<RouteMatch>>,
    pub target: Option<RouteMatch>,
    pub controller: Option<AbortController>,
}

/// What a navigation has to load.
#[derive(Debug, Default)]
pub(crate) struct LoadPlan {
    pub matches_to_load: Vec<RouteMatch>,
    pub fetchers: Vec<RevalidatingFetcher>,
}

/// Snapshot of the core flags the planner reads.
struct PlanFlags {
    required: bool,
    forced: bool,
    cancelled_deferred_routes: Vec<String>,
}

impl Router {
    /// Select the loaders and fetchers that run for a navigation to
    /// `location` with `matches`.
    pub(crate) fn plan_loads(
        &self,
        state: &RouterState,
        matches: &[RouteMatch],
        submission: Option<&Submission>,
        location: &Location,
        pending: Option<&PendingActionResult>,
        initial_hydration: bool,
    ) -> Result<LoadPlan, RouterError> {
        let current_url = self.create_url(&state.location.path())?;
        let next_url = self.create_url(&location.path())?;
        let (action_result, action_status) = match pending.map(|p| &p.result) {
            Some(DataResult::Data(value)) => (Some(value.clone()), Some(200)),
            Some(result) => (None, Some(result.status())),
            None => (None, None),
        };

        let boundary_matches = match pending {
            _ if initial_hydration && !state.errors.is_empty() => {
                let first_error = matches.iter().position(|m| state.errors.contains_key(m.route_id()));
                first_error.map_or(matches, |i| &matches[..=i])
            }
            Some(PendingActionResult {
                route_id,
                result: DataResult::Error(_),
            }) => matches
                .iter()
                .position(|m| m.route_id() == route_id)
                .map_or(matches, |i| &matches[..i]),
            _ => matches,
        };

        let flags = {
            let core = self.inner.core.borrow();
            PlanFlags {
                required: core.is_revalidation_required,
                forced: core.force_revalidation,
                cancelled_deferred_routes: core.cancelled_deferred_routes.clone(),
            }
        };
        let base_args = |current_params: RouteParams, next_params: RouteParams, default: bool| {
            ShouldRevalidateArgs {
                current_url: current_url.clone(),
                current_params,
                next_url: next_url.clone(),
                next_params,
                submission: submission.cloned(),
                action_result: action_result.clone(),
                action_status,
                default_should_revalidate: default,
            }
        };
        let search_changed = current_url.query() != next_url.query();

        let matches_to_load: Vec<RouteMatch> = boundary_matches
            .iter()
            .enumerate()
            .filter(|(index, m)| {
                if m.route.is_lazy_pending() {
                    return true;
                }
                if !m.route.has_loader() {
                    return false;
                }
                if initial_hydration {
                    return should_load_on_hydration(m.route_id(), state);
                }
                let current = state.matches.get(*index);
                if flags.forced
                    || is_new_loader(&state.loader_data, current, m)
                    || flags.cancelled_deferred_routes.iter().any(|id| id == m.route_id())
                {
                    return true;
                }
                let Some(current) = current else {
                    return true;
                };
                if is_new_route_instance(current, m) {
                    return true;
                }
                let default = flags.required || search_changed;
                should_revalidate_loader(
                    m,
                    &base_args(current.params.clone(), m.params.clone(), default),
                )
            })
            .map(|(_, m)| m.clone())
            .collect();

        let fetchers = if initial_hydration {
            Vec::new()
        } else {
            self.plan_fetcher_loads(state, matches, &flags, &base_args)
        };
        trace_log!(
            "Planned {} loaders and {} fetcher reloads for '{}'",
            matches_to_load.len(),
            fetchers.len(),
            location.href()
        );
        Ok(LoadPlan {
            matches_to_load,
            fetchers,
        })
    }

    fn plan_fetcher_loads(
        &self,
        state: &RouterState,
        matches: &[RouteMatch],
        flags: &PlanFlags,
        base_args: &dyn Fn(RouteParams, RouteParams, bool) -> ShouldRevalidateArgs,
    ) -> Vec<RevalidatingFetcher> {
        let candidates: Vec<(String, String, String)> = {
            let core = self.inner.core.borrow();
            core.fetchers
                .load_matches
                .iter()
                .filter(|(key, f)| {
                    matches.iter().any(|m| m.route_id() == f.route_id)
                        && !core.fetchers.deleted.contains(*key)
                })
                .map(|(key, f)| (key.clone(), f.route_id.clone(), f.path.clone()))
                .collect()
        };
        let current_params = state.matches.last().map(|m| m.params.clone()).unwrap_or_default();
        let next_params = matches.last().map(|m| m.params.clone()).unwrap_or_default();

        let mut planned = Vec::new();
        for (key, route_id, path) in candidates {
            let parsed = Path::parse(&path);
            let Some(fetcher_matches) = self.match_location(&parsed.pathname) else {
                planned.push(RevalidatingFetcher {
                    key,
                    route_id,
                    path,
                    matches: None,
                    target: None,
                    controller: None,
                });
                continue;
            };
            let Some(target) = get_target_match(&fetcher_matches, &parsed.search).cloned() else {
                continue;
            };

            let (redirected, was_cancelled) = {
                let mut core = self.inner.core.borrow_mut();
                let redirected = core.fetchers.redirect_ids.contains(&key);
                let was_cancelled = !redirected && core.fetchers.cancelled_loads.remove(&key);
                (redirected, was_cancelled)
            };
            let fetcher = state.fetchers.get(&key);
            let should_reload = if redirected {
                false
            } else if was_cancelled {
                true
            } else if fetcher.is_some_and(|f| !f.is_idle() && f.data.is_none()) {
                flags.required || flags.forced
            } else {
                let default = flags.required || flags.forced;
                flags.forced
                    || should_revalidate_loader(
                        &target,
                        &base_args(current_params.clone(), next_params.clone(), default),
                    )
            };

            if should_reload {
                planned.push(RevalidatingFetcher {
                    key,
                    route_id,
                    path,
                    matches: Some(fetcher_matches),
                    target: Some(target),
                    controller: Some(AbortController::new()),
                });
            }
        }
        planned
    }
}

/// Hydrated routes only load what the server did not provide.
fn should_load_on_hydration(route_id: &str, state: &RouterState) -> bool {
    !state.loader_data.contains_key(route_id) && !state.errors.contains_key(route_id)
}

/// A route that was not matched at this depth before, or has no data yet.
pub(crate) fn is_new_loader(
    loader_data: &HashMap<String, Option<LoaderData>>,
    current: Option<&RouteMatch>,
    next: &RouteMatch,
) -> bool {
    let is_new = current.map_or(true, |c| c.route_id() != next.route_id());
    is_new || !matches!(loader_data.get(next.route_id()), Some(Some(_)))
}

/// Same route, different URL segment: `/users/1` -> `/users/2`.
pub(crate) fn is_new_route_instance(current: &RouteMatch, next: &RouteMatch) -> bool {
    if current.pathname != next.pathname {
        return true;
    }
    let is_splat = current.route.path.as_deref().is_some_and(|p| p.ends_with('*'));
    is_splat && current.params.splat() != next.params.splat()
}

/// Ask the route's predicate, or fall back to the default.
pub(crate) fn should_revalidate_loader(target: &RouteMatch, args: &ShouldRevalidateArgs) -> bool {
    match target.route.should_revalidate() {
        Some(predicate) => predicate(args),
        None => args.default_should_revalidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::match_routes;
    use crate::route::{Route, RouteTree};
    use serde_json::json;
    use url::Url;

    fn url(path: &str) -> Url {
        Url::parse(crate::history::DEFAULT_ORIGIN).unwrap().join(path).unwrap()
    }

    fn tree() -> RouteTree {
        RouteTree::new(vec![Route::new("/")
            .id("root")
            .loader(|_| async { Ok(json!("root").into()) })
            .children(vec![
                Route::new("users/:id")
                    .id("user")
                    .loader(|_| async { Ok(json!("user").into()) }),
                Route::new("files/*")
                    .id("files")
                    .loader(|_| async { Ok(json!("files").into()) }),
                Route::new("sticky")
                    .id("sticky")
                    .loader(|_| async { Ok(json!("sticky").into()) })
                    .should_revalidate(|_| false),
            ])])
        .unwrap()
    }

    fn matched(tree: &RouteTree, path: &str) -> Vec<RouteMatch> {
        match_routes(tree.roots(), path, "/").unwrap()
    }

    fn args(default: bool) -> ShouldRevalidateArgs {
        ShouldRevalidateArgs {
            current_url: url("/a"),
            current_params: RouteParams::new(),
            next_url: url("/b"),
            next_params: RouteParams::new(),
            submission: None,
            action_result: None,
            action_status: None,
            default_should_revalidate: default,
        }
    }

    #[test]
    fn test_new_route_instance_on_param_change() {
        let tree = tree();
        let one = matched(&tree, "/users/1");
        let two = matched(&tree, "/users/2");
        assert!(!is_new_route_instance(&one[0], &two[0]));
        assert!(is_new_route_instance(&one[1], &two[1]));
        assert!(!is_new_route_instance(&one[1], &one[1]));
    }

    #[test]
    fn test_new_route_instance_on_splat_change() {
        let tree = tree();
        let a = matched(&tree, "/files/a/b");
        let c = matched(&tree, "/files/c");
        assert_eq!(a[1].pathname_base, c[1].pathname_base);
        assert!(is_new_route_instance(&a[1], &c[1]));
    }

    #[test]
    fn test_is_new_loader() {
        let tree = tree();
        let user = matched(&tree, "/users/1");
        let files = matched(&tree, "/files/x");
        let loaded = HashMap::from([
            ("root".to_string(), Some(LoaderData::Value(json!(1)))),
            ("user".to_string(), Some(LoaderData::Value(json!(2)))),
        ]);
        assert!(!is_new_loader(&loaded, Some(&user[0]), &files[0]));
        assert!(is_new_loader(&loaded, Some(&user[1]), &files[1]));
        assert!(is_new_loader(&loaded, None, &user[1]));
        assert!(is_new_loader(&HashMap::new(), Some(&user[1]), &user[1]));

        // An errored loader left no data behind and runs again.
        let errored = HashMap::from([("root".to_string(), None)]);
        assert!(is_new_loader(&errored, Some(&user[0]), &files[0]));
    }

    #[test]
    fn test_predicate_overrides_default() {
        let tree = tree();
        let sticky = matched(&tree, "/sticky");
        assert!(!should_revalidate_loader(&sticky[1], &args(true)));
        let user = matched(&tree, "/users/1");
        assert!(should_revalidate_loader(&user[1], &args(true)));
        assert!(!should_revalidate_loader(&user[1], &args(false)));
    }
}
