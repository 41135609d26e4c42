//! Fetchers: named background loads and submissions.
//!
//! A fetcher calls a route's loader or action without touching the URL. Each
//! key has its own state machine and abort controller. Fetcher actions
//! revalidate the page like navigation actions do; fetcher redirects become
//! main navigations.

use crate::abort::{AbortController, AbortSignal};
use crate::discovery::Discovery;
use crate::error::{InternalError, RouteError, RouterError};
use crate::handler::DataResult;
use crate::matching::RouteMatch;
use crate::navigation::{
    find_fetcher_redirect, find_nearest_boundary, find_redirect, get_target_match, merge_loader_data,
    revalidating_fetcher_states, unwrap_deferred, HandlerKind, NewState, PendingActionResult,
    RedirectOptions,
};
use crate::path::Path;
use crate::router::Router;
use crate::state::{Fetcher, FetcherState, Navigation};
use crate::submission::{normalize_submission, FormMethod, NormalizedTarget, SubmitOptions, Submission};
use crate::{debug_log, info_log, trace_log};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Where a fetcher last loaded from; reloaded during revalidation.
#[derive(Debug, Clone)]
pub(crate) struct FetchLoadMatch {
    pub route_id: String,
    pub path: String,
}

/// Per-key bookkeeping that never reaches the published state.
#[derive(Debug, Default)]
pub(crate) struct FetcherRegistry {
    pub controllers: HashMap<String, AbortController>,
    /// Load id of each fetcher action's revalidation round.
    pub reload_ids: HashMap<String, u64>,
    /// Load id of each in-flight fetcher load.
    pub load_ids: HashMap<String, u64>,
    /// Fetchers whose result redirected the app.
    pub redirect_ids: HashSet<String>,
    /// Fetchers that loaded and may revalidate.
    pub load_matches: BTreeMap<String, FetchLoadMatch>,
    /// Reference counts from `get_fetcher`.
    pub active: HashMap<String, usize>,
    /// Keys to drop from state once idle.
    pub deleted: HashSet<String>,
    /// Loads interrupted by a mutation; they rerun on the next revalidation.
    pub cancelled_loads: HashSet<String>,
}

impl FetcherRegistry {
    /// Abort and drop the controller of `key`.
    pub fn abort(&mut self, key: &str) -> bool {
        match self.controllers.remove(key) {
            Some(controller) => controller.abort(),
            None => false,
        }
    }

    /// Drop the controller of `key` if it still owns `signal`.
    pub fn release_controller(&mut self, key: &str, signal: &AbortSignal) {
        if self
            .controllers
            .get(key)
            .is_some_and(|c| c.signal().same_as(signal))
        {
            self.controllers.remove(key);
        }
    }

    /// Forget everything about `key`. A revalidation in flight keeps running
    /// so the page data it loads still lands.
    pub fn forget(&mut self, key: &str, fetcher: Option<&Fetcher>) {
        let revalidating = fetcher.is_some_and(|f| f.state == FetcherState::Loading)
            && self.reload_ids.contains_key(key);
        if !revalidating {
            self.abort(key);
        }
        self.load_matches.remove(key);
        self.reload_ids.remove(key);
        self.load_ids.remove(key);
        self.redirect_ids.remove(key);
        self.deleted.remove(key);
        self.cancelled_loads.remove(key);
    }
}

/// Options for [`Router::fetch`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Submit instead of load.
    pub submission: Option<SubmitOptions>,
    pub prevent_scroll_reset: bool,
    pub flush_sync: bool,
    /// Resolve `..` against the URL path instead of the route hierarchy.
    pub path_relative: bool,
}

impl FetchOptions {
    pub fn submit(submission: SubmitOptions) -> Self {
        Self {
            submission: Some(submission),
            ..Self::default()
        }
    }
}

/// Apply staged fetcher updates; `None` removes the key.
pub(crate) fn apply_fetcher_updates(
    fetchers: &mut HashMap<String, Fetcher>,
    updates: Vec<(String, Option<Fetcher>)>,
) {
    for (key, update) in updates {
        match update {
            Some(fetcher) => {
                fetchers.insert(key, fetcher);
            }
            None => {
                fetchers.remove(&key);
            }
        }
    }
}

fn method_not_allowed(target: &RouteMatch, pathname: &str, method: FormMethod) -> Option<RouteError> {
    if target.route.action().is_some() || target.route.has_lazy() {
        return None;
    }
    Some(
        InternalError::MethodNotAllowed {
            method: method.as_str().to_string(),
            pathname: pathname.to_string(),
            route_id: target.route.id.clone(),
        }
        .into(),
    )
}

impl Router {
    /// Load or submit `href` in the background under `key`.
    ///
    /// `route_id` names the route the request is issued from; relative
    /// `href`s resolve against it.
    pub async fn fetch(
        &self,
        key: impl Into<String>,
        route_id: &str,
        href: &str,
        opts: FetchOptions,
    ) -> Result<(), RouterError> {
        self.ensure_active()?;
        let key = key.into();
        let flush_sync = opts.flush_sync;
        if self.inner.core.borrow_mut().fetchers.abort(&key) {
            debug_log!("Fetcher '{}' restarted; previous request aborted", key);
        }

        let state = self.state();
        if !state.matches.iter().any(|m| m.route_id() == route_id) {
            let error = InternalError::RouteMismatch {
                route_id: route_id.to_string(),
                pathname: href.to_string(),
            };
            self.set_fetcher_error(&key, route_id, error.into(), flush_sync);
            return Ok(());
        }

        let path = self.normalize_to(
            &state.location.path(),
            &state.matches,
            href,
            Some(route_id),
            opts.path_relative,
        );
        let pathname = Path::parse(&path).pathname;
        let mut matches = self.match_location(&pathname);
        let fog = self.check_fog_of_war(matches.as_deref(), &pathname);
        if fog.active {
            if let Some(partial) = fog.matches {
                matches = Some(partial);
            }
        }
        let Some(matches) = matches else {
            let error = InternalError::NotFound { pathname };
            self.set_fetcher_error(&key, route_id, error.into(), flush_sync);
            return Ok(());
        };

        let NormalizedTarget {
            path,
            submission,
            error,
        } = normalize_submission(true, path, opts.submission.clone());
        if let Some(error) = error {
            self.set_fetcher_error(&key, route_id, error.into(), flush_sync);
            return Ok(());
        }
        let Some(target) = get_target_match(&matches, &Path::parse(&path).search).cloned() else {
            let error = InternalError::NotFound { pathname };
            self.set_fetcher_error(&key, route_id, error.into(), flush_sync);
            return Ok(());
        };

        info_log!("Fetcher '{}' {} '{}'", key, submission.as_ref().map_or("GET", |s| s.form_method.as_str()), path);
        let request = FetchRequest {
            key,
            route_id: route_id.to_string(),
            path,
            matches,
            target,
            fog_active: fog.active,
            flush_sync,
            prevent_scroll_reset: opts.prevent_scroll_reset,
        };
        match submission.filter(|s| s.form_method.is_mutation()) {
            Some(submission) => self.handle_fetcher_action(request, submission).await,
            None => {
                self.inner.core.borrow_mut().fetchers.load_matches.insert(
                    request.key.clone(),
                    FetchLoadMatch {
                        route_id: request.route_id.clone(),
                        path: request.path.clone(),
                    },
                );
                self.handle_fetcher_loader(request).await
            }
        }
    }

    async fn handle_fetcher_loader(&self, req: FetchRequest) -> Result<(), RouterError> {
        let FetchRequest {
            key,
            route_id,
            path,
            mut matches,
            mut target,
            fog_active,
            flush_sync,
            prevent_scroll_reset,
        } = req;
        let existing = self.state().fetchers.get(&key).and_then(|f| f.data.clone());
        self.update_fetcher_state(&key, Fetcher::loading(None, existing), flush_sync);

        let controller = AbortController::new();
        let load_id = {
            let mut core = self.inner.core.borrow_mut();
            core.fetchers.controllers.insert(key.clone(), controller.clone());
            core.incrementing_load_id += 1;
            let load_id = core.incrementing_load_id;
            core.fetchers.load_ids.insert(key.clone(), load_id);
            load_id
        };
        let request = self.create_request(&Path::parse(&path), controller.signal(), None)?;

        if fog_active {
            match self
                .discover_routes(matches, request.pathname(), &request.signal, Some(&key))
                .await
            {
                Discovery::Aborted => return Ok(()),
                Discovery::Error { error, .. } => {
                    self.set_fetcher_error(&key, &route_id, error, flush_sync);
                    return Ok(());
                }
                Discovery::Matched(found) => {
                    let Some((found, found_target)) = with_target(found, &path) else {
                        let error = InternalError::NotFound {
                            pathname: request.pathname().to_string(),
                        };
                        self.set_fetcher_error(&key, &route_id, error.into(), flush_sync);
                        return Ok(());
                    };
                    matches = found;
                    target = found_target;
                }
            }
        }

        let result = match self
            .call_handler(HandlerKind::Loader, &request, &target, &matches)
            .await
        {
            Some(result) => unwrap_deferred(result, &request.signal).await,
            None => None,
        };
        {
            let mut core = self.inner.core.borrow_mut();
            core.fetchers.release_controller(&key, &request.signal);
            if core.fetchers.load_ids.get(&key) == Some(&load_id) {
                core.fetchers.load_ids.remove(&key);
            }
        }
        let Some(result) = result.filter(|_| !request.signal.is_aborted()) else {
            trace_log!("Fetcher '{}' load aborted", key);
            return Ok(());
        };
        if !self.state().fetchers.contains_key(&key) {
            trace_log!("Fetcher '{}' was removed while loading", key);
            return Ok(());
        }
        if self.inner.core.borrow().fetchers.deleted.contains(&key) {
            self.update_fetcher_state(&key, Fetcher::idle(None), false);
            return Ok(());
        }

        match result {
            DataResult::Redirect(redirect) => {
                let newer_navigation = self
                    .inner
                    .core
                    .borrow()
                    .pending_navigation_load_id
                    .is_some_and(|id| id > load_id);
                if newer_navigation {
                    self.update_fetcher_state(&key, Fetcher::idle(None), false);
                    return Ok(());
                }
                self.inner.core.borrow_mut().fetchers.redirect_ids.insert(key);
                self.start_redirect_navigation(
                    &request.url,
                    redirect,
                    RedirectOptions {
                        prevent_scroll_reset,
                        ..RedirectOptions::default()
                    },
                )
                .await
            }
            DataResult::Error(error) => {
                self.set_fetcher_error(&key, &route_id, error, false);
                Ok(())
            }
            DataResult::Data(value) => {
                self.update_fetcher_state(&key, Fetcher::idle(Some(value)), false);
                Ok(())
            }
            // unwrap_deferred settles deferred data before it gets here.
            DataResult::Deferred(_) => {
                let error = RouteError::msg(format!("fetcher '{}' loader data was left unresolved", key));
                self.set_fetcher_error(&key, &route_id, error, false);
                Ok(())
            }
        }
    }

    async fn handle_fetcher_action(&self, req: FetchRequest, submission: Submission) -> Result<(), RouterError> {
        let FetchRequest {
            key,
            route_id,
            path,
            mut matches,
            mut target,
            fog_active,
            flush_sync,
            prevent_scroll_reset,
        } = req;
        self.interrupt_active_loads();
        self.inner.core.borrow_mut().fetchers.load_matches.remove(&key);

        let pathname = Path::parse(&path).pathname;
        if !fog_active {
            if let Some(error) = method_not_allowed(&target, &pathname, submission.form_method) {
                self.set_fetcher_error(&key, &route_id, error, flush_sync);
                return Ok(());
            }
        }

        let existing = self.state().fetchers.get(&key).and_then(|f| f.data.clone());
        self.update_fetcher_state(&key, Fetcher::submitting(submission.clone(), existing), flush_sync);

        let controller = AbortController::new();
        self.inner
            .core
            .borrow_mut()
            .fetchers
            .controllers
            .insert(key.clone(), controller.clone());
        let request = self.create_request(&Path::parse(&path), controller.signal(), Some(submission.clone()))?;

        if fog_active {
            match self
                .discover_routes(matches, &pathname, &request.signal, Some(&key))
                .await
            {
                Discovery::Aborted => return Ok(()),
                Discovery::Error { error, .. } => {
                    self.set_fetcher_error(&key, &route_id, error, flush_sync);
                    return Ok(());
                }
                Discovery::Matched(found) => {
                    let Some((found, found_target)) = with_target(found, &path) else {
                        let error = InternalError::NotFound { pathname };
                        self.set_fetcher_error(&key, &route_id, error.into(), flush_sync);
                        return Ok(());
                    };
                    if let Some(error) = method_not_allowed(&found_target, &pathname, submission.form_method) {
                        self.set_fetcher_error(&key, &route_id, error, flush_sync);
                        return Ok(());
                    }
                    matches = found;
                    target = found_target;
                }
            }
        }

        let originating_load_id = self.inner.core.borrow().incrementing_load_id;
        let result = self
            .call_handler(HandlerKind::Action, &request, &target, &matches)
            .await;
        let Some(result) = result.filter(|_| !request.signal.is_aborted()) else {
            self.inner
                .core
                .borrow_mut()
                .fetchers
                .release_controller(&key, &request.signal);
            trace_log!("Fetcher '{}' submission aborted", key);
            return Ok(());
        };

        let deleted = self.inner.core.borrow().fetchers.deleted.contains(&key);
        if deleted && matches!(result, DataResult::Redirect(_) | DataResult::Error(_)) {
            self.update_fetcher_state(&key, Fetcher::idle(None), false);
            return Ok(());
        }
        let action_data = match result {
            DataResult::Redirect(redirect) => {
                let newer_navigation = {
                    let mut core = self.inner.core.borrow_mut();
                    core.fetchers.controllers.remove(&key);
                    core.pending_navigation_load_id
                        .is_some_and(|id| id > originating_load_id)
                };
                if newer_navigation {
                    self.update_fetcher_state(&key, Fetcher::idle(None), false);
                    return Ok(());
                }
                self.inner.core.borrow_mut().fetchers.redirect_ids.insert(key.clone());
                self.update_fetcher_state(&key, Fetcher::loading(Some(submission.clone()), None), false);
                return self
                    .start_redirect_navigation(
                        &request.url,
                        redirect,
                        RedirectOptions {
                            fetcher_submission: Some(submission),
                            prevent_scroll_reset,
                            ..RedirectOptions::default()
                        },
                    )
                    .await;
            }
            DataResult::Error(error) => {
                self.set_fetcher_error(&key, &route_id, error, false);
                return Ok(());
            }
            DataResult::Deferred(_) => {
                self.set_fetcher_error(&key, &route_id, InternalError::DeferInAction.into(), false);
                return Ok(());
            }
            DataResult::Data(value) => value,
        };

        // Revalidate the page the user is on (or is heading to).
        let state = self.state();
        let next_location = state
            .navigation
            .location()
            .cloned()
            .unwrap_or_else(|| state.location.clone());
        let next_matches = if state.navigation.is_idle() {
            Some(state.matches.clone())
        } else {
            self.match_location(&next_location.pathname)
        };
        let Some(next_matches) = next_matches else {
            debug_log!("Nothing to revalidate after fetcher '{}' submission", key);
            self.update_fetcher_state(&key, Fetcher::idle(Some(action_data)), false);
            return Ok(());
        };
        let load_id = {
            let mut core = self.inner.core.borrow_mut();
            core.incrementing_load_id += 1;
            let load_id = core.incrementing_load_id;
            core.fetchers.reload_ids.insert(key.clone(), load_id);
            load_id
        };

        let pending = PendingActionResult {
            route_id: target.route_id().to_string(),
            result: DataResult::Data(action_data.clone()),
        };
        let plan = self.plan_loads(
            &state,
            &next_matches,
            Some(&submission),
            &next_location,
            Some(&pending),
            false,
        )?;
        let others: Vec<_> = plan.fetchers.iter().filter(|f| f.key != key).cloned().collect();
        let mut updates = revalidating_fetcher_states(&state, &others);
        updates.push((key.clone(), Some(Fetcher::loading(Some(submission), Some(action_data.clone())))));
        self.install_revalidating_controllers(&others);
        self.update_state(false, move |state| apply_fetcher_updates(&mut state.fetchers, updates));

        let reload_request = self.create_request(&next_location.path(), controller.signal(), None)?;
        let (loader_results, fetcher_results) = self
            .call_loaders_and_fetchers(&next_matches, &plan, &reload_request)
            .await;
        if reload_request.signal.is_aborted() {
            return Ok(());
        }
        {
            let mut core = self.inner.core.borrow_mut();
            core.fetchers.reload_ids.remove(&key);
            core.fetchers.release_controller(&key, &reload_request.signal);
        }
        self.release_revalidating_controllers(&plan.fetchers);

        if let Some(redirect) = find_redirect(&loader_results) {
            return self
                .start_redirect_navigation(&reload_request.url, redirect, RedirectOptions::default())
                .await;
        }
        if let Some((redirect_key, redirect)) = find_fetcher_redirect(&plan.fetchers, &fetcher_results) {
            self.inner.core.borrow_mut().fetchers.redirect_ids.insert(redirect_key);
            return self
                .start_redirect_navigation(&reload_request.url, redirect, RedirectOptions::default())
                .await;
        }

        let (loader_data, errors, mut fetchers, deferreds) =
            self.process_loader_data(&next_matches, loader_results, None, &plan.fetchers, fetcher_results);
        self.register_deferreds(deferreds);
        if self.state().fetchers.contains_key(&key) {
            fetchers.push((key.clone(), Some(Fetcher::idle(Some(action_data)))));
        }
        fetchers.extend(self.abort_stale_fetch_loads(load_id));

        let state = self.state();
        let navigation_is_older = {
            let core = self.inner.core.borrow();
            matches!(state.navigation, Navigation::Loading { .. })
                && core.pending_navigation_load_id.is_some_and(|id| load_id > id)
        };
        if let (true, Some(location)) = (navigation_is_older, state.navigation.location().cloned()) {
            debug_log!("Fetcher '{}' revalidation lands the pending navigation", key);
            let pending = self.inner.core.borrow_mut().pending_navigation_controller.take();
            if let Some(pending) = pending {
                pending.abort();
            }
            let new_state = NewState {
                matches: next_matches,
                loader_data: Some(loader_data),
                errors: Some(errors),
                action_data: None,
                fetchers,
            };
            self.complete_navigation(location, new_state, false);
        } else {
            let merged = merge_loader_data(&state.loader_data, &loader_data, &next_matches, Some(&errors));
            self.update_state(false, move |state| {
                state.errors = errors;
                state.loader_data = merged;
                apply_fetcher_updates(&mut state.fetchers, fetchers);
            });
            self.inner.core.borrow_mut().is_revalidation_required = false;
        }
        Ok(())
    }

    /// Subscribe to `key`; the fetcher stays in state while referenced.
    pub fn get_fetcher(&self, key: &str) -> Fetcher {
        let mut core = self.inner.core.borrow_mut();
        *core.fetchers.active.entry(key.to_string()).or_insert(0) += 1;
        core.fetchers.deleted.remove(key);
        drop(core);
        self.state().fetcher(key)
    }

    /// Drop one reference to `key`. The last release schedules deletion
    /// unless fetchers persist.
    pub fn release_fetcher(&self, key: &str) {
        let mark_deleted = {
            let mut core = self.inner.core.borrow_mut();
            let count = core.fetchers.active.get(key).copied().unwrap_or(0);
            if count > 1 {
                core.fetchers.active.insert(key.to_string(), count - 1);
                false
            } else {
                core.fetchers.active.remove(key);
                if !core.persist_fetchers {
                    core.fetchers.deleted.insert(key.to_string());
                }
                !core.persist_fetchers
            }
        };
        if mark_deleted {
            trace_log!("Fetcher '{}' released", key);
            self.update_state(false, |_| {});
        }
    }

    /// Remove `key` now, aborting whatever it is doing.
    pub fn delete_fetcher(&self, key: &str) {
        let state = self.state();
        {
            let mut core = self.inner.core.borrow_mut();
            core.fetchers.forget(key, state.fetchers.get(key));
            core.fetchers.active.remove(key);
        }
        let owned = key.to_string();
        self.update_state_with(false, vec![key.to_string()], move |state| {
            state.fetchers.remove(&owned);
        });
    }

    fn set_fetcher_error(&self, key: &str, route_id: &str, error: RouteError, flush_sync: bool) {
        let state = self.state();
        let boundary_id = find_nearest_boundary(&state.matches, Some(route_id));
        debug_log!("Fetcher '{}' failed; boundary '{}': {}", key, boundary_id, error);
        self.inner
            .core
            .borrow_mut()
            .fetchers
            .forget(key, state.fetchers.get(key));
        let owned = key.to_string();
        self.update_state(flush_sync, move |state| {
            state.loader_data.insert(boundary_id.clone(), None);
            state.errors = HashMap::from([(boundary_id, error)]);
            state.fetchers.remove(&owned);
        });
    }

    fn update_fetcher_state(&self, key: &str, fetcher: Fetcher, flush_sync: bool) {
        let owned = key.to_string();
        self.update_state(flush_sync, move |state| {
            state.fetchers.insert(owned, fetcher);
        });
    }
}

/// Pair discovered matches with their target; `None` means a 404.
fn with_target(found: Option<Vec<RouteMatch>>, path: &str) -> Option<(Vec<RouteMatch>, RouteMatch)> {
    let found = found?;
    let target = get_target_match(&found, &Path::parse(path).search).cloned()?;
    Some((found, target))
}

/// A resolved fetch, ready to run.
struct FetchRequest {
    key: String,
    route_id: String,
    path: String,
    matches: Vec<RouteMatch>,
    target: RouteMatch,
    fog_active: bool,
    flush_sync: bool,
    prevent_scroll_reset: bool,
}
