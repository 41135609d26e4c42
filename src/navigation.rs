//! The navigation state machine.
//!
//! A navigation moves `Idle -> Submitting -> Loading -> Idle` (mutations) or
//! `Idle -> Loading -> Idle`. Redirects restart the machine at the new
//! location without passing through `Idle`. Every phase checks its abort
//! signal after each await, so a superseded navigation never commits.

use crate::abort::{abortable, AbortController, AbortSignal};
use crate::blocker::BlockedNavigation;
use crate::deferred::{DeferredData, DeferredError};
use crate::discovery::Discovery;
use crate::error::{InternalError, RouteError, RouterError};
use crate::fetcher::apply_fetcher_updates;
use crate::handler::{DataResult, HandlerArgs, Redirect, Request};
use crate::history::{create_location, HistoryAction, Location, REDIRECT_STATE_KEY};
use crate::matching::{path_contributing_matches, RouteMatch};
use crate::params::{has_naked_index_query, RouteParams, SearchParams};
use crate::path::{is_hash_change_only, join_paths, resolve_to, strip_basename, Path};
use crate::revalidation::{LoadPlan, RevalidatingFetcher};
use crate::route::DataRoute;
use crate::router::{NavigateOptions, Router};
use crate::state::{Blocker, Fetcher, FetcherState, LoaderData, Navigation, RevalidationState, RouterState};
use crate::submission::{normalize_submission, FormMethod, NormalizedTarget, Submission};
use crate::{debug_log, error_log, info_log, trace_log};
use futures::future::{self, join_all, LocalBoxFuture};
use futures::FutureExt;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use url::Url;

/// Redirects one navigation may follow before it is abandoned.
pub(crate) const MAX_REDIRECT_DEPTH: usize = 20;

// ============================================================================
// Types
// ============================================================================

/// Outcome of an action, carried into the loader phase.
#[derive(Debug, Clone)]
pub(crate) struct PendingActionResult {
    /// The action's route, or the boundary that owns its error.
    pub route_id: String,
    pub result: DataResult,
}

#[derive(Debug, Default)]
pub(crate) struct StartOptions {
    pub submission: Option<Submission>,
    /// Submission of the fetcher whose redirect started this navigation.
    pub fetcher_submission: Option<Submission>,
    /// Error found before any handler ran (bad submission body and such).
    pub pending_error: Option<RouteError>,
    pub override_navigation: Option<Navigation>,
    pub prevent_scroll_reset: bool,
    pub replace: Option<bool>,
    pub flush_sync: bool,
    pub start_uninterrupted_revalidation: bool,
    pub initial_hydration: bool,
}

/// Staged result of a navigation, applied by [`Router::complete_navigation`].
#[derive(Debug, Default)]
pub(crate) struct NewState {
    pub matches: Vec<RouteMatch>,
    /// `None` keeps the current loader data untouched.
    pub loader_data: Option<HashMap<String, Option<LoaderData>>>,
    /// `None` keeps the current errors.
    pub errors: Option<HashMap<String, RouteError>>,
    pub action_data: Option<HashMap<String, Value>>,
    pub fetchers: Vec<(String, Option<Fetcher>)>,
}

impl NewState {
    fn matched(matches: Vec<RouteMatch>) -> Self {
        Self {
            matches,
            ..Self::default()
        }
    }

    fn failed(matches: Vec<RouteMatch>, boundary_id: String, error: RouteError) -> Self {
        Self {
            matches,
            loader_data: Some(HashMap::new()),
            errors: Some(HashMap::from([(boundary_id, error)])),
            ..Self::default()
        }
    }
}

enum ActionOutcome {
    ShortCircuited,
    Continue {
        matches: Vec<RouteMatch>,
        pending: Option<PendingActionResult>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandlerKind {
    Loader,
    Action,
}

#[derive(Debug, Default)]
pub(crate) struct RedirectOptions {
    pub submission: Option<Submission>,
    pub fetcher_submission: Option<Submission>,
    pub replace: bool,
    pub prevent_scroll_reset: bool,
}

/// Loader data, errors, fetcher updates and new deferreds of one load round.
pub(crate) type ProcessedLoads = (
    HashMap<String, Option<LoaderData>>,
    HashMap<String, RouteError>,
    Vec<(String, Option<Fetcher>)>,
    Vec<(String, DeferredData)>,
);

// ============================================================================
// Navigation
// ============================================================================

impl Router {
    pub(crate) async fn navigate_to(&self, to: String, opts: NavigateOptions) -> Result<(), RouterError> {
        self.inner.core.borrow_mut().redirect_depth = 0;
        let state = self.state();
        let path = self.normalize_to(
            &state.location.path(),
            &state.matches,
            &to,
            opts.from_route_id.as_deref(),
            opts.path_relative,
        );
        let NormalizedTarget {
            path,
            submission,
            error,
        } = normalize_submission(false, path, opts.submission.clone());

        let location = create_location(&state.location, &path, opts.state.clone());
        let encoded = self.encode_location(&location.path());
        let location = Location {
            pathname: encoded.pathname,
            search: encoded.search,
            hash: encoded.hash,
            ..location
        };

        let action = match opts.replace {
            Some(true) => HistoryAction::Replace,
            Some(false) => HistoryAction::Push,
            None => {
                let current = format!("{}{}", state.location.pathname, state.location.search);
                let resubmits_current = submission
                    .as_ref()
                    .is_some_and(|s| s.form_method.is_mutation() && s.form_action == current);
                if resubmits_current {
                    HistoryAction::Replace
                } else {
                    HistoryAction::Push
                }
            }
        };

        if let Some(key) = self.should_block_navigation(&state.location, &location, action) {
            return self.block(&key, location, BlockedNavigation::Navigate { to, opts });
        }

        info_log!(
            "Navigation {}: '{}' -> '{}'",
            action,
            state.location.href(),
            location.href()
        );
        self.start_navigation(
            action,
            location,
            StartOptions {
                submission,
                pending_error: error.map(RouteError::from),
                prevent_scroll_reset: opts.prevent_scroll_reset,
                replace: opts.replace,
                flush_sync: opts.flush_sync,
                ..StartOptions::default()
            },
        )
        .await
    }

    /// Boxed so redirects can start a navigation from inside one.
    pub(crate) fn start_navigation(
        &self,
        action: HistoryAction,
        location: Location,
        opts: StartOptions,
    ) -> LocalBoxFuture<'static, Result<(), RouterError>> {
        let this = self.clone();
        async move { this.run_navigation(action, location, opts).await }.boxed_local()
    }

    async fn run_navigation(
        &self,
        action: HistoryAction,
        location: Location,
        opts: StartOptions,
    ) -> Result<(), RouterError> {
        self.ensure_active()?;
        let StartOptions {
            submission,
            fetcher_submission,
            pending_error,
            override_navigation,
            prevent_scroll_reset,
            replace,
            mut flush_sync,
            start_uninterrupted_revalidation,
            initial_hydration,
        } = opts;

        let previous = {
            let mut core = self.inner.core.borrow_mut();
            core.pending_action = action;
            core.is_uninterrupted_revalidation = start_uninterrupted_revalidation;
            core.pending_prevent_scroll_reset = prevent_scroll_reset;
            core.pending_navigation_controller.take()
        };
        if let Some(previous) = previous {
            if previous.abort() {
                debug_log!("Aborted the in-flight navigation");
            }
        }

        let state = self.state();
        let mut matches = self.match_location(&location.pathname);
        let fog = self.check_fog_of_war(matches.as_deref(), &location.pathname);
        if fog.active {
            if let Some(partial) = fog.matches {
                matches = Some(partial);
            }
        }
        let Some(mut matches) = matches else {
            let (matches, boundary_id, error) = self.navigational_404(&location.pathname);
            self.complete_navigation(location, NewState::failed(matches, boundary_id, error), flush_sync);
            return Ok(());
        };

        let (required, forced) = {
            let core = self.inner.core.borrow();
            (core.is_revalidation_required, core.force_revalidation)
        };
        let is_mutation = submission.as_ref().is_some_and(|s| s.form_method.is_mutation());
        let unchanged = location.path() == state.location.path()
            && submission.is_none()
            && override_navigation.is_none()
            && pending_error.is_none();
        if state.initialized
            && !required
            && !forced
            && !is_mutation
            && (unchanged || is_hash_change_only(&state.location.path(), &location.path()))
        {
            debug_log!("No data to load for '{}'", location.href());
            self.complete_navigation(location, NewState::matched(matches), flush_sync);
            return Ok(());
        }

        let controller = AbortController::new();
        self.inner.core.borrow_mut().pending_navigation_controller = Some(controller.clone());
        let mut request =
            self.create_request(&location.path(), controller.signal(), submission.clone())?;
        let mut loading_navigation = override_navigation;
        let mut fog_active = fog.active;
        let mut pending_action_result = None;

        if let Some(error) = pending_error {
            pending_action_result = Some(PendingActionResult {
                route_id: find_nearest_boundary(&matches, None),
                result: DataResult::Error(error),
            });
        } else if let Some(mutation) = submission.as_ref().filter(|s| s.form_method.is_mutation()) {
            let outcome = self
                .handle_action(&request, &location, mutation, matches, fog_active, replace, flush_sync)
                .await?;
            let (action_matches, pending) = match outcome {
                ActionOutcome::ShortCircuited => return Ok(()),
                ActionOutcome::Continue { matches, pending } => (matches, pending),
            };
            if let Some(PendingActionResult {
                route_id,
                result: DataResult::Error(error),
            }) = &pending
            {
                if error.status() == Some(404) {
                    self.clear_pending_navigation(&request.signal);
                    let failed = NewState::failed(action_matches, route_id.clone(), error.clone());
                    self.complete_navigation(location, failed, false);
                    return Ok(());
                }
            }
            matches = action_matches;
            pending_action_result = pending;
            loading_navigation = Some(Navigation::Loading {
                location: location.clone(),
                submission: Some(mutation.clone()),
            });
            flush_sync = false;
            fog_active = false;
            request = Request {
                method: FormMethod::Get,
                submission: None,
                ..request
            };
        }

        let signal = request.signal.clone();
        let loaded = self
            .handle_loaders(
                request,
                &location,
                matches,
                fog_active,
                loading_navigation,
                submission,
                fetcher_submission,
                replace.unwrap_or(action == HistoryAction::Replace),
                initial_hydration,
                flush_sync,
                pending_action_result,
            )
            .await?;
        let Some(new_state) = loaded else {
            return Ok(());
        };
        self.clear_pending_navigation(&signal);
        self.complete_navigation(location, new_state, false);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_action(
        &self,
        request: &Request,
        location: &Location,
        submission: &Submission,
        mut matches: Vec<RouteMatch>,
        fog_active: bool,
        replace: Option<bool>,
        flush_sync: bool,
    ) -> Result<ActionOutcome, RouterError> {
        self.interrupt_active_loads();
        let navigation = Navigation::Submitting {
            location: location.clone(),
            submission: submission.clone(),
        };
        self.update_state(flush_sync, |state| state.navigation = navigation);
        debug_log!("Submitting {} to '{}'", submission.form_method, location.href());

        if fog_active {
            match self
                .discover_routes(matches, &location.pathname, &request.signal, None)
                .await
            {
                Discovery::Aborted => return Ok(ActionOutcome::ShortCircuited),
                Discovery::Error {
                    error,
                    partial_matches,
                } => {
                    let route_id = find_nearest_boundary(&partial_matches, None);
                    return Ok(ActionOutcome::Continue {
                        matches: partial_matches,
                        pending: Some(PendingActionResult {
                            route_id,
                            result: DataResult::Error(error),
                        }),
                    });
                }
                Discovery::Matched(None) => {
                    let (matches, route_id, error) = self.navigational_404(&location.pathname);
                    return Ok(ActionOutcome::Continue {
                        matches,
                        pending: Some(PendingActionResult {
                            route_id,
                            result: DataResult::Error(error),
                        }),
                    });
                }
                Discovery::Matched(Some(found)) => matches = found,
            }
        }

        let Some(action_match) = get_target_match(&matches, &location.search).cloned() else {
            let (matches, route_id, error) = self.navigational_404(&location.pathname);
            return Ok(ActionOutcome::Continue {
                matches,
                pending: Some(PendingActionResult {
                    route_id,
                    result: DataResult::Error(error),
                }),
            });
        };
        let result = self
            .call_handler(HandlerKind::Action, request, &action_match, &matches)
            .await;
        let Some(result) = result.filter(|_| !request.signal.is_aborted()) else {
            return Ok(ActionOutcome::ShortCircuited);
        };

        match result {
            DataResult::Redirect(redirect) => {
                let replace = replace.unwrap_or_else(|| {
                    let target = self.normalize_redirect_location(&redirect.location, &request.url);
                    let state = self.state();
                    target == format!("{}{}", state.location.pathname, state.location.search)
                });
                self.start_redirect_navigation(
                    &request.url,
                    redirect,
                    RedirectOptions {
                        submission: Some(submission.clone()),
                        replace,
                        ..RedirectOptions::default()
                    },
                )
                .await?;
                Ok(ActionOutcome::ShortCircuited)
            }
            DataResult::Error(error) => {
                let route_id = find_nearest_boundary(&matches, Some(action_match.route_id()));
                debug_log!("Action of '{}' failed; boundary '{}'", action_match.route_id(), route_id);
                if replace != Some(true) {
                    self.inner.core.borrow_mut().pending_action = HistoryAction::Push;
                }
                Ok(ActionOutcome::Continue {
                    matches,
                    pending: Some(PendingActionResult {
                        route_id,
                        result: DataResult::Error(error),
                    }),
                })
            }
            result => Ok(ActionOutcome::Continue {
                pending: Some(PendingActionResult {
                    route_id: action_match.route_id().to_string(),
                    result,
                }),
                matches,
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_loaders(
        &self,
        request: Request,
        location: &Location,
        mut matches: Vec<RouteMatch>,
        fog_active: bool,
        override_navigation: Option<Navigation>,
        submission: Option<Submission>,
        fetcher_submission: Option<Submission>,
        replace: bool,
        initial_hydration: bool,
        flush_sync: bool,
        pending: Option<PendingActionResult>,
    ) -> Result<Option<NewState>, RouterError> {
        let loading_navigation = override_navigation.unwrap_or_else(|| Navigation::Loading {
            location: location.clone(),
            submission: submission.clone(),
        });
        let active_submission = submission
            .or(fetcher_submission)
            .or_else(|| loading_navigation.submission().cloned());
        let should_update_navigation = !self.inner.core.borrow().is_uninterrupted_revalidation;

        if fog_active {
            if should_update_navigation {
                let navigation = loading_navigation.clone();
                let action_data = updated_action_data(pending.as_ref());
                self.update_state(flush_sync, move |state| {
                    state.navigation = navigation;
                    if let Some(action_data) = action_data {
                        state.action_data = action_data;
                    }
                });
            }
            match self
                .discover_routes(matches, &location.pathname, &request.signal, None)
                .await
            {
                Discovery::Aborted => return Ok(None),
                Discovery::Error {
                    error,
                    partial_matches,
                } => {
                    let boundary_id = find_nearest_boundary(&partial_matches, None);
                    return Ok(Some(NewState::failed(partial_matches, boundary_id, error)));
                }
                Discovery::Matched(None) => {
                    let (matches, boundary_id, error) = self.navigational_404(&location.pathname);
                    return Ok(Some(NewState::failed(matches, boundary_id, error)));
                }
                Discovery::Matched(Some(found)) => matches = found,
            }
        }

        let state = self.state();
        let plan = self.plan_loads(
            &state,
            &matches,
            active_submission.as_ref(),
            location,
            pending.as_ref(),
            initial_hydration,
        )?;

        self.cancel_active_deferreds(|route_id| {
            !matches.iter().any(|m| m.route_id() == route_id)
                || plan.matches_to_load.iter().any(|m| m.route_id() == route_id)
        });
        let load_id = {
            let mut core = self.inner.core.borrow_mut();
            core.incrementing_load_id += 1;
            core.pending_navigation_load_id = Some(core.incrementing_load_id);
            core.incrementing_load_id
        };

        if plan.matches_to_load.is_empty() && plan.fetchers.is_empty() {
            debug_log!("No loaders to run for '{}'", location.href());
            let errors = match &pending {
                Some(PendingActionResult {
                    route_id,
                    result: DataResult::Error(error),
                }) => HashMap::from([(route_id.clone(), error.clone())]),
                _ => HashMap::new(),
            };
            let mut fetchers = self.mark_fetch_redirects_done();
            fetchers.extend(self.abort_stale_fetch_loads(load_id));
            let new_state = NewState {
                matches,
                loader_data: Some(HashMap::new()),
                errors: Some(errors),
                action_data: action_data_for_commit(pending.as_ref()),
                fetchers,
            };
            self.clear_pending_navigation(&request.signal);
            self.complete_navigation(location.clone(), new_state, flush_sync);
            return Ok(None);
        }

        if should_update_navigation {
            let navigation = (!fog_active).then(|| loading_navigation.clone());
            let action_data = if fog_active {
                None
            } else {
                updated_action_data(pending.as_ref())
            };
            let revalidating = revalidating_fetcher_states(&state, &plan.fetchers);
            self.update_state(flush_sync, move |state| {
                if let Some(navigation) = navigation {
                    state.navigation = navigation;
                }
                if let Some(action_data) = action_data {
                    state.action_data = action_data;
                }
                apply_fetcher_updates(&mut state.fetchers, revalidating);
            });
        }

        debug_log!(
            "Running {} loaders and {} fetcher loads for '{}'",
            plan.matches_to_load.len(),
            plan.fetchers.len(),
            location.href()
        );
        self.install_revalidating_controllers(&plan.fetchers);
        let (loader_results, fetcher_results) =
            self.call_loaders_and_fetchers(&matches, &plan, &request).await;
        self.release_revalidating_controllers(&plan.fetchers);
        if request.signal.is_aborted() {
            return Ok(None);
        }

        if let Some(redirect) = find_redirect(&loader_results) {
            self.start_redirect_navigation(
                &request.url,
                redirect,
                RedirectOptions {
                    replace,
                    ..RedirectOptions::default()
                },
            )
            .await?;
            return Ok(None);
        }
        if let Some((key, redirect)) = find_fetcher_redirect(&plan.fetchers, &fetcher_results) {
            self.inner.core.borrow_mut().fetchers.redirect_ids.insert(key);
            self.start_redirect_navigation(
                &request.url,
                redirect,
                RedirectOptions {
                    replace,
                    ..RedirectOptions::default()
                },
            )
            .await?;
            return Ok(None);
        }

        let (loader_data, errors, mut fetchers, deferreds) = self.process_loader_data(
            &matches,
            loader_results,
            pending.as_ref(),
            &plan.fetchers,
            fetcher_results,
        );
        self.register_deferreds(deferreds);
        let errors = if initial_hydration {
            let mut merged = state.errors.clone();
            merged.extend(errors);
            merged
        } else {
            errors
        };
        fetchers.extend(self.mark_fetch_redirects_done());
        fetchers.extend(self.abort_stale_fetch_loads(load_id));

        Ok(Some(NewState {
            matches,
            loader_data: Some(loader_data),
            errors: Some(errors),
            action_data: action_data_for_commit(pending.as_ref()),
            fetchers,
        }))
    }

    /// Commit a finished navigation: one snapshot, one notification.
    pub(crate) fn complete_navigation(&self, location: Location, new_state: NewState, flush_sync: bool) {
        let state = self.state();
        let is_action_reload = !state.action_data.is_empty()
            && state.navigation.is_action_reload()
            && !location.is_redirect();
        let action_data = match new_state.action_data {
            Some(action_data) => action_data,
            None if is_action_reload => state.action_data.clone(),
            None => HashMap::new(),
        };
        let loader_data = match &new_state.loader_data {
            Some(loaded) => merge_loader_data(
                &state.loader_data,
                loaded,
                &new_state.matches,
                new_state.errors.as_ref(),
            ),
            None => state.loader_data.clone(),
        };
        let submitted_mutation = state
            .navigation
            .submission()
            .is_some_and(|s| s.form_method.is_mutation());

        let (action, prevent_scroll_reset, uninterrupted) = {
            let mut core = self.inner.core.borrow_mut();
            let committed = (
                core.pending_action,
                core.pending_prevent_scroll_reset || (submitted_mutation && !location.is_redirect()),
                core.is_uninterrupted_revalidation,
            );
            core.blockers.blocked.clear();
            core.pending_action = HistoryAction::Pop;
            core.pending_prevent_scroll_reset = false;
            core.is_uninterrupted_revalidation = false;
            core.is_revalidation_required = false;
            core.force_revalidation = false;
            core.cancelled_deferred_routes.clear();
            core.redirect_depth = 0;
            committed
        };

        if !uninterrupted {
            match action {
                HistoryAction::Pop => {}
                HistoryAction::Push => self.inner.history.borrow_mut().push(&location),
                HistoryAction::Replace => self.inner.history.borrow_mut().replace(&location),
            }
        }

        info_log!("Navigation committed: {} '{}'", action, location.href());
        let NewState {
            matches,
            errors,
            fetchers,
            ..
        } = new_state;
        self.update_state(flush_sync, move |state| {
            state.matches = matches;
            if let Some(errors) = errors {
                state.errors = errors;
            }
            state.action_data = action_data;
            state.loader_data = loader_data;
            state.history_action = action;
            state.location = location;
            state.initialized = true;
            state.navigation = Navigation::Idle;
            state.revalidation = RevalidationState::Idle;
            state.prevent_scroll_reset = prevent_scroll_reset;
            for blocker in state.blockers.values_mut() {
                *blocker = Blocker::unblocked();
            }
            apply_fetcher_updates(&mut state.fetchers, fetchers);
        });
    }

    // ------------------------------------------------------------------------
    // Redirects
    // ------------------------------------------------------------------------

    pub(crate) async fn start_redirect_navigation(
        &self,
        request_url: &Url,
        redirect: Redirect,
        opts: RedirectOptions,
    ) -> Result<(), RouterError> {
        if redirect.revalidate {
            self.inner.core.borrow_mut().force_revalidation = true;
        }
        let target = self.normalize_redirect_location(&redirect.location, request_url);
        let replace = opts.replace || redirect.replace;

        let depth = {
            let mut core = self.inner.core.borrow_mut();
            core.redirect_depth += 1;
            core.redirect_depth
        };
        if depth > MAX_REDIRECT_DEPTH {
            error_log!("Redirect loop detected (depth {}) redirecting to '{}'", depth, target);
            {
                let mut core = self.inner.core.borrow_mut();
                core.redirect_depth = 0;
                core.pending_navigation_controller = None;
                core.pending_action = HistoryAction::Pop;
                core.force_revalidation = false;
            }
            let fetchers = self.mark_fetch_redirects_done();
            self.update_state(false, move |state| {
                state.navigation = Navigation::Idle;
                state.revalidation = RevalidationState::Idle;
                apply_fetcher_updates(&mut state.fetchers, fetchers);
            });
            return Err(RouterError::RedirectLoop {
                location: target,
                depth,
            });
        }

        if redirect.reload_document || is_absolute_url(&target) {
            info_log!("Redirect leaves the app: '{}'", target);
            {
                let mut core = self.inner.core.borrow_mut();
                core.pending_navigation_controller = None;
                core.pending_action = HistoryAction::Pop;
                core.is_uninterrupted_revalidation = false;
                core.force_revalidation = false;
            }
            self.inner.history.borrow_mut().navigate_document(&target, replace);
            let fetchers = self.mark_fetch_redirects_done();
            self.update_state(false, move |state| {
                state.navigation = Navigation::Idle;
                state.revalidation = RevalidationState::Idle;
                apply_fetcher_updates(&mut state.fetchers, fetchers);
            });
            return Ok(());
        }

        let state = self.state();
        let location = create_location(
            &state.location,
            &target,
            Some(json!({ REDIRECT_STATE_KEY: true })),
        );
        let action = if replace {
            HistoryAction::Replace
        } else {
            HistoryAction::Push
        };
        let prevent_scroll_reset = {
            let mut core = self.inner.core.borrow_mut();
            core.pending_navigation_controller = None;
            opts.prevent_scroll_reset || core.pending_prevent_scroll_reset
        };
        let submission = match (opts.submission, &opts.fetcher_submission) {
            (Some(submission), _) => Some(submission),
            (None, None) => state.navigation.submission().cloned(),
            (None, Some(_)) => None,
        };
        let active = submission.clone().or_else(|| opts.fetcher_submission.clone());
        debug_log!("Redirect {} to '{}'", redirect.status, target);

        let replace = replace.then_some(true);
        match active {
            Some(mut resubmission) if redirect.preserves_method() && resubmission.form_method.is_mutation() => {
                resubmission.form_action = target;
                self.start_navigation(
                    action,
                    location,
                    StartOptions {
                        submission: Some(resubmission),
                        prevent_scroll_reset,
                        replace,
                        ..StartOptions::default()
                    },
                )
                .await
            }
            _ => {
                let override_navigation = Navigation::Loading {
                    location: location.clone(),
                    submission,
                };
                self.start_navigation(
                    action,
                    location,
                    StartOptions {
                        override_navigation: Some(override_navigation),
                        fetcher_submission: opts.fetcher_submission,
                        prevent_scroll_reset,
                        replace,
                        ..StartOptions::default()
                    },
                )
                .await
            }
        }
    }

    /// Collapse same-origin absolute URLs inside the basename to a path.
    pub(crate) fn normalize_redirect_location(&self, location: &str, current: &Url) -> String {
        if !is_absolute_url(location) {
            return location.to_string();
        }
        let parsed = if location.starts_with("//") {
            Url::parse(&format!("{}:{}", current.scheme(), location))
        } else {
            Url::parse(location)
        };
        let Ok(url) = parsed else {
            return location.to_string();
        };
        let basename = self.basename();
        if url.origin() == current.origin() && strip_basename(url.path(), &basename).is_some() {
            let mut path = url.path().to_string();
            if let Some(query) = url.query() {
                path.push('?');
                path.push_str(query);
            }
            if let Some(fragment) = url.fragment() {
                path.push('#');
                path.push_str(fragment);
            }
            return path;
        }
        location.to_string()
    }

    // ------------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------------

    /// Run one route's loader or action. `None` means the request was aborted.
    pub(crate) async fn call_handler(
        &self,
        kind: HandlerKind,
        request: &Request,
        target: &RouteMatch,
        matches: &[RouteMatch],
    ) -> Option<DataResult> {
        let route = target.route.clone();
        if route.is_lazy_pending() {
            match abortable(&request.signal, route.load_lazy()).await? {
                Ok(()) => {}
                Err(error) => return Some(DataResult::Error(error)),
            }
        }

        let handler = match kind {
            HandlerKind::Loader => route.loader(),
            HandlerKind::Action => route.action(),
        };
        let Some(handler) = handler else {
            let pathname = request.pathname().to_string();
            let result = match kind {
                HandlerKind::Action => DataResult::Error(
                    InternalError::MethodNotAllowed {
                        method: request.method.as_str().to_string(),
                        pathname,
                        route_id: route.id.clone(),
                    }
                    .into(),
                ),
                HandlerKind::Loader if route.has_lazy() => DataResult::Data(Value::Null),
                HandlerKind::Loader => DataResult::Error(
                    InternalError::MissingLoader {
                        method: request.method.as_str().to_string(),
                        pathname,
                        route_id: route.id.clone(),
                    }
                    .into(),
                ),
            };
            return Some(result);
        };

        trace_log!("Calling {:?} of route '{}' for '{}'", kind, route.id, request.url);
        let args = HandlerArgs {
            request: request.clone(),
            params: target.params.clone(),
        };
        let result: DataResult = abortable(&request.signal, handler.call(args)).await?.into();
        let result = match result {
            DataResult::Redirect(mut redirect) => {
                redirect.location =
                    self.resolve_redirect_target(&redirect.location, &request.url, matches, &route.id);
                DataResult::Redirect(redirect)
            }
            DataResult::Deferred(_) if kind == HandlerKind::Action => {
                DataResult::Error(InternalError::DeferInAction.into())
            }
            DataResult::Deferred(deferred) => {
                if !self.spawn(deferred.drive()) {
                    trace_log!("No spawner; deferred data of '{}' is driven by the host", route.id);
                }
                DataResult::Deferred(deferred)
            }
            other => other,
        };
        Some(result)
    }

    /// Resolve a relative redirect against the routes up to `route_id`.
    fn resolve_redirect_target(&self, location: &str, url: &Url, matches: &[RouteMatch], route_id: &str) -> String {
        if is_absolute_url(location) {
            return location.to_string();
        }
        let end = matches
            .iter()
            .position(|m| m.route_id() == route_id)
            .map_or(matches.len(), |i| i + 1);
        let current = Path::new(url.path(), url.query().unwrap_or_default(), "");
        self.normalize_to(&current, &matches[..end], location, None, false)
    }

    pub(crate) async fn call_loaders_and_fetchers(
        &self,
        matches: &[RouteMatch],
        plan: &LoadPlan,
        request: &Request,
    ) -> (Vec<(String, DataResult)>, Vec<Option<DataResult>>) {
        let loaders = plan
            .matches_to_load
            .iter()
            .map(|m| self.call_handler(HandlerKind::Loader, request, m, matches));
        let fetchers = plan
            .fetchers
            .iter()
            .map(|f| self.call_revalidating_fetcher(f, &request.signal));
        let (loader_results, fetcher_results) = future::join(join_all(loaders), join_all(fetchers)).await;
        let loader_results = plan
            .matches_to_load
            .iter()
            .zip(loader_results)
            .filter_map(|(m, result)| result.map(|r| (m.route_id().to_string(), r)))
            .collect();
        (loader_results, fetcher_results)
    }

    async fn call_revalidating_fetcher(
        &self,
        fetcher: &RevalidatingFetcher,
        navigation_signal: &AbortSignal,
    ) -> Option<DataResult> {
        let (Some(matches), Some(target), Some(controller)) =
            (&fetcher.matches, &fetcher.target, &fetcher.controller)
        else {
            return Some(DataResult::Error(
                InternalError::NotFound {
                    pathname: fetcher.path.clone(),
                }
                .into(),
            ));
        };
        let request = match self.create_request(&Path::parse(&fetcher.path), controller.signal(), None) {
            Ok(request) => request,
            Err(error) => return Some(DataResult::Error(RouteError::new(error))),
        };
        let loaded = abortable(
            navigation_signal,
            self.call_handler(HandlerKind::Loader, &request, target, matches),
        )
        .await;
        match loaded {
            None => {
                controller.abort();
                None
            }
            Some(None) => None,
            Some(Some(result)) => unwrap_deferred(result, &request.signal).await,
        }
    }

    /// Turn handler results into staged loader data, errors and fetcher
    /// updates.
    pub(crate) fn process_loader_data(
        &self,
        matches: &[RouteMatch],
        loader_results: Vec<(String, DataResult)>,
        pending: Option<&PendingActionResult>,
        fetchers: &[RevalidatingFetcher],
        fetcher_results: Vec<Option<DataResult>>,
    ) -> ProcessedLoads {
        let (loader_data, mut errors, deferreds) =
            process_route_loader_data(matches, loader_results, pending);

        let state = self.state();
        let mut updates = Vec::new();
        for (fetcher, result) in fetchers.iter().zip(fetcher_results) {
            if fetcher.controller.as_ref().is_some_and(AbortController::is_aborted) {
                continue;
            }
            match result {
                None => {}
                Some(DataResult::Error(error)) => {
                    let boundary_id = find_nearest_boundary(
                        &state.matches,
                        fetcher.target.as_ref().map(RouteMatch::route_id),
                    );
                    errors.entry(boundary_id).or_insert(error);
                    updates.push((fetcher.key.clone(), None));
                }
                Some(DataResult::Data(value)) => {
                    updates.push((fetcher.key.clone(), Some(Fetcher::idle(Some(value)))));
                }
                Some(DataResult::Redirect(_) | DataResult::Deferred(_)) => {
                    trace_log!("Ignoring unexpected result for fetcher '{}'", fetcher.key);
                }
            }
        }
        (loader_data, errors, updates, deferreds)
    }

    /// Track deferred loader data until it settles or is cancelled.
    pub(crate) fn register_deferreds(&self, deferreds: Vec<(String, DeferredData)>) {
        for (route_id, deferred) in deferreds {
            if deferred.is_done() {
                continue;
            }
            let weak = Rc::downgrade(&self.inner);
            let id = route_id.clone();
            deferred.subscribe(move |_, _| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let Ok(mut core) = inner.core.try_borrow_mut() else {
                    return;
                };
                let finished = core
                    .active_deferreds
                    .get(&id)
                    .is_some_and(|d| d.is_done() || d.is_cancelled());
                if finished {
                    core.active_deferreds.remove(&id);
                }
            });
            self.inner
                .core
                .borrow_mut()
                .active_deferreds
                .insert(route_id, deferred);
        }
    }

    // ------------------------------------------------------------------------
    // Interruption
    // ------------------------------------------------------------------------

    /// Cancel tracked deferreds whose route id passes `filter`; returns their
    /// route ids.
    pub(crate) fn cancel_active_deferreds(&self, filter: impl Fn(&str) -> bool) -> Vec<String> {
        let cancelled: Vec<(String, DeferredData)> = {
            let mut core = self.inner.core.borrow_mut();
            let ids: Vec<String> = core
                .active_deferreds
                .keys()
                .filter(|id| filter(id))
                .cloned()
                .collect();
            ids.into_iter()
                .filter_map(|id| core.active_deferreds.remove(&id).map(|d| (id, d)))
                .collect()
        };
        cancelled
            .into_iter()
            .map(|(id, deferred)| {
                if !deferred.is_done() {
                    debug_log!("Cancelling deferred data of '{}'", id);
                    deferred.cancel();
                }
                id
            })
            .collect()
    }

    /// A mutation is starting: everything loaded so far must revalidate.
    pub(crate) fn interrupt_active_loads(&self) {
        self.inner.core.borrow_mut().is_revalidation_required = true;
        let cancelled = self.cancel_active_deferreds(|_| true);
        let mut core = self.inner.core.borrow_mut();
        core.cancelled_deferred_routes.extend(cancelled);
        let fetchers = &mut core.fetchers;
        let in_flight: Vec<String> = fetchers
            .load_matches
            .keys()
            .filter(|key| fetchers.controllers.contains_key(*key))
            .cloned()
            .collect();
        for key in in_flight {
            fetchers.abort(&key);
            fetchers.cancelled_loads.insert(key);
        }
    }

    fn navigational_404(&self, pathname: &str) -> (Vec<RouteMatch>, String, RouteError) {
        let (matches, route_id) = short_circuit_matches(self.inner.core.borrow().routes.roots());
        self.cancel_active_deferreds(|_| true);
        debug_log!("No routes match '{}'", pathname);
        let error = InternalError::NotFound {
            pathname: pathname.to_string(),
        };
        (matches, route_id, error.into())
    }

    fn clear_pending_navigation(&self, signal: &AbortSignal) {
        let mut core = self.inner.core.borrow_mut();
        if core
            .pending_navigation_controller
            .as_ref()
            .is_some_and(|c| c.signal().same_as(signal))
        {
            core.pending_navigation_controller = None;
        }
    }

    // ------------------------------------------------------------------------
    // Fetcher bookkeeping shared with navigations
    // ------------------------------------------------------------------------

    pub(crate) fn install_revalidating_controllers(&self, fetchers: &[RevalidatingFetcher]) {
        let mut core = self.inner.core.borrow_mut();
        for fetcher in fetchers {
            core.fetchers.abort(&fetcher.key);
            if let Some(controller) = &fetcher.controller {
                core.fetchers
                    .controllers
                    .insert(fetcher.key.clone(), controller.clone());
            }
        }
    }

    pub(crate) fn release_revalidating_controllers(&self, fetchers: &[RevalidatingFetcher]) {
        let mut core = self.inner.core.borrow_mut();
        for fetcher in fetchers {
            if let Some(controller) = &fetcher.controller {
                core.fetchers
                    .release_controller(&fetcher.key, &controller.signal());
            }
        }
    }

    /// Fetchers that redirected and are still loading go idle.
    pub(crate) fn mark_fetch_redirects_done(&self) -> Vec<(String, Option<Fetcher>)> {
        let state = self.state();
        let mut updates = Vec::new();
        self.inner
            .core
            .borrow_mut()
            .fetchers
            .redirect_ids
            .retain(|key| match state.fetchers.get(key) {
                Some(fetcher) if fetcher.state == FetcherState::Loading => {
                    updates.push((key.clone(), Some(Fetcher::idle(fetcher.data.clone()))));
                    false
                }
                _ => true,
            });
        updates
    }

    /// Abort fetcher loads older than `landed_id`. Revalidations settle idle
    /// with the data they had; fresh loads settle idle with none.
    pub(crate) fn abort_stale_fetch_loads(&self, landed_id: u64) -> Vec<(String, Option<Fetcher>)> {
        let state = self.state();
        let mut core = self.inner.core.borrow_mut();
        let fetchers = &mut core.fetchers;
        let stale: BTreeSet<String> = fetchers
            .reload_ids
            .iter()
            .chain(fetchers.load_ids.iter())
            .filter(|(_, id)| **id < landed_id)
            .map(|(key, _)| key.clone())
            .collect();
        let mut updates = Vec::new();
        for key in stale {
            let Some(fetcher) = state.fetchers.get(&key).filter(|f| !f.is_idle()) else {
                continue;
            };
            debug_log!("Aborting stale load of fetcher '{}'", key);
            fetchers.abort(&key);
            let revalidating = fetchers.reload_ids.remove(&key).is_some();
            fetchers.load_ids.remove(&key);
            let data = if revalidating { fetcher.data.clone() } else { None };
            updates.push((key, Some(Fetcher::idle(data))));
        }
        updates
    }

    // ------------------------------------------------------------------------
    // Paths and requests
    // ------------------------------------------------------------------------

    /// Resolve `to` against the matched route chain and prepend the
    /// basename.
    pub(crate) fn normalize_to(
        &self,
        location: &Path,
        matches: &[RouteMatch],
        to: &str,
        from_route_id: Option<&str>,
        path_relative: bool,
    ) -> String {
        let (contextual, active) = match from_route_id {
            Some(id) => match matches.iter().position(|m| m.route_id() == id) {
                Some(i) => (&matches[..=i], matches.get(i)),
                None => (matches, None),
            },
            None => (matches, matches.last()),
        };
        let basename = self.basename();
        let route_pathnames: Vec<String> = path_contributing_matches(contextual)
            .iter()
            .map(|m| m.pathname_base.clone())
            .collect();
        let location_pathname =
            strip_basename(&location.pathname, &basename).unwrap_or(&location.pathname);
        let to = if to.is_empty() { "." } else { to };
        let mut path = resolve_to(to, &route_pathnames, location_pathname, path_relative);

        if to == "." {
            if let Some(active) = active {
                let naked_index = has_naked_index_query(&path.search);
                if active.route.index && !naked_index {
                    path.search = match path.search.strip_prefix('?') {
                        Some(rest) if !rest.is_empty() => format!("?index&{}", rest),
                        _ => "?index".to_string(),
                    };
                } else if !active.route.index && naked_index {
                    let mut params = SearchParams::parse(&path.search);
                    let kept: Vec<String> = params
                        .get_all("index")
                        .into_iter()
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                        .collect();
                    params.delete("index");
                    for value in kept {
                        params.append("index", value);
                    }
                    let query = params.to_string();
                    path.search = if query.is_empty() {
                        String::new()
                    } else {
                        format!("?{}", query)
                    };
                }
            }
        }

        if basename != "/" {
            path.pathname = if path.pathname == "/" {
                basename
            } else {
                join_paths(&[&basename, &path.pathname])
            };
        }
        path.to_string()
    }

    pub(crate) fn create_url(&self, path: &Path) -> Result<Url, RouterError> {
        let path = Path {
            hash: String::new(),
            ..path.clone()
        };
        self.inner
            .history
            .borrow()
            .create_url(&path)
            .map_err(|_| RouterError::InvalidUrl {
                url: path.to_string(),
            })
    }

    /// Request for `path`; only mutations carry their submission.
    pub(crate) fn create_request(
        &self,
        path: &Path,
        signal: AbortSignal,
        submission: Option<Submission>,
    ) -> Result<Request, RouterError> {
        let submission = submission.filter(|s| s.form_method.is_mutation());
        Ok(Request {
            method: submission.as_ref().map_or(FormMethod::Get, |s| s.form_method),
            url: self.create_url(path)?,
            signal,
            submission,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `scheme:` or protocol-relative `//host` URLs.
pub(crate) fn is_absolute_url(location: &str) -> bool {
    if location.starts_with("//") {
        return true;
    }
    let Some((scheme, _)) = location.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

/// Matches used when nothing matched: the root (or a shim) alone.
pub(crate) fn short_circuit_matches(roots: &[Rc<DataRoute>]) -> (Vec<RouteMatch>, String) {
    let route = match roots {
        [only] => only.clone(),
        _ => roots
            .iter()
            .find(|r| r.index || r.path.as_deref().map_or(true, |p| p.is_empty() || p == "/"))
            .cloned()
            .unwrap_or_else(|| Rc::new(DataRoute::shim())),
    };
    let route_id = route.id.clone();
    let matches = vec![RouteMatch {
        route,
        params: RouteParams::new(),
        pathname: String::new(),
        pathname_base: String::new(),
    }];
    (matches, route_id)
}

/// The match a submission or fetch targets: a leaf index route when the
/// search carries a naked `?index`, else the deepest route with a path.
pub(crate) fn get_target_match<'a>(matches: &'a [RouteMatch], search: &str) -> Option<&'a RouteMatch> {
    if let Some(last) = matches.last() {
        if last.route.index && has_naked_index_query(search) {
            return Some(last);
        }
    }
    path_contributing_matches(matches).last().copied()
}

/// Deepest error boundary at or above `route_id`, falling back to the root.
pub(crate) fn find_nearest_boundary(matches: &[RouteMatch], route_id: Option<&str>) -> String {
    let eligible = match route_id {
        Some(id) => matches
            .iter()
            .position(|m| m.route_id() == id)
            .map_or(&matches[..0], |i| &matches[..=i]),
        None => matches,
    };
    eligible
        .iter()
        .rev()
        .find(|m| m.route.has_error_boundary())
        .or_else(|| matches.first())
        .map_or_else(
            || DataRoute::SHIM_ERROR_ROUTE_ID.to_string(),
            |m| m.route.id.clone(),
        )
}

fn process_route_loader_data(
    matches: &[RouteMatch],
    results: Vec<(String, DataResult)>,
    pending: Option<&PendingActionResult>,
) -> (
    HashMap<String, Option<LoaderData>>,
    HashMap<String, RouteError>,
    Vec<(String, DeferredData)>,
) {
    let mut results: HashMap<String, DataResult> = results.into_iter().collect();
    let mut loader_data = HashMap::new();
    let mut errors: HashMap<String, RouteError> = HashMap::new();
    let mut deferreds = Vec::new();
    let mut pending_error = match pending {
        Some(PendingActionResult {
            result: DataResult::Error(error),
            ..
        }) => Some(error.clone()),
        _ => None,
    };

    for m in matches {
        let id = m.route_id();
        let Some(result) = results.remove(id) else {
            continue;
        };
        match result {
            DataResult::Error(error) => {
                // An action error outranks the loader errors it caused.
                let error = pending_error.take().unwrap_or(error);
                let boundary_id = find_nearest_boundary(matches, Some(id));
                errors.entry(boundary_id).or_insert(error);
                loader_data.insert(id.to_string(), None);
            }
            DataResult::Deferred(deferred) => {
                deferreds.push((id.to_string(), deferred.clone()));
                loader_data.insert(id.to_string(), Some(LoaderData::Deferred(deferred)));
            }
            DataResult::Data(value) => {
                loader_data.insert(id.to_string(), Some(LoaderData::Value(value)));
            }
            DataResult::Redirect(_) => {}
        }
    }

    if let (Some(error), Some(pending)) = (pending_error, pending) {
        errors = HashMap::from([(pending.route_id.clone(), error)]);
        loader_data.insert(pending.route_id.clone(), None);
    }
    for boundary_id in errors.keys() {
        loader_data.insert(boundary_id.clone(), None);
    }
    (loader_data, errors, deferreds)
}

/// Keep retained data for matched routes that did not reload, up to the
/// first errored route. Every route holding an error ends with no data.
pub(crate) fn merge_loader_data(
    current: &HashMap<String, Option<LoaderData>>,
    loaded: &HashMap<String, Option<LoaderData>>,
    matches: &[RouteMatch],
    errors: Option<&HashMap<String, RouteError>>,
) -> HashMap<String, Option<LoaderData>> {
    let mut merged = loaded.clone();
    for m in matches {
        let id = m.route_id();
        if !loaded.contains_key(id) && m.route.has_loader() {
            if let Some(Some(existing)) = current.get(id) {
                merged.insert(id.to_string(), Some(existing.clone()));
            }
        }
        if errors.is_some_and(|e| e.contains_key(id)) {
            break;
        }
    }
    for id in errors.into_iter().flat_map(HashMap::keys) {
        merged.insert(id.clone(), None);
    }
    merged
}

fn updated_action_data(pending: Option<&PendingActionResult>) -> Option<HashMap<String, Value>> {
    match pending {
        Some(PendingActionResult {
            route_id,
            result: DataResult::Data(value),
        }) => Some(HashMap::from([(route_id.clone(), value.clone())])),
        _ => None,
    }
}

fn action_data_for_commit(pending: Option<&PendingActionResult>) -> Option<HashMap<String, Value>> {
    pending.map(|pending| match &pending.result {
        DataResult::Data(value) => HashMap::from([(pending.route_id.clone(), value.clone())]),
        _ => HashMap::new(),
    })
}

pub(crate) fn revalidating_fetcher_states(
    state: &RouterState,
    fetchers: &[RevalidatingFetcher],
) -> Vec<(String, Option<Fetcher>)> {
    fetchers
        .iter()
        .map(|f| {
            let data = state.fetchers.get(&f.key).and_then(|x| x.data.clone());
            (f.key.clone(), Some(Fetcher::loading(None, data)))
        })
        .collect()
}

pub(crate) fn find_redirect(results: &[(String, DataResult)]) -> Option<Redirect> {
    results.iter().find_map(|(_, result)| match result {
        DataResult::Redirect(redirect) => Some(redirect.clone()),
        _ => None,
    })
}

pub(crate) fn find_fetcher_redirect(
    fetchers: &[RevalidatingFetcher],
    results: &[Option<DataResult>],
) -> Option<(String, Redirect)> {
    fetchers
        .iter()
        .zip(results)
        .find_map(|(fetcher, result)| match result {
            Some(DataResult::Redirect(redirect)) => Some((fetcher.key.clone(), redirect.clone())),
            _ => None,
        })
}

/// Wait for deferred data to settle and flatten it; fetchers never stream.
pub(crate) async fn unwrap_deferred(result: DataResult, signal: &AbortSignal) -> Option<DataResult> {
    let DataResult::Deferred(deferred) = result else {
        return Some(result);
    };
    if deferred.resolve_data(signal).await {
        return None;
    }
    Some(match deferred.unwrapped_data() {
        Ok(value) => DataResult::Data(value),
        Err(DeferredError::Rejected(error)) => DataResult::Error(error),
        Err(error) => DataResult::Error(RouteError::new(error)),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{Route, RouteTree};
    use crate::matching::match_routes;

    fn tree() -> RouteTree {
        RouteTree::new(vec![Route::new("/").id("root").children(vec![
            Route::new("users").id("users").error_boundary().children(vec![
                Route::index().id("users-index"),
                Route::new(":id").id("user"),
            ]),
            Route::new("files/*").id("files"),
        ])])
        .unwrap()
    }

    fn ids(matches: &[RouteMatch]) -> Vec<&str> {
        matches.iter().map(RouteMatch::route_id).collect()
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("https://example.com/a"));
        assert!(is_absolute_url("//cdn.example.com"));
        assert!(is_absolute_url("mailto:someone@example.com"));
        assert!(!is_absolute_url("/users/1"));
        assert!(!is_absolute_url("../up"));
        assert!(!is_absolute_url("1abc:nope"));
    }

    #[test]
    fn test_find_nearest_boundary() {
        let tree = tree();
        let matches = match_routes(tree.roots(), "/users/7", "/").unwrap();
        assert_eq!(ids(&matches), vec!["root", "users", "user"]);
        assert_eq!(find_nearest_boundary(&matches, Some("user")), "users");
        assert_eq!(find_nearest_boundary(&matches, Some("root")), "root");
        assert_eq!(find_nearest_boundary(&matches, Some("missing")), "root");
        assert_eq!(find_nearest_boundary(&[], None), DataRoute::SHIM_ERROR_ROUTE_ID);
    }

    #[test]
    fn test_get_target_match_respects_index_query() {
        let tree = tree();
        let matches = match_routes(tree.roots(), "/users", "/").unwrap();
        assert_eq!(ids(&matches), vec!["root", "users", "users-index"]);
        assert_eq!(get_target_match(&matches, "").unwrap().route_id(), "users");
        assert_eq!(
            get_target_match(&matches, "?index").unwrap().route_id(),
            "users-index"
        );
    }

    #[test]
    fn test_short_circuit_matches_prefers_single_root() {
        let tree = tree();
        let (matches, id) = short_circuit_matches(tree.roots());
        assert_eq!(id, "root");
        assert_eq!(matches.len(), 1);
        assert!(matches[0].params.is_empty());
    }

    #[test]
    fn test_short_circuit_matches_falls_back_to_shim() {
        let tree = RouteTree::new(vec![Route::new("a").id("a"), Route::new("b").id("b")]).unwrap();
        let (_, id) = short_circuit_matches(tree.roots());
        assert_eq!(id, DataRoute::SHIM_ERROR_ROUTE_ID);
    }

    #[test]
    fn test_merge_loader_data_stops_at_error() {
        let tree = RouteTree::new(vec![Route::new("/")
            .id("root")
            .loader(|_| async { Ok(json!("root").into()) })
            .children(vec![Route::new("a")
                .id("a")
                .loader(|_| async { Ok(json!("a").into()) })
                .children(vec![Route::new("b")
                    .id("b")
                    .loader(|_| async { Ok(json!("b").into()) })])])])
        .unwrap();
        let matches = match_routes(tree.roots(), "/a/b", "/").unwrap();

        let current = HashMap::from([
            ("root".to_string(), Some(LoaderData::Value(json!("old-root")))),
            ("b".to_string(), Some(LoaderData::Value(json!("old-b")))),
        ]);
        let loaded = HashMap::from([("a".to_string(), None)]);
        let errors = HashMap::from([("a".to_string(), RouteError::msg("boom"))]);

        let merged = merge_loader_data(&current, &loaded, &matches, Some(&errors));
        assert_eq!(
            merged.get("root"),
            Some(&Some(LoaderData::Value(json!("old-root"))))
        );
        assert_eq!(merged.get("a"), Some(&None));
        assert!(!merged.contains_key("b"));
    }

    #[test]
    fn test_merge_loader_data_clears_boundary_data() {
        let tree = RouteTree::new(vec![Route::new("/")
            .id("root")
            .error_boundary()
            .loader(|_| async { Ok(json!("root").into()) })
            .children(vec![Route::new("a")
                .id("a")
                .loader(|_| async { Ok(json!("a").into()) })])])
        .unwrap();
        let matches = match_routes(tree.roots(), "/a", "/").unwrap();

        let current = HashMap::from([("root".to_string(), Some(LoaderData::Value(json!("old-root"))))]);
        let loaded = HashMap::from([("a".to_string(), None)]);
        let errors = HashMap::from([("root".to_string(), RouteError::msg("a failed"))]);

        let merged = merge_loader_data(&current, &loaded, &matches, Some(&errors));
        assert_eq!(merged.get("root"), Some(&None));
        assert_eq!(merged.get("a"), Some(&None));
    }

    #[test]
    fn test_action_error_replaces_loader_errors() {
        let tree = tree();
        let matches = match_routes(tree.roots(), "/users/7", "/").unwrap();
        let pending = PendingActionResult {
            route_id: "users".to_string(),
            result: DataResult::Error(RouteError::msg("action failed")),
        };
        let results = vec![("root".to_string(), DataResult::Data(json!(1)))];
        let (loader_data, errors, deferreds) =
            process_route_loader_data(&matches, results, Some(&pending));
        assert!(deferreds.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["users"].to_string(), "action failed");
        assert_eq!(loader_data.get("users"), Some(&None));
        assert_eq!(
            loader_data.get("root"),
            Some(&Some(LoaderData::Value(json!(1))))
        );
    }

    #[test]
    fn test_action_data_for_commit() {
        assert_eq!(action_data_for_commit(None), None);
        let ok = PendingActionResult {
            route_id: "a".to_string(),
            result: DataResult::Data(json!({"ok": true})),
        };
        assert_eq!(
            action_data_for_commit(Some(&ok)),
            Some(HashMap::from([("a".to_string(), json!({"ok": true}))]))
        );
        let failed = PendingActionResult {
            route_id: "a".to_string(),
            result: DataResult::Error(RouteError::msg("no")),
        };
        assert_eq!(action_data_for_commit(Some(&failed)), Some(HashMap::new()));
    }
}
