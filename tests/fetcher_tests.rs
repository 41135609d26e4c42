//! Fetchers: background loads and submissions alongside navigations.

mod common;

use common::*;
use data_navigator::*;
use futures::FutureExt;
use serde_json::json;
use std::rc::Rc;

fn routes(page: &Counter, gate: &Gate) -> Vec<Route> {
    vec![Route::new("/")
        .id("root")
        .error_boundary()
        .loader(page.handler(json!("root")))
        .children(vec![
            Route::new("page").id("page"),
            Route::new("other").id("other"),
            Route::new("api/items").id("items").loader(gate.handler()).action(|args| async move {
                let body = args.request.submission.map(|s| s.body);
                Ok(json!({ "saved": matches!(body, Some(SubmissionBody::Json(_))) }).into())
            }),
            Route::new("api/fail")
                .id("fail")
                .loader(|_| async { Err(RouteError::msg("fetch failed")) }),
            Route::new("api/jump")
                .id("jump")
                .action(|_| async { Ok(Redirect::to("/other").into()) }),
        ])]
}

fn fetch(h: &mut Harness, key: &str, href: &str, opts: FetchOptions) {
    let router = h.router.clone();
    let key = key.to_string();
    let href = href.to_string();
    h.run(async move { router.fetch(key, "root", &href, opts).await });
}

#[test]
fn test_fetcher_load_settles_idle_with_data() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();

    fetch(&mut h, "items", "/api/items", FetchOptions::default());
    assert_eq!(h.state().fetcher("items").state, FetcherState::Loading);
    assert!(h.state().navigation.is_idle());

    gate.release_data("/api/items", json!([1, 2]));
    h.settle();
    let fetcher = h.state().fetcher("items");
    assert_eq!(fetcher.state, FetcherState::Idle);
    assert_eq!(fetcher.data, Some(json!([1, 2])));
    assert_eq!(h.state().location.pathname, "/page");
}

#[test]
fn test_stale_fetcher_load_is_discarded() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();

    fetch(&mut h, "items", "/api/items", FetchOptions::default());
    h.navigate("/other");
    assert_eq!(h.state().location.pathname, "/other");

    gate.release_data("/api/items", json!("late"));
    h.settle();
    let state = h.state();
    let fetcher = state.fetcher("items");
    assert_eq!(fetcher.state, FetcherState::Idle);
    assert_eq!(fetcher.data, None);
    assert!(!state.loader_data.contains_key("items"));
}

#[test]
fn test_refetch_aborts_previous_request() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();

    fetch(&mut h, "items", "/api/items", FetchOptions::default());
    fetch(&mut h, "items", "/api/items?v=2", FetchOptions::default());
    gate.release_data("/api/items?v=2", json!("second"));
    h.settle();
    gate.release_data("/api/items", json!("first"));
    h.settle();
    assert_eq!(h.state().fetcher("items").data, Some(json!("second")));
}

#[test]
fn test_fetcher_error_goes_to_boundary_and_drops_fetcher() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();

    fetch(&mut h, "f", "/api/fail", FetchOptions::default());
    let state = h.state();
    assert_eq!(state.error("root").map(ToString::to_string).as_deref(), Some("fetch failed"));
    assert!(!state.fetchers.contains_key("f"));
}

#[test]
fn test_fetch_from_unmatched_route_is_403() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();

    let router = h.router.clone();
    h.run(async move { router.fetch("x", "items", "/api/items", FetchOptions::default()).await });
    assert_eq!(h.state().error("root").and_then(RouteError::status), Some(403));
    assert_eq!(gate.calls().len(), 0);
}

#[test]
fn test_fetch_to_unknown_path_is_404() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();

    fetch(&mut h, "x", "/nowhere", FetchOptions::default());
    assert_eq!(h.state().error("root").and_then(RouteError::status), Some(404));
}

#[test]
fn test_fetcher_submission_revalidates_page() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();
    assert_eq!(page.count(), 1);

    let seen = record_states(&h.router);
    fetch(
        &mut h,
        "save",
        "/api/items",
        FetchOptions::submit(SubmitOptions::json(FormMethod::Post, json!({ "n": 1 }))),
    );

    assert!(seen
        .borrow()
        .iter()
        .any(|(s, _)| s.fetcher("save").state == FetcherState::Submitting));
    assert_eq!(page.count(), 2);
    let state = h.state();
    let fetcher = state.fetcher("save");
    assert_eq!(fetcher.state, FetcherState::Idle);
    assert_eq!(fetcher.data, Some(json!({ "saved": true })));
    assert_eq!(state.location.pathname, "/page");
    assert!(state.navigation.is_idle());
}

#[test]
fn test_fetcher_redirect_becomes_navigation() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();

    fetch(
        &mut h,
        "jump",
        "/api/jump",
        FetchOptions::submit(SubmitOptions::text(FormMethod::Post, "go")),
    );
    let state = h.state();
    assert_eq!(state.location.pathname, "/other");
    assert_eq!(state.fetcher("jump").state, FetcherState::Idle);
    assert_eq!(h.history.pathnames(), vec!["/page", "/other"]);
}

#[test]
fn test_submission_without_action_is_405() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();

    fetch(
        &mut h,
        "bad",
        "/api/fail",
        FetchOptions::submit(SubmitOptions::text(FormMethod::Post, "x")),
    );
    assert_eq!(h.state().error("root").and_then(RouteError::status), Some(405));
}

#[test]
fn test_loaded_fetchers_revalidate_after_mutation() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();

    fetch(&mut h, "list", "/api/items", FetchOptions::default());
    gate.release_data("/api/items", json!("v1"));
    h.settle();

    h.navigate_with(
        "/page",
        NavigateOptions::default().submit(SubmitOptions::text(FormMethod::Post, "x")),
    );
    // The page route has no action, but the reload round still includes
    // the loaded fetcher.
    assert_eq!(gate.calls(), vec!["/api/items", "/api/items"]);
    assert_eq!(h.state().fetcher("list").state, FetcherState::Loading);
    gate.release_data("/api/items", json!("v2"));
    h.settle();
    assert_eq!(h.state().fetcher("list").data, Some(json!("v2")));
}

#[test]
fn test_released_fetcher_is_collected_when_idle() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();

    assert_eq!(h.router.get_fetcher("items").state, FetcherState::Idle);
    fetch(&mut h, "items", "/api/items", FetchOptions::default());
    let seen = record_states(&h.router);
    h.router.release_fetcher("items");
    assert!(h.state().fetchers.contains_key("items"));

    gate.release_data("/api/items", json!(1));
    h.settle();
    assert!(!h.state().fetchers.contains_key("items"));
    assert!(seen
        .borrow()
        .iter()
        .any(|(_, meta)| meta.deleted_fetchers == vec!["items".to_string()]));
}

#[test]
fn test_persisted_fetchers_survive_release() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::with_init(routes(&page, &gate), &["/page"], |init| init.persist_fetchers(true));
    h.initialize();

    h.router.get_fetcher("items");
    fetch(&mut h, "items", "/api/items", FetchOptions::default());
    gate.release_data("/api/items", json!(1));
    h.settle();
    h.router.release_fetcher("items");
    assert_eq!(h.state().fetcher("items").data, Some(json!(1)));
}

#[test]
fn test_delete_fetcher_aborts_and_reports() {
    let page = Counter::new();
    let gate = Gate::new();
    let mut h = Harness::new(routes(&page, &gate), &["/page"]);
    h.initialize();

    fetch(&mut h, "items", "/api/items", FetchOptions::default());
    let seen = record_states(&h.router);
    h.router.delete_fetcher("items");
    assert!(!h.state().fetchers.contains_key("items"));
    assert_eq!(seen.borrow()[0].1.deleted_fetchers, vec!["items".to_string()]);

    gate.release_data("/api/items", json!("ignored"));
    h.settle();
    assert!(!h.state().fetchers.contains_key("items"));
}

#[test]
fn test_fetch_with_fruitless_discovery_is_404() {
    let discover: PatchRoutesOnNavigation = Rc::new(|_| async { Ok(()) }.boxed_local());
    let routes = vec![Route::new("/").id("root").error_boundary()];
    let mut h = Harness::with_init(routes, &["/"], |init| init.patch_routes_on_navigation(discover));
    h.initialize();

    fetch(&mut h, "load", "/later", FetchOptions::default());
    let state = h.state();
    assert_eq!(state.error("root").and_then(RouteError::status), Some(404));
    assert!(!state.fetchers.contains_key("load"));

    fetch(
        &mut h,
        "save",
        "/later",
        FetchOptions::submit(SubmitOptions::text(FormMethod::Post, "x")),
    );
    let state = h.state();
    assert_eq!(state.error("root").and_then(RouteError::status), Some(404));
    assert!(!state.fetchers.contains_key("save"));

    // The key is free again once the route exists.
    h.router
        .patch_routes(Some("root"), vec![Route::new("later").id("later")
            .loader(|_| async { Ok(json!("found").into()) })])
        .unwrap();
    fetch(&mut h, "load", "/later", FetchOptions::default());
    h.settle();
    let state = h.state();
    assert_eq!(state.fetcher("load").state, FetcherState::Idle);
    assert_eq!(state.fetcher("load").data, Some(json!("found")));
}
