//! Matching through the router: ranking, params, lazy routes and route
//! discovery.

mod common;

use common::*;
use data_navigator::*;
use futures::FutureExt;
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;

fn match_ids(state: &RouterState) -> Vec<String> {
    state.matches.iter().map(|m| m.route_id().to_string()).collect()
}

#[test]
fn test_static_route_outranks_dynamic_sibling() {
    let routes = vec![Route::new("/").id("root").children(vec![
        Route::new("users/:id").id("user"),
        Route::new("users/new").id("new-user"),
        Route::new("*").id("catch-all"),
    ])];
    let mut h = Harness::new(routes, &["/"]);
    h.initialize();

    h.navigate("/users/new");
    assert_eq!(match_ids(&h.state()), vec!["root", "new-user"]);

    h.navigate("/users/42");
    let state = h.state();
    assert_eq!(match_ids(&state), vec!["root", "user"]);
    assert_eq!(state.matches[1].params.get("id").map(String::as_str), Some("42"));

    h.navigate("/nothing/here");
    let state = h.state();
    assert_eq!(match_ids(&state), vec!["root", "catch-all"]);
    assert_eq!(state.matches[1].params.get("*").map(String::as_str), Some("nothing/here"));
}

#[test]
fn test_loader_receives_params_and_search() {
    let routes = vec![Route::new("/").id("root").children(vec![Route::new("posts/:slug?")
        .id("posts")
        .loader(|args| async move {
            let slug = args.params.get("slug").cloned();
            let page = args.request.url.query_pairs().find(|(k, _)| k == "page").map(|(_, v)| v.into_owned());
            Ok(json!({ "slug": slug, "page": page }).into())
        })])];
    let mut h = Harness::new(routes, &["/"]);
    h.initialize();

    h.navigate("/posts/hello?page=2");
    assert_eq!(
        h.state().loader_value("posts"),
        Some(&json!({ "slug": "hello", "page": "2" }))
    );

    h.navigate("/posts");
    assert_eq!(
        h.state().loader_value("posts"),
        Some(&json!({ "slug": null, "page": null }))
    );
}

#[test]
fn test_lazy_route_resolves_once() {
    let resolved = Rc::new(Cell::new(0));
    let count = resolved.clone();
    let routes = vec![Route::new("/").id("root").children(vec![Route::new("reports")
        .id("reports")
        .lazy(move || {
            count.set(count.get() + 1);
            async {
                Ok(LazyRoute::new().loader(|_| async { Ok(json!("report").into()) }))
            }
        })])];
    let mut h = Harness::new(routes, &["/"]);
    h.initialize();

    h.navigate("/reports");
    assert_eq!(h.state().loader_value("reports"), Some(&json!("report")));
    h.navigate("/");
    h.navigate("/reports");
    assert_eq!(resolved.get(), 1);
}

#[test]
fn test_discovery_patches_missing_routes() {
    let rounds = Rc::new(Cell::new(0));
    let counter = rounds.clone();
    let discover: PatchRoutesOnNavigation = Rc::new(move |args: DiscoveryArgs| {
        counter.set(counter.get() + 1);
        async move {
            if args.path == "/admin" {
                args.patch
                    .patch(Some("root"), vec![Route::new("admin").id("admin")
                        .loader(|_| async { Ok(json!("admin").into()) })])
                    .map_err(|e| RouteError::msg(e.to_string()))?;
            }
            Ok(())
        }
        .boxed_local()
    });
    let routes = vec![Route::new("/").id("root").error_boundary()];
    let mut h = Harness::with_init(routes, &["/"], |init| init.patch_routes_on_navigation(discover));
    h.initialize();

    h.navigate("/admin");
    let state = h.state();
    assert_eq!(match_ids(&state), vec!["root", "admin"]);
    assert_eq!(state.loader_value("admin"), Some(&json!("admin")));
    let after_first = rounds.get();
    assert!(after_first >= 1);

    // Known now; no further discovery needed.
    h.navigate("/");
    h.navigate("/admin");
    assert_eq!(rounds.get(), after_first);
}

#[test]
fn test_discovery_that_adds_nothing_ends_in_404() {
    let discover: PatchRoutesOnNavigation = Rc::new(|_| async { Ok(()) }.boxed_local());
    let routes = vec![Route::new("/").id("root").error_boundary()];
    let mut h = Harness::with_init(routes, &["/"], |init| init.patch_routes_on_navigation(discover));
    h.initialize();

    h.navigate("/missing");
    let state = h.state();
    assert_eq!(state.error("root").and_then(RouteError::status), Some(404));
    assert_eq!(state.location.pathname, "/missing");
}

#[test]
fn test_basename_scopes_matching() {
    let routes = vec![Route::new("/").id("root").children(vec![Route::new("inbox").id("inbox")])];
    let mut h = Harness::with_init(routes, &["/app/inbox"], |init| init.basename("/app"));
    h.initialize();
    assert_eq!(match_ids(&h.state()), vec!["root", "inbox"]);

    h.navigate("/inbox");
    assert_eq!(h.state().location.pathname, "/app/inbox");
    assert_eq!(h.router.create_href(&Path::parse("/app/inbox")), "/app/inbox");
}

#[test]
fn test_patch_routes_republishes_state() {
    let routes = vec![Route::new("/").id("root")];
    let mut h = Harness::new(routes, &["/"]);
    h.initialize();
    let seen = record_states(&h.router);

    let added = h
        .router
        .patch_routes(Some("root"), vec![Route::new("late").id("late")])
        .unwrap();
    assert_eq!(added, 1);
    assert_eq!(seen.borrow().len(), 1);
    h.navigate("/late");
    assert_eq!(match_ids(&h.state()), vec!["root", "late"]);
}
