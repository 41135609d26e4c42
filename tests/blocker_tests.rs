//! Navigation blockers.

mod common;

use common::*;
use data_navigator::*;
use std::cell::Cell;
use std::rc::Rc;

fn routes() -> Vec<Route> {
    vec![Route::new("/").id("root").children(vec![
        Route::new("a").id("a"),
        Route::new("b").id("b"),
        Route::new("form").id("form"),
    ])]
}

#[test]
fn test_blocker_state_machine() {
    use data_navigator::state::validate_blocker_transition;
    use BlockerState::*;

    assert!(validate_blocker_transition("k", Unblocked, Proceeding).is_err());
    assert!(validate_blocker_transition("k", Proceeding, Blocked).is_err());
    for (from, to) in [(Unblocked, Blocked), (Blocked, Proceeding), (Proceeding, Unblocked)] {
        assert!(validate_blocker_transition("k", from, to).is_ok());
    }
}

#[test]
fn test_proceed_without_blocked_navigation_is_rejected() {
    let mut h = Harness::new(routes(), &["/"]);
    h.initialize();
    h.router.get_blocker("guard", |_| true);

    let router = h.router.clone();
    let result = futures::executor::block_on(router.proceed_blocker("guard"));
    assert!(matches!(result, Err(RouterError::InvalidBlockerTransition { .. })));
    assert_eq!(h.state().blocker("guard").state, BlockerState::Unblocked);
}

#[test]
fn test_blocked_navigation_proceeds() {
    let mut h = Harness::new(routes(), &["/"]);
    h.initialize();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    h.router.get_blocker("guard", move |args| {
        counter.set(counter.get() + 1);
        args.next_location.pathname == "/form"
    });

    h.navigate("/a");
    assert_eq!(h.state().location.pathname, "/a");

    h.navigate("/form");
    let state = h.state();
    assert_eq!(state.location.pathname, "/a");
    let blocker = state.blocker("guard");
    assert_eq!(blocker.state, BlockerState::Blocked);
    assert_eq!(blocker.location.map(|l| l.pathname), Some("/form".to_string()));

    let router = h.router.clone();
    h.run(async move { router.proceed_blocker("guard").await });
    let state = h.state();
    assert_eq!(state.location.pathname, "/form");
    assert_eq!(state.blocker("guard").state, BlockerState::Unblocked);
    // The proceeding navigation does not consult the predicate again.
    assert_eq!(calls.get(), 2);
    assert_eq!(h.history.pathnames(), vec!["/", "/a", "/form"]);
}

#[test]
fn test_reset_drops_blocked_navigation() {
    let mut h = Harness::new(routes(), &["/"]);
    h.initialize();
    h.router.get_blocker("guard", |_| true);

    h.navigate("/b");
    assert_eq!(h.state().blocker("guard").state, BlockerState::Blocked);
    h.router.reset_blocker("guard").unwrap();

    let state = h.state();
    assert_eq!(state.blocker("guard").state, BlockerState::Unblocked);
    assert_eq!(state.location.pathname, "/");

    let router = h.router.clone();
    let result = futures::executor::block_on(router.proceed_blocker("guard"));
    assert!(result.is_err());
}

#[test]
fn test_blocked_pop_is_undone_then_replayed() {
    let mut h = Harness::new(routes(), &["/"]);
    h.initialize();
    h.navigate("/a");
    h.navigate("/b");
    h.router
        .get_blocker("guard", |args| args.history_action == HistoryAction::Pop);

    let router = h.router.clone();
    h.run(async move { router.navigate(To::Delta(-1), NavigateOptions::default()).await });
    let state = h.state();
    assert_eq!(state.blocker("guard").state, BlockerState::Blocked);
    assert_eq!(state.location.pathname, "/b");
    assert_eq!(h.history.index(), 2);

    let router = h.router.clone();
    h.run(async move { router.proceed_blocker("guard").await });
    let state = h.state();
    assert_eq!(state.location.pathname, "/a");
    assert_eq!(state.blocker("guard").state, BlockerState::Unblocked);
    assert_eq!(h.history.index(), 1);
}

#[test]
fn test_delete_blocker_unblocks_navigation() {
    let mut h = Harness::new(routes(), &["/"]);
    h.initialize();
    h.router.get_blocker("guard", |_| true);
    h.navigate("/a");
    assert_eq!(h.state().location.pathname, "/");

    h.router.delete_blocker("guard");
    assert!(!h.state().blockers.contains_key("guard"));
    h.navigate("/a");
    assert_eq!(h.state().location.pathname, "/a");
}

#[test]
fn test_latest_blocker_decides() {
    let mut h = Harness::new(routes(), &["/"]);
    h.initialize();
    h.router.get_blocker("first", |_| true);
    h.router.get_blocker("second", |_| false);

    h.navigate("/a");
    assert_eq!(h.state().location.pathname, "/a");
    assert_eq!(h.state().blocker("first").state, BlockerState::Unblocked);
}
