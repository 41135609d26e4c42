//! Deferred loader data flowing through navigations.

mod common;

use common::*;
use data_navigator::*;
use futures::channel::oneshot;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

type Senders = Rc<RefCell<Vec<oneshot::Sender<Value>>>>;

fn feed_loader(senders: &Senders) -> impl Fn(HandlerArgs) -> futures::future::LocalBoxFuture<'static, HandlerResult> {
    use futures::FutureExt;
    let senders = senders.clone();
    move |_| {
        let (tx, rx) = oneshot::channel();
        senders.borrow_mut().push(tx);
        let deferred = DeferredData::builder()
            .value("title", json!("Feed"))
            .pending("posts", async move {
                rx.await.map_err(|_| RouteError::msg("sender dropped"))
            })
            .build();
        async move { Ok(HandlerValue::Deferred(deferred)) }.boxed_local()
    }
}

fn routes(senders: &Senders) -> Vec<Route> {
    vec![Route::new("/").id("root").error_boundary().children(vec![
        Route::new("feed").id("feed").loader(feed_loader(senders)),
        Route::new("other").id("other"),
        Route::new("post").id("post").action(|_| async {
            Ok(DeferredData::builder().value("a", json!(1)).build().into())
        }),
    ])]
}

#[test]
fn test_navigation_commits_before_deferred_settles() {
    let senders = Senders::default();
    let mut h = Harness::new(routes(&senders), &["/"]);
    h.initialize();

    h.navigate("/feed");
    let state = h.state();
    assert_eq!(state.location.pathname, "/feed");
    assert!(state.navigation.is_idle());
    let deferred = state.loader_deferred("feed").expect("deferred loader data").clone();
    assert_eq!(deferred.get("title"), Some(TrackedValue::Resolved(json!("Feed"))));
    assert_eq!(deferred.get("posts"), Some(TrackedValue::Pending));

    let tx = senders.borrow_mut().remove(0);
    tx.send(json!(["hello"])).unwrap();
    h.settle();
    assert!(deferred.is_done());
    assert_eq!(deferred.unwrap_value("posts"), Ok(json!(["hello"])));
}

#[test]
fn test_leaving_route_cancels_deferred() {
    let senders = Senders::default();
    let mut h = Harness::new(routes(&senders), &["/"]);
    h.initialize();

    h.navigate("/feed");
    let deferred = h.state().loader_deferred("feed").cloned().expect("deferred");
    let notified = Rc::new(RefCell::new(Vec::new()));
    let sink = notified.clone();
    deferred.subscribe(move |aborted, key| sink.borrow_mut().push((aborted, key.map(str::to_string))));

    h.navigate("/other");
    assert!(deferred.is_cancelled());
    assert!(deferred.is_done());
    assert_eq!(deferred.get("posts"), Some(TrackedValue::Rejected(DeferredError::Aborted)));
    assert_eq!(notified.borrow().as_slice(), &[(true, None)]);

    // A late value changes nothing.
    let _ = senders.borrow_mut().remove(0).send(json!("late"));
    h.settle();
    assert_eq!(notified.borrow().len(), 1);
    assert!(!h.state().loader_data.contains_key("feed"));
}

#[test]
fn test_revalidation_replaces_deferred() {
    let senders = Senders::default();
    let mut h = Harness::new(routes(&senders), &["/"]);
    h.initialize();

    h.navigate("/feed");
    let first = h.state().loader_deferred("feed").cloned().expect("deferred");
    let router = h.router.clone();
    h.run(async move { router.revalidate().await });

    assert!(first.is_cancelled());
    let second = h.state().loader_deferred("feed").cloned().expect("deferred");
    assert!(!second.is_cancelled());
    assert_eq!(senders.borrow().len(), 2);
}

#[test]
fn test_deferred_from_action_is_rejected() {
    let senders = Senders::default();
    let mut h = Harness::new(routes(&senders), &["/"]);
    h.initialize();

    h.navigate_with(
        "/post",
        NavigateOptions::default().submit(SubmitOptions::text(FormMethod::Post, "x")),
    );
    let state = h.state();
    assert_eq!(state.error("root").and_then(RouteError::status), Some(400));
    assert!(!state.action_data.contains_key("post"));
}
