//! Driving the router from a tokio runtime with no spawner configured.

mod common;

use common::init_logging;
use data_navigator::*;
use serde_json::json;

fn router() -> Router {
    init_logging();
    let routes = vec![Route::new("/").id("root").children(vec![
        Route::new("slow").id("slow").loader(|_| async {
            tokio::task::yield_now().await;
            Ok(json!("slow").into())
        }),
        Route::new("stream").id("stream").loader(|_| async {
            let deferred = DeferredData::builder()
                .pending("later", async {
                    tokio::task::yield_now().await;
                    Ok(json!(7))
                })
                .build();
            Ok(deferred.into())
        }),
    ])];
    let history = MemoryHistory::new(["/"], None);
    Router::new(RouterInit::new(routes, history)).expect("valid routes")
}

#[tokio::test]
async fn test_navigation_resolves_on_tokio() {
    let router = router();
    router.initialize().await.unwrap();
    router.navigate("/slow", NavigateOptions::default()).await.unwrap();

    let state = router.state();
    assert_eq!(state.location.pathname, "/slow");
    assert_eq!(state.loader_value("slow"), Some(&json!("slow")));
}

#[tokio::test]
async fn test_host_drives_deferred_without_spawner() {
    let router = router();
    router.initialize().await.unwrap();
    router.navigate("/stream", NavigateOptions::default()).await.unwrap();

    let deferred = router.state().loader_deferred("stream").cloned().expect("deferred");
    assert!(!deferred.is_done());
    deferred.drive().await;
    assert_eq!(deferred.unwrap_value("later"), Ok(json!(7)));
}

#[tokio::test]
async fn test_pop_is_processed_by_flush() {
    let router = router();
    router.initialize().await.unwrap();
    router.navigate("/slow", NavigateOptions::default()).await.unwrap();
    router.navigate(To::Delta(-1), NavigateOptions::default()).await.unwrap();

    let state = router.state();
    assert_eq!(state.location.pathname, "/");
    assert_eq!(state.history_action, HistoryAction::Pop);
}
