//! Deferred (streamed) loader data.
//!
//! A loader can return some values immediately and others later by handing
//! back a [`DeferredData`]. The router commits the navigation right away with
//! the deferred handle in `loader_data`; each pending key settles on its own
//! and subscribers hear about every settlement.
//!
//! Pending values are plain futures. Something has to poll them: the router
//! spawns [`DeferredData::drive`] on its spawner when one is configured,
//! otherwise the host awaits `drive()` itself.
//!
//! ```
//! use data_navigator::deferred::{DeferredData, TrackedValue};
//! use serde_json::json;
//!
//! let deferred = DeferredData::builder()
//!     .value("title", json!("Inbox"))
//!     .pending("messages", async { Ok(json!(["hi"])) })
//!     .build();
//!
//! assert!(!deferred.is_done());
//! pollster::block_on(deferred.drive());
//! assert!(deferred.is_done());
//! assert_eq!(deferred.get("messages"), Some(TrackedValue::Resolved(json!(["hi"]))));
//! ```

use crate::abort::{abortable, AbortController, AbortSignal};
use crate::error::RouteError;
use crate::{debug_log, trace_log};
use futures::future::{self, Either, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Future producing one deferred value.
pub type PendingValue = LocalBoxFuture<'static, Result<Value, RouteError>>;

/// Why a deferred value is unavailable.
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredError {
    /// The deferred was cancelled before this key settled.
    Aborted,
    /// The value's future failed.
    Rejected(RouteError),
    /// The key has not settled yet.
    NotSettled { key: String },
    /// No such key.
    MissingKey { key: String },
}

impl fmt::Display for DeferredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted => write!(f, "Deferred data aborted"),
            Self::Rejected(error) => write!(f, "{}", error),
            Self::NotSettled { key } => write!(
                f,
                "Can only unwrap data on initialized and settled deferreds (key \"{}\")",
                key
            ),
            Self::MissingKey { key } => write!(f, "No deferred key \"{}\"", key),
        }
    }
}

impl std::error::Error for DeferredError {}

/// Settlement state of one key.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackedValue {
    Pending,
    Resolved(Value),
    Rejected(DeferredError),
}

/// Subscriber callback: `(aborted, settled_key)`.
type Subscriber = Rc<dyn Fn(bool, Option<&str>)>;

/// Handle returned by [`DeferredData::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredSubscription(u64);

struct DeferredInner {
    values: Vec<(String, TrackedValue)>,
    futures: Vec<(String, PendingValue)>,
    controller: AbortController,
    cancelled: bool,
    subscribers: Vec<(u64, Subscriber)>,
    next_subscriber: u64,
    waiters: Vec<Waker>,
}

impl DeferredInner {
    fn pending_count(&self) -> usize {
        self.values
            .iter()
            .filter(|(_, v)| matches!(v, TrackedValue::Pending))
            .count()
    }

    fn wake_waiters(&mut self) {
        for waker in self.waiters.drain(..) {
            waker.wake();
        }
    }
}

/// Shared handle to a set of immediately available and pending values.
///
/// Cloning is cheap; every clone observes the same settlements.
#[derive(Clone)]
pub struct DeferredData {
    inner: Rc<RefCell<DeferredInner>>,
}

impl fmt::Debug for DeferredData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("DeferredData")
            .field("values", &inner.values)
            .field("cancelled", &inner.cancelled)
            .finish()
    }
}

impl PartialEq for DeferredData {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Builder for [`DeferredData`].
#[derive(Default)]
pub struct DeferredBuilder {
    values: Vec<(String, TrackedValue)>,
    futures: Vec<(String, PendingValue)>,
}

impl DeferredBuilder {
    /// Add an immediately available value.
    pub fn value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.push((key.into(), TrackedValue::Resolved(value)));
        self
    }

    /// Add a value that settles when `fut` completes.
    pub fn pending<F>(mut self, key: impl Into<String>, fut: F) -> Self
    where
        F: Future<Output = Result<Value, RouteError>> + 'static,
    {
        let key = key.into();
        self.values.push((key.clone(), TrackedValue::Pending));
        self.futures.push((key, fut.boxed_local()));
        self
    }

    pub fn build(self) -> DeferredData {
        DeferredData {
            inner: Rc::new(RefCell::new(DeferredInner {
                values: self.values,
                futures: self.futures,
                controller: AbortController::new(),
                cancelled: false,
                subscribers: Vec::new(),
                next_subscriber: 0,
                waiters: Vec::new(),
            })),
        }
    }
}

impl DeferredData {
    pub fn builder() -> DeferredBuilder {
        DeferredBuilder::default()
    }

    /// No key is still pending.
    pub fn is_done(&self) -> bool {
        self.inner.borrow().pending_count() == 0
    }

    /// [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.borrow().cancelled
    }

    /// Signal aborted on cancellation; handed to nothing else.
    pub fn signal(&self) -> AbortSignal {
        self.inner.borrow().controller.signal()
    }

    /// Every key, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .borrow()
            .values
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Keys that have not settled.
    pub fn pending_keys(&self) -> Vec<String> {
        self.inner
            .borrow()
            .values
            .iter()
            .filter(|(_, v)| matches!(v, TrackedValue::Pending))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Current state of `key`.
    pub fn get(&self, key: &str) -> Option<TrackedValue> {
        self.inner
            .borrow()
            .values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Settled value of `key`, or why it is not available.
    pub fn unwrap_value(&self, key: &str) -> Result<Value, DeferredError> {
        match self.get(key) {
            None => Err(DeferredError::MissingKey {
                key: key.to_string(),
            }),
            Some(TrackedValue::Pending) => Err(DeferredError::NotSettled {
                key: key.to_string(),
            }),
            Some(TrackedValue::Resolved(value)) => Ok(value),
            Some(TrackedValue::Rejected(error)) => Err(error),
        }
    }

    /// Every value as one JSON object; fails on the first unsettled or
    /// rejected key.
    pub fn unwrapped_data(&self) -> Result<Value, DeferredError> {
        let mut map = Map::new();
        for key in self.keys() {
            let value = self.unwrap_value(&key)?;
            map.insert(key, value);
        }
        Ok(Value::Object(map))
    }

    /// Register a settlement callback: `(aborted, settled_key)`.
    ///
    /// Called once per settled key with `(false, Some(key))`, and once with
    /// `(true, None)` on cancellation, after which no more calls happen.
    pub fn subscribe(&self, f: impl Fn(bool, Option<&str>) + 'static) -> DeferredSubscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.push((id, Rc::new(f)));
        DeferredSubscription(id)
    }

    pub fn unsubscribe(&self, subscription: DeferredSubscription) {
        self.inner
            .borrow_mut()
            .subscribers
            .retain(|(id, _)| *id != subscription.0);
    }

    /// Abort every pending key.
    ///
    /// Pending keys become `Rejected(Aborted)`, subscribers get one final
    /// `(true, None)` call and are then dropped.
    pub fn cancel(&self) {
        let subscribers = {
            let mut inner = self.inner.borrow_mut();
            if inner.cancelled {
                return;
            }
            inner.cancelled = true;
            inner.controller.abort();
            inner.futures.clear();
            for (_, value) in &mut inner.values {
                if matches!(value, TrackedValue::Pending) {
                    *value = TrackedValue::Rejected(DeferredError::Aborted);
                }
            }
            inner.wake_waiters();
            std::mem::take(&mut inner.subscribers)
        };
        debug_log!("Deferred data cancelled");
        for (_, subscriber) in subscribers {
            subscriber(true, None);
        }
    }

    fn settle(&self, key: &str, result: Result<Value, RouteError>) {
        let subscribers: Vec<Subscriber> = {
            let mut inner = self.inner.borrow_mut();
            if inner.cancelled {
                return;
            }
            let Some((_, slot)) = inner.values.iter_mut().find(|(k, _)| k == key) else {
                return;
            };
            *slot = match result {
                Ok(value) => TrackedValue::Resolved(value),
                Err(error) => TrackedValue::Rejected(DeferredError::Rejected(error)),
            };
            inner.wake_waiters();
            inner.subscribers.iter().map(|(_, s)| s.clone()).collect()
        };
        trace_log!("Deferred key '{}' settled", key);
        for subscriber in subscribers {
            subscriber(false, Some(key));
        }
    }

    /// Poll every pending value to completion (or until cancelled).
    ///
    /// The first caller takes ownership of the pending futures; later callers
    /// just wait for settlement.
    pub fn drive(&self) -> LocalBoxFuture<'static, ()> {
        let this = self.clone();
        let (futures, signal) = {
            let mut inner = self.inner.borrow_mut();
            (
                std::mem::take(&mut inner.futures),
                inner.controller.signal(),
            )
        };
        async move {
            if futures.is_empty() {
                this.settled().await;
                return;
            }
            let mut running: FuturesUnordered<_> = futures
                .into_iter()
                .map(|(key, fut)| fut.map(move |result| (key, result)))
                .collect();
            while let Some(Some((key, result))) = abortable(&signal, running.next()).await {
                this.settle(&key, result);
            }
        }
        .boxed_local()
    }

    /// Wait until every key settles, cancelling if `signal` aborts first.
    ///
    /// Returns `true` if the deferred ended up cancelled.
    pub async fn resolve_data(&self, signal: &AbortSignal) -> bool {
        if signal.is_aborted() {
            self.cancel();
            return true;
        }
        match future::select(self.drive(), signal.aborted()).await {
            Either::Left(((), _)) => self.is_cancelled(),
            Either::Right(((), _)) => {
                self.cancel();
                true
            }
        }
    }

    fn settled(&self) -> Settled {
        Settled { data: self.clone() }
    }
}

/// Resolves once nothing is pending or the deferred was cancelled.
struct Settled {
    data: DeferredData,
}

impl Future for Settled {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut inner = self.data.inner.borrow_mut();
        if inner.cancelled || inner.pending_count() == 0 {
            return Poll::Ready(());
        }
        if !inner.waiters.iter().any(|w| w.will_wake(cx.waker())) {
            inner.waiters.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_immediate_values_are_done() {
        let deferred = DeferredData::builder().value("a", json!(1)).build();
        assert!(deferred.is_done());
        assert_eq!(deferred.unwrapped_data(), Ok(json!({"a": 1})));
    }

    #[test]
    fn test_settlement_notifies_per_key() {
        let (tx, rx) = oneshot::channel::<Value>();
        let deferred = DeferredData::builder()
            .pending("slow", async move { rx.await.map_err(|_| RouteError::msg("dropped")) })
            .pending("fast", async { Ok(json!("now")) })
            .build();
        let settled = Rc::new(RefCell::new(Vec::new()));
        let sink = settled.clone();
        deferred.subscribe(move |aborted, key| {
            assert!(!aborted);
            sink.borrow_mut().push(key.map(str::to_string));
        });

        let mut drive = deferred.drive();
        assert!((&mut drive).now_or_never().is_none());
        assert_eq!(*settled.borrow(), vec![Some("fast".to_string())]);
        assert_eq!(
            deferred.unwrap_value("slow"),
            Err(DeferredError::NotSettled { key: "slow".into() })
        );

        tx.send(json!(42)).unwrap();
        assert_eq!(drive.now_or_never(), Some(()));
        assert_eq!(deferred.unwrap_value("slow"), Ok(json!(42)));
        assert_eq!(settled.borrow().len(), 2);
    }

    #[test]
    fn test_cancel_rejects_pending_and_stops_notifications() {
        let deferred = DeferredData::builder()
            .value("ready", json!(true))
            .pending("never", future::pending())
            .build();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        deferred.subscribe(move |aborted, _| {
            assert!(aborted);
            counter.set(counter.get() + 1);
        });

        deferred.cancel();
        deferred.cancel();
        assert_eq!(calls.get(), 1);
        assert!(deferred.is_cancelled());
        assert!(deferred.signal().is_aborted());
        assert_eq!(deferred.unwrap_value("never"), Err(DeferredError::Aborted));
        assert_eq!(deferred.unwrap_value("ready"), Ok(json!(true)));
    }

    #[test]
    fn test_rejection_is_reported_on_unwrap() {
        let deferred = DeferredData::builder()
            .pending("x", async { Err(RouteError::msg("nope")) })
            .build();
        pollster::block_on(deferred.drive());
        match deferred.unwrap_value("x") {
            Err(DeferredError::Rejected(err)) => assert_eq!(err.to_string(), "nope"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(deferred.unwrapped_data().is_err());
    }

    #[test]
    fn test_resolve_data_cancels_on_abort() {
        let deferred = DeferredData::builder()
            .pending("never", future::pending())
            .build();
        let controller = AbortController::new();
        controller.abort();
        let cancelled = pollster::block_on(deferred.resolve_data(&controller.signal()));
        assert!(cancelled);
        assert!(deferred.is_cancelled());
    }
}
