//! Cooperative cancellation for handler calls.
//!
//! Every loader, action and lazy module receives an [`AbortSignal`]. The router
//! keeps the matching [`AbortController`] and aborts it when the navigation or
//! fetch that started the call is superseded. Handlers may poll
//! [`AbortSignal::is_aborted`] or await [`AbortSignal::aborted`]; the router
//! additionally races every handler future against its signal so abandoned
//! work is dropped at its next suspension point.

use futures::future::{self, Either};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

#[derive(Debug, Default)]
struct AbortState {
    flag: AtomicBool,
    wakers: Mutex<Vec<Waker>>,
}

/// Owner side of a cancellation token.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    /// Create a controller in the "not aborted" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The signal handed to handlers.
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Abort the signal and wake everyone waiting on it.
    ///
    /// Returns `true` the first time, `false` if it was already aborted.
    pub fn abort(&self) -> bool {
        let first = self
            .signal
            .state
            .flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            let wakers = std::mem::take(
                &mut *self
                    .signal
                    .state
                    .wakers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            for waker in wakers {
                waker.wake();
            }
        }
        first
    }

    /// Whether [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }
}

/// Observer side of a cancellation token.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    state: Arc<AbortState>,
}

impl AbortSignal {
    /// Whether the owning controller has aborted.
    pub fn is_aborted(&self) -> bool {
        self.state.flag.load(Ordering::Acquire)
    }

    /// Future that completes once the signal is aborted.
    pub fn aborted(&self) -> Aborted {
        Aborted {
            signal: self.clone(),
        }
    }

    /// Whether two signals belong to the same controller.
    pub fn same_as(&self, other: &AbortSignal) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

/// Future returned by [`AbortSignal::aborted`].
#[derive(Debug)]
pub struct Aborted {
    signal: AbortSignal,
}

impl Future for Aborted {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.signal.is_aborted() {
            return Poll::Ready(());
        }
        let mut wakers = self
            .signal
            .state
            .wakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Re-check under the lock: abort() drains the list while holding it.
        if self.signal.is_aborted() {
            return Poll::Ready(());
        }
        if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
            wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Run `fut` unless `signal` aborts first.
///
/// Returns `None` when the signal won the race (or was already aborted).
pub async fn abortable<F>(signal: &AbortSignal, fut: F) -> Option<F::Output>
where
    F: Future,
{
    if signal.is_aborted() {
        return None;
    }
    let fut = Box::pin(fut);
    match future::select(fut, signal.aborted()).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(((), _)) => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
