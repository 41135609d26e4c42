//! Loader and action handlers.
//!
//! Handlers are async functions from [`HandlerArgs`] to a [`HandlerResult`].
//! A successful handler returns a [`HandlerValue`]: plain data, deferred
//! data, or a [`Redirect`]. Redirects are values, not errors; an `Err` is
//! always attributed to the nearest error boundary.
//!
//! # Implementing handlers
//!
//! Use [`handler_fn`] for closures, or implement [`Handler`] for types that
//! carry their own state:
//!
//! ```
//! use data_navigator::handler::{Handler, HandlerArgs, HandlerFuture, HandlerValue};
//! use futures::FutureExt;
//! use serde_json::json;
//!
//! struct Greeting(&'static str);
//!
//! impl Handler for Greeting {
//!     fn call(&self, args: HandlerArgs) -> HandlerFuture {
//!         let name = args.params.get("name").cloned().unwrap_or_default();
//!         let greeting = self.0;
//!         async move { Ok(HandlerValue::Data(json!(format!("{greeting}, {name}")))) }
//!             .boxed_local()
//!     }
//! }
//! ```

use crate::abort::AbortSignal;
use crate::deferred::DeferredData;
use crate::error::RouteError;
use crate::params::RouteParams;
use crate::submission::{FormMethod, Submission};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use url::Url;

// ============================================================================
// Request / args
// ============================================================================

/// The request a handler is invoked for.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: FormMethod,
    pub url: Url,
    /// Aborted when the navigation or fetch that issued the call is superseded.
    pub signal: AbortSignal,
    /// Present for mutations.
    pub submission: Option<Submission>,
}

impl Request {
    /// Path part of [`url`](Self::url).
    pub fn pathname(&self) -> &str {
        self.url.path()
    }
}

/// Arguments passed to loaders and actions.
#[derive(Debug, Clone)]
pub struct HandlerArgs {
    pub request: Request,
    pub params: RouteParams,
}

// ============================================================================
// Results
// ============================================================================

/// A redirect returned from a handler.
///
/// ```
/// use data_navigator::handler::Redirect;
///
/// let r = Redirect::to("/login").replace();
/// assert_eq!(r.status, 302);
/// assert!(r.replace);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// 301, 302, 303, 307 or 308.
    pub status: u16,
    pub location: String,
    /// Revalidate every loader after following the redirect.
    pub revalidate: bool,
    /// Leave the app with a full document load.
    pub reload_document: bool,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
}

impl Redirect {
    /// A 302 redirect.
    pub fn to(location: impl Into<String>) -> Self {
        Self::with_status(location, 302)
    }

    pub fn with_status(location: impl Into<String>, status: u16) -> Self {
        Self {
            status,
            location: location.into(),
            revalidate: false,
            reload_document: false,
            replace: false,
        }
    }

    pub fn revalidate(mut self) -> Self {
        self.revalidate = true;
        self
    }

    pub fn reload_document(mut self) -> Self {
        self.reload_document = true;
        self
    }

    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    /// 307/308 redirects repeat the original method and body.
    pub fn preserves_method(&self) -> bool {
        matches!(self.status, 307 | 308)
    }
}

/// What a handler can succeed with.
#[derive(Debug, Clone)]
pub enum HandlerValue {
    Data(Value),
    Deferred(DeferredData),
    Redirect(Redirect),
}

impl From<Value> for HandlerValue {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl From<Redirect> for HandlerValue {
    fn from(redirect: Redirect) -> Self {
        Self::Redirect(redirect)
    }
}

impl From<DeferredData> for HandlerValue {
    fn from(deferred: DeferredData) -> Self {
        Self::Deferred(deferred)
    }
}

pub type HandlerResult = Result<HandlerValue, RouteError>;

pub type HandlerFuture = LocalBoxFuture<'static, HandlerResult>;

/// A handler's outcome as the router sees it.
#[derive(Debug, Clone)]
pub enum DataResult {
    Data(Value),
    Deferred(DeferredData),
    Redirect(Redirect),
    Error(RouteError),
}

impl DataResult {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Status reported to revalidation predicates after an action.
    pub fn status(&self) -> u16 {
        match self {
            Self::Error(error) => error.status().unwrap_or(500),
            Self::Redirect(redirect) => redirect.status,
            _ => 200,
        }
    }
}

impl From<HandlerResult> for DataResult {
    fn from(result: HandlerResult) -> Self {
        match result {
            Ok(HandlerValue::Data(value)) => Self::Data(value),
            Ok(HandlerValue::Deferred(deferred)) => Self::Deferred(deferred),
            Ok(HandlerValue::Redirect(redirect)) => Self::Redirect(redirect),
            Err(error) => Self::Error(error),
        }
    }
}

// ============================================================================
// Handler trait
// ============================================================================

/// A loader or action.
///
/// Handlers run on the router's thread; the future they return need not be
/// `Send`.
pub trait Handler: 'static {
    fn call(&self, args: HandlerArgs) -> HandlerFuture;
}

/// Create a handler from an async closure.
///
/// ```
/// use data_navigator::handler::{handler_fn, HandlerValue};
/// use serde_json::json;
///
/// let loader = handler_fn(|_args| async { Ok(HandlerValue::Data(json!({"ok": true}))) });
/// # let _ = loader;
/// ```
pub const fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(HandlerArgs) -> Fut + 'static,
    Fut: Future<Output = HandlerResult> + 'static,
{
    FnHandler { f }
}

/// Handler created from a function or closure.
pub struct FnHandler<F> {
    f: F,
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(HandlerArgs) -> Fut + 'static,
    Fut: Future<Output = HandlerResult> + 'static,
{
    fn call(&self, args: HandlerArgs) -> HandlerFuture {
        (self.f)(args).boxed_local()
    }
}

impl fmt::Debug for dyn Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

// ============================================================================
// Revalidation predicate
// ============================================================================

/// Input to a route's `should_revalidate` predicate.
#[derive(Debug, Clone)]
pub struct ShouldRevalidateArgs {
    pub current_url: Url,
    pub current_params: RouteParams,
    pub next_url: Url,
    pub next_params: RouteParams,
    /// Submission that triggered this revalidation, if any.
    pub submission: Option<Submission>,
    /// Data returned by the action, if it succeeded with data.
    pub action_result: Option<Value>,
    pub action_status: Option<u16>,
    /// What the router would do without the predicate.
    pub default_should_revalidate: bool,
}

/// Per-route revalidation predicate.
pub type ShouldRevalidateFn = Rc<dyn Fn(&ShouldRevalidateArgs) -> bool>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::AbortController;
    use serde_json::json;

    fn args() -> HandlerArgs {
        HandlerArgs {
            request: Request {
                method: FormMethod::Get,
                url: Url::parse("http://localhost/users/7").unwrap(),
                signal: AbortController::new().signal(),
                submission: None,
            },
            params: RouteParams::from_map([("id".to_string(), "7".to_string())].into()),
        }
    }

    #[test]
    fn test_handler_fn_receives_params() {
        let handler = handler_fn(|args: HandlerArgs| async move {
            Ok(HandlerValue::Data(json!(args.params.get("id"))))
        });
        let result = pollster::block_on(handler.call(args()));
        match DataResult::from(result) {
            DataResult::Data(value) => assert_eq!(value, json!("7")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_redirect_flags() {
        let r = Redirect::with_status("/x", 307).revalidate();
        assert!(r.preserves_method());
        assert!(r.revalidate);
        assert!(!Redirect::to("/x").preserves_method());
        assert_eq!(DataResult::Redirect(r).status(), 307);
    }

    #[test]
    fn test_error_status_defaults_to_500() {
        assert_eq!(DataResult::Error(RouteError::msg("x")).status(), 500);
        assert_eq!(args().request.pathname(), "/users/7");
    }
}
