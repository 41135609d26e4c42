//! Error types for the navigation engine.
//!
//! Three layers of errors live here:
//!
//! - [`RouteError`]: what a loader or action fails with, and what ends up in
//!   [`RouterState::errors`](crate::RouterState::errors) keyed by the nearest
//!   error-boundary route.
//! - [`ErrorResponse`] / [`InternalError`]: response-shaped errors with an
//!   HTTP-like status. The router builds these itself for 400/403/404/405
//!   situations; handlers may return their own.
//! - [`RouterError`]: failures of the public controller API itself (invalid
//!   route configuration, illegal blocker transitions, use after dispose).
//!
//! # Examples
//!
//! ```
//! use data_navigator::error::{InternalError, RouteError};
//!
//! let err = InternalError::NotFound { pathname: "/nope".into() }.into_response();
//! assert_eq!(err.status, 404);
//! assert_eq!(err.status_text, "Not Found");
//! assert!(err.internal);
//!
//! let app = RouteError::msg("database offline");
//! assert_eq!(app.to_string(), "database offline");
//! assert_eq!(app.status(), None);
//! ```

use crate::state::BlockerState;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// ErrorResponse
// ============================================================================

/// Response-shaped error: a status code, its reason phrase, optional payload.
///
/// `internal` is set for errors the router produced itself (no route matched,
/// method not allowed, …) so UI layers can tell them apart from errors a
/// loader deliberately returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    /// HTTP-like status code.
    pub status: u16,
    /// Reason phrase for `status`.
    pub status_text: String,
    /// Payload attached by the handler, if any.
    pub data: Option<Value>,
    /// Whether the router generated this error.
    pub internal: bool,
    /// The router-level cause for internal errors.
    pub cause: Option<InternalError>,
}

impl ErrorResponse {
    /// Create a handler-level error response.
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            data: None,
            internal: false,
            cause: None,
        }
    }

    /// Attach a payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} {}: {}", self.status, self.status_text, cause),
            None => write!(f, "{} {}", self.status, self.status_text),
        }
    }
}

impl std::error::Error for ErrorResponse {}

// ============================================================================
// InternalError
// ============================================================================

/// Errors the router raises on its own, each mapped to a status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalError {
    /// A GET submission targeted a route without a loader (400).
    MissingLoader {
        method: String,
        pathname: String,
        route_id: String,
    },
    /// An action returned deferred data (400).
    DeferInAction,
    /// The submission body could not be encoded as requested (400).
    InvalidBody,
    /// An explicitly requested route id does not own the path (403).
    RouteMismatch { route_id: String, pathname: String },
    /// No route matched the path (404).
    NotFound { pathname: String },
    /// The target route has no action for a mutation (405).
    MethodNotAllowed {
        method: String,
        pathname: String,
        route_id: String,
    },
    /// The submission used a method the router does not know (405).
    InvalidMethod { method: String },
}

impl InternalError {
    /// Status code associated with this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::MissingLoader { .. } | Self::DeferInAction | Self::InvalidBody => 400,
            Self::RouteMismatch { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::MethodNotAllowed { .. } | Self::InvalidMethod { .. } => 405,
        }
    }

    /// Reason phrase for [`status`](Self::status).
    pub fn status_text(&self) -> &'static str {
        match self.status() {
            400 => "Bad Request",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            _ => "Unknown Server Error",
        }
    }

    /// Wrap this error into an internal [`ErrorResponse`].
    pub fn into_response(self) -> ErrorResponse {
        ErrorResponse {
            status: self.status(),
            status_text: self.status_text().to_string(),
            data: Some(Value::String(self.to_string())),
            internal: true,
            cause: Some(self),
        }
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLoader {
                method,
                pathname,
                route_id,
            } => write!(
                f,
                "You made a {} request to \"{}\" but did not provide a `loader` for route \"{}\", so there is no way to handle the request.",
                method, pathname, route_id
            ),
            Self::DeferInAction => write!(f, "defer() is not supported in actions"),
            Self::InvalidBody => write!(f, "Unable to encode submission body"),
            Self::RouteMismatch { route_id, pathname } => {
                write!(f, "Route \"{}\" does not match URL \"{}\"", route_id, pathname)
            }
            Self::NotFound { pathname } => write!(f, "No route matches URL \"{}\"", pathname),
            Self::MethodNotAllowed {
                method,
                pathname,
                route_id,
            } => write!(
                f,
                "You made a {} request to \"{}\" but did not provide an `action` for route \"{}\", so there is no way to handle the request.",
                method.to_uppercase(),
                pathname,
                route_id
            ),
            Self::InvalidMethod { method } => {
                write!(f, "Invalid request method \"{}\"", method.to_uppercase())
            }
        }
    }
}

impl std::error::Error for InternalError {}

// ============================================================================
// RouteError
// ============================================================================

/// Error produced by a route handler, stored per boundary in router state.
#[derive(Debug, Clone)]
pub enum RouteError {
    /// A response-shaped error (handler-provided or router-internal).
    Response(ErrorResponse),
    /// Any other application error, passed through unchanged.
    Application(Arc<dyn std::error::Error + Send + Sync + 'static>),
}

/// Plain-message application error used by [`RouteError::msg`].
#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

impl RouteError {
    /// Wrap an arbitrary application error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Application(Arc::new(error))
    }

    /// Application error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Application(Arc::new(Message(message.into())))
    }

    /// Status code, for response-shaped errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response(response) => Some(response.status),
            Self::Application(_) => None,
        }
    }

    /// Borrow the response, if this is a response-shaped error.
    pub fn as_response(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Response(response) => Some(response),
            Self::Application(_) => None,
        }
    }

    /// Borrow the router-internal cause, if the router raised this error.
    pub fn internal(&self) -> Option<&InternalError> {
        self.as_response().and_then(|r| r.cause.as_ref())
    }
}

impl PartialEq for RouteError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Response(a), Self::Response(b)) => a == b,
            (Self::Application(a), Self::Application(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(response) => write!(f, "{}", response),
            Self::Application(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for RouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Response(response) => response
                .cause
                .as_ref()
                .map(|c| c as &(dyn std::error::Error + 'static)),
            Self::Application(error) => Some(error.as_ref()),
        }
    }
}

impl From<ErrorResponse> for RouteError {
    fn from(response: ErrorResponse) -> Self {
        Self::Response(response)
    }
}

impl From<InternalError> for RouteError {
    fn from(error: InternalError) -> Self {
        Self::Response(error.into_response())
    }
}

// ============================================================================
// RouterError
// ============================================================================

/// Failure of a controller API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// The router was created without any routes.
    EmptyRoutes,
    /// Two routes share the same id.
    DuplicateRouteId { id: String },
    /// An index route declared children.
    IndexRouteWithChildren { id: String },
    /// An absolute child path does not start with its parent's path.
    InvalidAbsolutePath { path: String, parent: String },
    /// A blocker was asked to make a transition its state machine forbids.
    InvalidBlockerTransition {
        key: String,
        from: BlockerState,
        to: BlockerState,
    },
    /// No route with this id exists.
    UnknownRoute { id: String },
    /// No navigation is waiting on this blocker.
    UnknownBlocker { key: String },
    /// A location could not be turned into an absolute URL.
    InvalidUrl { url: String },
    /// Redirects kept chaining past the limit.
    RedirectLoop { location: String, depth: usize },
    /// The router has been disposed.
    Disposed,
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRoutes => write!(f, "You must provide a non-empty routes array"),
            Self::DuplicateRouteId { id } => {
                write!(f, "Found a route id collision on id \"{}\"", id)
            }
            Self::IndexRouteWithChildren { id } => {
                write!(f, "Index route \"{}\" cannot have child routes", id)
            }
            Self::InvalidAbsolutePath { path, parent } => write!(
                f,
                "Absolute route path \"{}\" nested under path \"{}\" is not valid",
                path, parent
            ),
            Self::InvalidBlockerTransition { key, from, to } => write!(
                f,
                "Invalid blocker state transition for '{}': {:?} -> {:?}",
                key, from, to
            ),
            Self::UnknownRoute { id } => write!(f, "No route found with id \"{}\"", id),
            Self::UnknownBlocker { key } => {
                write!(f, "Blocker '{}' has no blocked navigation", key)
            }
            Self::InvalidUrl { url } => write!(f, "Unable to build a URL from \"{}\"", url),
            Self::RedirectLoop { location, depth } => write!(
                f,
                "Redirect loop detected (depth {}) redirecting to '{}'",
                depth, location
            ),
            Self::Disposed => write!(f, "Router has been disposed"),
        }
    }
}

impl std::error::Error for RouterError {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_statuses() {
        let not_found = InternalError::NotFound {
            pathname: "/x".into(),
        };
        assert_eq!(not_found.status(), 404);
        assert_eq!(not_found.to_string(), "No route matches URL \"/x\"");

        let method = InternalError::MethodNotAllowed {
            method: "post".into(),
            pathname: "/a".into(),
            route_id: "a".into(),
        };
        assert_eq!(method.status(), 405);
        assert!(method.to_string().contains("POST request to \"/a\""));

        assert_eq!(InternalError::InvalidBody.status(), 400);
        assert_eq!(
            InternalError::RouteMismatch {
                route_id: "x".into(),
                pathname: "/".into()
            }
            .status_text(),
            "Forbidden"
        );
    }

    #[test]
    fn test_internal_response_is_flagged() {
        let response = InternalError::DeferInAction.into_response();
        assert!(response.internal);
        assert_eq!(response.status, 400);
        assert_eq!(response.cause, Some(InternalError::DeferInAction));
    }

    #[test]
    fn test_route_error_accessors() {
        let err: RouteError = ErrorResponse::new(401, "Unauthorized").into();
        assert_eq!(err.status(), Some(401));
        assert!(err.internal().is_none());

        let err: RouteError = InternalError::NotFound {
            pathname: "/gone".into(),
        }
        .into();
        assert_eq!(
            err.internal(),
            Some(&InternalError::NotFound {
                pathname: "/gone".into()
            })
        );
    }

    #[test]
    fn test_application_error_equality_is_identity() {
        let a = RouteError::msg("boom");
        let b = RouteError::msg("boom");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_router_error_display() {
        let err = RouterError::DuplicateRouteId { id: "root".into() };
        assert_eq!(err.to_string(), "Found a route id collision on id \"root\"");
    }
}
