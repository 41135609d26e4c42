//! Router state snapshot and its parts.
//!
//! [`RouterState`] is immutable once published: every commit builds a new
//! snapshot and hands it to subscribers. The types here describe the pieces
//! of that snapshot: the in-flight [`Navigation`], per-key [`Fetcher`]s and
//! [`Blocker`]s, and the data/error maps keyed by route id.

use crate::deferred::DeferredData;
use crate::error::{RouteError, RouterError};
use crate::history::{HistoryAction, Location};
use crate::matching::RouteMatch;
use crate::submission::Submission;
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Loader data
// ============================================================================

/// Data a route's loader produced.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderData {
    Value(Value),
    /// Streamed data; individual keys may still be pending.
    Deferred(DeferredData),
}

impl LoaderData {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Deferred(_) => None,
        }
    }

    pub fn as_deferred(&self) -> Option<&DeferredData> {
        match self {
            Self::Deferred(deferred) => Some(deferred),
            Self::Value(_) => None,
        }
    }
}

// ============================================================================
// Navigation
// ============================================================================

/// The navigation in flight, if any.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Navigation {
    #[default]
    Idle,
    /// Loaders are running for `location`.
    Loading {
        location: Location,
        submission: Option<Submission>,
    },
    /// An action is running for `location`.
    Submitting {
        location: Location,
        submission: Submission,
    },
}

impl Navigation {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Idle => None,
            Self::Loading { location, .. } | Self::Submitting { location, .. } => Some(location),
        }
    }

    pub fn submission(&self) -> Option<&Submission> {
        match self {
            Self::Idle => None,
            Self::Loading { submission, .. } => submission.as_ref(),
            Self::Submitting { submission, .. } => Some(submission),
        }
    }

    /// A loading navigation that follows a completed mutation.
    pub(crate) fn is_action_reload(&self) -> bool {
        match self {
            Self::Loading {
                location,
                submission: Some(submission),
            } => submission.form_method.is_mutation() && !location.is_redirect(),
            _ => false,
        }
    }
}

/// Whether a revalidation (not a navigation) is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevalidationState {
    #[default]
    Idle,
    Loading,
}

// ============================================================================
// Fetchers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetcherState {
    #[default]
    Idle,
    Loading,
    Submitting,
}

/// State of one keyed fetcher.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fetcher {
    pub state: FetcherState,
    /// Last data the fetcher received; kept across reloads.
    pub data: Option<Value>,
    pub submission: Option<Submission>,
}

impl Fetcher {
    pub fn idle(data: Option<Value>) -> Self {
        Self {
            state: FetcherState::Idle,
            data,
            submission: None,
        }
    }

    pub fn loading(submission: Option<Submission>, data: Option<Value>) -> Self {
        Self {
            state: FetcherState::Loading,
            data,
            submission,
        }
    }

    pub fn submitting(submission: Submission, data: Option<Value>) -> Self {
        Self {
            state: FetcherState::Submitting,
            data,
            submission: Some(submission),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == FetcherState::Idle
    }
}

// ============================================================================
// Blockers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockerState {
    #[default]
    Unblocked,
    Blocked,
    Proceeding,
}

/// State of one keyed blocker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Blocker {
    pub state: BlockerState,
    /// Destination of the blocked navigation.
    pub location: Option<Location>,
}

impl Blocker {
    pub fn unblocked() -> Self {
        Self::default()
    }

    pub fn blocked(location: Location) -> Self {
        Self {
            state: BlockerState::Blocked,
            location: Some(location),
        }
    }

    pub fn proceeding(location: Location) -> Self {
        Self {
            state: BlockerState::Proceeding,
            location: Some(location),
        }
    }
}

/// Check a blocker state change against the blocker state machine.
///
/// ```
/// use data_navigator::state::{validate_blocker_transition, BlockerState::*};
///
/// assert!(validate_blocker_transition("k", Unblocked, Blocked).is_ok());
/// assert!(validate_blocker_transition("k", Unblocked, Proceeding).is_err());
/// ```
pub fn validate_blocker_transition(
    key: &str,
    from: BlockerState,
    to: BlockerState,
) -> Result<(), RouterError> {
    use BlockerState::*;
    match (from, to) {
        (Unblocked, Blocked)
        | (Blocked, Blocked)
        | (Blocked, Proceeding)
        | (Blocked, Unblocked)
        | (Proceeding, Unblocked) => Ok(()),
        _ => Err(RouterError::InvalidBlockerTransition {
            key: key.to_string(),
            from,
            to,
        }),
    }
}

// ============================================================================
// RouterState
// ============================================================================

/// A consistent snapshot of everything the router knows.
#[derive(Debug, Clone)]
pub struct RouterState {
    pub history_action: HistoryAction,
    pub location: Location,
    /// Matches for `location`; empty only while nothing matched (404).
    pub matches: Vec<RouteMatch>,
    /// Initial data has been loaded.
    pub initialized: bool,
    pub navigation: Navigation,
    pub revalidation: RevalidationState,
    /// Route id → data; `None` marks a route that has no data (its loader
    /// errored or it has no loader).
    pub loader_data: HashMap<String, Option<LoaderData>>,
    /// Route id → data returned by the last action; empty when none.
    pub action_data: HashMap<String, Value>,
    /// Boundary route id → error.
    pub errors: HashMap<String, RouteError>,
    pub fetchers: HashMap<String, Fetcher>,
    pub blockers: HashMap<String, Blocker>,
    /// Carried from the navigation options, for the UI's scroll handling.
    pub prevent_scroll_reset: bool,
}

impl RouterState {
    /// Loader data of a route, when it is a plain value.
    pub fn loader_value(&self, route_id: &str) -> Option<&Value> {
        self.loader_data
            .get(route_id)
            .and_then(Option::as_ref)
            .and_then(LoaderData::as_value)
    }

    /// Deferred loader data of a route.
    pub fn loader_deferred(&self, route_id: &str) -> Option<&DeferredData> {
        self.loader_data
            .get(route_id)
            .and_then(Option::as_ref)
            .and_then(LoaderData::as_deferred)
    }

    pub fn error(&self, route_id: &str) -> Option<&RouteError> {
        self.errors.get(route_id)
    }

    /// A fetcher's state; unknown keys read as idle.
    pub fn fetcher(&self, key: &str) -> Fetcher {
        self.fetchers.get(key).cloned().unwrap_or_default()
    }

    /// A blocker's state; unknown keys read as unblocked.
    pub fn blocker(&self, key: &str) -> Blocker {
        self.blockers.get(key).cloned().unwrap_or_default()
    }

    /// Route ids of the current matches, outermost first.
    pub fn match_ids(&self) -> Vec<&str> {
        self.matches.iter().map(RouteMatch::route_id).collect()
    }
}

/// Extra information delivered with each published snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMetadata {
    /// Fetcher keys removed by this commit.
    pub deleted_fetchers: Vec<String>,
    /// The navigation asked for a synchronous UI flush.
    pub flush_sync: bool,
}

/// Data loaded before the router was created (e.g. server rendered).
#[derive(Debug, Clone, Default)]
pub struct HydrationData {
    pub loader_data: HashMap<String, Value>,
    pub action_data: HashMap<String, Value>,
    pub errors: HashMap<String, RouteError>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::submission::{FormEncType, FormMethod, SubmissionBody};

    #[test]
    fn test_blocker_transitions() {
        use BlockerState::*;
        let all = [Unblocked, Blocked, Proceeding];
        let allowed = [
            (Unblocked, Blocked),
            (Blocked, Blocked),
            (Blocked, Proceeding),
            (Blocked, Unblocked),
            (Proceeding, Unblocked),
        ];
        for from in all {
            for to in all {
                let result = validate_blocker_transition("b", from, to);
                assert_eq!(result.is_ok(), allowed.contains(&(from, to)), "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn test_action_reload_detection() {
        let submission = Submission {
            form_method: FormMethod::Post,
            form_action: "/a".into(),
            form_enc_type: FormEncType::UrlEncoded,
            body: SubmissionBody::Text(String::new()),
        };
        let nav = Navigation::Loading {
            location: Location::new(Path::parse("/a"), None),
            submission: Some(submission.clone()),
        };
        assert!(nav.is_action_reload());

        let redirected = Navigation::Loading {
            location: Location::new(
                Path::parse("/b"),
                Some(serde_json::json!({"_isRedirect": true})),
            ),
            submission: Some(submission),
        };
        assert!(!redirected.is_action_reload());
        assert!(!Navigation::Idle.is_action_reload());
    }

    #[test]
    fn test_unknown_keys_read_as_defaults() {
        let state = RouterState {
            history_action: HistoryAction::Pop,
            location: Location::default(),
            matches: Vec::new(),
            initialized: true,
            navigation: Navigation::Idle,
            revalidation: RevalidationState::Idle,
            loader_data: HashMap::new(),
            action_data: HashMap::new(),
            errors: HashMap::new(),
            fetchers: HashMap::new(),
            blockers: HashMap::new(),
            prevent_scroll_reset: false,
        };
        assert!(state.fetcher("nope").is_idle());
        assert_eq!(state.blocker("nope").state, BlockerState::Unblocked);
    }
}
