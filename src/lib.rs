//! # data-navigator
//!
//! Navigation and data engine for client-side routers.
//!
//! The crate owns everything between "the URL changed" and "here is the
//! state to render": matching the URL against a nested route tree, running
//! route loaders and actions with cancellation, background fetchers,
//! navigation blockers, streamed (deferred) loader data and redirects. It
//! renders nothing; a UI layer subscribes to [`RouterState`] snapshots.
//!
//! ## Pieces
//!
//! - [`route`] / [`matching`]: route definitions and the ranked matcher.
//! - [`router`]: the [`Router`] controller and its configuration.
//! - [`state`]: the published snapshot (navigation, fetchers, blockers).
//! - [`fetcher`], [`blocker`], [`deferred`], [`discovery`]: the subsystems
//!   the controller coordinates.
//! - [`history`]: the history abstraction plus an in-memory implementation.
//!
//! ## Features
//!
//! - `log` (default) / `tracing`: logging backend.
//! - `cache` (default): LRU cache of match results.
//!
//! ## Runtime model
//!
//! The router is single-threaded (`Rc`, `!Send`) and executor-agnostic.
//! Handler futures run on whatever drives the router futures; give the
//! router a [`LocalSpawn`](futures::task::LocalSpawn) to have deferred data
//! and history events processed in the background.

pub mod logging;

pub mod abort;
pub mod blocker;
#[cfg(feature = "cache")]
pub mod cache;
pub mod deferred;
pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod handler;
pub mod history;
pub mod matching;
mod navigation;
pub mod params;
pub mod path;
mod revalidation;
pub mod route;
pub mod router;
pub mod state;
pub mod submission;

pub use abort::{AbortController, AbortSignal};
pub use blocker::{BlockerArgs, BlockerFn};
#[cfg(feature = "cache")]
pub use cache::CacheStats;
pub use deferred::{DeferredData, DeferredError, TrackedValue};
pub use discovery::{DiscoveryArgs, PatchRoutes, PatchRoutesOnNavigation};
pub use error::{ErrorResponse, InternalError, RouteError, RouterError};
pub use fetcher::FetchOptions;
pub use handler::{
    handler_fn, Handler, HandlerArgs, HandlerResult, HandlerValue, Redirect, Request, ShouldRevalidateArgs,
};
pub use history::{History, HistoryAction, HistoryUpdate, Location, MemoryHistory};
pub use matching::RouteMatch;
pub use params::{FormData, RouteParams, SearchParams};
pub use path::Path;
pub use route::{DataRoute, LazyRoute, Route, RouteTree};
pub use router::{NavigateOptions, Router, RouterInit, Subscription, To};
pub use state::{
    Blocker, BlockerState, Fetcher, FetcherState, HydrationData, LoaderData, Navigation, RevalidationState,
    RouterState, StateMetadata,
};
pub use submission::{FormEncType, FormMethod, SubmissionBody, Submission, SubmitOptions};
