//! Logging facade used throughout the engine.
//!
//! Every diagnostic in this crate goes through one of five macros that expand
//! to either the [`log`](https://docs.rs/log) or the
//! [`tracing`](https://docs.rs/tracing) backend, selected by feature flag.
//! Enable at most one of the two.
//!
//! | Feature    | Backend         | Default |
//! |------------|-----------------|---------|
//! | `log`      | `log` crate     | yes     |
//! | `tracing`  | `tracing` crate | no      |
//!
//! Level conventions used by the router:
//!
//! - `info_log!`: a navigation starts or commits.
//! - `debug_log!`: phase changes (action, loaders, redirects, fetchers).
//! - `trace_log!`: individual handler calls and matcher decisions.
//! - `warn_log!`: misconfiguration that the router tolerates
//!   (several blockers, discovery that does not converge).
//! - `error_log!`: invariant violations reported back to the caller.
//!
//! ```ignore
//! use data_navigator::{debug_log, info_log};
//!
//! info_log!("Navigation PUSH: '{}' -> '{}'", from, to);
//! debug_log!("Running {} loaders", matches_to_load.len());
//! ```

/// Emit a **trace**-level message through the configured backend.
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!($($arg)*);
        #[cfg(feature = "log")]
        ::log::trace!($($arg)*);
    };
}

/// Emit a **debug**-level message through the configured backend.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!($($arg)*);
        #[cfg(feature = "log")]
        ::log::debug!($($arg)*);
    };
}

/// Emit an **info**-level message through the configured backend.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::info!($($arg)*);
        #[cfg(feature = "log")]
        ::log::info!($($arg)*);
    };
}

/// Emit a **warn**-level message through the configured backend.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::warn!($($arg)*);
        #[cfg(feature = "log")]
        ::log::warn!($($arg)*);
    };
}

/// Emit an **error**-level message through the configured backend.
#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::error!($($arg)*);
        #[cfg(feature = "log")]
        ::log::error!($($arg)*);
    };
}
