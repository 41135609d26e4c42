//! Navigation blockers.
//!
//! A blocker is a keyed predicate consulted before a navigation starts. When
//! it returns `true` the navigation is parked and the blocker moves to
//! `Blocked`; the app then calls [`Router::proceed_blocker`] or
//! [`Router::reset_blocker`].
//!
//! ```text
//! Unblocked -> Blocked -> Proceeding -> Unblocked
//!                  \-------------------^ (reset)
//! ```

use crate::error::RouterError;
use crate::history::{HistoryAction, Location};
use crate::router::{NavigateOptions, Router};
use crate::state::{validate_blocker_transition, Blocker, BlockerState};
use crate::{debug_log, error_log, info_log, warn_log};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Input to a blocker predicate.
#[derive(Debug, Clone, Copy)]
pub struct BlockerArgs<'a> {
    pub current_location: &'a Location,
    pub next_location: &'a Location,
    pub history_action: HistoryAction,
}

/// Returns `true` to block the navigation.
pub type BlockerFn = Rc<dyn Fn(&BlockerArgs<'_>) -> bool>;

/// A navigation parked by a blocker, replayed on proceed.
#[derive(Debug, Clone)]
pub(crate) enum BlockedNavigation {
    Navigate { to: String, opts: NavigateOptions },
    /// A POP already undone in history; proceeding re-applies `delta`.
    Pop { delta: isize },
}

#[derive(Default)]
pub(crate) struct BlockerRegistry {
    /// Registration order matters: the last predicate decides.
    functions: Vec<(String, BlockerFn)>,
    pub blocked: HashMap<String, BlockedNavigation>,
}

impl BlockerRegistry {
    fn get(&self, key: &str) -> Option<&BlockerFn> {
        self.functions.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    fn set(&mut self, key: &str, predicate: BlockerFn) {
        match self.functions.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = predicate,
            None => self.functions.push((key.to_string(), predicate)),
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        let before = self.functions.len();
        self.functions.retain(|(k, _)| k != key);
        self.blocked.remove(key);
        before != self.functions.len()
    }
}

impl fmt::Debug for BlockerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockerRegistry")
            .field("keys", &self.functions.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("blocked", &self.blocked.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Router {
    /// Register (or replace) the predicate for `key` and return its state.
    pub fn get_blocker(&self, key: &str, predicate: impl Fn(&BlockerArgs<'_>) -> bool + 'static) -> Blocker {
        let predicate: BlockerFn = Rc::new(predicate);
        let mut core = self.inner.core.borrow_mut();
        if core.blockers.get(key).is_none() {
            debug_log!("Blocker '{}' registered", key);
        }
        core.blockers.set(key, predicate);
        drop(core);
        self.state().blocker(key)
    }

    /// Unregister `key` and drop its state.
    pub fn delete_blocker(&self, key: &str) {
        if !self.inner.core.borrow_mut().blockers.remove(key) {
            return;
        }
        debug_log!("Blocker '{}' removed", key);
        let owned = key.to_string();
        self.update_state(false, move |state| {
            state.blockers.remove(&owned);
        });
    }

    /// Let the navigation parked by `key` through.
    pub async fn proceed_blocker(&self, key: &str) -> Result<(), RouterError> {
        self.ensure_active()?;
        let current = self.state().blocker(key);
        validate_blocker_transition(key, current.state, BlockerState::Proceeding)?;
        let pending = self
            .inner
            .core
            .borrow_mut()
            .blockers
            .blocked
            .remove(key)
            .ok_or_else(|| RouterError::UnknownBlocker { key: key.to_string() })?;
        let Some(location) = current.location else {
            return Err(RouterError::UnknownBlocker { key: key.to_string() });
        };
        info_log!("Blocker '{}' proceeding to '{}'", key, location.href());
        self.update_blocker(key, Blocker::proceeding(location))?;

        match pending {
            BlockedNavigation::Navigate { to, opts } => self.navigate_to(to, opts).await,
            BlockedNavigation::Pop { delta } => {
                self.inner.history.borrow_mut().go(delta);
                self.flush_history_updates().await
            }
        }
    }

    /// Drop the navigation parked by `key`.
    pub fn reset_blocker(&self, key: &str) -> Result<(), RouterError> {
        let current = self.state().blocker(key);
        validate_blocker_transition(key, current.state, BlockerState::Unblocked)?;
        self.inner.core.borrow_mut().blockers.blocked.remove(key);
        debug_log!("Blocker '{}' reset", key);
        self.update_blocker(key, Blocker::unblocked())
    }

    pub(crate) fn has_blockers(&self) -> bool {
        !self.inner.core.borrow().blockers.functions.is_empty()
    }

    /// Key of the blocker that stops `current -> next`, if any.
    pub(crate) fn should_block_navigation(
        &self,
        current: &Location,
        next: &Location,
        history_action: HistoryAction,
    ) -> Option<String> {
        let (key, predicate) = {
            let core = self.inner.core.borrow();
            let functions = &core.blockers.functions;
            if functions.len() > 1 {
                warn_log!(
                    "{} blockers registered; only the most recent one is consulted",
                    functions.len()
                );
            }
            let (key, predicate) = functions.last()?;
            (key.clone(), predicate.clone())
        };
        if self.state().blocker(&key).state == BlockerState::Proceeding {
            return None;
        }
        let args = BlockerArgs {
            current_location: current,
            next_location: next,
            history_action,
        };
        predicate(&args).then_some(key)
    }

    /// Park `pending` under `key` and publish the blocked state.
    pub(crate) fn block(
        &self,
        key: &str,
        location: Location,
        pending: BlockedNavigation,
    ) -> Result<(), RouterError> {
        self.inner
            .core
            .borrow_mut()
            .blockers
            .blocked
            .insert(key.to_string(), pending);
        info_log!("Navigation to '{}' blocked by '{}'", location.href(), key);
        if let Err(err) = self.update_blocker(key, Blocker::blocked(location)) {
            self.inner.core.borrow_mut().blockers.blocked.remove(key);
            return Err(err);
        }
        Ok(())
    }

    fn update_blocker(&self, key: &str, next: Blocker) -> Result<(), RouterError> {
        let from = self.state().blocker(key).state;
        if let Err(err) = validate_blocker_transition(key, from, next.state) {
            error_log!("{}", err);
            return Err(err);
        }
        let owned = key.to_string();
        self.update_state(false, move |state| {
            state.blockers.insert(owned, next);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_replaces_in_place() {
        let mut registry = BlockerRegistry::default();
        registry.set("a", Rc::new(|_: &BlockerArgs<'_>| true));
        registry.set("b", Rc::new(|_: &BlockerArgs<'_>| true));
        registry.set("a", Rc::new(|_: &BlockerArgs<'_>| false));
        let keys: Vec<&str> = registry.functions.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);

        let location = Location::default();
        let args = BlockerArgs {
            current_location: &location,
            next_location: &location,
            history_action: HistoryAction::Push,
        };
        assert!(!(registry.get("a").unwrap())(&args));
    }

    #[test]
    fn test_remove_clears_parked_navigation() {
        let mut registry = BlockerRegistry::default();
        registry.set("a", Rc::new(|_: &BlockerArgs<'_>| true));
        registry
            .blocked
            .insert("a".into(), BlockedNavigation::Pop { delta: -1 });
        assert!(registry.remove("a"));
        assert!(registry.blocked.is_empty());
        assert!(!registry.remove("a"));
    }
}
