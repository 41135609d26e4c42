//! History adapter.
//!
//! The router never touches a global location: every read and write goes
//! through the [`History`] trait. [`MemoryHistory`] is the in-process
//! implementation used by tests, desktop hosts and server-side rendering.
//!
//! Only POP transitions are reported to the listener. `push` and `replace`
//! are issued by the router itself, which already knows about them.

use crate::path::{parse_path, Path};
use crate::{debug_log, trace_log, warn_log};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use url::Url;
use uuid::Uuid;

/// Origin assumed by in-memory histories when building absolute URLs.
pub const DEFAULT_ORIGIN: &str = "http://localhost";

/// How the current location was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryAction {
    /// Back/forward traversal, or the initial load.
    Pop,
    /// A new entry was added.
    Push,
    /// The current entry was overwritten.
    Replace,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pop => "POP",
            Self::Push => "PUSH",
            Self::Replace => "REPLACE",
        })
    }
}

/// A history entry: a [`Path`] plus caller state and a unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub pathname: String,
    pub search: String,
    pub hash: String,
    /// Opaque state supplied by whoever created the entry.
    pub state: Option<Value>,
    /// Unique key of this entry (`"default"` for the initial one).
    pub key: String,
}

impl Location {
    /// Create a location for `path` with a fresh key.
    pub fn new(path: Path, state: Option<Value>) -> Self {
        Self::with_key(path, state, create_key())
    }

    /// Create a location with an explicit key.
    pub fn with_key(path: Path, state: Option<Value>, key: impl Into<String>) -> Self {
        Self {
            pathname: path.pathname,
            search: path.search,
            hash: path.hash,
            state,
            key: key.into(),
        }
    }

    /// The path portion of this location.
    pub fn path(&self) -> Path {
        Path {
            pathname: self.pathname.clone(),
            search: self.search.clone(),
            hash: self.hash.clone(),
        }
    }

    /// `pathname + search + hash`.
    pub fn href(&self) -> String {
        self.path().to_string()
    }

    /// Whether this location was produced by following a redirect.
    pub fn is_redirect(&self) -> bool {
        self.state
            .as_ref()
            .and_then(|s| s.get(REDIRECT_STATE_KEY))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::with_key(Path::default(), None, "default")
    }
}

/// State key marking locations reached through a redirect.
pub(crate) const REDIRECT_STATE_KEY: &str = "_isRedirect";

/// Generate a short random location key.
pub fn create_key() -> String {
    let mut key = Uuid::new_v4().simple().to_string();
    key.truncate(8);
    key
}

/// Build the location `to` resolves to, relative to `current`.
///
/// A `to` without a pathname keeps the current one, like an `href` of
/// `?page=2` does in a browser.
pub fn create_location(current: &Location, to: &str, state: Option<Value>) -> Location {
    let parsed = parse_path(to);
    let path = Path::new(
        parsed.pathname.unwrap_or_else(|| current.pathname.clone()),
        parsed.search.as_deref().unwrap_or_default(),
        parsed.hash.as_deref().unwrap_or_default(),
    );
    Location::new(path, state)
}

/// Notification delivered to the history listener on POP.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryUpdate {
    pub action: HistoryAction,
    pub location: Location,
    /// Number of entries traversed, when known.
    pub delta: Option<isize>,
}

/// Callback invoked on POP transitions.
pub type HistoryListener = Rc<dyn Fn(&HistoryUpdate)>;

/// Handle returned by [`History::listen`]; call [`unlisten`](Self::unlisten)
/// to detach the listener.
pub struct Unlisten(Option<Box<dyn FnOnce()>>);

impl Unlisten {
    /// Wrap a detach callback.
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// Detach the listener.
    pub fn unlisten(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl fmt::Debug for Unlisten {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unlisten")
            .field("attached", &self.0.is_some())
            .finish()
    }
}

/// The history collaborator the router drives.
pub trait History {
    /// Action that produced the current entry.
    fn action(&self) -> HistoryAction;

    /// Current entry.
    fn location(&self) -> Location;

    /// Add an entry.
    fn push(&mut self, location: &Location);

    /// Overwrite the current entry.
    fn replace(&mut self, location: &Location);

    /// Traverse `delta` entries; reported to the listener as a POP.
    fn go(&mut self, delta: isize);

    /// Install the (single) POP listener.
    fn listen(&mut self, listener: HistoryListener) -> Unlisten;

    /// Render a path as an href usable by links.
    fn create_href(&self, to: &Path) -> String {
        to.to_string()
    }

    /// Encode a path the way the host would store it.
    fn encode_location(&self, to: &Path) -> Path {
        to.clone()
    }

    /// Origin the history lives under.
    fn origin(&self) -> String {
        DEFAULT_ORIGIN.to_string()
    }

    /// Absolute URL for a path.
    fn create_url(&self, to: &Path) -> Result<Url, url::ParseError> {
        Url::parse(&self.origin())?.join(&self.create_href(to))
    }

    /// Leave the app with a full document load (cross-origin redirects and
    /// the like).
    fn navigate_document(&mut self, url: &str, replace: bool) {
        warn_log!(
            "History cannot perform document navigation to '{}' (replace: {})",
            url,
            replace
        );
    }
}

/// In-memory history stack.
///
/// ```
/// use data_navigator::history::{History, HistoryAction, MemoryHistory};
///
/// let mut history = MemoryHistory::new(["/", "/users", "/users/1"], None);
/// assert_eq!(history.location().pathname, "/users/1");
///
/// history.go(-2);
/// assert_eq!(history.location().pathname, "/");
/// assert_eq!(history.action(), HistoryAction::Pop);
/// ```
pub struct MemoryHistory {
    entries: Vec<Location>,
    index: usize,
    action: HistoryAction,
    listener: Rc<RefCell<Option<HistoryListener>>>,
    document_navigations: Vec<(String, bool)>,
}

impl MemoryHistory {
    /// Create a history from initial entries, positioned at `initial_index`
    /// (clamped; defaults to the last entry).
    pub fn new<I, S>(initial_entries: I, initial_index: Option<usize>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<Location> = initial_entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let key = if i == 0 {
                    "default".to_string()
                } else {
                    create_key()
                };
                Location::with_key(Path::parse(entry.as_ref()), None, key)
            })
            .collect();
        if entries.is_empty() {
            entries.push(Location::default());
        }
        let last = entries.len() - 1;
        let index = initial_index.map_or(last, |i| i.min(last));
        Self {
            entries,
            index,
            action: HistoryAction::Pop,
            listener: Rc::new(RefCell::new(None)),
            document_navigations: Vec::new(),
        }
    }

    /// Current position in the stack.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Every entry, oldest first.
    pub fn entries(&self) -> &[Location] {
        &self.entries
    }

    /// Document navigations requested so far, as `(url, replace)`.
    pub fn document_navigations(&self) -> &[(String, bool)] {
        &self.document_navigations
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(["/"], None)
    }
}

impl History for MemoryHistory {
    fn action(&self) -> HistoryAction {
        self.action
    }

    fn location(&self) -> Location {
        self.entries[self.index].clone()
    }

    fn push(&mut self, location: &Location) {
        self.action = HistoryAction::Push;
        self.index += 1;
        self.entries.truncate(self.index);
        self.entries.push(location.clone());
        trace_log!("MemoryHistory push '{}' (index {})", location.href(), self.index);
    }

    fn replace(&mut self, location: &Location) {
        self.action = HistoryAction::Replace;
        self.entries[self.index] = location.clone();
        trace_log!("MemoryHistory replace '{}'", location.href());
    }

    fn go(&mut self, delta: isize) {
        let last = self.entries.len() as isize - 1;
        let next = (self.index as isize + delta).clamp(0, last) as usize;
        self.action = HistoryAction::Pop;
        self.index = next;
        let update = HistoryUpdate {
            action: HistoryAction::Pop,
            location: self.entries[next].clone(),
            delta: Some(delta),
        };
        debug_log!("MemoryHistory go({}) -> '{}'", delta, update.location.href());
        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener {
            listener(&update);
        }
    }

    fn listen(&mut self, listener: HistoryListener) -> Unlisten {
        if self.listener.borrow().is_some() {
            warn_log!("A history only accepts one active listener; replacing it");
        }
        *self.listener.borrow_mut() = Some(listener);
        let slot = Rc::downgrade(&self.listener);
        Unlisten::new(move || {
            if let Some(slot) = slot.upgrade() {
                slot.borrow_mut().take();
            }
        })
    }

    fn navigate_document(&mut self, url: &str, replace: bool) {
        debug_log!("MemoryHistory document navigation to '{}'", url);
        self.document_navigations.push((url.to_string(), replace));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_push_truncates_forward_entries() {
        let mut history = MemoryHistory::new(["/", "/a", "/b"], Some(0));
        history.push(&Location::new(Path::parse("/c"), None));

        assert_eq!(history.entries().len(), 2);
        assert_eq!(history.location().pathname, "/c");
        assert_eq!(history.action(), HistoryAction::Push);
    }

    #[test]
    fn test_replace_keeps_length() {
        let mut history = MemoryHistory::default();
        history.push(&Location::new(Path::parse("/users"), None));
        history.replace(&Location::new(Path::parse("/posts"), None));

        assert_eq!(history.location().pathname, "/posts");
        assert_eq!(history.entries().len(), 2);
    }

    #[test]
    fn test_go_notifies_listener_and_clamps() {
        let mut history = MemoryHistory::new(["/", "/a"], None);
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        let unlisten = history.listen(Rc::new(move |update| {
            assert_eq!(update.action, HistoryAction::Pop);
            counter.set(counter.get() + 1);
        }));

        history.go(-5);
        assert_eq!(history.index(), 0);
        assert_eq!(seen.get(), 1);

        unlisten.unlisten();
        history.go(1);
        assert_eq!(seen.get(), 1);
        assert_eq!(history.location().pathname, "/a");
    }

    #[test]
    fn test_create_url_uses_origin() {
        let history = MemoryHistory::default();
        let url = history.create_url(&Path::parse("/a?b=1")).unwrap();
        assert_eq!(url.as_str(), "http://localhost/a?b=1");
    }

    #[test]
    fn test_create_location_keeps_pathname_for_search_only() {
        let current = Location::with_key(Path::parse("/list"), None, "k");
        let next = create_location(&current, "?page=2", None);
        assert_eq!(next.pathname, "/list");
        assert_eq!(next.search, "?page=2");
        assert_ne!(next.key, "k");
    }
}
