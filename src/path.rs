//! Path parsing, joining and relative resolution.
//!
//! A [`Path`] is the `pathname` + `search` + `hash` triple of a URL without
//! its origin. The helpers here follow a small set of normalization rules:
//!
//! 1. pathnames always start with `/`; `""` becomes `"/"`;
//! 2. trailing slashes are dropped by [`normalize_pathname`] (root excepted);
//! 3. runs of slashes collapse when paths are joined;
//! 4. `search` is either empty or starts with `?`, `hash` either empty or
//!    starts with `#`.
//!
//! Relative resolution ([`resolve_to`]) is *route* relative: `..` climbs one
//! matched route, not one URL segment, unless the caller asks for path
//! relative resolution.

use crate::warn_log;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// The path portion of a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    /// URL pathname, always starting with `/`.
    pub pathname: String,
    /// Query string including its `?`, or empty.
    pub search: String,
    /// Fragment including its `#`, or empty.
    pub hash: String,
}

impl Path {
    /// Build a path from its pieces, normalizing `search` and `hash`.
    pub fn new(pathname: impl Into<String>, search: &str, hash: &str) -> Self {
        Self {
            pathname: pathname.into(),
            search: normalize_search(search),
            hash: normalize_hash(hash),
        }
    }

    /// Parse a full path string, defaulting a missing pathname to `/`.
    pub fn parse(path: &str) -> Self {
        let partial = parse_path(path);
        Self {
            pathname: partial.pathname.unwrap_or_else(|| "/".to_string()),
            search: partial.search.unwrap_or_default(),
            hash: partial.hash.unwrap_or_default(),
        }
    }
}

impl Default for Path {
    fn default() -> Self {
        Self {
            pathname: "/".to_string(),
            search: String::new(),
            hash: String::new(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pathname)?;
        if !self.search.is_empty() && self.search != "?" {
            if !self.search.starts_with('?') {
                f.write_str("?")?;
            }
            f.write_str(&self.search)?;
        }
        if !self.hash.is_empty() && self.hash != "#" {
            if !self.hash.starts_with('#') {
                f.write_str("#")?;
            }
            f.write_str(&self.hash)?;
        }
        Ok(())
    }
}

/// A path where any piece may be absent, as written by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialPath {
    pub pathname: Option<String>,
    pub search: Option<String>,
    pub hash: Option<String>,
}

/// Split a path string into its pathname, search and hash pieces.
///
/// ```
/// use data_navigator::path::parse_path;
///
/// let p = parse_path("/a/b?x=1#top");
/// assert_eq!(p.pathname.as_deref(), Some("/a/b"));
/// assert_eq!(p.search.as_deref(), Some("?x=1"));
/// assert_eq!(p.hash.as_deref(), Some("#top"));
///
/// let p = parse_path("?only=search");
/// assert_eq!(p.pathname, None);
/// ```
pub fn parse_path(path: &str) -> PartialPath {
    let mut parsed = PartialPath::default();
    let mut rest = path;
    if let Some(idx) = rest.find('#') {
        parsed.hash = Some(rest[idx..].to_string());
        rest = &rest[..idx];
    }
    if let Some(idx) = rest.find('?') {
        parsed.search = Some(rest[idx..].to_string());
        rest = &rest[..idx];
    }
    if !rest.is_empty() {
        parsed.pathname = Some(rest.to_string());
    }
    parsed
}

/// Strip any `#fragment` from a path string.
pub fn strip_hash(path: &str) -> &str {
    path.find('#').map_or(path, |idx| &path[..idx])
}

/// Join path pieces with `/`, collapsing repeated slashes.
///
/// ```
/// use data_navigator::path::join_paths;
///
/// assert_eq!(join_paths(&["/", "users", ":id"]), "/users/:id");
/// assert_eq!(join_paths(&["/app/", "/settings"]), "/app/settings");
/// ```
pub fn join_paths(paths: &[&str]) -> String {
    let joined = paths.join("/");
    let mut out = String::with_capacity(joined.len());
    let mut prev_slash = false;
    for c in joined.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

/// Normalize a pathname: leading slash, no trailing slash (unless root).
///
/// Returns `Cow<str>` to avoid allocation when the path is already normal.
///
/// ```
/// use data_navigator::path::normalize_pathname;
///
/// assert_eq!(normalize_pathname("/dashboard"), "/dashboard");
/// assert_eq!(normalize_pathname("dashboard/"), "/dashboard");
/// assert_eq!(normalize_pathname(""), "/");
/// assert_eq!(normalize_pathname("///"), "/");
/// ```
#[must_use]
pub fn normalize_pathname(path: &'_ str) -> Cow<'_, str> {
    if path == "/" {
        return Cow::Borrowed(path);
    }
    if path.starts_with('/') && !path.starts_with("//") && !path.ends_with('/') {
        return Cow::Borrowed(path);
    }
    let trimmed = path.trim_end_matches('/').trim_start_matches('/');
    if trimmed.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{trimmed}"))
    }
}

/// Normalize a query string to either `""` or `"?…"`.
pub fn normalize_search(search: &str) -> String {
    if search.is_empty() || search == "?" {
        String::new()
    } else if search.starts_with('?') {
        search.to_string()
    } else {
        format!("?{search}")
    }
}

/// Normalize a fragment to either `""` or `"#…"`.
pub fn normalize_hash(hash: &str) -> String {
    if hash.is_empty() || hash == "#" {
        String::new()
    } else if hash.starts_with('#') {
        hash.to_string()
    } else {
        format!("#{hash}")
    }
}

/// Remove `basename` from the front of `pathname`.
///
/// Returns `None` if the pathname lives outside the basename. Comparison is
/// case-insensitive, matching how the browser treats the app mount point.
///
/// ```
/// use data_navigator::path::strip_basename;
///
/// assert_eq!(strip_basename("/app/users", "/app"), Some("/users"));
/// assert_eq!(strip_basename("/app", "/app"), Some("/"));
/// assert_eq!(strip_basename("/apple", "/app"), None);
/// assert_eq!(strip_basename("/users", "/"), Some("/users"));
/// ```
pub fn strip_basename<'a>(pathname: &'a str, basename: &str) -> Option<&'a str> {
    if basename == "/" || basename.is_empty() {
        return Some(pathname);
    }
    let prefix = pathname.get(..basename.len())?;
    if !prefix.eq_ignore_ascii_case(basename) {
        return None;
    }
    let start = if basename.ends_with('/') {
        basename.len() - 1
    } else {
        basename.len()
    };
    let rest = &pathname[start..];
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    Some(if rest.is_empty() { "/" } else { rest })
}

/// Percent-decode each segment of a pathname.
///
/// Encoded slashes stay encoded (`%2F`) so they cannot create new segments.
/// Malformed input is returned unchanged with a warning.
pub fn decode_path(pathname: &str) -> Cow<'_, str> {
    if !pathname.contains('%') {
        return Cow::Borrowed(pathname);
    }
    let mut segments = Vec::new();
    for segment in pathname.split('/') {
        match percent_decode_str(segment).decode_utf8() {
            Ok(decoded) => segments.push(decoded.replace('/', "%2F")),
            Err(_) => {
                warn_log!(
                    "The URL path \"{}\" could not be decoded; using it as-is",
                    pathname
                );
                return Cow::Borrowed(pathname);
            }
        }
    }
    Cow::Owned(segments.join("/"))
}

/// Whether `b` differs from `a` only by a (non-removed) fragment.
pub fn is_hash_change_only(a: &Path, b: &Path) -> bool {
    if a.pathname != b.pathname || a.search != b.search {
        return false;
    }
    if a.hash.is_empty() {
        return !b.hash.is_empty();
    }
    if a.hash == b.hash {
        return true;
    }
    !b.hash.is_empty()
}

/// Resolve `to` against an absolute `from` pathname.
pub fn resolve_path(to: &PartialPath, from_pathname: &str) -> Path {
    let pathname = match to.pathname.as_deref() {
        Some(p) if p.starts_with('/') => p.to_string(),
        Some(p) if !p.is_empty() => resolve_pathname(p, from_pathname),
        _ => from_pathname.to_string(),
    };
    Path {
        pathname,
        search: normalize_search(to.search.as_deref().unwrap_or_default()),
        hash: normalize_hash(to.hash.as_deref().unwrap_or_default()),
    }
}

fn resolve_pathname(relative: &str, from_pathname: &str) -> String {
    let mut segments: Vec<&str> = from_pathname.trim_end_matches('/').split('/').collect();
    for segment in relative.split('/') {
        match segment {
            ".." => {
                if segments.len() > 1 {
                    segments.pop();
                }
            }
            "." => {}
            s => segments.push(s),
        }
    }
    if segments.len() > 1 {
        segments.join("/")
    } else {
        "/".to_string()
    }
}

/// Resolve a navigation target against the matched route chain.
///
/// `route_pathnames` holds the `pathname_base` of every path-contributing
/// match, outermost first. Leading `..` segments pop one entry each (route
/// relative) unless `path_relative` is set, in which case they remove URL
/// segments from the deepest route's pathname instead.
///
/// ```
/// use data_navigator::path::resolve_to;
///
/// let chain = vec!["/".to_string(), "/users".to_string(), "/users/7".to_string()];
/// assert_eq!(resolve_to("..", &chain, "/users/7", false).pathname, "/users");
/// assert_eq!(resolve_to("edit", &chain, "/users/7", false).pathname, "/users/7/edit");
/// assert_eq!(resolve_to("/abs?x=1", &chain, "/users/7", false).to_string(), "/abs?x=1");
/// ```
pub fn resolve_to(
    to: &str,
    route_pathnames: &[String],
    location_pathname: &str,
    path_relative: bool,
) -> Path {
    let mut parsed = parse_path(to);
    let is_empty_path = to.is_empty() || parsed.pathname.as_deref() == Some("");
    let to_pathname = if is_empty_path {
        Some("/".to_string())
    } else {
        parsed.pathname.clone()
    };

    let from = match &to_pathname {
        None => location_pathname.to_string(),
        Some(to_pathname) => {
            let mut index = route_pathnames.len() as isize - 1;
            if !path_relative && to_pathname.starts_with("..") {
                let mut segments: Vec<&str> = to_pathname.split('/').collect();
                while segments.first() == Some(&"..") {
                    segments.remove(0);
                    index -= 1;
                }
                parsed.pathname = Some(segments.join("/"));
            }
            if index >= 0 {
                route_pathnames[index as usize].clone()
            } else {
                "/".to_string()
            }
        }
    };

    let mut path = resolve_path(&parsed, &from);

    let explicit_trailing = to_pathname
        .as_deref()
        .is_some_and(|p| p != "/" && p.ends_with('/'));
    let current_trailing = (is_empty_path || to_pathname.as_deref() == Some("."))
        && location_pathname.ends_with('/');
    if !path.pathname.ends_with('/') && (explicit_trailing || current_trailing) {
        path.pathname.push('/');
    }
    path
}

// ============================================================================
// Tests
// ============================================================================
