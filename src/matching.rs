//! Ranked route matching.
//!
//! The route tree is flattened into *branches*, one per matchable leaf (a
//! route with a path, or an index route), each carrying the chain of routes
//! from the root. Branches are ranked once by specificity and then tried in
//! order; the first branch whose every route matches the pathname wins.
//!
//! # Ranking
//!
//! Each `/`-separated segment of a branch's joined path scores:
//!
//! | Segment        | Score |
//! |----------------|-------|
//! | static (`abc`) | 10    |
//! | dynamic (`:id`)| 3     |
//! | empty          | 1     |
//!
//! on top of an initial score equal to the segment count. Index routes get
//! +2, splat (`*`) routes −2. Ties keep declaration order for siblings.
//! Optional segments (`:lang?`, `about?`) are exploded into every presence
//! combination before ranking, present-first.
//!
//! # Pattern semantics
//!
//! Matching is segment based and case-insensitive unless the route is marked
//! case-sensitive. `:name` captures one segment, `*` at the end of a pattern
//! captures the rest of the path (possibly empty). Captured values have
//! encoded slashes (`%2F`) decoded.

use crate::params::RouteParams;
use crate::path::{decode_path, join_paths, normalize_pathname, strip_basename};
use crate::route::DataRoute;
use crate::trace_log;
use std::cmp::Ordering;
use std::rc::Rc;

const PARAM_SCORE: i32 = 3;
const EMPTY_SEGMENT_SCORE: i32 = 1;
const STATIC_SEGMENT_SCORE: i32 = 10;
const INDEX_ROUTE_SCORE: i32 = 2;
const SPLAT_PENALTY: i32 = -2;

// ============================================================================
// Matches
// ============================================================================

/// One route of a matched chain.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Rc<DataRoute>,
    /// Params accumulated over the whole chain.
    pub params: RouteParams,
    /// Portion of the URL pathname matched by this route.
    pub pathname: String,
    /// `pathname` without a splat's contribution.
    pub pathname_base: String,
}

impl RouteMatch {
    pub fn route_id(&self) -> &str {
        &self.route.id
    }
}

impl PartialEq for RouteMatch {
    fn eq(&self, other: &Self) -> bool {
        self.route.id == other.route.id
            && self.params == other.params
            && self.pathname == other.pathname
            && self.pathname_base == other.pathname_base
    }
}

/// Result of matching a single pattern with [`match_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub params: RouteParams,
    pub pathname: String,
    pub pathname_base: String,
}

/// A pattern for [`match_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathPattern<'a> {
    pub path: &'a str,
    pub case_sensitive: bool,
    /// Whether the pattern must consume the whole pathname.
    pub end: bool,
}

impl<'a> PathPattern<'a> {
    /// Whole-path, case-insensitive pattern.
    pub fn new(path: &'a str) -> Self {
        Self {
            path,
            case_sensitive: false,
            end: true,
        }
    }
}

// ============================================================================
// Branches
// ============================================================================

/// Per-route data in a branch.
#[derive(Debug, Clone)]
pub struct RouteMeta {
    /// Path relative to the parent route.
    pub relative_path: String,
    pub case_sensitive: bool,
    /// Position among its siblings.
    pub children_index: usize,
    pub route: Rc<DataRoute>,
}

/// A root-to-leaf chain of routes with its joined path and score.
#[derive(Debug, Clone)]
pub struct RouteBranch {
    pub path: String,
    pub score: i32,
    pub routes_meta: Vec<RouteMeta>,
}

/// Flatten a route tree into unranked branches.
pub fn flatten_routes(routes: &[Rc<DataRoute>]) -> Vec<RouteBranch> {
    let mut branches = Vec::new();
    flatten_into(routes, &mut branches, &[], "");
    branches
}

fn flatten_into(
    routes: &[Rc<DataRoute>],
    branches: &mut Vec<RouteBranch>,
    parents_meta: &[RouteMeta],
    parent_path: &str,
) {
    for (index, route) in routes.iter().enumerate() {
        match route.path.as_deref() {
            Some(path) if !path.is_empty() && path.contains('?') => {
                for exploded in explode_optional_segments(path) {
                    flatten_route(route, index, exploded, branches, parents_meta, parent_path);
                }
            }
            path => {
                let relative = path.unwrap_or_default().to_string();
                flatten_route(route, index, relative, branches, parents_meta, parent_path);
            }
        }
    }
}

fn flatten_route(
    route: &Rc<DataRoute>,
    index: usize,
    relative_path: String,
    branches: &mut Vec<RouteBranch>,
    parents_meta: &[RouteMeta],
    parent_path: &str,
) {
    let relative_path = if relative_path.starts_with('/') {
        relative_path
            .strip_prefix(parent_path)
            .map(str::to_string)
            .unwrap_or(relative_path)
    } else {
        relative_path
    };
    let path = join_paths(&[parent_path, &relative_path]);

    let mut routes_meta = parents_meta.to_vec();
    routes_meta.push(RouteMeta {
        relative_path,
        case_sensitive: route.case_sensitive,
        children_index: index,
        route: route.clone(),
    });

    if route.has_children() {
        flatten_into(&route.children(), branches, &routes_meta, &path);
    }

    if route.path.is_none() && !route.index {
        return;
    }
    let score = compute_score(&path, route.index);
    branches.push(RouteBranch {
        path,
        score,
        routes_meta,
    });
}

/// Expand optional segments into every presence combination.
///
/// ```
/// use data_navigator::matching::explode_optional_segments;
///
/// assert_eq!(
///     explode_optional_segments("/:lang?/about"),
///     vec!["/:lang/about", "/about"]
/// );
/// assert_eq!(explode_optional_segments("/a?"), vec!["/a", "/"]);
/// ```
pub fn explode_optional_segments(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').collect();
    let Some((first, rest)) = segments.split_first() else {
        return Vec::new();
    };
    let is_optional = first.ends_with('?');
    let required = first.strip_suffix('?').unwrap_or(first);

    if rest.is_empty() {
        return if is_optional {
            vec![required.to_string(), String::new()]
        } else {
            vec![required.to_string()]
        };
    }

    let rest_exploded = explode_optional_segments(&rest.join("/"));
    let mut result: Vec<String> = rest_exploded
        .iter()
        .map(|sub| {
            if sub.is_empty() {
                required.to_string()
            } else {
                format!("{}/{}", required, sub)
            }
        })
        .collect();
    if is_optional {
        result.extend(rest_exploded);
    }
    result
        .into_iter()
        .map(|exploded| {
            if path.starts_with('/') && exploded.is_empty() {
                "/".to_string()
            } else {
                exploded
            }
        })
        .collect()
}

fn is_dynamic_segment(segment: &str) -> bool {
    segment
        .strip_prefix(':')
        .is_some_and(|name| !name.is_empty() && name.chars().all(is_param_char))
}

fn is_param_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Specificity score of a joined branch path.
pub fn compute_score(path: &str, index: bool) -> i32 {
    let segments: Vec<&str> = path.split('/').collect();
    let mut score = segments.len() as i32;
    if segments.contains(&"*") {
        score += SPLAT_PENALTY;
    }
    if index {
        score += INDEX_ROUTE_SCORE;
    }
    segments
        .iter()
        .filter(|s| **s != "*")
        .fold(score, |score, segment| {
            score
                + if is_dynamic_segment(segment) {
                    PARAM_SCORE
                } else if segment.is_empty() {
                    EMPTY_SEGMENT_SCORE
                } else {
                    STATIC_SEGMENT_SCORE
                }
        })
}

/// Sort branches best first: by score, then sibling order.
pub fn rank_route_branches(branches: &mut [RouteBranch]) {
    branches.sort_by(|a, b| {
        b.score.cmp(&a.score).then_with(|| {
            compare_indexes(
                &a.routes_meta.iter().map(|m| m.children_index).collect::<Vec<_>>(),
                &b.routes_meta.iter().map(|m| m.children_index).collect::<Vec<_>>(),
            )
        })
    });
}

fn compare_indexes(a: &[usize], b: &[usize]) -> Ordering {
    let siblings = a.len() == b.len() && a.len() > 0 && a[..a.len() - 1] == b[..b.len() - 1];
    if siblings {
        a[a.len() - 1].cmp(&b[b.len() - 1])
    } else {
        Ordering::Equal
    }
}

// ============================================================================
// Matching
// ============================================================================

/// Match `pathname` against a route tree.
///
/// Convenience wrapper that flattens and ranks on every call; the router
/// keeps ranked branches around and uses [`match_branches`] instead.
pub fn match_routes(
    routes: &[Rc<DataRoute>],
    pathname: &str,
    basename: &str,
) -> Option<Vec<RouteMatch>> {
    let mut branches = flatten_routes(routes);
    rank_route_branches(&mut branches);
    match_branches(&branches, pathname, basename, false)
}

/// Match `pathname` against pre-ranked branches.
///
/// With `allow_partial`, the deepest route of a branch may match a prefix of
/// the remaining path; used while discovering routes lazily.
pub fn match_branches(
    branches: &[RouteBranch],
    pathname: &str,
    basename: &str,
    allow_partial: bool,
) -> Option<Vec<RouteMatch>> {
    let pathname = if pathname.is_empty() { "/" } else { pathname };
    let stripped = strip_basename(pathname, basename)?;
    let decoded = decode_path(stripped);
    let matches = branches
        .iter()
        .find_map(|branch| match_route_branch(branch, &decoded, allow_partial));
    match &matches {
        Some(m) => {
            trace_log!("Matched '{}' to {} routes", decoded, m.len());
        }
        None => {
            trace_log!("No routes matched '{}'", decoded);
        }
    }
    matches
}

/// Match one branch against a (decoded) pathname.
pub fn match_route_branch(
    branch: &RouteBranch,
    pathname: &str,
    allow_partial: bool,
) -> Option<Vec<RouteMatch>> {
    let mut matched_params = RouteParams::new();
    let mut matched_pathname = "/".to_string();
    let mut matches: Vec<RouteMatch> = Vec::with_capacity(branch.routes_meta.len());
    let last_index = branch.routes_meta.len().checked_sub(1)?;

    for (i, meta) in branch.routes_meta.iter().enumerate() {
        let end = i == last_index;
        let remaining = if matched_pathname == "/" {
            pathname
        } else {
            match pathname.get(matched_pathname.len()..) {
                Some("") | None => "/",
                Some(rest) => rest,
            }
        };

        let mut found = match_path(
            PathPattern {
                path: &meta.relative_path,
                case_sensitive: meta.case_sensitive,
                end,
            },
            remaining,
        );
        if found.is_none() && end && allow_partial && !branch.routes_meta[last_index].route.index {
            found = match_path(
                PathPattern {
                    path: &meta.relative_path,
                    case_sensitive: meta.case_sensitive,
                    end: false,
                },
                remaining,
            );
        }
        let found = found?;

        matched_params = RouteParams::merge(&matched_params, &found.params);
        matches.push(RouteMatch {
            route: meta.route.clone(),
            params: RouteParams::new(),
            pathname: join_paths(&[&matched_pathname, &found.pathname]),
            pathname_base: normalize_pathname(&join_paths(&[
                &matched_pathname,
                &found.pathname_base,
            ]))
            .into_owned(),
        });
        if found.pathname_base != "/" {
            matched_pathname = join_paths(&[&matched_pathname, &found.pathname_base]);
        }
    }

    for m in &mut matches {
        m.params = matched_params.clone();
    }
    Some(matches)
}

// ============================================================================
// Single-pattern matching
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Static(&'a str),
    Param { name: &'a str, optional: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    /// `*` or `/*`: everything after the leading slash.
    SplatAll,
    /// `prefix/*`: a slash and the rest, or only trailing slashes.
    Splat,
    /// Only trailing slashes may follow.
    End,
    /// A segment boundary must follow.
    Boundary,
    /// Anything may follow.
    Open,
}

struct CompiledPath<'a> {
    segments: Vec<Segment<'a>>,
    tail: Tail,
    case_sensitive: bool,
}

fn compile_path<'a>(path: &'a str, case_sensitive: bool, end: bool) -> CompiledPath<'a> {
    let core = path.strip_suffix('*').unwrap_or(path);
    let core = core.trim_end_matches('/').trim_start_matches('/');
    let segments = if core.is_empty() {
        Vec::new()
    } else {
        core.split('/')
            .map(|segment| {
                let (body, optional) = match segment.strip_suffix('?') {
                    Some(body) => (body, true),
                    None => (segment, false),
                };
                if is_dynamic_segment(body) {
                    Segment::Param {
                        name: &body[1..],
                        optional,
                    }
                } else {
                    Segment::Static(segment)
                }
            })
            .collect()
    };

    let tail = if path.ends_with('*') {
        if path == "*" || path == "/*" {
            Tail::SplatAll
        } else {
            Tail::Splat
        }
    } else if end {
        Tail::End
    } else if !path.is_empty() && path != "/" {
        Tail::Boundary
    } else {
        Tail::Open
    };

    CompiledPath {
        segments,
        tail,
        case_sensitive,
    }
}

/// Captured values during a match attempt, in pattern order.
type Captures<'p> = Vec<(&'p str, Option<String>)>;

impl<'a> CompiledPath<'a> {
    fn matches(&self, pathname: &str) -> Option<(usize, Captures<'a>, Option<String>)> {
        let mut captures = Vec::new();
        if self.segments.is_empty() {
            let pos = eat_slash(pathname, 0)?;
            let (end, splat) = self.tail_at(pathname, pos)?;
            return Some((end, captures, splat));
        }
        let (end, splat) = self.match_segment(0, pathname, 0, &mut captures)?;
        Some((end, captures, splat))
    }

    fn match_segment(
        &self,
        index: usize,
        path: &str,
        pos: usize,
        captures: &mut Captures<'a>,
    ) -> Option<(usize, Option<String>)> {
        let Some(segment) = self.segments.get(index) else {
            return self.tail_at(path, pos);
        };
        match *segment {
            Segment::Static(literal) => {
                let pos = eat_slash(path, pos)?;
                let pos = match_literal(path, pos, literal, self.case_sensitive)?;
                self.match_segment(index + 1, path, pos, captures)
            }
            Segment::Param {
                name,
                optional: false,
            } => {
                let pos = eat_slash(path, pos)?;
                self.match_capture(index, name, path, pos, captures)
            }
            Segment::Param {
                name,
                optional: true,
            } => {
                // `/?` then an optional capture, tried in greedy order.
                let starts = match eat_slash(path, pos) {
                    Some(after) => vec![after, pos],
                    None => vec![pos],
                };
                for start in starts {
                    if let Some(found) = self.match_capture(index, name, path, start, captures) {
                        return Some(found);
                    }
                    captures.push((name, None));
                    if let Some(found) = self.match_segment(index + 1, path, start, captures) {
                        return Some(found);
                    }
                    captures.pop();
                }
                None
            }
        }
    }

    /// Capture one non-empty run of non-slash characters, longest first.
    fn match_capture(
        &self,
        index: usize,
        name: &'a str,
        path: &str,
        pos: usize,
        captures: &mut Captures<'a>,
    ) -> Option<(usize, Option<String>)> {
        let rest = path.get(pos..)?;
        let run = rest.find('/').unwrap_or(rest.len());
        let mut ends: Vec<usize> = rest[..run]
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .collect();
        ends.reverse();
        for len in ends {
            captures.push((name, Some(rest[..len].to_string())));
            if let Some(found) = self.match_segment(index + 1, path, pos + len, captures) {
                return Some(found);
            }
            captures.pop();
        }
        None
    }

    fn tail_at(&self, path: &str, pos: usize) -> Option<(usize, Option<String>)> {
        let rest = path.get(pos..)?;
        match self.tail {
            Tail::SplatAll => Some((path.len(), Some(rest.to_string()))),
            Tail::Splat => {
                if rest.len() > 1 && rest.starts_with('/') {
                    Some((path.len(), Some(rest[1..].to_string())))
                } else if rest.chars().all(|c| c == '/') {
                    Some((path.len(), Some(String::new())))
                } else {
                    None
                }
            }
            Tail::End => rest.chars().all(|c| c == '/').then_some((path.len(), None)),
            Tail::Boundary => (rest.is_empty() || rest.starts_with('/')).then_some((pos, None)),
            Tail::Open => Some((pos, None)),
        }
    }
}

fn eat_slash(path: &str, pos: usize) -> Option<usize> {
    path.get(pos..)?.starts_with('/').then_some(pos + 1)
}

fn match_literal(path: &str, pos: usize, literal: &str, case_sensitive: bool) -> Option<usize> {
    let rest = path.get(pos..)?;
    if case_sensitive {
        return rest.starts_with(literal).then_some(pos + literal.len());
    }
    let mut consumed = 0;
    let mut chars = rest.chars();
    for expected in literal.chars() {
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        consumed += actual.len_utf8();
    }
    Some(pos + consumed)
}

fn trim_trailing_slashes(s: &str) -> &str {
    let trimmed = s.trim_end_matches('/');
    if trimmed.is_empty() {
        &s[..s.len().min(1)]
    } else {
        trimmed
    }
}

/// Match one pattern against a pathname.
///
/// ```
/// use data_navigator::matching::{match_path, PathPattern};
///
/// let m = match_path(PathPattern::new("/users/:id"), "/users/42").unwrap();
/// assert_eq!(m.params.get("id").map(String::as_str), Some("42"));
///
/// let m = match_path(PathPattern::new("/files/*"), "/files/a/b.txt").unwrap();
/// assert_eq!(m.params.splat(), Some("a/b.txt"));
/// assert_eq!(m.pathname_base, "/files");
///
/// assert!(match_path(PathPattern::new("/users"), "/users/42").is_none());
/// ```
pub fn match_path(pattern: PathPattern<'_>, pathname: &str) -> Option<PathMatch> {
    let compiled = compile_path(pattern.path, pattern.case_sensitive, pattern.end);
    let (end, captures, splat) = compiled.matches(pathname)?;
    let matched = &pathname[..end];

    let mut pathname_base = trim_trailing_slashes(matched).to_string();
    let mut params = RouteParams::new();
    for (name, value) in captures {
        if let Some(value) = value {
            params.insert(name.to_string(), value.replace("%2F", "/"));
        }
    }
    if let Some(splat) = splat {
        let base_len = matched.len().saturating_sub(splat.len());
        pathname_base = trim_trailing_slashes(&matched[..base_len]).to_string();
        params.insert("*".to_string(), splat.replace("%2F", "/"));
    }

    Some(PathMatch {
        params,
        pathname: matched.to_string(),
        pathname_base,
    })
}

/// Matches whose route contributes to the URL: the root, plus every route
/// with a non-empty path. Used for relative resolution.
pub fn path_contributing_matches(matches: &[RouteMatch]) -> Vec<&RouteMatch> {
    matches
        .iter()
        .enumerate()
        .filter(|(i, m)| *i == 0 || m.route.path.as_deref().is_some_and(|p| !p.is_empty()))
        .map(|(_, m)| m)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{Route, RouteTree};

    fn ids(matches: &Option<Vec<RouteMatch>>) -> Vec<String> {
        matches
            .as_ref()
            .map(|m| m.iter().map(|m| m.route.id.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_compute_score() {
        assert_eq!(compute_score("/users/:id", false), 3 + 1 + 10 + 3);
        assert_eq!(compute_score("/users", true), 2 + 2 + 1 + 10);
        assert_eq!(compute_score("/files/*", false), 3 - 2 + 1 + 10);
    }

    #[test]
    fn test_static_beats_dynamic() {
        let tree = RouteTree::new(vec![
            Route::new("/users/:id").id("dynamic"),
            Route::new("/users/new").id("static"),
        ])
        .unwrap();
        let m = match_branches(tree.branches(), "/users/new", "/", false);
        assert_eq!(ids(&m), vec!["static"]);
        let m = match_branches(tree.branches(), "/users/7", "/", false);
        assert_eq!(ids(&m), vec!["dynamic"]);
    }

    #[test]
    fn test_sibling_order_breaks_ties() {
        let tree = RouteTree::new(vec![
            Route::new("/:a").id("first"),
            Route::new("/:b").id("second"),
        ])
        .unwrap();
        let m = match_branches(tree.branches(), "/x", "/", false);
        assert_eq!(ids(&m), vec!["first"]);
    }

    #[test]
    fn test_nested_match_accumulates_params() {
        let tree = RouteTree::new(vec![Route::new("/")
            .id("root")
            .children(vec![Route::new("org/:org").id("org").children(vec![
                Route::index().id("org-home"),
                Route::new("repo/:repo").id("repo"),
            ])])])
        .unwrap();
        let m = match_branches(tree.branches(), "/org/acme/repo/web", "/", false).unwrap();
        assert_eq!(
            m.iter().map(RouteMatch::route_id).collect::<Vec<_>>(),
            vec!["root", "org", "repo"]
        );
        assert_eq!(m[0].params.get("repo").map(String::as_str), Some("web"));
        assert_eq!(m[1].pathname_base, "/org/acme");
        assert_eq!(m[2].pathname, "/org/acme/repo/web");

        let m = match_branches(tree.branches(), "/org/acme", "/", false);
        assert_eq!(ids(&m), vec!["root", "org", "org-home"]);
    }

    #[test]
    fn test_optional_segments() {
        let tree = RouteTree::new(vec![Route::new("/:lang?/about").id("about")]).unwrap();
        let m = match_branches(tree.branches(), "/en/about", "/", false).unwrap();
        assert_eq!(m[0].params.get("lang").map(String::as_str), Some("en"));
        let m = match_branches(tree.branches(), "/about", "/", false).unwrap();
        assert!(!m[0].params.contains("lang"));
    }

    #[test]
    fn test_splat_and_case_sensitivity() {
        let tree = RouteTree::new(vec![
            Route::new("/docs/*").id("docs"),
            Route::new("/Exact").id("exact").case_sensitive(),
        ])
        .unwrap();
        let m = match_branches(tree.branches(), "/DOCS/a/b", "/", false).unwrap();
        assert_eq!(m[0].params.splat(), Some("a/b"));
        assert!(match_branches(tree.branches(), "/exact", "/", false).is_none());
        assert!(match_branches(tree.branches(), "/Exact", "/", false).is_some());
        let m = match_branches(tree.branches(), "/docs", "/", false).unwrap();
        assert_eq!(m[0].params.splat(), Some(""));
    }

    #[test]
    fn test_basename_and_decoding() {
        let tree = RouteTree::new(vec![Route::new("/p/:name").id("p")]).unwrap();
        let m = match_branches(tree.branches(), "/app/p/a%20b", "/app", false).unwrap();
        assert_eq!(m[0].params.get("name").map(String::as_str), Some("a b"));
        let m = match_branches(tree.branches(), "/app/p/a%2Fb", "/app", false).unwrap();
        assert_eq!(m[0].params.get("name").map(String::as_str), Some("a/b"));
        assert!(match_branches(tree.branches(), "/p/x", "/app", false).is_none());
    }

    #[test]
    fn test_partial_matching() {
        let tree = RouteTree::new(vec![Route::new("/a").id("a").child(Route::new("b").id("b"))])
            .unwrap();
        assert!(match_branches(tree.branches(), "/a/b/c", "/", false).is_none());
        let m = match_branches(tree.branches(), "/a/b/c", "/", true);
        assert_eq!(ids(&m), vec!["a", "b"]);
    }

    #[test]
    fn test_match_path_not_end_requires_boundary() {
        let pattern = PathPattern {
            path: "/users",
            case_sensitive: false,
            end: false,
        };
        assert!(match_path(pattern, "/users/1").is_some());
        assert!(match_path(pattern, "/usersX").is_none());
        let m = match_path(PathPattern::new("/users"), "/users///").unwrap();
        assert_eq!(m.pathname_base, "/users");
    }

    #[test]
    fn test_matching_is_deterministic() {
        let tree = RouteTree::new(vec![
            Route::new("/").id("root").children(vec![
                Route::new(":a").id("a"),
                Route::new("*").id("splat"),
                Route::new("x").id("x"),
            ]),
        ])
        .unwrap();
        for _ in 0..3 {
            let m = match_branches(tree.branches(), "/x", "/", false);
            assert_eq!(ids(&m), vec!["root", "x"]);
            let m = match_branches(tree.branches(), "/x/y", "/", false);
            assert_eq!(ids(&m), vec!["root", "splat"]);
        }
    }
}
