//! Specificity-ordered route matching.
//!
//! Routes are ranked once, when the matcher is built; per request the matcher
//! walks the ranked list and stops at the first route whose selectors cover
//! the request path exactly. Because the ranking only depends on the routes
//! themselves, the winner never depends on registration order.
//!
//! Ranking, lower score first:
//!
//! - every selector contributes a weight, `Static > Param > OptionalParam >
//!   Wildcard > Tail`, subtracted from a base, so more (and more specific)
//!   selectors score better;
//! - a route ending in `{...}` is pushed behind every route that does not,
//!   however long its prefix; among tail routes the one with more selectors
//!   before the tail wins, whatever their kinds;
//! - equal scores fall back to a position-by-position comparison of selector
//!   kinds, then to the path string.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::path::segments;
use crate::route::Route;

const BASE_SCORE: u64 = 1 << 32;
const TAIL_PENALTY: u64 = 1 << 48;
const PREFIX_SHIFT: u32 = 16;
const MAX_TAIL_PREFIX: u64 = (1 << 31) - 1;

/// Specificity score of a route; lower is more specific.
pub(crate) fn score(route: &Route) -> u64 {
    let compiled = route.compiled();
    let selectors = compiled.selectors();
    let weight: u64 = selectors.iter().map(|s| u64::from(s.weight())).sum();
    let score = BASE_SCORE - weight;
    if !compiled.ends_with_tail() {
        return score;
    }
    // Among tail routes the prefix length dominates, the weights only break
    // ties between prefixes of equal length.
    let prefix = (selectors.len() as u64 - 1).min(MAX_TAIL_PREFIX);
    score + TAIL_PENALTY - (prefix << PREFIX_SHIFT)
}

fn rank(a: &Route, b: &Route) -> Ordering {
    score(a)
        .cmp(&score(b))
        .then_with(|| {
            let kinds = |r: &Route| r.compiled().selectors().iter().map(|s| s.weight()).collect::<Vec<_>>();
            // Higher weight first, position by position.
            kinds(b).cmp(&kinds(a))
        })
        .then_with(|| a.path().cmp(b.path()))
}

/// A successful match: the route and the parameters captured from the path.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: HashMap<String, String>,
}

/// Resolves request paths against a fixed set of routes.
#[derive(Debug, Clone)]
pub struct RoutesMatcher {
    ranked: Vec<Arc<Route>>,
    root: Option<Arc<Route>>,
}

impl RoutesMatcher {
    /// Builds the matcher. The first root route (`/`) becomes the fallback;
    /// callers are expected to have rejected duplicates already.
    pub fn new(routes: impl IntoIterator<Item = Arc<Route>>) -> Self {
        let mut root = None;
        let mut ranked = Vec::new();
        for route in routes {
            if route.is_root() {
                root.get_or_insert(route);
            } else {
                ranked.push(route);
            }
        }
        ranked.sort_by(|a, b| rank(a, b));
        Self { ranked, root }
    }

    /// Finds the most specific route matching `path`.
    ///
    /// If nothing else matches and a root route exists, the root route is
    /// returned with no parameters.
    pub fn find(&self, path: &str) -> Option<RouteMatch> {
        let segments = segments(path);
        self.ranked
            .iter()
            .find_map(|route| {
                let params = route.compiled().matches(&segments)?;
                Some(RouteMatch { route: Arc::clone(route), params: params.into_iter().collect() })
            })
            .or_else(|| {
                let root = self.root.as_ref()?;
                Some(RouteMatch { route: Arc::clone(root), params: HashMap::new() })
            })
    }

    /// Routes in ranking order, root route excluded.
    pub fn ranked(&self) -> &[Arc<Route>] {
        &self.ranked
    }

    pub fn root(&self) -> Option<&Arc<Route>> {
        self.root.as_ref()
    }
}
