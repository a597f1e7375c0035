//! Path-pattern compiler.
//!
//! Turns `/users/{id}/files/{...}` into a validated list of [`Selector`]s.
//! Every structural rule is checked here, once, when the route is
//! registered; nothing is re-validated while serving requests.

use std::collections::HashSet;
use std::fmt;

use crate::error::Error;
use crate::selector::{Evaluation, Selector};

const TAIL: &str = "{...}";
const WILDCARD: &str = "*";

/// Splits a path into its non-empty `/`-delimited segments.
pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// A validated, immutable list of selectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledPath {
    selectors: Vec<Selector>,
}

impl CompiledPath {
    /// Parses and validates `pattern`.
    ///
    /// # Errors
    ///
    /// [`Error::RouteCompilation`] if a tail or optional parameter is not the
    /// last selector, if either appears more than once, if a parameter name
    /// repeats, or if a parameter name is empty.
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        let selectors = segments(pattern)
            .into_iter()
            .map(|token| classify(pattern, token))
            .collect::<Result<Vec<_>, _>>()?;

        validate(pattern, &selectors)?;
        Ok(Self { selectors })
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Whether the path is the root (`/`, no selectors at all).
    pub fn is_root(&self) -> bool {
        self.selectors.is_empty()
    }

    pub(crate) fn ends_with_tail(&self) -> bool {
        matches!(self.selectors.last(), Some(Selector::Tail))
    }

    /// Runs every selector in sequence over `segments`.
    ///
    /// Returns the captured parameters on a full match, that is when every
    /// selector succeeds and the final cursor lands exactly on the end.
    pub fn matches(&self, segments: &[&str]) -> Option<Vec<(String, String)>> {
        let mut cursor = 0;
        let mut params = Vec::new();
        for selector in &self.selectors {
            match selector.evaluate(segments, cursor) {
                Evaluation::Success { consumed, captured } => {
                    cursor += consumed;
                    params.extend(captured);
                }
                Evaluation::Failure => return None,
            }
        }
        (cursor == segments.len()).then_some(params)
    }
}

/// Canonical form: `/` followed by the segments joined with `/`.
impl fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.selectors.is_empty() {
            return f.write_str("/");
        }
        for selector in &self.selectors {
            write!(f, "/{selector}")?;
        }
        Ok(())
    }
}

fn classify(pattern: &str, token: &str) -> Result<Selector, Error> {
    if token == TAIL {
        return Ok(Selector::Tail);
    }
    if token == WILDCARD {
        return Ok(Selector::Wildcard);
    }
    let Some(inner) = token.strip_prefix('{').and_then(|t| t.strip_suffix('}')) else {
        return Ok(Selector::Static(token.to_owned()));
    };
    let (name, optional) = match inner.strip_suffix('?') {
        Some(name) => (name, true),
        None => (inner, false),
    };
    if name.is_empty() {
        return Err(Error::compilation(pattern, "parameter name must not be empty"));
    }
    Ok(if optional {
        Selector::OptionalParam(name.to_owned())
    } else {
        Selector::Param(name.to_owned())
    })
}

fn validate(pattern: &str, selectors: &[Selector]) -> Result<(), Error> {
    let last = selectors.len().saturating_sub(1);

    let tails = selectors.iter().filter(|s| matches!(s, Selector::Tail)).count();
    if tails > 1 {
        return Err(Error::compilation(pattern, "at most one `{...}` tail selector is allowed"));
    }
    if tails == 1 && !matches!(selectors.get(last), Some(Selector::Tail)) {
        return Err(Error::compilation(pattern, "the `{...}` tail selector must be last"));
    }

    let optionals = selectors
        .iter()
        .filter(|s| matches!(s, Selector::OptionalParam(_)))
        .count();
    if optionals > 1 {
        return Err(Error::compilation(pattern, "at most one optional parameter is allowed"));
    }
    if optionals == 1 && !matches!(selectors.get(last), Some(Selector::OptionalParam(_))) {
        return Err(Error::compilation(pattern, "an optional parameter must be last"));
    }

    let mut seen = HashSet::new();
    for name in selectors.iter().filter_map(Selector::param_name) {
        if !seen.insert(name) {
            return Err(Error::compilation(pattern, format!("duplicate parameter `{name}`")));
        }
    }
    Ok(())
}
