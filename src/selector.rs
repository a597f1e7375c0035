//! Path-segment selectors.
//!
//! A compiled path is a list of [`Selector`]s. Each one looks at the request
//! segments from a cursor position and either consumes some of them (maybe
//! capturing a named value) or fails. Selectors are pure: the same input
//! always yields the same outcome, so they are shared freely across threads.

use std::fmt;

/// One matcher in a compiled path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Selector {
    /// Literal segment, e.g. `users`.
    Static(String),
    /// Named segment, `{name}`.
    Param(String),
    /// Named segment that may be absent at the end of the path, `{name?}`.
    OptionalParam(String),
    /// Any single segment, discarded, `*`.
    Wildcard,
    /// The rest of the path, zero or more segments, `{...}`.
    Tail,
}

/// Outcome of evaluating a [`Selector`] at a cursor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Evaluation {
    Success {
        consumed: usize,
        captured: Option<(String, String)>,
    },
    Failure,
}

/// Consumed nothing, captured nothing.
pub const SUCCESS_ZERO: Evaluation = Evaluation::Success { consumed: 0, captured: None };

/// Consumed one segment, captured nothing.
pub const SUCCESS_ONE: Evaluation = Evaluation::Success { consumed: 1, captured: None };

impl Selector {
    /// Evaluates the selector against `segments` starting at `cursor`.
    pub fn evaluate(&self, segments: &[&str], cursor: usize) -> Evaluation {
        let current = segments.get(cursor).copied();
        match self {
            Self::Static(literal) => match current {
                Some(segment) if segment == literal.as_str() => SUCCESS_ONE,
                _ => Evaluation::Failure,
            },
            Self::Param(name) => match current {
                Some(segment) => capture(name, segment),
                None => Evaluation::Failure,
            },
            Self::OptionalParam(name) => match current {
                Some(segment) => capture(name, segment),
                None if cursor == segments.len() => SUCCESS_ZERO,
                None => Evaluation::Failure,
            },
            Self::Wildcard => match current {
                Some(_) => SUCCESS_ONE,
                None => Evaluation::Failure,
            },
            Self::Tail if cursor <= segments.len() => Evaluation::Success {
                consumed: segments.len() - cursor,
                captured: None,
            },
            Self::Tail => Evaluation::Failure,
        }
    }

    /// The parameter name this selector captures under, if any.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::Param(name) | Self::OptionalParam(name) => Some(name),
            _ => None,
        }
    }

    /// Specificity weight, `Static > Param > OptionalParam > Wildcard > Tail`.
    ///
    /// Each step above `OptionalParam` is wider than the `OptionalParam`
    /// weight itself, so a trailing optional never lifts a route above one
    /// that is more specific on the segments both actually consume.
    pub(crate) fn weight(&self) -> u32 {
        match self {
            Self::Static(_)        => 7,
            Self::Param(_)         => 4,
            Self::OptionalParam(_) => 2,
            Self::Wildcard         => 1,
            Self::Tail             => 0,
        }
    }
}

fn capture(name: &str, segment: &str) -> Evaluation {
    // Malformed escapes are kept as sent rather than failing the match.
    let value = match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_owned(),
    };
    Evaluation::Success { consumed: 1, captured: Some((name.to_owned(), value)) }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(literal)     => f.write_str(literal),
            Self::Param(name)         => write!(f, "{{{name}}}"),
            Self::OptionalParam(name) => write!(f, "{{{name}?}}"),
            Self::Wildcard            => f.write_str("*"),
            Self::Tail                => f.write_str("{...}"),
        }
    }
}
