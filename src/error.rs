//! Error types.
//!
//! Two families, never mixed:
//!
//! - [`Error`] is returned while the route table is being built or the server
//!   is starting. It is always fatal to configuration.
//! - [`Fault`] is what a handler or interceptor returns when a request fails.
//!   It travels outward through the interceptor chain and is handed to the
//!   router's `on_internal_error` callback.

use std::fmt;

/// Build-time and startup errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A path pattern has an invalid selector arrangement.
    #[error("invalid route `{path}`: {reason}")]
    RouteCompilation { path: String, reason: String },

    /// The routing configuration as a whole is inconsistent (duplicate
    /// registrations, several root routes, mutation after sealing).
    #[error("routing configuration: {0}")]
    RoutingConfiguration(String),

    /// `Server::bind` was given something that is not `host:port`.
    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn compilation(path: &str, reason: impl Into<String>) -> Self {
        Self::RouteCompilation { path: path.to_owned(), reason: reason.into() }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::RoutingConfiguration(message.into())
    }
}

// ── Fault ─────────────────────────────────────────────────────────────────────

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A request-time failure raised by a handler or interceptor.
///
/// Any `std::error::Error` converts into a `Fault`, so handlers can use `?`
/// freely. `Fault` deliberately does not implement `std::error::Error`
/// itself; that is what makes the blanket `From` possible.
pub struct Fault {
    kind: FaultKind,
}

enum FaultKind {
    Failed(BoxError),
    Interrupted,
}

impl Fault {
    /// A fault carrying an arbitrary message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self { kind: FaultKind::Failed(message.into().into()) }
    }

    /// The request was interrupted (shutdown, client gone, cancellation).
    ///
    /// Interrupted faults still run every enclosing `after_call`, but they are
    /// never handed to `on_internal_error`; `Router::dispatch` returns
    /// [`Interrupted`] so the transport can abandon the exchange.
    pub fn interrupted() -> Self {
        Self { kind: FaultKind::Interrupted }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self.kind, FaultKind::Interrupted)
    }

    /// The underlying error, if this is not an interruption.
    pub fn source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match &self.kind {
            FaultKind::Failed(e) => Some(e.as_ref()),
            FaultKind::Interrupted => None,
        }
    }
}

impl<E> From<E> for Fault
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: E) -> Self {
        Self { kind: FaultKind::Failed(Box::new(e)) }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FaultKind::Failed(e) => write!(f, "{e}"),
            FaultKind::Interrupted => f.write_str("interrupted"),
        }
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FaultKind::Failed(e) => f.debug_tuple("Fault").field(e).finish(),
            FaultKind::Interrupted => f.write_str("Fault(Interrupted)"),
        }
    }
}

/// Returned by `Router::dispatch` when a request was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request interrupted")]
pub struct Interrupted;

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<u32, Fault> {
        Ok(input.parse::<u32>()?)
    }

    #[test]
    fn question_mark_converts_std_errors() {
        let fault = parse("nope").unwrap_err();
        assert!(!fault.is_interrupted());
        assert!(fault.source().is_some());
        assert_eq!(fault.to_string(), "invalid digit found in string");
    }

    #[test]
    fn interrupted_has_no_source() {
        let fault = Fault::interrupted();
        assert!(fault.is_interrupted());
        assert!(fault.source().is_none());
    }

    #[test]
    fn compilation_error_names_path_and_rule() {
        let e = Error::compilation("/a/{...}/b", "tail must be last");
        assert_eq!(e.to_string(), "invalid route `/a/{...}/b`: tail must be last");
    }
}
