//! Built-in interceptors.
//!
//! Interceptors are the right place for cross-cutting concerns: structured
//! tracing, metrics, request-id injection, authentication-header inspection.
//! Install them globally with
//! [`RouteTableBuilder::install`](crate::RouteTableBuilder::install) or scope
//! them with [`RouteTableBuilder::with`](crate::RouteTableBuilder::with).
//!
//! Built-in:
//! - [`Trace`]: per-request span, then status and latency once the chain unwinds

mod trace;

pub use trace::Trace;
