use std::time::Instant;

use tracing::{info, info_span, warn};

use crate::handler::Outcome;
use crate::interceptor::{Interceptor, Next};
use crate::request::Call;

/// Opens an `info` span per request and logs status and latency when the
/// chain unwinds, including when it failed.
///
/// Install it first (`Direction::Front`) to time everything else.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

/// Start time, stashed in the request extensions by `before_call`.
#[derive(Clone, Copy)]
struct Started(Instant);

impl Interceptor for Trace {
    fn before_call(&self, call: &mut Call) {
        call.request_mut().extensions_mut().insert(Started(Instant::now()));
    }

    fn around_call(&self, call: &mut Call, next: Next<'_>) -> Outcome {
        let span = info_span!(
            "request",
            method = %call.request().method(),
            path = call.request().path(),
            route = call.route(),
        );
        let _entered = span.enter();
        next.run(call)
    }

    fn after_call(&self, call: &mut Call) {
        let latency = call
            .request()
            .extensions()
            .get::<Started>()
            .map(|started| started.0.elapsed());

        match call.response() {
            Some(res) => info!(
                route = call.route(),
                status = res.status_code().as_u16(),
                latency_us = latency.map(|d| d.as_micros() as u64),
                "request completed",
            ),
            None => warn!(
                route = call.route(),
                latency_us = latency.map(|d| d.as_micros() as u64),
                "request completed without a response",
            ),
        }
    }
}
