//! Interceptors and chain composition.
//!
//! An [`Interceptor`] wraps everything inside it with three hooks:
//!
//! ```text
//! before_call(call)                 pre-processing
//! around_call(call, next)           decides whether/how the inner chain runs
//! after_call(call)                  cleanup, runs even when the inner chain failed
//! ```
//!
//! Every hook has a pass-through default, so an interceptor overrides only
//! what it needs. A list `[I1, I2, …, In]` around a handler `H` composes
//! right to left: `I1` is outermost, `H` innermost.
//!
//! `after_call` runs exactly once for every `around_call`: after a success,
//! after a returned [`Fault`](crate::Fault), after a panic in the inner
//! chain, and when the interceptor short-circuits by never calling `next`.
//! The failure is then passed on outward unchanged.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::handler::{BoxedEndpoint, Endpoint, Outcome};
use crate::request::Call;

/// Middleware with before / around / after hooks.
///
/// ```rust
/// use http::StatusCode;
/// use waypost::{Call, Interceptor, Next, Outcome, Response};
///
/// struct RequireApiKey;
///
/// impl Interceptor for RequireApiKey {
///     fn around_call(&self, call: &mut Call, next: Next<'_>) -> Outcome {
///         if call.request().header("x-api-key").is_none() {
///             call.respond(Response::status(StatusCode::UNAUTHORIZED));
///             return Ok(());
///         }
///         next.run(call)
///     }
/// }
/// ```
pub trait Interceptor: Send + Sync + 'static {
    fn before_call(&self, _call: &mut Call) {}

    fn around_call(&self, call: &mut Call, next: Next<'_>) -> Outcome {
        next.run(call)
    }

    fn after_call(&self, _call: &mut Call) {}
}

/// A closure `Fn(&mut Call, Next) -> Outcome` is an interceptor with only an
/// around hook.
impl<F> Interceptor for F
where
    F: Fn(&mut Call, Next<'_>) -> Outcome + Send + Sync + 'static,
{
    fn around_call(&self, call: &mut Call, next: Next<'_>) -> Outcome {
        self(call, next)
    }
}

/// A shared, type-erased interceptor.
pub type BoxedInterceptor = Arc<dyn Interceptor>;

/// The rest of the chain, handed to [`Interceptor::around_call`].
///
/// Consumed by [`Next::run`], so the inner chain runs at most once.
pub struct Next<'a> {
    inner: &'a dyn Endpoint,
}

impl Next<'_> {
    pub fn run(self, call: &mut Call) -> Outcome {
        self.inner.invoke(call)
    }
}

/// Where [`install`](crate::RouteTableBuilder::install) puts global
/// interceptors relative to the ones already installed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    /// Before every installed interceptor, i.e. outermost.
    Front,
    /// After every installed interceptor.
    #[default]
    Back,
}

// ── Composition ───────────────────────────────────────────────────────────────

/// One interceptor wrapped around the next-inner endpoint.
struct Layer {
    interceptor: BoxedInterceptor,
    inner: BoxedEndpoint,
}

impl Endpoint for Layer {
    fn invoke(&self, call: &mut Call) -> Outcome {
        self.interceptor.before_call(call);

        let next = Next { inner: self.inner.as_ref() };
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.interceptor.around_call(call, next)
        }));

        self.interceptor.after_call(call);

        match result {
            Ok(outcome) => outcome,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

/// Folds `interceptors` around `handler`; the first interceptor ends up
/// outermost.
pub(crate) fn compose(interceptors: &[BoxedInterceptor], handler: BoxedEndpoint) -> BoxedEndpoint {
    interceptors.iter().rev().fold(handler, |inner, interceptor| {
        Arc::new(Layer { interceptor: Arc::clone(interceptor), inner })
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use http::StatusCode;

    use super::*;
    use crate::error::Fault;
    use crate::handler::Handler;
    use crate::response::Response;

    pub(crate) type Log = Arc<Mutex<Vec<String>>>;

    /// Records every hook into a shared log.
    pub(crate) struct Recorder {
        pub(crate) name: &'static str,
        pub(crate) log: Log,
    }

    impl Recorder {
        pub(crate) fn boxed(name: &'static str, log: &Log) -> BoxedInterceptor {
            Arc::new(Self { name, log: Arc::clone(log) })
        }

        fn push(&self, event: &str) {
            self.log.lock().unwrap().push(format!("{event}{}", self.name));
        }
    }

    impl Interceptor for Recorder {
        fn before_call(&self, _call: &mut Call) {
            self.push("before");
        }

        fn around_call(&self, call: &mut Call, next: Next<'_>) -> Outcome {
            self.push("around");
            next.run(call)
        }

        fn after_call(&self, _call: &mut Call) {
            self.push("after");
        }
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn recording_handler(log: &Log) -> BoxedEndpoint {
        let log = Arc::clone(log);
        (move |_: &mut Call| {
            log.lock().unwrap().push("H".to_owned());
            Response::text("ok")
        })
        .into_endpoint()
    }

    #[test]
    fn hooks_run_outer_to_inner_then_inner_to_outer() {
        let log = Log::default();
        let chain = compose(
            &[Recorder::boxed("1", &log), Recorder::boxed("2", &log)],
            recording_handler(&log),
        );

        let mut call = Call::for_test("/");
        chain.invoke(&mut call).unwrap();

        assert_eq!(entries(&log), [
            "before1", "around1", "before2", "around2", "H", "after2", "after1",
        ]);
        assert!(call.response().is_some());
    }

    #[test]
    fn after_hooks_run_when_handler_fails() {
        let log = Log::default();
        let handler = {
            let log = Arc::clone(&log);
            (move |_: &mut Call| -> Result<Response, Fault> {
                log.lock().unwrap().push("H".to_owned());
                Err(Fault::msg("boom"))
            })
            .into_endpoint()
        };
        let chain = compose(&[Recorder::boxed("1", &log), Recorder::boxed("2", &log)], handler);

        let fault = chain.invoke(&mut Call::for_test("/")).unwrap_err();

        assert_eq!(fault.to_string(), "boom");
        assert_eq!(entries(&log), [
            "before1", "around1", "before2", "around2", "H", "after2", "after1",
        ]);
    }

    #[test]
    fn after_hooks_run_when_handler_panics() {
        let log = Log::default();
        let handler = (|_: &mut Call| -> Response { panic!("handler exploded") }).into_endpoint();
        let chain = compose(&[Recorder::boxed("1", &log), Recorder::boxed("2", &log)], handler);

        let caught = panic::catch_unwind(AssertUnwindSafe(|| chain.invoke(&mut Call::for_test("/"))));

        assert!(caught.is_err());
        assert_eq!(entries(&log), ["before1", "around1", "before2", "around2", "after2", "after1"]);
    }

    #[test]
    fn short_circuit_skips_inner_chain_but_not_after_hooks() {
        let log = Log::default();
        let deny: BoxedInterceptor = Arc::new(|call: &mut Call, _next: Next<'_>| -> Outcome {
            call.respond(Response::status(StatusCode::FORBIDDEN));
            Ok(())
        });
        let chain = compose(
            &[Recorder::boxed("1", &log), deny, Recorder::boxed("3", &log)],
            recording_handler(&log),
        );

        let mut call = Call::for_test("/");
        chain.invoke(&mut call).unwrap();

        assert_eq!(entries(&log), ["before1", "around1", "after1"]);
        assert_eq!(call.response().unwrap().status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn after_call_sees_and_can_decorate_the_response() {
        struct Stamp;
        impl Interceptor for Stamp {
            fn after_call(&self, call: &mut Call) {
                if let Some(res) = call.response_mut() {
                    res.headers_mut().insert("x-stamp", http::HeaderValue::from_static("1"));
                }
            }
        }

        let stamp: BoxedInterceptor = Arc::new(Stamp);
        let chain = compose(&[stamp], (|_: &mut Call| "ok").into_endpoint());
        let mut call = Call::for_test("/");
        chain.invoke(&mut call).unwrap();
        assert_eq!(call.response().unwrap().headers()["x-stamp"], "1");
    }

    #[test]
    fn empty_chain_is_the_handler_itself() {
        let log = Log::default();
        let chain = compose(&[], recording_handler(&log));
        chain.invoke(&mut Call::for_test("/")).unwrap();
        assert_eq!(entries(&log), ["H"]);
    }
}
