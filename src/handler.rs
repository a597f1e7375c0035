//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! A route holds handlers of *different* closure types in one map, so every
//! handler is hidden behind a trait object (`dyn Endpoint`). Interceptor
//! layers implement the same trait, which is what lets a composed chain and a
//! bare handler be stored and invoked the same way.
//!
//! ```text
//! fn get_user(call: &mut Call) -> Response { … }   ← user writes this
//!        ↓ routes.get("/users/{id}", get_user)
//! get_user.into_endpoint()                          ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_user))                     ← stored as BoxedEndpoint
//!        ↓ wrapped by interceptor layers at seal time
//! endpoint.invoke(&mut call) at request time        ← one vtable call per layer
//! ```

use std::sync::Arc;

use crate::error::Fault;
use crate::request::Call;
use crate::response::IntoOutcome;

/// Result of running an endpoint. The response itself lives in the [`Call`].
pub type Outcome = Result<(), Fault>;

/// Internal dispatch interface shared by handlers and interceptor layers.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// signature of the public `Handler` trait.
#[doc(hidden)]
pub trait Endpoint: Send + Sync + 'static {
    fn invoke(&self, call: &mut Call) -> Outcome;
}

/// A type-erased endpoint shared across concurrent requests.
#[doc(hidden)]
pub type BoxedEndpoint = Arc<dyn Endpoint>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the shape:
///
/// ```text
/// fn name(call: &mut Call) -> impl IntoOutcome
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_endpoint(self) -> BoxedEndpoint;
}

mod private {
    pub trait Sealed {}
}

impl<F, R> private::Sealed for F
where
    F: Fn(&mut Call) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
}

impl<F, R> Handler for F
where
    F: Fn(&mut Call) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn into_endpoint(self) -> BoxedEndpoint {
        Arc::new(FnHandler(self))
    }
}

/// Newtype bridging a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, R> Endpoint for FnHandler<F>
where
    F: Fn(&mut Call) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn invoke(&self, call: &mut Call) -> Outcome {
        let response = (self.0)(call).into_outcome()?;
        call.respond(response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::response::Response;

    #[test]
    fn handler_response_is_stored_in_call() {
        let endpoint = (|call: &mut Call| format!("hello {}", call.route())).into_endpoint();
        let mut call = Call::for_test("/greet");
        endpoint.invoke(&mut call).unwrap();
        assert_eq!(call.response().unwrap().body().as_ref(), b"hello /greet");
    }

    #[test]
    fn handler_error_leaves_response_empty() {
        fn failing(_: &mut Call) -> Result<Response, Fault> {
            Err(Fault::msg("boom"))
        }
        let mut call = Call::for_test("/");
        let fault = failing.into_endpoint().invoke(&mut call).unwrap_err();
        assert_eq!(fault.to_string(), "boom");
        assert!(call.response().is_none());
    }

    #[test]
    fn status_code_is_a_valid_return() {
        let endpoint = (|_: &mut Call| StatusCode::ACCEPTED).into_endpoint();
        let mut call = Call::for_test("/");
        endpoint.invoke(&mut call).unwrap();
        assert_eq!(call.response().unwrap().status_code(), StatusCode::ACCEPTED);
    }
}
