//! Built-in Kubernetes health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them like any other handler:
//!
//! ```rust
//! use waypost::{RouteTable, health};
//!
//! # fn main() -> Result<(), waypost::Error> {
//! let mut routes = RouteTable::builder();
//! routes.get("/healthz", health::liveness)?.get("/readyz", health::readiness)?;
//! # Ok(())
//! # }
//! ```
//!
//! Replace `readiness` with your own handler to gate on dependency health.

use crate::{Call, Response};

/// Liveness probe. Always `200 OK` with body `"ok"`.
pub fn liveness(_call: &mut Call) -> Response {
    Response::text("ok")
}

/// Readiness probe (default implementation). Always `200 OK` with body
/// `"ready"`.
pub fn readiness(_call: &mut Call) -> Response {
    Response::text("ready")
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use crate::{Request, RouteTable, Router};

    #[test]
    fn probes_answer_ok() {
        let mut routes = RouteTable::builder();
        routes.get("/healthz", super::liveness).unwrap().get("/readyz", super::readiness).unwrap();
        let router = Router::new(routes.seal().unwrap());

        for (path, body) in [("/healthz", "ok"), ("/readyz", "ready")] {
            let res = router.dispatch(Request::new(Method::GET, path)).unwrap();
            assert_eq!(res.status_code(), StatusCode::OK);
            assert_eq!(res.body().as_ref(), body.as_bytes());
        }
    }
}
