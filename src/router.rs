//! Request dispatch.
//!
//! The [`Router`] is what the host transport talks to. For every request it
//!
//! 1. asks the [`RoutesMatcher`] for the most specific route,
//! 2. looks the request method up on that route,
//! 3. builds a fresh [`Call`] and runs the route's composed handler,
//! 4. maps the outcome to a [`Response`].
//!
//! "No route", "method not allowed" and "handler failed" go through three
//! replaceable callbacks. Everything the router holds is immutable, so one
//! `Arc<Router>` serves any number of threads without locking.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use http::header::{ALLOW, HeaderValue};
use http::{Method, StatusCode};
use tracing::{debug, warn};

use crate::error::{Error, Fault, Interrupted};
use crate::matcher::{RouteMatch, RoutesMatcher};
use crate::request::{Call, Request};
use crate::response::Response;
use crate::route::{self, Route, RouteEntry};
use crate::table::RouteTable;

type NotFoundFn = Arc<dyn Fn(&Request) -> Response + Send + Sync>;
type MethodNotAllowedFn = Arc<dyn Fn(&Request, &Route) -> Response + Send + Sync>;
type InternalErrorFn = Arc<dyn Fn(&Call, &Fault) -> Response + Send + Sync>;

/// How a `(method, path)` pair resolves against the routing table.
#[derive(Debug)]
pub enum Resolution {
    Matched(RouteMatch),
    NoRoute,
    /// A route matched the path but has no handler for the method.
    MethodNotAllowed(Arc<Route>),
}

/// The sealed routing table plus the outcome callbacks.
pub struct Router {
    matcher: RoutesMatcher,
    routes: Vec<Arc<Route>>,
    on_route_not_found: NotFoundFn,
    on_method_not_allowed: MethodNotAllowedFn,
    on_internal_error: InternalErrorFn,
}

impl Router {
    /// A router over one table with the default callbacks.
    pub fn new(table: RouteTable) -> Self {
        let routes = table.routes().to_vec();
        RouterBuilder::default().finish(routes)
    }

    /// A router merging several sealed tables.
    ///
    /// # Errors
    ///
    /// [`Error::RoutingConfiguration`] if two tables register the same path
    /// and method, or if more than one table has a root route.
    pub fn from_tables(tables: impl IntoIterator<Item = RouteTable>) -> Result<Self, Error> {
        tables.into_iter().fold(Self::builder(), RouterBuilder::table).build()
    }

    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Resolves a request without running anything.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        match self.matcher.find(path) {
            None => Resolution::NoRoute,
            Some(found) if found.route.allows(method) => Resolution::Matched(found),
            Some(found) => Resolution::MethodNotAllowed(found.route),
        }
    }

    /// Routes one request and produces one response.
    ///
    /// Handler faults and panics are handed to `on_internal_error` after
    /// every interceptor's `after_call` has run.
    ///
    /// # Errors
    ///
    /// [`Interrupted`] if the handler chain failed with
    /// [`Fault::interrupted`]. The transport should abandon the exchange.
    pub fn dispatch(&self, req: Request) -> Result<Response, Interrupted> {
        let Some(found) = self.matcher.find(req.path()) else {
            debug!(method = %req.method(), path = req.path(), "no route");
            return Ok((self.on_route_not_found)(&req));
        };
        let Some((endpoint, attributes)) = found.route.endpoint(req.method()) else {
            debug!(method = %req.method(), route = found.route.path(), "method not allowed");
            return Ok((self.on_method_not_allowed)(&req, &found.route));
        };

        debug!(method = %req.method(), path = req.path(), route = found.route.path(), "dispatching");
        let endpoint = Arc::clone(endpoint);
        let mut call = Call::new(req, found.route.path().to_owned(), found.params, attributes);

        let fault = match panic::catch_unwind(AssertUnwindSafe(|| endpoint.invoke(&mut call))) {
            Ok(Ok(())) => match call.take_response() {
                Some(response) => return Ok(response),
                None => Fault::msg("handler chain completed without a response"),
            },
            Ok(Err(fault)) if fault.is_interrupted() => {
                debug!(route = call.route(), "request interrupted");
                return Err(Interrupted);
            }
            Ok(Err(fault)) => fault,
            Err(payload) => Fault::msg(format!("handler panicked: {}", panic_message(payload.as_ref()))),
        };

        warn!(route = call.route(), error = %fault, "request failed");
        Ok((self.on_internal_error)(&call, &fault))
    }

    /// Every `(path, method, attributes)` triple across all merged tables.
    pub fn entries(&self) -> Vec<RouteEntry<'_>> {
        route::entries(&self.routes)
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.routes).finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

// ── Default callbacks ─────────────────────────────────────────────────────────

fn not_found(_req: &Request) -> Response {
    Response::status(StatusCode::NOT_FOUND)
}

fn method_not_allowed(_req: &Request, route: &Route) -> Response {
    let allow = route
        .allowed_methods()
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let mut res = Response::status(StatusCode::METHOD_NOT_ALLOWED);
    if let Ok(value) = HeaderValue::from_str(&allow) {
        res.headers_mut().insert(ALLOW, value);
    }
    res
}

fn internal_error(_call: &Call, _fault: &Fault) -> Response {
    Response::status(StatusCode::INTERNAL_SERVER_ERROR)
}

// ── RouterBuilder ─────────────────────────────────────────────────────────────

/// Configures a [`Router`]: which tables it serves and how it answers
/// unmatched or failed requests.
///
/// ```rust
/// use http::StatusCode;
/// use waypost::{Call, Response, RouteTable, Router};
///
/// # fn main() -> Result<(), waypost::Error> {
/// let mut routes = RouteTable::builder();
/// routes.get("/ping", |_: &mut Call| "pong")?;
///
/// let router = Router::builder()
///     .table(routes.seal()?)
///     .on_route_not_found(|req| Response::builder()
///         .status(StatusCode::NOT_FOUND)
///         .text(format!("nothing at {}", req.path())))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct RouterBuilder {
    tables: Vec<RouteTable>,
    on_route_not_found: Option<NotFoundFn>,
    on_method_not_allowed: Option<MethodNotAllowedFn>,
    on_internal_error: Option<InternalErrorFn>,
}

impl RouterBuilder {
    pub fn table(mut self, table: RouteTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn on_route_not_found<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.on_route_not_found = Some(Arc::new(f));
        self
    }

    pub fn on_method_not_allowed<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request, &Route) -> Response + Send + Sync + 'static,
    {
        self.on_method_not_allowed = Some(Arc::new(f));
        self
    }

    pub fn on_internal_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&Call, &Fault) -> Response + Send + Sync + 'static,
    {
        self.on_internal_error = Some(Arc::new(f));
        self
    }

    /// Merges the tables and builds the router.
    ///
    /// # Errors
    ///
    /// [`Error::RoutingConfiguration`] on a duplicate `(path, method)` across
    /// tables or more than one root route.
    pub fn build(mut self) -> Result<Router, Error> {
        let tables = std::mem::take(&mut self.tables);

        let roots = tables
            .iter()
            .flat_map(|t| t.routes())
            .filter(|r| r.is_root())
            .count();
        if roots > 1 {
            return Err(Error::configuration(format!("{roots} root routes registered, at most one is allowed")));
        }

        let mut by_path: BTreeMap<&str, Vec<Arc<Route>>> = BTreeMap::new();
        for route in tables.iter().flat_map(|t| t.routes()) {
            by_path.entry(route.path()).or_default().push(Arc::clone(route));
        }

        let mut routes = Vec::with_capacity(by_path.len());
        for (path, parts) in by_path {
            match parts.as_slice() {
                [single] => routes.push(Arc::clone(single)),
                [first, ..] => {
                    let merged = Route::merge(first.compiled(), &parts).map_err(|method| {
                        Error::configuration(format!("duplicate route `{method} {path}`"))
                    })?;
                    routes.push(Arc::new(merged));
                }
                [] => {}
            }
        }

        Ok(self.finish(routes))
    }

    fn finish(self, routes: Vec<Arc<Route>>) -> Router {
        Router {
            matcher: RoutesMatcher::new(routes.iter().cloned()),
            routes,
            on_route_not_found: self.on_route_not_found.unwrap_or_else(|| Arc::new(not_found)),
            on_method_not_allowed: self.on_method_not_allowed.unwrap_or_else(|| Arc::new(method_not_allowed)),
            on_internal_error: self.on_internal_error.unwrap_or_else(|| Arc::new(internal_error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::interceptor::tests::{Log, Recorder};
    use crate::interceptor::{BoxedInterceptor, Direction, Next};
    use crate::handler::Outcome;

    fn ok(_: &mut Call) -> &'static str {
        "ok"
    }

    fn get(router: &Router, path: &str) -> Response {
        router.dispatch(Request::new(Method::GET, path)).unwrap()
    }

    #[test]
    fn dispatches_with_captured_params() {
        let mut routes = RouteTable::builder();
        routes
            .get("/users/{id}", |call: &mut Call| format!("user {}", call.param("id").unwrap_or("")))
            .unwrap();
        let router = Router::new(routes.seal().unwrap());

        let res = get(&router, "/users/42");
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"user 42");
    }

    #[test]
    fn no_route_and_method_not_allowed_are_distinct() {
        let mut routes = RouteTable::builder();
        routes.get("/items", ok).unwrap().post("/items", ok).unwrap();
        let router = Router::new(routes.seal().unwrap());

        assert!(matches!(router.resolve(&Method::GET, "/nope"), Resolution::NoRoute));
        assert!(matches!(router.resolve(&Method::DELETE, "/items"), Resolution::MethodNotAllowed(_)));
        assert!(matches!(router.resolve(&Method::POST, "/items"), Resolution::Matched(_)));

        assert_eq!(get(&router, "/nope").status_code(), StatusCode::NOT_FOUND);
        let res = router.dispatch(Request::new(Method::DELETE, "/items")).unwrap();
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()[ALLOW], "GET, POST");
    }

    #[test]
    fn root_route_catches_unmatched_traffic() {
        let mut routes = RouteTable::builder();
        routes.get("/", |call: &mut Call| format!("root {}", call.params().len())).unwrap();
        routes.get("/a", ok).unwrap();
        let router = Router::new(routes.seal().unwrap());

        assert_eq!(get(&router, "/x/y").body().as_ref(), b"root 0");
    }

    #[test]
    fn failures_reach_internal_error_after_all_after_hooks() {
        let log = Log::default();
        let seen = Arc::new(Mutex::new(String::new()));
        let mut routes = RouteTable::builder();
        routes
            .install_all([Recorder::boxed("1", &log), Recorder::boxed("2", &log)], Direction::Back)
            .unwrap()
            .get("/fail", |_: &mut Call| -> Result<Response, Fault> { Err(Fault::msg("boom")) })
            .unwrap()
            .get("/panic", |_: &mut Call| -> Response { panic!("kaboom") })
            .unwrap();

        let router = {
            let seen = Arc::clone(&seen);
            let log = Arc::clone(&log);
            Router::builder()
                .table(routes.seal().unwrap())
                .on_internal_error(move |call, fault| {
                    log.lock().unwrap().push("on_internal_error".into());
                    *seen.lock().unwrap() = format!("{} {fault}", call.route());
                    Response::status(StatusCode::SERVICE_UNAVAILABLE)
                })
                .build()
                .unwrap()
        };

        assert_eq!(get(&router, "/fail").status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(*seen.lock().unwrap(), "/fail boom");
        let events = log.lock().unwrap().clone();
        assert_eq!(events[events.len() - 3..], ["after2", "after1", "on_internal_error"]);

        assert_eq!(get(&router, "/panic").status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(*seen.lock().unwrap(), "/panic handler panicked: kaboom");
    }

    #[test]
    fn interruption_bypasses_internal_error_but_runs_after_hooks() {
        let log = Log::default();
        let mut routes = RouteTable::builder();
        routes
            .install_all([Recorder::boxed("1", &log)], Direction::Back)
            .unwrap()
            .get("/slow", |_: &mut Call| -> Result<Response, Fault> { Err(Fault::interrupted()) })
            .unwrap();
        let router = Router::builder()
            .table(routes.seal().unwrap())
            .on_internal_error(|_, _| panic!("must not be called"))
            .build()
            .unwrap();

        assert_eq!(router.dispatch(Request::new(Method::GET, "/slow")).unwrap_err(), Interrupted);
        assert_eq!(*log.lock().unwrap(), ["before1", "around1", "after1"]);
    }

    #[test]
    fn chain_without_response_is_an_internal_error() {
        let swallow: BoxedInterceptor = Arc::new(|_: &mut Call, _: Next<'_>| -> Outcome { Ok(()) });
        let mut routes = RouteTable::builder();
        routes.install_all([swallow], Direction::Back).unwrap().get("/", ok).unwrap();
        let router = Router::new(routes.seal().unwrap());

        assert_eq!(get(&router, "/").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn merging_tables_combines_methods_on_shared_paths() {
        let mut users = RouteTable::builder();
        users.get("/users", ok).unwrap();
        let mut admin = RouteTable::builder();
        admin.delete("/users", ok).unwrap().get("/", ok).unwrap();

        let router = Router::from_tables([users.seal().unwrap(), admin.seal().unwrap()]).unwrap();

        assert!(matches!(router.resolve(&Method::DELETE, "/users"), Resolution::Matched(_)));
        assert!(matches!(router.resolve(&Method::GET, "/users"), Resolution::Matched(_)));
        let listed: Vec<_> = router.entries().iter().map(|e| format!("{} {}", e.method, e.path)).collect();
        assert_eq!(listed, ["GET /", "DELETE /users", "GET /users"]);
    }

    #[test]
    fn merging_rejects_duplicates_and_second_root() {
        let table = |path: &str| {
            let mut b = RouteTable::builder();
            b.get(path, ok).unwrap();
            b.seal().unwrap()
        };

        let err = Router::from_tables([table("/a"), table("/a/")]).unwrap_err();
        assert!(matches!(err, Error::RoutingConfiguration(ref m) if m.contains("GET /a")));

        let err = Router::from_tables([table("/"), table("")]).unwrap_err();
        assert!(matches!(err, Error::RoutingConfiguration(ref m) if m.contains("root")));
    }

    #[test]
    fn route_attributes_are_visible_to_interceptors() {
        let required = crate::AttributeKey::<&'static str>::new("required-role");
        let guard = move |call: &mut Call, next: Next<'_>| -> Outcome {
            let permitted = match call.route_attribute(&required) {
                Some(role) => call.request().header("x-role") == Some(*role),
                None => true,
            };
            if !permitted {
                call.respond(Response::status(StatusCode::FORBIDDEN));
                return Ok(());
            }
            next.run(call)
        };

        let mut routes = RouteTable::builder();
        routes
            .install(guard, Direction::Back)
            .unwrap()
            .route_with(Method::GET, "/admin", ok, |s| {
                s.attribute(&required, "admin");
            })
            .unwrap()
            .get("/public", ok)
            .unwrap();
        let router = Router::new(routes.seal().unwrap());

        assert_eq!(get(&router, "/admin").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(get(&router, "/public").status_code(), StatusCode::OK);
    }
}
