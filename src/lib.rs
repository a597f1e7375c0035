//! # waypost
//!
//! Deterministic HTTP route matching and interceptor chains.
//!
//! ## The contract
//!
//! You register path patterns and handlers. waypost picks the one most
//! specific route for every request, always the same one no matter in which
//! order things were registered, and runs it inside an ordered chain of
//! interceptors whose cleanup hooks run even when the handler fails.
//!
//! Path patterns are built from five kinds of segments, most specific first:
//!
//! | Segment   | Matches                                  | Captures |
//! |-----------|------------------------------------------|----------|
//! | `users`   | exactly `users`                          | no       |
//! | `{id}`    | any one segment                          | `id`     |
//! | `{page?}` | one segment, or nothing at the very end  | `page`   |
//! | `*`       | any one segment                          | no       |
//! | `{...}`   | the rest of the path, possibly empty     | no       |
//!
//! A route registered on `/` also catches every request nothing else
//! matched.
//!
//! What waypost intentionally leaves to others: TLS, body codecs,
//! authentication, metrics exporters. Those plug in as [`Interceptor`]s and
//! store per-route metadata through [`AttributeKey`]s.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use waypost::{Call, Direction, Response, RouteTable, Router, Server, middleware::Trace};
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), waypost::Error> {
//!     let mut routes = RouteTable::builder();
//!     routes.install(Trace, Direction::Front)?;
//!     routes.group("/users", |users| {
//!         users.get("/{id}", get_user)?;
//!         users.post("/", create_user)?;
//!         Ok(())
//!     })?;
//!
//!     let router = Router::new(routes.seal()?);
//!     Server::bind("0.0.0.0:3000")?.serve(router).await
//! }
//!
//! fn get_user(call: &mut Call) -> Response {
//!     let id = call.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! fn create_user(call: &mut Call) -> Response {
//!     if call.request().body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(r#"{"id":"99"}"#)
//! }
//! ```

mod attribute;
mod error;
mod handler;
mod interceptor;
mod matcher;
mod path;
mod request;
mod response;
mod route;
mod router;
mod selector;
mod server;
mod table;

pub mod health;
pub mod middleware;

pub use attribute::{AttributeBag, AttributeKey};
pub use error::{Error, Fault, Interrupted};
pub use handler::{Handler, Outcome};
pub use interceptor::{BoxedInterceptor, Direction, Interceptor, Next};
pub use matcher::{RouteMatch, RoutesMatcher};
pub use path::CompiledPath;
pub use request::{Call, Request};
pub use response::{ContentType, IntoOutcome, IntoResponse, Response, ResponseBuilder};
pub use route::{Route, RouteEntry};
pub use router::{Resolution, Router, RouterBuilder};
pub use selector::{Evaluation, SUCCESS_ONE, SUCCESS_ZERO, Selector};
pub use server::Server;
pub use table::{RouteSettings, RouteTable, RouteTableBuilder};
