//! Minimal waypost example: JSON endpoints, a scoped interceptor, route
//! attributes and health checks.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/users/42 -H 'x-admin: 1'
//!   curl http://localhost:3000/files/docs/readme.md
//!   curl http://localhost:3000/healthz

use std::sync::LazyLock;

use http::StatusCode;
use waypost::{
    AttributeKey, Call, Direction, Fault, Next, Outcome, Response, RouteTable, Router, Server,
    health, middleware::Trace,
};

/// Set on routes that need the `x-admin` header.
static ADMIN_ONLY: LazyLock<AttributeKey<bool>> = LazyLock::new(|| AttributeKey::new("admin-only"));

#[tokio::main]
async fn main() -> Result<(), waypost::Error> {
    tracing_subscriber::fmt::init();

    let mut routes = RouteTable::builder();
    routes.install(Trace, Direction::Front)?;

    routes.with(require_admin, |scoped| {
        scoped.group("/users", |users| {
            users.get("/{id}", get_user)?;
            users.post("/", create_user)?;
            users.route_with(http::Method::DELETE, "/{id}", delete_user, |settings| {
                settings.attribute(&ADMIN_ONLY, true);
            })?;
            Ok(())
        })?;
        Ok(())
    })?;

    routes
        .get("/files/{...}", list_files)?
        .get("/healthz", health::liveness)?
        .get("/readyz", health::readiness)?;

    let router = Router::new(routes.seal()?);
    for entry in router.entries() {
        tracing::debug!(method = %entry.method, path = entry.path, "registered");
    }

    Server::bind("0.0.0.0:3000")?.serve(router).await
}

// Rejects requests to admin-only routes that lack the `x-admin` header.
fn require_admin(call: &mut Call, next: Next<'_>) -> Outcome {
    let admin_only = call.route_attribute(&ADMIN_ONLY).copied().unwrap_or(false);
    if admin_only && call.request().header("x-admin").is_none() {
        call.respond(Response::status(StatusCode::FORBIDDEN));
        return Ok(());
    }
    next.run(call)
}

// GET /users/{id}
fn get_user(call: &mut Call) -> Response {
    let id = call.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

// POST /users
//
// call.request().body() is raw bytes. Parse with serde_json::from_slice,
// simd-json, etc. waypost does not touch them.
fn create_user(call: &mut Call) -> Result<Response, Fault> {
    if call.request().body().is_empty() {
        return Err(Fault::msg("empty body"));
    }

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(r#"{"id":"99","name":"new_user"}"#))
}

// DELETE /users/{id} → 204 No Content
fn delete_user(_call: &mut Call) -> StatusCode {
    StatusCode::NO_CONTENT
}

// GET /files/{...}
fn list_files(call: &mut Call) -> String {
    format!("you asked for {}", call.request().path())
}
