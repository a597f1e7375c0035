//! Route table builder.
//!
//! The builder is the only mutable part of the crate. It collects
//! registrations, keeps track of nested path groups and scoped interceptors,
//! and is then sealed into an immutable [`RouteTable`]. Once sealed it
//! refuses every further change.
//!
//! ```rust
//! use waypost::{Call, Direction, RouteTable, middleware::Trace};
//!
//! # fn main() -> Result<(), waypost::Error> {
//! let mut routes = RouteTable::builder();
//! routes.install(Trace, Direction::Back)?;
//! routes.group("/api", |api| {
//!     api.get("/users/{id}", |call: &mut Call| format!("user {}", call.param("id").unwrap_or("?")))?;
//!     api.post("/users", |_: &mut Call| "created")?;
//!     Ok(())
//! })?;
//! let table = routes.seal()?;
//! assert_eq!(table.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use http::Method;
use tracing::{debug, info};

use crate::attribute::{AttributeBag, AttributeKey};
use crate::error::Error;
use crate::handler::{BoxedEndpoint, Handler};
use crate::interceptor::{BoxedInterceptor, Direction, Interceptor, compose};
use crate::path::CompiledPath;
use crate::route::{self, Route, RouteEntry};

// ── RouteSettings ─────────────────────────────────────────────────────────────

/// Per-registration settings: route-local interceptors and attributes.
#[derive(Default)]
pub struct RouteSettings {
    interceptors: Vec<BoxedInterceptor>,
    attributes: AttributeBag,
}

impl RouteSettings {
    /// Adds a route-local interceptor, innermost of everything already
    /// scoped around this registration.
    pub fn intercept(&mut self, interceptor: impl Interceptor) -> &mut Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Attaches a typed attribute to this path and method.
    pub fn attribute<T: Send + Sync + 'static>(&mut self, key: &AttributeKey<T>, value: T) -> &mut Self {
        self.attributes.set(key, value);
        self
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

struct Pending {
    compiled: CompiledPath,
    method: Method,
    handler: BoxedEndpoint,
    interceptors: Vec<BoxedInterceptor>,
    attributes: AttributeBag,
}

/// Mutable accumulator for routes. Obtain with [`RouteTable::builder`].
#[derive(Default)]
pub struct RouteTableBuilder {
    prefixes: Vec<String>,
    scoped: Vec<BoxedInterceptor>,
    globals: Vec<BoxedInterceptor>,
    pending: Vec<Pending>,
    sealed: Option<RouteTable>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` on `path`.
    ///
    /// # Errors
    ///
    /// [`Error::RouteCompilation`] if the full path (including enclosing
    /// groups) is not a valid pattern, [`Error::RoutingConfiguration`] if
    /// the builder is sealed.
    pub fn route(&mut self, method: Method, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.route_with(method, path, handler, |_| {})
    }

    /// Like [`route`](Self::route), with a settings block for route-local
    /// interceptors and attributes.
    ///
    /// ```rust
    /// use waypost::{AttributeKey, Call, RouteTable, middleware::Trace};
    ///
    /// # fn main() -> Result<(), waypost::Error> {
    /// let scopes = AttributeKey::<&'static str>::new("scopes");
    /// let mut routes = RouteTable::builder();
    /// routes.route_with(http::Method::DELETE, "/users/{id}", |_: &mut Call| "gone", |s| {
    ///     s.intercept(Trace).attribute(&scopes, "users:write");
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn route_with(
        &mut self,
        method: Method,
        path: &str,
        handler: impl Handler,
        settings: impl FnOnce(&mut RouteSettings),
    ) -> Result<&mut Self, Error> {
        self.ensure_open("register a route")?;

        let full = self.full_path(path);
        let compiled = CompiledPath::compile(&full)?;

        let mut block = RouteSettings::default();
        settings(&mut block);

        let mut interceptors = self.scoped.clone();
        interceptors.extend(block.interceptors);

        debug!(%method, path = %compiled, "route registered");
        self.pending.push(Pending {
            compiled,
            method,
            handler: handler.into_endpoint(),
            interceptors,
            attributes: block.attributes,
        });
        Ok(self)
    }

    pub fn get(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.route(Method::GET, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.route(Method::POST, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.route(Method::PUT, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.route(Method::PATCH, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.route(Method::DELETE, path, handler)
    }

    pub fn head(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.route(Method::HEAD, path, handler)
    }

    pub fn options(&mut self, path: &str, handler: impl Handler) -> Result<&mut Self, Error> {
        self.route(Method::OPTIONS, path, handler)
    }

    /// Runs `block` with `prefix` prepended to every path registered inside.
    ///
    /// The prefix is removed when the block returns, fails or panics, so it
    /// never leaks into later registrations.
    pub fn group<F>(&mut self, prefix: &str, block: F) -> Result<&mut Self, Error>
    where
        F: FnOnce(&mut Self) -> Result<(), Error>,
    {
        self.ensure_open("open a group")?;
        self.prefixes.push(prefix.to_owned());
        let result = panic::catch_unwind(AssertUnwindSafe(|| block(&mut *self)));
        self.prefixes.pop();
        match result {
            Ok(result) => result.map(|()| self),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Runs `block` with `interceptor` applied to every route registered
    /// inside it. Nested blocks compose, outer first. The scope ends with the
    /// block, however the block exits.
    pub fn with<F>(&mut self, interceptor: impl Interceptor, block: F) -> Result<&mut Self, Error>
    where
        F: FnOnce(&mut Self) -> Result<(), Error>,
    {
        self.with_all([Arc::new(interceptor) as BoxedInterceptor], block)
    }

    /// [`with`](Self::with) for several interceptors at once, applied in
    /// iteration order.
    pub fn with_all<I, F>(&mut self, interceptors: I, block: F) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = BoxedInterceptor>,
        F: FnOnce(&mut Self) -> Result<(), Error>,
    {
        self.ensure_open("open an interceptor scope")?;
        let depth = self.scoped.len();
        self.scoped.extend(interceptors);
        let result = panic::catch_unwind(AssertUnwindSafe(|| block(&mut *self)));
        self.scoped.truncate(depth);
        match result {
            Ok(result) => result.map(|()| self),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Installs a global interceptor. Globals wrap every route and are
    /// always outside route-local interceptors.
    pub fn install(&mut self, interceptor: impl Interceptor, direction: Direction) -> Result<&mut Self, Error> {
        self.install_all([Arc::new(interceptor) as BoxedInterceptor], direction)
    }

    /// Installs several globals, keeping their relative order. Duplicates are
    /// kept as given.
    pub fn install_all<I>(&mut self, interceptors: I, direction: Direction) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = BoxedInterceptor>,
    {
        self.ensure_open("install an interceptor")?;
        match direction {
            Direction::Back => self.globals.extend(interceptors),
            Direction::Front => {
                let mut front: Vec<_> = interceptors.into_iter().collect();
                front.append(&mut self.globals);
                self.globals = front;
            }
        }
        Ok(self)
    }

    /// Seals the builder into an immutable [`RouteTable`].
    ///
    /// Pending registrations are grouped by path into one [`Route`] each;
    /// every handler is wrapped with the global interceptors followed by its
    /// own. Calling `seal` again returns the same table.
    ///
    /// # Errors
    ///
    /// [`Error::RoutingConfiguration`] if a path and method were registered
    /// twice.
    pub fn seal(&mut self) -> Result<RouteTable, Error> {
        if let Some(table) = &self.sealed {
            return Ok(table.clone());
        }

        // Validate before draining so a failed seal leaves every
        // registration in place.
        let mut seen = HashSet::new();
        for pending in &self.pending {
            if !seen.insert((pending.compiled.to_string(), &pending.method)) {
                return Err(Error::configuration(format!(
                    "duplicate route `{} {}`",
                    pending.method, pending.compiled,
                )));
            }
        }

        let mut by_path: BTreeMap<String, (CompiledPath, Vec<Pending>)> = BTreeMap::new();
        for pending in std::mem::take(&mut self.pending) {
            by_path
                .entry(pending.compiled.to_string())
                .or_insert_with(|| (pending.compiled.clone(), Vec::new()))
                .1
                .push(pending);
        }

        let routes: Vec<Arc<Route>> = by_path
            .into_values()
            .map(|(compiled, group)| {
                let methods = group
                    .into_iter()
                    .map(|p| {
                        let chain: Vec<_> = self.globals.iter().chain(&p.interceptors).cloned().collect();
                        (p.method, compose(&chain, p.handler), p.attributes)
                    })
                    .collect();
                Arc::new(Route::new(compiled, methods))
            })
            .collect();

        info!(routes = routes.len(), globals = self.globals.len(), "route table sealed");
        let table = RouteTable { routes: routes.into() };
        self.sealed = Some(table.clone());
        Ok(table)
    }

    fn ensure_open(&self, action: &str) -> Result<(), Error> {
        match self.sealed {
            Some(_) => Err(Error::configuration(format!("cannot {action}: route table is sealed"))),
            None => Ok(()),
        }
    }

    fn full_path(&self, path: &str) -> String {
        let mut full = self.prefixes.join("/");
        full.push('/');
        full.push_str(path);
        full
    }
}

// ── RouteTable ────────────────────────────────────────────────────────────────

/// The sealed, immutable list of routes. Cheap to clone.
#[derive(Clone, Debug)]
pub struct RouteTable {
    routes: Arc<[Arc<Route>]>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Every `(path, method, attributes)` triple, ordered by path then method.
    pub fn entries(&self) -> Vec<RouteEntry<'_>> {
        route::entries(&self.routes)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
