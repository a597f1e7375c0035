//! Sealed routes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::attribute::AttributeBag;
use crate::handler::BoxedEndpoint;
use crate::path::CompiledPath;

/// An immutable path pattern bound to one composed handler per HTTP method.
///
/// Routes are produced by [`RouteTableBuilder::seal`](crate::RouteTableBuilder::seal)
/// and never change afterwards.
pub struct Route {
    path: String,
    compiled: CompiledPath,
    handlers: HashMap<Method, BoxedEndpoint>,
    attributes: HashMap<Method, Arc<AttributeBag>>,
    allowed: Vec<Method>,
}

impl Route {
    pub(crate) fn new(compiled: CompiledPath, methods: Vec<(Method, BoxedEndpoint, AttributeBag)>) -> Self {
        let mut handlers = HashMap::with_capacity(methods.len());
        let mut attributes = HashMap::with_capacity(methods.len());
        let mut allowed = Vec::with_capacity(methods.len());
        for (method, endpoint, bag) in methods {
            allowed.push(method.clone());
            attributes.insert(method.clone(), Arc::new(bag));
            handlers.insert(method, endpoint);
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        Self { path: compiled.to_string(), compiled, handlers, attributes, allowed }
    }

    /// Canonical pattern, e.g. `/users/{id}`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn compiled(&self) -> &CompiledPath {
        &self.compiled
    }

    pub fn is_root(&self) -> bool {
        self.compiled.is_root()
    }

    /// Methods with a handler, sorted by name.
    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.handlers.contains_key(method)
    }

    /// Attributes attached to this route for `method`.
    pub fn attributes(&self, method: &Method) -> Option<&AttributeBag> {
        self.attributes.get(method).map(Arc::as_ref)
    }

    /// Combines several routes sharing `compiled` into a single route.
    ///
    /// Fails with the first method present in more than one of them.
    pub(crate) fn merge(compiled: &CompiledPath, parts: &[Arc<Route>]) -> Result<Self, Method> {
        let mut route = Self::new(compiled.clone(), Vec::new());
        for part in parts {
            for (method, endpoint) in &part.handlers {
                if route.handlers.contains_key(method) {
                    return Err(method.clone());
                }
                let bag = part.attributes.get(method).cloned().unwrap_or_default();
                route.allowed.push(method.clone());
                route.attributes.insert(method.clone(), bag);
                route.handlers.insert(method.clone(), Arc::clone(endpoint));
            }
        }
        route.allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(route)
    }

    pub(crate) fn endpoint(&self, method: &Method) -> Option<(&BoxedEndpoint, Arc<AttributeBag>)> {
        let endpoint = self.handlers.get(method)?;
        let bag = self.attributes.get(method).cloned().unwrap_or_default();
        Some((endpoint, bag))
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("methods", &self.allowed)
            .finish()
    }
}

/// One `(path, method, attributes)` triple, for introspection by
/// documentation or schema generators.
#[derive(Debug, Clone, Copy)]
pub struct RouteEntry<'a> {
    pub path: &'a str,
    pub method: &'a Method,
    pub attributes: &'a AttributeBag,
}

pub(crate) fn entries<'a>(routes: &'a [Arc<Route>]) -> Vec<RouteEntry<'a>> {
    let mut entries: Vec<_> = routes
        .iter()
        .flat_map(|route| {
            route.allowed.iter().filter_map(move |method| {
                Some(RouteEntry {
                    path: &route.path,
                    method,
                    attributes: route.attributes.get(method).map(Arc::as_ref)?,
                })
            })
        })
        .collect();
    entries.sort_by(|a, b| (a.path, a.method.as_str()).cmp(&(b.path, b.method.as_str())));
    entries
}
