//! Inbound request descriptor and the per-call context handed to handlers.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method};

use crate::attribute::{AttributeBag, AttributeKey};
use crate::response::Response;

/// An incoming HTTP request, as supplied by the host transport.
///
/// Routing only ever reads `method` and `path`. Headers, body and extensions
/// pass through untouched to interceptors and handlers.
#[derive(Debug, Default)]
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    extensions: Extensions,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), ..Self::default() }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Header lookup; names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Per-request typed slot. Interceptors put data here (an authenticated
    /// identity, a request id) for everything further down the chain.
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            headers: parts.headers,
            body,
            extensions: parts.extensions,
        }
    }
}

// ── Call ──────────────────────────────────────────────────────────────────────

/// The context of one routed request.
///
/// Created fresh by the router for every dispatch and threaded through every
/// interceptor and the terminal handler. The handler's response is stored in
/// the call, so `after_call` hooks see (and may decorate) it.
#[derive(Debug)]
pub struct Call {
    request: Request,
    route: String,
    params: HashMap<String, String>,
    attributes: Arc<AttributeBag>,
    response: Option<Response>,
}

impl Call {
    pub(crate) fn new(
        request: Request,
        route: String,
        params: HashMap<String, String>,
        attributes: Arc<AttributeBag>,
    ) -> Self {
        Self { request, route, params, attributes, response: None }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn request_mut(&mut self) -> &mut Request { &mut self.request }

    /// The pattern of the matched route, e.g. `/users/{id}`.
    pub fn route(&self) -> &str { &self.route }

    /// Returns a captured path parameter.
    ///
    /// For a route `/users/{id}`, `call.param("id")` on `/users/42` returns
    /// `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    /// Reads a value attached to the matched route for this method.
    pub fn route_attribute<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<&T> {
        self.attributes.get(key)
    }

    /// Sets the response. Interceptors that short-circuit the chain call this
    /// instead of invoking `next`.
    pub fn respond(&mut self, response: Response) {
        self.response = Some(response);
    }

    pub fn response(&self) -> Option<&Response> { self.response.as_ref() }
    pub fn response_mut(&mut self) -> Option<&mut Response> { self.response.as_mut() }

    pub(crate) fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }
}

#[cfg(test)]
impl Call {
    /// A call with no route attributes, for unit tests of interceptors.
    pub(crate) fn for_test(path: &str) -> Self {
        Self::new(Request::new(Method::GET, path), path.to_owned(), HashMap::new(), Arc::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HeaderValue;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        let req = Request::new(Method::GET, "/").with_headers(headers);
        assert_eq!(req.header("X-Request-Id"), Some("abc"));
        assert_eq!(req.header("missing"), None);
    }

    #[test]
    fn converts_from_http_request() {
        let req: Request = http::Request::builder()
            .method(Method::POST)
            .uri("http://example.com/users?page=2")
            .body(Bytes::from_static(b"{}"))
            .unwrap()
            .into();
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.path(), "/users");
        assert_eq!(req.body().as_ref(), b"{}");
    }

    #[test]
    fn extensions_carry_data_downstream() {
        #[derive(Clone, Debug, PartialEq)]
        struct User(&'static str);

        let mut call = Call::for_test("/me");
        call.request_mut().extensions_mut().insert(User("alice"));
        assert_eq!(call.request().extensions().get::<User>(), Some(&User("alice")));
    }
}
