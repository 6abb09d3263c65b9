//! Per-request context: the request, the response being built for it, and a handle to the
//! application configuration.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::AppConfig;
use crate::exception::HttpException;
use crate::http::{Body, Request, Response};

/// Path variables bound by a parameterized route, e.g. `id → "42"` for `/items/:id`.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Everything a handler or middleware sees for one request.
///
/// Owned by the in-flight request and handed from middleware to middleware by value; each
/// step returns it to the dispatcher when done.
pub struct Context {
    request: Request,
    response: Response,
    app: Arc<AppConfig>,
}

impl Context {
    /// Builds the context for a request whose body is already aggregated.
    ///
    /// Path parameters are reset, cookies are read from the `Cookie` header, and the
    /// response inherits the request's keep-alive preference.
    pub fn new(mut request: Request, app: Arc<AppConfig>) -> Self {
        request.set_params(Default::default());
        request.parse_cookies();

        let mut response = Response::new();
        response.set_keep_alive(request.is_keep_alive());

        Self {
            request,
            response,
            app,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Shortcut for `ctx.request().params()`.
    pub fn params(&self) -> &PathParams {
        self.request.params()
    }

    /// The configuration of the application serving this request.
    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    /// Deserializes the request body as JSON.
    ///
    /// Works on raw bodies and on bodies already decoded by
    /// [`middleware::json`](crate::middleware::json).
    ///
    /// # Errors
    ///
    /// A `400 Bad Request` exception when the body does not fit `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpException> {
        let parsed = match self.request.body() {
            Body::Json(value) => T::deserialize(value),
            Body::Raw(bytes) => serde_json::from_slice(bytes),
            Body::Text(text) => serde_json::from_str(text),
        };
        parsed.map_err(|e| HttpException::bad_request(format!("Invalid JSON body: {e}")))
    }

    pub fn into_response(self) -> Response {
        self.response
    }

    pub fn into_parts(self) -> (Request, Response) {
        (self.request, self.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn context(raw: &str, body: &'static str) -> Context {
        let (request, _) = Request::parse(raw.as_bytes()).unwrap();
        Context::new(request.with_body(body), Arc::new(AppConfig::default()))
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn new_context_parses_cookies_and_keep_alive() {
        let ctx = context(
            "GET / HTTP/1.1\r\nCookie: sid=9\r\nConnection: close\r\n\r\n",
            "",
        );
        assert_eq!(ctx.request().cookie("sid"), Some("9"));
        assert!(ctx.params().is_empty());
        assert!(!ctx.response().keep_alive());
        assert!(!ctx.response().is_finished());
    }

    #[test]
    fn json_reads_raw_body() {
        let ctx = context("POST / HTTP/1.1\r\n\r\n", r#"{"x":1,"y":2}"#);
        assert_eq!(ctx.json::<Point>().unwrap(), Point { x: 1, y: 2 });
    }

    #[test]
    fn json_reads_decoded_body() {
        let mut ctx = context("POST / HTTP/1.1\r\n\r\n", "");
        ctx.request_mut()
            .set_body(Body::Json(serde_json::json!({"x": 3, "y": 4})));
        assert_eq!(ctx.json::<Point>().unwrap(), Point { x: 3, y: 4 });
    }

    #[test]
    fn json_mismatch_is_bad_request() {
        let ctx = context("POST / HTTP/1.1\r\n\r\n", r#"{"x":"no"}"#);
        let err = ctx.json::<Point>().unwrap_err();
        assert_eq!(err.status_code().as_u16(), 400);
    }

    #[test]
    fn path_params_basic_operations() {
        let mut params = PathParams::new();
        params.insert("id", "42");
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.len(), 1);
        params.clear();
        assert!(params.is_empty());
    }
}
