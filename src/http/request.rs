//! HTTP/1.1 request head parsing using the [`httparse`] crate, plus the request-scoped
//! state the dispatcher attaches to it (body, path parameters, cookies).

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use super::cookie::{self, Cookies};
use super::{Headers, Method};
use crate::context::PathParams;

/// Errors that can occur while parsing an HTTP/1.1 request head.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length: {0}")]
    InvalidContentLength(String),
}

/// The request payload.
///
/// The dispatcher always delivers [`Body::Raw`]; body middleware such as
/// [`middleware::json`](crate::middleware::json) swaps it for a decoded form.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Raw(Bytes),
    Text(String),
    Json(Value),
}

impl Default for Body {
    fn default() -> Self {
        Body::Raw(Bytes::new())
    }
}

impl Body {
    /// Raw bytes for `Raw` and `Text` bodies; `None` once decoded to JSON.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Raw(bytes) => Some(bytes),
            Body::Text(text) => Some(text.as_bytes()),
            Body::Json(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Raw(bytes) => bytes.is_empty(),
            Body::Text(text) => text.is_empty(),
            Body::Json(_) => false,
        }
    }
}

/// An HTTP/1.1 request.
///
/// Created by [`Request::parse`] from the raw request head. The body starts out empty and
/// is filled in by the dispatcher once every chunk has arrived.
///
/// # Examples
///
/// ```
/// use nanoroute::http::request::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\nCookie: sid=42\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.url(), "/hello?name=world");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name"), Some("world"));
/// assert_eq!(request.header("host"), Some("localhost"));
/// assert_eq!(request.header("x-missing"), None);
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: String,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    query_params: HashMap<String, String>,
    body: Body,
    params: PathParams,
    cookies: Cookies,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a request head from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins in `buf`
    /// (immediately after the `\r\n\r\n` terminator). Bytes past that offset are left for
    /// the body aggregator.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: more data is needed to complete the head.
    /// - [`RequestError::Parse`]: the data is malformed.
    /// - [`RequestError::MissingField`]: method, path, or version is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?;
        let Ok(method) = method.parse::<Method>();

        let url = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let headers = Headers::from(&*raw_req.headers);

        Ok((Self::from_parts(method, url, version, headers), body_offset))
    }

    fn from_parts(method: Method, url: &str, version: u8, headers: Headers) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (url.to_owned(), None),
        };
        let query_params = query.as_deref().map(parse_query_string).unwrap_or_default();

        Self {
            method,
            url: url.to_owned(),
            path,
            version,
            headers,
            query,
            query_params,
            body: Body::default(),
            params: PathParams::new(),
            cookies: Cookies::new(),
        }
    }

    /// Returns this request with `body` attached as [`Body::Raw`].
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Raw(body.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target exactly as sent, including any query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Header lookup by name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// All query parameters. Empty when the URL has no query string.
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_params.get(key).map(String::as_str)
    }

    /// Path variables bound by the matched route.
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replaces the body; used by body-transforming middleware.
    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// Moves the body out, leaving an empty raw body behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Re-reads the `Cookie` header into [`cookies`](Self::cookies).
    pub(crate) fn parse_cookies(&mut self) {
        self.cookies = self
            .headers
            .get("cookie")
            .map(cookie::parse_cookies)
            .unwrap_or_default();
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        if self.headers.has_token("connection", "close") {
            return false;
        }
        self.version == 1 || self.headers.has_token("connection", "keep-alive")
    }

    /// The declared body length. `Ok(None)` when no `Content-Length` was sent.
    ///
    /// # Errors
    ///
    /// [`RequestError::InvalidContentLength`] when a value is not a plain decimal number, or
    /// when repeated values disagree. The body cannot be framed in either case, so the
    /// connection must not be reused.
    pub fn content_length(&self) -> Result<Option<usize>, RequestError> {
        let mut declared = None;
        for item in self.headers.tokens("content-length") {
            let invalid = || RequestError::InvalidContentLength(item.to_owned());
            if !item.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let length: usize = item.parse().map_err(|_| invalid())?;
            match declared {
                Some(previous) if previous != length => return Err(invalid()),
                _ => declared = Some(length),
            }
        }
        if declared.is_none() && self.headers.contains("content-length") {
            return Err(RequestError::InvalidContentLength(String::new()));
        }
        Ok(declared)
    }

    /// `true` when the client used `Transfer-Encoding: chunked`.
    pub fn is_chunked(&self) -> bool {
        self.headers.has_token("transfer-encoding", "chunked")
    }
}

/// Parses a URL query string (`key=value&key2=value2`) into a `HashMap`.
///
/// Keys and values have `+` decoded as a space; percent-escapes are left untouched.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.replace('+', " "), value.replace('+', " "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.version(), 1);
        assert_eq!(offset, raw.len());
        assert!(req.body().is_empty());
        assert!(req.params().is_empty());
    }

    #[test]
    fn head_parse_leaves_body_bytes_for_aggregation() {
        let raw = b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length().unwrap(), Some(5));
        assert!(req.body().is_empty());
        assert_eq!(&raw[offset..], b"hello");
    }

    #[test]
    fn content_length_separates_absent_from_invalid() {
        let length = |raw: &str| Request::parse(raw.as_bytes()).unwrap().0.content_length();

        assert_eq!(length("GET / HTTP/1.1\r\n\r\n").unwrap(), None);
        assert_eq!(length("POST / HTTP/1.1\r\nContent-Length:  7 \r\n\r\n").unwrap(), Some(7));
        assert_eq!(
            length("POST / HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 3, 3\r\n\r\n").unwrap(),
            Some(3)
        );

        for bad in ["abc", "+5", "-1", "1, 2", "", "99999999999999999999999"] {
            let raw = format!("POST / HTTP/1.1\r\nContent-Length: {bad}\r\n\r\n");
            assert!(
                matches!(length(&raw), Err(RequestError::InvalidContentLength(_))),
                "{bad:?} accepted"
            );
        }
        let conflicting = "POST / HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 4\r\n\r\n";
        assert!(length(conflicting).is_err());
    }

    #[test]
    fn query_string_is_split_from_path() {
        let raw = b"GET /search?q=rust+lang&page=2&flag HTTP/1.1\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/search");
        assert_eq!(req.url(), "/search?q=rust+lang&page=2&flag");
        assert_eq!(req.query_string(), Some("q=rust+lang&page=2&flag"));
        assert_eq!(req.query_param("q"), Some("rust lang"));
        assert_eq!(req.query_param("flag"), Some(""));
        assert_eq!(req.query().len(), 3);
    }

    #[test]
    fn missing_query_gives_empty_map() {
        let (req, _) = Request::parse(b"GET /a HTTP/1.1\r\n\r\n").unwrap();
        assert!(req.query().is_empty());
        assert_eq!(req.query_param("a"), None);
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn keep_alive_defaults_follow_version() {
        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert!(req.is_keep_alive());
        let (req, _) = Request::parse(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert!(!req.is_keep_alive());
        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
        assert!(!req.is_keep_alive());
        let (req, _) =
            Request::parse(b"GET / HTTP/1.0\r\nConnection: Keep-Alive, TE\r\n\r\n").unwrap();
        assert!(req.is_keep_alive());
    }

    #[test]
    fn cookies_come_from_cookie_header() {
        let raw = b"GET / HTTP/1.1\r\nCookie: a=1; b=2\r\n\r\n";
        let (mut req, _) = Request::parse(raw).unwrap();
        assert!(req.cookies().is_empty());
        req.parse_cookies();
        assert_eq!(req.cookie("a"), Some("1"));
        assert_eq!(req.cookie("b"), Some("2"));
    }

    #[test]
    fn chunked_transfer_is_detected() {
        let raw = b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip, Chunked\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(req.is_chunked());
    }

    #[test]
    fn take_body_leaves_empty_raw() {
        let (req, _) = Request::parse(b"POST / HTTP/1.1\r\n\r\n").unwrap();
        let mut req = req.with_body("data");
        assert_eq!(req.take_body(), Body::Raw(Bytes::from_static(b"data")));
        assert!(req.body().is_empty());
    }
}
