//! HTTP/1.1 response.
//!
//! A [`Response`] travels with the request through the middleware chain and is mutated in
//! place. Calling [`send`](Response::send) or [`redirect`](Response::redirect) *finishes*
//! it; the dispatcher stops running middleware as soon as it sees a finished response.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::{Body, Headers, StatusCode};

/// Anything [`Response::send`] accepts.
///
/// Strings, numbers and booleans are encoded as text. Bytes pass through untouched. JSON
/// values are serialized and labelled `application/json`. [`Payload::Empty`] finishes the
/// response without a body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Text(String),
    Bytes(Bytes),
    Json(Value),
}

impl Payload {
    /// Serializes any [`Serialize`] value into a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Payload::Json)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_owned())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Bytes(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(b))
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Json(v)
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

impl From<Body> for Payload {
    fn from(body: Body) -> Self {
        match body {
            Body::Raw(bytes) => Payload::Bytes(bytes),
            Body::Text(text) => Payload::Text(text),
            Body::Json(value) => Payload::Json(value),
        }
    }
}

macro_rules! text_payload {
    ($($t:ty),+) => {
        $(
            impl From<$t> for Payload {
                fn from(v: $t) -> Self {
                    Payload::Text(v.to_string())
                }
            }
        )+
    };
}

text_payload!(bool, i32, i64, u32, u64, usize, f32, f64);

/// An HTTP/1.1 response under construction.
///
/// # Examples
///
/// ```
/// use nanoroute::http::{Response, StatusCode};
///
/// let mut response = Response::new();
/// response.status(StatusCode::CREATED).send(serde_json::json!({ "id": 7 }));
///
/// assert!(response.is_finished());
/// let text = String::from_utf8(response.into_bytes().to_vec()).unwrap();
/// assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
/// assert!(text.contains("Content-Type: application/json\r\n"));
/// assert!(text.ends_with("\r\n\r\n{\"id\":7}"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    keep_alive: bool,
    finished: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// An unfinished `200 OK` response with no headers and no body.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Headers::new(),
            body: Bytes::new(),
            keep_alive: true,
            finished: false,
        }
    }

    /// Sets the status code. Chainable.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Sets a header, replacing any previous value. Chainable.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    /// Writes `payload` as the body and finishes the response.
    ///
    /// Sending on an already finished response is ignored with a warning.
    pub fn send(&mut self, payload: impl Into<Payload>) {
        if self.finished {
            warn!(status = %self.status, "response already finished; payload dropped");
            return;
        }

        match payload.into() {
            Payload::Empty => {}
            Payload::Text(text) => self.body = Bytes::from(text),
            Payload::Bytes(bytes) => self.body = bytes,
            Payload::Json(value) => {
                self.body = Bytes::from(value.to_string());
                self.headers.set("Content-Type", "application/json");
            }
        }
        self.finished = true;
    }

    /// Serializes `value` as JSON and finishes the response.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let payload = Payload::json(value)?;
        self.send(payload);
        Ok(())
    }

    /// Finishes the response as a redirect to `location` (`301` unless `status` is given).
    pub fn redirect(&mut self, location: impl Into<String>, status: Option<StatusCode>) {
        self.status = status.unwrap_or(StatusCode::MOVED_PERMANENTLY);
        self.headers.set("Location", location);
        self.send(Payload::Empty);
    }

    /// `true` once the response has been sent; later middleware and the handler are skipped.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Controls whether `Connection: keep-alive` or `Connection: close` is written.
    pub fn set_keep_alive(&mut self, keep_alive: bool) -> &mut Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serializes the response into HTTP/1.1 wire format.
    ///
    /// Adds `Content-Type: text/plain; charset=utf-8` when the body is non-empty and no
    /// content type was set, then `Connection` and `Content-Length`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers.set("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.set("Connection", connection);
        self.headers.set("Content-Length", content_length.to_string());

        let reason = self.status.canonical_reason().unwrap_or("");
        let mut buf = BytesMut::with_capacity(128 + self.headers.len() * 64 + content_length);
        buf.put(format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), reason).as_bytes());
        self.headers.encode(&mut buf);
        buf.put(&b"\r\n"[..]);
        buf.put(self.body);

        buf
    }
}
