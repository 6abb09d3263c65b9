//! HTTP exceptions and the request-time error type.
//!
//! Handlers and middleware return [`Error`]. Its [`Error::Http`] variant carries an
//! [`HttpException`]: a status code plus a client-facing message, rendered by the
//! dispatcher as
//!
//! ```text
//! {"message": "...", "statusCode": 404}
//! ```
//!
//! Anything else is [`Error::Unexpected`]. The dispatcher logs those and, unless configured
//! otherwise, leaves the request unanswered.
//!
//! # Examples
//!
//! ```
//! use nanoroute::exception::{Error, ExceptionKind, HttpException};
//!
//! let err: Error = HttpException::not_found("no such user").into();
//! let http = err.as_http().unwrap();
//! assert_eq!(http.kind(), ExceptionKind::NotFound);
//! assert_eq!(http.status_code().as_u16(), 404);
//! assert_eq!(http.message(), "no such user");
//! ```

use thiserror::Error;

use crate::http::{Response, StatusCode};

/// Shorthand for the error type boxed inside [`Error::Unexpected`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

macro_rules! exception_kinds {
    ($( $kind:ident => $ctor:ident, $status:ident; )+) => {
        /// Which standard exception an [`HttpException`] is.
        ///
        /// [`ExceptionKind::Base`] covers exceptions built from an arbitrary status code
        /// with [`HttpException::new`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ExceptionKind {
            $( $kind, )+
            Base,
        }

        impl ExceptionKind {
            /// The fixed status code of a standard kind. `None` for [`ExceptionKind::Base`].
            pub fn status_code(self) -> Option<StatusCode> {
                match self {
                    $( Self::$kind => Some(StatusCode::$status), )+
                    Self::Base => None,
                }
            }

            fn from_status(status: StatusCode) -> Self {
                match status {
                    $( StatusCode::$status => Self::$kind, )+
                    _ => Self::Base,
                }
            }
        }

        impl HttpException {
            $(
                #[doc = concat!("`", stringify!($kind), "` with the status code it fixes.")]
                pub fn $ctor(message: impl Into<String>) -> Self {
                    Self {
                        kind: ExceptionKind::$kind,
                        status: StatusCode::$status,
                        message: message.into(),
                    }
                }
            )+
        }
    };
}

exception_kinds! {
    BadRequest => bad_request, BAD_REQUEST;
    Unauthorized => unauthorized, UNAUTHORIZED;
    Forbidden => forbidden, FORBIDDEN;
    NotFound => not_found, NOT_FOUND;
    MethodNotAllowed => method_not_allowed, METHOD_NOT_ALLOWED;
    NotAcceptable => not_acceptable, NOT_ACCEPTABLE;
    RequestTimeout => request_timeout, REQUEST_TIMEOUT;
    Conflict => conflict, CONFLICT;
    Gone => gone, GONE;
    PayloadTooLarge => payload_too_large, PAYLOAD_TOO_LARGE;
    UnsupportedMediaType => unsupported_media_type, UNSUPPORTED_MEDIA_TYPE;
    ImATeapot => im_a_teapot, IM_A_TEAPOT;
    UnprocessableEntity => unprocessable_entity, UNPROCESSABLE_ENTITY;
    InternalServerError => internal_server_error, INTERNAL_SERVER_ERROR;
    NotImplemented => not_implemented, NOT_IMPLEMENTED;
    BadGateway => bad_gateway, BAD_GATEWAY;
    ServiceUnavailable => service_unavailable, SERVICE_UNAVAILABLE;
    GatewayTimeout => gateway_timeout, GATEWAY_TIMEOUT;
    HttpVersionNotSupported => http_version_not_supported, HTTP_VERSION_NOT_SUPPORTED;
}

/// A client-facing failure with a fixed status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}: {message}")]
pub struct HttpException {
    kind: ExceptionKind,
    status: StatusCode,
    message: String,
}

impl HttpException {
    /// Builds an exception with any status code.
    ///
    /// The kind is inferred from `status`, falling back to [`ExceptionKind::Base`].
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            kind: ExceptionKind::from_status(status),
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The JSON body `{"message": ..., "statusCode": ...}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "message": self.message,
            "statusCode": self.status.as_u16(),
        })
    }

    /// Sets the status and sends the JSON body on an existing response.
    ///
    /// Headers already on `response` are kept.
    pub fn write_to(&self, response: &mut Response) {
        response.status(self.status);
        response.send(self.to_json());
    }

    /// Renders this exception as a finished JSON response with a matching status.
    pub fn into_response(self, keep_alive: bool) -> Response {
        let mut response = Response::new();
        response.set_keep_alive(keep_alive);
        self.write_to(&mut response);
        response
    }
}

/// The error type returned by handlers and middleware.
#[derive(Debug, Error)]
pub enum Error {
    /// Answered with a structured JSON error response.
    #[error(transparent)]
    Http(#[from] HttpException),

    /// Logged; the request gets no response unless the dispatcher is configured to send 500.
    #[error("unexpected error: {0}")]
    Unexpected(#[source] BoxError),
}

impl Error {
    /// Wraps any error as [`Error::Unexpected`].
    pub fn unexpected(err: impl Into<BoxError>) -> Self {
        Error::Unexpected(err.into())
    }

    /// The HTTP exception, if this error carries one.
    pub fn as_http(&self) -> Option<&HttpException> {
        match self {
            Error::Http(exception) => Some(exception),
            Error::Unexpected(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::unexpected(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::unexpected(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_its_fixed_code() {
        let table = [
            (HttpException::bad_request(""), 400),
            (HttpException::unauthorized(""), 401),
            (HttpException::forbidden(""), 403),
            (HttpException::not_found(""), 404),
            (HttpException::method_not_allowed(""), 405),
            (HttpException::not_acceptable(""), 406),
            (HttpException::request_timeout(""), 408),
            (HttpException::conflict(""), 409),
            (HttpException::gone(""), 410),
            (HttpException::payload_too_large(""), 413),
            (HttpException::unsupported_media_type(""), 415),
            (HttpException::im_a_teapot(""), 418),
            (HttpException::unprocessable_entity(""), 422),
            (HttpException::internal_server_error(""), 500),
            (HttpException::not_implemented(""), 501),
            (HttpException::bad_gateway(""), 502),
            (HttpException::service_unavailable(""), 503),
            (HttpException::gateway_timeout(""), 504),
            (HttpException::http_version_not_supported(""), 505),
        ];
        for (exception, code) in table {
            assert_eq!(exception.status_code().as_u16(), code, "{:?}", exception.kind());
            assert_eq!(exception.kind().status_code(), Some(exception.status_code()));
        }
    }

    #[test]
    fn base_constructor_infers_known_kinds() {
        let e = HttpException::new("gone", StatusCode::GONE);
        assert_eq!(e.kind(), ExceptionKind::Gone);

        let e = HttpException::new("slow down", StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(e.kind(), ExceptionKind::Base);
        assert_eq!(e.status_code().as_u16(), 429);
        assert_eq!(ExceptionKind::Base.status_code(), None);
    }

    #[test]
    fn json_body_uses_camel_case_status() {
        let body = HttpException::conflict("taken").to_json();
        assert_eq!(body, serde_json::json!({"message": "taken", "statusCode": 409}));
    }

    #[test]
    fn into_response_is_finished_json() {
        let response = HttpException::forbidden("nope").into_response(false);
        assert!(response.is_finished());
        assert!(!response.keep_alive());
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers().get("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["statusCode"], 403);
        assert_eq!(body["message"], "nope");
    }

    #[test]
    fn write_to_keeps_existing_headers() {
        let mut response = Response::new();
        response.header("Access-Control-Allow-Origin", "*");
        HttpException::unauthorized("who are you").write_to(&mut response);

        assert!(response.is_finished());
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get("access-control-allow-origin"), Some("*"));
        assert_eq!(response.headers().get("content-type"), Some("application/json"));
    }

    #[test]
    fn io_errors_are_unexpected() {
        let err: Error = std::io::Error::other("disk on fire").into();
        assert!(err.as_http().is_none());
        assert!(err.to_string().contains("disk on fire"));
    }
}
