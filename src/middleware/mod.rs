//! Middleware chains and the built-in body middleware.
//!
//! A middleware has the same shape as a handler: an async function taking the
//! [`Context`] by value and handing it back. It may
//!
//! - **pass through** by returning `Ok(ctx)` untouched,
//! - **decorate** by editing the request or response before returning it,
//! - **short-circuit** by finishing the response (`send`, `redirect`, ...), after which no
//!   further middleware or handler runs for the request,
//! - **fail** by returning an [`Error`]. An [`HttpException`] becomes a JSON error
//!   response.
//!
//! ```rust
//! use nanoroute::context::Context;
//! use nanoroute::exception::HttpException;
//! use nanoroute::router::HandlerResult;
//!
//! async fn require_token(ctx: Context) -> HandlerResult {
//!     match ctx.request().header("authorization") {
//!         Some(_) => Ok(ctx),
//!         None => Err(HttpException::unauthorized("missing token").into()),
//!     }
//! }
//! ```

use tracing::debug;

use crate::context::Context;
use crate::exception::{Error, HttpException};
use crate::http::{Body, Method, Response};
use crate::router::{HandlerResult, Handler, IntoHandler, erase};

/// How a chain run ended.
pub(crate) enum Flow {
    /// Every middleware passed the context on.
    Continue(Context),
    /// A middleware finished the response.
    Finished(Response),
    /// A middleware returned an error.
    Failed(Error),
}

/// An ordered list of named middleware.
#[derive(Clone, Default)]
pub struct Chain {
    entries: Vec<(String, Handler)>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, middleware: impl IntoHandler) {
        self.entries.push((name.into(), erase(middleware)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// The first name that appears more than once, if any.
    pub(crate) fn duplicate_name(&self) -> Option<&str> {
        self.entries.iter().enumerate().find_map(|(i, (name, _))| {
            self.entries[..i]
                .iter()
                .any(|(earlier, _)| earlier == name)
                .then_some(name.as_str())
        })
    }

    /// Runs each middleware in order, awaiting one before starting the next.
    ///
    /// Stops at the first middleware that finishes the response or fails.
    pub(crate) async fn run(&self, mut ctx: Context) -> Flow {
        for (name, middleware) in &self.entries {
            debug!(middleware = %name, "running middleware");
            ctx = match middleware(ctx).await {
                Ok(ctx) => ctx,
                Err(err) => {
                    debug!(middleware = %name, error = %err, "middleware failed");
                    return Flow::Failed(err);
                }
            };
            if ctx.response().is_finished() {
                debug!(middleware = %name, "middleware finished the response");
                return Flow::Finished(ctx.into_response());
            }
        }
        Flow::Continue(ctx)
    }
}

/// Decodes the request body as JSON into [`Body::Json`].
///
/// GET requests are skipped. Bodies that are already JSON are left alone.
///
/// # Errors
///
/// `400 Bad Request` with `Error parsing JSON: <reason>` when the body is not valid JSON.
pub async fn json(mut ctx: Context) -> HandlerResult {
    if *ctx.request().method() == Method::Get {
        return Ok(ctx);
    }

    let parsed = match ctx.request().body() {
        Body::Json(_) => return Ok(ctx),
        Body::Raw(bytes) => serde_json::from_slice(bytes),
        Body::Text(text) => serde_json::from_str(text),
    };
    let value = parsed
        .map_err(|e| HttpException::bad_request(format!("Error parsing JSON: {e}")))?;

    ctx.request_mut().set_body(Body::Json(value));
    Ok(ctx)
}

/// Decodes the request body as UTF-8 into [`Body::Text`].
///
/// GET requests are skipped.
///
/// # Errors
///
/// `400 Bad Request` with `Error parsing body as text: <reason>` when the body is not
/// UTF-8.
pub async fn text(mut ctx: Context) -> HandlerResult {
    if *ctx.request().method() == Method::Get {
        return Ok(ctx);
    }

    let decoded = match ctx.request_mut().take_body() {
        Body::Raw(bytes) => String::from_utf8(bytes.to_vec()).map_err(|e| {
            HttpException::bad_request(format!("Error parsing body as text: {e}"))
        })?,
        Body::Text(text) => text,
        Body::Json(value) => value.to_string(),
    };

    ctx.request_mut().set_body(Body::Text(decoded));
    Ok(ctx)
}
