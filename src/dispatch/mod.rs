//! The per-request dispatch engine.
//!
//! For each request [`Dispatcher`] walks a fixed sequence of states and never goes back:
//!
//! 1. **Receiving**: the body is read to the end (see [`body`](crate::body)).
//! 2. **Aggregated**: the body is attached, path parameters are reset, cookies are parsed.
//! 3. **Global middleware**: run in registration order.
//! 4. **Route resolution**: exact routes, then parameterized ones. No match answers `404`.
//! 5. **Route middleware**: the matched route's own chain, in order.
//! 6. **Handler**.
//! 7. **Responded** or **unanswered**.
//!
//! After every middleware the engine checks whether the response was finished; if so the
//! remaining states are skipped. An [`HttpException`] raised anywhere in states 3 to 6
//! becomes a JSON error response and ends the request. Any other error is logged and, by
//! default, the request is left unanswered.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::body;
use crate::config::AppConfig;
use crate::context::Context;
use crate::exception::{Error, HttpException};
use crate::http::{Method, Request, Response};
use crate::middleware::Flow;
use crate::router::Router;

/// How a dispatched request ended.
#[derive(Debug)]
pub enum Outcome {
    /// A response is ready to be written.
    Responded(Response),
    /// An unexpected error ended the request without a response.
    Unanswered(Error),
}

impl Outcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Outcome::Responded(response) => Some(response),
            Outcome::Unanswered(_) => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Outcome::Responded(response) => Some(response),
            Outcome::Unanswered(_) => None,
        }
    }

    pub fn is_responded(&self) -> bool {
        matches!(self, Outcome::Responded(_))
    }
}

/// Routes requests through middleware to handlers.
///
/// Cheap to clone; the router and configuration are shared and read-only.
///
/// # Examples
///
/// ```rust
/// use nanoroute::config::AppConfig;
/// use nanoroute::context::Context;
/// use nanoroute::dispatch::Dispatcher;
/// use nanoroute::http::Request;
/// use nanoroute::router::{HandlerResult, Router};
///
/// async fn greet(mut ctx: Context) -> HandlerResult {
///     let name = ctx.params().get("name").unwrap_or("stranger").to_owned();
///     ctx.response_mut().send(format!("Hello, {name}"));
///     Ok(ctx)
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut router = Router::new();
/// router.get("/greet/:name", greet).unwrap();
/// let dispatcher = Dispatcher::new(router, AppConfig::default());
///
/// let (request, _) = Request::parse(b"GET /greet/Ada HTTP/1.1\r\n\r\n").unwrap();
/// let response = dispatcher.handle(request).await.into_response().unwrap();
/// assert_eq!(&response.body()[..], b"Hello, Ada");
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
    config: Arc<AppConfig>,
}

impl Dispatcher {
    pub fn new(router: Router, config: AppConfig) -> Self {
        Self {
            router: Arc::new(router),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Reads the body from `body` to EOF, then dispatches the request.
    ///
    /// A body over [`AppConfig::max_body_bytes`] is answered with `413` before any
    /// middleware runs.
    pub async fn dispatch<R>(&self, request: Request, body: R) -> Outcome
    where
        R: AsyncRead + Unpin,
    {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.path().to_owned();
        let keep_alive = request.is_keep_alive();

        let outcome = match body::aggregate(body, self.config.max_body_bytes).await {
            Ok(bytes) => self.process(request.with_body(bytes)).await,
            Err(err) => {
                warn!(method = %method, path = %path, error = %err, "request body rejected");
                self.fail(err.into(), keep_alive)
            }
        };

        log_access(&method, &path, &outcome, started);
        outcome
    }

    /// Dispatches a request whose body is already attached.
    pub async fn handle(&self, request: Request) -> Outcome {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.path().to_owned();

        let outcome = self.process(request).await;

        log_access(&method, &path, &outcome, started);
        outcome
    }

    async fn process(&self, request: Request) -> Outcome {
        let keep_alive = request.is_keep_alive();
        let ctx = Context::new(request, Arc::clone(&self.config));

        let Some(limit) = self.config.request_timeout() else {
            return self.run(ctx).await;
        };

        match tokio::time::timeout(limit, self.run(ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout = ?limit, "request timed out");
                self.fail(
                    HttpException::request_timeout("Request timed out").into(),
                    keep_alive,
                )
            }
        }
    }

    async fn run(&self, ctx: Context) -> Outcome {
        let keep_alive = ctx.response().keep_alive();

        let mut ctx = match self.router.global_middleware().run(ctx).await {
            Flow::Continue(ctx) => ctx,
            Flow::Finished(response) => return Outcome::Responded(response),
            Flow::Failed(err) => return self.fail(err, keep_alive),
        };

        let resolved = self
            .router
            .resolve(ctx.request().method(), ctx.request().path());
        let Some((route, params)) = resolved else {
            debug!(path = %ctx.request().path(), "no route matched");
            HttpException::not_found("Not Found").write_to(ctx.response_mut());
            return Outcome::Responded(ctx.into_response());
        };
        ctx.request_mut().set_params(params);

        let ctx = match route.middleware_chain().run(ctx).await {
            Flow::Continue(ctx) => ctx,
            Flow::Finished(response) => return Outcome::Responded(response),
            Flow::Failed(err) => return self.fail(err, keep_alive),
        };

        match (route.handler())(ctx).await {
            Ok(ctx) => Outcome::Responded(ctx.into_response()),
            Err(err) => self.fail(err, keep_alive),
        }
    }

    fn fail(&self, err: Error, keep_alive: bool) -> Outcome {
        match err {
            Error::Http(exception) => {
                debug!(error = %exception, "answering with HTTP exception");
                Outcome::Responded(exception.into_response(keep_alive))
            }
            Error::Unexpected(source) => {
                error!(error = %source, "unhandled error while dispatching request");
                if self.config.respond_on_unexpected_error {
                    let exception = HttpException::internal_server_error("Internal Server Error");
                    Outcome::Responded(exception.into_response(keep_alive))
                } else {
                    Outcome::Unanswered(Error::Unexpected(source))
                }
            }
        }
    }
}

fn log_access(method: &Method, path: &str, outcome: &Outcome, started: Instant) {
    let duration = started.elapsed();
    match outcome {
        Outcome::Responded(response) => {
            info!(
                "{} {} - {} ({:?})",
                method,
                path,
                response.status_code().as_u16(),
                duration
            );
        }
        Outcome::Unanswered(_) => {
            info!("{} {} - unanswered ({:?})", method, path, duration);
        }
    }
}
