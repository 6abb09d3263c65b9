//! # nanoroute
//!
//! A small async HTTP/1.1 routing and middleware-dispatch engine.
//!
//! Routes are registered on a [`Router`] by method and path. Paths may carry `:name`
//! parameters. Every request runs the global middleware, then the matched route's own
//! middleware, then its handler. Any step can finish the response early or fail with a
//! typed [`HttpException`], which is answered as `{"message": ..., "statusCode": ...}`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nanoroute::{AppConfig, Context, Dispatcher, HandlerResult, Router, Server, middleware};
//! use nanoroute::exception::HttpException;
//!
//! async fn greet(mut ctx: Context) -> HandlerResult {
//!     let name = ctx.params().get("name").unwrap_or_default().to_owned();
//!     ctx.response_mut().send(format!("Hello, {name}"));
//!     Ok(ctx)
//! }
//!
//! async fn echo(mut ctx: Context) -> HandlerResult {
//!     let body = ctx.request_mut().take_body();
//!     ctx.response_mut().send(body);
//!     Ok(ctx)
//! }
//!
//! async fn teapot(_ctx: Context) -> HandlerResult {
//!     Err(HttpException::im_a_teapot("short and stout").into())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     router.use_middleware(middleware::json);
//!     router.get("/greet/:name", greet)?;
//!     router.post("/echo", echo)?;
//!     router.get("/coffee", teapot)?;
//!
//!     let config = AppConfig::default();
//!     let server = Server::bind(&config.address).await?;
//!     server.run(Dispatcher::new(router, config)).await?;
//!     Ok(())
//! }
//! ```

pub mod body;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod exception;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;
pub mod statics;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::AppConfig;
pub use context::{Context, PathParams};
pub use dispatch::{Dispatcher, Outcome};
pub use exception::{Error, HttpException};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{HandlerResult, Route, Router, mount};
pub use server::{Server, ServerError};
