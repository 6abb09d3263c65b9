//! Minimal nanoroute application.
//!
//! ```text
//! cargo run --example hello_world [config.toml]
//!
//! curl localhost:3000/greet/Ada
//! curl -X POST localhost:3000/api/v1/echo -d '{"a":1}'
//! curl localhost:3000/api/v1/admin            # 401 from route middleware
//! ```

use nanoroute::exception::HttpException;
use nanoroute::router::mount;
use nanoroute::{AppConfig, Context, Dispatcher, HandlerResult, Route, Router, Server, middleware};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn greet(mut ctx: Context) -> HandlerResult {
    let name = ctx.params().get("name").unwrap_or_default().to_owned();
    ctx.response_mut().send(format!("Hello, {name}"));
    Ok(ctx)
}

async fn echo(mut ctx: Context) -> HandlerResult {
    let body = ctx.request_mut().take_body();
    ctx.response_mut().send(body);
    Ok(ctx)
}

async fn require_token(ctx: Context) -> HandlerResult {
    match ctx.request().header("authorization") {
        Some(_) => Ok(ctx),
        None => Err(HttpException::unauthorized("missing token").into()),
    }
}

async fn admin(mut ctx: Context) -> HandlerResult {
    ctx.response_mut().send(serde_json::json!({ "admin": true }));
    Ok(ctx)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nanoroute=debug,hello_world=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let mut router = Router::new();
    router.use_middleware(middleware::json);
    router.get("/greet/:name", greet)?;

    let api = mount(
        vec![
            Route::post("/echo", echo),
            Route::get("/admin", admin).middleware("auth", require_token),
        ],
        "/v1",
    );
    router.mount(api, Some("/api"), true)?;

    let server = Server::bind(&config.address).await?;
    tracing::info!(address = %server.local_addr(), "hello_world ready");
    server.run(Dispatcher::new(router, config)).await?;
    Ok(())
}
