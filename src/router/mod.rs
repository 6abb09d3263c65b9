//! Service registry: route registration, validation, mounting, and lookup.
//!
//! [`Router`] keeps three ordered collections:
//!
//! | Collection           | Contents                                   | Lookup                        |
//! |----------------------|--------------------------------------------|-------------------------------|
//! | exact routes         | paths without `:name` segments, `/users`   | string equality               |
//! | parameterized routes | paths with `:name` segments, `/users/:id`  | segment walk with binding     |
//! | global middleware    | functions run for every request            | registration order            |
//!
//! Lookup always tries every exact route before any parameterized one, so `/users/me`
//! wins over `/users/:id` regardless of registration order. Within a collection the first
//! registered match wins.
//!
//! Registration is append-only and happens before the router is handed to a
//! [`Dispatcher`](crate::dispatch::Dispatcher).

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

use crate::context::{Context, PathParams};
use crate::exception::Error;
use crate::http::Method;
use crate::middleware::Chain;

pub mod matcher;

use matcher::Pattern;

/// What a handler or middleware gives back: the context to continue with, or an error.
pub type HandlerResult = Result<Context, Error>;

/// A boxed, `Send` future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Type-erased, heap-allocated async function over a [`Context`].
///
/// Route handlers and middleware share this shape. Stored behind `Arc` so routes can be
/// cloned (for [`mount`]) without copying closures. You never construct this directly;
/// anything implementing [`IntoHandler`] is accepted.
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture<HandlerResult> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = HandlerResult> + Send` that is also
/// `Send + Sync + 'static` implements this trait through the blanket impl below, including
/// plain `async fn(Context) -> HandlerResult` items.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> BoxFuture<HandlerResult>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture<HandlerResult> {
        Box::pin((self)(ctx))
    }
}

pub(crate) fn erase(handler: impl IntoHandler) -> Handler {
    Arc::new(move |ctx| handler.call(ctx))
}

/// Rejected route registrations. These are configuration mistakes, reported before any
/// request is served.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("invalid HTTP method: {0} (expected GET, POST, PATCH or DELETE)")]
    InvalidMethod(Method),

    #[error("route path must not be empty")]
    EmptyPath,

    #[error("route path `{0}` must begin with `/`")]
    MissingLeadingSlash(String),

    #[error("middleware `{name}` is registered twice on {method} {path}")]
    DuplicateMiddleware {
        method: Method,
        path: String,
        name: String,
    },
}

/// A service definition: method, path, handler, and its own ordered middleware.
///
/// # Examples
///
/// ```rust
/// use nanoroute::context::Context;
/// use nanoroute::router::{HandlerResult, Route};
///
/// async fn show(mut ctx: Context) -> HandlerResult {
///     let id = ctx.params().get("id").unwrap_or_default().to_owned();
///     ctx.response_mut().send(id);
///     Ok(ctx)
/// }
///
/// async fn audit(ctx: Context) -> HandlerResult {
///     Ok(ctx)
/// }
///
/// let route = Route::get("/items/:id", show).middleware("audit", audit);
/// assert_eq!(route.path(), "/items/:id");
/// assert_eq!(route.middleware_names().collect::<Vec<_>>(), ["audit"]);
/// ```
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: String,
    handler: Handler,
    middleware: Chain,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler: impl IntoHandler) -> Self {
        Self {
            method,
            path: path.into(),
            handler: erase(handler),
            middleware: Chain::new(),
        }
    }

    pub fn get(path: impl Into<String>, handler: impl IntoHandler) -> Self {
        Self::new(Method::Get, path, handler)
    }

    pub fn post(path: impl Into<String>, handler: impl IntoHandler) -> Self {
        Self::new(Method::Post, path, handler)
    }

    pub fn patch(path: impl Into<String>, handler: impl IntoHandler) -> Self {
        Self::new(Method::Patch, path, handler)
    }

    pub fn delete(path: impl Into<String>, handler: impl IntoHandler) -> Self {
        Self::new(Method::Delete, path, handler)
    }

    /// Appends a named middleware that runs only for this route, after global middleware
    /// and before the handler, in the order added.
    #[must_use]
    pub fn middleware(mut self, name: impl Into<String>, middleware: impl IntoHandler) -> Self {
        self.middleware.push(name, middleware);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn middleware_names(&self) -> impl Iterator<Item = &str> {
        self.middleware.names()
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }

    pub(crate) fn middleware_chain(&self) -> &Chain {
        &self.middleware
    }

    fn validate(&self) -> Result<(), RegistrationError> {
        if !self.method.is_routable() {
            return Err(RegistrationError::InvalidMethod(self.method.clone()));
        }
        if self.path.is_empty() {
            return Err(RegistrationError::EmptyPath);
        }
        if !self.path.starts_with('/') {
            return Err(RegistrationError::MissingLeadingSlash(self.path.clone()));
        }
        if let Some(name) = self.middleware.duplicate_name() {
            return Err(RegistrationError::DuplicateMiddleware {
                method: self.method.clone(),
                path: self.path.clone(),
                name: name.to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("middleware", &self.middleware.names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Joins `prefix` and `path`, collapsing repeated and trailing slashes.
///
/// An empty prefix or `/` leaves `path` untouched.
fn join_prefix(prefix: &str, path: &str) -> String {
    if prefix.is_empty() || prefix == "/" {
        return path.to_owned();
    }

    let joined = format!("{prefix}{path}");
    let segments: Vec<&str> = joined.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Rewrites every route path to live under `prefix`.
///
/// The result can be mounted again under another prefix, so route groups nest:
///
/// ```rust
/// use nanoroute::context::Context;
/// use nanoroute::router::{mount, HandlerResult, Route};
///
/// async fn list(ctx: Context) -> HandlerResult { Ok(ctx) }
///
/// let users = mount(vec![Route::get("/users/", list)], "v1");
/// let api = mount(users, "/api//");
/// assert_eq!(api[0].path(), "/api/v1/users");
/// ```
pub fn mount(routes: Vec<Route>, prefix: &str) -> Vec<Route> {
    routes
        .into_iter()
        .map(|mut route| {
            route.path = join_prefix(prefix, &route.path);
            route
        })
        .collect()
}

// A route that passed validation, with its path compiled for matching.
struct Registered {
    route: Route,
    pattern: Pattern,
}

/// The service registry.
///
/// # Examples
///
/// ```rust
/// use nanoroute::context::Context;
/// use nanoroute::router::{HandlerResult, Route, Router};
///
/// async fn ping(mut ctx: Context) -> HandlerResult {
///     ctx.response_mut().send("pong");
///     Ok(ctx)
/// }
///
/// let mut router = Router::new();
/// router.create_service(Route::get("/ping", ping)).unwrap();
/// router.get("/items/:id", ping).unwrap();
/// assert_eq!(router.len(), 2);
/// ```
#[derive(Default)]
pub struct Router {
    exact: Vec<Registered>,
    parameterized: Vec<Registered>,
    global: Chain,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `route` and appends it to the exact or parameterized collection.
    ///
    /// # Errors
    ///
    /// [`RegistrationError`] when the method is not GET, POST, PATCH or DELETE, the path is
    /// empty or relative, or two route middleware share a name.
    pub fn create_service(&mut self, route: Route) -> Result<(), RegistrationError> {
        route.validate()?;

        info!(method = %route.method, path = %route.path, "service registered");

        let pattern = Pattern::parse(&route.path);
        let registered = Registered { route, pattern };
        if registered.pattern.is_parameterized() {
            self.parameterized.push(registered);
        } else {
            self.exact.push(registered);
        }
        Ok(())
    }

    /// Rewrites `routes` under `prefix` (see [`mount`]) and, when `register` is set,
    /// registers each rewritten route.
    ///
    /// Returns the rewritten routes so the group can be nested further.
    pub fn mount(
        &mut self,
        routes: Vec<Route>,
        prefix: Option<&str>,
        register: bool,
    ) -> Result<Vec<Route>, RegistrationError> {
        let routes = mount(routes, prefix.unwrap_or_default());
        if register {
            for route in &routes {
                self.create_service(route.clone())?;
            }
        }
        Ok(routes)
    }

    /// Appends a global middleware. Global middleware run for every request, in the order
    /// they were added, before route resolution.
    pub fn use_middleware(&mut self, middleware: impl IntoHandler) {
        let name = format!("global#{}", self.global.len());
        self.global.push(name, middleware);
    }

    pub fn get(&mut self, path: &str, handler: impl IntoHandler) -> Result<(), RegistrationError> {
        self.create_service(Route::get(path, handler))
    }

    pub fn post(&mut self, path: &str, handler: impl IntoHandler) -> Result<(), RegistrationError> {
        self.create_service(Route::post(path, handler))
    }

    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) -> Result<(), RegistrationError> {
        self.create_service(Route::patch(path, handler))
    }

    pub fn delete(
        &mut self,
        path: &str,
        handler: impl IntoHandler,
    ) -> Result<(), RegistrationError> {
        self.create_service(Route::delete(path, handler))
    }

    /// Finds the route for `method` and `path`: exact routes first, then parameterized.
    ///
    /// Returns the route and its bound parameters (empty for exact routes).
    pub fn resolve(&self, method: &Method, path: &str) -> Option<(&Route, PathParams)> {
        let exact = self
            .exact
            .iter()
            .find(|r| r.route.method == *method && r.route.path == path);
        if let Some(registered) = exact {
            return Some((&registered.route, PathParams::new()));
        }

        self.parameterized.iter().find_map(|r| {
            if r.route.method != *method {
                return None;
            }
            r.pattern.matches(path).map(|params| (&r.route, params))
        })
    }

    pub(crate) fn global_middleware(&self) -> &Chain {
        &self.global
    }

    /// Total number of registered routes.
    pub fn len(&self) -> usize {
        self.exact.len() + self.parameterized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn exact_routes(&self) -> impl Iterator<Item = &Route> {
        self.exact.iter().map(|r| &r.route)
    }

    pub fn parameterized_routes(&self) -> impl Iterator<Item = &Route> {
        self.parameterized.iter().map(|r| &r.route)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("exact", &self.exact_routes().collect::<Vec<_>>())
            .field("parameterized", &self.parameterized_routes().collect::<Vec<_>>())
            .field("global_middleware", &self.global.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(ctx: Context) -> HandlerResult {
        Ok(ctx)
    }

    fn paths(routes: &[Route]) -> Vec<&str> {
        routes.iter().map(Route::path).collect()
    }

    // ── create_service ────────────────────────────────────────────────────────

    #[test]
    fn router_starts_empty() {
        let router = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn routes_are_classified_by_path() {
        let mut router = Router::new();
        router.get("/users", noop).unwrap();
        router.get("/users/:id", noop).unwrap();
        router.post("/users/:id/posts", noop).unwrap();
        router.delete("/a/:", noop).unwrap();

        let exact: Vec<_> = router.exact_routes().map(Route::path).collect();
        let named: Vec<_> = router.parameterized_routes().map(Route::path).collect();
        assert_eq!(exact, ["/users", "/a/:"]);
        assert_eq!(named, ["/users/:id", "/users/:id/posts"]);
        assert_eq!(router.len(), 4);
    }

    #[test]
    fn unsupported_methods_are_rejected() {
        let mut router = Router::new();
        let err = router
            .create_service(Route::new(Method::Put, "/x", noop))
            .unwrap_err();
        assert_eq!(err, RegistrationError::InvalidMethod(Method::Put));
        assert!(router.is_empty());
    }

    #[test]
    fn paths_must_be_absolute() {
        let mut router = Router::new();
        assert_eq!(router.get("", noop), Err(RegistrationError::EmptyPath));
        assert_eq!(
            router.get("users", noop),
            Err(RegistrationError::MissingLeadingSlash("users".into()))
        );
    }

    #[test]
    fn duplicate_route_middleware_names_are_rejected() {
        let mut router = Router::new();
        let route = Route::post("/x", noop)
            .middleware("auth", noop)
            .middleware("auth", noop);
        assert!(matches!(
            router.create_service(route),
            Err(RegistrationError::DuplicateMiddleware { name, .. }) if name == "auth"
        ));
    }

    // ── mount ─────────────────────────────────────────────────────────────────

    #[test]
    fn mount_under_root_is_a_no_op() {
        let routes = vec![Route::get("/a/", noop), Route::get("/b//c", noop)];
        let routes = mount(routes, "/");
        assert_eq!(paths(&routes), ["/a/", "/b//c"]);
        let routes = mount(routes, "");
        assert_eq!(paths(&routes), ["/a/", "/b//c"]);
    }

    #[test]
    fn mount_normalizes_slashes() {
        let routes = mount(
            vec![Route::get("/", noop), Route::get("//list/", noop)],
            "/api/",
        );
        assert_eq!(paths(&routes), ["/api", "/api/list"]);
    }

    #[test]
    fn mount_nests() {
        let inner = mount(vec![Route::get("/:id", noop)], "/users");
        let outer = mount(inner, "/v2");
        assert_eq!(paths(&outer), ["/v2/users/:id"]);
    }

    #[test]
    fn router_mount_registers_when_asked() {
        let mut router = Router::new();
        let group = router
            .mount(vec![Route::get("/ping", noop)], Some("/health"), false)
            .unwrap();
        assert!(router.is_empty());

        router.mount(group, Some("/internal"), true).unwrap();
        let registered: Vec<_> = router.exact_routes().map(Route::path).collect();
        assert_eq!(registered, ["/internal/health/ping"]);
    }

    #[test]
    fn router_mount_without_prefix_keeps_paths() {
        let mut router = Router::new();
        let routes = router
            .mount(vec![Route::get("/x", noop)], None, true)
            .unwrap();
        assert_eq!(paths(&routes), ["/x"]);
        assert_eq!(router.len(), 1);
    }

    // ── resolve ───────────────────────────────────────────────────────────────

    #[test]
    fn exact_routes_win_over_parameterized() {
        let mut router = Router::new();
        router.get("/users/:id", noop).unwrap();
        router.get("/users/me", noop).unwrap();

        let (route, params) = router.resolve(&Method::Get, "/users/me").unwrap();
        assert_eq!(route.path(), "/users/me");
        assert!(params.is_empty());
    }

    #[test]
    fn method_must_match() {
        let mut router = Router::new();
        router.get("/users", noop).unwrap();
        router.get("/users/:id", noop).unwrap();
        assert!(router.resolve(&Method::Post, "/users").is_none());
        assert!(router.resolve(&Method::Delete, "/users/1").is_none());
    }

    #[test]
    fn failed_candidates_do_not_leak_params() {
        let mut router = Router::new();
        router.get("/a/:x/b", noop).unwrap();
        router.get("/a/:y/c", noop).unwrap();

        let (route, params) = router.resolve(&Method::Get, "/a/1/c").unwrap();
        assert_eq!(route.path(), "/a/:y/c");
        assert_eq!(params.get("y"), Some("1"));
        assert_eq!(params.get("x"), None);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn first_registered_match_wins() {
        let mut router = Router::new();
        router.get("/p/:first", noop).unwrap();
        router.get("/p/:second", noop).unwrap();
        let (_, params) = router.resolve(&Method::Get, "/p/1").unwrap();
        assert_eq!(params.get("first"), Some("1"));
    }

    #[test]
    fn use_middleware_keeps_order() {
        let mut router = Router::new();
        router.use_middleware(noop);
        router.use_middleware(noop);
        let names: Vec<_> = router.global_middleware().names().collect();
        assert_eq!(names, ["global#0", "global#1"]);
    }
}
