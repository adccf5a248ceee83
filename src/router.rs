//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. The router is the
//! pipeline's terminal [`Endpoint`]: the innermost link, the one that
//! actually produces a response.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Endpoint;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup and hand it to [`Pipeline::new`](crate::Pipeline::new).
/// Each [`Router::on`] call returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use porter::{Method, Request, Response, Router};
    /// # async fn list_users(_: Request) -> Response { Response::text("") }
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET, "/api/users",      list_users)
    ///     .on(Method::GET, "/api/users/{id}", get_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`. Routes are fixed at startup.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl Endpoint for Router {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let mut req = ctx.take_request().ok_or(Error::RequestConsumed)?;

            let response = match self.lookup(req.method(), req.path()) {
                Some((handler, params)) => {
                    req.params = params;
                    handler.call(req).await?
                }
                None => Response::status(StatusCode::NOT_FOUND),
            };

            response.write_to(ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::request::Request;

    async fn echo_id(req: Request) -> Response {
        Response::text(req.param("id").unwrap_or("none").to_owned())
    }

    #[tokio::test]
    async fn routes_by_method_and_path_with_params() {
        let router = Router::new().on(Method::GET, "/api/users/{id}", echo_id);

        let mut ctx = Context::new(Request::new(Method::GET, "/api/users/7"));
        router.call(&mut ctx).await.unwrap();
        assert_eq!(ctx.status(), StatusCode::OK);
        assert_eq!(ctx.body().as_bytes(), b"7");
        assert!(ctx.request().is_none());
    }

    #[tokio::test]
    async fn unmatched_route_is_not_found() {
        let router = Router::new().on(Method::GET, "/api/users/{id}", echo_id);

        let mut ctx = Context::new(Request::new(Method::DELETE, "/api/users/7"));
        router.call(&mut ctx).await.unwrap();
        assert_eq!(ctx.status(), StatusCode::NOT_FOUND);
        assert!(ctx.body().is_empty());
    }

    #[tokio::test]
    async fn second_call_faults_without_a_request() {
        let router = Router::new().on(Method::GET, "/api/users/{id}", echo_id);

        let mut ctx = Context::new(Request::new(Method::GET, "/api/users/1"));
        router.call(&mut ctx).await.unwrap();
        let err = router.call(&mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::RequestConsumed));
    }
}
