//! Bearer-credential gate.
//!
//! Compares the first `Authorization` value, byte for byte, against the one
//! configured [`Credential`]. A match passes straight through. Anything else
//! (wrong value, missing header) ends the request here with a `401` and a
//! warning; downstream never runs.
//!
//! Sits inside [`ErrorContainment`](super::ErrorContainment) and outside
//! [`RequestLogging`](super::RequestLogging): rejected requests never reach
//! the request log, and are not faults.

use http::StatusCode;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::config::Credential;
use crate::context::Context;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::response::ContentType;

use super::{Next, Stage};

/// Body sent with every `401`.
pub const UNAUTHORIZED_BODY: &str = r#"{"error":"Unauthorized"}"#;

/// The authentication stage. Stateless across requests.
#[derive(Debug, Clone, Default)]
pub struct Authentication {
    credential: Credential,
}

impl Authentication {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

impl Stage for Authentication {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let presented = ctx.request().and_then(|req| req.header("authorization"));
            if self.credential.matches(presented) {
                return next.run(ctx).await;
            }

            warn!(authorization = ?presented, "unauthorized request");

            ctx.set_status(StatusCode::UNAUTHORIZED);
            ctx.set_header("content-type", ContentType::Json.as_str());
            ctx.body_mut().write_all(UNAUTHORIZED_BODY.as_bytes()).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::Method;

    use crate::middleware::{BoxedStage, Endpoint};
    use crate::request::Request;

    /// Counts calls and answers 204.
    #[derive(Default)]
    struct Counting(Arc<AtomicUsize>);

    impl Endpoint for Counting {
        fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            ctx.set_status(StatusCode::NO_CONTENT);
            Box::pin(async { Ok(()) })
        }
    }

    /// Runs the stage with one `Authorization` header per value, in order.
    async fn run(authorization: &[&str]) -> (Context, usize) {
        let endpoint = Counting::default();
        let stages: Vec<BoxedStage> = vec![Arc::new(Authentication::default())];

        let mut req = Request::new(Method::GET, "/api/users");
        for value in authorization {
            req = req.with_header("Authorization", *value);
        }
        let mut ctx = Context::new(req);
        Next::new(&stages, &endpoint).run(&mut ctx).await.unwrap();
        (ctx, endpoint.0.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn matching_credential_passes_through() {
        let (ctx, calls) = run(&["Bearer secret-token-123"]).await;
        assert_eq!(calls, 1);
        assert_eq!(ctx.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let (ctx, calls) = run(&[]).await;
        assert_eq!(calls, 0);
        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ctx.header("content-type"), Some("application/json"));
        assert_eq!(ctx.body().as_bytes(), UNAUTHORIZED_BODY.as_bytes());
    }

    #[tokio::test]
    async fn comparison_is_exact() {
        for value in ["bearer secret-token-123", "Bearer secret-token-123 ", "secret-token-123", ""] {
            let (ctx, calls) = run(&[value]).await;
            assert_eq!(calls, 0, "{value:?} should be rejected");
            assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
        }

        // Only the first value counts.
        let (ctx, calls) = run(&["Bearer guessed", "Bearer secret-token-123"]).await;
        assert_eq!(calls, 0);
        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);

        let (ctx, calls) = run(&["Bearer secret-token-123", "Bearer guessed"]).await;
        assert_eq!(calls, 1);
        assert_eq!(ctx.status(), StatusCode::NO_CONTENT);
    }
}
