//! Outermost failure boundary.
//!
//! Everything downstream runs inside this stage. Whatever escapes, whether an
//! `Err` from a stage or handler or a panic, is logged and replaced with a
//! fixed `500`. Partial response state is thrown away first, so the caller
//! never sees half of a handler's output glued to the error body.
//!
//! No retries, no error-specific status mapping, no re-raising. Handlers that
//! want a structured 4xx/5xx must return it as a normal response.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::StatusCode;
use tracing::error;

use crate::body::ReplayBuffer;
use crate::context::Context;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::response::ContentType;

use super::{Next, Stage};

/// Body sent with every contained fault.
pub const INTERNAL_ERROR_BODY: &str = "An unexpected error occurred.";

/// The error-containment stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorContainment;

impl ErrorContainment {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for ErrorContainment {
    fn name(&self) -> &'static str {
        "error-containment"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            // The downstream future (and any sink guard it holds) is dropped
            // at the end of this statement, before `ctx` is touched again.
            let outcome = AssertUnwindSafe(next.run(ctx)).catch_unwind().await;

            let fault = match outcome {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panic: {}", panic_message(panic.as_ref())),
            };

            error!(%fault, "unhandled fault, responding with 500");
            contain(ctx);
            Ok(())
        })
    }
}

/// Replaces whatever is in `ctx` with the fixed `500` response.
pub(crate) fn contain(ctx: &mut Context) {
    ctx.reset_response();
    ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    ctx.set_header("content-type", ContentType::Text.as_str());
    ctx.replace_body(ReplayBuffer::from(INTERNAL_ERROR_BODY));
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string payload>"
    }
}
