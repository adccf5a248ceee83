//! Middleware layer.
//!
//! A stage is one link in the chain. It gets the per-request [`Context`] and
//! a [`Next`] handle for the rest of the chain, and decides whether (and
//! when) the rest runs:
//!
//! ```text
//! ErrorContainment ─▶ Authentication ─▶ RequestLogging ─▶ Endpoint (Router)
//!        ◀──────────────── ◀──────────────── ◀─────────────────┘
//! ```
//!
//! Control flows outside-in, then back inside-out. Stages run strictly one
//! after another on the request's own task. There is no fan-out.
//!
//! # Faults
//!
//! `handle` returns `Result<(), Error>`. `Ok(())` means the context holds a
//! complete response. `Err` is a fault travelling outward; only
//! [`ErrorContainment`] stops it.

pub mod auth;
pub mod containment;
pub mod logging;

use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::handler::BoxFuture;

pub use auth::Authentication;
pub use containment::ErrorContainment;
pub use logging::{Phase, RequestLogging};

/// One link in the middleware chain.
pub trait Stage: Send + Sync + 'static {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Processes the request, calling `next.run(ctx)` at most once.
    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>>;
}

/// The innermost link: produces the substantive response.
pub trait Endpoint: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>>;
}

/// A type-erased stage shared across concurrent requests.
pub type BoxedStage = Arc<dyn Stage>;

/// The remainder of the chain after the current stage.
///
/// `run` consumes `self`, so downstream can be invoked at most once.
pub struct Next<'a> {
    stages: &'a [BoxedStage],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub(crate) fn new(stages: &'a [BoxedStage], endpoint: &'a dyn Endpoint) -> Self {
        Self { stages, endpoint }
    }

    /// Runs the next stage, or the endpoint once no stages remain.
    pub async fn run(self, ctx: &mut Context) -> Result<(), Error> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(ctx, Next::new(rest, self.endpoint)).await,
            None => self.endpoint.call(ctx).await,
        }
    }
}
