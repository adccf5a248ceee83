//! Fixed-order middleware pipeline.
//!
//! Every request goes through the same three stages, in this order, around
//! the router:
//!
//! 1. [`ErrorContainment`]: turns any escaped fault into a fixed `500`.
//! 2. [`Authentication`]: rejects anything without the configured credential.
//! 3. [`RequestLogging`]: logs the full request and response.
//!
//! The order is not configurable. Containment must be outermost to catch
//! faults from the other two; authentication must run before logging so
//! rejected requests never get their bodies buffered.

use std::sync::Arc;

use tracing::error;

use crate::config::Credential;
use crate::context::Context;
use crate::error::Error;
use crate::middleware::{
    Authentication, BoxedStage, Endpoint, ErrorContainment, Next, RequestLogging,
    containment,
};
use crate::request::Request;
use crate::router::Router;

/// The composed chain: stages plus the terminal endpoint.
///
/// Immutable once built; share it across connections behind an `Arc`.
pub struct Pipeline {
    stages: Vec<BoxedStage>,
    endpoint: Box<dyn Endpoint>,
}

impl Pipeline {
    pub fn new(credential: Credential, router: Router) -> Self {
        let stages: Vec<BoxedStage> = vec![
            Arc::new(ErrorContainment::new()),
            Arc::new(Authentication::new(credential)),
            Arc::new(RequestLogging::new()),
        ];
        Self { stages, endpoint: Box::new(router) }
    }

    /// Names of the stages, outermost first.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Runs `ctx` through every stage and the endpoint.
    pub async fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        Next::new(&self.stages, self.endpoint.as_ref()).run(ctx).await
    }

    /// Handles one request and returns the context holding its response.
    ///
    /// Always yields exactly one response. Containment catches faults inside
    /// the chain; this applies the same fallback if one ever escapes it.
    pub async fn handle(&self, request: Request) -> Context {
        let mut ctx = Context::new(request);
        if let Err(e) = self.run(&mut ctx).await {
            error!(error = %e, "fault escaped the pipeline");
            containment::contain(&mut ctx);
        }
        ctx
    }
}
