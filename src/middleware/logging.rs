//! Full request/response logging.
//!
//! Logs the whole inbound request, body included, before anything downstream
//! runs, and the whole outbound response after it finishes, without changing
//! a byte of either.
//!
//! # Request side
//!
//! The request body is a single-pass stream. The stage buffers it, reads it
//! for the log entry, and rewinds it, so the handler still reads it from the
//! first byte.
//!
//! # Response side
//!
//! ```text
//! ctx.body (transport sink) ──swap──▶ saved in CaptureGuard
//! fresh ReplayBuffer        ──swap──▶ ctx.body   ◀── handler writes here
//!                 downstream returns Ok
//! capture ◀──restore── ctx.body ◀── saved sink
//! capture.rewind → read for the log → rewind → copy into ctx.body
//! ```
//!
//! The guard puts the saved sink back on every exit path. If downstream
//! faults, panics, or the whole future is dropped, the capture is discarded,
//! the phase becomes [`Phase::Faulted`], and no response entry is logged.
//! The fault itself is left for the containment stage.

use std::ops::{Deref, DerefMut};

use bytes::Bytes;
use tracing::info;

use crate::body::{Body, ReplayBuffer};
use crate::context::Context;
use crate::error::Error;
use crate::handler::BoxFuture;

use super::{Next, Stage};

/// How far the logging stage got with the current request.
///
/// Moves strictly forward through
/// `Idle → RequestCaptured → DownstreamRunning → ResponseCaptured → Flushed`,
/// or jumps to `Faulted` from wherever it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    RequestCaptured,
    DownstreamRunning,
    ResponseCaptured,
    Flushed,
    Faulted,
}

/// The request/response logging stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogging;

impl RequestLogging {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for RequestLogging {
    fn name(&self) -> &'static str {
        "request-logging"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            if ctx.request().is_none() {
                ctx.set_phase(Phase::Faulted);
                return Err(Error::RequestConsumed);
            }
            let req = ctx.request_mut().ok_or(Error::RequestConsumed)?;
            let body = match capture_request_body(req.body_mut()).await {
                Ok(body) => body,
                Err(e) => {
                    ctx.set_phase(Phase::Faulted);
                    return Err(e);
                }
            };

            info!(
                method = %req.method(),
                path = %req.path(),
                headers = ?req.headers(),
                body = %String::from_utf8_lossy(&body),
                "incoming request"
            );
            ctx.set_phase(Phase::RequestCaptured);

            let mut guard = CaptureGuard::install(ctx);
            next.run(&mut guard).await?;
            let capture = guard.restore();
            ctx.set_phase(Phase::ResponseCaptured);

            if let Err(e) = log_and_flush(ctx, capture).await {
                ctx.set_phase(Phase::Faulted);
                return Err(e);
            }
            ctx.set_phase(Phase::Flushed);
            Ok(())
        })
    }
}

/// Logs what downstream wrote, then copies it into the real sink.
async fn log_and_flush(ctx: &mut Context, mut capture: ReplayBuffer) -> Result<(), Error> {
    capture.rewind();
    let logged = capture.read_remaining().await?;
    capture.rewind();

    info!(
        status = ctx.status().as_u16(),
        body = %String::from_utf8_lossy(&logged),
        "outgoing response"
    );

    tokio::io::copy(&mut capture, ctx.body_mut()).await?;
    Ok(())
}

/// Buffers the body, reads all of it, and rewinds it for the next reader.
async fn capture_request_body(body: &mut Body) -> Result<Bytes, Error> {
    body.enable_buffering().await?;
    let bytes = body.read_to_end().await?;
    body.rewind()?;
    Ok(bytes)
}

/// Holds the real response sink while a temporary one is installed.
struct CaptureGuard<'a> {
    ctx: &'a mut Context,
    saved: Option<ReplayBuffer>,
}

impl<'a> CaptureGuard<'a> {
    fn install(ctx: &'a mut Context) -> Self {
        let saved = ctx.replace_body(ReplayBuffer::new());
        ctx.set_phase(Phase::DownstreamRunning);
        Self { ctx, saved: Some(saved) }
    }

    /// Puts the real sink back and returns what downstream wrote.
    fn restore(mut self) -> ReplayBuffer {
        match self.saved.take() {
            Some(saved) => self.ctx.replace_body(saved),
            None => ReplayBuffer::new(),
        }
    }
}

impl Deref for CaptureGuard<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for CaptureGuard<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.ctx.replace_body(saved);
            self.ctx.set_phase(Phase::Faulted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::Mutex;

    use http::{Method, StatusCode};
    use tokio::io::AsyncWriteExt;

    use crate::middleware::{BoxedStage, Endpoint};
    use crate::request::Request;

    /// Records the request body it saw, then echoes it back.
    #[derive(Default)]
    struct Echo {
        seen: Mutex<Option<Bytes>>,
        fail: bool,
    }

    impl Endpoint for Echo {
        fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
            Box::pin(async move {
                let mut req = ctx.take_request().ok_or(Error::RequestConsumed)?;
                let body = req.bytes().await?;
                *self.seen.lock().unwrap() = Some(body.clone());

                ctx.set_status(StatusCode::CREATED);
                ctx.body_mut().write_all(&body).await?;
                if self.fail {
                    return Err(Error::Handler("boom".into()));
                }
                Ok(())
            })
        }
    }

    async fn run(endpoint: &Echo, body: &'static str) -> (Context, Result<(), Error>) {
        let stages: Vec<BoxedStage> = vec![Arc::new(RequestLogging::new())];
        let req = Request::new(Method::POST, "/api/users").with_body(body);
        let mut ctx = Context::new(req);
        let result = Next::new(&stages, endpoint).run(&mut ctx).await;
        (ctx, result)
    }

    #[tokio::test]
    async fn handler_reads_full_body_and_response_reaches_real_sink() {
        let endpoint = Echo::default();
        let (ctx, result) = run(&endpoint, r#"{"name":"dave"}"#).await;

        result.unwrap();
        assert_eq!(endpoint.seen.lock().unwrap().as_deref(), Some(&br#"{"name":"dave"}"#[..]));
        assert_eq!(ctx.status(), StatusCode::CREATED);
        assert_eq!(ctx.body().as_bytes(), br#"{"name":"dave"}"#);
        assert_eq!(ctx.phase(), Phase::Flushed);
    }

    #[tokio::test]
    async fn fault_restores_original_sink_and_propagates() {
        let endpoint = Echo { fail: true, ..Echo::default() };
        let (ctx, result) = run(&endpoint, "partial").await;

        assert!(matches!(result, Err(Error::Handler(_))));
        assert_eq!(ctx.phase(), Phase::Faulted);
        // the handler's bytes went to the discarded capture, not the real sink
        assert!(ctx.body().is_empty());
    }

    #[tokio::test]
    async fn dropped_future_restores_original_sink() {
        struct Hang;
        impl Endpoint for Hang {
            fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
                Box::pin(async move {
                    ctx.body_mut().write_all(b"never flushed").await?;
                    std::future::pending::<()>().await;
                    Ok(())
                })
            }
        }

        let stages: Vec<BoxedStage> = vec![Arc::new(RequestLogging::new())];
        let mut ctx = Context::new(Request::new(Method::GET, "/slow"));
        ctx.body_mut().write_all(b"sentinel").await.unwrap();

        let run = Next::new(&stages, &Hang).run(&mut ctx);
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), run).await;
        assert!(timed_out.is_err());

        assert_eq!(ctx.body().as_bytes(), b"sentinel");
        assert_eq!(ctx.phase(), Phase::Faulted);
    }

    #[tokio::test]
    async fn consumed_request_is_a_fault() {
        let stages: Vec<BoxedStage> = vec![Arc::new(RequestLogging::new())];
        let endpoint = Echo::default();
        let mut ctx = Context::new(Request::new(Method::GET, "/api/users"));
        ctx.take_request();

        let result = Next::new(&stages, &endpoint).run(&mut ctx).await;

        assert!(matches!(result, Err(Error::RequestConsumed)));
        assert_eq!(ctx.phase(), Phase::Faulted);
        assert!(endpoint.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_body_is_logged_without_error() {
        let endpoint = Echo::default();
        let (ctx, result) = run(&endpoint, "").await;

        result.unwrap();
        assert_eq!(endpoint.seen.lock().unwrap().as_deref(), Some(&b""[..]));
        assert_eq!(ctx.phase(), Phase::Flushed);
    }
}
