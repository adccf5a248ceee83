//! Per-request pipeline state.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use tracing::warn;

use crate::body::ReplayBuffer;
use crate::middleware::logging::Phase;
use crate::request::Request;

/// The mutable state threaded through every stage of one request.
///
/// Holds the request (until the router hands it to a handler), the response
/// being built, and the logging stage's progress. Created when the request
/// arrives, dropped once the response is handed to the transport. Never
/// shared between requests.
///
/// The response body goes into `body`, an in-memory sink. Stages may swap it
/// for another sink while downstream runs, but must put the original back.
pub struct Context {
    request: Option<Request>,
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: ReplayBuffer,
    phase: Phase,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self {
            request: Some(request),
            status: StatusCode::OK,
            headers: Vec::new(),
            body: ReplayBuffer::new(),
            phase: Phase::Idle,
        }
    }

    /// The request, unless a handler has already taken it.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn request_mut(&mut self) -> Option<&mut Request> {
        self.request.as_mut()
    }

    pub fn take_request(&mut self) -> Option<Request> {
        self.request.take()
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn set_status(&mut self, status: StatusCode) { self.status = status; }

    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive response header lookup. Returns the first value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replaces every value of `name` with `value`.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// The response body sink currently installed.
    pub fn body(&self) -> &ReplayBuffer { &self.body }
    pub fn body_mut(&mut self) -> &mut ReplayBuffer { &mut self.body }

    /// Installs `sink` as the response body, returning the previous one.
    pub fn replace_body(&mut self, sink: ReplayBuffer) -> ReplayBuffer {
        std::mem::replace(&mut self.body, sink)
    }

    /// Discards status, headers, and body written so far.
    pub fn reset_response(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body = ReplayBuffer::new();
    }

    pub fn phase(&self) -> Phase { self.phase }
    pub(crate) fn set_phase(&mut self, phase: Phase) { self.phase = phase; }

    /// Converts the finished response into the transport's type.
    ///
    /// Headers that are not valid HTTP are dropped with a warning.
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body.into_bytes()));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
                (Ok(name), Ok(value)) => { headers.append(name, value); }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::Method;

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut ctx = Context::new(Request::new(Method::GET, "/"));
        ctx.append_header("Content-Type", "text/html");
        ctx.append_header("x-trace", "1");
        ctx.set_header("content-type", "application/json");

        assert_eq!(ctx.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(ctx.headers().len(), 2);
    }

    #[test]
    fn into_response_carries_status_headers_and_body() {
        let mut ctx = Context::new(Request::new(Method::GET, "/"));
        ctx.set_status(StatusCode::CREATED);
        ctx.set_header("location", "/api/users/3");
        ctx.append_header("bad header", "x");
        ctx.replace_body(ReplayBuffer::from("{}"));

        let response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["location"], "/api/users/3");
        assert_eq!(response.headers().len(), 1);
    }
}
