//! # porter
//!
//! A small HTTP request pipeline. Every request passes through the same
//! three stages before it reaches your handlers:
//!
//! ```text
//! ErrorContainment → Authentication → RequestLogging → Router → handler
//! ```
//!
//! - **Error containment**: any fault that escapes (an `Err` or a panic)
//!   becomes `500 An unexpected error occurred.`, with no partial output.
//! - **Authentication**: the `Authorization` header must equal the configured
//!   credential exactly, or the request ends with `401 {"error":"Unauthorized"}`.
//! - **Logging**: the full request (method, path, headers, body) is logged
//!   before the handler runs, and the full response (status, body) after.
//!   Both bodies are buffered and replayed, so the handler and the client see
//!   exactly the bytes that were logged.
//!
//! Logs go through [`tracing`]; install whatever subscriber you like.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use porter::{Config, Method, Pipeline, Request, Response, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), porter::Error> {
//!     let config = Config::from_env()?;
//!
//!     let app = Router::new()
//!         .on(Method::GET,  "/api/users", list_users)
//!         .on(Method::POST, "/api/users", create_user);
//!
//!     Server::bind(config.addr)
//!         .serve(Pipeline::new(config.credential, app))
//!         .await
//! }
//!
//! async fn list_users(_req: Request) -> Response {
//!     Response::json(br#"[{"id":1,"name":"Alice"}]"#.to_vec())
//! }
//!
//! // `Err` is a fault: the caller gets the fixed 500.
//! async fn create_user(mut req: Request) -> Result<Response, porter::Error> {
//!     let body = req.bytes().await?;
//!     if body.is_empty() {
//!         return Ok(Response::status(StatusCode::BAD_REQUEST));
//!     }
//!     Ok(Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/api/users/3")
//!         .json(body.to_vec()))
//! }
//! ```

mod body;
mod config;
mod context;
mod error;
mod handler;
mod pipeline;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use body::{Body, ReplayBuffer};
pub use config::{Config, Credential, DEFAULT_CREDENTIAL};
pub use context::Context;
pub use error::{BoxError, Error};
pub use handler::{BoxFuture, Handler, IntoOutcome};
pub use http::{Method, StatusCode};
pub use middleware::auth::UNAUTHORIZED_BODY;
pub use middleware::containment::INTERNAL_ERROR_BODY;
pub use pipeline::Pipeline;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
