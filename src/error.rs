//! Unified error type.

/// A boxed error from a body stream or a handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by porter's fallible operations.
///
/// Application-level outcomes (401, 404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. An `Error` that
/// escapes a stage is a fault: the outermost stage turns it into a 500.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the request body stream failed.
    #[error("body: {0}")]
    Body(#[source] BoxError),

    /// A single-pass body was rewound after being consumed without buffering.
    #[error("body was consumed and cannot be replayed")]
    NotReplayable,

    /// The request was already handed to a handler.
    #[error("request was already taken from the context")]
    RequestConsumed,

    /// A handler returned `Err`.
    #[error("handler: {0}")]
    Handler(#[source] BoxError),

    #[error("config: {0}")]
    Config(String),
}
