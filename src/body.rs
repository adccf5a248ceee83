//! Replayable bodies.
//!
//! A request body arrives as a single-pass stream: once read, the bytes are
//! gone. Observing a body without stealing it from the next reader means
//! owning a copy in memory and rewinding it after every read.
//!
//! ```text
//! Body::Stream ──read_to_end──▶ Body::Consumed            (bytes handed out once)
//!      │
//!      └──enable_buffering──▶ Body::Replay(ReplayBuffer) ──read_to_end──▶ …
//!                                   ▲                           │
//!                                   └────────── rewind ─────────┘
//! ```
//!
//! [`ReplayBuffer`] is also the in-memory response sink: handlers write into
//! it through [`AsyncWrite`], the logging stage rewinds and reads it back, and
//! the transport layer takes the finished bytes.

use std::io::{self, Cursor, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncWrite, ReadBuf};

use crate::error::{BoxError, Error};

// ── ReplayBuffer ──────────────────────────────────────────────────────────────

/// An in-memory byte buffer with a single read/write position.
///
/// Reads start at the current position and advance it; writes overwrite or
/// extend from the current position. [`rewind`](ReplayBuffer::rewind) puts the
/// position back at the start so the same bytes can be read again.
#[derive(Debug, Default)]
pub struct ReplayBuffer {
    inner: Cursor<Vec<u8>>,
}

impl ReplayBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get_ref().is_empty()
    }

    /// Resets the position to the start of the buffer.
    pub fn rewind(&mut self) {
        self.inner.set_position(0);
    }

    /// Every byte in the buffer, regardless of the current position.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.get_ref()
    }

    /// Reads from the current position to the end, leaving the position at the end.
    pub async fn read_remaining(&mut self) -> io::Result<Bytes> {
        let remaining = self.len().saturating_sub(self.position() as usize);
        let mut out = Vec::with_capacity(remaining);
        self.read_to_end(&mut out).await?;
        Ok(Bytes::from(out))
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.inner.into_inner())
    }
}

impl From<Vec<u8>> for ReplayBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self { inner: Cursor::new(bytes) }
    }
}

impl From<Bytes> for ReplayBuffer {
    fn from(bytes: Bytes) -> Self {
        Self::from(Vec::from(bytes))
    }
}

impl From<&'static str> for ReplayBuffer {
    fn from(text: &'static str) -> Self {
        Self::from(text.as_bytes().to_vec())
    }
}

impl AsyncRead for ReplayBuffer {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for ReplayBuffer {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl AsyncSeek for ReplayBuffer {
    fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.inner).start_seek(position)
    }

    fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.inner).poll_complete(cx)
    }
}

// ── Body ──────────────────────────────────────────────────────────────────────

type StreamBody = UnsyncBoxBody<Bytes, BoxError>;

/// A request body.
///
/// Starts life as a single-pass stream (straight off the connection, or any
/// [`http_body::Body`](hyper::body::Body)). Call
/// [`enable_buffering`](Body::enable_buffering) to make it replayable.
pub struct Body {
    kind: Kind,
}

enum Kind {
    Empty,
    Stream(StreamBody),
    /// A stream that was read without buffering. Nothing left to give.
    Consumed,
    Replay(ReplayBuffer),
}

impl Body {
    pub fn empty() -> Self {
        Self { kind: Kind::Empty }
    }

    /// Wraps a single-pass body stream.
    pub fn from_stream<B>(body: B) -> Self
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self { kind: Kind::Stream(body.map_err(Into::into).boxed_unsync()) }
    }

    /// `true` once the body can be read again after [`rewind`](Body::rewind).
    pub fn is_replayable(&self) -> bool {
        matches!(self.kind, Kind::Empty | Kind::Replay(_))
    }

    /// Reads everything from the current position to the end.
    ///
    /// On a plain stream this is the one and only read. On a buffered body it
    /// advances the position; [`rewind`](Body::rewind) to read again. An
    /// absent or exhausted body yields empty bytes.
    pub async fn read_to_end(&mut self) -> Result<Bytes, Error> {
        if let Kind::Replay(buf) = &mut self.kind {
            return Ok(buf.read_remaining().await?);
        }

        match std::mem::replace(&mut self.kind, Kind::Consumed) {
            Kind::Stream(stream) => collect(stream).await,
            Kind::Empty => {
                self.kind = Kind::Empty;
                Ok(Bytes::new())
            }
            _ => Ok(Bytes::new()),
        }
    }

    /// Drains a pending stream into memory, positioned at the start.
    ///
    /// Already-buffered bodies are left as they are. Absent or exhausted
    /// bodies become an empty buffer rather than an error.
    pub async fn enable_buffering(&mut self) -> Result<(), Error> {
        match std::mem::replace(&mut self.kind, Kind::Consumed) {
            Kind::Stream(stream) => {
                let bytes = collect(stream).await?;
                self.kind = Kind::Replay(ReplayBuffer::from(bytes));
            }
            Kind::Replay(buf) => self.kind = Kind::Replay(buf),
            Kind::Empty | Kind::Consumed => self.kind = Kind::Replay(ReplayBuffer::new()),
        }
        Ok(())
    }

    /// Moves the read position back to the start.
    ///
    /// Fails only for a stream that was already read without buffering.
    pub fn rewind(&mut self) -> Result<(), Error> {
        match &mut self.kind {
            Kind::Replay(buf) => {
                buf.rewind();
                Ok(())
            }
            Kind::Empty | Kind::Stream(_) => Ok(()),
            Kind::Consumed => Err(Error::NotReplayable),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::from_stream(Full::new(bytes))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}

async fn collect(stream: StreamBody) -> Result<Bytes, Error> {
    let collected = stream.collect().await.map_err(Error::Body)?;
    Ok(collected.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::stream;
    use hyper::body::Frame;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn stream_reads_once() {
        let mut body = Body::from("hello");
        assert!(!body.is_replayable());

        assert_eq!(body.read_to_end().await.unwrap(), "hello");
        assert_eq!(body.read_to_end().await.unwrap(), "");
        assert!(matches!(body.rewind(), Err(Error::NotReplayable)));
    }

    #[tokio::test]
    async fn buffered_body_replays_after_rewind() {
        let mut body = Body::from(r#"{"name":"carol"}"#);
        body.enable_buffering().await.unwrap();
        assert!(body.is_replayable());

        let first = body.read_to_end().await.unwrap();
        assert_eq!(body.read_to_end().await.unwrap(), "");

        body.rewind().unwrap();
        let second = body.read_to_end().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second, r#"{"name":"carol"}"#);
    }

    #[tokio::test]
    async fn buffering_an_exhausted_stream_yields_empty() {
        let mut body = Body::from("gone");
        body.read_to_end().await.unwrap();

        body.enable_buffering().await.unwrap();
        assert_eq!(body.read_to_end().await.unwrap(), "");
        body.rewind().unwrap();
    }

    #[tokio::test]
    async fn empty_body_is_replayable() {
        let mut body = Body::empty();
        assert!(body.is_replayable());
        assert_eq!(body.read_to_end().await.unwrap(), "");
        body.rewind().unwrap();
        assert_eq!(body.read_to_end().await.unwrap(), "");
    }

    #[tokio::test]
    async fn failing_stream_surfaces_body_error() {
        let frames = vec![
            Ok::<_, BoxError>(Frame::data(Bytes::from_static(b"par"))),
            Err("connection reset".into()),
        ];
        let mut body = Body::from_stream(http_body_util::StreamBody::new(stream::iter(frames)));

        let err = body.enable_buffering().await.unwrap_err();
        assert!(matches!(err, Error::Body(_)));
    }

    #[tokio::test]
    async fn replay_buffer_write_rewind_read() {
        let mut buf = ReplayBuffer::new();
        buf.write_all(b"[1,2,3]").await.unwrap();
        assert_eq!(buf.position(), 7);
        assert_eq!(buf.read_remaining().await.unwrap(), "");

        buf.rewind();
        assert_eq!(buf.read_remaining().await.unwrap(), "[1,2,3]");
        assert_eq!(buf.as_bytes(), b"[1,2,3]");
    }

    #[tokio::test]
    async fn replay_buffer_copies_from_position() {
        let mut src = ReplayBuffer::from("abcdef");
        let mut dst = ReplayBuffer::new();

        tokio::io::copy(&mut src, &mut dst).await.unwrap();
        assert_eq!(dst.as_bytes(), b"abcdef");

        // source is now at the end; a second copy moves nothing
        tokio::io::copy(&mut src, &mut dst).await.unwrap();
        assert_eq!(dst.len(), 6);
    }
}
