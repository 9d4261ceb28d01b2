use std::future::Future;
use thiserror::Error;

/// Errors that can occur at the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport not connected")]
    NotConnected,
    #[error("transport closed")]
    Closed,
    #[error("requested {requested} bytes but only {available} buffered")]
    InsufficientData { requested: usize, available: usize },
    #[error("connect timed out")]
    ConnectTimeout,
}

/// A connected, buffered byte stream.
///
/// Received bytes accumulate in an internal buffer that callers inspect with
/// [`readable_byte_count`](Transport::readable_byte_count) and
/// [`peek`](Transport::peek) and consume with [`read`](Transport::read).
/// Implementors include [`TcpTransport`](crate::TcpTransport) and
/// [`MemoryTransport`](crate::MemoryTransport).
pub trait Transport: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the stream. Buffered bytes stay readable.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn is_connected(&self) -> bool;

    fn readable_byte_count(&self) -> usize;

    /// Copies the first `len` buffered bytes without consuming them.
    fn peek(&self, len: usize) -> Result<Vec<u8>, TransportError>;

    /// Removes and returns the first `len` buffered bytes.
    fn read(&self, len: usize) -> Result<Vec<u8>, TransportError>;

    fn write(&self, bytes: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Resolves once at least `at_least` bytes are buffered, or with
    /// [`TransportError::Closed`] once the stream has ended with fewer.
    fn readable(&self, at_least: usize)
        -> impl Future<Output = Result<(), TransportError>> + Send;
}
