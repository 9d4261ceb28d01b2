use crate::buffer::RxBuffer;
use crate::{Transport, TransportError};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Inner {
    rx: Arc<RxBuffer>,
    peer_rx: Option<Arc<RxBuffer>>,
    sent: Mutex<Vec<Vec<u8>>>,
    connected: AtomicBool,
    fail_writes: AtomicBool,
}

/// In-process transport for tests and simulation.
///
/// Clones share the same stream, so a test can hand one clone to an engine
/// and keep another to [`feed`](MemoryTransport::feed) bytes and inspect
/// what was written.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl MemoryTransport {
    /// A transport with no peer: writes are only recorded.
    pub fn new() -> Self {
        Self::with_peer(Arc::new(RxBuffer::new()), None)
    }

    /// Two transports wired back to back.
    pub fn pair() -> (Self, Self) {
        let a_rx = Arc::new(RxBuffer::new());
        let b_rx = Arc::new(RxBuffer::new());
        (
            Self::with_peer(a_rx.clone(), Some(b_rx.clone())),
            Self::with_peer(b_rx, Some(a_rx)),
        )
    }

    fn with_peer(rx: Arc<RxBuffer>, peer_rx: Option<Arc<RxBuffer>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                rx,
                peer_rx,
                sent: Mutex::new(Vec::new()),
                connected: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Appends bytes to this side's receive buffer as if they had arrived.
    pub fn feed(&self, bytes: &[u8]) {
        self.inner.rx.push(bytes);
    }

    /// Ends the inbound stream as a remote hangup would.
    pub fn end_of_stream(&self) {
        self.inner.rx.close();
    }

    /// Makes every following write fail with a broken-pipe error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every successful write so far, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent_guard().clone()
    }

    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent_guard())
    }

    fn sent_guard(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        self.inner
            .sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.rx.close();
        if let Some(peer) = &self.inner.peer_rx {
            peer.close();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst) && !self.inner.rx.is_closed()
    }

    fn readable_byte_count(&self) -> usize {
        self.inner.rx.len()
    }

    fn peek(&self, len: usize) -> Result<Vec<u8>, TransportError> {
        self.inner.rx.peek(len)
    }

    fn read(&self, len: usize) -> Result<Vec<u8>, TransportError> {
        self.inner.rx.read(len)
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "memory transport write failure",
            )));
        }
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.sent_guard().push(bytes.to_vec());
        if let Some(peer) = &self.inner.peer_rx {
            peer.push(bytes);
        }
        Ok(())
    }

    async fn readable(&self, at_least: usize) -> Result<(), TransportError> {
        self.inner.rx.readable(at_least).await
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryTransport;
    use crate::{Transport, TransportError};

    #[tokio::test]
    async fn pair_is_full_duplex() {
        let (a, b) = MemoryTransport::pair();
        a.connect().await.unwrap();
        b.connect().await.unwrap();
        a.write(&[1, 2]).await.unwrap();
        b.write(&[3]).await.unwrap();
        b.readable(2).await.unwrap();
        assert_eq!(b.read(2).unwrap(), vec![1, 2]);
        assert_eq!(a.read(1).unwrap(), vec![3]);
        assert_eq!(a.sent(), vec![vec![1, 2]]);
    }

    #[tokio::test]
    async fn closing_one_side_ends_the_other() {
        let (a, b) = MemoryTransport::pair();
        a.connect().await.unwrap();
        b.connect().await.unwrap();
        a.close().await.unwrap();
        assert!(matches!(b.readable(1).await, Err(TransportError::Closed)));
        assert!(!b.is_connected());
    }

    #[tokio::test]
    async fn clones_share_the_stream() {
        let transport = MemoryTransport::new();
        let handle = transport.clone();
        handle.feed(&[0xAA]);
        assert_eq!(transport.readable_byte_count(), 1);
        transport.connect().await.unwrap();
        transport.write(&[0x01]).await.unwrap();
        assert_eq!(handle.take_sent(), vec![vec![0x01]]);
        assert!(handle.sent().is_empty());
    }

    #[tokio::test]
    async fn write_failures_and_disconnected_writes() {
        let transport = MemoryTransport::new();
        assert!(matches!(
            transport.write(&[1]).await,
            Err(TransportError::NotConnected)
        ));
        transport.connect().await.unwrap();
        transport.set_fail_writes(true);
        assert!(matches!(
            transport.write(&[1]).await,
            Err(TransportError::Io(_))
        ));
    }
}
