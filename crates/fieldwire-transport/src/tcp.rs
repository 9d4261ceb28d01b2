use crate::buffer::RxBuffer;
use crate::{Transport, TransportError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

const READ_CHUNK_LEN: usize = 4096;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP client (or accepted server-side) stream.
///
/// A background task moves socket bytes into the shared receive buffer; it
/// is aborted on [`close`](Transport::close) and on drop.
#[derive(Debug)]
pub struct TcpTransport {
    remote: SocketAddr,
    connect_timeout: Duration,
    rx: Arc<RxBuffer>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    reader_task: StdMutex<Option<JoinHandle<()>>>,
    connected: Arc<AtomicBool>,
}

impl TcpTransport {
    pub fn new(remote: SocketAddr) -> Self {
        Self {
            remote,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            rx: Arc::new(RxBuffer::new()),
            writer: Mutex::new(None),
            reader_task: StdMutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Wraps an already-connected stream, e.g. one returned by a listener.
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        let remote = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        let mut transport = Self::new(remote);
        transport.writer = Mutex::new(Some(write_half));
        transport.spawn_reader(read_half);
        Ok(transport)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn spawn_reader(&self, read_half: OwnedReadHalf) {
        self.rx.reset();
        self.connected.store(true, Ordering::SeqCst);
        let task = tokio::spawn(read_loop(
            read_half,
            self.rx.clone(),
            self.connected.clone(),
            self.remote,
        ));
        let mut slot = self
            .reader_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = slot.replace(task) {
            old.abort();
        }
    }

    fn stop_reader(&self) {
        let task = self
            .reader_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    rx: Arc<RxBuffer>,
    connected: Arc<AtomicBool>,
    remote: SocketAddr,
) {
    let mut chunk = [0u8; READ_CHUNK_LEN];
    loop {
        match read_half.read(&mut chunk).await {
            Ok(0) => {
                log::debug!("tcp peer {remote} closed the stream");
                break;
            }
            Ok(n) => rx.push(&chunk[..n]),
            Err(err) => {
                log::warn!("tcp read from {remote} failed: {err}");
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
    rx.close();
}

impl Transport for TcpTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }
        let stream = timeout(self.connect_timeout, TcpStream::connect(self.remote))
            .await
            .map_err(|_| TransportError::ConnectTimeout)??;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);
        self.spawn_reader(read_half);
        log::debug!("tcp connected to {}", self.remote);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.stop_reader();
        self.connected.store(false, Ordering::SeqCst);
        self.rx.close();
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn readable_byte_count(&self) -> usize {
        self.rx.len()
    }

    fn peek(&self, len: usize) -> Result<Vec<u8>, TransportError> {
        self.rx.peek(len)
    }

    fn read(&self, len: usize) -> Result<Vec<u8>, TransportError> {
        self.rx.read(len)
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or(TransportError::NotConnected)?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn readable(&self, at_least: usize) -> Result<(), TransportError> {
        self.rx.readable(at_least).await
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

#[cfg(test)]
mod tests {
    use super::TcpTransport;
    use crate::{Transport, TransportError};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::{timeout, Duration};

    async fn bind_local() -> (TcpListener, std::net::SocketAddr) {
        let _ = env_logger::builder().is_test(true).try_init();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn exchanges_bytes_with_a_listener() {
        let (listener, addr) = bind_local().await;
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 3];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&[9, 8, 7, 6]).await.unwrap();
            buf
        });

        let transport = TcpTransport::new(addr);
        transport.connect().await.unwrap();
        assert!(transport.is_connected());
        transport.write(&[1, 2, 3]).await.unwrap();
        timeout(Duration::from_secs(2), transport.readable(4))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transport.peek(2).unwrap(), vec![9, 8]);
        assert_eq!(transport.read(4).unwrap(), vec![9, 8, 7, 6]);
        assert_eq!(server.await.unwrap(), [1, 2, 3]);
    }

    #[tokio::test]
    async fn peer_hangup_closes_the_buffer() {
        let (listener, addr) = bind_local().await;
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let transport = TcpTransport::new(addr);
        transport.connect().await.unwrap();
        server.await.unwrap();
        let result = timeout(Duration::from_secs(2), transport.readable(1))
            .await
            .unwrap();
        assert!(matches!(result, Err(TransportError::Closed)));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn write_before_connect_fails() {
        let _ = env_logger::builder().is_test(true).try_init();
        let transport = TcpTransport::new("127.0.0.1:9".parse().unwrap());
        assert!(matches!(
            transport.write(&[1]).await,
            Err(TransportError::NotConnected)
        ));
    }
}
