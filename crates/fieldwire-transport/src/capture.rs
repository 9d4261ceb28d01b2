//! PCAP capture via a [`Transport`](crate::Transport) wrapper.
//!
//! [`CapturingTransport`] wraps any transport and writes every written
//! buffer and every consumed read to a PCAP file for offline analysis (e.g.
//! with Wireshark's Modbus/TCP or KNXnet/IP dissectors via "Decode As").

use crate::{Transport, TransportError};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// `USER0`: there is no link type for bare application payloads.
const PCAP_LINK_TYPE_USER0: u32 = 147;
const PCAP_MAGIC: u32 = 0xa1b2c3d4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
const PCAP_MAX_SNAPLEN: u32 = 65535;

struct PcapWriter<W: Write + Send> {
    inner: W,
}

impl<W: Write + Send> PcapWriter<W> {
    fn new(mut writer: W) -> io::Result<Self> {
        writer.write_all(&PCAP_MAGIC.to_le_bytes())?;
        writer.write_all(&PCAP_VERSION_MAJOR.to_le_bytes())?;
        writer.write_all(&PCAP_VERSION_MINOR.to_le_bytes())?;
        writer.write_all(&0i32.to_le_bytes())?; // thiszone
        writer.write_all(&0u32.to_le_bytes())?; // sigfigs
        writer.write_all(&PCAP_MAX_SNAPLEN.to_le_bytes())?;
        writer.write_all(&PCAP_LINK_TYPE_USER0.to_le_bytes())?;
        writer.flush()?;
        Ok(Self { inner: writer })
    }

    fn record(&mut self, data: &[u8]) -> io::Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let len = data.len().min(PCAP_MAX_SNAPLEN as usize) as u32;
        self.inner.write_all(&(now.as_secs() as u32).to_le_bytes())?;
        self.inner.write_all(&now.subsec_micros().to_le_bytes())?;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(&(data.len() as u32).to_le_bytes())?;
        self.inner.write_all(&data[..len as usize])?;
        self.inner.flush()
    }
}

type FileSink = PcapWriter<io::BufWriter<std::fs::File>>;

/// A [`Transport`] that records traffic to a PCAP file.
pub struct CapturingTransport<T: Transport> {
    inner: T,
    sink: Mutex<FileSink>,
}

impl<T: Transport> CapturingTransport<T> {
    pub fn to_file(inner: T, path: impl AsRef<std::path::Path>) -> io::Result<Self> {
        let file = std::fs::File::create(path)?;
        let sink = PcapWriter::new(io::BufWriter::new(file))?;
        Ok(Self {
            inner,
            sink: Mutex::new(sink),
        })
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn capture(&self, data: &[u8]) {
        let mut sink = self
            .sink
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = sink.record(data) {
            log::warn!("pcap capture write failed: {err}");
        }
    }
}

impl<T: Transport> Transport for CapturingTransport<T> {
    async fn connect(&self) -> Result<(), TransportError> {
        self.inner.connect().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.close().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn readable_byte_count(&self) -> usize {
        self.inner.readable_byte_count()
    }

    fn peek(&self, len: usize) -> Result<Vec<u8>, TransportError> {
        self.inner.peek(len)
    }

    fn read(&self, len: usize) -> Result<Vec<u8>, TransportError> {
        let bytes = self.inner.read(len)?;
        self.capture(&bytes);
        Ok(bytes)
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.capture(bytes);
        self.inner.write(bytes).await
    }

    async fn readable(&self, at_least: usize) -> Result<(), TransportError> {
        self.inner.readable(at_least).await
    }
}
