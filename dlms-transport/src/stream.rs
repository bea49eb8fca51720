//! Stream accessor and transport layer traits

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dlms_core::{DlmsError, DlmsResult};
use std::time::Duration;

/// How much data one physical receive waits for
///
/// A receive completes once at least `count` bytes are buffered and, when
/// `eop` is set, the last buffered byte equals the end-of-packet marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveParameters {
    pub eop: Option<u8>,
    pub count: usize,
}

impl ReceiveParameters {
    /// Wait for a packet terminated by `eop`, at least `count` bytes long
    pub fn until_marker(eop: u8, count: usize) -> Self {
        Self { eop: Some(eop), count }
    }

    /// Wait for exactly the next `count` bytes
    pub fn exact(count: usize) -> Self {
        Self { eop: None, count }
    }

    /// Whether `data` satisfies these parameters
    pub fn is_satisfied(&self, data: &[u8]) -> bool {
        if data.len() < self.count.max(1) {
            return false;
        }
        match self.eop {
            Some(eop) => data.last() == Some(&eop),
            None => true,
        }
    }
}

/// Stream accessor interface to access a physical stream to a remote meter
#[async_trait]
pub trait StreamAccessor: Send {
    /// Read data from the stream
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if EOF
    async fn read(&mut self, buf: &mut [u8]) -> DlmsResult<usize>;

    /// Write data to the stream
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> DlmsResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> DlmsResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(DlmsError::Connection(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write all data",
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> DlmsResult<()>;

    /// Read until `params` is satisfied or `timeout` expires
    ///
    /// Bytes read before the deadline are discarded on timeout.
    async fn read_packet(
        &mut self,
        params: &ReceiveParameters,
        timeout: Duration,
    ) -> DlmsResult<Bytes> {
        let mut packet = BytesMut::with_capacity(params.count.max(64));
        let mut chunk = [0u8; 1024];
        let read_all = async {
            while !params.is_satisfied(&packet) {
                let n = self.read(&mut chunk).await?;
                if n == 0 {
                    return Err(DlmsError::Connection(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "Connection closed by the meter",
                    )));
                }
                packet.extend_from_slice(&chunk[..n]);
            }
            Ok(())
        };
        tokio::time::timeout(timeout, read_all)
            .await
            .map_err(|_| DlmsError::Timeout)??;
        Ok(packet.freeze())
    }
}

/// Byte-oriented, half-duplex connection to one meter
///
/// Only one request may be in flight at a time; callers hold `&mut self`
/// across a whole exchange.
#[async_trait]
pub trait TransportLayer: Send {
    /// Open the physical layer connection
    async fn open(&mut self) -> DlmsResult<()>;

    /// Close the connection; closing a closed transport is a no-op
    async fn close(&mut self) -> DlmsResult<()>;

    fn is_open(&self) -> bool;

    /// Send one frame
    async fn send(&mut self, data: &[u8]) -> DlmsResult<()>;

    /// Receive one fragment
    ///
    /// Fails with [`DlmsError::Timeout`] when nothing satisfying `params`
    /// arrives within `timeout`, and with [`DlmsError::Connection`] on I/O
    /// failure.
    async fn receive(&mut self, params: &ReceiveParameters, timeout: Duration)
        -> DlmsResult<Bytes>;
}

pub(crate) fn already_open(what: &str) -> DlmsError {
    DlmsError::Connection(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("{} has already been opened", what),
    ))
}

pub(crate) fn not_connected(what: &str) -> DlmsError {
    DlmsError::Connection(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        format!("{} not connected", what),
    ))
}
