//! TCP transport implementation

use crate::stream::{already_open, not_connected, ReceiveParameters, StreamAccessor, TransportLayer};
use async_trait::async_trait;
use bytes::Bytes;
use dlms_core::{DlmsError, DlmsResult};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Wrapper for TcpStream that implements Debug
struct DebugTcpStream(TcpStream);

impl fmt::Debug for DebugTcpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpStream").finish()
    }
}

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    /// `host:port`; host names are resolved on open
    pub address: String,
    pub connect_timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            address: format!("{}:{}", host, port),
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Create TCP settings with a connect timeout
    pub fn with_timeout(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(timeout),
            ..Self::new(host, port)
        }
    }
}

/// TCP transport layer implementation
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<DebugTcpStream>,
    settings: TcpSettings,
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
        }
    }

    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn read(&mut self, buf: &mut [u8]) -> DlmsResult<usize> {
        let stream = self.stream.as_mut().ok_or_else(|| not_connected("TCP stream"))?;
        match stream.0.read(buf).await {
            Ok(n) => Ok(n),
            Err(e) => {
                self.stream = None;
                Err(DlmsError::Connection(e))
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> DlmsResult<usize> {
        let stream = self.stream.as_mut().ok_or_else(|| not_connected("TCP stream"))?;
        stream.0.write(buf).await.map_err(DlmsError::Connection)
    }

    async fn flush(&mut self) -> DlmsResult<()> {
        let stream = self.stream.as_mut().ok_or_else(|| not_connected("TCP stream"))?;
        stream.0.flush().await.map_err(DlmsError::Connection)
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> DlmsResult<()> {
        if self.stream.is_some() {
            return Err(already_open(&self.settings.address));
        }

        log::debug!("Connecting to {}", self.settings.address);
        let connect = TcpStream::connect(self.settings.address.as_str());
        let stream = match self.settings.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| DlmsError::Timeout)??,
            None => connect.await?,
        };
        stream.set_nodelay(true)?;

        self.stream = Some(DebugTcpStream(stream));
        Ok(())
    }

    async fn close(&mut self) -> DlmsResult<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.0.shutdown().await?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> DlmsResult<()> {
        self.write_all(data).await?;
        self.flush().await
    }

    async fn receive(
        &mut self,
        params: &ReceiveParameters,
        timeout: Duration,
    ) -> DlmsResult<Bytes> {
        self.read_packet(params, timeout).await
    }
}
