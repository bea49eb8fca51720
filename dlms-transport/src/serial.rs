//! Serial port transport, e.g. an optical probe or RS-485 line

use crate::stream::{already_open, not_connected, ReceiveParameters, StreamAccessor, TransportLayer};
use async_trait::async_trait;
use bytes::Bytes;
use dlms_core::{DlmsError, DlmsResult};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
}

impl SerialSettings {
    /// 8N1 without flow control
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }
}

/// `port baud 8N1` style summary used in log lines
impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data_bits = match self.data_bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        let stop_bits = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(f, "{} {} {}{}{}", self.port_name, self.baud_rate, data_bits, parity, stop_bits)
    }
}

pub struct SerialTransport {
    port: Option<SerialStream>,
    settings: SerialSettings,
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("settings", &self.settings)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self { port: None, settings }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    fn port(&mut self) -> DlmsResult<&mut SerialStream> {
        self.port
            .as_mut()
            .ok_or_else(|| not_connected(&self.settings.port_name))
    }
}

#[async_trait]
impl StreamAccessor for SerialTransport {
    async fn read(&mut self, buf: &mut [u8]) -> DlmsResult<usize> {
        Ok(self.port()?.read(buf).await?)
    }

    async fn write(&mut self, buf: &[u8]) -> DlmsResult<usize> {
        Ok(self.port()?.write(buf).await?)
    }

    async fn flush(&mut self) -> DlmsResult<()> {
        Ok(self.port()?.flush().await?)
    }
}

#[async_trait]
impl TransportLayer for SerialTransport {
    async fn open(&mut self) -> DlmsResult<()> {
        if self.port.is_some() {
            return Err(already_open(&self.settings.port_name));
        }
        log::debug!("Opening serial port {}", self.settings);

        let port = tokio_serial::new(&self.settings.port_name, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .stop_bits(self.settings.stop_bits)
            .parity(self.settings.parity)
            .flow_control(self.settings.flow_control)
            .open_native_async()
            .map_err(|e| {
                DlmsError::Connection(std::io::Error::other(format!(
                    "Failed to open serial port {}: {}",
                    self.settings.port_name, e
                )))
            })?;

        self.port = Some(port);
        Ok(())
    }

    async fn close(&mut self) -> DlmsResult<()> {
        if let Some(mut port) = self.port.take() {
            port.flush().await?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_summary() {
        let settings = SerialSettings::new("/dev/ttyUSB0", 9600);
        assert_eq!(settings.to_string(), "/dev/ttyUSB0 9600 8N1");
        assert_eq!(settings.parity(Parity::Even).to_string(), "/dev/ttyUSB0 9600 8E1");
    }

    #[tokio::test]
    async fn test_closed_port_reports_not_open() {
        let mut transport = SerialTransport::new(SerialSettings::new("/dev/ttyUSB0", 9600));
        assert!(!transport.is_open());
        transport.close().await.unwrap();
        assert!(matches!(transport.send(&[1]).await, Err(DlmsError::Connection(_))));
    }
}
