//! Builder for profile readers
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use dlms_client::{MeterParams, ProfileReaderBuilder};
//! use dlms_session::LogTraceSink;
//! use dlms_transport::{TcpSettings, TcpTransport};
//! use std::sync::Arc;
//!
//! let params = MeterParams::from_json(&json)?;
//! let request = params.validate()?;
//! let mut reader = ProfileReaderBuilder::from_params(&params)
//!     .transport(TcpTransport::new(TcpSettings::new(&params.host_name, params.port)))
//!     .codec(my_codec)
//!     .trace(Arc::new(LogTraceSink))
//!     .build()?;
//! let readout = reader.read_profile(&request).await?;
//! ```

use crate::config::{MeterParams, ReaderConfig};
use crate::reader::ProfileReader;
use dlms_core::{DlmsError, DlmsResult};
use dlms_session::{
    CodecSettings, ExchangeEngine, ExchangeSettings, FrameCodec, NotificationSink, TraceSink,
};
use dlms_transport::TransportLayer;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`ProfileReader`]
///
/// Transport and codec are required; everything else has a default:
/// exchange settings from [`ExchangeSettings::default`], no deadline, no
/// trace and notifications written to the log.
pub struct ProfileReaderBuilder<T, C> {
    transport: Option<T>,
    codec: Option<C>,
    config: ReaderConfig,
    codec_settings: Option<CodecSettings>,
    trace: Option<Arc<dyn TraceSink>>,
    notifications: Option<Arc<dyn NotificationSink>>,
}

impl<T: TransportLayer, C: FrameCodec> ProfileReaderBuilder<T, C> {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            transport: None,
            codec: None,
            config: ReaderConfig::default(),
            codec_settings: None,
            trace: None,
            notifications: None,
        }
    }

    /// Start from the settings carried by meter parameters
    ///
    /// Takes the meter address as log label, the exchange settings, the
    /// deadline and the codec settings.
    pub fn from_params(params: &MeterParams) -> Self {
        Self {
            config: params.reader_config(),
            codec_settings: Some(params.codec_settings()),
            ..Self::new()
        }
    }

    pub fn transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn codec(mut self, codec: C) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Settings passed to [`FrameCodec::configure`] when building
    pub fn codec_settings(mut self, settings: CodecSettings) -> Self {
        self.codec_settings = Some(settings);
        self
    }

    /// Label used for the meter in log lines
    pub fn meter(mut self, meter: impl Into<String>) -> Self {
        self.config.meter = meter.into();
        self
    }

    pub fn exchange_settings(mut self, settings: ExchangeSettings) -> Self {
        self.config.exchange = settings;
        self
    }

    /// Overall limit for the read phases after connecting
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline = Some(deadline);
        self
    }

    pub fn trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn notifications(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// Build the reader
    ///
    /// # Errors
    /// Returns error if the transport or the codec is not configured, or
    /// the codec rejects the codec settings
    pub fn build(self) -> DlmsResult<ProfileReader<T, C>> {
        let transport = self.transport.ok_or_else(|| {
            DlmsError::InvalidData("Transport must be configured".to_string())
        })?;
        let mut codec = self
            .codec
            .ok_or_else(|| DlmsError::InvalidData("Codec must be configured".to_string()))?;
        if let Some(settings) = &self.codec_settings {
            codec.configure(settings)?;
        }

        let mut engine = ExchangeEngine::new(transport, codec, self.config.exchange.clone());
        if let Some(trace) = self.trace {
            engine = engine.with_trace(trace);
        }
        if let Some(notifications) = self.notifications {
            engine = engine.with_notifications(notifications);
        }
        Ok(ProfileReader::new(engine, self.config))
    }
}

impl<T: TransportLayer, C: FrameCodec> Default for ProfileReaderBuilder<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::tests::{ok, settings, ValueCodec};
    use dlms_session::{Authentication, Direction, Handshake, InterfaceType, MemoryTraceSink};
    use dlms_transport::ReplayTransport;
    use tokio_test::assert_ok;

    #[test]
    fn test_build_requires_transport_and_codec() {
        let missing_codec = ProfileReaderBuilder::<ReplayTransport, ValueCodec>::new()
            .transport(ReplayTransport::new(vec![]))
            .build();
        assert!(missing_codec.is_err());

        let missing_transport = ProfileReaderBuilder::<ReplayTransport, ValueCodec>::new()
            .codec(ValueCodec::default())
            .build();
        assert!(missing_transport.is_err());
    }

    #[test]
    fn test_from_params() {
        let params = MeterParams {
            host_name: "meter".to_string(),
            deadline_ms: Some(1500),
            ..MeterParams::default()
        };
        let reader = ProfileReaderBuilder::from_params(&params)
            .transport(ReplayTransport::new(vec![]))
            .codec(ValueCodec::default())
            .build()
            .unwrap();
        assert_eq!(reader.config().meter, "meter:4059");
        assert_eq!(reader.config().deadline, Some(Duration::from_millis(1500)));
        assert_eq!(reader.engine().codec().configured, Some(params.codec_settings()));
    }

    #[tokio::test]
    async fn test_params_authentication_reaches_codec() {
        let params = MeterParams {
            host_name: "meter".to_string(),
            authentication: Authentication::High,
            interface_type: InterfaceType::Wrapper,
            ..MeterParams::default()
        };
        let mut reader = ProfileReaderBuilder::from_params(&params)
            .transport(ReplayTransport::new(vec![ok(), ok()]))
            .codec(ValueCodec::default())
            .exchange_settings(settings())
            .build()
            .unwrap();

        assert_ok!(reader.connect().await);
        assert_eq!(
            reader.engine().codec().accepted,
            vec![Handshake::Aare, Handshake::ApplicationAssociation]
        );
    }

    #[tokio::test]
    async fn test_trace_sink_is_wired() {
        let trace = MemoryTraceSink::new();
        let mut reader = ProfileReaderBuilder::new()
            .transport(ReplayTransport::new(vec![ok(), ok(), ok()]))
            .codec(ValueCodec::default())
            .exchange_settings(settings())
            .meter("replay")
            .trace(Arc::new(trace.clone()))
            .build()
            .unwrap();

        assert_ok!(reader.connect().await);
        reader.disconnect().await;
        assert_eq!(trace.count(Direction::Tx), 3);
        assert_eq!(trace.count(Direction::Rx), 3);
        assert_eq!(reader.engine().settings(), &settings());
    }
}
