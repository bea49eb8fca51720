//! DLMS/COSEM load-profile reader
//!
//! This library reads load-profile (interval) data from meters and turns
//! the returned rows into timestamped readings.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `dlms-core`: Error taxonomy, OBIS codes, COSEM date/time, data values and row cells
//! - `dlms-transport`: Transport layer (TCP, Serial, replay)
//! - `dlms-session`: Exchange engine, block reassembly, trace and notification sinks
//! - `dlms-profile`: Capture layouts, profile rows and row-to-reading converters
//! - `dlms-client`: The profile reader and its configuration
//!
//! Building and parsing frame bytes is left to a [`session::FrameCodec`]
//! supplied by the caller.
//!
//! # Usage
//!
//! ```ignore
//! let params = dlms::client::MeterParams::from_json(&json)?;
//! let readout = dlms::read_profile(&params, codec).await?;
//! if let Some(e) = &readout.failure {
//!     eprintln!("read ended early: {}", e);
//! }
//! for reading in &readout.readings {
//!     println!("{}", reading);
//! }
//! ```

use dlms_client::{ProfileReaderBuilder, ProfileReadout};
use dlms_session::{FrameCodec, LogTraceSink};
use dlms_transport::{TcpSettings, TcpTransport};
use std::sync::Arc;

// Re-export core types
pub use dlms_core::{DlmsError, DlmsResult, ErrorCode, ObisCode};
pub use dlms_core::datatypes::*;

pub mod transport {
    pub use dlms_transport::*;
}

pub mod session {
    pub use dlms_session::*;
}

pub mod profile {
    pub use dlms_profile::*;
}

pub mod client {
    pub use dlms_client::*;
}

/// Read a load profile from a meter reachable over TCP
///
/// Validates `params`, hands the addressing, authentication and
/// referencing settings to `codec`, connects with the receive timeout as
/// connect timeout and traces every frame to the `dlms::trace` log target.
/// A codec that rejects the settings fails the call before connecting.
pub async fn read_profile<C: FrameCodec>(
    params: &dlms_client::MeterParams,
    codec: C,
) -> DlmsResult<ProfileReadout> {
    let request = params.validate()?;
    let settings = TcpSettings::with_timeout(&params.host_name, params.port, params.exchange.receive_timeout);
    log::debug!(
        "Reading {} from {} (server address {:#X})",
        request.profile,
        params.address(),
        params.server_address()
    );

    let mut reader = ProfileReaderBuilder::from_params(params)
        .transport(TcpTransport::new(settings))
        .codec(codec)
        .trace(Arc::new(LogTraceSink))
        .build()?;
    reader.read_profile(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};
    use chrono::NaiveDate;
    use dlms_client::MeterParams;
    use dlms_session::{
        Authentication, DecodeStatus, Frame, Handshake, InterfaceType, Operation, ReplyAccumulator,
    };
    use tokio_test::assert_err;

    /// Codec that only exists to satisfy the type; connections fail first
    struct UnusedCodec;

    impl FrameCodec for UnusedCodec {
        fn interface_type(&self) -> InterfaceType {
            InterfaceType::Wrapper
        }

        fn authentication(&self) -> Authentication {
            Authentication::None
        }

        fn encode(&mut self, _operation: &Operation) -> DlmsResult<Vec<Frame>> {
            Ok(vec![Bytes::from_static(&[0])])
        }

        fn accept(&mut self, _step: Handshake, _reply: &[u8]) -> DlmsResult<()> {
            Ok(())
        }

        fn expected_fragment_size(&self, _partial: &[u8]) -> usize {
            8
        }

        fn decode(
            &mut self,
            _rx: &mut BytesMut,
            _reply: &mut ReplyAccumulator,
        ) -> DlmsResult<DecodeStatus> {
            Err(DlmsError::FrameInvalid("unused".to_string()))
        }

        fn receiver_ready(&mut self, _reply: &ReplyAccumulator) -> DlmsResult<Frame> {
            Ok(Bytes::new())
        }
    }

    fn params(port: u16) -> MeterParams {
        MeterParams {
            host_name: "127.0.0.1".to_string(),
            port,
            from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(1, 0, 0).unwrap(),
            profile_obis: "1.0.99.1.0.255".to_string(),
            interface_type: InterfaceType::Wrapper,
            ..MeterParams::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_params_fail_before_connecting() {
        let mut bad = params(4059);
        bad.profile_obis = "profile".to_string();
        let err = assert_err!(read_profile(&bad, UnusedCodec).await);
        assert!(matches!(err, DlmsError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_codec_not_matching_params_fails_before_connecting() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut high = params(port);
        high.authentication = Authentication::High;
        let err = assert_err!(read_profile(&high, UnusedCodec).await);
        assert!(matches!(err, DlmsError::InvalidData(_)));
        assert!(err.to_string().contains("HIGH"));

        let mut hdlc = params(port);
        hdlc.interface_type = InterfaceType::Hdlc;
        let err = assert_err!(read_profile(&hdlc, UnusedCodec).await);
        assert!(matches!(err, DlmsError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = assert_err!(read_profile(&params(port), UnusedCodec).await);
        assert!(err.is_transport());
    }
}
