//! Profile reading over one meter connection
//!
//! A [`ProfileReader`] owns the exchange engine of a single connection and
//! runs the read phases strictly one after another:
//!
//! 1. connect: open the transport, SNRM/UA (HDLC only), AARQ/AARE and the
//!    high level security round when the association needs it
//! 2. read the capture objects of the profile
//! 3. read the rows of the requested range
//! 4. convert rows to readings with the converter of the device family
//! 5. disconnect, which runs whatever happened in phases 2 to 4
//!
//! Only a failed connect is returned as an error. A failure in phases 2 to
//! 4 ends the read early and is reported in [`ProfileReadout::failure`]
//! next to whatever the earlier phases produced.

use crate::config::{ProfileRequest, ReaderConfig};
use chrono::NaiveDateTime;
use dlms_core::object::class_id;
use dlms_core::{
    CaptureObject, CosemDateTime, CosemObjectRef, DataObject, DlmsError, DlmsResult,
};
use dlms_profile::profile_generic::attribute;
use dlms_profile::{
    rows_from_buffer, CaptureLayout, Converter, ProfileEntries, RawRow, Reading,
    SkippedRow,
};
use dlms_session::{
    Authentication, BlockReader, ExchangeEngine, ExchangeStatistics, FrameCodec, Handshake,
    InterfaceType, Operation, ReplyAccumulator,
};
use dlms_transport::TransportLayer;
use serde::{Serialize, Serializer};
use std::time::Instant;

/// Time attribute of the Clock class
const CLOCK_TIME: i8 = 2;

/// Everything one profile read produced
///
/// `layout` is `None` when the capture objects could not be read.
/// `readings` stays empty unless every phase succeeded.
#[derive(Debug, Default, Serialize)]
pub struct ProfileReadout {
    pub layout: Option<CaptureLayout>,
    pub readings: Vec<Reading>,
    pub skipped: Vec<SkippedRow>,
    pub statistics: ExchangeStatistics,
    /// Error that ended the read after the connection was established
    #[serde(serialize_with = "serialize_failure")]
    pub failure: Option<DlmsError>,
}

impl ProfileReadout {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

fn serialize_failure<S: Serializer>(
    failure: &Option<DlmsError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match failure {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Reads Profile Generic data from one meter
pub struct ProfileReader<T, C> {
    engine: ExchangeEngine<T, C>,
    config: ReaderConfig,
}

impl<T: TransportLayer, C: FrameCodec> ProfileReader<T, C> {
    pub fn new(engine: ExchangeEngine<T, C>, config: ReaderConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn engine(&self) -> &ExchangeEngine<T, C> {
        &self.engine
    }

    pub fn into_engine(self) -> ExchangeEngine<T, C> {
        self.engine
    }

    /// Open the transport and establish the association
    ///
    /// On failure a partially opened transport is closed again before the
    /// error is returned.
    pub async fn connect(&mut self) -> DlmsResult<()> {
        let started = Instant::now();
        log::info!("Start connection to meter {}", self.config.meter);

        if let Err(e) = self.associate().await {
            log::error!("Connection to meter {} failed: {}", self.config.meter, e);
            if self.engine.transport().is_open() {
                if let Err(close_err) = self.engine.transport_mut().close().await {
                    log::warn!("Closing meter {} failed: {}", self.config.meter, close_err);
                }
            }
            return Err(e);
        }

        log::info!(
            "Open connection time for meter {} in sec: {}",
            self.config.meter,
            started.elapsed().as_secs()
        );
        Ok(())
    }

    async fn associate(&mut self) -> DlmsResult<()> {
        self.engine.transport_mut().open().await?;
        let mut reply = ReplyAccumulator::new();

        let snrm = self.engine.codec_mut().encode(&Operation::Snrm)?;
        if let Some(frame) = snrm.first() {
            self.engine.exchange(Some(frame), &mut reply).await?;
            self.engine.codec_mut().accept(Handshake::Ua, &reply.data[..])?;
        }

        BlockReader::new(&mut self.engine)
            .request(&Operation::Aarq, &mut reply)
            .await?;
        self.engine.codec_mut().accept(Handshake::Aare, &reply.data[..])?;

        if self.engine.codec().authentication().is_high_level() {
            log::debug!("Meter {} needs high level authentication", self.config.meter);
            BlockReader::new(&mut self.engine)
                .request(&Operation::ApplicationAssociation, &mut reply)
                .await?;
            self.engine
                .codec_mut()
                .accept(Handshake::ApplicationAssociation, &reply.data[..])?;
        }
        Ok(())
    }

    /// Release the association and close the transport
    ///
    /// Never fails: every problem is logged. Does nothing when the
    /// transport is not open.
    pub async fn disconnect(&mut self) {
        if !self.engine.transport().is_open() {
            return;
        }
        let meter = self.config.meter.clone();
        log::info!("Close connection on meter {}", meter);

        let needs_release = self.engine.codec().interface_type() == InterfaceType::Wrapper
            || self.engine.codec().authentication() != Authentication::None;
        if needs_release {
            let mut reply = ReplyAccumulator::new();
            if let Err(e) = BlockReader::new(&mut self.engine)
                .request(&Operation::Release, &mut reply)
                .await
            {
                log::warn!("Meter {} does not support release: {}", meter, e);
            }
        }

        match self.engine.codec_mut().encode(&Operation::Disconnect) {
            Ok(frames) => {
                if let Some(frame) = frames.first() {
                    let mut reply = ReplyAccumulator::new();
                    if let Err(e) = self.engine.exchange(Some(frame), &mut reply).await {
                        log::error!("Disconnect request to meter {} failed: {}", meter, e);
                    }
                }
            }
            Err(e) => log::error!("Cannot encode disconnect for meter {}: {}", meter, e),
        }

        if let Err(e) = self.engine.transport_mut().close().await {
            log::error!(
                "Problem with closing connection meter {}, meter may be blocked: {}",
                meter,
                e
            );
            return;
        }
        log::info!(
            "Connection successfully closed on meter {} ({})",
            meter,
            self.engine.statistics()
        );
    }

    /// Read one attribute and return its decoded value
    pub async fn read_attribute(
        &mut self,
        target: &CosemObjectRef,
        attribute_index: i8,
    ) -> DlmsResult<DataObject> {
        self.request_value(&Operation::Read {
            target: *target,
            attribute_index,
        })
        .await
    }

    async fn request_value(&mut self, operation: &Operation) -> DlmsResult<DataObject> {
        let mut reply = ReplyAccumulator::new();
        BlockReader::new(&mut self.engine)
            .request(operation, &mut reply)
            .await?;
        reply.take_value().ok_or_else(|| {
            DlmsError::InvalidData(format!("Reply to {} carried no value", operation.name()))
        })
    }

    /// Read the capture objects of `profile`
    ///
    /// Must run before any row read: row cells only have a meaning
    /// through the layout. Transport failures keep their kind, anything
    /// else becomes [`DlmsError::LayoutResolution`].
    pub async fn read_capture_layout(
        &mut self,
        profile: &CosemObjectRef,
    ) -> DlmsResult<CaptureLayout> {
        log::info!("Reading capture objects of {} on meter {}", profile, self.config.meter);
        let layout = self
            .read_attribute(profile, attribute::CAPTURE_OBJECTS)
            .await
            .and_then(|value| CaptureLayout::from_data_object(&value))
            .map_err(|e| match e {
                e if e.is_transport() || matches!(e, DlmsError::ExchangeTimeout { .. }) => e,
                e @ DlmsError::LayoutResolution(_) => e,
                other => DlmsError::LayoutResolution(other.to_string()),
            })?;
        log::debug!("Headers of profile: {}", layout.header());
        Ok(layout)
    }

    /// Read entries_in_use and profile_entries of `profile`
    pub async fn read_entries(&mut self, profile: &CosemObjectRef) -> DlmsResult<ProfileEntries> {
        let in_use = self.read_attribute(profile, attribute::ENTRIES_IN_USE).await?;
        let capacity = self.read_attribute(profile, attribute::PROFILE_ENTRIES).await?;
        ProfileEntries::from_values(&in_use, &capacity)
    }

    /// Read the rows whose clock lies in `[from, to]`
    pub async fn read_rows_by_range(
        &mut self,
        profile: &CosemObjectRef,
        layout: &CaptureLayout,
        clock: &CosemObjectRef,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> DlmsResult<Vec<RawRow>> {
        log::info!(
            "Reading rows of {} on meter {} from {} to {}",
            profile,
            self.config.meter,
            from,
            to
        );
        let operation = Operation::ReadRowsByRange {
            profile: *profile,
            sort_object: CaptureObject::new(class_id::CLOCK, clock.logical_name, CLOCK_TIME),
            from: CosemDateTime::from_naive(from)?,
            to: CosemDateTime::from_naive(to)?,
        };
        self.read_rows(&operation, layout).await
    }

    /// Read `count` rows starting at 1-based entry `index`
    pub async fn read_rows_by_entry(
        &mut self,
        profile: &CosemObjectRef,
        layout: &CaptureLayout,
        index: u32,
        count: u32,
    ) -> DlmsResult<Vec<RawRow>> {
        let operation = Operation::ReadRowsByEntry {
            profile: *profile,
            index,
            count,
        };
        self.read_rows(&operation, layout).await
    }

    async fn read_rows(
        &mut self,
        operation: &Operation,
        layout: &CaptureLayout,
    ) -> DlmsResult<Vec<RawRow>> {
        let buffer = self.request_value(operation).await?;
        let rows = rows_from_buffer(&buffer, layout)?;
        for (i, row) in rows.iter().enumerate() {
            log::debug!("row number: {} = {}", i + 1, row);
        }
        Ok(rows)
    }

    /// Read the current time of a Clock object
    pub async fn read_clock(&mut self, clock: &CosemObjectRef) -> DlmsResult<NaiveDateTime> {
        let value = self.read_attribute(clock, CLOCK_TIME).await?;
        let time = match &value {
            DataObject::DateTime(dt) => dt.clone(),
            DataObject::OctetString(bytes) => CosemDateTime::decode(bytes)?,
            other => {
                return Err(DlmsError::InvalidData(format!(
                    "Clock time is not a date-time: {}",
                    other
                )))
            }
        };
        time.to_naive()
            .ok_or_else(|| DlmsError::InvalidData(format!("Clock time is incomplete: {}", time)))
    }

    /// Run every phase of a profile read
    ///
    /// Disconnect runs after the read phases whether they succeeded,
    /// failed or hit the deadline; its own problems are only logged. A
    /// failed connect returns right away. Any later failure is kept in
    /// [`ProfileReadout::failure`] and the readout is still returned.
    pub async fn read_profile(&mut self, request: &ProfileRequest) -> DlmsResult<ProfileReadout> {
        let started = Instant::now();
        log::info!(
            "Start reading profile {} on meter {}, from {} to {}",
            request.profile,
            self.config.meter,
            request.from,
            request.to
        );
        self.connect().await?;

        let mut readout = ProfileReadout::default();
        let result = match self.config.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.read_phases(request, &mut readout))
                .await
                .unwrap_or_else(|_| {
                    log::error!("Reading meter {} exceeded {:?}", self.config.meter, deadline);
                    Err(DlmsError::Timeout)
                }),
            None => self.read_phases(request, &mut readout).await,
        };
        if let Err(e) = result {
            log::error!("Problem with reading meter {}: {}", self.config.meter, e);
            readout.failure = Some(e);
        }

        self.disconnect().await;
        log::info!(
            "Time reading profile for meter {} in sec: {}",
            self.config.meter,
            started.elapsed().as_secs()
        );

        readout.statistics = self.engine.statistics().clone();
        Ok(readout)
    }

    /// Layout, range read and conversion, filling `readout` as they go
    async fn read_phases(
        &mut self,
        request: &ProfileRequest,
        readout: &mut ProfileReadout,
    ) -> DlmsResult<()> {
        let layout = self.read_capture_layout(&request.profile).await?;
        let layout = &*readout.layout.insert(layout);
        let rows = self
            .read_rows_by_range(&request.profile, layout, &request.clock, request.from, request.to)
            .await?;
        let converter = Converter::for_family(request.family, request.clock.logical_name);
        let conversion = converter.convert(&rows, layout, &request.fields, Some(request.from))?;
        readout.readings = conversion.readings;
        readout.skipped = conversion.skipped;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};
    use chrono::NaiveDate;
    use dlms_core::{CosemDateFormat, ObisCode};
    use dlms_profile::{DeviceFamily, TimestampSource};
    use dlms_session::{CodecSettings, DecodeStatus, ExchangeSettings, Frame};
    use dlms_transport::{ReplayHandle, ReplayStep, ReplayTransport};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    const MORE_DATA: u8 = 0x01;

    /// Reply frame `[len, flags, error, payload..]`
    pub(crate) fn frame(flags: u8, error: i8, payload: &[u8]) -> ReplayStep {
        let mut bytes = vec![(payload.len() + 3) as u8, flags, error as u8];
        bytes.extend_from_slice(payload);
        ReplayStep::Reply(bytes)
    }

    pub(crate) fn ok() -> ReplayStep {
        frame(0, 0, b"ok")
    }

    /// Codec whose replies name an entry of a value table
    ///
    /// Requests encode as `[0xC0 | op]`. The first payload byte of a
    /// completed reply selects the decoded value; unknown keys decode to the
    /// raw payload.
    #[derive(Debug, Default)]
    pub(crate) struct ValueCodec {
        pub interface: InterfaceType,
        pub authentication: Authentication,
        pub values: HashMap<u8, DataObject>,
        pub accepted: Vec<Handshake>,
        pub operations: Vec<Operation>,
        /// Settings last applied through `configure`
        pub configured: Option<CodecSettings>,
    }

    impl ValueCodec {
        pub(crate) fn with_value(mut self, key: u8, value: DataObject) -> Self {
            self.values.insert(key, value);
            self
        }
    }

    impl FrameCodec for ValueCodec {
        fn interface_type(&self) -> InterfaceType {
            self.interface
        }

        fn authentication(&self) -> Authentication {
            self.authentication
        }

        fn configure(&mut self, settings: &CodecSettings) -> DlmsResult<()> {
            self.interface = settings.interface_type;
            self.authentication = settings.authentication;
            self.configured = Some(settings.clone());
            Ok(())
        }

        fn encode(&mut self, operation: &Operation) -> DlmsResult<Vec<Frame>> {
            let wrapper = self.interface == InterfaceType::Wrapper;
            let op = match operation {
                Operation::Snrm | Operation::Disconnect if wrapper => return Ok(vec![]),
                Operation::Snrm => 1,
                Operation::Aarq => 2,
                Operation::ApplicationAssociation => 3,
                Operation::Release => 4,
                Operation::Disconnect => 5,
                Operation::Read { .. } => 6,
                Operation::ReadRowsByRange { .. } => 7,
                Operation::ReadRowsByEntry { .. } => 8,
            };
            self.operations.push(operation.clone());
            Ok(vec![Bytes::from(vec![0xC0 | op])])
        }

        fn accept(&mut self, step: Handshake, reply: &[u8]) -> DlmsResult<()> {
            if reply == b"deny" {
                return Err(DlmsError::AccessDenied(format!("{:?} rejected", step)));
            }
            self.accepted.push(step);
            Ok(())
        }

        fn expected_fragment_size(&self, partial: &[u8]) -> usize {
            match partial.first() {
                None => 1,
                Some(len) => (*len as usize).saturating_sub(partial.len()).max(1),
            }
        }

        fn decode(
            &mut self,
            rx: &mut BytesMut,
            reply: &mut ReplyAccumulator,
        ) -> DlmsResult<DecodeStatus> {
            let Some(&len) = rx.first() else {
                return Ok(DecodeStatus::Incomplete);
            };
            if rx.len() < len as usize {
                return Ok(DecodeStatus::Incomplete);
            }
            let frame = rx.split_to(len as usize);
            reply.error = i16::from(frame[2] as i8);
            reply.more_data = frame[1] & MORE_DATA != 0;
            if reply.error == 0 {
                reply.append_block(&frame[3..]);
                if !reply.more_data {
                    let value = reply
                        .data
                        .first()
                        .and_then(|key| self.values.get(key))
                        .cloned()
                        .unwrap_or_else(|| DataObject::OctetString(reply.data.to_vec()));
                    reply.value = Some(value);
                }
            }
            Ok(DecodeStatus::Complete)
        }

        fn receiver_ready(&mut self, reply: &ReplyAccumulator) -> DlmsResult<Frame> {
            Ok(Bytes::from(vec![0xEE, reply.blocks as u8]))
        }
    }

    pub(crate) fn settings() -> ExchangeSettings {
        ExchangeSettings {
            receive_timeout: Duration::from_millis(20),
            max_retries: 1,
            busy_backoff: Duration::from_millis(5),
            max_busy_retries: 3,
        }
    }

    fn reader(
        codec: ValueCodec,
        script: Vec<ReplayStep>,
    ) -> (ProfileReader<ReplayTransport, ValueCodec>, ReplayHandle) {
        reader_with(codec, script, settings(), None)
    }

    fn reader_with(
        codec: ValueCodec,
        script: Vec<ReplayStep>,
        exchange: ExchangeSettings,
        deadline: Option<Duration>,
    ) -> (ProfileReader<ReplayTransport, ValueCodec>, ReplayHandle) {
        let transport = ReplayTransport::new(script);
        let handle = transport.handle();
        let config = ReaderConfig {
            meter: "replay".to_string(),
            exchange: exchange.clone(),
            deadline,
        };
        let engine = ExchangeEngine::new(transport, codec, exchange);
        (ProfileReader::new(engine, config), handle)
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn capture(class: u16, obis: [u8; 6]) -> DataObject {
        DataObject::Structure(vec![
            DataObject::Unsigned16(class),
            DataObject::OctetString(obis.to_vec()),
            DataObject::Integer8(2),
            DataObject::Unsigned16(0),
        ])
    }

    const LAYOUT: u8 = 1;
    const BUFFER: u8 = 2;

    fn request(family: DeviceFamily) -> ProfileRequest {
        ProfileRequest {
            profile: CosemObjectRef::profile(ObisCode::new(1, 0, 99, 1, 0, 255)),
            clock: CosemObjectRef::clock(ObisCode::CLOCK),
            fields: vec![ObisCode::new(1, 0, 1, 8, 0, 255), ObisCode::new(1, 0, 2, 8, 0, 255)],
            from: at(10, 0),
            to: at(12, 0),
            family,
        }
    }

    fn clock_layout() -> DataObject {
        DataObject::Array(vec![
            capture(class_id::CLOCK, [0, 0, 1, 0, 0, 255]),
            capture(class_id::REGISTER, [1, 0, 1, 8, 0, 255]),
            capture(class_id::REGISTER, [1, 0, 2, 8, 0, 255]),
        ])
    }

    fn clock_row(h: u8, m: u8, import: u32, export: u32) -> DataObject {
        DataObject::Structure(vec![
            DataObject::OctetString(CosemDateTime::new(2024, 1, 1, h, m, 0).unwrap().encode()),
            DataObject::Unsigned32(import),
            DataObject::Unsigned32(export),
        ])
    }

    fn sent_ops(handle: &ReplayHandle) -> Vec<u8> {
        handle.sent().iter().map(|frame| frame[0]).collect()
    }

    #[tokio::test]
    async fn test_read_profile_runs_every_phase() {
        let codec = ValueCodec::default()
            .with_value(LAYOUT, clock_layout())
            .with_value(
                BUFFER,
                DataObject::Array(vec![clock_row(10, 0, 100, 7), clock_row(10, 15, 101, 8)]),
            );
        let (mut reader, handle) = reader(
            codec,
            vec![
                ok(),
                ok(),
                frame(0, 0, &[LAYOUT]),
                frame(MORE_DATA, 0, &[BUFFER]),
                frame(0, 0, b"rest"),
                ok(),
            ],
        );

        let readout = assert_ok!(reader.read_profile(&request(DeviceFamily::Generic)).await);
        assert!(readout.is_complete());
        assert_eq!(readout.layout.as_ref().map(CaptureLayout::len), Some(3));
        assert_eq!(readout.skipped_count(), 0);
        assert_eq!(readout.readings.len(), 2);
        assert_eq!(readout.readings[1].timestamp, at(10, 15));
        assert_eq!(readout.readings[1].values, vec![101.0, 8.0]);
        assert_eq!(readout.readings[1].source, TimestampSource::Clock);
        assert_eq!(readout.statistics.frames_received, 6);

        assert_eq!(sent_ops(&handle), vec![0xC1, 0xC2, 0xC6, 0xC7, 0xEE, 0xC5]);
        assert_eq!(handle.closes(), 1);
        assert_eq!(reader.engine().codec().accepted, vec![Handshake::Ua, Handshake::Aare]);
        assert!(matches!(
            &reader.engine().codec().operations[3],
            Operation::ReadRowsByRange { sort_object, .. } if sort_object.is_clock_time()
        ));
    }

    #[tokio::test]
    async fn test_read_profile_infers_missing_timestamps() {
        let layout = DataObject::Array(vec![
            capture(class_id::CLOCK, [0, 0, 1, 0, 0, 255]),
            capture(class_id::DATA, [0, 0, 96, 10, 1, 255]),
            capture(class_id::REGISTER, [1, 0, 1, 8, 0, 255]),
            capture(class_id::REGISTER, [1, 0, 2, 8, 0, 255]),
        ]);
        let buffer = DataObject::Array(vec![DataObject::Structure(vec![
            DataObject::Null,
            DataObject::Null,
            DataObject::Float64(123.4),
            DataObject::Float64(56.7),
        ])]);
        let codec = ValueCodec::default()
            .with_value(LAYOUT, layout)
            .with_value(BUFFER, buffer);
        let (mut reader, _) = reader(
            codec,
            vec![ok(), ok(), frame(0, 0, &[LAYOUT]), frame(0, 0, &[BUFFER]), ok()],
        );

        let readout = assert_ok!(reader.read_profile(&request(DeviceFamily::Itron)).await);
        assert_eq!(readout.readings.len(), 1);
        assert_eq!(readout.readings[0].timestamp, at(10, 15));
        assert_eq!(readout.readings[0].values, vec![123.4, 56.7]);
        assert_eq!(readout.readings[0].source, TimestampSource::Inferred);
    }

    #[tokio::test]
    async fn test_failed_association_closes_transport() {
        let (mut reader, handle) = reader(ValueCodec::default(), vec![ok(), frame(0, 0, b"deny")]);

        let err = assert_err!(reader.read_profile(&request(DeviceFamily::Generic)).await);
        assert!(matches!(err, DlmsError::AccessDenied(_)));
        assert_eq!(sent_ops(&handle), vec![0xC1, 0xC2]);
        assert_eq!(handle.closes(), 1);
    }

    #[tokio::test]
    async fn test_failed_open_skips_disconnect() {
        let transport = ReplayTransport::new(vec![]).failing_open(std::io::ErrorKind::ConnectionRefused);
        let handle = transport.handle();
        let engine = ExchangeEngine::new(transport, ValueCodec::default(), settings());
        let mut reader = ProfileReader::new(engine, ReaderConfig::default());

        let err = assert_err!(reader.read_profile(&request(DeviceFamily::Generic)).await);
        assert!(err.is_transport());
        assert!(handle.sent().is_empty());
        assert_eq!(handle.opens(), 1);
        assert_eq!(handle.closes(), 0);
    }

    #[tokio::test]
    async fn test_range_read_failure_returns_empty_readout() {
        let codec = ValueCodec::default().with_value(LAYOUT, clock_layout());
        let (mut reader, handle) = reader(
            codec,
            vec![ok(), ok(), frame(0, 0, &[LAYOUT]), frame(0, 3, b""), ok()],
        );

        let readout = assert_ok!(reader.read_profile(&request(DeviceFamily::Generic)).await);
        assert!(!readout.is_complete());
        assert!(readout.readings.is_empty());
        assert_eq!(readout.layout.as_ref().map(CaptureLayout::len), Some(3));
        let failure = readout.failure.as_ref().unwrap();
        assert_eq!(failure.device_code(), Some(dlms_core::ErrorCode::ReadWriteDenied));
        assert_eq!(readout.statistics.frames_received, 5);

        assert_eq!(sent_ops(&handle).last(), Some(&0xC5));
        assert_eq!(handle.closes(), 1);
    }

    #[tokio::test]
    async fn test_bad_layout_is_reported_as_layout_failure() {
        let codec = ValueCodec::default().with_value(LAYOUT, DataObject::Unsigned8(3));
        let (mut reader, handle) = reader(codec, vec![ok(), ok(), frame(0, 0, &[LAYOUT]), ok()]);

        let readout = assert_ok!(reader.read_profile(&request(DeviceFamily::Generic)).await);
        assert!(matches!(readout.failure, Some(DlmsError::LayoutResolution(_))));
        assert!(readout.layout.is_none());
        assert!(readout.readings.is_empty());
        assert_eq!(sent_ops(&handle), vec![0xC1, 0xC2, 0xC6, 0xC5]);
    }

    #[test]
    fn test_readout_serializes_failure_as_text() {
        let readout = ProfileReadout {
            failure: Some(DlmsError::Timeout),
            ..ProfileReadout::default()
        };
        let json = serde_json::to_value(&readout).unwrap();
        assert_eq!(json["failure"], serde_json::json!(DlmsError::Timeout.to_string()));
        assert!(json["layout"].is_null());

        let complete = serde_json::to_value(ProfileReadout::default()).unwrap();
        assert!(complete["failure"].is_null());
    }

    #[tokio::test]
    async fn test_wrapper_releases_and_suppresses_release_errors() {
        let codec = ValueCodec {
            interface: InterfaceType::Wrapper,
            ..ValueCodec::default()
        };
        let (mut reader, handle) = reader(codec, vec![ok(), frame(0, 3, b"")]);

        assert_ok!(reader.connect().await);
        reader.disconnect().await;
        assert_eq!(sent_ops(&handle), vec![0xC2, 0xC4]);
        assert_eq!(handle.closes(), 1);
        assert_eq!(reader.engine().codec().accepted, vec![Handshake::Aare]);

        // A second disconnect finds the transport closed
        reader.disconnect().await;
        assert_eq!(handle.closes(), 1);
    }

    #[tokio::test]
    async fn test_high_level_security_round() {
        let codec = ValueCodec {
            authentication: Authentication::HighGmac,
            ..ValueCodec::default()
        };
        let (mut reader, handle) = reader(codec, vec![ok(), ok(), ok(), ok(), ok()]);

        assert_ok!(reader.connect().await);
        assert_eq!(
            reader.engine().codec().accepted,
            vec![Handshake::Ua, Handshake::Aare, Handshake::ApplicationAssociation]
        );
        reader.disconnect().await;
        assert_eq!(sent_ops(&handle), vec![0xC1, 0xC2, 0xC3, 0xC4, 0xC5]);
    }

    #[tokio::test]
    async fn test_deadline_aborts_to_disconnect() {
        let slow = ExchangeSettings {
            busy_backoff: Duration::from_millis(500),
            ..settings()
        };
        let (mut reader, handle) = reader_with(
            ValueCodec::default(),
            vec![
                ok(),
                ok(),
                frame(0, -2, b""),
                // Late answer to the aborted layout read
                frame(0, 0, &[LAYOUT]),
                ReplayStep::Timeout,
                ok(),
            ],
            slow,
            Some(Duration::from_millis(50)),
        );

        let readout = assert_ok!(reader.read_profile(&request(DeviceFamily::Generic)).await);
        assert!(matches!(readout.failure, Some(DlmsError::Timeout)));
        assert!(readout.layout.is_none());
        assert_eq!(sent_ops(&handle), vec![0xC1, 0xC2, 0xC6, 0xC5]);
        assert_eq!(handle.closes(), 1);
        // The disconnect waited past the stale reply for its own answer
        assert_eq!(handle.receives(), 6);
    }

    #[tokio::test]
    async fn test_additional_reads() {
        let clock = CosemDateTime::new(2024, 5, 6, 7, 8, 9).unwrap();
        let codec = ValueCodec::default()
            .with_value(1, DataObject::DateTime(clock.clone()))
            .with_value(2, DataObject::OctetString(clock.encode()))
            .with_value(3, DataObject::Unsigned32(10))
            .with_value(4, DataObject::Unsigned32(96))
            .with_value(5, DataObject::Array(vec![clock_row(0, 15, 1, 2)]))
            .with_value(6, clock_layout());
        let (mut reader, _) = reader(
            codec,
            vec![
                ok(),
                ok(),
                frame(0, 0, &[1]),
                frame(0, 0, &[2]),
                frame(0, 0, &[3]),
                frame(0, 0, &[4]),
                frame(0, 0, &[6]),
                frame(0, 0, &[5]),
            ],
        );
        let clock_ref = CosemObjectRef::clock(ObisCode::CLOCK);
        let profile = CosemObjectRef::profile(ObisCode::new(1, 0, 99, 1, 0, 255));
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap().and_hms_opt(7, 8, 9).unwrap();

        assert_ok!(reader.connect().await);
        assert_eq!(assert_ok!(reader.read_clock(&clock_ref).await), expected);
        assert_eq!(assert_ok!(reader.read_clock(&clock_ref).await), expected);

        let entries = assert_ok!(reader.read_entries(&profile).await);
        assert_eq!(entries.entries_in_use, 10);
        assert_eq!(entries.profile_entries, 96);

        let layout = assert_ok!(reader.read_capture_layout(&profile).await);
        let rows = assert_ok!(reader.read_rows_by_entry(&profile, &layout, 1, 1).await);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 3);
        assert!(matches!(
            reader.engine().codec().operations.last(),
            Some(Operation::ReadRowsByEntry { index: 1, count: 1, .. })
        ));
    }
}
