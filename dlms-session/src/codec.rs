//! Frame codec seam
//!
//! The exchange engine never looks inside frames. Building request bytes
//! and parsing reply bytes is the job of a [`FrameCodec`] supplied by the
//! protocol library in use.

use crate::accumulator::ReplyAccumulator;
use crate::settings::{Authentication, CodecSettings, InterfaceType};
use bytes::{Bytes, BytesMut};
use dlms_core::{CaptureObject, CosemDateTime, CosemObjectRef, DataObject, DlmsError, DlmsResult};

/// One physical transmission unit
pub type Frame = Bytes;

/// Logical operations a codec can encode
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// HDLC set-normal-response-mode request
    Snrm,
    /// Association request
    Aarq,
    /// High level security challenge/response
    ApplicationAssociation,
    /// Association release
    Release,
    /// Link disconnect
    Disconnect,
    /// Read one attribute of an object
    Read {
        target: CosemObjectRef,
        attribute_index: i8,
    },
    /// Read profile rows whose sort object lies in `[from, to]`
    ReadRowsByRange {
        profile: CosemObjectRef,
        sort_object: CaptureObject,
        from: CosemDateTime,
        to: CosemDateTime,
    },
    /// Read `count` profile rows starting at 1-based entry `index`
    ReadRowsByEntry {
        profile: CosemObjectRef,
        index: u32,
        count: u32,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Snrm => "SNRM",
            Operation::Aarq => "AARQ",
            Operation::ApplicationAssociation => "application association",
            Operation::Release => "release",
            Operation::Disconnect => "disconnect",
            Operation::Read { .. } => "read",
            Operation::ReadRowsByRange { .. } => "read rows by range",
            Operation::ReadRowsByEntry { .. } => "read rows by entry",
        }
    }
}

/// Handshake replies the codec must inspect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// Reply to SNRM
    Ua,
    /// Reply to AARQ
    Aare,
    /// Reply to the HLS challenge
    ApplicationAssociation,
}

/// Outcome of feeding received bytes to the codec
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeStatus {
    /// More bytes are needed before a frame can be parsed
    Incomplete,
    /// A frame of the awaited reply was consumed into the accumulator
    Complete,
    /// An unsolicited push message was consumed; the accumulator is untouched
    Notification { value: DataObject },
}

/// Encodes logical operations and decodes reply bytes
pub trait FrameCodec: Send {
    fn interface_type(&self) -> InterfaceType;

    fn authentication(&self) -> Authentication;

    /// Apply the association parameters of the meter
    ///
    /// Called once before connecting. Codecs that cannot be reconfigured
    /// keep this default, which only accepts settings matching their own
    /// interface type and authentication.
    fn configure(&mut self, settings: &CodecSettings) -> DlmsResult<()> {
        if settings.interface_type != self.interface_type() {
            return Err(DlmsError::InvalidData(format!(
                "Codec speaks {:?}, meter needs {:?}",
                self.interface_type(),
                settings.interface_type
            )));
        }
        if settings.authentication != self.authentication() {
            return Err(DlmsError::InvalidData(format!(
                "Codec authenticates with {}, meter needs {}",
                self.authentication(),
                settings.authentication
            )));
        }
        Ok(())
    }

    /// Frames for one logical operation
    ///
    /// An empty vector means the operation does not apply to this
    /// interface, e.g. SNRM over the IP wrapper.
    fn encode(&mut self, operation: &Operation) -> DlmsResult<Vec<Frame>>;

    /// Check a handshake reply; errors reject the association
    fn accept(&mut self, step: Handshake, reply: &[u8]) -> DlmsResult<()>;

    /// Bytes still missing from the fragment buffered in `partial`
    fn expected_fragment_size(&self, partial: &[u8]) -> usize;

    /// Consume one frame from `rx` if a complete one is buffered
    ///
    /// On [`DecodeStatus::Complete`] the codec appends the payload to
    /// `reply`, updates its more-data, streaming and error fields and, when
    /// the last block arrives, stores the decoded value. Malformed bytes are
    /// reported as [`dlms_core::DlmsError::FrameInvalid`].
    fn decode(
        &mut self,
        rx: &mut BytesMut,
        reply: &mut ReplyAccumulator,
    ) -> DlmsResult<DecodeStatus>;

    /// Continuation frame asking for the next block
    fn receiver_ready(&mut self, reply: &ReplyAccumulator) -> DlmsResult<Frame>;

    /// Forget any partly decoded frame after an interrupted exchange
    fn reset(&mut self) {}
}
