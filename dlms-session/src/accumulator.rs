//! Reply reassembly state

use bytes::BytesMut;
use dlms_core::{DataObject, ErrorCode};

/// Bytes and flags of the logical reply being assembled
///
/// Cleared before each initial frame of a request. Continuation blocks
/// append to the same accumulator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyAccumulator {
    /// Payload received so far
    pub data: BytesMut,
    /// Device error code, 0 when none
    pub error: i16,
    /// The device has more blocks of this reply
    pub more_data: bool,
    /// Further blocks arrive without a receiver-ready request
    pub streaming: bool,
    /// Decoded value, set by the codec once the last block is in
    pub value: Option<DataObject>,
    /// Blocks appended since the last clear
    pub blocks: usize,
}

impl ReplyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.error = 0;
        self.more_data = false;
        self.streaming = false;
        self.value = None;
        self.blocks = 0;
    }

    /// Device error code of the last block, if any
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_raw(self.error)
    }

    pub fn take_value(&mut self) -> Option<DataObject> {
        self.value.take()
    }

    /// Append one block of payload
    pub fn append_block(&mut self, payload: &[u8]) {
        self.data.extend_from_slice(payload);
        self.blocks += 1;
    }
}
