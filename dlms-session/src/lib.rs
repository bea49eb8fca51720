//! Session layer module for DLMS/COSEM profile reading
//!
//! This crate drives request/response exchanges over a transport: sending
//! frames built by a [`FrameCodec`], resending on timeouts, backing off
//! from busy devices, diverting push notifications and reassembling
//! multi-block replies.

pub mod accumulator;
pub mod block;
pub mod codec;
pub mod exchange;
pub mod settings;
pub mod statistics;
pub mod trace;

pub use accumulator::ReplyAccumulator;
pub use block::BlockReader;
pub use codec::{DecodeStatus, Frame, FrameCodec, Handshake, Operation};
pub use dlms_core::{DlmsError, DlmsResult};
pub use exchange::ExchangeEngine;
pub use settings::{Authentication, CodecSettings, ExchangeSettings, InterfaceType, HDLC_FLAG};
pub use statistics::ExchangeStatistics;
pub use trace::{
    ChannelNotificationSink, Direction, FileTraceSink, LogNotificationSink, LogTraceSink,
    MemoryTraceSink, NotificationSink, NullTraceSink, TraceRecord, TraceSink,
};
