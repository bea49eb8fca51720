//! Multi-block reply reader

use crate::accumulator::ReplyAccumulator;
use crate::codec::{Frame, FrameCodec, Operation};
use crate::exchange::ExchangeEngine;
use dlms_core::DlmsResult;
use dlms_transport::TransportLayer;

/// Pulls every block of a logical reply through the exchange engine
///
/// Blocks are appended in arrival order. Nothing is reordered or
/// deduplicated.
pub struct BlockReader<'a, T, C> {
    engine: &'a mut ExchangeEngine<T, C>,
}

impl<'a, T: TransportLayer, C: FrameCodec> BlockReader<'a, T, C> {
    pub fn new(engine: &'a mut ExchangeEngine<T, C>) -> Self {
        Self { engine }
    }

    /// Exchange `frames` and follow each reply until the device has no
    /// more data
    ///
    /// The accumulator is cleared before each initial frame, so it ends up
    /// holding the reply to the last one. Returns the number of
    /// continuation exchanges performed.
    pub async fn read_complete(
        &mut self,
        frames: &[Frame],
        reply: &mut ReplyAccumulator,
    ) -> DlmsResult<usize> {
        let mut continuations = 0;
        for frame in frames {
            reply.clear();
            if frame.is_empty() {
                continue;
            }
            self.engine.exchange(Some(frame), reply).await?;
            while reply.more_data {
                if reply.streaming {
                    self.engine.exchange(None, reply).await?;
                } else {
                    let ready = self.engine.codec_mut().receiver_ready(reply)?;
                    self.engine.exchange(Some(&ready), reply).await?;
                }
                continuations += 1;
            }
        }
        if continuations > 0 {
            log::debug!("Reply assembled from {} blocks", reply.blocks);
        }
        Ok(continuations)
    }

    /// Encode `operation` and read its complete reply
    pub async fn request(
        &mut self,
        operation: &Operation,
        reply: &mut ReplyAccumulator,
    ) -> DlmsResult<usize> {
        let frames = self.engine.codec_mut().encode(operation)?;
        self.read_complete(&frames, reply).await
    }
}
