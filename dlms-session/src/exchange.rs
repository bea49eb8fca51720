//! Exchange engine: one request frame in, one reassembled reply block out

use crate::accumulator::ReplyAccumulator;
use crate::codec::{DecodeStatus, Frame, FrameCodec};
use crate::settings::ExchangeSettings;
use crate::statistics::ExchangeStatistics;
use crate::trace::{LogNotificationSink, NotificationSink, NullTraceSink, TraceRecord, TraceSink};
use bytes::BytesMut;
use dlms_core::{DlmsError, DlmsResult};
use dlms_transport::TransportLayer;
use std::sync::Arc;
use std::time::Duration;

/// Longest wait for bytes left over from an interrupted exchange
const STALE_REPLY_WAIT: Duration = Duration::from_millis(200);

/// Receives spent draining before the next request is sent anyway
const MAX_STALE_READS: usize = 16;

/// Why a receive attempt has to be repeated
enum Retry {
    Timeout,
    Malformed(String),
}

/// Drives send, receive, resend and reassembly over one transport
///
/// The engine owns the transport for the lifetime of the connection, so a
/// second logical request cannot interleave with a running one.
pub struct ExchangeEngine<T, C> {
    transport: T,
    codec: C,
    settings: ExchangeSettings,
    trace: Arc<dyn TraceSink>,
    notifications: Arc<dyn NotificationSink>,
    statistics: ExchangeStatistics,
    rx: BytesMut,
    /// Set while an exchange runs; still set if its future was dropped
    interrupted: bool,
}

impl<T: TransportLayer, C: FrameCodec> ExchangeEngine<T, C> {
    pub fn new(transport: T, codec: C, settings: ExchangeSettings) -> Self {
        Self {
            transport,
            codec,
            settings,
            trace: Arc::new(NullTraceSink),
            notifications: Arc::new(LogNotificationSink),
            statistics: ExchangeStatistics::new(),
            rx: BytesMut::with_capacity(256),
            interrupted: false,
        }
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn settings(&self) -> &ExchangeSettings {
        &self.settings
    }

    pub fn statistics(&self) -> &ExchangeStatistics {
        &self.statistics
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut C {
        &mut self.codec
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_parts(self) -> (T, C) {
        (self.transport, self.codec)
    }

    /// Send `frame` and wait for the matching reply block
    ///
    /// With `frame == None`, or while the reply is streaming, nothing is
    /// sent and the engine only waits for the next block.
    ///
    /// A timed out or malformed receive resends the same frame, at most
    /// `max_retries` times, before failing with
    /// [`DlmsError::ExchangeTimeout`]. A busy answer waits `busy_backoff`
    /// and repeats the exchange, at most `max_busy_retries` times, without
    /// touching the resend budget. Any other device error code fails with
    /// [`DlmsError::DeviceProtocol`]. I/O errors are returned as they are.
    ///
    /// When the previous exchange was dropped before it finished, e.g. by
    /// an outer timeout, the bytes of its late reply are discarded first.
    pub async fn exchange(
        &mut self,
        frame: Option<&Frame>,
        reply: &mut ReplyAccumulator,
    ) -> DlmsResult<()> {
        if self.interrupted {
            self.discard_stale_reply().await?;
        }
        self.interrupted = true;
        let result = self.exchange_with_backoff(frame, reply).await;
        self.interrupted = false;
        result
    }

    async fn exchange_with_backoff(
        &mut self,
        frame: Option<&Frame>,
        reply: &mut ReplyAccumulator,
    ) -> DlmsResult<()> {
        let frame = if reply.streaming { None } else { frame };
        let mut busy_retries = 0;
        loop {
            self.exchange_once(frame, reply).await?;

            let Some(code) = reply.error_code() else {
                return Ok(());
            };
            if !code.is_busy() {
                return Err(DlmsError::DeviceProtocol(code));
            }
            if busy_retries >= self.settings.max_busy_retries {
                log::error!("Device still busy after {} retries", busy_retries);
                return Err(DlmsError::DeviceProtocol(code));
            }
            busy_retries += 1;
            self.statistics.increment_busy_retries();
            log::warn!(
                "Device busy, retrying in {:?} ({}/{})",
                self.settings.busy_backoff,
                busy_retries,
                self.settings.max_busy_retries
            );
            reply.error = 0;
            tokio::time::sleep(self.settings.busy_backoff).await;
        }
    }

    async fn exchange_once(
        &mut self,
        frame: Option<&Frame>,
        reply: &mut ReplyAccumulator,
    ) -> DlmsResult<()> {
        let attempts_allowed = self.settings.max_retries + 1;
        let mut attempt = 1;
        self.rx.clear();
        if let Some(frame) = frame {
            self.send(frame).await?;
        }

        loop {
            let retry = match self.receive_fragment(reply).await? {
                None => return Ok(()),
                Some(retry) => retry,
            };

            match retry {
                Retry::Timeout => self.statistics.increment_timeouts(),
                Retry::Malformed(reason) => {
                    self.statistics.increment_malformed_replies();
                    log::warn!("Malformed reply: {}", reason);
                }
            }
            if attempt >= attempts_allowed {
                log::error!(
                    "Failed to receive reply from the device in given time ({} attempts)",
                    attempt
                );
                return Err(DlmsError::ExchangeTimeout { attempts: attempt });
            }
            log::warn!("Data send failed. Try to resend {}/{}", attempt, self.settings.max_retries);
            attempt += 1;
            self.rx.clear();
            if let Some(frame) = frame {
                self.statistics.increment_resends();
                self.send(frame).await?;
            }
        }
    }

    /// Receive until the codec completes a frame
    ///
    /// Returns `None` once a reply frame was consumed, or the reason the
    /// attempt must be repeated. Notifications are diverted and waiting
    /// continues.
    async fn receive_fragment(&mut self, reply: &mut ReplyAccumulator) -> DlmsResult<Option<Retry>> {
        loop {
            let expected = self.codec.expected_fragment_size(&self.rx);
            let params = self
                .codec
                .interface_type()
                .receive_parameters(self.rx.len(), expected);

            let bytes = match self
                .transport
                .receive(&params, self.settings.receive_timeout)
                .await
            {
                Ok(bytes) => bytes,
                Err(DlmsError::Timeout) => {
                    self.trace.record(TraceRecord::timed_out());
                    return Ok(Some(Retry::Timeout));
                }
                Err(e) => return Err(e),
            };
            self.trace.record(TraceRecord::received(&bytes));
            self.statistics.increment_frames_received();
            self.rx.extend_from_slice(&bytes);

            // A single receive may hold several frames, e.g. a push message
            // followed by the reply.
            loop {
                match self.codec.decode(&mut self.rx, reply) {
                    Ok(DecodeStatus::Incomplete) => break,
                    Ok(DecodeStatus::Complete) => return Ok(None),
                    Ok(DecodeStatus::Notification { value }) => {
                        self.statistics.increment_notifications();
                        log::debug!("Diverting notification: {}", value);
                        self.notifications.notify(value);
                        if self.rx.is_empty() {
                            break;
                        }
                    }
                    Err(DlmsError::FrameInvalid(reason)) => {
                        return Ok(Some(Retry::Malformed(reason)));
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    /// Drop buffered bytes and read until the line stays quiet
    async fn discard_stale_reply(&mut self) -> DlmsResult<()> {
        self.rx.clear();
        self.codec.reset();
        let wait = self.settings.receive_timeout.min(STALE_REPLY_WAIT);
        let params = self
            .codec
            .interface_type()
            .receive_parameters(0, self.codec.expected_fragment_size(&[]));

        let mut discarded = 0;
        for _ in 0..MAX_STALE_READS {
            match self.transport.receive(&params, wait).await {
                Ok(bytes) => {
                    self.trace.record(TraceRecord::received(&bytes));
                    discarded += bytes.len();
                }
                Err(DlmsError::Timeout) => break,
                Err(e) => return Err(e),
            }
        }
        if discarded > 0 {
            log::warn!("Discarded {} bytes left over from an interrupted exchange", discarded);
        }
        self.interrupted = false;
        Ok(())
    }

    async fn send(&mut self, frame: &Frame) -> DlmsResult<()> {
        self.trace.record(TraceRecord::sent(frame));
        self.statistics.increment_frames_sent();
        self.transport.send(frame).await
    }
}
