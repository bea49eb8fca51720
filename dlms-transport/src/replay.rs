//! Scripted transport for replaying captured meter exchanges

use crate::stream::{ReceiveParameters, TransportLayer};
use async_trait::async_trait;
use bytes::Bytes;
use dlms_core::{DlmsError, DlmsResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One scripted answer to a `receive` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayStep {
    /// Bytes the meter sends back
    Reply(Vec<u8>),
    /// The meter stays silent for this receive
    Timeout,
    /// The connection fails with an I/O error of this kind
    Fail(std::io::ErrorKind),
}

/// What the replay transport has seen so far
#[derive(Debug, Default)]
struct ReplayLog {
    sent: Vec<Vec<u8>>,
    receives: usize,
    opens: usize,
    closes: usize,
}

/// Shared view of a [`ReplayTransport`]'s log
///
/// Cloned out before the transport is moved into a reader, so tests can
/// inspect the traffic afterwards.
#[derive(Debug, Clone, Default)]
pub struct ReplayHandle {
    log: Arc<Mutex<ReplayLog>>,
}

impl ReplayHandle {
    fn lock(&self) -> MutexGuard<'_, ReplayLog> {
        // A panic while holding the lock leaves the log usable.
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    pub fn receives(&self) -> usize {
        self.lock().receives
    }

    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }
}

/// Transport that answers receives from a script instead of a meter
///
/// An exhausted script behaves like a silent meter.
#[derive(Debug, Default)]
pub struct ReplayTransport {
    script: VecDeque<ReplayStep>,
    handle: ReplayHandle,
    open: bool,
    fail_open: Option<std::io::ErrorKind>,
}

impl ReplayTransport {
    pub fn new(script: impl IntoIterator<Item = ReplayStep>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Script of plain replies
    pub fn from_replies<I, B>(replies: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self::new(replies.into_iter().map(|r| ReplayStep::Reply(r.into())))
    }

    /// Make `open` fail with the given error kind
    pub fn failing_open(mut self, kind: std::io::ErrorKind) -> Self {
        self.fail_open = Some(kind);
        self
    }

    pub fn push(&mut self, step: ReplayStep) {
        self.script.push_back(step);
    }

    pub fn handle(&self) -> ReplayHandle {
        self.handle.clone()
    }

    /// Steps not consumed yet
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl TransportLayer for ReplayTransport {
    async fn open(&mut self) -> DlmsResult<()> {
        self.handle.lock().opens += 1;
        if let Some(kind) = self.fail_open {
            return Err(DlmsError::Connection(std::io::Error::new(
                kind,
                "Replay transport refused to open",
            )));
        }
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> DlmsResult<()> {
        self.handle.lock().closes += 1;
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn send(&mut self, data: &[u8]) -> DlmsResult<()> {
        if !self.open {
            return Err(crate::stream::not_connected("Replay transport"));
        }
        self.handle.lock().sent.push(data.to_vec());
        Ok(())
    }

    async fn receive(
        &mut self,
        _params: &ReceiveParameters,
        _timeout: Duration,
    ) -> DlmsResult<Bytes> {
        self.handle.lock().receives += 1;
        match self.script.pop_front() {
            Some(ReplayStep::Reply(bytes)) => Ok(Bytes::from(bytes)),
            Some(ReplayStep::Fail(kind)) => Err(DlmsError::Connection(std::io::Error::new(
                kind,
                "Replay transport failure",
            ))),
            Some(ReplayStep::Timeout) | None => Err(DlmsError::Timeout),
        }
    }
}
