//! Diagnostics trace and notification sinks
//!
//! Both sinks are write-only and must never fail the exchange. Sinks that
//! can fail log the problem and drop the record.

use chrono::Local;
use dlms_core::DataObject;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Direction of a traced frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Tx,
    Rx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Tx => f.write_str("TX"),
            Direction::Rx => f.write_str("RX"),
        }
    }
}

/// One physical send or receive attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub direction: Direction,
    /// Local wall-clock time, `HH:MM:SS.mmm`
    pub timestamp: String,
    /// Uppercase hex of the bytes on the wire
    pub payload: String,
    /// The receive attempt hit its deadline
    pub timed_out: bool,
}

impl TraceRecord {
    pub fn sent(data: &[u8]) -> Self {
        Self::now(Direction::Tx, data, false)
    }

    pub fn received(data: &[u8]) -> Self {
        Self::now(Direction::Rx, data, false)
    }

    /// A receive attempt that got nothing before its deadline
    pub fn timed_out() -> Self {
        Self::now(Direction::Rx, &[], true)
    }

    fn now(direction: Direction, data: &[u8], timed_out: bool) -> Self {
        Self {
            direction,
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
            payload: hex::encode_upper(data),
            timed_out,
        }
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timed_out {
            write!(f, "{}\t{}:\t<timeout>", self.timestamp, self.direction)
        } else {
            write!(f, "{}\t{}:\t{}", self.timestamp, self.direction, self.payload)
        }
    }
}

/// Receiver of every physical frame
#[cfg_attr(test, mockall::automock)]
pub trait TraceSink: Send + Sync {
    fn record(&self, record: TraceRecord);
}

/// Receiver of out-of-band values pushed by the meter
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    fn notify(&self, value: DataObject);
}

/// Discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn record(&self, _record: TraceRecord) {}
}

/// Writes records to the `dlms::trace` log target at trace level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn record(&self, record: TraceRecord) {
        log::trace!(target: "dlms::trace", "{}", record);
    }
}

/// Appends one line per record to a file
///
/// Records are queued to a writer task, so recording never waits for the
/// disk. The task flushes whenever the queue runs empty and ends once
/// every clone of the sink is dropped.
#[derive(Debug, Clone)]
pub struct FileTraceSink {
    path: PathBuf,
    sender: mpsc::UnboundedSender<TraceRecord>,
}

impl FileTraceSink {
    /// Open `path` for appending and spawn the writer task
    ///
    /// Must be called within a tokio runtime. Await the returned handle
    /// after dropping the sink to be sure every record reached the file.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<(Self, JoinHandle<()>)> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_records(path.clone(), BufWriter::new(file), receiver));
        Ok((Self { path, sender }, writer))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TraceSink for FileTraceSink {
    fn record(&self, record: TraceRecord) {
        if self.sender.send(record).is_err() {
            log::warn!("Trace writer for {} has stopped, record dropped", self.path.display());
        }
    }
}

async fn write_records(
    path: PathBuf,
    mut file: BufWriter<File>,
    mut receiver: mpsc::UnboundedReceiver<TraceRecord>,
) {
    while let Some(record) = receiver.recv().await {
        let line = format!("{}\n", record);
        let mut written = file.write_all(line.as_bytes()).await;
        if written.is_ok() && receiver.is_empty() {
            written = file.flush().await;
        }
        if let Err(e) = written {
            log::warn!("Failed to write trace to {}: {}", path.display(), e);
            return;
        }
    }
    if let Err(e) = file.flush().await {
        log::warn!("Failed to flush trace to {}: {}", path.display(), e);
    }
}

/// Keeps records in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryTraceSink {
    records: Arc<Mutex<Vec<TraceRecord>>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TraceRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.lock().clone()
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.lock().iter().filter(|r| r.direction == direction).count()
    }

    /// Receive attempts that timed out
    pub fn timeouts(&self) -> usize {
        self.lock().iter().filter(|r| r.timed_out).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl TraceSink for MemoryTraceSink {
    fn record(&self, record: TraceRecord) {
        self.lock().push(record);
    }
}

/// Logs pushed values at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, value: DataObject) {
        log::info!("Notification received: {}", value);
    }
}

/// Forwards pushed values into a tokio channel
///
/// A closed receiver only produces a debug log line.
#[derive(Debug, Clone)]
pub struct ChannelNotificationSink {
    sender: mpsc::UnboundedSender<DataObject>,
}

impl ChannelNotificationSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DataObject>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelNotificationSink {
    fn notify(&self, value: DataObject) {
        if self.sender.send(value).is_err() {
            log::debug!("Notification dropped, receiver closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_formatting() {
        let record = TraceRecord::sent(&[0x7E, 0xA0, 0x0a]);
        assert_eq!(record.payload, "7EA00A");
        assert_eq!(record.timestamp.len(), "12:00:00.000".len());
        assert!(record.to_string().ends_with("TX:\t7EA00A"));
        assert!(TraceRecord::timed_out().to_string().ends_with("RX:\t<timeout>"));
    }

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemoryTraceSink::new();
        let shared = sink.clone();
        sink.record(TraceRecord::sent(&[1]));
        sink.record(TraceRecord::timed_out());
        sink.record(TraceRecord::received(&[2]));
        assert_eq!(shared.count(Direction::Rx), 2);
        assert_eq!(shared.count(Direction::Tx), 1);
        assert_eq!(shared.timeouts(), 1);
    }

    #[tokio::test]
    async fn test_file_sink_appends_lines() {
        let path = std::env::temp_dir().join(format!("dlms-trace-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let (sink, writer) = FileTraceSink::open(&path).await.unwrap();
        let shared = sink.clone();
        sink.record(TraceRecord::sent(&[0x01]));
        shared.record(TraceRecord::received(&[0x02]));
        drop(sink);
        drop(shared);
        writer.await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("TX:\t01"));
        assert!(lines[1].ends_with("RX:\t02"));
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_file_sink_open_error() {
        assert!(FileTraceSink::open("/nonexistent-dir/trace.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_file_sink_drops_records_after_writer_stops() {
        let path = std::env::temp_dir().join(format!("dlms-trace-stop-{}.txt", std::process::id()));
        let (sink, writer) = FileTraceSink::open(&path).await.unwrap();
        writer.abort();
        assert!(writer.await.unwrap_err().is_cancelled());
        sink.record(TraceRecord::sent(&[0x01]));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_channel_notification_sink() {
        let (sink, mut receiver) = ChannelNotificationSink::channel();
        sink.notify(DataObject::Unsigned16(7));
        assert_eq!(receiver.recv().await, Some(DataObject::Unsigned16(7)));
        drop(receiver);
        sink.notify(DataObject::Null);
    }
}
