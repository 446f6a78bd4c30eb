//! Newline-delimited JSON notification reader

use super::{parse_notification, EventSource, GcSample, PushEventSource};
use crate::error::SourceError;
use crate::listeners::Listener;
use crate::observability::MonitorMetrics;
use chrono::Utc;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

/// Event source fed by GC notifications, one JSON object per line
///
/// The reader is consumed by a task spawned on the first `start()`. While
/// the source is stopped, lines are still read but discarded. Lines that
/// cannot be turned into an event are logged and counted, never fatal.
pub struct StreamEventSource {
    events: Arc<PushEventSource>,
    reader: Mutex<Option<BoxedReader>>,
    task: Mutex<Option<JoinHandle<()>>>,
    metrics: MonitorMetrics,
}

impl StreamEventSource {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            events: Arc::new(PushEventSource::new()),
            reader: Mutex::new(Some(Box::pin(reader))),
            task: Mutex::new(None),
            metrics: MonitorMetrics::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.events.is_running()
    }

    /// Whether the underlying stream has been fully consumed (or failed)
    pub fn is_finished(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false)
    }
}

impl EventSource for StreamEventSource {
    fn start(&self) -> Result<(), SourceError> {
        let mut task = lock(&self.task);
        if task.is_none() {
            let handle = Handle::try_current().map_err(|_| SourceError::NoRuntime)?;
            if let Some(reader) = lock(&self.reader).take() {
                let events = Arc::clone(&self.events);
                let metrics = self.metrics.clone();
                *task = Some(handle.spawn(pump(reader, events, metrics)));
            }
        }

        self.events.start()?;
        info!("GC notification stream source started");
        Ok(())
    }

    fn stop(&self) {
        self.events.stop();
        info!("GC notification stream source stopped");
    }

    fn add_listener(&self, listener: Listener<GcSample>) {
        self.events.add_listener(listener);
    }

    fn remove_listener(&self, listener: &Listener<GcSample>) -> bool {
        self.events.remove_listener(listener)
    }
}

impl Drop for StreamEventSource {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }
}

/// Longest notification line accepted; longer lines are skipped
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Outcome of reading one newline-terminated frame
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Line,
    /// Line exceeded the limit and was discarded (its length in bytes)
    Oversized(usize),
    Eof,
}

/// Read the next line into `buf` without buffering more than `limit` bytes
async fn next_frame<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut dropped = 0usize;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match dropped {
                0 if buf.is_empty() => Frame::Eof,
                0 => Frame::Line,
                n => Frame::Oversized(n),
            });
        }

        let newline = available.iter().position(|b| *b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];
        let consumed = chunk.len() + usize::from(newline.is_some());

        if dropped == 0 && buf.len() + chunk.len() <= limit {
            buf.extend_from_slice(chunk);
        } else {
            dropped += buf.len() + chunk.len();
            buf.clear();
        }
        reader.consume(consumed);

        if newline.is_some() {
            return Ok(match dropped {
                0 => Frame::Line,
                n => Frame::Oversized(n),
            });
        }
    }
}

async fn pump(reader: BoxedReader, events: Arc<PushEventSource>, metrics: MonitorMetrics) {
    pump_with_limit(reader, events, metrics, MAX_LINE_BYTES).await
}

async fn pump_with_limit(
    reader: BoxedReader,
    events: Arc<PushEventSource>,
    metrics: MonitorMetrics,
    limit: usize,
) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        match next_frame(&mut reader, &mut buf, limit).await {
            Ok(Frame::Line) => {
                let line = match std::str::from_utf8(&buf) {
                    Ok(line) => line.trim(),
                    Err(e) => {
                        metrics.inc_notifications_rejected();
                        warn!(error = %e, "Rejected GC notification: not valid UTF-8");
                        continue;
                    }
                };
                if line.is_empty() {
                    continue;
                }
                if !events.is_running() {
                    trace!("Source stopped, discarding GC notification");
                    continue;
                }

                match parse_notification(line, Utc::now()) {
                    Ok(sample) => {
                        debug!(
                            collection = %sample.payload().collection(),
                            timestamp = %sample.timestamp(),
                            "Received GC notification"
                        );
                        events.publish(sample);
                    }
                    Err(e) => {
                        metrics.inc_notifications_rejected();
                        warn!(error = %e, "Rejected GC notification");
                    }
                }
            }
            Ok(Frame::Oversized(len)) => {
                metrics.inc_notifications_rejected();
                warn!(len = len, limit = limit, "Rejected GC notification: line too long");
            }
            Ok(Frame::Eof) => {
                info!("GC notification stream closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read GC notification stream");
                break;
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::listener;
    use crate::models::PoolType;
    use std::io::Cursor;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    const MAJOR: &str = r#"{"action":"end of major GC","memory_after_gc":{"G1 Old Gen":{"init":0,"used":50,"committed":60,"max":100}}}"#;

    fn collecting(source: &StreamEventSource) -> Arc<Mutex<Vec<GcSample>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        source.add_listener(listener(move |event: &GcSample| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        }));
        seen
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let source = StreamEventSource::new(Cursor::new(Vec::new()));
        assert!(matches!(source.start(), Err(SourceError::NoRuntime)));
        assert!(!source.is_running());
    }

    #[tokio::test]
    async fn test_valid_lines_are_delivered_bad_lines_skipped() {
        let input = format!("{}\n\nnot json\n{}\n", MAJOR, MAJOR);
        let source = StreamEventSource::new(Cursor::new(input.into_bytes()));
        let seen = collecting(&source);

        source.start().unwrap();
        wait_until(|| source.is_finished()).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].payload().reading(PoolType::Old).unwrap().used(), 50);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let mut input = format!("{}\n", MAJOR).into_bytes();
        input.extend_from_slice(b"\xff\xfe\n");
        input.extend_from_slice(format!("{}\n", MAJOR).as_bytes());

        let source = StreamEventSource::new(Cursor::new(input));
        let seen = collecting(&source);

        source.start().unwrap();
        wait_until(|| source.is_finished()).await;

        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped() {
        let events = Arc::new(PushEventSource::new());
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        events.add_listener(listener(move |_: &GcSample| {
            *sink.lock().unwrap() += 1;
            Ok(())
        }));
        events.start().unwrap();

        let input = format!("{}\n{}\n{}", MAJOR, "x".repeat(4 * MAJOR.len()), MAJOR);
        pump_with_limit(
            Box::pin(Cursor::new(input.into_bytes())),
            Arc::clone(&events),
            MonitorMetrics::new(),
            2 * MAJOR.len(),
        )
        .await;

        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_next_frame_bounds_buffer() {
        let mut reader = BufReader::with_capacity(4, Cursor::new(b"abc\nabcdefgh\nxy".to_vec()));
        let mut buf = Vec::new();

        assert_eq!(next_frame(&mut reader, &mut buf, 5).await.unwrap(), Frame::Line);
        assert_eq!(buf, b"abc");
        assert_eq!(
            next_frame(&mut reader, &mut buf, 5).await.unwrap(),
            Frame::Oversized(8)
        );
        assert!(buf.is_empty());
        assert_eq!(next_frame(&mut reader, &mut buf, 5).await.unwrap(), Frame::Line);
        assert_eq!(buf, b"xy");
        assert_eq!(next_frame(&mut reader, &mut buf, 5).await.unwrap(), Frame::Eof);
    }

    #[tokio::test]
    async fn test_lines_while_stopped_are_discarded() {
        let (mut writer, reader) = tokio::io::duplex(4096);
        let source = StreamEventSource::new(reader);
        let seen = collecting(&source);

        source.start().unwrap();
        writer.write_all(format!("{}\n", MAJOR).as_bytes()).await.unwrap();
        wait_until(|| seen.lock().unwrap().len() == 1).await;

        source.stop();
        writer.write_all(format!("{}\n", MAJOR).as_bytes()).await.unwrap();
        drop(writer);
        wait_until(|| source.is_finished()).await;

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restart_resumes_delivery() {
        let (mut writer, reader) = tokio::io::duplex(4096);
        let source = StreamEventSource::new(reader);
        let seen = collecting(&source);

        source.start().unwrap();
        source.stop();
        source.start().unwrap();

        writer.write_all(format!("{}\n", MAJOR).as_bytes()).await.unwrap();
        wait_until(|| seen.lock().unwrap().len() == 1).await;
    }
}
