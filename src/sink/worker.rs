//! A single log sink worker.
//!
//! The worker is the only owner of its buffer: it drains its intake queue
//! one record at a time, so appends and flushes never interleave.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::sink::SinkCounters;

/// Sending half of a worker's intake queue.
pub(crate) type WorkerSender = mpsc::Sender<Vec<u8>>;

pub(crate) struct SinkWorker {
    id: usize,
    dir: PathBuf,
    buffer: Vec<u8>,
    capacity: usize,
    last_stamp: i64,
    rx: mpsc::Receiver<Vec<u8>>,
    counters: Arc<SinkCounters>,
}

impl SinkWorker {
    /// Create a worker and the sender for its queue of `depth` records.
    pub(crate) fn new(
        id: usize,
        dir: PathBuf,
        capacity: usize,
        depth: usize,
        counters: Arc<SinkCounters>,
    ) -> (WorkerSender, Self) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let worker = Self {
            id,
            dir,
            buffer: Vec::with_capacity(capacity),
            capacity,
            last_stamp: 0,
            rx,
            counters,
        };
        (tx, worker)
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Consume the queue until every sender is gone, then flush the rest.
    async fn run(mut self) {
        while let Some(record) = self.rx.recv().await {
            self.accept(record).await;
        }
        self.flush().await;
        log::debug!("sink worker {} in {} stopped", self.id, self.dir.display());
    }

    async fn accept(&mut self, record: Vec<u8>) {
        if record.len() > self.capacity {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "sink worker {}: dropping {}-byte record larger than its {}-byte buffer",
                self.id,
                record.len(),
                self.capacity
            );
            return;
        }
        if self.buffer.len() + record.len() > self.capacity {
            self.flush().await;
        }
        self.buffer.extend_from_slice(&record);
    }

    /// Write the buffer to a new segment and reset the position.
    ///
    /// A failed write loses the buffered bytes; the worker keeps running.
    async fn flush(&mut self) -> Option<PathBuf> {
        if self.buffer.is_empty() {
            return None;
        }

        let stamp = self.next_stamp();
        let segment = self.dir.join(format!("{}_{}.log", self.id, stamp));
        let tmp = self.dir.join(format!(".{}_{}.tmp", self.id, stamp));

        let result = write_segment(&tmp, &segment, &self.buffer).await;
        let flushed = self.buffer.len();
        self.buffer.clear();

        match result {
            Ok(()) => {
                self.counters.segments.fetch_add(1, Ordering::Relaxed);
                log::debug!("flushed {} bytes to {}", flushed, segment.display());
                Some(segment)
            }
            Err(e) => {
                self.counters.flush_failures.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "sink worker {}: failed to flush {} bytes to {}: {}",
                    self.id,
                    flushed,
                    segment.display(),
                    e
                );
                let _ = tokio::fs::remove_file(&tmp).await;
                None
            }
        }
    }

    /// Flush timestamp in nanoseconds, strictly increasing per worker.
    fn next_stamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.last_stamp = now.max(self.last_stamp + 1);
        self.last_stamp
    }
}

async fn write_segment(tmp: &Path, segment: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp, segment).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn worker(dir: &Path, capacity: usize) -> (WorkerSender, SinkWorker, Arc<SinkCounters>) {
        let counters = Arc::new(SinkCounters::default());
        let (tx, worker) = SinkWorker::new(3, dir.to_path_buf(), capacity, 8, counters.clone());
        (tx, worker, counters)
    }

    #[tokio::test]
    async fn flush_names_segment_by_worker_and_stamp() {
        let tmp = TempDir::new().unwrap();
        let (_tx, mut worker, counters) = worker(tmp.path(), 16);

        worker.accept(b"hello".to_vec()).await;
        let segment = worker.flush().await.unwrap();

        let name = segment.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("3_"));
        assert!(name.ends_with(".log"));
        assert_eq!(std::fs::read(&segment).unwrap(), b"hello");
        assert_eq!(counters.segments.load(Ordering::Relaxed), 1);
        assert!(worker.buffer.is_empty());
    }

    #[tokio::test]
    async fn overflow_flushes_before_append() {
        let tmp = TempDir::new().unwrap();
        let (_tx, mut worker, counters) = worker(tmp.path(), 8);

        worker.accept(b"12345".to_vec()).await;
        worker.accept(b"678".to_vec()).await;
        assert_eq!(counters.segments.load(Ordering::Relaxed), 0);

        worker.accept(b"9".to_vec()).await;
        assert_eq!(counters.segments.load(Ordering::Relaxed), 1);
        assert_eq!(worker.buffer, b"9");
    }

    #[tokio::test]
    async fn oversized_record_is_rejected_whole() {
        let tmp = TempDir::new().unwrap();
        let (_tx, mut worker, counters) = worker(tmp.path(), 4);

        worker.accept(b"ab".to_vec()).await;
        worker.accept(b"too large".to_vec()).await;

        assert_eq!(worker.buffer, b"ab");
        assert_eq!(counters.rejected.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn flush_of_empty_buffer_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let (_tx, mut worker, _) = worker(tmp.path(), 4);
        assert!(worker.flush().await.is_none());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_flush_is_counted_and_worker_continues() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("removed");
        let (_tx, mut worker, counters) = worker(&missing, 4);

        worker.accept(b"abc".to_vec()).await;
        assert!(worker.flush().await.is_none());
        assert_eq!(counters.flush_failures.load(Ordering::Relaxed), 1);
        assert!(worker.buffer.is_empty());

        std::fs::create_dir_all(&missing).unwrap();
        worker.accept(b"xyz".to_vec()).await;
        assert!(worker.flush().await.is_some());
    }

    #[test]
    fn stamps_strictly_increase() {
        let tmp = TempDir::new().unwrap();
        let (_tx, mut worker, _) = worker(tmp.path(), 4);
        let a = worker.next_stamp();
        let b = worker.next_stamp();
        let c = worker.next_stamp();
        assert!(a < b && b < c);
    }
}
