//! Buffered segment log.
//!
//! Every series (message, mention, ...) gets its own pool of workers, each
//! with a private fixed-size buffer and a bounded intake queue. Buffers are
//! flushed to immutable segment files:
//!
//! ```text
//! {root}/
//! └── {series}/
//!     ├── 0_1717230000123456789.log
//!     ├── 0_1717230004567891234.log
//!     └── 1_1717230001234567890.log
//! ```
//!
//! Concatenating one worker's segments in timestamp order yields exactly the
//! bytes submitted to that worker. Nothing is ordered across workers.
//!
//! The sink is lossy under overload: a submit that cannot be enqueued within
//! the enqueue timeout is dropped and reported to the caller.

mod worker;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::error::SinkError;
use crate::models::SinkConfig;
use worker::{SinkWorker, WorkerSender};

/// Counters shared by the sink and its workers.
#[derive(Debug, Default)]
pub(crate) struct SinkCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
    segments: AtomicU64,
    flush_failures: AtomicU64,
}

impl SinkCounters {
    fn snapshot(&self) -> SinkStats {
        SinkStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            segments: self.segments.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time sink statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Records enqueued to a worker
    pub accepted: u64,
    /// Records larger than a worker buffer
    pub rejected: u64,
    /// Records dropped on saturated queues
    pub dropped: u64,
    /// Segments written
    pub segments: u64,
    /// Segment writes that failed
    pub flush_failures: u64,
}

/// Worker pool of one series.
struct SeriesPool {
    series: String,
    senders: RwLock<Vec<WorkerSender>>,
    next: AtomicUsize,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SeriesPool {
    /// Build the pool and its (not yet running) workers.
    fn new(
        series: &str,
        dir: &Path,
        config: &SinkConfig,
        counters: &Arc<SinkCounters>,
    ) -> (Self, Vec<SinkWorker>) {
        let (senders, workers): (Vec<WorkerSender>, Vec<SinkWorker>) = (0..config.workers.max(1))
            .map(|id| {
                SinkWorker::new(
                    id,
                    dir.to_path_buf(),
                    config.buffer_capacity,
                    config.queue_depth,
                    Arc::clone(counters),
                )
            })
            .unzip();

        let pool = Self {
            series: series.to_string(),
            senders: RwLock::new(senders),
            next: AtomicUsize::new(0),
            tasks: Mutex::new(Vec::new()),
        };
        (pool, workers)
    }

    async fn start(&self, workers: Vec<SinkWorker>) {
        let mut tasks = self.tasks.lock().await;
        tasks.extend(workers.into_iter().map(SinkWorker::spawn));
    }

    /// Hand `record` to some worker.
    ///
    /// Tries every queue without waiting, starting at the round-robin
    /// position, then waits up to `timeout` on that first queue.
    async fn route(&self, mut record: Vec<u8>, timeout: Duration) -> Result<(), SinkError> {
        let senders = self.senders.read().await;
        if senders.is_empty() {
            return Err(SinkError::Closed);
        }

        let start = self.next.fetch_add(1, Ordering::Relaxed) % senders.len();
        for offset in 0..senders.len() {
            let sender = &senders[(start + offset) % senders.len()];
            match sender.try_send(record) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(returned)) => record = returned,
                Err(TrySendError::Closed(_)) => return Err(SinkError::Closed),
            }
        }

        match senders[start].send_timeout(record, timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(SinkError::QueueSaturated {
                series: self.series.clone(),
            }),
            Err(SendTimeoutError::Closed(_)) => Err(SinkError::Closed),
        }
    }

    /// Close every queue and wait for the workers to flush and exit.
    async fn shutdown(&self) {
        self.senders.write().await.clear();
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                log::error!("sink worker for series '{}' panicked: {}", self.series, e);
            }
        }
    }
}

enum SeriesState {
    Ready(Arc<SeriesPool>),
    Unavailable(String),
}

/// Buffered, concurrent, append-only log writer.
pub struct LogSink {
    config: SinkConfig,
    pools: Mutex<HashMap<String, SeriesState>>,
    counters: Arc<SinkCounters>,
    closed: AtomicBool,
}

impl LogSink {
    pub fn new(config: SinkConfig) -> Self {
        Self {
            config,
            pools: Mutex::new(HashMap::new()),
            counters: Arc::new(SinkCounters::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Directory holding the segments of `series`.
    pub fn series_dir(&self, series: &str) -> PathBuf {
        self.config.root_dir.join(series)
    }

    /// Submit one record to `series`.
    ///
    /// The series' directory and workers are set up on first use. Records are
    /// never split: one larger than the buffer capacity is rejected.
    pub async fn submit(&self, series: &str, record: Vec<u8>) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::Closed);
        }
        if record.len() > self.config.buffer_capacity {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(SinkError::CapacityExceeded {
                len: record.len(),
                capacity: self.config.buffer_capacity,
            });
        }

        let pool = self.pool(series).await?;
        match pool.route(record, self.config.enqueue_timeout()).await {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                if matches!(e, SinkError::QueueSaturated { .. }) {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(e)
            }
        }
    }

    /// Flush all buffered records and stop every worker.
    ///
    /// Submits after shutdown fail with [`SinkError::Closed`].
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let pools: Vec<Arc<SeriesPool>> = self
            .pools
            .lock()
            .await
            .values()
            .filter_map(|state| match state {
                SeriesState::Ready(pool) => Some(Arc::clone(pool)),
                SeriesState::Unavailable(_) => None,
            })
            .collect();

        for pool in pools {
            pool.shutdown().await;
        }
        log::info!("log sink shut down: {:?}", self.stats());
    }

    pub fn stats(&self) -> SinkStats {
        self.counters.snapshot()
    }

    async fn pool(&self, series: &str) -> Result<Arc<SeriesPool>, SinkError> {
        let mut pools = self.pools.lock().await;
        // Checked under the lock: shutdown snapshots pools after setting it.
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::Closed);
        }
        if let Some(state) = pools.get(series) {
            return match state {
                SeriesState::Ready(pool) => Ok(Arc::clone(pool)),
                SeriesState::Unavailable(reason) => Err(SinkError::SeriesUnavailable {
                    series: series.to_string(),
                    reason: reason.clone(),
                }),
            };
        }

        match self.open_series(series).await {
            Ok(pool) => {
                pools.insert(series.to_string(), SeriesState::Ready(Arc::clone(&pool)));
                Ok(pool)
            }
            Err(reason) => {
                log::error!("log series '{series}' disabled: {reason}");
                pools.insert(
                    series.to_string(),
                    SeriesState::Unavailable(reason.clone()),
                );
                Err(SinkError::SeriesUnavailable {
                    series: series.to_string(),
                    reason,
                })
            }
        }
    }

    async fn open_series(&self, series: &str) -> Result<Arc<SeriesPool>, String> {
        if series.is_empty()
            || series == "."
            || series == ".."
            || series.contains(['/', '\\'])
        {
            return Err(format!("invalid series name '{series}'"));
        }

        let dir = self.series_dir(series);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| format!("cannot create {}: {e}", dir.display()))?;

        let (pool, workers) = SeriesPool::new(series, &dir, &self.config, &self.counters);
        pool.start(workers).await;
        log::debug!(
            "log series '{}' ready with {} workers in {}",
            series,
            self.config.workers.max(1),
            dir.display()
        );
        Ok(Arc::new(pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn config(root: &Path, workers: usize, capacity: usize) -> SinkConfig {
        SinkConfig {
            enabled: true,
            root_dir: root.to_path_buf(),
            workers,
            buffer_capacity: capacity,
            queue_depth: 64,
            enqueue_timeout_ms: 50,
        }
    }

    /// Segments of one worker as (stamp, bytes), oldest first.
    fn segments(dir: &Path, worker: usize) -> Vec<(i64, Vec<u8>)> {
        let prefix = format!("{worker}_");
        let mut found: Vec<(i64, Vec<u8>)> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                let stamp = name.strip_prefix(&prefix)?.strip_suffix(".log")?;
                Some((stamp.parse().ok()?, std::fs::read(&path).ok()?))
            })
            .collect();
        found.sort_by_key(|(stamp, _)| *stamp);
        found
    }

    #[tokio::test]
    async fn segments_reproduce_submitted_bytes_in_order() {
        let tmp = TempDir::new().unwrap();
        let sink = LogSink::new(config(tmp.path(), 1, 16));

        let mut expected = Vec::new();
        for i in 0..10u8 {
            let record = vec![b'a' + i; 5];
            expected.extend_from_slice(&record);
            sink.submit("message", record).await.unwrap();
        }
        sink.shutdown().await;

        let segs = segments(&sink.series_dir("message"), 0);
        assert!(segs.len() >= 2, "expected several segments, got {}", segs.len());
        let joined: Vec<u8> = segs.into_iter().flat_map(|(_, bytes)| bytes).collect();
        assert_eq!(joined, expected);

        let stats = sink.stats();
        assert_eq!(stats.accepted, 10);
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test]
    async fn oversized_record_never_reaches_a_segment() {
        let tmp = TempDir::new().unwrap();
        let sink = LogSink::new(config(tmp.path(), 2, 8));

        sink.submit("hashtag", b"ok-1".to_vec()).await.unwrap();
        let err = sink
            .submit("hashtag", b"XXXXXXXXXXXX".to_vec())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SinkError::CapacityExceeded {
                len: 12,
                capacity: 8
            }
        );
        sink.submit("hashtag", b"ok-2".to_vec()).await.unwrap();
        sink.shutdown().await;

        let dir = sink.series_dir("hashtag");
        let all: Vec<u8> = (0..2)
            .flat_map(|w| segments(&dir, w))
            .flat_map(|(_, bytes)| bytes)
            .collect();
        assert!(!all.contains(&b'X'));
        assert_eq!(all.len(), 8);
        assert_eq!(sink.stats().rejected, 1);
    }

    #[tokio::test]
    async fn saturated_queue_drops_within_timeout() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(tmp.path(), 1, 1024);
        cfg.queue_depth = 1;
        cfg.enqueue_timeout_ms = 50;
        let counters = Arc::new(SinkCounters::default());

        // Workers are never started, so nothing drains the queue.
        let (pool, _workers) = SeriesPool::new("mention", tmp.path(), &cfg, &counters);

        let started = Instant::now();
        let mut outcomes = Vec::new();
        for i in 0..3u8 {
            outcomes.push(pool.route(vec![i], cfg.enqueue_timeout()).await);
        }

        assert!(outcomes[0].is_ok());
        let dropped = outcomes
            .iter()
            .filter(|r| matches!(r, Err(SinkError::QueueSaturated { .. })))
            .count();
        assert!(dropped >= 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn records_spread_over_workers() {
        let tmp = TempDir::new().unwrap();
        let sink = LogSink::new(config(tmp.path(), 3, 1024));
        for i in 0..9u8 {
            sink.submit("link", vec![b'0' + i]).await.unwrap();
        }
        sink.shutdown().await;

        let dir = sink.series_dir("link");
        let per_worker: Vec<usize> = (0..3)
            .map(|w| segments(&dir, w).iter().map(|(_, b)| b.len()).sum())
            .collect();
        assert_eq!(per_worker.iter().sum::<usize>(), 9);
        assert!(per_worker.iter().all(|&n| n > 0));
    }

    #[tokio::test]
    async fn unusable_series_is_isolated() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("growth"), b"not a directory").unwrap();
        let sink = LogSink::new(config(tmp.path(), 1, 64));

        let err = sink.submit("growth", b"g".to_vec()).await.unwrap_err();
        assert!(matches!(err, SinkError::SeriesUnavailable { .. }));
        // Stays disabled without retrying.
        let again = sink.submit("growth", b"g".to_vec()).await.unwrap_err();
        assert!(matches!(again, SinkError::SeriesUnavailable { .. }));

        sink.submit("message", b"m".to_vec()).await.unwrap();
        sink.shutdown().await;
        assert_eq!(segments(&sink.series_dir("message"), 0).len(), 1);
    }

    #[tokio::test]
    async fn series_name_cannot_escape_root() {
        let tmp = TempDir::new().unwrap();
        let sink = LogSink::new(config(tmp.path(), 1, 64));
        let err = sink.submit("../elsewhere", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, SinkError::SeriesUnavailable { .. }));
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_closed() {
        let tmp = TempDir::new().unwrap();
        let sink = LogSink::new(config(tmp.path(), 1, 64));
        sink.submit("message", b"a".to_vec()).await.unwrap();
        sink.shutdown().await;
        assert_eq!(
            sink.submit("message", b"b".to_vec()).await,
            Err(SinkError::Closed)
        );
        assert_eq!(
            sink.submit("mention", b"c".to_vec()).await,
            Err(SinkError::Closed)
        );
        assert!(!sink.series_dir("mention").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn accepted_records_survive_concurrent_shutdown() {
        let tmp = TempDir::new().unwrap();
        let sink = Arc::new(LogSink::new(config(tmp.path(), 1, 64)));

        let submits: Vec<_> = (0..32)
            .map(|i| {
                let sink = Arc::clone(&sink);
                tokio::spawn(async move { sink.submit(&format!("s{i}"), b"x".to_vec()).await })
            })
            .collect();
        sink.shutdown().await;

        let mut accepted = 0;
        for submit in submits {
            match submit.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(e) => assert_eq!(e, SinkError::Closed),
            }
        }

        let written: usize = (0..32)
            .map(|i| sink.series_dir(&format!("s{i}")))
            .filter(|dir| dir.is_dir())
            .map(|dir| segments(&dir, 0).iter().map(|(_, b)| b.len()).sum::<usize>())
            .sum();
        assert_eq!(written, accepted);
        assert_eq!(sink.stats().accepted, accepted as u64);
    }

    #[tokio::test]
    async fn series_directory_creation_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("message")).unwrap();
        let sink = LogSink::new(config(tmp.path(), 1, 64));
        sink.submit("message", b"a".to_vec()).await.unwrap();
        sink.shutdown().await;
        assert!(sink.series_dir("message").is_dir());
    }
}
