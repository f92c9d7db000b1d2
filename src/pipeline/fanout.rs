//! Record fan-out to the store and the log sink.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::HarvestedRecord;
use crate::sink::LogSink;
use crate::storage::{RecordStore, UpsertOutcome};

/// Per-batch write counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// New records written to the store
    pub stored: usize,
    /// Records whose identity was already stored
    pub duplicates: usize,
    /// Malformed records kept away from the store
    pub rejected: usize,
    /// Store writes that failed for other reasons
    pub store_failures: usize,
    /// Records the log sink did not accept
    pub sink_failures: usize,
}

/// Dispatches harvested batches to the record store and the log sink.
pub struct RecordFanout {
    records: Arc<dyn RecordStore>,
    sink: Option<Arc<LogSink>>,
    concurrency: usize,
}

impl RecordFanout {
    pub fn new(records: Arc<dyn RecordStore>, sink: Option<Arc<LogSink>>, concurrency: usize) -> Self {
        Self {
            records,
            sink,
            concurrency: concurrency.max(1),
        }
    }

    /// Write a batch and wait until every record has been handled.
    ///
    /// Store writes run with at most `concurrency` in flight; sink
    /// submission runs alongside them. No single record failure aborts the
    /// batch.
    pub async fn dispatch(&self, batch: &[HarvestedRecord]) -> BatchOutcome {
        let (mut outcome, sink_failures) =
            tokio::join!(self.write_store(batch), self.write_sink(batch));
        outcome.sink_failures = sink_failures;
        outcome
    }

    async fn write_store(&self, batch: &[HarvestedRecord]) -> BatchOutcome {
        let mut results = stream::iter(batch)
            .map(|record| async move { (record, self.write_one(record).await) })
            .buffer_unordered(self.concurrency);

        let mut outcome = BatchOutcome::default();
        while let Some((record, result)) = results.next().await {
            match result {
                Ok(UpsertOutcome::Inserted) => outcome.stored += 1,
                Ok(UpsertOutcome::Conflict) => outcome.duplicates += 1,
                Err(AppError::MalformedRecord(reason)) => {
                    outcome.rejected += 1;
                    log::warn!(
                        "Rejected {} record from {}/{}: {}",
                        record.series(),
                        record.network,
                        record.territory,
                        reason
                    );
                }
                Err(error) => {
                    outcome.store_failures += 1;
                    log::warn!(
                        "Failed to store {} {} ({}): {}",
                        record.series(),
                        record.identity,
                        record.source_id,
                        error
                    );
                }
            }
        }
        outcome
    }

    async fn write_one(&self, record: &HarvestedRecord) -> Result<UpsertOutcome> {
        if let Some(reason) = record.malformed_reason() {
            return Err(AppError::malformed(reason));
        }
        self.records.upsert_if_absent(record).await
    }

    /// Submit every record to its series, in batch order. Returns the number
    /// of records the sink did not take.
    async fn write_sink(&self, batch: &[HarvestedRecord]) -> usize {
        let Some(sink) = &self.sink else {
            return 0;
        };

        let mut failures = 0;
        let mut first_error = None;
        for record in batch {
            let result = match record.to_log_line() {
                Ok(line) => sink.submit(record.series(), line).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(e) = result {
                failures += 1;
                first_error.get_or_insert(e);
            }
        }

        if let Some(error) = first_error {
            log::warn!(
                "Log sink did not accept {} of {} records (first: {})",
                failures,
                batch.len(),
                error
            );
        }
        failures
    }
}
