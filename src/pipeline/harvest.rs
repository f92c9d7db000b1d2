//! Resumable pagination loop for one criterion.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::Result;
use crate::models::{Criterion, CursorKey, HarvestCursor, Limits, PageParams};
use crate::pipeline::fanout::{BatchOutcome, RecordFanout};
use crate::pipeline::normalize::normalize_page;
use crate::services::Fetcher;
use crate::storage::CursorStore;

/// Summary of one criterion's loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriterionOutcome {
    pub key: CursorKey,
    /// Pages fully processed in this run
    pub pages: u32,
    /// Items received from the feed
    pub items: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub store_failures: usize,
    pub sink_failures: usize,
    /// Why the loop stopped early, if it did
    pub error: Option<String>,
}

impl CriterionOutcome {
    fn new(key: CursorKey) -> Self {
        Self {
            key,
            pages: 0,
            items: 0,
            stored: 0,
            duplicates: 0,
            rejected: 0,
            store_failures: 0,
            sink_failures: 0,
            error: None,
        }
    }

    fn absorb(&mut self, batch: &BatchOutcome, items: usize) {
        self.pages += 1;
        self.items += items;
        self.stored += batch.stored;
        self.duplicates += batch.duplicates;
        self.rejected += batch.rejected;
        self.store_failures += batch.store_failures;
        self.sink_failures += batch.sink_failures;
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Drives fetch → normalize → fan-out → cursor cycles.
pub struct HarvestController {
    cursors: Arc<dyn CursorStore>,
    fanout: RecordFanout,
    page_delay: Duration,
}

impl HarvestController {
    pub fn new(cursors: Arc<dyn CursorStore>, fanout: RecordFanout) -> Self {
        Self {
            cursors,
            fanout,
            page_delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive pages of one criterion.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Harvest one criterion of one territory until the feed is exhausted or
    /// the page limit is reached.
    ///
    /// Errors end this criterion only and are reported in the outcome. The
    /// persisted cursor always reflects the last fully processed page.
    pub async fn harvest_criterion(
        &self,
        fetcher: &dyn Fetcher,
        territory: &str,
        criterion: &Criterion,
        limits: Limits,
    ) -> CriterionOutcome {
        let key = CursorKey::new(territory, fetcher.network(), criterion);
        let mut outcome = CriterionOutcome::new(key.clone());

        if let Err(e) = self
            .paginate(fetcher, &key, criterion, limits, &mut outcome)
            .await
        {
            log::warn!("Harvest of {} stopped after {} pages: {}", key, outcome.pages, e);
            outcome.error = Some(e.to_string());
        }
        outcome
    }

    async fn paginate(
        &self,
        fetcher: &dyn Fetcher,
        key: &CursorKey,
        criterion: &Criterion,
        limits: Limits,
        outcome: &mut CriterionOutcome,
    ) -> Result<()> {
        let max_pages = limits.effective_max_pages();
        let mut continuation: Option<String> = None;

        for page_no in 0..max_pages {
            if page_no > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let cursor = self
                .cursors
                .get_cursor(key)
                .await?
                .unwrap_or_else(|| HarvestCursor::empty(key));
            let params = PageParams {
                continuation: continuation.take(),
                results_per_page: limits.results_per_page,
                page: page_no,
            };

            let page = fetcher.fetch(criterion, &cursor.hints(), &params).await?;

            let records = normalize_page(&page, &key.territory, &key.network, criterion, Utc::now());
            let batch = self.fanout.dispatch(&records).await;
            outcome.absorb(&batch, page.items.len());

            // Persisted before the next fetch: a crash can repeat this page,
            // never skip it.
            let next = cursor.advance(page.newest(), page.items.len());
            self.cursors.set_cursor(&next).await?;

            log::debug!(
                "{} page {}: {} items, {} new, {} duplicates",
                key,
                page_no + 1,
                page.items.len(),
                batch.stored,
                batch.duplicates
            );

            if fetcher.is_exhausted(&page) {
                break;
            }
            continuation = page.continuation().map(str::to_string);
        }
        Ok(())
    }
}
