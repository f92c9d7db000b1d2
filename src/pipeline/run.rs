//! Harvest run across all networks and territories.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::models::Config;
use crate::pipeline::fanout::RecordFanout;
use crate::pipeline::harvest::{CriterionOutcome, HarvestController};
use crate::services::Fetcher;
use crate::sink::LogSink;
use crate::storage::{CursorStore, RecordStore};

/// Result of a whole harvest run.
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<CriterionOutcome>,
}

impl HarvestReport {
    pub fn pages(&self) -> u64 {
        self.outcomes.iter().map(|o| o.pages as u64).sum()
    }

    pub fn items(&self) -> usize {
        self.outcomes.iter().map(|o| o.items).sum()
    }

    pub fn stored(&self) -> usize {
        self.outcomes.iter().map(|o| o.stored).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.outcomes.iter().map(|o| o.duplicates).sum()
    }

    /// Criteria whose loop ended on an error.
    pub fn failures(&self) -> impl Iterator<Item = &CriterionOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }
}

/// Harvest every configured territory on every fetcher's network.
///
/// Networks run concurrently. Inside one network, territories and their
/// criteria run one after another, so each cursor key has a single writer.
pub async fn run_harvest<S>(
    config: &Config,
    fetchers: &[Arc<dyn Fetcher>],
    store: Arc<S>,
    sink: Option<Arc<LogSink>>,
) -> HarvestReport
where
    S: RecordStore + CursorStore + 'static,
{
    let started_at = Utc::now();
    let records: Arc<dyn RecordStore> = store.clone();
    let cursors: Arc<dyn CursorStore> = store;

    let fanout = RecordFanout::new(records, sink, config.harvest.store_concurrency);
    let controller =
        HarvestController::new(cursors, fanout).with_page_delay(config.harvest.page_delay());

    log::info!(
        "Harvesting {} territories on {} networks",
        config.territories.len(),
        fetchers.len()
    );

    let pipelines = fetchers
        .iter()
        .map(|fetcher| run_network(config, fetcher.as_ref(), &controller));
    let outcomes: Vec<CriterionOutcome> = join_all(pipelines).await.into_iter().flatten().collect();

    let report = HarvestReport {
        started_at,
        finished_at: Utc::now(),
        outcomes,
    };
    log::info!(
        "Harvest finished: {} pages, {} items, {} new records, {} duplicates, {} failed criteria",
        report.pages(),
        report.items(),
        report.stored(),
        report.duplicates(),
        report.failures().count()
    );
    report
}

async fn run_network(
    config: &Config,
    fetcher: &dyn Fetcher,
    controller: &HarvestController,
) -> Vec<CriterionOutcome> {
    let network = fetcher.network();
    let mut outcomes = Vec::new();

    for territory in config
        .territories
        .iter()
        .filter(|t| t.includes_network(network))
    {
        let limits = config.limits_for(territory);
        for criterion in territory.criteria() {
            let outcome = controller
                .harvest_criterion(fetcher, &territory.name, &criterion, limits)
                .await;
            outcomes.push(outcome);
        }
    }

    log::info!(
        "[{}] {} criteria harvested, {} failed",
        network,
        outcomes.len(),
        outcomes.iter().filter(|o| !o.succeeded()).count()
    );
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::models::{Criterion, CursorHints, FeedItem, PageFetchResult, PageParams, SinkConfig};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// One page per criterion; criteria named "broken" fail.
    struct OnePageFetcher {
        name: &'static str,
        seen: Mutex<Vec<String>>,
    }

    impl OnePageFetcher {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Fetcher for OnePageFetcher {
        fn network(&self) -> &str {
            self.name
        }

        async fn fetch(
            &self,
            criterion: &Criterion,
            _hints: &CursorHints,
            _params: &PageParams,
        ) -> Result<PageFetchResult> {
            self.seen.lock().unwrap().push(criterion.value.clone());
            if criterion.value == "broken" {
                return Err(AppError::fetch(self.name, &criterion.value, "HTTP 500"));
            }
            Ok(PageFetchResult::new(
                vec![FeedItem {
                    id: format!("{}-post", criterion.value),
                    time: Utc::now(),
                    author: "a".into(),
                    text: "t".into(),
                    mentions: vec![],
                    hashtags: vec![],
                    links: vec![],
                }],
                None,
            ))
        }
    }

    fn config() -> Config {
        let mut config = Config::from_toml(
            r#"
            [harvest]
            page_delay_ms = 0

            [[territories]]
            name = "acme"
            keywords = ["rockets", "broken", "launch"]

            [[territories]]
            name = "globex"
            tags = ["globex"]
            networks = ["facebook"]
            "#,
        )
        .unwrap();
        config.harvest.store_concurrency = 2;
        config
    }

    #[tokio::test]
    async fn failures_stay_local_to_their_criterion() {
        let store = Arc::new(MemoryStore::new());
        let twitter = OnePageFetcher::new("twitter");
        let facebook = OnePageFetcher::new("facebook");
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![twitter.clone(), facebook.clone()];

        let report = run_harvest(&config(), &fetchers, store.clone(), None).await;

        // twitter: 3 acme keywords; facebook: 3 acme keywords + 1 globex tag
        assert_eq!(report.outcomes.len(), 7);
        assert_eq!(report.failures().count(), 2);
        assert_eq!(report.stored(), 5);
        assert_eq!(store.len().await, 5);

        // Criteria after the broken one still ran, in order.
        assert_eq!(
            *twitter.seen.lock().unwrap(),
            vec!["rockets", "broken", "launch"]
        );
        assert!(facebook.seen.lock().unwrap().contains(&"globex".to_string()));
    }

    #[tokio::test]
    async fn territory_network_filter_is_applied() {
        let store = Arc::new(MemoryStore::new());
        let twitter = OnePageFetcher::new("twitter");
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![twitter.clone()];

        run_harvest(&config(), &fetchers, store, None).await;

        assert!(!twitter.seen.lock().unwrap().contains(&"globex".to_string()));
    }

    #[tokio::test]
    async fn second_run_only_adds_duplicates() {
        let store = Arc::new(MemoryStore::new());
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![OnePageFetcher::new("twitter")];

        let first = run_harvest(&config(), &fetchers, store.clone(), None).await;
        let second = run_harvest(&config(), &fetchers, store.clone(), None).await;

        assert_eq!(first.stored(), 2);
        assert_eq!(second.stored(), 0);
        assert_eq!(second.duplicates(), 2);
    }

    #[tokio::test]
    async fn run_writes_segments_per_series() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(LogSink::new(SinkConfig {
            root_dir: tmp.path().to_path_buf(),
            workers: 2,
            ..SinkConfig::default()
        }));
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![OnePageFetcher::new("twitter")];

        run_harvest(&config(), &fetchers, store, Some(sink.clone())).await;
        sink.shutdown().await;

        let lines: usize = std::fs::read_dir(sink.series_dir("message"))
            .unwrap()
            .map(|e| std::fs::read_to_string(e.unwrap().path()).unwrap().lines().count())
            .sum();
        assert_eq!(lines, 2);
        assert_eq!(sink.stats().accepted, 2);
    }
}
