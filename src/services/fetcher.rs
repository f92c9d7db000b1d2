//! The fetcher capability consumed by the harvest loop.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Criterion, CursorHints, PageFetchResult, PageParams};

/// One network's paginated feed.
///
/// Implementations own request shaping and response normalization. The
/// harvest loop only sees [`PageFetchResult`]s.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Network identifier used in identities and cursor keys.
    fn network(&self) -> &str;

    /// Fetch one page for `criterion`, bounded below by `hints`.
    async fn fetch(
        &self,
        criterion: &Criterion,
        hints: &CursorHints,
        params: &PageParams,
    ) -> Result<PageFetchResult>;

    /// Whether `page` is the last one for this fetch.
    ///
    /// Networks signal exhaustion differently, so this stays per fetcher. The
    /// default treats an absent or empty continuation token as the end.
    fn is_exhausted(&self, page: &PageFetchResult) -> bool {
        page.continuation().is_none()
    }
}
