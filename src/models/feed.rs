//! Types crossing the fetcher boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One item as returned by a network collaborator, already normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Network-native item id
    pub id: String,

    pub time: DateTime<Utc>,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub text: String,

    /// Accounts mentioned inside the item
    #[serde(default)]
    pub mentions: Vec<MentionRef>,

    #[serde(default)]
    pub hashtags: Vec<String>,

    /// Shared URLs
    #[serde(default)]
    pub links: Vec<String>,
}

/// An account mentioned inside an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionRef {
    /// Network-native account id
    pub id: String,

    #[serde(default)]
    pub handle: String,
}

/// Account counters reported alongside a timeline page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub account_id: String,

    #[serde(default)]
    pub followers: u64,

    #[serde(default)]
    pub following: u64,

    #[serde(default)]
    pub posts: u64,
}

/// One page from a remote feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFetchResult {
    #[serde(default)]
    pub items: Vec<FeedItem>,

    /// Opaque continuation token; absent or empty means the feed is exhausted
    #[serde(default)]
    pub next: Option<String>,

    #[serde(default)]
    pub profile: Option<ProfileSnapshot>,
}

impl PageFetchResult {
    pub fn new(items: Vec<FeedItem>, next: Option<String>) -> Self {
        Self {
            items,
            next,
            profile: None,
        }
    }

    /// The continuation token, if it is non-empty.
    pub fn continuation(&self) -> Option<&str> {
        self.next.as_deref().filter(|token| !token.is_empty())
    }

    /// (time, id) of the newest item on the page.
    pub fn newest(&self) -> Option<(DateTime<Utc>, &str)> {
        self.items
            .iter()
            .max_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)))
            .map(|item| (item.time, item.id.as_str()))
    }
}

/// Paging parameters for one fetch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
    /// Token from the previous page of this run; `None` on the first page
    pub continuation: Option<String>,

    pub results_per_page: u32,

    /// Zero-based page number within this run
    pub page: u32,
}
