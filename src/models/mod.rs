//! Domain models for the harvester.
//!
//! Configuration, territories and their criteria, cursors, fetched pages and
//! the normalized records written downstream.

mod config;
mod cursor;
mod feed;
mod record;
mod territory;

pub use config::{
    Config, HarvestConfig, HttpConfig, Limits, NetworkConfig, SinkConfig,
};
pub use cursor::{CursorHints, CursorKey, HarvestCursor};
pub use feed::{FeedItem, MentionRef, PageFetchResult, PageParams, ProfileSnapshot};
pub use record::{HarvestedRecord, RecordBody, RecordKind};
pub use territory::{Action, Criterion, CriterionKind, Territory};
