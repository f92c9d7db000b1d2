//! Persistent store abstractions.
//!
//! Two capabilities are consumed by the harvest pipeline:
//!
//! - [`RecordStore`]: insert-if-absent keyed by record identity. A duplicate
//!   identity is the dedup mechanism and is reported as
//!   [`UpsertOutcome::Conflict`], not as an error.
//! - [`CursorStore`]: get/set of one [`HarvestCursor`] per [`CursorKey`].
//!
//! Neither trait locks: cursor keys are partitioned per pipeline, and record
//! safety relies on the store's own uniqueness constraint.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CursorKey, HarvestCursor, HarvestedRecord};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStore;

/// Result of an insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The identity was new and the record is stored
    Inserted,
    /// A record with this identity already exists
    Conflict,
}

/// Store for harvested records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert `record` into its collection unless its identity exists.
    async fn upsert_if_absent(&self, record: &HarvestedRecord) -> Result<UpsertOutcome>;
}

/// Store for harvest cursors.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the cursor for `key`, if one was ever written.
    async fn get_cursor(&self, key: &CursorKey) -> Result<Option<HarvestCursor>>;

    /// Insert or replace the cursor for its key.
    async fn set_cursor(&self, cursor: &HarvestCursor) -> Result<()>;
}
