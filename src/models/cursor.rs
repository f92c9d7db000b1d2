//! Resumable harvest bookmarks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Action, Criterion};

/// Identifies one pagination stream: (territory, network, action, criterion).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorKey {
    pub territory: String,
    pub network: String,
    pub action: Action,
    pub criterion: String,
}

impl CursorKey {
    pub fn new(territory: &str, network: &str, criterion: &Criterion) -> Self {
        Self {
            territory: territory.to_string(),
            network: network.to_string(),
            action: criterion.action(),
            criterion: criterion.value.clone(),
        }
    }
}

impl fmt::Display for CursorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.territory, self.network, self.action, self.criterion
        )
    }
}

/// Persisted pagination progress for one [`CursorKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestCursor {
    pub territory: String,
    pub network: String,
    pub action: Action,
    pub criterion_value: String,

    /// Time of the newest item harvested so far
    pub last_time: Option<DateTime<Utc>>,

    /// Source id of the newest item harvested so far
    pub last_id: Option<String>,

    /// Pages completed for this key over all runs
    pub pages_harvested: u64,

    /// Items received for this key over all runs
    pub items_harvested: u64,

    pub recorded_at: DateTime<Utc>,
}

impl HarvestCursor {
    /// A cursor with no progress, used before the first page of a key.
    pub fn empty(key: &CursorKey) -> Self {
        Self {
            territory: key.territory.clone(),
            network: key.network.clone(),
            action: key.action,
            criterion_value: key.criterion.clone(),
            last_time: None,
            last_id: None,
            pages_harvested: 0,
            items_harvested: 0,
            recorded_at: Utc::now(),
        }
    }

    pub fn key(&self) -> CursorKey {
        CursorKey {
            territory: self.territory.clone(),
            network: self.network.clone(),
            action: self.action,
            criterion: self.criterion_value.clone(),
        }
    }

    /// Fetch lower bounds derived from this cursor.
    pub fn hints(&self) -> CursorHints {
        CursorHints {
            since: self.last_time,
            since_id: self.last_id.clone(),
        }
    }

    /// Advance past a completed page.
    ///
    /// `newest` is the (time, id) of the newest item on the page; an empty
    /// page keeps the previous bounds.
    pub fn advance(&self, newest: Option<(DateTime<Utc>, &str)>, item_count: usize) -> Self {
        let mut next = self.clone();
        if let Some((time, id)) = newest {
            if next.last_time.is_none_or(|last| time >= last) {
                next.last_time = Some(time);
                next.last_id = Some(id.to_string());
            }
        }
        next.pages_harvested += 1;
        next.items_harvested += item_count as u64;
        next.recorded_at = Utc::now();
        next
    }
}

/// Lower bounds handed to a fetcher. Both `None` means "no lower bound".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorHints {
    pub since: Option<DateTime<Utc>>,
    pub since_id: Option<String>,
}

impl CursorHints {
    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.since_id.is_none()
    }
}
