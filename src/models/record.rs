//! Harvested records and their series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::identity::{Identity, identity};

/// Record series. Each kind has its own store collection and log series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Message,
    Mention,
    Hashtag,
    SharedLink,
    Growth,
}

impl RecordKind {
    /// Store collection receiving this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::Message => "messages",
            RecordKind::Mention => "mentions",
            RecordKind::Hashtag => "hashtags",
            RecordKind::SharedLink => "links",
            RecordKind::Growth => "growth",
        }
    }

    /// Log sink series name.
    pub fn series(&self) -> &'static str {
        match self {
            RecordKind::Message => "message",
            RecordKind::Mention => "mention",
            RecordKind::Hashtag => "hashtag",
            RecordKind::SharedLink => "link",
            RecordKind::Growth => "growth",
        }
    }
}

/// Series-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordBody {
    Message {
        author: String,
        text: String,
    },
    Mention {
        parent_id: String,
        account_id: String,
        handle: String,
    },
    Hashtag {
        parent_id: String,
        tag: String,
    },
    SharedLink {
        parent_id: String,
        url: String,
    },
    Growth {
        account_id: String,
        followers: u64,
        following: u64,
        posts: u64,
    },
}

impl RecordBody {
    fn kind(&self) -> RecordKind {
        match self {
            RecordBody::Message { .. } => RecordKind::Message,
            RecordBody::Mention { .. } => RecordKind::Mention,
            RecordBody::Hashtag { .. } => RecordKind::Hashtag,
            RecordBody::SharedLink { .. } => RecordKind::SharedLink,
            RecordBody::Growth { .. } => RecordKind::Growth,
        }
    }

    /// Distinguishes sub-records of one parent. Prefixed with the kind so a
    /// mention and a hashtag with the same text never share an identity.
    fn discriminator(&self, time: DateTime<Utc>) -> Option<String> {
        match self {
            RecordBody::Message { .. } => None,
            RecordBody::Mention { account_id, .. } => Some(format!("mention:{account_id}")),
            RecordBody::Hashtag { tag, .. } => Some(format!("hashtag:{tag}")),
            RecordBody::SharedLink { url, .. } => Some(format!("link:{url}")),
            RecordBody::Growth { .. } => Some(format!("growth:{}", time.format("%Y-%m-%d"))),
        }
    }

    /// The sub-record's own id (account, tag or url) is blank.
    fn has_blank_subject(&self) -> bool {
        match self {
            RecordBody::Message { .. } => false,
            RecordBody::Mention { account_id, .. } | RecordBody::Growth { account_id, .. } => {
                account_id.trim().is_empty()
            }
            RecordBody::Hashtag { tag, .. } => tag.trim().is_empty(),
            RecordBody::SharedLink { url, .. } => url.trim().is_empty(),
        }
    }
}

/// A normalized entity ready for the store and the log sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestedRecord {
    pub identity: Identity,
    pub kind: RecordKind,
    pub territory: String,
    pub network: String,

    /// Criterion that discovered the record; not part of the identity
    pub criterion: String,

    /// Source item id (the parent item for sub-records)
    pub source_id: String,

    pub time: DateTime<Utc>,

    #[serde(flatten)]
    pub body: RecordBody,
}

impl HarvestedRecord {
    /// Build a record, computing its kind and identity once.
    pub fn new(
        territory: &str,
        network: &str,
        criterion: &str,
        source_id: &str,
        time: DateTime<Utc>,
        body: RecordBody,
    ) -> Self {
        let discriminator = body.discriminator(time);
        Self {
            identity: identity(source_id, network, territory, discriminator.as_deref()),
            kind: body.kind(),
            territory: territory.to_string(),
            network: network.to_string(),
            criterion: criterion.to_string(),
            source_id: source_id.to_string(),
            time,
            body,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.kind.collection()
    }

    pub fn series(&self) -> &'static str {
        self.kind.series()
    }

    /// Reason this record must not reach the store, if any.
    pub fn malformed_reason(&self) -> Option<&'static str> {
        if self.identity.is_empty() {
            Some("empty identity")
        } else if self.source_id.trim().is_empty() {
            Some("empty source id")
        } else if self.body.has_blank_subject() {
            Some("empty sub-record id")
        } else {
            None
        }
    }

    /// One JSON line for the log sink.
    pub fn to_log_line(&self) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}
