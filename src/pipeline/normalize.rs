//! Page → record normalization.

use chrono::{DateTime, Utc};

use crate::models::{
    Criterion, CriterionKind, FeedItem, HarvestedRecord, PageFetchResult, RecordBody,
};

/// Turn one fetched page into records.
///
/// Every item yields a message plus one sub-record per mention, hashtag and
/// shared link. A profile on an account page yields a growth snapshot taken
/// at `harvested_at`.
pub fn normalize_page(
    page: &PageFetchResult,
    territory: &str,
    network: &str,
    criterion: &Criterion,
    harvested_at: DateTime<Utc>,
) -> Vec<HarvestedRecord> {
    let mut records = Vec::new();
    for item in &page.items {
        normalize_item(item, territory, network, &criterion.value, &mut records);
    }

    if let (Some(profile), CriterionKind::Account) = (&page.profile, criterion.kind) {
        records.push(HarvestedRecord::new(
            territory,
            network,
            &criterion.value,
            &profile.account_id,
            harvested_at,
            RecordBody::Growth {
                account_id: profile.account_id.clone(),
                followers: profile.followers,
                following: profile.following,
                posts: profile.posts,
            },
        ));
    }
    records
}

fn normalize_item(
    item: &FeedItem,
    territory: &str,
    network: &str,
    criterion: &str,
    out: &mut Vec<HarvestedRecord>,
) {
    let record = |body| HarvestedRecord::new(territory, network, criterion, &item.id, item.time, body);

    out.push(record(RecordBody::Message {
        author: item.author.clone(),
        text: item.text.clone(),
    }));

    for mention in &item.mentions {
        out.push(record(RecordBody::Mention {
            parent_id: item.id.clone(),
            account_id: mention.id.clone(),
            handle: mention.handle.clone(),
        }));
    }

    for tag in item.hashtags.iter().filter_map(|t| normalize_tag(t)) {
        out.push(record(RecordBody::Hashtag {
            parent_id: item.id.clone(),
            tag,
        }));
    }

    for url in item.links.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        out.push(record(RecordBody::SharedLink {
            parent_id: item.id.clone(),
            url: url.to_string(),
        }));
    }
}

/// Lowercase and strip the leading `#`; blank tags are dropped.
fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().trim_start_matches('#').trim();
    (!tag.is_empty()).then(|| tag.to_lowercase())
}
