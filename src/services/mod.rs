//! Service layer: identities and network fetchers.

mod feed;
mod fetcher;
pub mod identity;

use std::sync::Arc;

use reqwest::Client;

use crate::models::Config;

pub use feed::HttpFeedFetcher;
pub use fetcher::Fetcher;
pub use identity::{Identity, identity};

/// Build a fetcher for every enabled network.
///
/// Networks that cannot be set up are logged and left out of the run.
pub fn fetchers_from_config(config: &Config, client: &Client) -> Vec<Arc<dyn Fetcher>> {
    let mut fetchers: Vec<Arc<dyn Fetcher>> = Vec::new();
    for network in config.networks.iter().filter(|n| n.enabled) {
        match HttpFeedFetcher::from_config(network, client.clone()) {
            Ok(fetcher) => fetchers.push(Arc::new(fetcher)),
            Err(e) => log::error!("Skipping network {}: {}", network.name, e),
        }
    }
    fetchers
}
