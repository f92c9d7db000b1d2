//! feedharvest
//!
//! Resumable harvesting of social network feeds into a deduplicated record
//! store and a segmented log sink.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod sink;
pub mod storage;
pub mod utils;
