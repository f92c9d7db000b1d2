//! Harvest pipeline.
//!
//! - `normalize`: fetched pages into records
//! - `fanout`: records into the store and the log sink
//! - `harvest`: the cursor-driven page loop for one criterion
//! - `run`: every criterion on every network

pub mod fanout;
pub mod harvest;
pub mod normalize;
pub mod run;

pub use fanout::{BatchOutcome, RecordFanout};
pub use harvest::{CriterionOutcome, HarvestController};
pub use normalize::normalize_page;
pub use run::{HarvestReport, run_harvest};
