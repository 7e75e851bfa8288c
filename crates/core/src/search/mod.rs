//! Subtitle search orchestration.
//!
//! [`SearchOrchestrator::search_subtitles`] is the entry point for hosts:
//! it always answers, within the soft timeout, with a ranked list (possibly
//! empty).

mod config;
mod orchestrator;
mod prefilter;
mod types;

pub use config::SearchConfig;
pub use orchestrator::SearchOrchestrator;
pub use prefilter::prefilter_candidates;
pub use types::{AcquisitionSummary, SearchError, SearchPriority};
