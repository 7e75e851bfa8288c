//! Concurrency-bounded acquisition queue.
//!
//! Every upstream request runs through [`AcquisitionQueue::submit`], which:
//! - bounds the number of running jobs (higher priority admitted first)
//! - paces request starts with a sliding 60s window and an adaptive per-domain delay
//! - requeues throttled jobs at the front after an exponential backoff

mod backoff;
mod config;
mod pacer;
mod runner;
mod types;

pub use backoff::backoff_delay;
pub use config::QueueConfig;
pub use pacer::{DomainPacing, RequestPacer};
pub use runner::AcquisitionQueue;
pub use types::{JobState, QueueStats, Throttling};
