//! Scratch directory housekeeping.

mod config;
mod janitor;

pub use config::ScratchConfig;
pub use janitor::{plan_removals, ScratchFile, ScratchJanitor, ScratchReport};
