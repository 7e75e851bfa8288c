//! Queue types.

use serde::Serialize;

/// Errors that can carry an upstream throttling signal (HTTP 429).
///
/// Only throttled failures are retried by the queue.
pub trait Throttling {
    fn is_throttled(&self) -> bool;
}

/// Lifecycle of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Retrying,
    Succeeded,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Retrying => "retrying",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot of queue activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
    pub requests_in_window: usize,
}
