//! Result cache.
//!
//! Ranked search results are stored per episode (`{series}_S{ss}_E{ee}`) or
//! per movie (`movie_{id}`) as JSON files with an expiry. Empty results are
//! never persisted, so a search that found nothing is retried next time.

mod config;
mod preload;
mod store;
mod types;

pub use config::CacheConfig;
pub use preload::{next_episodes, PreloadSearch};
pub use store::ResultCache;
pub use types::{CacheEntry, CacheError, CacheKey, SweepReport};
