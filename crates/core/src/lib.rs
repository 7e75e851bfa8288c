pub mod archive;
pub mod cache;
pub mod config;
pub mod listing;
pub mod matcher;
pub mod media;
pub mod metrics;
pub mod proxy;
pub mod queue;
pub mod scratch;
pub mod search;
pub mod testing;

pub use archive::{
    ArchiveError, ArchiveExtractor, ArchiveFetcher, ExtractionConfig, StreamingFetcher,
};
pub use cache::{CacheConfig, CacheKey, ResultCache};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use listing::{CandidateSubtitle, ListingConfig, ListingError, ListingSource, SubsRoListing};
pub use matcher::{derive_episode, EpisodeTag, MatchRanker};
pub use media::{MediaReference, SubtitleResult};
pub use proxy::{ProxyConfig, ProxyError, ProxyPool};
pub use queue::{AcquisitionQueue, QueueConfig, Throttling};
pub use scratch::{ScratchConfig, ScratchJanitor};
pub use search::{SearchConfig, SearchOrchestrator, SearchPriority};
