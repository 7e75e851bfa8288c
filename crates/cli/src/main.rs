use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subscout_core::{
    load_config, validate_config, AcquisitionQueue, ArchiveExtractor, Config, ProxyPool,
    ResultCache, SanitizedConfig, ScratchJanitor, SearchOrchestrator, SearchPriority,
    StreamingFetcher, SubsRoListing,
};

/// Find, download and rank Romanian subtitles for a movie or episode.
#[derive(Debug, Parser)]
#[command(name = "subscout", version)]
struct Args {
    /// Media id: `tt1234567` for a movie, `tt1234567:2:5` for an episode.
    #[arg(required_unless_present = "sweep")]
    media_id: Option<String>,

    /// Video file name, used to pick the episode and the best match.
    #[arg(long)]
    filename: Option<String>,

    /// Configuration file. Defaults apply when omitted.
    #[arg(long, env = "SUBSCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Sweep the cache and scratch directories, then exit.
    #[arg(long)]
    sweep: bool,

    /// Answer at the search soft timeout, as a long-running service does.
    /// Work still in flight at that point is dropped when the process
    /// exits, so nothing reaches the cache in the background.
    #[arg(long)]
    soft_timeout: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.json_logs);

    if let Err(e) = run(args).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    info!(config = %sanitized, "Configuration loaded");

    let cache = ResultCache::new(config.cache.clone());
    let janitor = ScratchJanitor::new(config.scratch.clone());
    janitor
        .prepare()
        .await
        .with_context(|| format!("Failed to create scratch dir {:?}", config.scratch.dir))?;

    if args.sweep {
        let cache_report = cache.sweep().await.context("Cache sweep failed")?;
        let scratch_report = janitor.sweep().await.context("Scratch sweep failed")?;
        info!(
            cache_scanned = cache_report.scanned,
            cache_removed = cache_report.removed(),
            scratch_scanned = scratch_report.scanned,
            scratch_removed = scratch_report.expired + scratch_report.evicted,
            bytes_freed = scratch_report.bytes_freed,
            "Sweep complete"
        );
        return Ok(());
    }

    let Some(media_id) = args.media_id.as_deref() else {
        anyhow::bail!("A media id is required");
    };

    let orchestrator = build_orchestrator(&config, cache)?;
    let results = if args.soft_timeout {
        orchestrator
            .search_subtitles(media_id, args.filename.as_deref())
            .await
    } else {
        orchestrator
            .run_search(media_id, args.filename.as_deref(), SearchPriority::Interactive)
            .await
    };

    info!(media_id, results = results.len(), "Search complete");
    let output = serde_json::to_string_pretty(&results).context("Failed to encode results")?;
    println!("{}", output);
    Ok(())
}

fn build_orchestrator(config: &Config, cache: ResultCache) -> Result<SearchOrchestrator> {
    let queue = Arc::new(AcquisitionQueue::new(config.queue.clone()));
    let extractor = Arc::new(ArchiveExtractor::new(&config.scratch.dir));
    let fetcher = Arc::new(StreamingFetcher::new(config.extraction.clone(), extractor));
    let listing = Arc::new(SubsRoListing::new(config.listing.clone()));

    let mut orchestrator = SearchOrchestrator::new(config.search.clone(), listing, fetcher, queue);
    if config.cache.enabled {
        orchestrator = orchestrator.with_cache(cache).with_preload(0);
    }

    if let Some(pool) = ProxyPool::from_config(&config.proxy).context("Failed to build proxy pool")? {
        info!("Routing downloads through {} proxies", pool.len());
        orchestrator = orchestrator.with_proxy_pool(Arc::new(pool));
    }

    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_search_is_the_default() {
        let args = Args::try_parse_from(["subscout", "tt1234567:2:5"]).unwrap();
        assert_eq!(args.media_id.as_deref(), Some("tt1234567:2:5"));
        assert!(!args.soft_timeout);
    }

    #[test]
    fn test_soft_timeout_flag() {
        let args = Args::try_parse_from(["subscout", "tt1", "--soft-timeout"]).unwrap();
        assert!(args.soft_timeout);
    }

    #[test]
    fn test_media_id_required_unless_sweeping() {
        assert!(Args::try_parse_from(["subscout"]).is_err());
        let args = Args::try_parse_from(["subscout", "--sweep"]).unwrap();
        assert!(args.sweep);
        assert!(args.media_id.is_none());
    }
}
