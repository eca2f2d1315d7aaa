use std::sync::Arc;

use bf_core::{
    aggregator::Aggregator, cache::ResultCache, channels::load_channels, config::Config,
    rotator::CredentialRotator, search::ChannelSearcher,
};
use bf_youtube::YouTubeClient;

#[tokio::main]
async fn main() -> Result<(), bf_core::Error> {
    bf_core::logging::init("bf")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(keys = cfg.api_keys.len(), "loaded API keys");

    let channels = load_channels(&cfg.channels_file)?;

    let provider = Arc::new(YouTubeClient::with_base_url(cfg.youtube_api_base.clone())?);
    let rotator = Arc::new(CredentialRotator::new(
        cfg.api_keys.iter().cloned(),
        cfg.quota_limit,
    ));
    let cache = Arc::new(ResultCache::new(cfg.cache_settings()));
    let searcher = ChannelSearcher::new(provider, rotator.clone(), cfg.search_settings());
    let aggregator = Arc::new(Aggregator::new(
        channels,
        searcher,
        rotator,
        cache,
        cfg.aggregator_settings(),
    ));

    bf_telegram::run_polling(cfg, aggregator)
        .await
        .map_err(|e| bf_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
