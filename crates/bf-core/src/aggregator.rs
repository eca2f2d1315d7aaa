//! Query entry point: cache lookup, channel fan-out, merge, write-through, trim.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tokio::sync::Mutex;

use crate::{
    cache::ResultCache,
    domain::{Channel, Query},
    rotator::CredentialRotator,
    search::{ChannelError, ChannelSearcher},
};

#[derive(Clone, Copy, Debug)]
pub struct AggregatorSettings {
    /// Wall-clock bound for one uncached aggregation pass.
    pub request_timeout: Duration,
    /// Exclude links served on the previous call for the same query.
    pub avoid_repeats: bool,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            avoid_repeats: true,
        }
    }
}

pub struct Aggregator {
    channels: Vec<Channel>,
    searcher: ChannelSearcher,
    rotator: Arc<CredentialRotator>,
    cache: Arc<ResultCache>,
    settings: AggregatorSettings,
    rng: Mutex<StdRng>,
    last_served: Mutex<HashMap<Query, Vec<String>>>,
}

impl Aggregator {
    pub fn new(
        channels: Vec<Channel>,
        searcher: ChannelSearcher,
        rotator: Arc<CredentialRotator>,
        cache: Arc<ResultCache>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            channels,
            searcher,
            rotator,
            cache,
            settings,
            rng: Mutex::new(StdRng::from_os_rng()),
            last_served: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the random source with a seeded one (channel order, cache sampling).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn rotator(&self) -> &Arc<CredentialRotator> {
        &self.rotator
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Find up to `max_results` distinct links for `query`.
    ///
    /// Never fails: quota exhaustion, provider errors and "nothing posted
    /// recently" all end in a possibly empty list.
    pub async fn find_links(&self, query: &Query, max_results: usize) -> Vec<String> {
        self.find_links_at(query, max_results, Instant::now()).await
    }

    pub async fn find_links_at(
        &self,
        query: &Query,
        max_results: usize,
        now: Instant,
    ) -> Vec<String> {
        if max_results == 0 {
            return Vec::new();
        }

        let previous = if self.settings.avoid_repeats {
            self.last_served
                .lock()
                .await
                .get(query)
                .cloned()
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        if let Some(entry) = self.cache.get_at(query, now).await {
            let unseen: Vec<String> = entry
                .links
                .iter()
                .filter(|l| !previous.contains(*l))
                .cloned()
                .collect();
            let pool = if unseen.is_empty() {
                tracing::debug!(%query, "every cached link was just served, allowing repeats");
                entry.links
            } else {
                unseen
            };
            let picked = self.sample(pool, max_results).await;
            tracing::info!(%query, links = picked.len(), "served from cache");
            self.remember(query, &picked).await;
            return picked;
        }

        if self.channels.is_empty() {
            tracing::warn!(%query, "no channels configured, nothing to search");
            return Vec::new();
        }

        // The cache keeps everything collected; only the reply is trimmed.
        let found = self.collect(query, max_results, &previous).await;
        if !found.is_empty() {
            self.cache.put_at(query.clone(), found.clone(), now).await;
        }
        let links = pick_fresh(found, &previous, max_results);
        self.remember(query, &links).await;

        tracing::info!(%query, links = links.len(), "aggregation finished");
        links
    }

    async fn collect(&self, query: &Query, max_results: usize, exclude: &[String]) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + self.settings.request_timeout;
        let key_count = self.rotator.len().await;

        let mut order: Vec<&Channel> = self.channels.iter().collect();
        order.shuffle(&mut *self.rng.lock().await);

        let mut found: Vec<String> = Vec::new();

        'channels: for channel in order {
            if fresh_count(&found, exclude) >= max_results {
                break;
            }

            let mut quota_failures = 0usize;
            loop {
                let Some(credential) = self.rotator.select().await else {
                    tracing::warn!(%query, "no API key available, finishing with partial results");
                    break 'channels;
                };

                let search = self.searcher.search_channel(channel, query, &credential);
                let result = match tokio::time::timeout_at(deadline, search).await {
                    Ok(r) => r,
                    Err(_) => {
                        tracing::warn!(%query, found = found.len(), "request timed out, finishing with partial results");
                        break 'channels;
                    }
                };

                match result {
                    Ok(links) => {
                        merge(&mut found, links);
                        break;
                    }
                    Err(ChannelError::QuotaExhausted) => {
                        self.rotator.mark_exhausted(&credential).await;
                        quota_failures += 1;
                        if quota_failures >= key_count {
                            break;
                        }
                    }
                    Err(ChannelError::Provider(msg)) => {
                        tracing::warn!(channel = %channel.display_name, error = %msg, "skipping channel");
                        break;
                    }
                }
            }
        }

        found
    }

    async fn sample(&self, mut links: Vec<String>, n: usize) -> Vec<String> {
        links.shuffle(&mut *self.rng.lock().await);
        links.truncate(n);
        links
    }

    async fn remember(&self, query: &Query, links: &[String]) {
        if !self.settings.avoid_repeats {
            return;
        }
        let mut served = self.last_served.lock().await;
        if links.is_empty() {
            served.remove(query);
        } else {
            served.insert(query.clone(), links.to_vec());
        }
    }
}

fn merge(found: &mut Vec<String>, links: Vec<String>) {
    for link in links {
        if !found.contains(&link) {
            found.push(link);
        }
    }
}

fn fresh_count(found: &[String], exclude: &[String]) -> usize {
    found.iter().filter(|l| !exclude.contains(*l)).count()
}

/// Links not in `exclude`, in collection order, capped at `max_results`.
/// Falls back to the excluded ones when nothing else was found.
fn pick_fresh(found: Vec<String>, exclude: &[String], max_results: usize) -> Vec<String> {
    let (mut fresh, mut seen): (Vec<String>, Vec<String>) =
        found.into_iter().partition(|l| !exclude.contains(l));
    if fresh.is_empty() {
        seen.truncate(max_results);
        return seen;
    }
    fresh.truncate(max_results);
    fresh
}
