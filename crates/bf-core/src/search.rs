//! Per-channel search: list recent videos, fetch their descriptions, extract links.
//!
//! The video platform lives behind [`SearchProvider`], implemented in adapter
//! crates (`bf-youtube`).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{Channel, Query},
    extract::{extract_links, DEFAULT_LINKS_PER_SOURCE},
    rotator::{Credential, CredentialRotator, SEARCH_COST},
};

/// Failure of a single provider call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The key is out of quota (or rate limited) for this period.
    #[error("quota exceeded")]
    QuotaExceeded,

    /// Network trouble or a 5xx-class answer.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Any other refusal (bad request, unknown channel, invalid key...).
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

/// Failure of one channel search, as seen by the aggregator.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("credential quota exhausted")]
    QuotaExhausted,

    #[error("{0}")]
    Provider(String),
}

impl From<ProviderError> for ChannelError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::QuotaExceeded => ChannelError::QuotaExhausted,
            other => ChannelError::Provider(other.to_string()),
        }
    }
}

/// "Recent videos in a channel" request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoSearch {
    pub channel_id: String,
    pub text: String,
    pub published_after: DateTime<Utc>,
    pub max_results: u32,
}

impl VideoSearch {
    /// RFC 3339 timestamp without fractional seconds, as the API expects.
    pub fn published_after_rfc3339(&self) -> String {
        self.published_after
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoDetails {
    pub id: String,
    pub description: String,
}

/// Hexagonal port for the video platform.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Recent videos in a channel, most recent first.
    async fn search_videos(
        &self,
        api_key: &str,
        req: &VideoSearch,
    ) -> Result<Vec<VideoSummary>, ProviderError>;

    /// Descriptions for a batch of video ids, in one call.
    async fn video_details(
        &self,
        api_key: &str,
        video_ids: &[String],
    ) -> Result<Vec<VideoDetails>, ProviderError>;
}

#[derive(Clone, Copy, Debug)]
pub struct SearchSettings {
    /// Only videos published within this trailing window are considered.
    pub window: chrono::Duration,
    pub max_videos: u32,
    pub links_per_video: usize,
    /// Drop videos whose title does not mention the category.
    pub filter_titles: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            window: chrono::Duration::days(4),
            max_videos: 5,
            links_per_video: DEFAULT_LINKS_PER_SOURCE,
            filter_titles: true,
        }
    }
}

pub struct ChannelSearcher {
    provider: Arc<dyn SearchProvider>,
    rotator: Arc<CredentialRotator>,
    settings: SearchSettings,
}

impl ChannelSearcher {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        rotator: Arc<CredentialRotator>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            provider,
            rotator,
            settings,
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Search one channel for links matching `query`, billing `credential`.
    pub async fn search_channel(
        &self,
        channel: &Channel,
        query: &Query,
        credential: &Credential,
    ) -> Result<Vec<String>, ChannelError> {
        self.search_channel_at(channel, query, credential, Utc::now())
            .await
    }

    pub async fn search_channel_at(
        &self,
        channel: &Channel,
        query: &Query,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, ChannelError> {
        let req = VideoSearch {
            channel_id: channel.id.clone(),
            text: query.search_text(),
            published_after: now - self.settings.window,
            max_results: self.settings.max_videos,
        };

        self.rotator.record_usage(credential, SEARCH_COST).await;
        let videos = self
            .provider
            .search_videos(credential.token(), &req)
            .await
            .inspect_err(|e| log_failure(channel, credential, "search", e))?;

        let video_ids: Vec<String> = videos
            .into_iter()
            .filter(|v| !self.settings.filter_titles || title_mentions(&v.title, &query.category))
            .map(|v| v.id)
            .collect();

        if video_ids.is_empty() {
            tracing::debug!(channel = %channel.display_name, %query, "no recent matching videos");
            return Ok(Vec::new());
        }

        self.rotator
            .record_usage(credential, video_ids.len() as u64)
            .await;
        let details = self
            .provider
            .video_details(credential.token(), &video_ids)
            .await
            .inspect_err(|e| log_failure(channel, credential, "videos", e))?;

        let mut links: Vec<String> = Vec::new();
        for video in &details {
            for link in extract_links(
                &video.description,
                Some(&query.level),
                self.settings.links_per_video,
            ) {
                if !links.contains(&link) {
                    links.push(link);
                }
            }
        }

        tracing::debug!(
            channel = %channel.display_name,
            %query,
            videos = details.len(),
            links = links.len(),
            "channel searched"
        );
        Ok(links)
    }
}

fn title_mentions(title: &str, category: &str) -> bool {
    title.to_lowercase().contains(&category.to_lowercase())
}

fn log_failure(channel: &Channel, credential: &Credential, call: &str, e: &ProviderError) {
    match e {
        ProviderError::QuotaExceeded => {
            tracing::warn!(channel = %channel.display_name, key = %credential.label(), call, "quota exceeded")
        }
        other => {
            tracing::error!(channel = %channel.display_name, call, error = %other, "channel search failed")
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Provider double: canned videos/descriptions per channel, scripted failures per key.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub videos: HashMap<String, Vec<VideoSummary>>,
        pub descriptions: HashMap<String, String>,
        pub quota_keys: Vec<String>,
        /// Keys that pass `search_videos` but hit the quota on `video_details`.
        pub details_quota_keys: Vec<String>,
        pub broken_channels: Vec<String>,
        /// Searches after the first `n` hang for an hour.
        pub stall_after: Option<usize>,
        pub searches: Mutex<Vec<(String, VideoSearch)>>,
        pub detail_calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeProvider {
        pub fn with_channel(mut self, channel: &str, videos: &[(&str, &str, &str)]) -> Self {
            let mut list = Vec::new();
            for (id, title, description) in videos {
                list.push(VideoSummary {
                    id: id.to_string(),
                    title: title.to_string(),
                });
                self.descriptions
                    .insert(id.to_string(), description.to_string());
            }
            self.videos.insert(channel.to_string(), list);
            self
        }

        pub fn search_count(&self) -> usize {
            self.searches.lock().unwrap().len()
        }

        pub fn searched_channels(&self) -> Vec<String> {
            self.searches
                .lock()
                .unwrap()
                .iter()
                .map(|(_, s)| s.channel_id.clone())
                .collect()
        }

        pub fn keys_used(&self) -> Vec<String> {
            self.searches
                .lock()
                .unwrap()
                .iter()
                .map(|(k, _)| k.clone())
                .collect()
        }
    }

    #[async_trait]
    impl SearchProvider for FakeProvider {
        async fn search_videos(
            &self,
            api_key: &str,
            req: &VideoSearch,
        ) -> Result<Vec<VideoSummary>, ProviderError> {
            let position = {
                let mut searches = self.searches.lock().unwrap();
                searches.push((api_key.to_string(), req.clone()));
                searches.len()
            };
            if self.stall_after.is_some_and(|n| position > n) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.quota_keys.iter().any(|k| k == api_key) {
                return Err(ProviderError::QuotaExceeded);
            }
            if self.broken_channels.contains(&req.channel_id) {
                return Err(ProviderError::Transient("503 backend error".to_string()));
            }
            let mut videos = self.videos.get(&req.channel_id).cloned().unwrap_or_default();
            videos.truncate(req.max_results as usize);
            Ok(videos)
        }

        async fn video_details(
            &self,
            api_key: &str,
            video_ids: &[String],
        ) -> Result<Vec<VideoDetails>, ProviderError> {
            self.detail_calls.lock().unwrap().push(video_ids.to_vec());
            if self.quota_keys.iter().chain(&self.details_quota_keys).any(|k| k == api_key) {
                return Err(ProviderError::QuotaExceeded);
            }
            Ok(video_ids
                .iter()
                .filter_map(|id| {
                    self.descriptions.get(id).map(|d| VideoDetails {
                        id: id.clone(),
                        description: d.clone(),
                    })
                })
                .collect())
        }
    }

    pub(crate) fn link(level: &str, token: &str) -> String {
        format!("https://link.clashofclans.com/en/?action=OpenLayout&id={level}%3AHV%3A{token}")
    }

    fn searcher(
        provider: FakeProvider,
        keys: &[&str],
    ) -> (ChannelSearcher, Arc<FakeProvider>, Arc<CredentialRotator>) {
        let provider = Arc::new(provider);
        let rotator = Arc::new(CredentialRotator::new(
            keys.iter().map(|k| k.to_string()),
            crate::rotator::DEFAULT_QUOTA_LIMIT,
        ));
        let s = ChannelSearcher::new(provider.clone(), rotator.clone(), SearchSettings::default());
        (s, provider, rotator)
    }

    #[tokio::test]
    async fn extracts_only_requested_level() {
        let desc = format!(
            "Base links:\n{}\n{}\nOlder: {}",
            link("TH16", "a"),
            link("TH16", "b"),
            link("TH15", "c")
        );
        let provider = FakeProvider::default().with_channel("UC1", &[("v1", "TH16 War base", desc.as_str())]);
        let (s, _, rotator) = searcher(provider, &["k1"]);
        let cred = rotator.select().await.unwrap();

        let links = s
            .search_channel(&Channel::new("UC1", "One"), &Query::new("TH16", "War"), &cred)
            .await
            .unwrap();
        assert_eq!(links, vec![link("TH16", "a"), link("TH16", "b")]);
    }

    #[tokio::test]
    async fn builds_windowed_search_and_bills_costs() {
        let provider = FakeProvider::default().with_channel(
            "UC1",
            &[
                ("v1", "BEST CWL BASE", link("TH16", "a").as_str()),
                ("v2", "legend push", link("TH16", "b").as_str()),
            ],
        );
        let (s, provider, rotator) = searcher(provider, &["k1"]);
        let cred = rotator.select().await.unwrap();
        let now = DateTime::parse_from_rfc3339("2026-03-10T12:30:45.123Z")
            .unwrap()
            .with_timezone(&Utc);

        let links = s
            .search_channel_at(&Channel::new("UC1", "One"), &Query::new("TH16", "CWL"), &cred, now)
            .await
            .unwrap();
        assert_eq!(links, vec![link("TH16", "a")]);

        let searches = provider.searches.lock().unwrap().clone();
        assert_eq!(searches.len(), 1);
        let (key, req) = &searches[0];
        assert_eq!(key, "k1");
        assert_eq!(req.text, "TH16 CWL");
        assert_eq!(req.max_results, 5);
        assert_eq!(req.published_after_rfc3339(), "2026-03-06T12:30:45Z");

        // Title filter kept one video: 100 for the search + 1 for the batch.
        assert_eq!(provider.detail_calls.lock().unwrap().clone(), vec![vec!["v1".to_string()]]);
        assert_eq!(rotator.statuses().await[0].usage, 101);
    }

    #[tokio::test]
    async fn skips_metadata_call_when_no_video_survives() {
        let provider = FakeProvider::default().with_channel("UC1", &[("v1", "farming", "nothing")]);
        let (s, provider, rotator) = searcher(provider, &["k1"]);
        let cred = rotator.select().await.unwrap();

        let links = s
            .search_channel(&Channel::new("UC1", "One"), &Query::new("TH16", "War"), &cred)
            .await
            .unwrap();
        assert!(links.is_empty());
        assert!(provider.detail_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn quota_failure_is_distinguished() {
        let provider = FakeProvider {
            quota_keys: vec!["k1".to_string()],
            ..FakeProvider::default()
        };
        let (s, _, rotator) = searcher(provider, &["k1"]);
        let cred = rotator.select().await.unwrap();

        let err = s
            .search_channel(&Channel::new("UC1", "One"), &Query::new("TH16", "War"), &cred)
            .await
            .unwrap_err();
        assert_eq!(err, ChannelError::QuotaExhausted);
    }

    #[tokio::test]
    async fn quota_failure_on_details_call_is_distinguished() {
        let provider = FakeProvider {
            details_quota_keys: vec!["k1".to_string()],
            ..FakeProvider::default()
        }
        .with_channel("UC1", &[("v1", "war base", link("TH16", "a").as_str())]);
        let (s, provider, rotator) = searcher(provider, &["k1"]);
        let cred = rotator.select().await.unwrap();

        let err = s
            .search_channel(&Channel::new("UC1", "One"), &Query::new("TH16", "War"), &cred)
            .await
            .unwrap_err();
        assert_eq!(err, ChannelError::QuotaExhausted);
        assert_eq!(provider.search_count(), 1);
        assert_eq!(provider.detail_calls.lock().unwrap().len(), 1);
        // Both calls were billed before the failure surfaced.
        assert_eq!(rotator.statuses().await[0].usage, 101);
    }

    #[tokio::test]
    async fn other_failures_are_provider_errors() {
        let provider = FakeProvider {
            broken_channels: vec!["UC1".to_string()],
            ..FakeProvider::default()
        };
        let (s, _, rotator) = searcher(provider, &["k1"]);
        let cred = rotator.select().await.unwrap();

        let err = s
            .search_channel(&Channel::new("UC1", "One"), &Query::new("TH16", "War"), &cred)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Provider(_)));
    }
}
