//! YouTube Data API v3 adapter.
//!
//! Implements the `bf-core` search provider port with `search.list` (recent
//! videos of a channel) and `videos.list` (descriptions by id).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use bf_core::{
    config::DEFAULT_YOUTUBE_API_BASE,
    errors::Error,
    search::{ProviderError, SearchProvider, VideoDetails, VideoSearch, VideoSummary},
    Result,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error reasons the API uses for quota and rate limiting.
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
];

#[derive(Clone, Debug)]
pub struct YouTubeClient {
    base_url: String,
    http: reqwest::Client,
}

impl YouTubeClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_YOUTUBE_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("basefinder/0.1")
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<T, ProviderError> {
        let resp = self
            .http
            .get(format!("{}/{endpoint}", self.base_url))
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("youtube request error: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(endpoint, %status, "youtube request failed");
            return Err(classify_failure(status, &body));
        }

        resp.json::<T>()
            .await
            .map_err(|e| ProviderError::Transient(format!("youtube json error: {e}")))
    }
}

#[async_trait]
impl SearchProvider for YouTubeClient {
    async fn search_videos(
        &self,
        api_key: &str,
        req: &VideoSearch,
    ) -> std::result::Result<Vec<VideoSummary>, ProviderError> {
        let params = [
            ("part", "snippet".to_string()),
            ("channelId", req.channel_id.clone()),
            ("type", "video".to_string()),
            ("order", "date".to_string()),
            ("maxResults", req.max_results.to_string()),
            ("q", req.text.clone()),
            ("publishedAfter", req.published_after_rfc3339()),
            ("key", api_key.to_string()),
        ];
        let page: SearchListResponse = self.get_json("search", &params).await?;
        Ok(page.into_summaries())
    }

    async fn video_details(
        &self,
        api_key: &str,
        video_ids: &[String],
    ) -> std::result::Result<Vec<VideoDetails>, ProviderError> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = [
            ("part", "snippet".to_string()),
            ("id", video_ids.join(",")),
            ("key", api_key.to_string()),
        ];
        let page: VideoListResponse = self.get_json("videos", &params).await?;
        Ok(page.into_details())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    #[serde(default)]
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId", default)]
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

impl SearchListResponse {
    fn into_summaries(self) -> Vec<VideoSummary> {
        self.items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                let title = item.snippet.map(|s| s.title).unwrap_or_default();
                Some(VideoSummary { id, title })
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
}

impl VideoListResponse {
    fn into_details(self) -> Vec<VideoDetails> {
        self.items
            .into_iter()
            .map(|item| VideoDetails {
                id: item.id,
                description: item.snippet.description,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Map a non-success answer onto the provider error taxonomy.
fn classify_failure(status: StatusCode, body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let quota_reason = parsed.as_ref().is_some_and(|env| {
        env.error
            .errors
            .iter()
            .any(|d| QUOTA_REASONS.contains(&d.reason.as_str()))
    });

    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && quota_reason) {
        return ProviderError::QuotaExceeded;
    }

    let detail = parsed
        .map(|env| env.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());

    if status.is_server_error() {
        ProviderError::Transient(format!("youtube {status}: {detail}"))
    } else {
        ProviderError::Rejected(format!("youtube {status}: {detail}"))
    }
}
