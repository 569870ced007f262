use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::model::{Category, NewsItem, NewsPage};

/// Pull side of the backend: a black-box paginated content store.
///
/// This is the seam the feed synchronizer is built against; tests inject
/// fakes, production injects [`HttpContentApi`].
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Newest `count` items, newest first.
    async fn get_latest(&self, count: u64) -> Result<Vec<NewsItem>, ApiError>;
    /// Total number of items the backend has ever ingested.
    async fn total_count(&self) -> Result<u64, ApiError>;
    /// Page of `length` items starting at `start`, a zero-based offset from
    /// the oldest retained item. Parts of the range living in an archive
    /// shard are the backend's problem; whatever comes back is the page.
    async fn get_page(&self, start: u64, length: u64) -> Result<NewsPage, ApiError>;
}

/// Backend result envelope: `{"ok": ...}` on success, `{"err": ...}` on a
/// backend-side failure.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: Option<T>,
    err: Option<serde_json::Value>,
}

/// HTTP implementation of the pull API against the backend gateway.
#[derive(Debug, Clone)]
pub struct HttpContentApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentApi {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    async fn get_ok<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(%url, "pull request");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        let envelope: Envelope<T> = response.json().await?;
        match (envelope.ok, envelope.err) {
            (Some(value), _) => Ok(value),
            (None, Some(err)) => Err(ApiError::Backend(err.to_string())),
            (None, None) => Err(ApiError::Backend("empty response envelope".to_owned())),
        }
    }

    /// Single item by content hash.
    pub async fn get_by_hash(&self, hash: &str) -> Result<NewsItem, ApiError> {
        self.get_ok(&format!("/news/by_hash?hash={hash}")).await
    }

    /// Single item by backend ingestion index.
    pub async fn get_by_index(&self, index: u64) -> Result<NewsItem, ApiError> {
        self.get_ok(&format!("/news/by_index?index={index}")).await
    }

    /// Items created within `[start, end]` (epoch millis), newest first.
    pub async fn get_by_time(&self, start: i64, end: i64) -> Result<Vec<NewsItem>, ApiError> {
        let mut items: Vec<NewsItem> = self
            .get_ok(&format!("/news/by_time?start={start}&end={end}"))
            .await?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Category reference lookup.
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.get_ok("/categories").await
    }

    /// Tag reference lookup.
    pub async fn tags(&self) -> Result<Vec<Category>, ApiError> {
        self.get_ok("/tags").await
    }
}

#[async_trait]
impl ContentApi for HttpContentApi {
    async fn get_latest(&self, count: u64) -> Result<Vec<NewsItem>, ApiError> {
        let mut items: Vec<NewsItem> = self.get_ok(&format!("/news/latest?count={count}")).await?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn total_count(&self) -> Result<u64, ApiError> {
        self.get_ok("/news/total").await
    }

    async fn get_page(&self, start: u64, length: u64) -> Result<NewsPage, ApiError> {
        let url = format!("{}/news?start={start}&length={length}", self.base_url);
        debug!(%url, "page request");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        // The page endpoint answers with the range directly, no envelope.
        let mut page: NewsPage = response.json().await?;
        page.items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page)
    }
}
