use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Source platform a news item originated from.
///
/// Unrecognized platform names are preserved verbatim in `Other` so items
/// from newly onboarded sources survive a round trip through the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    Telegram,
    X,
    Podcast,
    Unknown,
    Other(String),
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Unknown
    }
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        match value.as_str() {
            "telegram" => Platform::Telegram,
            "x" | "twitter" => Platform::X,
            "podcast" => Platform::Podcast,
            "" => Platform::Unknown,
            _ => Platform::Other(value),
        }
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        match value {
            Platform::Telegram => "telegram".to_owned(),
            Platform::X => "x".to_owned(),
            Platform::Podcast => "podcast".to_owned(),
            Platform::Unknown => String::new(),
            Platform::Other(name) => name,
        }
    }
}

/// Platform-specific fields attached to a news item. Known fields are typed;
/// anything the backend adds later lands in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(default)]
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_snippet: Option<String>,
    #[serde(default)]
    pub app_push: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Principal/alias pair identifying the content source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provider {
    #[serde(default)]
    pub pid: String,
    #[serde(default)]
    pub alias: String,
}

/// A single feed entry as served by the backend.
///
/// `hash` is the sole de-duplication key and never changes once assigned.
/// `index` is the backend's ingestion index; it grows monotonically but is
/// not contiguous once ranges have been archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub hash: String,
    pub index: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Creation time in epoch milliseconds.
    pub created_at: i64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub metadata: ItemMetadata,
}

impl NewsItem {
    pub fn identity(&self) -> &str {
        &self.hash
    }
}

/// One page of the backend's paginated store. The backend may have served
/// part of the requested range from an archive shard; callers only see the
/// items that came back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsPage {
    #[serde(rename = "news")]
    pub items: Vec<NewsItem>,
    #[serde(default)]
    pub first_index: u64,
}

/// Category or tag descriptor from the backend's reference lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
