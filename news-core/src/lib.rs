pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod push;
pub mod store;
pub mod sync;

pub use api::{ContentApi, HttpContentApi};
pub use cache::{partitions, CacheEntry, ReferenceCache};
pub use config::NewsConfig;
pub use error::{ApiError, CacheError, PushError, StoreError, SyncError};
pub use model::{Category, ItemMetadata, NewsItem, NewsPage, Platform, Provider};
pub use push::{spawn_push, PushConfig, PushHandle, PushMessage};
pub use store::{JsonFileStore, LocalStore, MemoryStore, StoredEntry};
pub use sync::{spawn_sync, FeedState, FeedSynchronizer, SyncConfig, SyncHandle};
