use thiserror::Error;

/// Errors from the pull content API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected HTTP status: {0}")]
    Status(u16),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors from the persistent local store. These are swallowed by the
/// cache layer and only ever logged.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors surfaced by the feed synchronizer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Both the count and the item fetch failed during initialization.
    /// The feed stays empty and retryable.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[source] ApiError),
    /// One of the two initialization calls failed; a degraded state was
    /// still committed.
    #[error("partial initialization: {0}")]
    PartialInit(#[source] ApiError),
    #[error("sync task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors surfaced by the reference-data cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// First-ever fetch failed with nothing cached to fall back to.
    #[error("fetch failed with no cached fallback: {0}")]
    FetchFailed(#[source] ApiError),
}

/// Push channel failures. Never surfaced to the UI as an error; the
/// synchronizer falls back to polling and exposes a liveness flag.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("push task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
