use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ContentApi;
use crate::error::SyncError;
use crate::model::NewsItem;

/// Working set of one feed: the canonical, newest-first, de-duplicated
/// view merged from the push and pull channels.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    /// Newest first, no duplicate hashes.
    pub items: Vec<NewsItem>,
    /// Total item count the backend has reported, grown as push batches
    /// bring genuinely new items.
    pub total: u64,
    /// Items merged since the last [`FeedSynchronizer::mark_seen`].
    pub fresh_count: u64,
    /// Whether the push channel is currently live.
    pub push_live: bool,
    /// Whether older pages remain to be fetched.
    pub has_more: bool,
}

/// Merges the push stream and the pull (polling) stream into one ordered
/// sequence and paginates older pages over the backend's cursor.
///
/// Every mutation takes the state write lock for the whole
/// read-compute-commit, so push merges, pull merges and pagination appends
/// serialize against each other no matter how their network calls
/// interleave.
pub struct FeedSynchronizer {
    api: Arc<dyn ContentApi>,
    state: RwLock<FeedState>,
    page_size: u64,
    page_in_flight: AtomicBool,
}

impl FeedSynchronizer {
    pub fn new(api: Arc<dyn ContentApi>, page_size: u64) -> Self {
        Self {
            api,
            state: RwLock::new(FeedState {
                has_more: true,
                ..FeedState::default()
            }),
            page_size: page_size.max(1),
            page_in_flight: AtomicBool::new(false),
        }
    }

    pub async fn snapshot(&self) -> FeedState {
        self.state.read().await.clone()
    }

    /// Fetch the total remote count and the newest page concurrently.
    ///
    /// Both failing is [`SyncError::BackendUnavailable`]; the feed stays
    /// empty with `has_more` still true, so the caller can simply call
    /// `initialize` again. One failing commits whatever arrived and
    /// surfaces [`SyncError::PartialInit`].
    pub async fn initialize(&self) -> Result<FeedState, SyncError> {
        let (total, latest) = tokio::join!(
            self.api.total_count(),
            self.api.get_latest(self.page_size)
        );

        match (total, latest) {
            (Ok(total), Ok(mut items)) => {
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                dedup_by_hash(&mut items);
                let mut state = self.state.write().await;
                state.items = items;
                state.total = total;
                state.fresh_count = 0;
                state.has_more = total > self.page_size;
                Ok(state.clone())
            }
            (Ok(total), Err(err)) => {
                warn!(error = %err, "initial item fetch failed, keeping count only");
                let mut state = self.state.write().await;
                state.total = total;
                state.has_more = true;
                drop(state);
                Err(SyncError::PartialInit(err))
            }
            (Err(err), Ok(mut items)) => {
                warn!(error = %err, "initial count fetch failed, keeping items only");
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                dedup_by_hash(&mut items);
                let mut state = self.state.write().await;
                state.items = items;
                state.has_more = true;
                drop(state);
                Err(SyncError::PartialInit(err))
            }
            (Err(total_err), Err(items_err)) => {
                warn!(count_error = %total_err, items_error = %items_err, "initialization failed");
                Err(SyncError::BackendUnavailable(total_err))
            }
        }
    }

    /// Merge a batch from the push channel.
    ///
    /// Hashes already present are replaced in place (the push copy is
    /// assumed fresher) without touching order or counters; genuinely new
    /// items are prepended newest-first and counted. Idempotent.
    pub async fn merge_push(&self, items: Vec<NewsItem>) -> FeedState {
        let mut state = self.state.write().await;
        let added = merge_front(&mut state, items, true);
        if added > 0 {
            debug!(added, "merged push batch");
        }
        state.clone()
    }

    /// Polling fallback, invoked only while the push channel is down.
    /// Same merge semantics as [`merge_push`] except an existing hash is
    /// never overwritten by the pulled copy. Pull errors are absorbed.
    ///
    /// [`merge_push`]: FeedSynchronizer::merge_push
    pub async fn refresh_if_disconnected(&self) -> FeedState {
        if self.state.read().await.push_live {
            return self.snapshot().await;
        }
        match self.api.get_latest(self.page_size).await {
            Ok(items) => {
                let mut state = self.state.write().await;
                let added = merge_front(&mut state, items, false);
                if added > 0 {
                    debug!(added, "merged polled batch");
                }
                state.clone()
            }
            Err(err) => {
                warn!(error = %err, "poll refresh failed");
                self.snapshot().await
            }
        }
    }

    /// Fetch the next older page.
    ///
    /// The cursor counts from the oldest retained item:
    /// `start = total - local_len - page_size`, clamped to zero for the
    /// fetch. Items already present are skipped, which absorbs the index
    /// shift caused by concurrent prepends. Pagination is best-effort: a
    /// fetch error or an all-duplicate page just turns `has_more` off.
    /// Only one page fetch runs at a time; a concurrent call is a no-op.
    pub async fn load_next_page(&self) -> FeedState {
        {
            let state = self.state.read().await;
            if !state.has_more {
                return state.clone();
            }
        }
        if self
            .page_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("page fetch already in flight");
            return self.snapshot().await;
        }

        let state = self.load_next_page_inner().await;
        self.page_in_flight.store(false, Ordering::Release);
        state
    }

    async fn load_next_page_inner(&self) -> FeedState {
        let (total, local_len) = {
            let state = self.state.read().await;
            (state.total as i64, state.items.len() as i64)
        };
        let page = self.page_size as i64;
        let start = total - local_len - page;
        let fetch_start = start.max(0) as u64;

        match self.api.get_page(fetch_start, self.page_size).await {
            Ok(response) => {
                let mut state = self.state.write().await;
                let seen: HashSet<String> =
                    state.items.iter().map(|item| item.hash.clone()).collect();
                let mut appended: Vec<NewsItem> = Vec::new();
                for item in response.items {
                    if seen.contains(&item.hash) {
                        continue;
                    }
                    if appended.iter().any(|a| a.hash == item.hash) {
                        continue;
                    }
                    appended.push(item);
                }
                if appended.is_empty() {
                    state.has_more = false;
                } else {
                    appended.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                    state.items.extend(appended);
                    state.has_more = start - page >= 0;
                }
                state.clone()
            }
            Err(err) => {
                warn!(error = %err, start = fetch_start, "page fetch failed, stopping pagination");
                let mut state = self.state.write().await;
                state.has_more = false;
                state.clone()
            }
        }
    }

    /// Acknowledge that the user has looked at the feed.
    pub async fn mark_seen(&self) -> FeedState {
        let mut state = self.state.write().await;
        state.fresh_count = 0;
        state.clone()
    }

    pub async fn set_push_live(&self, live: bool) {
        let mut state = self.state.write().await;
        if state.push_live != live {
            info!(live, "push liveness changed");
            state.push_live = live;
        }
    }
}

fn dedup_by_hash(items: &mut Vec<NewsItem>) {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    items.retain(|item| seen.insert(item.hash.clone()));
}

/// Insert a batch at the front of the feed. Returns the number of
/// genuinely new items. `overwrite` controls what happens on a hash
/// collision: the push channel replaces the stored copy, the pull channel
/// drops its own.
fn merge_front(state: &mut FeedState, incoming: Vec<NewsItem>, overwrite: bool) -> u64 {
    let mut fresh: Vec<NewsItem> = Vec::new();
    for item in incoming {
        if let Some(pos) = state.items.iter().position(|e| e.hash == item.hash) {
            if overwrite {
                state.items[pos] = item;
            }
            continue;
        }
        if let Some(pos) = fresh.iter().position(|e| e.hash == item.hash) {
            if overwrite {
                fresh[pos] = item;
            }
            continue;
        }
        fresh.push(item);
    }

    let added = fresh.len() as u64;
    if added > 0 {
        fresh.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        fresh.append(&mut state.items);
        state.items = fresh;
        state.fresh_count += added;
        state.total += added;
    }
    added
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Items per page for initialization and pagination.
    pub page_size: u64,
    /// Polling-fallback interval while the push channel is down.
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            poll_interval: Duration::from_secs(10),
        }
    }
}

pub struct SyncHandle {
    cancel_tx: broadcast::Sender<()>,
    joins: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    pub async fn stop(self) -> Result<(), SyncError> {
        let _ = self.cancel_tx.send(());
        for join in self.joins {
            join.await?;
        }
        Ok(())
    }
}

/// Wire a synchronizer to its two live update sources: push batches from
/// `updates` and the polling fallback ticking at `poll_interval`.
///
/// Cancellation tears both tasks down; a batch or tick that loses the
/// race against `stop` is dropped before it can touch state.
pub fn spawn_sync(
    sync: Arc<FeedSynchronizer>,
    config: SyncConfig,
    mut updates: mpsc::Receiver<Vec<NewsItem>>,
    mut live_rx: watch::Receiver<bool>,
) -> SyncHandle {
    let (cancel_tx, mut cancel_merge) = broadcast::channel(1);
    let mut cancel_poll = cancel_tx.subscribe();

    let merge_sync = sync.clone();
    let merge_join = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_merge.recv() => {
                    info!("merge loop shutdown requested");
                    break;
                }
                changed = live_rx.changed() => {
                    if changed.is_err() {
                        merge_sync.set_push_live(false).await;
                        continue;
                    }
                    let live = *live_rx.borrow_and_update();
                    merge_sync.set_push_live(live).await;
                }
                batch = updates.recv() => {
                    match batch {
                        Some(items) => {
                            merge_sync.merge_push(items).await;
                        }
                        None => {
                            debug!("push update channel closed");
                            merge_sync.set_push_live(false).await;
                            break;
                        }
                    }
                }
            }
        }
    });

    let poll_join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; initialization already covered it.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel_poll.recv() => {
                    info!("poll loop shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    sync.refresh_if_disconnected().await;
                }
            }
        }
    });

    SyncHandle {
        cancel_tx,
        joins: vec![merge_join, poll_join],
    }
}
