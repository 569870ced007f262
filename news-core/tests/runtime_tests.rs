use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use news_core::sync::SyncConfig;
use news_core::{
    spawn_sync, ApiError, ContentApi, FeedSynchronizer, ItemMetadata, NewsItem, NewsPage, Provider,
};
use tokio::sync::{mpsc, watch};

fn item(hash: &str, ts: i64, index: u64) -> NewsItem {
    NewsItem {
        hash: hash.to_owned(),
        index,
        title: format!("item {hash}"),
        description: String::new(),
        created_at: ts,
        category: "flash".to_owned(),
        tags: Vec::new(),
        provider: Provider::default(),
        metadata: ItemMetadata::default(),
    }
}

struct ScriptedApi {
    latest: Mutex<Vec<NewsItem>>,
    latest_calls: AtomicU64,
}

#[async_trait]
impl ContentApi for ScriptedApi {
    async fn get_latest(&self, _count: u64) -> Result<Vec<NewsItem>, ApiError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.latest.lock().unwrap().clone())
    }

    async fn total_count(&self) -> Result<u64, ApiError> {
        Ok(self.latest.lock().unwrap().len() as u64)
    }

    async fn get_page(&self, start: u64, _length: u64) -> Result<NewsPage, ApiError> {
        Ok(NewsPage {
            items: Vec::new(),
            first_index: start,
        })
    }
}

async fn wait_for<F, Fut>(mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if cond().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn push_batches_flow_into_the_feed() {
    let api = Arc::new(ScriptedApi {
        latest: Mutex::new(vec![item("a", 1, 1)]),
        latest_calls: AtomicU64::new(0),
    });
    let sync = Arc::new(FeedSynchronizer::new(api, 2));
    sync.initialize().await.expect("init");

    let (update_tx, update_rx) = mpsc::channel(8);
    let (live_tx, live_rx) = watch::channel(false);
    let config = SyncConfig {
        page_size: 2,
        poll_interval: Duration::from_secs(3600),
    };
    let handle = spawn_sync(sync.clone(), config, update_rx, live_rx);

    live_tx.send(true).expect("live watch");
    update_tx
        .send(vec![item("b", 2, 2)])
        .await
        .expect("push batch");

    let probe = sync.clone();
    wait_for(move || {
        let sync = probe.clone();
        async move {
            let state = sync.snapshot().await;
            state.push_live && state.items.len() == 2
        }
    })
    .await;

    let state = sync.snapshot().await;
    assert_eq!(state.items[0].hash, "b");
    assert_eq!(state.fresh_count, 1);

    handle.stop().await.expect("stop sync");
}

#[tokio::test]
async fn polling_fallback_ticks_while_push_is_down() {
    let api = Arc::new(ScriptedApi {
        latest: Mutex::new(vec![item("a", 1, 1)]),
        latest_calls: AtomicU64::new(0),
    });
    let sync = Arc::new(FeedSynchronizer::new(api.clone(), 2));
    sync.initialize().await.expect("init");
    let calls_after_init = api.latest_calls.load(Ordering::SeqCst);

    *api.latest.lock().unwrap() = vec![item("b", 2, 2), item("a", 1, 1)];

    let (_update_tx, update_rx) = mpsc::channel(8);
    let (_live_tx, live_rx) = watch::channel(false);
    let config = SyncConfig {
        page_size: 2,
        poll_interval: Duration::from_millis(25),
    };
    let handle = spawn_sync(sync.clone(), config, update_rx, live_rx);

    let probe = sync.clone();
    wait_for(move || {
        let sync = probe.clone();
        async move { sync.snapshot().await.items.len() == 2 }
    })
    .await;
    assert!(api.latest_calls.load(Ordering::SeqCst) > calls_after_init);

    handle.stop().await.expect("stop sync");

    // No state mutation after teardown: the polled source keeps moving
    // but the feed stays where the shutdown left it.
    *api.latest.lock().unwrap() = vec![item("c", 3, 3)];
    let len_at_stop = sync.snapshot().await.items.len();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(sync.snapshot().await.items.len(), len_at_stop);
}
