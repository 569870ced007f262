use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::error::PushError;
use crate::model::{now_ms, NewsItem};

/// One message from the push channel. The backend sends four shapes; all
/// of them normalize to a plain batch before merging.
#[derive(Debug, Clone, Deserialize)]
pub enum PushMessage {
    LatestNews(Vec<NewsItem>),
    NewsByHash(NewsItem),
    NewsByIndex(NewsItem),
    NewsByTime(Vec<NewsItem>),
}

impl PushMessage {
    pub fn normalize(self) -> Vec<NewsItem> {
        match self {
            PushMessage::LatestNews(items) | PushMessage::NewsByTime(items) => items,
            PushMessage::NewsByHash(item) | PushMessage::NewsByIndex(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct PushFrame {
    result: PushMessage,
}

#[derive(Debug, Serialize)]
struct SubscribeFrame<'a> {
    topic: &'a str,
    args: Vec<String>,
    timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    /// WebSocket gateway URL.
    pub gateway_url: String,
    /// Topic subscribed to right after the connection opens.
    pub topic: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            gateway_url: "wss://api.ic.news/ws/".to_owned(),
            topic: "get_latest_news".to_owned(),
        }
    }
}

pub struct PushHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl PushHandle {
    pub async fn stop(self) -> Result<(), PushError> {
        let _ = self.cancel_tx.send(());
        self.join.await.map_err(PushError::from)
    }
}

/// Connect to the push gateway and forward normalized batches to
/// `update_tx`. Channel liveness is reported over `live_tx`; any connect
/// or protocol failure flips it to false and ends the task, leaving the
/// synchronizer on its polling fallback. Nothing here ever panics the
/// caller.
pub fn spawn_push(
    config: PushConfig,
    update_tx: mpsc::Sender<Vec<NewsItem>>,
    live_tx: watch::Sender<bool>,
) -> PushHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let (stream, _response) = match connect_async(config.gateway_url.as_str()).await {
            Ok(ok) => ok,
            Err(err) => {
                warn!(error = %err, url = %config.gateway_url, "push connect failed");
                let _ = live_tx.send(false);
                return;
            }
        };
        info!(url = %config.gateway_url, "push channel connected");

        let (mut write, mut read) = stream.split();

        let subscribe = SubscribeFrame {
            topic: &config.topic,
            args: Vec::new(),
            timestamp: now_ms(),
        };
        let frame = serde_json::to_string(&subscribe).expect("serialize subscribe frame");
        if let Err(err) = write.send(WsMessage::Text(frame)).await {
            warn!(error = %err, "push subscribe failed");
            let _ = live_tx.send(false);
            return;
        }
        let _ = live_tx.send(true);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("push shutdown requested");
                    let _ = write.send(WsMessage::Close(None)).await;
                    break;
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            match serde_json::from_str::<PushFrame>(&text) {
                                Ok(frame) => {
                                    let items = frame.result.normalize();
                                    if items.is_empty() {
                                        continue;
                                    }
                                    if update_tx.send(items).await.is_err() {
                                        debug!("push receiver dropped, stopping");
                                        break;
                                    }
                                }
                                Err(err) => {
                                    debug!(error = %err, "ignoring unrecognized push frame");
                                }
                            }
                        }
                        Some(Ok(WsMessage::Ping(payload))) => {
                            if write.send(WsMessage::Pong(payload)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            info!(?frame, "push channel closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(error = %err, "push channel error");
                            break;
                        }
                        None => {
                            info!("push channel ended");
                            break;
                        }
                    }
                }
            }
        }
        let _ = live_tx.send(false);
    });

    PushHandle { cancel_tx, join }
}
