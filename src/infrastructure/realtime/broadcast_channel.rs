use crate::application::ports::subscription_channel::{Subscription, SubscriptionChannel};
use crate::domain::realtime::{ChangeMessage, ResourceFilter};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{broadcast, mpsc};
use tokio::sync::broadcast::error::RecvError;

/// プロセス内ブロードキャストを購読チャネルとして公開する。
///
/// 購読ごとに転送タスクを起動し、フィルタに一致した通知だけを流す。
/// 取りこぼし（Lagged）は警告のみで、回復は再同期に任せる。
#[derive(Clone)]
pub struct BroadcastSubscriptionChannel {
    sender: broadcast::Sender<ChangeMessage>,
    active: Arc<AtomicUsize>,
}

impl BroadcastSubscriptionChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self::from_sender(sender)
    }

    pub fn from_sender(sender: broadcast::Sender<ChangeMessage>) -> Self {
        Self {
            sender,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 発行側（バックエンド）に渡す送信ハンドル
    pub fn sender(&self) -> broadcast::Sender<ChangeMessage> {
        self.sender.clone()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionChannel for BroadcastSubscriptionChannel {
    async fn subscribe(&self, filter: ResourceFilter) -> Result<Subscription, AppError> {
        let mut source = self.sender.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let task_filter = filter.clone();

        let forwarder = tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(message) => {
                        if !task_filter.matches(&message) {
                            continue;
                        }
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Subscription on {} lagged, skipped {} messages",
                            task_filter.resource,
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        self.active.fetch_add(1, Ordering::SeqCst);
        let active = Arc::clone(&self.active);
        tracing::debug!("Opened subscription on {}", filter.resource);

        Ok(Subscription::new(filter, rx, move || {
            forwarder.abort();
            active.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}
