use crate::domain::realtime::{ChangeMessage, ResourceFilter};
use crate::shared::error::AppError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

type CloseHook = Box<dyn FnOnce() + Send>;

/// 購読ひとつ分のイベント列。
///
/// 再開はできず、`unsubscribe` か drop で以後の配信が止まる。
pub struct Subscription {
    filter: ResourceFilter,
    receiver: mpsc::UnboundedReceiver<ChangeMessage>,
    on_close: Option<CloseHook>,
}

impl Subscription {
    pub fn new(
        filter: ResourceFilter,
        receiver: mpsc::UnboundedReceiver<ChangeMessage>,
        on_close: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            filter,
            receiver,
            on_close: Some(Box::new(on_close)),
        }
    }

    pub fn filter(&self) -> &ResourceFilter {
        &self.filter
    }

    /// 次の変更通知を待つ。チャネルが閉じられた場合は `None`
    pub async fn recv(&mut self) -> Option<ChangeMessage> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.receiver.close();
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl Stream for Subscription {
    type Item = ChangeMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// リソース単位の変更通知を配信する外部チャネルのポート
#[async_trait]
pub trait SubscriptionChannel: Send + Sync {
    async fn subscribe(&self, filter: ResourceFilter) -> Result<Subscription, AppError>;
}
