use super::reconciler::{Reconciler, ReconcilerTask, replay};
use crate::application::ports::query_service::{ListQuery, QueryService, fetch_entities};
use crate::application::ports::subscription_channel::SubscriptionChannel;
use crate::domain::collection::{LikedSet, SharedCollection, shared_collection};
use crate::domain::entities::Entity;
use crate::domain::realtime::ResourceFilter;
use crate::domain::value_objects::{EntityId, UserId};
use crate::domain::view::ViewPredicate;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

/// ビュー条件からコールドロードのクエリと購読範囲を導く
pub trait ViewSource<E: Entity>: ViewPredicate<E> {
    /// `None` の場合、一覧は空になる（未ログインでの "mine" など）
    fn list_query(&self, context: &Self::Context, limit: u32) -> Option<ListQuery>;

    fn subscription_filter(&self, context: &Self::Context) -> ResourceFilter;

    /// いいね集合を読み込むユーザー
    fn liked_by(&self, _context: &Self::Context) -> Option<UserId> {
        None
    }
}

struct ActiveSubscription {
    filter: ResourceFilter,
    task: ReconcilerTask,
}

struct Inner<E: Entity, P: ViewSource<E>> {
    reconciler: Arc<Reconciler<E, P>>,
    context: watch::Sender<P::Context>,
    query: Arc<dyn QueryService>,
    channel: Arc<dyn SubscriptionChannel>,
    list_limit: u32,
    subscription: Mutex<Option<ActiveSubscription>>,
    resync_seq: AtomicU64,
}

/// ビューひとつ分の購読・突き合わせ・コールドロードをまとめたコレクション。
///
/// 複製は同じ状態を共有する。最後の複製が drop されると購読も解除される。
pub struct LiveCollection<E: Entity, P: ViewSource<E>> {
    inner: Arc<Inner<E, P>>,
}

impl<E: Entity, P: ViewSource<E>> Clone for LiveCollection<E, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Entity, P: ViewSource<E>> LiveCollection<E, P> {
    pub fn new(
        predicate: P,
        context: P::Context,
        query: Arc<dyn QueryService>,
        channel: Arc<dyn SubscriptionChannel>,
        list_limit: u32,
    ) -> Self {
        let (context_tx, context_rx) = watch::channel(context);
        let reconciler = Arc::new(Reconciler::new(
            shared_collection(),
            context_rx,
            predicate,
            Arc::clone(&query),
        ));
        Self {
            inner: Arc::new(Inner {
                reconciler,
                context: context_tx,
                query,
                channel,
                list_limit,
                subscription: Mutex::new(None),
                resync_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler<E, P>> {
        &self.inner.reconciler
    }

    pub fn state(&self) -> &SharedCollection<E> {
        self.inner.reconciler.state()
    }

    pub fn context(&self) -> P::Context {
        self.inner.context.borrow().clone()
    }

    /// 購読を開始してから初回ロードを行う
    pub async fn open(&self) -> Result<(), AppError> {
        self.ensure_subscription().await?;
        self.resync().await
    }

    /// コンテキストを変更し、購読範囲の付け替えとコールドロードを行う
    pub async fn update_context<F>(&self, update: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut P::Context) + Send,
    {
        self.inner.context.send_modify(update);
        if self.is_open().await {
            self.ensure_subscription().await?;
        }
        self.resync().await
    }

    /// 一覧を取得し直して丸ごと置き換える。後発の resync があれば結果を捨てる。
    ///
    /// 取得中に反映されたイベントは置き換え後の一覧へ重ね直す。
    pub async fn resync(&self) -> Result<(), AppError> {
        let seq = self.inner.resync_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let predicate = self.inner.reconciler.predicate();
        let context = self.context();

        let since = self.state().write().await.begin_capture();
        let fetched = self.fetch_view(&context).await;

        let mut state = self.state().write().await;
        let pending = state.finish_capture(since);
        let (liked, entities) = fetched?;
        if self.inner.resync_seq.load(Ordering::SeqCst) != seq {
            debug!("Discarding superseded {} resync", E::RESOURCE);
            return Ok(());
        }

        let visible: Vec<E> = entities
            .into_iter()
            .filter(|entity| predicate.includes(entity, &context, &liked))
            .collect();
        state.liked = liked;
        state.reset(visible);
        let replayed = replay(predicate, &context, &mut state, pending);
        debug!(
            "Resynced {} ({} items, {} replayed, generation {})",
            E::RESOURCE,
            state.store.len(),
            replayed,
            state.generation()
        );
        Ok(())
    }

    async fn fetch_view(&self, context: &P::Context) -> Result<(LikedSet, Vec<E>), AppError> {
        let predicate = self.inner.reconciler.predicate();
        let liked = match predicate.liked_by(context) {
            Some(user) => self.inner.query.fetch_liked_note_ids(&user).await?,
            None => Vec::new(),
        };
        let entities = match predicate.list_query(context, self.inner.list_limit) {
            Some(query) => fetch_entities::<E>(self.inner.query.as_ref(), query).await?,
            None => Vec::new(),
        };
        Ok((liked.into_iter().collect(), entities))
    }

    /// 現在のコンテキストが求める範囲で購読していることを保証する
    async fn ensure_subscription(&self) -> Result<(), AppError> {
        let filter = self
            .inner
            .reconciler
            .predicate()
            .subscription_filter(&self.context());
        let mut active = self.inner.subscription.lock().await;
        if active
            .as_ref()
            .is_some_and(|current| current.filter == filter && !current.task.is_finished())
        {
            return Ok(());
        }

        // 新しい範囲を購読する前に古い購読を解除する
        if let Some(previous) = active.take() {
            debug!("Dropping {} subscription {:?}", E::RESOURCE, previous.filter);
            previous.task.stop();
        }

        let subscription = self.inner.channel.subscribe(filter.clone()).await?;
        let task = Arc::clone(&self.inner.reconciler).spawn(subscription);
        info!("Subscribed to {} ({:?})", E::RESOURCE, filter.scope);
        *active = Some(ActiveSubscription { filter, task });
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.inner.subscription.lock().await.is_some()
    }

    /// 購読を解除する。保持している一覧はそのまま残る
    pub async fn close(&self) {
        if let Some(active) = self.inner.subscription.lock().await.take() {
            info!("Unsubscribed from {}", E::RESOURCE);
            active.task.stop();
        }
    }

    pub async fn items(&self) -> Vec<E> {
        self.state().read().await.store.items().to_vec()
    }

    pub async fn get(&self, id: &EntityId) -> Option<E> {
        self.state().read().await.store.get(id).cloned()
    }

    pub async fn is_liked(&self, id: &EntityId) -> bool {
        self.state().read().await.liked.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.state().read().await.store.len()
    }
}
