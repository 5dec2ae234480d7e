use crate::application::ports::query_service::{QueryService, fetch_entity};
use crate::application::ports::subscription_channel::Subscription;
use crate::domain::collection::{CollectionState, PendingChange, SharedCollection};
use crate::domain::entities::Entity;
use crate::domain::realtime::{ChangeEvent, ChangeKind, ChangeMessage, EventPayload};
use crate::domain::value_objects::EntityId;
use crate::domain::view::ViewPredicate;
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// 先頭に挿入された
    Inserted,
    /// 位置を保ったまま置き換えられた
    Updated,
    /// ストアから取り除かれた
    Removed,
    /// 何も変わらなかった
    Ignored,
    /// 詳細取得や検証に失敗し破棄された
    Dropped,
}

/// ロック取得済みの状態に対する突き合わせの本体。
///
/// ストアの内容が常に「述語が今見えるべきと判定する集合」と一致するよう、
/// 既存/新規 × 可視/不可視 の四通りで分岐する。反映前に変更印を進める。
pub fn reconcile<E, P>(
    predicate: &P,
    context: &P::Context,
    state: &mut CollectionState<E>,
    kind: ChangeKind,
    entity: E,
) -> ReconcileOutcome
where
    E: Entity,
    P: ViewPredicate<E>,
{
    if kind == ChangeKind::Delete {
        state.record_event(kind, entity.id(), None);
        return retract(state, entity.id());
    }
    state.record_event(kind, entity.id(), Some(&entity));
    merge(predicate, context, state, kind, entity)
}

/// コールドロード中に取り置いたイベントを読み込み直した一覧へ重ねる。
///
/// 変化のあった件数を返す。
pub fn replay<E, P>(
    predicate: &P,
    context: &P::Context,
    state: &mut CollectionState<E>,
    changes: Vec<PendingChange<E>>,
) -> usize
where
    E: Entity,
    P: ViewPredicate<E>,
{
    changes
        .into_iter()
        .map(|change| match change.entity {
            Some(entity) => merge(predicate, context, state, change.kind, entity),
            None => retract(state, &change.id),
        })
        .filter(|outcome| *outcome != ReconcileOutcome::Ignored)
        .count()
}

fn retract<E: Entity>(state: &mut CollectionState<E>, id: &EntityId) -> ReconcileOutcome {
    match state.store.remove(id) {
        Some(_) => ReconcileOutcome::Removed,
        None => ReconcileOutcome::Ignored,
    }
}

fn merge<E, P>(
    predicate: &P,
    context: &P::Context,
    state: &mut CollectionState<E>,
    kind: ChangeKind,
    entity: E,
) -> ReconcileOutcome
where
    E: Entity,
    P: ViewPredicate<E>,
{
    if kind == ChangeKind::Delete {
        return retract(state, entity.id());
    }

    let visible = predicate.includes(&entity, context, &state.liked);
    let present = state.store.contains(entity.id());

    match (kind, present, visible) {
        // 重複配信された INSERT は既存の行を動かさない
        (ChangeKind::Insert, true, _) => ReconcileOutcome::Ignored,
        (_, false, true) => {
            state.store.upsert(entity);
            ReconcileOutcome::Inserted
        }
        (_, true, true) => {
            state.store.upsert(entity);
            ReconcileOutcome::Updated
        }
        (_, true, false) => {
            state.store.remove(entity.id());
            ReconcileOutcome::Removed
        }
        (_, false, false) => ReconcileOutcome::Ignored,
    }
}

/// 購読イベントを現在のビュー条件でストアへ反映する
pub struct Reconciler<E: Entity, P: ViewPredicate<E>> {
    state: SharedCollection<E>,
    context: watch::Receiver<P::Context>,
    predicate: P,
    query: Arc<dyn QueryService>,
}

impl<E: Entity, P: ViewPredicate<E>> Reconciler<E, P> {
    pub fn new(
        state: SharedCollection<E>,
        context: watch::Receiver<P::Context>,
        predicate: P,
        query: Arc<dyn QueryService>,
    ) -> Self {
        Self {
            state,
            context,
            predicate,
            query,
        }
    }

    pub fn state(&self) -> &SharedCollection<E> {
        &self.state
    }

    pub fn predicate(&self) -> &P {
        &self.predicate
    }

    /// 呼び出し時点のコンテキスト。購読開始時の値は使わない
    pub fn current_context(&self) -> P::Context {
        self.context.borrow().clone()
    }

    /// 完全なレコードをロック取得済みの状態へ反映する
    pub fn apply_resolved(
        &self,
        state: &mut CollectionState<E>,
        kind: ChangeKind,
        entity: E,
    ) -> ReconcileOutcome {
        let context = self.current_context();
        let id = entity.id().clone();
        let outcome = reconcile(&self.predicate, &context, state, kind, entity);
        debug!(
            "Reconciled {:?} {} {} -> {:?}",
            kind,
            E::RESOURCE,
            id,
            outcome
        );
        outcome
    }

    pub async fn apply(&self, event: ChangeEvent<E>) -> ReconcileOutcome {
        let (kind, payload) = match event {
            ChangeEvent::Delete(id) => {
                let mut state = self.state.write().await;
                state.record_event(ChangeKind::Delete, &id, None);
                let outcome = retract(&mut state, &id);
                debug!("Reconciled Delete {} {} -> {:?}", E::RESOURCE, id, outcome);
                return outcome;
            }
            ChangeEvent::Insert(payload) => (ChangeKind::Insert, payload),
            ChangeEvent::Update(payload) => (ChangeKind::Update, payload),
        };

        let Some(entity) = self.resolve(payload).await else {
            return ReconcileOutcome::Dropped;
        };

        let mut state = self.state.write().await;
        self.apply_resolved(&mut state, kind, entity)
    }

    /// 生の変更通知を検証してから反映する。失敗は記録して破棄する
    pub async fn handle_message(&self, message: ChangeMessage) -> ReconcileOutcome {
        match ChangeEvent::<E>::decode(message) {
            Ok(event) => self.apply(event).await,
            Err(err) => {
                warn!("Dropping {} change message: {}", E::RESOURCE, err);
                ReconcileOutcome::Dropped
            }
        }
    }

    async fn resolve(&self, payload: EventPayload<E>) -> Option<E> {
        match payload {
            EventPayload::Record(entity) => Some(entity),
            EventPayload::Reference(id) => {
                match fetch_entity::<E>(self.query.as_ref(), &id).await {
                    Ok(entity) => Some(entity),
                    Err(err) => {
                        let stale = AppError::StaleEvent(format!("{} {}: {}", E::RESOURCE, id, err));
                        warn!("{}", stale);
                        None
                    }
                }
            }
        }
    }

    /// 購読を消費するタスクを起動する。戻り値を drop すると購読も解除される
    pub fn spawn(self: Arc<Self>, subscription: Subscription) -> ReconcilerTask {
        let resource = E::RESOURCE;
        let handle = tokio::spawn(async move {
            let mut subscription = subscription;
            info!("Reconciler started for {}", resource);
            while let Some(message) = subscription.recv().await {
                self.handle_message(message).await;
            }
            debug!("Subscription for {} closed", resource);
        });
        ReconcilerTask { handle }
    }
}

/// 購読ループのハンドル
pub struct ReconcilerTask {
    handle: JoinHandle<()>,
}

impl ReconcilerTask {
    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ReconcilerTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
