use crate::domain::collection::{CollectionState, SharedCollection};
use crate::domain::entities::{Entity, Owned};
use crate::domain::value_objects::{EntityId, UserId};
use crate::shared::error::AppError;
use std::future::Future;
use tracing::{debug, warn};

/// 楽観的更新の直前に取ったエンティティ単位のスナップショット。
///
/// ストア内の位置と値、いいね集合での所属、その ID の変更印をまとめて保持し、
/// 書き戻しは同じロックの内側で一度に行う。
#[derive(Debug, Clone)]
pub struct Snapshot<E> {
    generation: u64,
    id: EntityId,
    stamp: Option<u64>,
    position: Option<(usize, E)>,
    liked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// 位置と値、いいねの所属を取得時点へ戻した
    Restored,
    /// 同じ ID へのイベントが先に反映されていた。行はイベントのまま残し、所属だけ戻した
    Superseded,
    /// コールドロードを挟んでいたため何もしなかった
    Reloaded,
}

/// 確定時点で、スナップショット以降の変更が同じ ID に届いていたか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Current,
    /// 購読イベントかコールドロードが先に反映されている
    Superseded,
}

impl<E: Entity> Snapshot<E> {
    pub fn capture(state: &CollectionState<E>, id: &EntityId) -> Self {
        let position = state
            .store
            .position(id)
            .and_then(|index| state.store.get(id).map(|entity| (index, entity.clone())));
        Self {
            generation: state.generation(),
            id: id.clone(),
            stamp: state.stamp(id),
            position,
            liked: state.liked.contains(id),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn freshness(&self, state: &CollectionState<E>) -> Freshness {
        if state.generation() == self.generation && state.stamp(&self.id) == self.stamp {
            Freshness::Current
        } else {
            Freshness::Superseded
        }
    }

    /// 取得時点の状態へ書き戻す。
    ///
    /// 取得後にイベントが反映された行は上書きも再挿入もしない。
    /// イベントの行はサーバーの値なので楽観的な差分は含まれていない。
    pub fn restore(self, state: &mut CollectionState<E>) -> RestoreOutcome {
        if state.generation() != self.generation {
            return RestoreOutcome::Reloaded;
        }
        state.liked.set(&self.id, self.liked);
        if state.stamp(&self.id) != self.stamp {
            return RestoreOutcome::Superseded;
        }
        state.store.remove(&self.id);
        if let Some((index, entity)) = self.position {
            state.store.insert_at(index, entity);
        }
        RestoreOutcome::Restored
    }
}

/// snapshot → ローカル適用 → リモート呼び出し → 確定 / 巻き戻し の二相ミューテーション
#[derive(Clone)]
pub struct OptimisticMutator<E: Entity> {
    state: SharedCollection<E>,
}

impl<E: Entity> OptimisticMutator<E> {
    pub fn new(state: SharedCollection<E>) -> Self {
        Self { state }
    }

    /// `apply` が `false` を返した場合はリモート呼び出しを行わず `Ok(None)` を返す。
    ///
    /// 成功時の `commit` は確定した値と、スナップショット以降に同じ ID へ
    /// 別の変更が届いていたかを受け取る。失敗時はスナップショットへ巻き戻してから
    /// エラーを返す。
    pub async fn execute<T, A, Fut, C>(
        &self,
        id: &EntityId,
        label: &str,
        apply: A,
        remote: Fut,
        commit: C,
    ) -> Result<Option<T>, AppError>
    where
        T: Send,
        A: FnOnce(&mut CollectionState<E>) -> bool + Send,
        Fut: Future<Output = Result<T, AppError>> + Send,
        C: FnOnce(&mut CollectionState<E>, &T, Freshness) + Send,
    {
        let snapshot = {
            let mut state = self.state.write().await;
            let snapshot = Snapshot::capture(&state, id);
            if !apply(&mut state) {
                debug!("Skipped {} for {} {}: nothing to change", label, E::RESOURCE, id);
                return Ok(None);
            }
            snapshot
        };

        match remote.await {
            Ok(value) => {
                let mut state = self.state.write().await;
                let freshness = snapshot.freshness(&state);
                commit(&mut state, &value, freshness);
                debug!(
                    "Committed {} for {} {} ({:?})",
                    label,
                    E::RESOURCE,
                    id,
                    freshness
                );
                Ok(Some(value))
            }
            Err(err) => {
                let mut state = self.state.write().await;
                match snapshot.restore(&mut state) {
                    RestoreOutcome::Restored => {
                        warn!("Rolled back {} for {} {}: {}", label, E::RESOURCE, id, err);
                    }
                    RestoreOutcome::Superseded => warn!(
                        "{} for {} {} failed; keeping the row from a newer event: {}",
                        label,
                        E::RESOURCE,
                        id,
                        err
                    ),
                    RestoreOutcome::Reloaded => warn!(
                        "{} for {} {} failed after the view was reloaded: {}",
                        label,
                        E::RESOURCE,
                        id,
                        err
                    ),
                }
                Err(err)
            }
        }
    }
}

/// 現在のユーザーを要求する。未ログインならリモート呼び出し前に拒否する
pub fn require_user(user: Option<UserId>) -> Result<UserId, AppError> {
    user.ok_or(AppError::NotAuthenticated)
}

/// ローカルで所有者を確認できない更新・削除を拒否する
pub fn ensure_owned<T: Owned + Entity>(
    entity: Option<&T>,
    id: &EntityId,
    user: &UserId,
) -> Result<(), AppError> {
    match entity {
        Some(entity) if entity.owner_id() == user => Ok(()),
        Some(_) => Err(AppError::NotAuthorized(format!(
            "{} {} is owned by another user",
            T::RESOURCE,
            id
        ))),
        None => Err(AppError::NotAuthorized(format!(
            "{} {} is not loaded; ownership cannot be verified",
            T::RESOURCE,
            id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collection::shared_collection;
    use crate::domain::entities::NoteComment;
    use crate::domain::realtime::ChangeKind;
    use chrono::Utc;

    fn comment(id: &str, content: &str) -> NoteComment {
        NoteComment {
            id: EntityId::new(id).unwrap(),
            note_id: EntityId::new("note").unwrap(),
            owner_id: UserId::new("alice").unwrap(),
            content: content.into(),
            author_name: None,
            created_at: Utc::now(),
        }
    }

    async fn seeded() -> SharedCollection<NoteComment> {
        let state = shared_collection();
        state
            .write()
            .await
            .reset(vec![comment("a", "one"), comment("b", "two"), comment("c", "three")]);
        state
    }

    async fn contents(state: &SharedCollection<NoteComment>) -> Vec<String> {
        state
            .read()
            .await
            .store
            .items()
            .iter()
            .map(|c| c.content.clone())
            .collect()
    }

    #[tokio::test]
    async fn failure_restores_position_value_and_membership() {
        let state = seeded().await;
        let mutator = OptimisticMutator::new(state.clone());
        let id = EntityId::new("b").unwrap();

        let result: Result<Option<()>, AppError> = mutator
            .execute(
                &id,
                "edit",
                |state| {
                    state.store.remove(&EntityId::new("b").unwrap());
                    state.liked.insert(EntityId::new("b").unwrap());
                    true
                },
                async { Err(AppError::remote("offline")) },
                |_, _, _| {},
            )
            .await;

        assert_eq!(result, Err(AppError::remote("offline")));
        assert_eq!(contents(&state).await, vec!["one", "two", "three"]);
        assert!(!state.read().await.liked.contains(&id));
    }

    #[tokio::test]
    async fn success_runs_commit_with_remote_value() {
        let state = seeded().await;
        let mutator = OptimisticMutator::new(state.clone());
        let id = EntityId::new("a").unwrap();

        let result = mutator
            .execute(
                &id,
                "edit",
                |state| {
                    if let Some(c) = state.store.get_mut(&EntityId::new("a").unwrap()) {
                        c.content = "optimistic".into();
                    }
                    true
                },
                async { Ok(comment("a", "authoritative")) },
                |state, confirmed, freshness| {
                    assert_eq!(freshness, Freshness::Current);
                    state.store.upsert(confirmed.clone());
                },
            )
            .await
            .unwrap();

        assert!(result.is_some());
        assert_eq!(contents(&state).await, vec!["authoritative", "two", "three"]);
    }

    #[tokio::test]
    async fn declined_apply_skips_remote_call() {
        let state = seeded().await;
        let mutator = OptimisticMutator::new(state.clone());
        let id = EntityId::new("a").unwrap();

        let result: Option<()> = mutator
            .execute(
                &id,
                "noop",
                |_| false,
                async { Err(AppError::remote("remote must not be awaited")) },
                |_, _, _| {},
            )
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn rollback_is_skipped_after_reload() {
        let state = seeded().await;
        let mutator = OptimisticMutator::new(state.clone());
        let id = EntityId::new("a").unwrap();
        let reload_target = state.clone();

        let result: Result<Option<()>, AppError> = mutator
            .execute(
                &id,
                "edit",
                |state| {
                    state.store.remove(&EntityId::new("a").unwrap());
                    true
                },
                async move {
                    reload_target.write().await.reset(vec![comment("z", "fresh")]);
                    Err(AppError::remote("offline"))
                },
                |_, _, _| {},
            )
            .await;

        assert!(result.is_err());
        assert_eq!(contents(&state).await, vec!["fresh"]);
    }

    #[tokio::test]
    async fn rollback_does_not_resurrect_row_deleted_in_flight() {
        let state = seeded().await;
        let mutator = OptimisticMutator::new(state.clone());
        let id = EntityId::new("b").unwrap();
        let events = state.clone();

        let result: Result<Option<()>, AppError> = mutator
            .execute(
                &id,
                "edit",
                |state| {
                    if let Some(c) = state.store.get_mut(&EntityId::new("b").unwrap()) {
                        c.content = "optimistic".into();
                    }
                    state.liked.insert(EntityId::new("b").unwrap());
                    true
                },
                async move {
                    let mut state = events.write().await;
                    let b = EntityId::new("b").unwrap();
                    state.record_event(ChangeKind::Delete, &b, None);
                    state.store.remove(&b);
                    Err(AppError::NotFound("note_comments b".into()))
                },
                |_, _, _| {},
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(contents(&state).await, vec!["one", "three"]);
        assert!(!state.read().await.liked.contains(&id));
    }

    #[tokio::test]
    async fn commit_sees_events_that_raced_the_remote_call() {
        let state = seeded().await;
        let mutator = OptimisticMutator::new(state.clone());
        let id = EntityId::new("a").unwrap();
        let events = state.clone();

        let seen = mutator
            .execute(
                &id,
                "edit",
                |_| true,
                async move {
                    let newer = comment("a", "edited elsewhere");
                    let mut state = events.write().await;
                    state.record_event(ChangeKind::Update, &newer.id, Some(&newer));
                    state.store.upsert(newer);
                    Ok(comment("a", "stale echo"))
                },
                |_, _, freshness| assert_eq!(freshness, Freshness::Superseded),
            )
            .await
            .unwrap();

        assert!(seen.is_some());
        assert_eq!(contents(&state).await, vec!["edited elsewhere", "two", "three"]);
    }

    #[test]
    fn ownership_is_checked_locally() {
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();
        let id = EntityId::new("a").unwrap();
        let owned = comment("a", "mine");

        assert!(ensure_owned(Some(&owned), &id, &alice).is_ok());
        assert!(matches!(
            ensure_owned(Some(&owned), &id, &bob),
            Err(AppError::NotAuthorized(_))
        ));
        assert!(matches!(
            ensure_owned::<NoteComment>(None, &id, &alice),
            Err(AppError::NotAuthorized(_))
        ));
        assert_eq!(require_user(None), Err(AppError::NotAuthenticated));
    }
}
