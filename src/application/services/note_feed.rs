use super::auth_aware::AuthAware;
use super::live_collection::{LiveCollection, ViewSource};
use super::optimistic_mutator::{Freshness, OptimisticMutator, ensure_owned, require_user};
use crate::application::ports::auth_provider::AuthProvider;
use crate::application::ports::query_service::{
    ListQuery, Mutation, MutationRequest, NoteQuery, QueryService, mutate_entity,
};
use crate::application::ports::subscription_channel::SubscriptionChannel;
use crate::domain::entities::{Note, NoteDraft, NotePatch};
use crate::domain::realtime::{ChangeEvent, ChangeKind, EventPayload, ResourceFilter, ResourceKind};
use crate::domain::value_objects::{EntityId, UserId};
use crate::domain::view::{NoteFilters, NoteViewContext, NoteViewMode, NoteVisibility, ViewPredicate};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

impl ViewSource<Note> for NoteVisibility {
    fn list_query(&self, context: &NoteViewContext, limit: u32) -> Option<ListQuery> {
        let query = match context.mode {
            NoteViewMode::Community => NoteQuery {
                owner_id: None,
                public_only: true,
                subject: context.filters.normalized_subject().map(str::to_string),
                liked_by: None,
                limit,
            },
            NoteViewMode::Mine => NoteQuery {
                owner_id: Some(context.current_user.clone()?),
                public_only: false,
                subject: None,
                liked_by: None,
                limit,
            },
            NoteViewMode::Favorites => NoteQuery {
                owner_id: None,
                public_only: false,
                subject: None,
                liked_by: Some(context.current_user.clone()?),
                limit,
            },
        };
        Some(ListQuery::Notes(query))
    }

    fn subscription_filter(&self, _context: &NoteViewContext) -> ResourceFilter {
        ResourceFilter::all(ResourceKind::Notes)
    }

    fn liked_by(&self, context: &NoteViewContext) -> Option<UserId> {
        context.current_user.clone()
    }
}

/// ノート一覧（community / mine / favorites）とその操作
#[derive(Clone)]
pub struct NoteFeed {
    collection: LiveCollection<Note, NoteVisibility>,
    mutator: OptimisticMutator<Note>,
    query: Arc<dyn QueryService>,
    auth: Arc<dyn AuthProvider>,
}

impl NoteFeed {
    pub fn new(
        query: Arc<dyn QueryService>,
        channel: Arc<dyn SubscriptionChannel>,
        auth: Arc<dyn AuthProvider>,
        mode: NoteViewMode,
        list_limit: u32,
    ) -> Self {
        let context = NoteViewContext::new(mode, auth.current_user());
        let collection = LiveCollection::new(
            NoteVisibility,
            context,
            Arc::clone(&query),
            channel,
            list_limit,
        );
        let mutator = OptimisticMutator::new(collection.state().clone());
        Self {
            collection,
            mutator,
            query,
            auth,
        }
    }

    pub fn collection(&self) -> &LiveCollection<Note, NoteVisibility> {
        &self.collection
    }

    pub fn context(&self) -> NoteViewContext {
        self.collection.context()
    }

    pub async fn open(&self) -> Result<(), AppError> {
        self.collection.open().await
    }

    pub async fn close(&self) {
        self.collection.close().await;
    }

    pub async fn resync(&self) -> Result<(), AppError> {
        self.collection.resync().await
    }

    pub async fn set_view(&self, mode: NoteViewMode) -> Result<(), AppError> {
        self.collection.update_context(|ctx| ctx.mode = mode).await
    }

    pub async fn set_filters(&self, filters: NoteFilters) -> Result<(), AppError> {
        self.collection
            .update_context(|ctx| ctx.filters = filters)
            .await
    }

    pub async fn set_current_user(&self, user: Option<UserId>) -> Result<(), AppError> {
        self.collection
            .update_context(|ctx| ctx.current_user = user)
            .await
    }

    pub async fn notes(&self) -> Vec<Note> {
        self.collection.items().await
    }

    pub async fn is_liked(&self, id: &EntityId) -> bool {
        self.collection.is_liked(id).await
    }

    pub async fn like(&self, id: &EntityId) -> Result<(), AppError> {
        self.set_liked(id, true).await.map(|_| ())
    }

    pub async fn unlike(&self, id: &EntityId) -> Result<(), AppError> {
        self.set_liked(id, false).await.map(|_| ())
    }

    /// 反転後のいいね状態を返す
    pub async fn toggle_like(&self, id: &EntityId) -> Result<bool, AppError> {
        let liked = !self.collection.is_liked(id).await;
        self.set_liked(id, liked).await?;
        Ok(liked)
    }

    async fn set_liked(&self, id: &EntityId, liked: bool) -> Result<Option<Note>, AppError> {
        let user = require_user(self.auth.current_user())?;
        let mutation = if liked {
            Mutation::LikeNote { id: id.clone() }
        } else {
            Mutation::UnlikeNote { id: id.clone() }
        };
        let label = mutation.label();
        let request = MutationRequest::new(Some(user), mutation);
        let reconciler = self.collection.reconciler();

        self.mutator
            .execute(
                id,
                label,
                |state| {
                    if state.liked.contains(id) == liked {
                        return false;
                    }
                    state.liked.set(id, liked);
                    if let Some(note) = state.store.get_mut(id) {
                        if liked {
                            note.increment_likes();
                        } else {
                            note.decrement_likes();
                        }
                    }
                    // お気に入り表示での unlike などでビューから外れる場合は即座に取り除く
                    let context = reconciler.current_context();
                    let retract = state.store.get(id).is_some_and(|note| {
                        !reconciler
                            .predicate()
                            .includes(note, &context, &state.liked)
                    });
                    if retract {
                        state.store.remove(id);
                    }
                    true
                },
                mutate_entity::<Note>(self.query.as_ref(), request),
                |state, confirmed, freshness| {
                    state.liked.set(id, liked);
                    match freshness {
                        Freshness::Current => {
                            reconciler.apply_resolved(state, ChangeKind::Update, confirmed.clone());
                        }
                        // 後から届いたイベントやロードの行を古い応答で上書きしない
                        Freshness::Superseded => {
                            debug!("Keeping newer row for note {} after {}", id, label);
                        }
                    }
                },
            )
            .await
    }

    /// サーバーが ID と既定値を決めるため、ローカルへの先行挿入は行わない
    pub async fn create(&self, draft: NoteDraft) -> Result<Note, AppError> {
        let user = require_user(self.auth.current_user())?;
        draft.validate()?;
        let note = mutate_entity::<Note>(
            self.query.as_ref(),
            MutationRequest::new(Some(user), Mutation::CreateNote(draft)),
        )
        .await?;
        info!("Created note {}", note.id);
        self.collection
            .reconciler()
            .apply(ChangeEvent::Insert(EventPayload::Record(note.clone())))
            .await;
        Ok(note)
    }

    pub async fn update(&self, id: &EntityId, patch: NotePatch) -> Result<Note, AppError> {
        let user = require_user(self.auth.current_user())?;
        patch.validate()?;
        let current = self.collection.get(id).await;
        ensure_owned(current.as_ref(), id, &user)?;

        let note = mutate_entity::<Note>(
            self.query.as_ref(),
            MutationRequest::new(
                Some(user),
                Mutation::UpdateNote {
                    id: id.clone(),
                    patch,
                },
            ),
        )
        .await?;
        self.collection
            .reconciler()
            .apply(ChangeEvent::Update(EventPayload::Record(note.clone())))
            .await;
        Ok(note)
    }

    pub async fn delete(&self, id: &EntityId) -> Result<(), AppError> {
        let user = require_user(self.auth.current_user())?;
        let current = self.collection.get(id).await;
        ensure_owned(current.as_ref(), id, &user)?;

        self.query
            .mutate(MutationRequest::new(
                Some(user),
                Mutation::DeleteNote { id: id.clone() },
            ))
            .await?;
        info!("Deleted note {}", id);
        self.collection
            .reconciler()
            .apply(ChangeEvent::Delete(id.clone()))
            .await;
        Ok(())
    }

    /// 閲覧数を加算する。楽観的には反映せずサーバーの値で更新する
    pub async fn record_view(&self, id: &EntityId) -> Result<Note, AppError> {
        let note = mutate_entity::<Note>(
            self.query.as_ref(),
            MutationRequest::new(
                self.auth.current_user(),
                Mutation::RecordNoteView { id: id.clone() },
            ),
        )
        .await?;
        self.collection
            .reconciler()
            .apply(ChangeEvent::Update(EventPayload::Record(note.clone())))
            .await;
        Ok(note)
    }
}

#[async_trait]
impl AuthAware for NoteFeed {
    async fn on_user_changed(&self, user: Option<UserId>) -> Result<(), AppError> {
        self.set_current_user(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{
        StubAuth, StubChannel, StubQuery, id, note, user,
    };
    use crate::domain::entities::Record;
    use crate::domain::realtime::ChangeMessage;
    use std::time::Duration;

    struct Fixture {
        feed: NoteFeed,
        query: Arc<StubQuery>,
        channel: Arc<StubChannel>,
    }

    async fn open_feed(
        mode: NoteViewMode,
        signed_in: Option<&str>,
        notes: Vec<Note>,
        liked: Vec<&str>,
    ) -> Fixture {
        let query = Arc::new(StubQuery::new());
        query.set_list(notes.into_iter().map(Record::Note).collect());
        query.set_liked(liked.into_iter().map(id).collect());
        let channel = Arc::new(StubChannel::new());
        let auth = Arc::new(match signed_in {
            Some(name) => StubAuth::signed_in(name),
            None => StubAuth::signed_out(),
        });
        let feed = NoteFeed::new(query.clone(), channel.clone(), auth, mode, 50);
        feed.open().await.unwrap();
        Fixture {
            feed,
            query,
            channel,
        }
    }

    fn titles(notes: &[Note]) -> Vec<&str> {
        notes.iter().map(|n| n.title.as_str()).collect()
    }

    #[tokio::test]
    async fn like_applies_immediately_and_rolls_back_on_failure() {
        let mut x = note("x", "bob", "Linear algebra");
        x.like_count = 3;
        let fx = open_feed(NoteViewMode::Community, Some("alice"), vec![x], vec![]).await;
        let gate = fx.query.gate();

        let task = {
            let feed = fx.feed.clone();
            tokio::spawn(async move { feed.like(&id("x")).await })
        };
        fx.query.wait_for_mutations(1).await;

        let pending = fx.feed.collection().get(&id("x")).await.unwrap();
        assert_eq!(pending.like_count, 4);
        assert!(fx.feed.is_liked(&id("x")).await);

        gate.send(Err(AppError::remote("network down"))).unwrap();
        let result = task.await.unwrap();

        assert_eq!(result, Err(AppError::remote("network down")));
        let restored = fx.feed.collection().get(&id("x")).await.unwrap();
        assert_eq!(restored.like_count, 3);
        assert!(!fx.feed.is_liked(&id("x")).await);
    }

    async fn like_in_flight(fx: &Fixture) -> (
        tokio::sync::oneshot::Sender<Result<Record, AppError>>,
        tokio::task::JoinHandle<Result<(), AppError>>,
    ) {
        let gate = fx.query.gate();
        let task = {
            let feed = fx.feed.clone();
            tokio::spawn(async move { feed.like(&id("x")).await })
        };
        fx.query.wait_for_mutations(1).await;
        (gate, task)
    }

    #[tokio::test]
    async fn failed_like_does_not_resurrect_note_deleted_in_flight() {
        let fx = open_feed(
            NoteViewMode::Community,
            Some("alice"),
            vec![note("x", "bob", "Linear algebra")],
            vec![],
        )
        .await;
        let (gate, task) = like_in_flight(&fx).await;

        fx.feed
            .collection()
            .reconciler()
            .apply(ChangeEvent::Delete(id("x")))
            .await;
        gate.send(Err(AppError::NotFound("notes x".into()))).unwrap();

        assert!(matches!(task.await.unwrap(), Err(AppError::NotFound(_))));
        assert!(fx.feed.notes().await.is_empty());
        assert!(!fx.feed.is_liked(&id("x")).await);
    }

    #[tokio::test]
    async fn failed_like_keeps_row_from_concurrent_update() {
        let mut x = note("x", "bob", "Linear algebra");
        x.like_count = 3;
        let fx = open_feed(NoteViewMode::Community, Some("alice"), vec![x.clone()], vec![]).await;
        let (gate, task) = like_in_flight(&fx).await;

        let mut edited = x;
        edited.title = "Linear algebra, revised".into();
        fx.feed
            .collection()
            .reconciler()
            .apply(ChangeEvent::Update(EventPayload::Record(edited)))
            .await;
        gate.send(Err(AppError::remote("network down"))).unwrap();
        assert!(task.await.unwrap().is_err());

        let current = fx.feed.collection().get(&id("x")).await.unwrap();
        assert_eq!(current.title, "Linear algebra, revised");
        assert_eq!(current.like_count, 3);
        assert!(!fx.feed.is_liked(&id("x")).await);
    }

    #[tokio::test]
    async fn confirmed_like_does_not_revive_note_deleted_in_flight() {
        let mut x = note("x", "bob", "Linear algebra");
        x.like_count = 3;
        let fx = open_feed(NoteViewMode::Community, Some("alice"), vec![x.clone()], vec![]).await;
        let (gate, task) = like_in_flight(&fx).await;

        fx.feed
            .collection()
            .reconciler()
            .apply(ChangeEvent::Delete(id("x")))
            .await;
        let mut echoed = x;
        echoed.like_count = 4;
        gate.send(Ok(Record::Note(echoed))).unwrap();
        task.await.unwrap().unwrap();

        assert!(fx.feed.notes().await.is_empty());
    }

    #[tokio::test]
    async fn confirmed_like_keeps_newer_row_from_concurrent_update() {
        let mut x = note("x", "bob", "Linear algebra");
        x.like_count = 3;
        let fx = open_feed(NoteViewMode::Community, Some("alice"), vec![x.clone()], vec![]).await;
        let (gate, task) = like_in_flight(&fx).await;

        let mut newer = x.clone();
        newer.title = "Linear algebra, revised".into();
        newer.like_count = 4;
        fx.feed
            .collection()
            .reconciler()
            .apply(ChangeEvent::Update(EventPayload::Record(newer)))
            .await;
        let mut stale = x;
        stale.like_count = 4;
        gate.send(Ok(Record::Note(stale))).unwrap();
        task.await.unwrap().unwrap();

        let current = fx.feed.collection().get(&id("x")).await.unwrap();
        assert_eq!(current.title, "Linear algebra, revised");
        assert_eq!(current.like_count, 4);
        assert!(fx.feed.is_liked(&id("x")).await);
    }

    #[tokio::test]
    async fn deleting_a_liked_note_leaves_liked_set_alone() {
        let fx = open_feed(
            NoteViewMode::Community,
            Some("alice"),
            vec![note("x", "alice", "Own notes")],
            vec!["x"],
        )
        .await;
        fx.query.respond(Ok(Record::Note(note("x", "alice", "Own notes"))));

        fx.feed.delete(&id("x")).await.unwrap();

        assert!(fx.feed.notes().await.is_empty());
        assert!(fx.feed.is_liked(&id("x")).await);
    }

    #[tokio::test]
    async fn like_commit_takes_server_count() {
        let mut x = note("x", "bob", "Linear algebra");
        x.like_count = 3;
        let fx = open_feed(NoteViewMode::Community, Some("alice"), vec![x.clone()], vec![]).await;
        let mut confirmed = x;
        confirmed.like_count = 5;
        fx.query.respond(Ok(Record::Note(confirmed)));

        fx.feed.like(&id("x")).await.unwrap();

        let current = fx.feed.collection().get(&id("x")).await.unwrap();
        assert_eq!(current.like_count, 5);
        assert!(fx.feed.is_liked(&id("x")).await);
    }

    #[tokio::test]
    async fn unlike_in_favorites_removes_before_remote_resolves() {
        let mut y = note("y", "bob", "Organic chemistry");
        y.like_count = 1;
        let fx = open_feed(
            NoteViewMode::Favorites,
            Some("alice"),
            vec![y.clone()],
            vec!["y"],
        )
        .await;
        assert_eq!(fx.feed.notes().await.len(), 1);
        let gate = fx.query.gate();

        let task = {
            let feed = fx.feed.clone();
            tokio::spawn(async move { feed.unlike(&id("y")).await })
        };
        fx.query.wait_for_mutations(1).await;

        assert!(fx.feed.notes().await.is_empty());
        assert!(!fx.feed.is_liked(&id("y")).await);

        let mut confirmed = y;
        confirmed.like_count = 0;
        gate.send(Ok(Record::Note(confirmed))).unwrap();
        task.await.unwrap().unwrap();
        assert!(fx.feed.notes().await.is_empty());
    }

    #[tokio::test]
    async fn like_without_user_is_rejected_before_remote() {
        let fx = open_feed(
            NoteViewMode::Community,
            None,
            vec![note("x", "bob", "Physics")],
            vec![],
        )
        .await;

        assert_eq!(
            fx.feed.like(&id("x")).await,
            Err(AppError::NotAuthenticated)
        );
        assert!(fx.query.mutations().is_empty());
    }

    #[tokio::test]
    async fn repeated_like_is_a_noop() {
        let fx = open_feed(
            NoteViewMode::Community,
            Some("alice"),
            vec![note("x", "bob", "Physics")],
            vec!["x"],
        )
        .await;

        fx.feed.like(&id("x")).await.unwrap();
        fx.feed.unlike(&id("missing")).await.unwrap();

        assert!(fx.query.mutations().is_empty());
    }

    #[tokio::test]
    async fn toggle_like_reports_new_state() {
        let fx = open_feed(
            NoteViewMode::Community,
            Some("alice"),
            vec![note("x", "bob", "Physics")],
            vec![],
        )
        .await;
        fx.query.respond(Ok(Record::Note(note("x", "bob", "Physics"))));

        assert!(fx.feed.toggle_like(&id("x")).await.unwrap());
        assert!(fx.feed.is_liked(&id("x")).await);
    }

    #[tokio::test]
    async fn update_of_foreign_note_fails_before_remote() {
        let fx = open_feed(
            NoteViewMode::Community,
            Some("alice"),
            vec![note("x", "bob", "Physics")],
            vec![],
        )
        .await;

        let patch = NotePatch {
            title: Some("Mine now".into()),
            ..NotePatch::default()
        };
        let err = fx.feed.update(&id("x"), patch).await.unwrap_err();

        assert!(matches!(err, AppError::NotAuthorized(_)));
        assert!(fx.query.mutations().is_empty());
        assert!(matches!(
            fx.feed.delete(&id("x")).await,
            Err(AppError::NotAuthorized(_))
        ));
    }

    #[tokio::test]
    async fn create_inserts_server_row_at_head() {
        let fx = open_feed(
            NoteViewMode::Mine,
            Some("alice"),
            vec![note("old", "alice", "Older")],
            vec![],
        )
        .await;
        fx.query
            .respond(Ok(Record::Note(note("new", "alice", "Newer"))));

        let created = fx
            .feed
            .create(NoteDraft::new("Newer", "body"))
            .await
            .unwrap();

        assert_eq!(created.id, id("new"));
        assert_eq!(titles(&fx.feed.notes().await), vec!["Newer", "Older"]);

        // 同じ行の INSERT が遅れて届いても重複しない
        fx.channel.publish(ChangeMessage::from_entity(
            ChangeKind::Insert,
            &note("new", "alice", "Newer"),
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fx.feed.notes().await.len(), 2);
    }

    #[tokio::test]
    async fn failed_create_leaves_store_untouched() {
        let fx = open_feed(NoteViewMode::Mine, Some("alice"), vec![], vec![]).await;
        fx.query.respond(Err(AppError::remote("quota exceeded")));

        let err = fx
            .feed
            .create(NoteDraft::new("Title", "body"))
            .await
            .unwrap_err();

        assert_eq!(err, AppError::remote("quota exceeded"));
        assert!(fx.feed.notes().await.is_empty());
    }

    #[tokio::test]
    async fn cold_load_applies_client_side_search() {
        let fx = open_feed(
            NoteViewMode::Community,
            Some("alice"),
            vec![
                note("a", "bob", "Algebra drills"),
                note("b", "bob", "History essay"),
            ],
            vec![],
        )
        .await;

        fx.feed
            .set_filters(NoteFilters {
                subject: None,
                search: Some("ALGEBRA".into()),
            })
            .await
            .unwrap();

        assert_eq!(titles(&fx.feed.notes().await), vec!["Algebra drills"]);
    }

    #[tokio::test]
    async fn favorites_without_user_loads_nothing() {
        let fx = open_feed(
            NoteViewMode::Favorites,
            None,
            vec![note("a", "bob", "Algebra")],
            vec!["a"],
        )
        .await;

        assert!(fx.feed.notes().await.is_empty());
        assert!(fx.query.list_queries().is_empty());
    }

    #[tokio::test]
    async fn user_change_reloads_mine_view() {
        let fx = open_feed(
            NoteViewMode::Mine,
            None,
            vec![note("a", "alice", "Alice's"), note("b", "bob", "Bob's")],
            vec![],
        )
        .await;
        assert!(fx.feed.notes().await.is_empty());

        fx.feed.on_user_changed(Some(user("alice"))).await.unwrap();

        assert_eq!(titles(&fx.feed.notes().await), vec!["Alice's"]);
    }
}
