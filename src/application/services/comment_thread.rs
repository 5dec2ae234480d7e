use super::live_collection::{LiveCollection, ViewSource};
use super::optimistic_mutator::{ensure_owned, require_user};
use crate::application::ports::auth_provider::AuthProvider;
use crate::application::ports::query_service::{
    CommentQuery, ListQuery, Mutation, MutationRequest, QueryService, mutate_entity,
};
use crate::application::ports::subscription_channel::SubscriptionChannel;
use crate::domain::entities::{NoteComment, normalize_comment_content};
use crate::domain::realtime::{ChangeEvent, EventPayload, ResourceFilter, ResourceKind};
use crate::domain::value_objects::EntityId;
use crate::domain::view::{CommentViewContext, CommentVisibility};
use crate::shared::error::AppError;
use std::sync::Arc;

impl ViewSource<NoteComment> for CommentVisibility {
    fn list_query(&self, context: &CommentViewContext, limit: u32) -> Option<ListQuery> {
        Some(ListQuery::Comments(CommentQuery {
            note_id: context.note_id.clone(),
            limit,
        }))
    }

    fn subscription_filter(&self, context: &CommentViewContext) -> ResourceFilter {
        ResourceFilter::scoped(
            ResourceKind::NoteComments,
            "note_id",
            context.note_id.as_str(),
        )
    }
}

/// ノートひとつ分のコメント一覧
#[derive(Clone)]
pub struct CommentThread {
    collection: LiveCollection<NoteComment, CommentVisibility>,
    query: Arc<dyn QueryService>,
    auth: Arc<dyn AuthProvider>,
}

impl CommentThread {
    pub fn new(
        query: Arc<dyn QueryService>,
        channel: Arc<dyn SubscriptionChannel>,
        auth: Arc<dyn AuthProvider>,
        note_id: EntityId,
        list_limit: u32,
    ) -> Self {
        let collection = LiveCollection::new(
            CommentVisibility,
            CommentViewContext { note_id },
            Arc::clone(&query),
            channel,
            list_limit,
        );
        Self {
            collection,
            query,
            auth,
        }
    }

    pub fn note_id(&self) -> EntityId {
        self.collection.context().note_id
    }

    pub async fn open(&self) -> Result<(), AppError> {
        self.collection.open().await
    }

    pub async fn close(&self) {
        self.collection.close().await;
    }

    /// 表示対象のノートを切り替える
    pub async fn retarget(&self, note_id: EntityId) -> Result<(), AppError> {
        self.collection
            .update_context(|ctx| ctx.note_id = note_id)
            .await
    }

    pub async fn comments(&self) -> Vec<NoteComment> {
        self.collection.items().await
    }

    pub async fn add(&self, content: &str) -> Result<NoteComment, AppError> {
        let user = require_user(self.auth.current_user())?;
        let content = normalize_comment_content(content)?;

        let comment = mutate_entity::<NoteComment>(
            self.query.as_ref(),
            MutationRequest::new(
                Some(user),
                Mutation::CreateComment {
                    note_id: self.note_id(),
                    content: content.to_string(),
                },
            ),
        )
        .await?;
        self.collection
            .reconciler()
            .apply(ChangeEvent::Insert(EventPayload::Record(comment.clone())))
            .await;
        Ok(comment)
    }

    pub async fn delete(&self, id: &EntityId) -> Result<(), AppError> {
        let user = require_user(self.auth.current_user())?;
        let current = self.collection.get(id).await;
        ensure_owned(current.as_ref(), id, &user)?;

        self.query
            .mutate(MutationRequest::new(
                Some(user),
                Mutation::DeleteComment { id: id.clone() },
            ))
            .await?;
        self.collection
            .reconciler()
            .apply(ChangeEvent::Delete(id.clone()))
            .await;
        Ok(())
    }
}
