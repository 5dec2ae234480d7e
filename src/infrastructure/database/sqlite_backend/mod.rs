use super::ConnectionPool;
use crate::application::ports::query_service::{ListQuery, Mutation, MutationRequest, QueryService};
use crate::domain::entities::Record;
use crate::domain::realtime::{ChangeKind, ChangeMessage, ResourceKind};
use crate::domain::value_objects::{EntityId, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use tokio::sync::broadcast;
use tracing::{debug, warn};

mod checkins;
mod comments;
mod mapper;
mod notes;
mod queries;
mod spots;

use queries::{SELECT_LIKED_NOTE_IDS, UPSERT_PROFILE};

/// SQLite 上のサーバー権威実装。
///
/// 所有者確認・いいねの一意性・チェックインの調停をトランザクション内で行い、
/// コミット後に変更通知を発行する。
pub struct SqliteBackend {
    pool: ConnectionPool,
    events: broadcast::Sender<ChangeMessage>,
    include_records: bool,
}

impl SqliteBackend {
    pub fn new(
        pool: ConnectionPool,
        events: broadcast::Sender<ChangeMessage>,
        include_records: bool,
    ) -> Self {
        Self {
            pool,
            events,
            include_records,
        }
    }

    pub async fn initialize(&self) -> Result<(), AppError> {
        self.pool.migrate().await?;
        Ok(())
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// 表示名を登録する。結合フィールドとしてノート等に反映される
    pub async fn upsert_profile(&self, user: &UserId, display_name: &str) -> Result<(), AppError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::ValidationError(
                "Display name is required".to_string(),
            ));
        }
        sqlx::query(UPSERT_PROFILE)
            .bind(user.as_str())
            .bind(display_name)
            .bind(Utc::now().timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    fn publish(&self, kind: ChangeKind, record: &Record) {
        let message = if self.include_records {
            match record.to_json() {
                Ok(value) => ChangeMessage {
                    resource: record.resource(),
                    kind,
                    id: record.id().to_string(),
                    record: Some(value),
                },
                Err(err) => {
                    warn!("Publishing {} {} without record: {}", record.resource(), record.id(), err);
                    ChangeMessage::reference(record.resource(), kind, record.id())
                }
            }
        } else {
            ChangeMessage::reference(record.resource(), kind, record.id())
        };

        match self.events.send(message) {
            Ok(receivers) => debug!(
                "Published {:?} {} {} to {} receivers",
                kind,
                record.resource(),
                record.id(),
                receivers
            ),
            Err(_) => debug!(
                "No receivers for {:?} {} {}",
                kind,
                record.resource(),
                record.id()
            ),
        }
    }

    async fn apply_mutation(&self, request: MutationRequest) -> Result<Record, AppError> {
        let MutationRequest { actor, mutation } = request;
        let actor = actor.as_ref().ok_or(AppError::NotAuthenticated);

        match mutation {
            Mutation::CreateNote(draft) => self.create_note(actor?, draft).await,
            Mutation::UpdateNote { id, patch } => self.update_note(actor?, &id, patch).await,
            Mutation::DeleteNote { id } => self.delete_note(actor?, &id).await,
            Mutation::LikeNote { id } => self.set_note_like(actor?, &id, true).await,
            Mutation::UnlikeNote { id } => self.set_note_like(actor?, &id, false).await,
            Mutation::RecordNoteView { id } => self.record_note_view(&id).await,
            Mutation::CreateComment { note_id, content } => {
                self.create_comment(actor?, &note_id, &content).await
            }
            Mutation::DeleteComment { id } => self.delete_comment(actor?, &id).await,
            Mutation::CreateSpot(draft) => self.create_spot(actor?, draft).await,
            Mutation::UpdateSpot { id, patch } => self.update_spot(actor?, &id, patch).await,
            Mutation::DeleteSpot { id } => self.delete_spot(actor?, &id).await,
            Mutation::CheckIn { spot_id } => self.check_in(actor?, &spot_id).await,
            Mutation::CheckOut { checkin_id } => self.check_out(actor?, &checkin_id).await,
        }
    }
}

fn ensure_owner(
    owner: &UserId,
    actor: &UserId,
    resource: ResourceKind,
    id: &EntityId,
) -> Result<(), AppError> {
    if owner == actor {
        Ok(())
    } else {
        Err(AppError::NotAuthorized(format!(
            "{resource} {id} is owned by another user"
        )))
    }
}

fn not_found(resource: ResourceKind, id: &EntityId) -> AppError {
    AppError::NotFound(format!("{resource} {id}"))
}

#[async_trait]
impl QueryService for SqliteBackend {
    async fn fetch_list(&self, query: ListQuery) -> Result<Vec<Record>, AppError> {
        let records = match query {
            ListQuery::Notes(query) => self
                .list_notes(&query)
                .await?
                .into_iter()
                .map(Record::Note)
                .collect(),
            ListQuery::Comments(query) => self
                .list_comments(&query)
                .await?
                .into_iter()
                .map(Record::Comment)
                .collect(),
            ListQuery::Spots(query) => self
                .list_spots(&query)
                .await?
                .into_iter()
                .map(Record::Spot)
                .collect(),
            ListQuery::Checkins(query) => self
                .list_checkins(&query)
                .await?
                .into_iter()
                .map(Record::Checkin)
                .collect(),
        };
        Ok(records)
    }

    async fn fetch_one(&self, resource: ResourceKind, id: &EntityId) -> Result<Record, AppError> {
        let mut conn = self.pool.get_pool().acquire().await?;
        let record = match resource {
            ResourceKind::Notes => notes::load_note(&mut conn, id).await?.map(Record::Note),
            ResourceKind::NoteComments => comments::load_comment(&mut conn, id)
                .await?
                .map(Record::Comment),
            ResourceKind::HangoutSpots => spots::load_spot(&mut conn, id).await?.map(Record::Spot),
            ResourceKind::HangoutCheckins => checkins::load_checkin(&mut conn, id)
                .await?
                .map(Record::Checkin),
        };
        record.ok_or_else(|| not_found(resource, id))
    }

    async fn fetch_liked_note_ids(&self, user_id: &UserId) -> Result<Vec<EntityId>, AppError> {
        let rows = sqlx::query(SELECT_LIKED_NOTE_IDS)
            .bind(user_id.as_str())
            .fetch_all(self.pool.get_pool())
            .await?;
        rows.iter()
            .map(|row| {
                let id: String = row.try_get("note_id")?;
                EntityId::new(id).map_err(AppError::DeserializationError)
            })
            .collect()
    }

    async fn mutate(&self, request: MutationRequest) -> Result<Record, AppError> {
        let label = request.mutation.label();
        let result = self.apply_mutation(request).await;
        match &result {
            Ok(record) => debug!("Mutation {} applied to {} {}", label, record.resource(), record.id()),
            Err(err) if err.is_domain_rejection() => debug!("Mutation {} rejected: {}", label, err),
            Err(err) => warn!("Mutation {} failed: {}", label, err),
        }
        result
    }
}
